//! Circuit breaker for the chart feed.
//!
//! The scanner polls every few seconds, so a throttled or banned feed would
//! otherwise be hammered. A refused request opens the breaker at once; other
//! failures open it after `failure_threshold` in a row. While open, every
//! request is refused until the cooldown deadline passes.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Tally {
    failures_in_a_row: u32,
    /// `Some` while open.
    open_until: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    tally: Mutex<Tally>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl Default for CircuitBreaker {
    /// Five-minute cooldown, opens after 3 failures in a row.
    fn default() -> Self {
        Self::new(Duration::from_secs(300), 3)
    }
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            tally: Mutex::new(Tally::default()),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    fn tally(&self) -> MutexGuard<'_, Tally> {
        // A poisoned tally is still a valid tally.
        self.tally.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a request may go out now. Closes the breaker once the
    /// cooldown has elapsed.
    pub fn is_allowed(&self) -> bool {
        let mut tally = self.tally();
        match tally.open_until {
            Some(deadline) if Instant::now() < deadline => false,
            Some(_) => {
                *tally = Tally::default();
                true
            }
            None => true,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.is_allowed()
    }

    pub fn record_success(&self) {
        self.tally().failures_in_a_row = 0;
    }

    pub fn record_failure(&self) {
        let mut tally = self.tally();
        tally.failures_in_a_row += 1;
        if tally.failures_in_a_row >= self.failure_threshold && tally.open_until.is_none() {
            tally.open_until = Some(Instant::now() + self.cooldown);
        }
    }

    /// Open immediately, e.g. on HTTP 403.
    pub fn trip(&self) {
        self.tally().open_until = Some(Instant::now() + self.cooldown);
    }

    /// Time left before requests are allowed again.
    pub fn remaining_cooldown(&self) -> Duration {
        self.tally()
            .open_until
            .map_or(Duration::ZERO, |deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
