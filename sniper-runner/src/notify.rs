//! Signal alerts and the de-duplication filter in front of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use sniper_core::{Regime, Signal, SignalDecision};

/// Payload handed to a [`Notifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalAlert {
    pub symbol: String,
    pub signal: Signal,
    pub regime: Regime,
    pub price: f64,
    pub confluence: u8,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SignalAlert {
    pub fn from_decision(symbol: &str, decision: &SignalDecision) -> Self {
        Self {
            symbol: symbol.to_string(),
            signal: decision.signal,
            regime: decision.regime,
            price: decision.entry_price,
            confluence: decision.confluence,
            stop_loss: decision.stop_loss,
            take_profit: decision.take_profit,
            timestamp: decision.timestamp,
        }
    }
}

pub trait Notifier: Send {
    fn notify(&self, alert: &SignalAlert);
}

/// Emits alerts as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: &SignalAlert) {
        info!(
            symbol = %alert.symbol,
            signal = %alert.signal,
            regime = %alert.regime,
            price = alert.price,
            confluence = alert.confluence,
            stop = alert.stop_loss,
            target = alert.take_profit,
            "signal alert"
        );
    }
}

/// Remembers the last alerted signal and price.
///
/// A BUY/SELL alerts when it differs from the last alerted signal or when
/// price has moved more than `price_move_pct` percent since. HOLD clears the
/// memory so the next directional signal always alerts.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyFilter {
    price_move_pct: f64,
    last_signal: Option<Signal>,
    last_price: Option<f64>,
}

impl NotifyFilter {
    pub fn new(price_move_pct: f64) -> Self {
        Self {
            price_move_pct,
            last_signal: None,
            last_price: None,
        }
    }

    /// Decide whether `decision` should alert, updating the memory if so.
    pub fn should_notify(&mut self, decision: &SignalDecision) -> bool {
        if !decision.is_actionable() {
            self.reset();
            return false;
        }
        let price = decision.entry_price;
        let changed = self.last_signal != Some(decision.signal);
        let moved = match self.last_price {
            Some(last) if last > 0.0 => (price - last).abs() / last * 100.0 > self.price_move_pct,
            _ => true,
        };
        if changed || moved {
            self.last_signal = Some(decision.signal);
            self.last_price = Some(price);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last_signal = None;
        self.last_price = None;
    }
}
