//! Relative Strength Index (RSI).
//!
//! Simple rolling averages of gains and losses over `period` bars with a
//! partially filled window at the start. The first bar's change counts as 0.
//! RSI = 100 - 100 / (1 + avg_gain / (avg_loss + eps))
//! Lookback: period.

use super::sma::rolling_mean;
use super::{closes, Indicator, EPSILON};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes = closes(bars);
        let n = closes.len();
        let mut gains = vec![0.0; n];
        let mut losses = vec![0.0; n];
        for i in 1..n {
            let delta = closes[i] - closes[i - 1];
            if delta > 0.0 {
                gains[i] = delta;
            } else if delta < 0.0 {
                losses[i] = -delta;
            }
        }

        let avg_gain = rolling_mean(&gains, self.period);
        let avg_loss = rolling_mean(&losses, self.period);

        avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(g, l)| 100.0 - 100.0 / (1.0 + g / (l + EPSILON)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn rsi_all_gains_approaches_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let result = Rsi::new(14).compute(&bars);
        assert!(result[19] > 99.99);
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let bars = make_bars(&closes);
        let result = Rsi::new(14).compute(&bars);
        assert_approx(result[19], 0.0, 1e-9);
    }

    #[test]
    fn rsi_first_bar_is_zero() {
        // No change on the first bar: gain 0 over loss 0 + eps.
        let bars = make_bars(&[100.0, 101.0]);
        let result = Rsi::new(14).compute(&bars);
        assert_approx(result[0], 0.0, 1e-9);
    }

    #[test]
    fn rsi_known_value() {
        // +2, -1, +2, -1 over a 14 window: mean gain 4/5, mean loss 2/5 → RS 2
        let bars = make_bars(&[10.0, 12.0, 11.0, 13.0, 12.0]);
        let result = Rsi::new(14).compute(&bars);
        assert_approx(result[4], 100.0 - 100.0 / 3.0, 1e-6);
    }

    #[test]
    fn rsi_window_drops_old_deltas() {
        // Period 2: at index 3 the window holds deltas of bars 2 and 3 only.
        let bars = make_bars(&[10.0, 5.0, 6.0, 7.0]);
        let result = Rsi::new(2).compute(&bars);
        assert!(result[3] > 99.99);
        assert!(result[2] < 50.0);
    }

    #[test]
    fn rsi_bounded() {
        let closes: Vec<f64> = (0..50)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0)
            .collect();
        let bars = make_bars(&closes);
        for v in Rsi::new(14).compute(&bars) {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of [0, 100]");
        }
    }
}
