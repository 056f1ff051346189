//! Volume-Weighted Average Price, cumulative from the first loaded bar.
//!
//! VWAP[t] = sum(tp * volume) / (sum(volume) + eps), tp = (high + low + close) / 3.
//! There is no session reset; the anchor is the start of the loaded window.

use super::{Indicator, EPSILON};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Vwap {
    name: String,
}

impl Vwap {
    pub fn new() -> Self {
        Self {
            name: "vwap".to_string(),
        }
    }
}

impl Default for Vwap {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Vwap {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut pv = 0.0;
        let mut vol = 0.0;
        bars.iter()
            .map(|bar| {
                pv += bar.typical_price() * bar.volume;
                vol += bar.volume;
                pv / (vol + EPSILON)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars};

    #[test]
    fn vwap_weights_by_volume() {
        let mut bars = make_ohlc_bars(&[(10.0, 12.0, 9.0, 12.0), (20.0, 22.0, 20.0, 21.0)]);
        bars[0].volume = 100.0;
        bars[1].volume = 300.0;
        let result = Vwap::new().compute(&bars);
        // tp0 = 11, tp1 = 21
        assert_approx(result[0], 11.0, 1e-9);
        assert_approx(result[1], (11.0 * 100.0 + 21.0 * 300.0) / 400.0, 1e-9);
    }

    #[test]
    fn zero_volume_gives_zero() {
        let mut bars = make_ohlc_bars(&[(10.0, 12.0, 9.0, 12.0)]);
        bars[0].volume = 0.0;
        assert_eq!(Vwap::new().compute(&bars), vec![0.0]);
    }
}
