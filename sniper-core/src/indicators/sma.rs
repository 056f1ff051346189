//! Simple Moving Average (SMA).
//!
//! Rolling mean of close prices. The window is partially filled at the start
//! of the series, so SMA[i] = mean(close[max(0, i+1-period)..=i]).
//! Lookback: period - 1 (first full window at index period-1).

use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rolling_mean(&closes(bars), self.period)
    }
}

/// Rolling mean with a partially filled leading window.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = Vec::with_capacity(n);
    if period == 0 {
        result.resize(n, f64::NAN);
        return result;
    }

    let mut sum = 0.0;
    for i in 0..n {
        sum += values[i];
        if i >= period {
            sum -= values[i - period];
        }
        let count = (i + 1).min(period);
        result.push(sum / count as f64);
    }

    result
}

/// Rolling sample standard deviation (n - 1) with a partially filled leading
/// window. A window holding a single value has no defined deviation (NaN).
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }

    for (i, out) in result.iter_mut().enumerate() {
        let start = (i + 1).saturating_sub(period);
        let window = &values[start..=i];
        let count = window.len();
        if count < 2 {
            continue;
        }
        let mean = window.iter().sum::<f64>() / count as f64;
        let variance = window
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / (count - 1) as f64;
        *out = variance.sqrt();
    }

    result
}
