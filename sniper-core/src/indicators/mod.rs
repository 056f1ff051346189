//! Concrete indicator implementations.
//!
//! Every indicator implements [`Indicator`] and produces one value per bar,
//! populated from the first bar onward: rolling windows are allowed to be
//! partially filled and recurrences are seeded from the first observation.
//! Values may still be NaN where a formula is undefined (e.g. the sample
//! standard deviation of a one-bar window); the pipeline sanitizes those.
//!
//! Multi-series indicators (Bollinger, MACD, ADX) are exposed as separate
//! named instances per output line, and each also offers a method returning
//! all of its lines from a single pass.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod vwap;

pub use adx::{Adx, AdxLine, DirectionalSeries};
pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBand, BollingerSeries};
pub use ema::Ema;
pub use macd::{Macd, MacdLine, MacdSeries};
pub use rsi::Rsi;
pub use sma::Sma;
pub use vwap::Vwap;

use crate::domain::Bar;

/// Guard added to denominators that may legitimately be zero.
pub const EPSILON: f64 = 1e-10;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length.
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of bars before the indicator's window is completely filled.
    ///
    /// Values before that point are computed from a partial window and are
    /// less reliable, but they are still emitted.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    ///
    /// Returns a `Vec<f64>` of the same length as `bars`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

pub(crate) fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + Duration::minutes(5 * i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Create bars from explicit (open, high, low, close) tuples for testing.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: base + Duration::minutes(5 * i as i64),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-9;
