//! ADX: Average Directional Index (Wilder).
//!
//! Steps:
//! 1. Compute +DM and -DM from consecutive bars (zero on the first bar)
//! 2. Smooth +DM, -DM, and TR using Wilder smoothing (alpha = 1/period)
//! 3. +DI = 100 * smoothed(+DM) / (ATR + eps)
//! 4. -DI = 100 * smoothed(-DM) / (ATR + eps)
//! 5. DX = 100 * |+DI - -DI| / (+DI + -DI + eps)
//! 6. ADX = Wilder-smoothed DX
//!
//! Lookback: 2 * period (period for DI smoothing, then period for ADX smoothing).

use super::atr::{true_range, wilder_smooth};
use super::{Indicator, EPSILON};
use crate::domain::Bar;

/// Which directional line an [`Adx`] instance reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdxLine {
    PlusDi,
    MinusDi,
    Adx,
}

/// All directional lines from a single pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectionalSeries {
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
    pub adx: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    line: AdxLine,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self::with_line(period, AdxLine::Adx)
    }

    pub fn plus_di(period: usize) -> Self {
        Self::with_line(period, AdxLine::PlusDi)
    }

    pub fn minus_di(period: usize) -> Self {
        Self::with_line(period, AdxLine::MinusDi)
    }

    fn with_line(period: usize, line: AdxLine) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        let prefix = match line {
            AdxLine::PlusDi => "plus_di",
            AdxLine::MinusDi => "minus_di",
            AdxLine::Adx => "adx",
        };
        Self {
            period,
            line,
            name: format!("{prefix}_{period}"),
        }
    }

    /// Compute +DI, -DI and ADX together.
    pub fn components(&self, bars: &[Bar]) -> DirectionalSeries {
        let atr = wilder_smooth(&true_range(bars), self.period);
        self.components_with_atr(bars, &atr)
    }

    /// Same as [`Adx::components`] but reuses an already computed ATR series.
    pub fn components_with_atr(&self, bars: &[Bar], atr: &[f64]) -> DirectionalSeries {
        let n = bars.len();
        if n == 0 {
            return DirectionalSeries::default();
        }

        let mut plus_dm = vec![0.0; n];
        let mut minus_dm = vec![0.0; n];
        for i in 1..n {
            let up = bars[i].high - bars[i - 1].high;
            let down = bars[i - 1].low - bars[i].low;
            if up > down && up > 0.0 {
                plus_dm[i] = up;
            }
            if down > up && down > 0.0 {
                minus_dm[i] = down;
            }
        }

        let smooth_plus = wilder_smooth(&plus_dm, self.period);
        let smooth_minus = wilder_smooth(&minus_dm, self.period);

        let plus_di: Vec<f64> = smooth_plus
            .iter()
            .zip(atr)
            .map(|(dm, tr)| 100.0 * dm / (tr + EPSILON))
            .collect();
        let minus_di: Vec<f64> = smooth_minus
            .iter()
            .zip(atr)
            .map(|(dm, tr)| 100.0 * dm / (tr + EPSILON))
            .collect();

        let dx: Vec<f64> = plus_di
            .iter()
            .zip(&minus_di)
            .map(|(p, m)| 100.0 * (p - m).abs() / (p + m + EPSILON))
            .collect();

        DirectionalSeries {
            adx: wilder_smooth(&dx, self.period),
            plus_di,
            minus_di,
        }
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let series = self.components(bars);
        match self.line {
            AdxLine::PlusDi => series.plus_di,
            AdxLine::MinusDi => series.minus_di,
            AdxLine::Adx => series.adx,
        }
    }
}
