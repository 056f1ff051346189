//! Indicator pipeline: raw bars in, enriched bars out.
//!
//! Every indicator is computed once over the whole series, then zipped into
//! one [`EnrichedBar`] per input bar. Undefined values (NaN, ±Inf) are
//! replaced by 0 so downstream consumers never see non-finite numbers.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::indicators::{
    atr::true_range, atr::wilder_smooth, Adx, Atr, Bollinger, Indicator, Macd, MacdLine, Rsi,
    Sma, Vwap,
};

/// Windows and spans for every indicator in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub fast_ma: usize,
    pub slow_ma: usize,
    pub trend_ma: usize,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_std_mult: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub adx_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            fast_ma: 10,
            slow_ma: 50,
            trend_ma: 200,
            rsi_period: 14,
            bb_period: 20,
            bb_std_mult: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            adx_period: 14,
        }
    }
}

impl IndicatorConfig {
    /// Every window with its field name, for validation.
    pub fn windows(&self) -> [(&'static str, usize); 10] {
        [
            ("fast_ma", self.fast_ma),
            ("slow_ma", self.slow_ma),
            ("trend_ma", self.trend_ma),
            ("rsi_period", self.rsi_period),
            ("bb_period", self.bb_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("atr_period", self.atr_period),
            ("adx_period", self.adx_period),
        ]
    }

    /// One indicator instance per enriched field.
    ///
    /// Panics if any window is zero; validate the config first.
    pub fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![
            Box::new(Sma::new(self.fast_ma)),
            Box::new(Sma::new(self.slow_ma)),
            Box::new(Sma::new(self.trend_ma)),
            Box::new(Rsi::new(self.rsi_period)),
            Box::new(Vwap::new()),
            Box::new(Bollinger::middle(self.bb_period, self.bb_std_mult)),
            Box::new(Bollinger::upper(self.bb_period, self.bb_std_mult)),
            Box::new(Bollinger::lower(self.bb_period, self.bb_std_mult)),
            Box::new(self.macd(MacdLine::Line)),
            Box::new(self.macd(MacdLine::Signal)),
            Box::new(self.macd(MacdLine::Histogram)),
            Box::new(Atr::new(self.atr_period)),
            Box::new(Adx::plus_di(self.adx_period)),
            Box::new(Adx::minus_di(self.adx_period)),
            Box::new(Adx::new(self.adx_period)),
        ]
    }

    /// Bars needed before every indicator runs on a full window.
    ///
    /// Earlier bars are still enriched from partial windows.
    pub fn full_window(&self) -> usize {
        self.indicators()
            .iter()
            .map(|i| i.lookback())
            .max()
            .unwrap_or(0)
    }

    fn macd(&self, line: MacdLine) -> Macd {
        Macd::new(self.macd_fast, self.macd_slow, self.macd_signal, line)
    }
}

/// An OHLCV bar plus every indicator value at that bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBar {
    #[serde(flatten)]
    pub bar: Bar,
    pub fast_ma: f64,
    pub slow_ma: f64,
    pub trend_ma: f64,
    pub rsi: f64,
    pub vwap: f64,
    pub bb_middle: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub true_range: f64,
    pub atr: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub adx: f64,
}

impl EnrichedBar {
    pub fn close(&self) -> f64 {
        self.bar.close
    }

    /// Indicator fields as (name, value) pairs, in declaration order.
    pub fn indicator_values(&self) -> [(&'static str, f64); 16] {
        [
            ("fast_ma", self.fast_ma),
            ("slow_ma", self.slow_ma),
            ("trend_ma", self.trend_ma),
            ("rsi", self.rsi),
            ("vwap", self.vwap),
            ("bb_middle", self.bb_middle),
            ("bb_upper", self.bb_upper),
            ("bb_lower", self.bb_lower),
            ("macd", self.macd),
            ("macd_signal", self.macd_signal),
            ("macd_hist", self.macd_hist),
            ("true_range", self.true_range),
            ("atr", self.atr),
            ("plus_di", self.plus_di),
            ("minus_di", self.minus_di),
            ("adx", self.adx),
        ]
    }
}

/// Enrich a bar series with every indicator in `config`.
///
/// The output has the same length as the input and contains only finite
/// indicator values. Calling it twice on the same input gives bit-identical
/// results.
pub fn enrich(bars: &[Bar], config: &IndicatorConfig) -> Vec<EnrichedBar> {
    if bars.is_empty() {
        return Vec::new();
    }

    let fast_ma = Sma::new(config.fast_ma).compute(bars);
    let slow_ma = Sma::new(config.slow_ma).compute(bars);
    let trend_ma = Sma::new(config.trend_ma).compute(bars);
    let rsi = Rsi::new(config.rsi_period).compute(bars);
    let vwap = Vwap::new().compute(bars);
    let bands = Bollinger::middle(config.bb_period, config.bb_std_mult).bands(bars);
    let macd = config.macd(MacdLine::Line).components(bars);
    let tr = true_range(bars);
    let atr = wilder_smooth(&tr, config.atr_period);
    let directional = if config.adx_period == config.atr_period {
        Adx::new(config.adx_period).components_with_atr(bars, &atr)
    } else {
        let adx_atr = wilder_smooth(&tr, config.adx_period);
        Adx::new(config.adx_period).components_with_atr(bars, &adx_atr)
    };

    debug_assert_eq!(fast_ma.len(), bars.len());
    debug_assert_eq!(directional.adx.len(), bars.len());

    bars.iter()
        .enumerate()
        .map(|(i, bar)| EnrichedBar {
            bar: *bar,
            fast_ma: finite_or_zero(fast_ma[i]),
            slow_ma: finite_or_zero(slow_ma[i]),
            trend_ma: finite_or_zero(trend_ma[i]),
            rsi: finite_or_zero(rsi[i]),
            vwap: finite_or_zero(vwap[i]),
            bb_middle: finite_or_zero(bands.middle[i]),
            bb_upper: finite_or_zero(bands.upper[i]),
            bb_lower: finite_or_zero(bands.lower[i]),
            macd: finite_or_zero(macd.line[i]),
            macd_signal: finite_or_zero(macd.signal[i]),
            macd_hist: finite_or_zero(macd.histogram[i]),
            true_range: finite_or_zero(tr[i]),
            atr: finite_or_zero(atr[i]),
            plus_di: finite_or_zero(directional.plus_di[i]),
            minus_di: finite_or_zero(directional.minus_di[i]),
            adx: finite_or_zero(directional.adx[i]),
        })
        .collect()
}

#[inline]
fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}
