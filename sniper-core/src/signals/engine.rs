//! Regime-aware signal engine.
//!
//! The latest ADX picks a regime. Trending markets are scored for a
//! fast-MA reclaim plus momentum, VWAP and RSI agreement; ranging markets
//! look for Bollinger band extremes confirmed by RSI. Actionable signals get
//! ATR-based stop and target levels.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::decision::{Regime, Signal, SignalDecision};
use crate::domain::round_price;
use crate::pipeline::EnrichedBar;

/// Largest attainable trending score: reclaim (3) plus three filters.
pub const MAX_CONFLUENCE_POINTS: i32 = 6;

/// Fixed score of a ranging mean-reversion signal.
pub const RANGING_POINTS: i32 = 5;

/// Thresholds and multipliers for [`SignalEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Bars required before any decision other than WAITING.
    pub min_bars: usize,
    /// ADX strictly above this is TRENDING.
    pub adx_trending: f64,
    /// ADX strictly below this is RANGING.
    pub adx_ranging: f64,
    /// Minimum absolute trending score for BUY/SELL.
    pub trend_threshold: i32,
    /// RANGING BUY requires RSI below this.
    pub oversold_rsi: f64,
    /// RANGING SELL requires RSI above this.
    pub overbought_rsi: f64,
    pub stop_atr_mult: f64,
    pub target_atr_mult: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_bars: 50,
            adx_trending: 25.0,
            adx_ranging: 20.0,
            trend_threshold: 4,
            oversold_rsi: 35.0,
            overbought_rsi: 65.0,
            stop_atr_mult: 2.0,
            target_atr_mult: 3.0,
        }
    }
}

/// Faults surfaced by [`SignalEngine::try_evaluate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("non-finite {field} at bar {index}")]
    NonFiniteInput { field: &'static str, index: usize },

    #[error("non-positive close {price} at bar {index}")]
    NonPositivePrice { price: f64, index: usize },

    #[error(
        "degenerate risk levels for {signal}: entry={entry} stop={stop} target={target} atr={atr}"
    )]
    DegenerateRiskLevels {
        signal: Signal,
        entry: f64,
        stop: f64,
        target: f64,
        atr: f64,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SignalEngine {
    config: SignalConfig,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Decide on the last bar of `bars`, degrading any fault to HOLD/ERROR.
    pub fn evaluate(&self, bars: &[EnrichedBar]) -> SignalDecision {
        match self.try_evaluate(bars) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, bars = bars.len(), "signal evaluation failed, holding");
                let mut decision = SignalDecision::error();
                decision.timestamp = bars.last().map(|b| b.bar.timestamp);
                decision
            }
        }
    }

    /// Decide on the last bar of `bars`.
    ///
    /// A series shorter than `min_bars` is not an error: it yields a WAITING
    /// decision with zero prices.
    pub fn try_evaluate(&self, bars: &[EnrichedBar]) -> Result<SignalDecision, EngineError> {
        if bars.len() < self.config.min_bars.max(2) {
            return Ok(SignalDecision::waiting());
        }

        let index = bars.len() - 1;
        let latest = &bars[index];
        let prev = &bars[index - 1];
        check_inputs(prev, latest, index)?;

        let regime = self.classify(latest.adx);
        let (signal, points) = match regime {
            Regime::Trending => {
                let points = self.trend_points(prev, latest);
                let signal = if points >= self.config.trend_threshold {
                    Signal::Buy
                } else if points <= -self.config.trend_threshold {
                    Signal::Sell
                } else {
                    Signal::Hold
                };
                (signal, points)
            }
            Regime::Ranging => self.range_signal(latest),
            _ => (Signal::Hold, 0),
        };

        let entry = round_price(latest.close());
        let (stop, target) = self.risk_levels(signal, entry, latest.atr)?;

        Ok(SignalDecision {
            signal,
            regime,
            confluence_points: points,
            confluence: confluence_pct(points),
            entry_price: entry,
            stop_loss: stop,
            take_profit: target,
            rsi: round_price(latest.rsi),
            adx: round_price(latest.adx),
            atr: round_price(latest.atr),
            timestamp: Some(latest.bar.timestamp),
        })
    }

    pub fn classify(&self, adx: f64) -> Regime {
        if adx > self.config.adx_trending {
            Regime::Trending
        } else if adx < self.config.adx_ranging {
            Regime::Ranging
        } else {
            Regime::Stabilizing
        }
    }

    fn trend_points(&self, prev: &EnrichedBar, latest: &EnrichedBar) -> i32 {
        let close = latest.close();
        // The reclaim compares both closes against the latest fast MA.
        let fast = latest.fast_ma;
        let mut points = 0;

        if close > latest.slow_ma && close > latest.trend_ma {
            if prev.close() < fast && close >= fast {
                points += 3;
            }
            if latest.macd_hist > 0.0 {
                points += 1;
            }
            if close > latest.vwap {
                points += 1;
            }
            if latest.rsi > 40.0 && latest.rsi < 70.0 {
                points += 1;
            }
        } else if close < latest.slow_ma && close < latest.trend_ma {
            if prev.close() > fast && close <= fast {
                points -= 3;
            }
            if latest.macd_hist < 0.0 {
                points -= 1;
            }
            if close < latest.vwap {
                points -= 1;
            }
            if latest.rsi > 30.0 && latest.rsi < 60.0 {
                points -= 1;
            }
        }

        points
    }

    fn range_signal(&self, latest: &EnrichedBar) -> (Signal, i32) {
        let close = latest.close();
        if close <= latest.bb_lower && latest.rsi < self.config.oversold_rsi {
            (Signal::Buy, RANGING_POINTS)
        } else if close >= latest.bb_upper && latest.rsi > self.config.overbought_rsi {
            (Signal::Sell, -RANGING_POINTS)
        } else {
            (Signal::Hold, 0)
        }
    }

    fn risk_levels(&self, signal: Signal, entry: f64, atr: f64) -> Result<(f64, f64), EngineError> {
        let stop_dist = atr * self.config.stop_atr_mult;
        let target_dist = atr * self.config.target_atr_mult;
        let (stop, target) = match signal {
            Signal::Hold => return Ok((0.0, 0.0)),
            Signal::Buy => (round_price(entry - stop_dist), round_price(entry + target_dist)),
            Signal::Sell => (round_price(entry + stop_dist), round_price(entry - target_dist)),
        };

        let ordered = match signal {
            Signal::Buy => stop < entry && entry < target,
            Signal::Sell => target < entry && entry < stop,
            Signal::Hold => true,
        };
        if atr > 0.0 && ordered && stop > 0.0 && target > 0.0 {
            Ok((stop, target))
        } else {
            Err(EngineError::DegenerateRiskLevels {
                signal,
                entry,
                stop,
                target,
                atr,
            })
        }
    }
}

/// Confluence percentage: |points| over the trending maximum, capped at 100.
pub fn confluence_pct(points: i32) -> u8 {
    let pct = (100.0 * points.unsigned_abs() as f64 / MAX_CONFLUENCE_POINTS as f64).round();
    pct.min(100.0) as u8
}

fn check_inputs(prev: &EnrichedBar, latest: &EnrichedBar, index: usize) -> Result<(), EngineError> {
    if !prev.close().is_finite() {
        return Err(EngineError::NonFiniteInput {
            field: "close",
            index: index - 1,
        });
    }
    if !latest.close().is_finite() {
        return Err(EngineError::NonFiniteInput {
            field: "close",
            index,
        });
    }
    if let Some((field, _)) = latest
        .indicator_values()
        .into_iter()
        .find(|(_, v)| !v.is_finite())
    {
        return Err(EngineError::NonFiniteInput { field, index });
    }
    if latest.close() <= 0.0 {
        return Err(EngineError::NonPositivePrice {
            price: latest.close(),
            index,
        });
    }
    Ok(())
}
