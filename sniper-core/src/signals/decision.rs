//! Decision types produced by the signal engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade direction wanted on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// BUY or SELL.
    pub fn is_directional(&self) -> bool {
        matches!(self, Signal::Buy | Signal::Sell)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market state the decision was made in.
///
/// `Waiting` and `Error` are not market regimes: they mark decisions made
/// before warm-up or after a computation fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Trending,
    Ranging,
    Stabilizing,
    Waiting,
    Error,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Trending => "TRENDING",
            Regime::Ranging => "RANGING",
            Regime::Stabilizing => "STABILIZING",
            Regime::Waiting => "WAITING",
            Regime::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine output for one evaluation.
///
/// Prices are rounded to cents. `stop_loss` and `take_profit` are zero
/// unless the signal is BUY or SELL. `confluence_points` is signed: positive
/// for bullish agreement, negative for bearish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDecision {
    pub signal: Signal,
    pub regime: Regime,
    pub confluence_points: i32,
    /// Percentage of the maximum attainable points, 0 to 100.
    pub confluence: u8,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub rsi: f64,
    pub adx: f64,
    pub atr: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SignalDecision {
    /// Not enough history to decide.
    pub fn waiting() -> Self {
        Self::neutral(Regime::Waiting)
    }

    /// The evaluation failed; callers should not act on it.
    pub fn error() -> Self {
        Self::neutral(Regime::Error)
    }

    fn neutral(regime: Regime) -> Self {
        Self {
            signal: Signal::Hold,
            regime,
            confluence_points: 0,
            confluence: 0,
            entry_price: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            rsi: 0.0,
            adx: 0.0,
            atr: 0.0,
            timestamp: None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.signal.is_directional()
    }
}
