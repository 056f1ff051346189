//! Position sizing: risk budget and capital cap to an order quantity.
//!
//! The sizer is signal-agnostic: it only sees entry, stop and account
//! figures. The result is rounded toward zero to the instrument's lot
//! precision, so neither the risk budget nor the capital cap is exceeded.
//!
//! # Formula
//! ```text
//! risk_amount   = equity * risk_pct / 100
//! risk_per_unit = max(|entry - stop|, tick)
//! quantity      = min(risk_amount / risk_per_unit, capital * 0.95 / entry)
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{Instrument, PRICE_TICK};

/// Share of available capital a single order may commit.
pub const CAPITAL_FRACTION: f64 = 0.95;

/// Inputs for one sizing decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingRequest<'a> {
    pub symbol: &'a str,
    pub entry: f64,
    pub stop: f64,
    pub equity: f64,
    pub available_capital: f64,
    /// Percent of equity at risk, e.g. 1.0 for 1%.
    pub risk_pct: f64,
}

/// Why a sizing request produced no order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    NonFiniteInput,
    NonPositiveEntry,
    NonPositiveEquity,
    NoAvailableCapital,
    NonPositiveRisk,
    QuantityTooSmall,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::NonFiniteInput => "non-finite input",
            SkipReason::NonPositiveEntry => "entry price must be positive",
            SkipReason::NonPositiveEquity => "equity must be positive",
            SkipReason::NoAvailableCapital => "no available capital",
            SkipReason::NonPositiveRisk => "risk per trade must be positive",
            SkipReason::QuantityTooSmall => "quantity rounds to zero",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingResult {
    pub quantity: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

impl SizingResult {
    pub fn sized(quantity: f64) -> Self {
        Self {
            quantity,
            success: true,
            skip_reason: None,
        }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            quantity: 0.0,
            success: false,
            skip_reason: Some(reason),
        }
    }
}

/// Fixed-fractional risk sizer with a capital cap.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSizer {
    capital_fraction: f64,
    min_risk_per_unit: f64,
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self {
            capital_fraction: CAPITAL_FRACTION,
            min_risk_per_unit: PRICE_TICK,
        }
    }
}

impl PositionSizer {
    /// Out-of-range arguments fall back to the defaults; a fraction above
    /// 1 is clamped to 1.
    pub fn new(capital_fraction: f64, min_risk_per_unit: f64) -> Self {
        let capital_fraction = if capital_fraction.is_finite() && capital_fraction > 0.0 {
            capital_fraction.min(1.0)
        } else {
            CAPITAL_FRACTION
        };
        let min_risk_per_unit = if min_risk_per_unit.is_finite() && min_risk_per_unit > 0.0 {
            min_risk_per_unit
        } else {
            PRICE_TICK
        };
        Self {
            capital_fraction,
            min_risk_per_unit,
        }
    }

    pub fn size(&self, req: &SizingRequest<'_>) -> SizingResult {
        let inputs = [
            req.entry,
            req.stop,
            req.equity,
            req.available_capital,
            req.risk_pct,
        ];
        if inputs.iter().any(|v| !v.is_finite()) {
            return SizingResult::skipped(SkipReason::NonFiniteInput);
        }
        if req.entry <= 0.0 {
            return SizingResult::skipped(SkipReason::NonPositiveEntry);
        }
        if req.equity <= 0.0 {
            return SizingResult::skipped(SkipReason::NonPositiveEquity);
        }
        if req.available_capital <= 0.0 {
            return SizingResult::skipped(SkipReason::NoAvailableCapital);
        }
        if req.risk_pct <= 0.0 {
            return SizingResult::skipped(SkipReason::NonPositiveRisk);
        }

        let risk_amount = req.equity * req.risk_pct / 100.0;
        let risk_per_unit = (req.entry - req.stop).abs().max(self.min_risk_per_unit);
        let intended = risk_amount / risk_per_unit;
        let max_affordable = req.available_capital * self.capital_fraction / req.entry;

        let quantity = Instrument::from_symbol(req.symbol).format_quantity(intended.min(max_affordable));
        if quantity <= 0.0 {
            return SizingResult::skipped(SkipReason::QuantityTooSmall);
        }
        SizingResult::sized(quantity)
    }
}
