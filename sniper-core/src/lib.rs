//! Sniper Core: indicator pipeline, signal engine, sizing, trade state.
//!
//! This crate contains the pure decision path plus the seams to the outside:
//! - Domain types (bars, instruments)
//! - Indicator pipeline producing enriched bars
//! - Regime-aware signal engine with ATR stop/target levels
//! - Risk-bounded position sizer
//! - Trade direction state machine
//! - Bracket orders, broker and market data traits

pub mod broker;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod orders;
pub mod pipeline;
pub mod position;
pub mod signals;
pub mod sizer;

pub use domain::{Bar, BarSeries, Instrument};
pub use pipeline::{enrich, EnrichedBar, IndicatorConfig};
pub use position::{PositionTracker, TradeState};
pub use signals::{Regime, Signal, SignalConfig, SignalDecision, SignalEngine};
pub use sizer::{PositionSizer, SizingRequest, SizingResult};
