//! Signal generation: regime-aware decisions on the latest enriched bar.
//!
//! Signals never depend on portfolio state. The engine only looks at the
//! enriched series; position tracking and sizing happen downstream.

pub mod decision;
pub mod engine;

pub use decision::{Regime, Signal, SignalDecision};
pub use engine::{EngineError, SignalConfig, SignalEngine};
