//! Sniper Runner: scanner loop, backtest harness, config, data loading.
//!
//! This crate builds on `sniper-core` to provide:
//! - TOML application config with validation and fingerprinting
//! - Bar loading from CSV, synthetic walks or the chart feed
//! - The polling scanner with alert filtering and the execution gate
//! - A bi-directional backtest harness and report export

pub mod backtest;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod notify;
pub mod scanner;

pub use backtest::{backtest_many, run_backtest, BacktestOptions, BacktestReport, BacktestTrade};
pub use config::{AppConfig, ConfigError};
pub use data_loader::{load_bars, provider_for, CsvProvider, LoadError, LoadOptions, LoadedData, SyntheticProvider};
pub use notify::{LogNotifier, Notifier, NotifyFilter, SignalAlert};
pub use scanner::{DecisionSink, EmergencyExit, GateBlock, LogSink, ScanError, Scanner, ScannerState, TickOutcome};
