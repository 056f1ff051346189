//! Bi-directional replay of the signal engine over one series.
//!
//! Enrich once, then walk forward from the warm-up bar: exits are checked on
//! each close before a new entry is considered. Every entry commits the whole
//! balance. Nothing here looks past the bar being replayed.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use sniper_core::position::{ExitReason, OpenPosition};
use sniper_core::{enrich, Bar, PositionTracker, SignalConfig, SignalEngine, TradeState};

use crate::config::AppConfig;
use crate::data_loader::compute_dataset_hash;

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Bars skipped before the first evaluation.
pub const DEFAULT_WARMUP: usize = 35;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOptions {
    pub warmup: usize,
    pub initial_balance: f64,
}

impl Default for BacktestOptions {
    fn default() -> Self {
        Self {
            warmup: DEFAULT_WARMUP,
            initial_balance: 10_000.0,
        }
    }
}

/// One closed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub side: TradeState,
    pub entry_time: Option<DateTime<Utc>>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub units: f64,
    pub reason: ExitReason,
    pub pnl: f64,
    pub balance_after: f64,
}

impl BacktestTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub bar_count: usize,
    pub warmup: usize,
    pub trades: Vec<BacktestTrade>,
    pub trade_count: usize,
    pub wins: usize,
    /// Percent of closed trades with positive P&L.
    pub win_rate: f64,
    pub initial_balance: f64,
    /// Balance with any open position marked to the last close.
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub open_position: Option<TradeState>,
    pub config_hash: String,
    pub dataset_hash: String,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Value of `units` opened at `pos.entry_price` when closed at `price`.
///
/// Shorts are valued as the posted balance plus the price drop.
fn position_value(pos: &OpenPosition, price: f64) -> f64 {
    match pos.side {
        TradeState::Short => 2.0 * pos.quantity * pos.entry_price - pos.quantity * price,
        _ => pos.quantity * price,
    }
}

/// Replay `bars` for `symbol`.
pub fn run_backtest(
    symbol: &str,
    bars: &[Bar],
    config: &AppConfig,
    opts: &BacktestOptions,
) -> BacktestReport {
    let enriched = enrich(bars, &config.indicators);
    let engine = SignalEngine::new(SignalConfig {
        min_bars: opts.warmup.max(2),
        ..config.signal.clone()
    });

    let mut balance = opts.initial_balance;
    let mut tracker = PositionTracker::new();
    let mut trades = Vec::new();

    for i in opts.warmup..enriched.len() {
        let bar = &enriched[i].bar;

        if let Some(exit) = tracker.on_price(bar.close, Some(bar.timestamp)) {
            let value = position_value(&exit.position, exit.exit_price);
            let pnl = value - balance;
            balance = value;
            trades.push(BacktestTrade {
                side: exit.position.side,
                entry_time: exit.position.opened_at,
                exit_time: bar.timestamp,
                entry_price: exit.position.entry_price,
                exit_price: exit.exit_price,
                units: exit.position.quantity,
                reason: exit.reason,
                pnl,
                balance_after: balance,
            });
            continue;
        }

        if tracker.state().is_flat() && balance > 0.0 {
            let decision = engine.evaluate(&enriched[..=i]);
            if decision.is_actionable() && decision.entry_price > 0.0 {
                let units = balance / decision.entry_price;
                tracker.on_decision(&decision, units);
            }
        }
    }

    let last_close = bars.last().map(|b| b.close);
    let final_equity = match (tracker.position(), last_close) {
        (Some(pos), Some(close)) => position_value(pos, close),
        _ => balance,
    };

    let trade_count = trades.len();
    let wins = trades.iter().filter(|t| t.is_win()).count();
    let win_rate = if trade_count > 0 {
        wins as f64 / trade_count as f64 * 100.0
    } else {
        0.0
    };
    let total_return_pct = if opts.initial_balance > 0.0 {
        (final_equity - opts.initial_balance) / opts.initial_balance * 100.0
    } else {
        0.0
    };

    info!(
        symbol,
        bars = bars.len(),
        trades = trade_count,
        win_rate,
        total_return_pct,
        "backtest complete"
    );

    BacktestReport {
        schema_version: SCHEMA_VERSION,
        symbol: symbol.to_string(),
        bar_count: bars.len(),
        warmup: opts.warmup,
        trades,
        trade_count,
        wins,
        win_rate,
        initial_balance: opts.initial_balance,
        final_equity,
        total_return_pct,
        open_position: tracker.position().map(|p| p.side),
        config_hash: config.config_hash(),
        dataset_hash: compute_dataset_hash(symbol, bars),
    }
}

/// Run several independent series in parallel, preserving input order.
pub fn backtest_many(
    inputs: &[(String, Vec<Bar>)],
    config: &AppConfig,
    opts: &BacktestOptions,
) -> Vec<BacktestReport> {
    inputs
        .par_iter()
        .map(|(symbol, bars)| run_backtest(symbol, bars, config, opts))
        .collect()
}
