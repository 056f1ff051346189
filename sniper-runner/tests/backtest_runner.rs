//! Integration tests for the backtest harness: hand-built scenarios with known
//! round trips plus synthetic series for the bookkeeping invariants.

use chrono::{Duration, TimeZone, Utc};
use sniper_core::data::MarketDataProvider;
use sniper_core::position::ExitReason;
use sniper_core::{Bar, TradeState};
use sniper_runner::data_loader::SyntheticProvider;
use sniper_runner::{backtest_many, run_backtest, AppConfig, BacktestOptions};

fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                base + Duration::minutes(5 * i as i64),
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                1000.0,
            )
        })
        .collect()
}

/// Ranging wave, a flush to 95 at bar 249, then `tail`.
fn flush_then(tail: &[f64]) -> Vec<Bar> {
    let wave = [100.0, 101.0, 102.0, 101.0];
    let mut closes: Vec<f64> = (0..249).map(|i| wave[i % 4]).collect();
    closes.push(95.0);
    closes.extend_from_slice(tail);
    bars_from_closes(&closes)
}

/// Mirror of [`flush_then`]: a spike to 107 at bar 249, then `tail`.
fn spike_then(tail: &[f64]) -> Vec<Bar> {
    let wave = [102.0, 101.0, 100.0, 101.0];
    let mut closes: Vec<f64> = (0..249).map(|i| wave[i % 4]).collect();
    closes.push(107.0);
    closes.extend_from_slice(tail);
    bars_from_closes(&closes)
}

/// Evaluate first at the flush bar so earlier bars cannot open anything.
fn at_flush() -> BacktestOptions {
    BacktestOptions {
        warmup: 249,
        initial_balance: 10_000.0,
    }
}

fn assert_approx(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-6, "{a} != {b}");
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn long_round_trip_hits_target() {
    let bars = flush_then(&[97.0, 100.0, 103.0]);
    let report = run_backtest("SPY", &bars, &AppConfig::default(), &at_flush());

    assert_eq!(report.trade_count, 1);
    let trade = &report.trades[0];
    assert_eq!(trade.side, TradeState::Long);
    assert_eq!(trade.reason, ExitReason::TakeProfit);
    assert_eq!(trade.entry_price, 95.0);
    assert_eq!(trade.exit_price, 103.0);

    let units = 10_000.0 / 95.0;
    assert_approx(trade.units, units);
    assert_approx(trade.pnl, units * 8.0);
    assert_approx(report.final_equity, units * 103.0);
    assert_eq!(report.wins, 1);
    assert_eq!(report.win_rate, 100.0);
    assert!(report.open_position.is_none());
}

#[test]
fn short_round_trip_gains_on_drop() {
    let bars = spike_then(&[105.0, 99.0]);
    let report = run_backtest("SPY", &bars, &AppConfig::default(), &at_flush());

    assert_eq!(report.trade_count, 1);
    let trade = &report.trades[0];
    assert_eq!(trade.side, TradeState::Short);
    assert_eq!(trade.reason, ExitReason::TakeProfit);

    let units = 10_000.0 / 107.0;
    let value = 2.0 * units * 107.0 - units * 99.0;
    assert_approx(trade.balance_after, value);
    assert_approx(report.final_equity, value);
    assert!(report.total_return_pct > 0.0);
}

#[test]
fn open_position_is_marked_to_last_close() {
    let bars = flush_then(&[97.0]);
    let report = run_backtest("SPY", &bars, &AppConfig::default(), &at_flush());

    assert_eq!(report.trade_count, 0);
    assert_eq!(report.open_position, Some(TradeState::Long));
    assert_approx(report.final_equity, 10_000.0 / 95.0 * 97.0);
    assert_eq!(report.win_rate, 0.0);
}

#[test]
fn too_short_series_never_trades() {
    let bars = bars_from_closes(&[100.0; 20]);
    let report = run_backtest("SPY", &bars, &AppConfig::default(), &BacktestOptions::default());
    assert_eq!(report.trade_count, 0);
    assert_eq!(report.final_equity, 10_000.0);
}

// ── Bookkeeping on synthetic series ─────────────────────────────────

#[test]
fn synthetic_report_is_consistent() {
    let bars = SyntheticProvider.fetch("ETH", "10d", "15m").unwrap();
    let config = AppConfig::default();
    let report = run_backtest("ETH", &bars, &config, &BacktestOptions::default());

    assert_eq!(report.bar_count, bars.len());
    assert_eq!(report.trade_count, report.trades.len());
    assert!(report.wins <= report.trade_count);
    assert!((0.0..=100.0).contains(&report.win_rate));
    assert!(report.final_equity.is_finite());
    assert_eq!(report.config_hash, config.config_hash());

    let mut balance = report.initial_balance;
    for trade in &report.trades {
        assert!(trade.entry_time.is_some_and(|t| t < trade.exit_time));
        balance += trade.pnl;
        assert_approx(trade.balance_after, balance);
    }
}

#[test]
fn backtest_is_deterministic() {
    let bars = SyntheticProvider.fetch("SPY", "10d", "15m").unwrap();
    let config = AppConfig::default();
    let a = run_backtest("SPY", &bars, &config, &BacktestOptions::default());
    let b = run_backtest("SPY", &bars, &config, &BacktestOptions::default());
    assert_eq!(a, b);
}

#[test]
fn backtest_many_preserves_order() {
    let inputs: Vec<(String, Vec<Bar>)> = ["SPY", "QQQ", "BTC"]
        .iter()
        .map(|s| (s.to_string(), SyntheticProvider.fetch(s, "5d", "15m").unwrap()))
        .collect();
    let config = AppConfig::default();
    let reports = backtest_many(&inputs, &config, &BacktestOptions::default());

    assert_eq!(reports.len(), 3);
    for ((symbol, bars), report) in inputs.iter().zip(&reports) {
        assert_eq!(&report.symbol, symbol);
        assert_eq!(report, &run_backtest(symbol, bars, &config, &BacktestOptions::default()));
    }
}
