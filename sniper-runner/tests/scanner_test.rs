//! Integration tests for the scanner: fixed bar feeds through the full
//! fetch → decide → alert → execute cycle against the paper broker.

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{Duration, TimeZone, Utc};
use sniper_core::broker::{Broker, PaperBroker};
use sniper_core::data::{DataError, MarketDataProvider};
use sniper_core::orders::OrderSide;
use sniper_core::position::ExitReason;
use sniper_core::{Bar, Regime, Signal, SignalDecision, TradeState};
use sniper_runner::{
    AppConfig, DecisionSink, EmergencyExit, GateBlock, Notifier, ScanError, Scanner, SignalAlert,
};

// ── Fixtures ─────────────────────────────────────────────────────────

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

/// Quiet oscillation flushed to the lower band: a ranging BUY.
fn ranging_buy() -> Vec<Bar> {
    let wave = [100.0, 101.0, 102.0, 101.0];
    let mut closes: Vec<f64> = (0..249).map(|i| wave[i % 4]).collect();
    closes.push(95.0);
    bars_from_closes(&closes)
}

/// Mirror image of [`ranging_buy`]: a ranging SELL.
fn ranging_sell() -> Vec<Bar> {
    let wave = [102.0, 101.0, 100.0, 101.0];
    let mut closes: Vec<f64> = (0..249).map(|i| wave[i % 4]).collect();
    closes.push(107.0);
    bars_from_closes(&closes)
}

struct FixedProvider(Vec<Bar>);

impl MarketDataProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    fn fetch(&self, _symbol: &str, _range: &str, _interval: &str) -> Result<Vec<Bar>, DataError> {
        Ok(self.0.clone())
    }
}

/// Serves each series once, then keeps repeating the last one.
struct SeqProvider(Mutex<VecDeque<Vec<Bar>>>);

impl SeqProvider {
    fn new(series: Vec<Vec<Bar>>) -> Self {
        Self(Mutex::new(series.into()))
    }
}

impl MarketDataProvider for SeqProvider {
    fn name(&self) -> &str {
        "sequence"
    }

    fn fetch(&self, _symbol: &str, _range: &str, _interval: &str) -> Result<Vec<Bar>, DataError> {
        let mut queue = self.0.lock().unwrap();
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap())
        } else {
            Ok(queue.front().cloned().unwrap_or_default())
        }
    }
}

struct FailingProvider;

impl MarketDataProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    fn fetch(&self, _symbol: &str, _range: &str, _interval: &str) -> Result<Vec<Bar>, DataError> {
        Err(DataError::NetworkUnreachable("offline".into()))
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier(Arc<Mutex<Vec<SignalAlert>>>);

impl Notifier for RecordingNotifier {
    fn notify(&self, alert: &SignalAlert) {
        self.0.lock().unwrap().push(alert.clone());
    }
}

#[derive(Clone, Default)]
struct RecordingSink(Arc<Mutex<Vec<(String, SignalDecision)>>>);

impl DecisionSink for RecordingSink {
    fn publish(&self, symbol: &str, decision: &SignalDecision) {
        self.0.lock().unwrap().push((symbol.to_string(), decision.clone()));
    }
}

fn config(trading_enabled: bool) -> AppConfig {
    let mut config = AppConfig::default();
    config.scanner.symbol = "SPY".into();
    config.scanner.poll_interval_secs = 0;
    config.trading.trading_enabled = trading_enabled;
    config
}

fn scanner(
    config: AppConfig,
    provider: impl MarketDataProvider + 'static,
) -> (Scanner<PaperBroker>, RecordingNotifier, RecordingSink) {
    let notifier = RecordingNotifier::default();
    let sink = RecordingSink::default();
    let scanner = Scanner::new(
        config,
        Box::new(provider),
        PaperBroker::new(10_000.0),
        Box::new(notifier.clone()),
        Box::new(sink.clone()),
    );
    (scanner, notifier, sink)
}

// ── Decision and alerts ──────────────────────────────────────────────

#[test]
fn tick_publishes_decision_and_alerts() {
    let (mut scanner, notifier, sink) = scanner(config(false), FixedProvider(ranging_buy()));
    let outcome = scanner.tick(Utc::now()).unwrap();

    let decision = outcome.decision.unwrap();
    assert_eq!(decision.signal, Signal::Buy);
    assert_eq!(decision.regime, Regime::Ranging);
    assert!(outcome.notified);
    assert_eq!(outcome.blocked, Some(GateBlock::TradingDisabled));
    assert!(scanner.broker().orders().is_empty());

    let alerts = notifier.0.lock().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].symbol, "SPY");
    assert_eq!(alerts[0].price, 95.0);
    assert_eq!(sink.0.lock().unwrap().len(), 1);
}

#[test]
fn repeated_signal_at_same_price_alerts_once() {
    let (mut scanner, notifier, _) = scanner(config(false), FixedProvider(ranging_buy()));
    assert!(scanner.tick(Utc::now()).unwrap().notified);
    assert!(!scanner.tick(Utc::now()).unwrap().notified);
    assert_eq!(notifier.0.lock().unwrap().len(), 1);
}

#[test]
fn disabled_notifications_stay_silent() {
    let mut cfg = config(false);
    cfg.notify.enabled = false;
    let (mut scanner, notifier, _) = scanner(cfg, FixedProvider(ranging_buy()));
    assert!(!scanner.tick(Utc::now()).unwrap().notified);
    assert!(notifier.0.lock().unwrap().is_empty());
}

#[test]
fn empty_feed_skips_cycle() {
    let (mut scanner, _, sink) = scanner(config(true), FixedProvider(Vec::new()));
    let outcome = scanner.tick(Utc::now()).unwrap();
    assert!(outcome.decision.is_none());
    assert!(sink.0.lock().unwrap().is_empty());
}

#[test]
fn feed_error_surfaces_as_scan_error() {
    let (mut scanner, _, _) = scanner(config(true), FailingProvider);
    let err = scanner.tick(Utc::now()).unwrap_err();
    assert!(matches!(err, ScanError::Data(DataError::NetworkUnreachable(_))));
}

// ── Execution gate ───────────────────────────────────────────────────

#[test]
fn buy_submits_bracket_and_enters_long() {
    let (mut scanner, _, _) = scanner(config(true), FixedProvider(ranging_buy()));
    let now = Utc::now();
    let outcome = scanner.tick(now).unwrap();

    let ack = outcome.order.unwrap();
    assert_eq!(ack.symbol, "SPY");
    assert_eq!(ack.order_id, "paper-1");

    let orders = scanner.broker().orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert!(orders[0].stop_loss < 95.0 && orders[0].take_profit > 95.0);
    assert_eq!(orders[0].quantity.fract(), 0.0);

    assert_eq!(scanner.state().tracker.state(), TradeState::Long);
    assert_eq!(scanner.state().last_trade_at, Some(now));
    assert_eq!(scanner.state().session_equity, Some(10_000.0));
}

#[test]
fn cooldown_then_open_position_block_reentry() {
    let (mut scanner, _, _) = scanner(config(true), FixedProvider(ranging_buy()));
    let now = Utc::now();
    assert!(scanner.tick(now).unwrap().order.is_some());

    let soon = scanner.tick(now + Duration::minutes(5)).unwrap();
    assert_eq!(soon.blocked, Some(GateBlock::Cooldown));

    let later = scanner.tick(now + Duration::hours(2)).unwrap();
    assert_eq!(later.blocked, Some(GateBlock::InPosition));
    assert_eq!(scanner.broker().orders().len(), 1);
}

#[test]
fn sell_requires_short_enabled() {
    let (mut long_only, _, _) = scanner(config(true), FixedProvider(ranging_sell()));
    let outcome = long_only.tick(Utc::now()).unwrap();
    assert_eq!(outcome.decision.unwrap().signal, Signal::Sell);
    assert_eq!(outcome.blocked, Some(GateBlock::ShortDisabled));

    let mut cfg = config(true);
    cfg.trading.short_enabled = true;
    let (mut both_ways, _, _) = scanner(cfg, FixedProvider(ranging_sell()));
    let outcome = both_ways.tick(Utc::now()).unwrap();
    assert!(outcome.order.is_some());
    assert_eq!(both_ways.broker().orders()[0].side, OrderSide::Sell);
    assert_eq!(both_ways.state().tracker.state(), TradeState::Short);
}

#[test]
fn unavailable_account_skips_entry() {
    let (mut scanner, _, _) = scanner(config(true), FixedProvider(ranging_buy()));
    scanner.broker_mut().set_offline(true);
    let outcome = scanner.tick(Utc::now()).unwrap();
    assert_eq!(outcome.blocked, Some(GateBlock::AccountUnavailable));
    assert_eq!(scanner.state().tracker.state(), TradeState::Flat);
}

#[test]
fn daily_loss_guard_survives_symbol_switch() {
    let (mut scanner, _, _) = scanner(config(true), FixedProvider(ranging_buy()));
    assert!(scanner.tick(Utc::now()).unwrap().order.is_some());

    scanner.set_symbol("QQQ");
    assert_eq!(scanner.state().symbol, "QQQ");
    assert_eq!(scanner.state().tracker.state(), TradeState::Flat);
    assert!(scanner.state().last_trade_at.is_none());
    assert_eq!(scanner.state().session_equity, Some(10_000.0));

    scanner.broker_mut().set_equity(9_000.0);
    let outcome = scanner.tick(Utc::now()).unwrap();
    assert_eq!(outcome.blocked, Some(GateBlock::DailyLossLimit));
    assert_eq!(scanner.broker().orders().len(), 1);
}

#[test]
fn exit_cycle_settles_and_never_reenters() {
    let mut cfg = config(true);
    cfg.trading.short_enabled = true;
    cfg.scanner.trade_cooldown_secs = 1;
    let provider = SeqProvider::new(vec![ranging_buy(), ranging_sell()]);
    let (mut scanner, _, _) = scanner(cfg, provider);
    let now = Utc::now();

    assert!(scanner.tick(now).unwrap().order.is_some());
    assert!(scanner.broker().account().unwrap().buying_power < 10_000.0);

    // The rally to 107 hits the long's target while the bar itself reads SELL.
    let exit_tick = scanner.tick(now + Duration::hours(2)).unwrap();
    assert_eq!(exit_tick.decision.as_ref().unwrap().signal, Signal::Sell);
    let exit = exit_tick.exit.unwrap();
    assert_eq!(exit.reason, ExitReason::TakeProfit);
    assert!(exit_tick.order.is_none());
    assert!(exit_tick.blocked.is_none());
    assert_eq!(scanner.state().tracker.state(), TradeState::Flat);
    assert_eq!(scanner.broker().orders().len(), 1);

    let account = scanner.broker().account().unwrap();
    assert!((account.buying_power - (10_000.0 + exit.pnl())).abs() < 1e-6);
    assert_eq!(scanner.broker().open_positions(), 0);

    let next = scanner.tick(now + Duration::hours(3)).unwrap();
    assert!(next.order.is_some());
    assert_eq!(scanner.state().tracker.state(), TradeState::Short);
}

#[test]
fn unrepresentable_cooldown_blocks_without_panicking() {
    let mut cfg = config(true);
    cfg.scanner.trade_cooldown_secs = u64::MAX;
    let (mut scanner, _, _) = scanner(cfg, FixedProvider(ranging_buy()));
    let now = Utc::now();
    assert!(scanner.tick(now).unwrap().order.is_some());

    let much_later = scanner.tick(now + Duration::days(3650)).unwrap();
    assert_eq!(much_later.blocked, Some(GateBlock::Cooldown));
}

// ── Emergency exit ───────────────────────────────────────────────────

#[test]
fn emergency_exit_flattens_broker_and_tracker() {
    let (mut scanner, _, _) = scanner(config(true), FixedProvider(ranging_buy()));
    assert!(scanner.tick(Utc::now()).unwrap().order.is_some());
    assert_eq!(scanner.broker().open_positions(), 1);

    let undone = scanner.emergency_exit().unwrap();
    assert_eq!(undone, EmergencyExit { cancelled: 2, closed: 1 });
    assert_eq!(scanner.state().tracker.state(), TradeState::Flat);
    assert_eq!(scanner.broker().open_positions(), 0);
    assert_eq!(scanner.broker().account().unwrap().buying_power, 10_000.0);

    assert_eq!(scanner.emergency_exit().unwrap(), EmergencyExit::default());
}

#[test]
fn emergency_exit_goes_flat_even_when_broker_is_down() {
    let (mut scanner, _, _) = scanner(config(true), FixedProvider(ranging_buy()));
    assert!(scanner.tick(Utc::now()).unwrap().order.is_some());
    scanner.broker_mut().set_offline(true);

    let err = scanner.emergency_exit().unwrap_err();
    assert!(matches!(err, ScanError::Broker(_)));
    assert_eq!(scanner.state().tracker.state(), TradeState::Flat);
}

// ── Run loop ─────────────────────────────────────────────────────────

#[test]
fn run_stops_after_max_ticks() {
    let (mut scanner, _, sink) = scanner(config(false), FixedProvider(ranging_buy()));
    let shutdown = AtomicBool::new(false);
    assert_eq!(scanner.run(&shutdown, Some(3)), 3);
    assert_eq!(sink.0.lock().unwrap().len(), 3);
}

#[test]
fn run_survives_failing_cycles() {
    let (mut scanner, _, _) = scanner(config(false), FailingProvider);
    let shutdown = AtomicBool::new(false);
    assert_eq!(scanner.run(&shutdown, Some(2)), 2);
}

#[test]
fn run_honours_shutdown_flag() {
    let (mut scanner, _, _) = scanner(config(false), FixedProvider(ranging_buy()));
    let shutdown = AtomicBool::new(true);
    assert_eq!(scanner.run(&shutdown, None), 0);
}
