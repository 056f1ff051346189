//! Polling scanner: fetch, enrich, decide, alert, and optionally trade.
//!
//! All mutable scanner memory lives in [`ScannerState`]: the active symbol,
//! the last trade time, the alert filter, the session equity baseline and the
//! trade direction. One [`Scanner::tick`] is one polling cycle; a failed
//! cycle is logged by [`Scanner::run`] and the loop carries on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use sniper_core::broker::{Broker, BrokerError, OrderAck};
use sniper_core::data::{DataError, MarketDataProvider};
use sniper_core::orders::{BracketOrderBuilder, OrderSide};
use sniper_core::position::ExitEvent;
use sniper_core::{
    enrich, PositionSizer, PositionTracker, Signal, SignalDecision, SignalEngine, SizingRequest,
    TradeState,
};

use crate::config::AppConfig;
use crate::notify::{NotifyFilter, Notifier, SignalAlert};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

/// Receives every decision the scanner makes, e.g. for a dashboard.
pub trait DecisionSink: Send {
    fn publish(&self, symbol: &str, decision: &SignalDecision);
}

/// Logs decisions at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DecisionSink for LogSink {
    fn publish(&self, symbol: &str, decision: &SignalDecision) {
        debug!(
            symbol,
            signal = %decision.signal,
            regime = %decision.regime,
            confluence = decision.confluence,
            rsi = decision.rsi,
            adx = decision.adx,
            "decision"
        );
    }
}

/// Why an actionable decision did not become an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateBlock {
    TradingDisabled,
    Cooldown,
    ShortDisabled,
    InPosition,
    AccountUnavailable,
    DailyLossLimit,
    SizeRejected,
}

/// What one polling cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// `None` when the fetch returned no bars.
    pub decision: Option<SignalDecision>,
    pub notified: bool,
    pub exit: Option<ExitEvent>,
    pub order: Option<OrderAck>,
    pub blocked: Option<GateBlock>,
}

/// What [`Scanner::emergency_exit`] undid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmergencyExit {
    pub cancelled: usize,
    pub closed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScannerState {
    pub symbol: String,
    pub last_trade_at: Option<DateTime<Utc>>,
    pub notify: NotifyFilter,
    /// Equity at the first successful account read of the session.
    pub session_equity: Option<f64>,
    pub tracker: PositionTracker,
}

impl ScannerState {
    pub fn new(symbol: &str, price_move_pct: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            last_trade_at: None,
            notify: NotifyFilter::new(price_move_pct),
            session_equity: None,
            tracker: PositionTracker::new(),
        }
    }
}

pub struct Scanner<B: Broker> {
    config: AppConfig,
    engine: SignalEngine,
    sizer: PositionSizer,
    provider: Box<dyn MarketDataProvider>,
    broker: B,
    notifier: Box<dyn Notifier>,
    sink: Box<dyn DecisionSink>,
    state: ScannerState,
}

impl<B: Broker> Scanner<B> {
    pub fn new(
        config: AppConfig,
        provider: Box<dyn MarketDataProvider>,
        broker: B,
        notifier: Box<dyn Notifier>,
        sink: Box<dyn DecisionSink>,
    ) -> Self {
        let state = ScannerState::new(&config.scanner.symbol, config.notify.price_move_pct);
        Self {
            engine: SignalEngine::new(config.signal.clone()),
            sizer: PositionSizer::default(),
            config,
            provider,
            broker,
            notifier,
            sink,
            state,
        }
    }

    pub fn state(&self) -> &ScannerState {
        &self.state
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    /// Switch the active symbol, clearing everything tied to the old one.
    ///
    /// The session equity baseline is account-wide and survives the switch.
    pub fn set_symbol(&mut self, symbol: &str) {
        if symbol == self.state.symbol {
            return;
        }
        info!(from = %self.state.symbol, to = symbol, "switching symbol");
        let baseline = self.state.session_equity;
        self.state = ScannerState::new(symbol, self.config.notify.price_move_pct);
        self.state.session_equity = baseline;
    }

    /// One polling cycle at wall-clock time `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, ScanError> {
        let symbol = self.state.symbol.clone();
        let sc = &self.config.scanner;
        let bars = self.provider.fetch(&symbol, &sc.range, &sc.interval)?;
        if bars.is_empty() {
            debug!(symbol = %symbol, "no bars, skipping cycle");
            return Ok(TickOutcome::default());
        }

        let enriched = enrich(&bars, &self.config.indicators);
        let decision = self.engine.evaluate(&enriched);
        self.sink.publish(&symbol, &decision);

        let mut outcome = TickOutcome {
            decision: Some(decision.clone()),
            ..TickOutcome::default()
        };

        if let Some(last) = bars.last() {
            if let Some(exit) = self.state.tracker.on_price(last.close, Some(last.timestamp)) {
                info!(
                    symbol = %symbol,
                    side = ?exit.position.side,
                    reason = ?exit.reason,
                    entry = exit.position.entry_price,
                    exit = exit.exit_price,
                    pnl = exit.pnl(),
                    "position closed"
                );
                if let Err(e) = self.broker.settle(&symbol, &exit) {
                    warn!(symbol = %symbol, broker = self.broker.name(), error = %e, "settlement failed");
                }
                outcome.exit = Some(exit);
            }
        }

        if self.config.notify.enabled && self.state.notify.should_notify(&decision) {
            self.notifier.notify(&SignalAlert::from_decision(&symbol, &decision));
            outcome.notified = true;
        }

        // A cycle that closed a position never opens one, same as the backtest.
        if outcome.exit.is_some() {
            return Ok(outcome);
        }

        if decision.is_actionable() {
            match self.execute(&symbol, &decision, now)? {
                Ok(ack) => outcome.order = Some(ack),
                Err(block) => {
                    debug!(symbol = %symbol, ?block, "entry blocked");
                    outcome.blocked = Some(block);
                }
            }
        }

        Ok(outcome)
    }

    /// Run the execution gate and submit a bracket if it passes.
    ///
    /// The outer `Result` carries broker submission failures; the inner one
    /// says which gate stopped the entry.
    fn execute(
        &mut self,
        symbol: &str,
        decision: &SignalDecision,
        now: DateTime<Utc>,
    ) -> Result<Result<OrderAck, GateBlock>, ScanError> {
        let trading = &self.config.trading;
        if !trading.trading_enabled {
            return Ok(Err(GateBlock::TradingDisabled));
        }
        if let Some(last) = self.state.last_trade_at {
            let cooldown = i64::try_from(self.config.scanner.trade_cooldown_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds);
            // An unrepresentable cooldown never elapses.
            if cooldown.map_or(true, |cooldown| now - last < cooldown) {
                return Ok(Err(GateBlock::Cooldown));
            }
        }
        if decision.signal == Signal::Sell && !trading.short_enabled {
            return Ok(Err(GateBlock::ShortDisabled));
        }
        if self.state.tracker.state() != TradeState::Flat {
            return Ok(Err(GateBlock::InPosition));
        }

        let account = match self.broker.account() {
            Ok(account) => account,
            Err(e) => {
                warn!(symbol, broker = self.broker.name(), error = %e, "account unavailable, skipping entry");
                return Ok(Err(GateBlock::AccountUnavailable));
            }
        };
        let baseline = *self.state.session_equity.get_or_insert(account.equity);
        if baseline > 0.0 {
            let drawdown_pct = (baseline - account.equity) / baseline * 100.0;
            if drawdown_pct > trading.max_daily_loss {
                warn!(symbol, drawdown_pct, limit = trading.max_daily_loss, "daily loss limit reached");
                return Ok(Err(GateBlock::DailyLossLimit));
            }
        }

        let sizing = self.sizer.size(&SizingRequest {
            symbol,
            entry: decision.entry_price,
            stop: decision.stop_loss,
            equity: account.equity,
            available_capital: account.buying_power,
            risk_pct: trading.risk_per_trade,
        });
        if !sizing.success {
            info!(symbol, reason = ?sizing.skip_reason, "sizing skipped entry");
            return Ok(Err(GateBlock::SizeRejected));
        }

        let side = match decision.signal {
            Signal::Sell => OrderSide::Sell,
            _ => OrderSide::Buy,
        };
        let order = BracketOrderBuilder::new(symbol, side, sizing.quantity)
            .with_stop_loss(decision.stop_loss)
            .with_take_profit(decision.take_profit)
            .build(decision.entry_price)
            .map_err(BrokerError::from)?;
        let ack = self.broker.submit_bracket(&order)?;

        self.state.last_trade_at = Some(now);
        self.state.tracker.on_decision(decision, sizing.quantity);
        info!(
            symbol,
            order_id = %ack.order_id,
            signal = %decision.signal,
            qty = sizing.quantity,
            entry = decision.entry_price,
            "entry submitted"
        );
        Ok(Ok(ack))
    }

    /// Cancel every working order, liquidate every position and go flat.
    ///
    /// The tracker is reset even when a broker call fails.
    pub fn emergency_exit(&mut self) -> Result<EmergencyExit, ScanError> {
        self.state.tracker.reset();
        let cancelled = self.broker.cancel_all()?;
        let closed = self.broker.close_all()?;
        warn!(
            symbol = %self.state.symbol,
            broker = self.broker.name(),
            cancelled,
            closed,
            "emergency exit: portfolio liquidated"
        );
        Ok(EmergencyExit { cancelled, closed })
    }

    /// Poll until `shutdown` is set or `max_ticks` cycles have run.
    ///
    /// Returns the number of cycles executed.
    pub fn run(&mut self, shutdown: &AtomicBool, max_ticks: Option<usize>) -> usize {
        let interval = Duration::from_secs(self.config.scanner.poll_interval_secs);
        let mut ticks = 0;
        info!(
            symbol = %self.state.symbol,
            interval_secs = interval.as_secs(),
            trading = self.config.trading.trading_enabled,
            "scanner started"
        );

        while !shutdown.load(Ordering::Relaxed) {
            if let Err(e) = self.tick(Utc::now()) {
                warn!(symbol = %self.state.symbol, error = %e, "scan cycle failed");
            }
            ticks += 1;
            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
            std::thread::sleep(interval);
        }

        info!(ticks, "scanner stopped");
        ticks
    }
}
