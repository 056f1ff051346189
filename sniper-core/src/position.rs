//! Trade direction state machine.
//!
//! `FLAT → LONG → FLAT` or `FLAT → SHORT → FLAT`. A position opens only on
//! an actionable decision while flat and closes when price crosses its
//! locked target or stop. Entry signals are ignored while a position is open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signals::{Signal, SignalDecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeState {
    #[default]
    Flat,
    Long,
    Short,
}

impl TradeState {
    pub fn is_flat(&self) -> bool {
        matches!(self, TradeState::Flat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

/// Levels locked in when a position opens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub side: TradeState,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub quantity: f64,
    pub opened_at: Option<DateTime<Utc>>,
}

impl OpenPosition {
    /// Profit per unit at `price`, positive when the position is in the money.
    pub fn unit_pnl(&self, price: f64) -> f64 {
        match self.side {
            TradeState::Long => price - self.entry_price,
            TradeState::Short => self.entry_price - price,
            TradeState::Flat => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitEvent {
    pub position: OpenPosition,
    pub exit_price: f64,
    pub reason: ExitReason,
    pub closed_at: Option<DateTime<Utc>>,
}

impl ExitEvent {
    pub fn pnl(&self) -> f64 {
        self.position.unit_pnl(self.exit_price) * self.position.quantity
    }

    pub fn is_win(&self) -> bool {
        self.reason == ExitReason::TakeProfit
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionTracker {
    open: Option<OpenPosition>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TradeState {
        self.open.map(|p| p.side).unwrap_or(TradeState::Flat)
    }

    pub fn position(&self) -> Option<&OpenPosition> {
        self.open.as_ref()
    }

    /// Open a position from a BUY/SELL decision.
    ///
    /// Returns the opened position, or `None` when already in a position or
    /// the decision is not actionable.
    pub fn on_decision(
        &mut self,
        decision: &SignalDecision,
        quantity: f64,
    ) -> Option<OpenPosition> {
        if self.open.is_some() {
            return None;
        }
        let side = match decision.signal {
            Signal::Buy => TradeState::Long,
            Signal::Sell => TradeState::Short,
            Signal::Hold => return None,
        };
        let position = OpenPosition {
            side,
            entry_price: decision.entry_price,
            stop_loss: decision.stop_loss,
            take_profit: decision.take_profit,
            quantity,
            opened_at: decision.timestamp,
        };
        self.open = Some(position);
        Some(position)
    }

    /// Check the open position against `price`, closing it on a target or
    /// stop cross.
    pub fn on_price(&mut self, price: f64, at: Option<DateTime<Utc>>) -> Option<ExitEvent> {
        let position = self.open?;
        let reason = match position.side {
            TradeState::Long if price >= position.take_profit => ExitReason::TakeProfit,
            TradeState::Long if price <= position.stop_loss => ExitReason::StopLoss,
            TradeState::Short if price <= position.take_profit => ExitReason::TakeProfit,
            TradeState::Short if price >= position.stop_loss => ExitReason::StopLoss,
            _ => return None,
        };
        self.open = None;
        Some(ExitEvent {
            position,
            exit_price: price,
            reason,
            closed_at: at,
        })
    }

    /// Drop any open position without an exit event.
    pub fn reset(&mut self) {
        self.open = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{Regime, SignalDecision};

    fn decision(signal: Signal, entry: f64, stop: f64, target: f64) -> SignalDecision {
        let mut d = SignalDecision::waiting();
        d.signal = signal;
        d.regime = Regime::Trending;
        d.entry_price = entry;
        d.stop_loss = stop;
        d.take_profit = target;
        d
    }

    #[test]
    fn starts_flat() {
        let tracker = PositionTracker::new();
        assert_eq!(tracker.state(), TradeState::Flat);
        assert!(tracker.position().is_none());
    }

    #[test]
    fn hold_does_not_open() {
        let mut tracker = PositionTracker::new();
        assert!(tracker
            .on_decision(&decision(Signal::Hold, 100.0, 0.0, 0.0), 1.0)
            .is_none());
        assert_eq!(tracker.state(), TradeState::Flat);
    }

    #[test]
    fn long_take_profit() {
        let mut tracker = PositionTracker::new();
        tracker.on_decision(&decision(Signal::Buy, 100.0, 96.0, 106.0), 2.0);
        assert_eq!(tracker.state(), TradeState::Long);

        assert!(tracker.on_price(105.9, None).is_none());
        let exit = tracker.on_price(106.0, None).unwrap();
        assert_eq!(exit.reason, ExitReason::TakeProfit);
        assert!((exit.pnl() - 12.0).abs() < 1e-9);
        assert!(exit.is_win());
        assert_eq!(tracker.state(), TradeState::Flat);
    }

    #[test]
    fn long_stop_loss() {
        let mut tracker = PositionTracker::new();
        tracker.on_decision(&decision(Signal::Buy, 100.0, 96.0, 106.0), 1.0);
        let exit = tracker.on_price(95.0, None).unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
        assert!((exit.pnl() + 5.0).abs() < 1e-9);
    }

    #[test]
    fn short_exits_mirror_long() {
        let mut tracker = PositionTracker::new();
        tracker.on_decision(&decision(Signal::Sell, 100.0, 104.0, 94.0), 1.0);
        assert_eq!(tracker.state(), TradeState::Short);
        assert!(tracker.on_price(99.0, None).is_none());
        let exit = tracker.on_price(94.0, None).unwrap();
        assert_eq!(exit.reason, ExitReason::TakeProfit);
        assert!((exit.pnl() - 6.0).abs() < 1e-9);

        tracker.on_decision(&decision(Signal::Sell, 100.0, 104.0, 94.0), 1.0);
        let exit = tracker.on_price(104.5, None).unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
    }

    #[test]
    fn entries_ignored_while_in_position() {
        let mut tracker = PositionTracker::new();
        tracker.on_decision(&decision(Signal::Buy, 100.0, 96.0, 106.0), 1.0);
        assert!(tracker
            .on_decision(&decision(Signal::Sell, 101.0, 105.0, 95.0), 1.0)
            .is_none());
        let position = tracker.position().unwrap();
        assert_eq!(position.side, TradeState::Long);
        assert_eq!(position.entry_price, 100.0);
    }

    #[test]
    fn no_exit_when_flat() {
        let mut tracker = PositionTracker::new();
        assert!(tracker.on_price(1.0, None).is_none());
    }
}
