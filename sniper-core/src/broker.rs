//! Brokerage seam: account figures in, bracket orders out, positions settled
//! or flattened.
//!
//! [`PaperBroker`] keeps an in-memory account and records every bracket it
//! accepts; it backs dry runs and tests. It fills entries immediately, so an
//! accepted bracket is an open position whose stop and target legs are the
//! working orders.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::Instrument;
use crate::orders::{BracketOrder, OrderError, OrderSide};
use crate::position::{ExitEvent, TradeState};

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("order for {symbol} rejected: {reason}")]
    Rejected { symbol: String, reason: String },

    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Account figures used for sizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub equity: f64,
    /// Cash usable without margin.
    pub buying_power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub symbol: String,
    pub quantity: f64,
}

pub trait Broker: Send {
    fn account(&self) -> Result<AccountSnapshot, BrokerError>;

    fn submit_bracket(&mut self, order: &BracketOrder) -> Result<OrderAck, BrokerError>;

    /// A bracket leg closed `exit.position` on the broker side.
    ///
    /// Live brokers settle on their own; simulated ones release the capital.
    fn settle(&mut self, _symbol: &str, _exit: &ExitEvent) -> Result<(), BrokerError> {
        Ok(())
    }

    /// Cancel every working order. Returns how many were cancelled.
    fn cancel_all(&mut self) -> Result<usize, BrokerError>;

    /// Liquidate every open position. Returns how many were closed.
    fn close_all(&mut self) -> Result<usize, BrokerError>;

    /// Broker name for logging
    fn name(&self) -> &str;
}

/// An accepted bracket that has not been settled yet.
#[derive(Debug, Clone)]
struct PaperPosition {
    order: BracketOrder,
    /// Stop and target legs still live.
    protected: bool,
}

impl PaperPosition {
    fn notional(&self) -> f64 {
        self.order.quantity * self.order.entry_price
    }

    fn matches(&self, symbol: &str, side: TradeState) -> bool {
        let order_side = match side {
            TradeState::Short => OrderSide::Sell,
            _ => OrderSide::Buy,
        };
        self.order.side == order_side
            && Instrument::from_symbol(&self.order.symbol).trading_symbol()
                == Instrument::from_symbol(symbol).trading_symbol()
    }
}

#[derive(Debug, Clone)]
pub struct PaperBroker {
    account: AccountSnapshot,
    orders: Vec<BracketOrder>,
    open: Vec<PaperPosition>,
    offline: bool,
}

impl PaperBroker {
    pub fn new(equity: f64) -> Self {
        Self {
            account: AccountSnapshot {
                equity,
                buying_power: equity,
            },
            orders: Vec::new(),
            open: Vec::new(),
            offline: false,
        }
    }

    pub fn with_account(account: AccountSnapshot) -> Self {
        Self {
            account,
            orders: Vec::new(),
            open: Vec::new(),
            offline: false,
        }
    }

    pub fn set_equity(&mut self, equity: f64) {
        self.account.equity = equity;
    }

    /// Make every call fail with [`BrokerError::Unavailable`].
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Every bracket ever accepted, settled or not.
    pub fn orders(&self) -> &[BracketOrder] {
        &self.orders
    }

    pub fn open_positions(&self) -> usize {
        self.open.len()
    }

    fn ensure_online(&self) -> Result<(), BrokerError> {
        if self.offline {
            return Err(BrokerError::Unavailable("paper broker offline".into()));
        }
        Ok(())
    }
}

impl Broker for PaperBroker {
    fn account(&self) -> Result<AccountSnapshot, BrokerError> {
        self.ensure_online()?;
        Ok(self.account)
    }

    fn submit_bracket(&mut self, order: &BracketOrder) -> Result<OrderAck, BrokerError> {
        self.ensure_online()?;
        let notional = order.quantity * order.entry_price;
        if notional > self.account.buying_power {
            return Err(BrokerError::Rejected {
                symbol: order.symbol.clone(),
                reason: format!(
                    "notional {notional:.2} exceeds buying power {:.2}",
                    self.account.buying_power
                ),
            });
        }

        self.account.buying_power -= notional;
        self.orders.push(order.clone());
        self.open.push(PaperPosition {
            order: order.clone(),
            protected: true,
        });
        let ack = OrderAck {
            order_id: format!("paper-{}", self.orders.len()),
            symbol: order.symbol.clone(),
            quantity: order.quantity,
        };
        info!(
            order_id = %ack.order_id,
            symbol = %order.symbol,
            side = ?order.side,
            qty = order.quantity,
            stop = order.stop_loss,
            target = order.take_profit,
            "paper bracket accepted"
        );
        Ok(ack)
    }

    /// Release the entry notional plus the realized P&L.
    fn settle(&mut self, symbol: &str, exit: &ExitEvent) -> Result<(), BrokerError> {
        self.ensure_online()?;
        let idx = self
            .open
            .iter()
            .position(|p| p.matches(symbol, exit.position.side))
            .ok_or_else(|| BrokerError::Rejected {
                symbol: symbol.to_string(),
                reason: "no open paper position to settle".into(),
            })?;
        let position = self.open.remove(idx);
        let pnl = exit.pnl();
        self.account.buying_power += position.notional() + pnl;
        self.account.equity += pnl;
        info!(symbol, pnl, buying_power = self.account.buying_power, "paper position settled");
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<usize, BrokerError> {
        self.ensure_online()?;
        let mut cancelled = 0;
        for position in self.open.iter_mut().filter(|p| p.protected) {
            position.protected = false;
            cancelled += 2;
        }
        Ok(cancelled)
    }

    /// Flatten at the entry price; the paper account has no live quote.
    fn close_all(&mut self) -> Result<usize, BrokerError> {
        self.ensure_online()?;
        let closed = self.open.len();
        for position in self.open.drain(..) {
            self.account.buying_power += position.notional();
        }
        Ok(closed)
    }

    fn name(&self) -> &str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{BracketOrderBuilder, OrderSide};
    use crate::position::{ExitReason, OpenPosition};

    fn order(qty: f64) -> BracketOrder {
        BracketOrderBuilder::new("SPY", OrderSide::Buy, qty)
            .with_stop_loss(96.0)
            .with_take_profit(106.0)
            .build(100.0)
            .unwrap()
    }

    #[test]
    fn accepts_and_records_orders() {
        let mut broker = PaperBroker::new(10_000.0);
        let ack = broker.submit_bracket(&order(10.0)).unwrap();
        assert_eq!(ack.order_id, "paper-1");
        assert_eq!(broker.orders().len(), 1);
        assert_eq!(broker.account().unwrap().buying_power, 9_000.0);
        assert_eq!(broker.account().unwrap().equity, 10_000.0);
    }

    #[test]
    fn rejects_orders_beyond_buying_power() {
        let mut broker = PaperBroker::new(500.0);
        let err = broker.submit_bracket(&order(10.0)).unwrap_err();
        assert!(matches!(err, BrokerError::Rejected { .. }));
        assert!(broker.orders().is_empty());
    }

    #[test]
    fn offline_broker_fails() {
        let mut broker = PaperBroker::new(10_000.0);
        broker.set_offline(true);
        assert!(matches!(broker.account(), Err(BrokerError::Unavailable(_))));
        assert!(broker.submit_bracket(&order(1.0)).is_err());
    }

    fn long_exit(qty: f64, exit_price: f64) -> ExitEvent {
        ExitEvent {
            position: OpenPosition {
                side: TradeState::Long,
                entry_price: 100.0,
                stop_loss: 96.0,
                take_profit: 106.0,
                quantity: qty,
                opened_at: None,
            },
            exit_price,
            reason: ExitReason::TakeProfit,
            closed_at: None,
        }
    }

    #[test]
    fn settle_restores_notional_plus_pnl() {
        let mut broker = PaperBroker::new(10_000.0);
        broker.submit_bracket(&order(10.0)).unwrap();
        broker.settle("SPY", &long_exit(10.0, 106.0)).unwrap();

        let account = broker.account().unwrap();
        assert_eq!(account.buying_power, 10_060.0);
        assert_eq!(account.equity, 10_060.0);
        assert_eq!(broker.open_positions(), 0);
        assert_eq!(broker.orders().len(), 1);
    }

    #[test]
    fn settle_matches_crypto_by_trading_symbol() {
        let mut broker = PaperBroker::new(10_000.0);
        let btc = BracketOrderBuilder::new("BTC", OrderSide::Buy, 0.1)
            .with_stop_loss(96.0)
            .with_take_profit(106.0)
            .build(100.0)
            .unwrap();
        broker.submit_bracket(&btc).unwrap();
        broker.settle("BTC", &long_exit(0.1, 96.0)).unwrap();
        assert_eq!(broker.open_positions(), 0);
        assert!((broker.account().unwrap().buying_power - 9_999.6).abs() < 1e-9);
    }

    #[test]
    fn settle_without_position_is_rejected() {
        let mut broker = PaperBroker::new(10_000.0);
        let err = broker.settle("SPY", &long_exit(1.0, 106.0)).unwrap_err();
        assert!(matches!(err, BrokerError::Rejected { .. }));
    }

    #[test]
    fn cancel_then_close_flattens_everything() {
        let mut broker = PaperBroker::new(10_000.0);
        broker.submit_bracket(&order(10.0)).unwrap();
        broker.submit_bracket(&order(20.0)).unwrap();
        assert_eq!(broker.account().unwrap().buying_power, 7_000.0);

        assert_eq!(broker.cancel_all().unwrap(), 4);
        assert_eq!(broker.cancel_all().unwrap(), 0);
        assert_eq!(broker.close_all().unwrap(), 2);
        assert_eq!(broker.open_positions(), 0);
        assert_eq!(broker.account().unwrap().buying_power, 10_000.0);
        assert_eq!(broker.close_all().unwrap(), 0);
    }

    #[test]
    fn emergency_calls_fail_offline() {
        let mut broker = PaperBroker::new(10_000.0);
        broker.set_offline(true);
        assert!(broker.cancel_all().is_err());
        assert!(broker.close_all().is_err());
    }
}
