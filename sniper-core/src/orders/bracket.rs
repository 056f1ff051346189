use serde::{Deserialize, Serialize};

use super::{OrderError, OrderSide};
use crate::domain::{round_price, AssetClass, Instrument, PRICE_TICK};

/// Stop-limit offset for crypto stops, as a fraction of the stop price.
pub const CRYPTO_STOP_LIMIT_OFFSET: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit { limit_price: f64 },
    Stop { stop_price: f64 },
    StopLimit { stop_price: f64, limit_price: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
    Gtc,
}

/// One order a broker would receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLeg {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
}

/// Market entry with protective stop and take-profit.
///
/// Prices are cents-rounded and kept at least one tick away from the entry
/// on the correct side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketOrder {
    /// Broker-facing symbol (`BTC/USD` for crypto).
    pub symbol: String,
    pub asset_class: AssetClass,
    pub side: OrderSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl BracketOrder {
    /// Equities go out as one native bracket; crypto venues need the three
    /// legs submitted separately.
    pub fn is_native(&self) -> bool {
        self.asset_class == AssetClass::Equity
    }

    /// Orders in submission order: entry, stop, target.
    pub fn legs(&self) -> Vec<OrderLeg> {
        let exit_side = self.side.opposite();
        let (tif, stop_type) = match self.asset_class {
            AssetClass::Equity => (
                TimeInForce::Day,
                OrderType::Stop {
                    stop_price: self.stop_loss,
                },
            ),
            AssetClass::Crypto => {
                let factor = match self.side {
                    OrderSide::Buy => 1.0 - CRYPTO_STOP_LIMIT_OFFSET,
                    OrderSide::Sell => 1.0 + CRYPTO_STOP_LIMIT_OFFSET,
                };
                (
                    TimeInForce::Gtc,
                    OrderType::StopLimit {
                        stop_price: self.stop_loss,
                        limit_price: round_price(self.stop_loss * factor),
                    },
                )
            }
        };

        let leg = |side, order_type| OrderLeg {
            symbol: self.symbol.clone(),
            side,
            quantity: self.quantity,
            order_type,
            time_in_force: tif,
        };
        vec![
            leg(self.side, OrderType::Market),
            leg(exit_side, stop_type),
            leg(
                exit_side,
                OrderType::Limit {
                    limit_price: self.take_profit,
                },
            ),
        ]
    }
}

/// Bracket order builder
pub struct BracketOrderBuilder {
    instrument: Instrument,
    side: OrderSide,
    quantity: f64,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
}

impl BracketOrderBuilder {
    pub fn new(symbol: &str, side: OrderSide, quantity: f64) -> Self {
        Self {
            instrument: Instrument::from_symbol(symbol),
            side,
            quantity,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn with_stop_loss(mut self, stop_price: f64) -> Self {
        self.stop_loss = Some(stop_price);
        self
    }

    pub fn with_take_profit(mut self, target_price: f64) -> Self {
        self.take_profit = Some(target_price);
        self
    }

    /// Apply the minimum-spread buffers around `entry_price` and build.
    pub fn build(self, entry_price: f64) -> Result<BracketOrder, OrderError> {
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(OrderError::InvalidQuantity(self.quantity));
        }
        if !(entry_price.is_finite() && entry_price > 0.0) {
            return Err(OrderError::InvalidPrice(entry_price));
        }
        let symbol = self.instrument.trading_symbol();
        let stop = self
            .stop_loss
            .ok_or_else(|| OrderError::MissingLeg(symbol.clone(), "stop-loss"))?;
        let target = self
            .take_profit
            .ok_or_else(|| OrderError::MissingLeg(symbol.clone(), "take-profit"))?;

        let (stop_loss, take_profit) = match self.side {
            OrderSide::Buy => (
                round_price((entry_price - PRICE_TICK).min(stop)),
                round_price((entry_price + PRICE_TICK).max(target)),
            ),
            OrderSide::Sell => (
                round_price((entry_price + PRICE_TICK).max(stop)),
                round_price((entry_price - PRICE_TICK).min(target)),
            ),
        };

        Ok(BracketOrder {
            symbol,
            asset_class: self.instrument.asset_class,
            side: self.side,
            quantity: self.quantity,
            entry_price,
            stop_loss,
            take_profit,
        })
    }
}
