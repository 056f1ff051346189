//! Order types submitted to a broker.
//!
//! Only bracket entries are modelled: a market entry plus protective stop
//! and take-profit legs.

pub mod bracket;

pub use bracket::{BracketOrder, BracketOrderBuilder, OrderLeg, OrderType, TimeInForce};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("order quantity must be positive, got {0}")]
    InvalidQuantity(f64),

    #[error("reference price must be positive, got {0}")]
    InvalidPrice(f64),

    #[error("bracket for {0} is missing its {1} leg")]
    MissingLeg(String, &'static str),
}
