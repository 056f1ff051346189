//! Market data access: provider trait, chart feed, circuit breaker.

pub mod circuit_breaker;
pub mod provider;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use provider::{parse_span, DataError, DataSource, MarketDataProvider};
pub use yahoo::YahooProvider;
