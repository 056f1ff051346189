//! Market data provider trait and structured error types.
//!
//! The scanner and CLI only see [`MarketDataProvider`]; the chart feed, CSV
//! files and the synthetic generator all sit behind it so they can be swapped
//! and mocked in tests.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Bar;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    CsvImport,
    Synthetic,
}

/// Source of OHLCV bars for a symbol.
///
/// `range` is the lookback window (`5d`, `1mo`) and `interval` the bar size
/// (`5m`, `1h`), in the chart feed's notation. Bars come back in ascending
/// timestamp order.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn fetch(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<Bar>, DataError>;

    /// Whether the provider currently accepts requests.
    fn is_available(&self) -> bool {
        true
    }
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<Bar>, DataError> {
        (**self).fetch(symbol, range, interval)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Parse a span such as `5m`, `1h`, `5d`, `1wk`, `3mo` or `2y`.
///
/// Months count as 30 days and years as 365. Returns `None` for anything
/// else, including the feed's open-ended `ytd` and `max` ranges and counts
/// too large to represent.
pub fn parse_span(span: &str) -> Option<Duration> {
    let span = span.trim().to_ascii_lowercase();
    let split = span.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = span.split_at(split);
    let n: i64 = digits.parse().ok().filter(|n| *n > 0)?;
    match unit {
        "m" => Duration::try_minutes(n),
        "h" => Duration::try_hours(n),
        "d" => Duration::try_days(n),
        "wk" => Duration::try_weeks(n),
        "mo" => Duration::try_days(n.checked_mul(30)?),
        "y" => Duration::try_days(n.checked_mul(365)?),
        _ => None,
    }
}
