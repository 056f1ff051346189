//! Yahoo Finance chart feed.
//!
//! Pulls intraday OHLCV bars from the unofficial v8 chart endpoint by
//! `range` and `interval`. Crypto base tickers are requested as `<BASE>-USD`.
//! A 403 opens the shared [`CircuitBreaker`]; 429s and 5xx count toward it.
//! The payload format is undocumented and can change without notice.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, MarketDataProvider};
use crate::domain::{Bar, Instrument};

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Top level of the v8 chart payload.
#[derive(Debug, Deserialize)]
struct Envelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<Series>>,
    #[serde(default)]
    error: Option<FeedError>,
}

#[derive(Debug, Deserialize)]
struct FeedError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct Series {
    /// Absent when the market was closed for the whole range.
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: SeriesIndicators,
}

#[derive(Debug, Deserialize)]
struct SeriesIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

/// Column-oriented OHLCV; Yahoo pads gaps with `null`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Quote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

impl Quote {
    /// Row `i` as a bar, or `None` if any column has a hole there.
    fn row(&self, i: usize, timestamp: DateTime<Utc>) -> Option<Bar> {
        let at = |col: &[Option<f64>]| col.get(i).copied().flatten();
        Some(Bar::new(
            timestamp,
            at(&self.open)?,
            at(&self.high)?,
            at(&self.low)?,
            at(&self.close)?,
            at(&self.volume)?,
        ))
    }
}

/// Result of a single HTTP round trip.
enum Attempt {
    Done(Vec<Bar>),
    /// Worth another try after backoff.
    Retry(DataError),
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    breaker: Arc<CircuitBreaker>,
    retries: u32,
    backoff: Duration,
}

impl YahooProvider {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) sniper/0.1")
            .build()
            .map_err(|e| DataError::Other(format!("http client: {e}")))?;

        Ok(Self {
            client,
            breaker,
            retries: 2,
            backoff: Duration::from_millis(500),
        })
    }

    fn chart_url(symbol: &str, range: &str, interval: &str) -> String {
        let feed_symbol = Instrument::from_symbol(symbol).feed_symbol();
        format!("{BASE_URL}/{feed_symbol}?interval={interval}&range={range}&includePrePost=false")
    }

    /// Turn a decoded payload into bars, skipping rows with holes.
    fn parse_response(symbol: &str, envelope: Envelope) -> Result<Vec<Bar>, DataError> {
        let Chart { result, error } = envelope.chart;
        let series = match (result.and_then(|r| r.into_iter().next()), error) {
            (Some(series), _) => series,
            (None, Some(e)) if e.code == "Not Found" => {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
            }
            (None, Some(e)) => {
                return Err(DataError::ResponseFormatChanged(format!(
                    "{}: {}",
                    e.code, e.description
                )))
            }
            (None, None) => {
                return Err(DataError::ResponseFormatChanged("chart has no result".into()))
            }
        };

        let quote = series.indicators.quote.into_iter().next().unwrap_or_default();
        let mut bars = Vec::with_capacity(series.timestamp.len());
        for (i, &secs) in series.timestamp.iter().enumerate() {
            let ts = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("timestamp out of range: {secs}"))
            })?;
            bars.extend(quote.row(i, ts));
        }

        let skipped = series.timestamp.len() - bars.len();
        if skipped > 0 {
            debug!(symbol, skipped, "skipped chart rows with gaps");
        }
        Ok(bars)
    }

    /// One request. Terminal failures come back as `Err`.
    fn attempt(&self, symbol: &str, url: &str) -> Result<Attempt, DataError> {
        let resp = match self.client.get(url).send() {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Ok(Attempt::Retry(DataError::NetworkUnreachable(e.to_string())))
            }
            Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
        };

        match resp.status() {
            StatusCode::FORBIDDEN => {
                warn!(symbol, "chart feed refused the request, opening breaker");
                self.breaker.trip();
                Err(DataError::CircuitBreakerTripped)
            }
            StatusCode::NOT_FOUND => Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }),
            StatusCode::TOO_MANY_REQUESTS => {
                self.breaker.record_failure();
                let retry_after_secs = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()?.parse().ok())
                    .unwrap_or(60);
                Ok(Attempt::Retry(DataError::RateLimited { retry_after_secs }))
            }
            status if !status.is_success() => {
                self.breaker.record_failure();
                Ok(Attempt::Retry(DataError::Other(format!("HTTP {status} for {symbol}"))))
            }
            _ => {
                let envelope: Envelope = resp.json().map_err(|e| {
                    DataError::ResponseFormatChanged(format!("undecodable chart for {symbol}: {e}"))
                })?;
                let bars = Self::parse_response(symbol, envelope)?;
                self.breaker.record_success();
                Ok(Attempt::Done(bars))
            }
        }
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    /// Retries transient failures with doubling backoff while the breaker
    /// stays closed.
    fn fetch(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<Bar>, DataError> {
        let url = Self::chart_url(symbol, range, interval);
        let mut delay = self.backoff;
        let mut last = DataError::Other("no attempt made".into());

        for attempt in 0..=self.retries {
            if !self.breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }
            match self.attempt(symbol, &url)? {
                Attempt::Done(bars) => return Ok(bars),
                Attempt::Retry(e) => {
                    debug!(symbol, attempt, error = %e, "chart request failed");
                    last = e;
                }
            }
            if attempt < self.retries {
                std::thread::sleep(delay);
                delay *= 2;
            }
        }
        Err(last)
    }

    fn is_available(&self) -> bool {
        self.breaker.is_allowed()
    }
}
