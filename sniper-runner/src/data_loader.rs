//! Bar loading and data resolution for the runner.
//!
//! Resolves a symbol to bars through one of three providers:
//! 1. `--csv <file>` → [`CsvProvider`]
//! 2. `--synthetic` → [`SyntheticProvider`] (tagged, never traded live)
//! 3. Otherwise → the Yahoo chart feed behind a circuit breaker
//!
//! Synthetic data is a developer-only mode for offline runs and tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use sniper_core::data::{
    parse_span, CircuitBreaker, DataError, DataSource, MarketDataProvider, YahooProvider,
};
use sniper_core::{Bar, BarSeries};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        source: csv::Error,
    },

    #[error("{path} line {line}: {reason}")]
    InvalidRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("no bars available for '{symbol}'")]
    Empty { symbol: String },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Options controlling where bars come from.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Read bars from this CSV file instead of the network.
    pub csv: Option<PathBuf>,
    /// Generate a deterministic random walk instead of fetching.
    pub synthetic: bool,
}

impl LoadOptions {
    pub fn source(&self) -> DataSource {
        if self.csv.is_some() {
            DataSource::CsvImport
        } else if self.synthetic {
            DataSource::Synthetic
        } else {
            DataSource::YahooFinance
        }
    }
}

/// Result of loading bars, including data source provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub source: DataSource,
    /// Dataset hash for fingerprinting (BLAKE3 over all bar data).
    pub dataset_hash: String,
}

/// Build the provider selected by `opts`.
pub fn provider_for(opts: &LoadOptions) -> Result<Box<dyn MarketDataProvider>, LoadError> {
    if let Some(path) = &opts.csv {
        return Ok(Box::new(CsvProvider::new(path)));
    }
    if opts.synthetic {
        return Ok(Box::new(SyntheticProvider));
    }
    let breaker = Arc::new(CircuitBreaker::default());
    Ok(Box::new(YahooProvider::new(breaker)?))
}

/// Load bars for one symbol.
///
/// This is the primary entry point for the backtest and `signal` commands.
pub fn load_bars(
    symbol: &str,
    range: &str,
    interval: &str,
    opts: &LoadOptions,
) -> Result<LoadedData, LoadError> {
    let source = opts.source();
    if source == DataSource::Synthetic {
        warn!(symbol, "generating synthetic data, results are tagged as synthetic");
    }
    let provider = provider_for(opts)?;
    let bars = provider.fetch(symbol, range, interval)?;
    if bars.is_empty() {
        return Err(LoadError::Empty {
            symbol: symbol.to_string(),
        });
    }
    debug!(symbol, provider = provider.name(), bars = bars.len(), "loaded bars");

    let dataset_hash = compute_dataset_hash(symbol, &bars);
    Ok(LoadedData {
        symbol: symbol.to_string(),
        bars,
        source,
        dataset_hash,
    })
}

/// Compute a deterministic BLAKE3 hash over a symbol's bars.
pub fn compute_dataset_hash(symbol: &str, bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

// ─── CSV ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Reads `timestamp,open,high,low,close,volume` files.
///
/// Timestamps may be RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or Unix seconds.
/// The whole file is loaded; `range` trims it to the trailing window ending at
/// the last bar.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every bar in the file, sorted and de-duplicated.
    pub fn load(&self) -> Result<Vec<Bar>, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|source| LoadError::Csv {
                path: self.path.clone(),
                source,
            })?;

        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row.map_err(|source| LoadError::Csv {
                path: self.path.clone(),
                source,
            })?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::InvalidRow {
                path: self.path.clone(),
                line: bars.len() as u64 + 2,
                reason: format!("unrecognised timestamp '{}'", row.timestamp),
            })?;
            bars.push(Bar::new(timestamp, row.open, row.high, row.low, row.close, row.volume));
        }

        let read = bars.len();
        let series = BarSeries::from_unsorted(bars);
        if series.len() < read {
            debug!(path = %self.path.display(), dropped = read - series.len(), "dropped duplicate or invalid rows");
        }
        Ok(series.into_bars())
    }
}

impl MarketDataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, _symbol: &str, range: &str, _interval: &str) -> Result<Vec<Bar>, DataError> {
        let bars = self.load().map_err(|e| DataError::Other(e.to_string()))?;
        let span = parse_span(range)
            .ok_or_else(|| DataError::InvalidRequest(format!("invalid range '{range}'")))?;
        let Some(last) = bars.last() else {
            return Ok(bars);
        };
        let cutoff = last.timestamp - span;
        Ok(bars.into_iter().filter(|b| b.timestamp > cutoff).collect())
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

// ─── Synthetic ──────────────────────────────────────────────────────

/// Longest synthetic series generated for one request.
pub const MAX_SYNTHETIC_BARS: usize = 5_000;

/// Deterministic random walk seeded from the symbol name.
///
/// Produces `range / interval` bars starting at 100.0. These are clearly fake
/// and tagged as synthetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticProvider;

impl MarketDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<Bar>, DataError> {
        let (Some(range_span), Some(step)) = (parse_span(range), parse_span(interval)) else {
            return Err(DataError::InvalidRequest(format!(
                "invalid range/interval '{range}'/'{interval}'"
            )));
        };
        let step_secs = step.num_seconds();
        if step_secs <= 0 {
            return Err(DataError::InvalidRequest(format!("invalid interval '{interval}'")));
        }
        let n = (range_span.num_seconds() / step_secs).clamp(1, MAX_SYNTHETIC_BARS as i64) as usize;
        Ok(generate_synthetic_bars(symbol, n, step))
    }
}

/// Generate `n` synthetic bars spaced `step` apart.
pub fn generate_synthetic_bars(symbol: &str, n: usize, step: chrono::Duration) -> Vec<Bar> {
    // Deterministic seed from symbol name
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let start = DateTime::from_timestamp(1_704_205_800, 0).unwrap_or_default();
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0_f64;

    for i in 0..n {
        let ret: f64 = rng.gen_range(-0.01..0.01);
        let open = price;
        let close = price * (1.0 + ret);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.003));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.003));
        let volume = rng.gen_range(500.0..5_000.0);

        bars.push(Bar::new(start + step * i as i32, open, high, low, close, volume));
        price = close;
    }

    bars
}
