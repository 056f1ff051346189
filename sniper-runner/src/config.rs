//! Serializable application configuration.
//!
//! Every section is optional in the TOML file; missing fields fall back to
//! their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sniper_core::data::parse_span;
use sniper_core::{IndicatorConfig, SignalConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Longest accepted trade cooldown: one year.
pub const MAX_COOLDOWN_SECS: u64 = 365 * 24 * 60 * 60;

/// Polling loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub symbol: String,
    pub poll_interval_secs: u64,
    /// Minimum time between two submitted trades.
    pub trade_cooldown_secs: u64,
    /// Chart range requested per poll, e.g. `5d`.
    pub range: String,
    /// Bar interval, e.g. `5m`.
    pub interval: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC".into(),
            poll_interval_secs: 3,
            trade_cooldown_secs: 3600,
            range: "5d".into(),
            interval: "5m".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub trading_enabled: bool,
    pub short_enabled: bool,
    /// Percent of equity risked per trade.
    pub risk_per_trade: f64,
    /// Percent drawdown from the session baseline that halts new entries.
    pub max_daily_loss: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            trading_enabled: false,
            short_enabled: false,
            risk_per_trade: 1.0,
            max_daily_loss: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    /// A repeated signal alerts again once price moves this many percent.
    pub price_move_pct: f64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            price_move_pct: 0.1,
        }
    }
}

/// Top-level configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub trading: TradingConfig,
    pub notify: NotifyConfig,
    pub indicators: IndicatorConfig,
    pub signal: SignalConfig,
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, window) in self.indicators.windows() {
            if window == 0 {
                return invalid(format!("indicators.{name} must be positive"));
            }
        }
        if !(self.indicators.bb_std_mult > 0.0) {
            return invalid("indicators.bb_std_mult must be positive");
        }

        let s = &self.signal;
        if s.adx_ranging > s.adx_trending {
            return invalid(format!(
                "signal.adx_ranging ({}) must not exceed signal.adx_trending ({})",
                s.adx_ranging, s.adx_trending
            ));
        }
        if s.min_bars < 2 {
            return invalid("signal.min_bars must be at least 2");
        }
        if s.trend_threshold <= 0 {
            return invalid("signal.trend_threshold must be positive");
        }
        if !(s.stop_atr_mult > 0.0 && s.target_atr_mult > 0.0) {
            return invalid("signal ATR multipliers must be positive");
        }

        let t = &self.trading;
        if !(t.risk_per_trade > 0.0 && t.risk_per_trade <= 100.0) {
            return invalid(format!(
                "trading.risk_per_trade must be in (0, 100], got {}",
                t.risk_per_trade
            ));
        }
        if !(t.max_daily_loss > 0.0 && t.max_daily_loss <= 100.0) {
            return invalid(format!(
                "trading.max_daily_loss must be in (0, 100], got {}",
                t.max_daily_loss
            ));
        }

        if !(self.notify.price_move_pct >= 0.0) {
            return invalid("notify.price_move_pct must not be negative");
        }

        let sc = &self.scanner;
        if sc.symbol.trim().is_empty() {
            return invalid("scanner.symbol must not be empty");
        }
        if sc.poll_interval_secs == 0 {
            return invalid("scanner.poll_interval_secs must be positive");
        }
        if sc.trade_cooldown_secs > MAX_COOLDOWN_SECS {
            return invalid(format!(
                "scanner.trade_cooldown_secs must be at most {MAX_COOLDOWN_SECS}, got {}",
                sc.trade_cooldown_secs
            ));
        }
        for (name, span) in [("range", &sc.range), ("interval", &sc.interval)] {
            if parse_span(span).is_none() {
                return invalid(format!("scanner.{name} '{span}' is not a valid span"));
            }
        }
        Ok(())
    }

    /// BLAKE3 fingerprint of the canonical JSON form.
    ///
    /// Two configs with identical values hash identically regardless of the
    /// TOML layout they were loaded from.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

fn invalid<T>(msg: impl Into<String>) -> Result<T, ConfigError> {
    Err(ConfigError::Invalid(msg.into()))
}
