use serde::{Deserialize, Serialize};

/// Crypto base tickers the data feed and broker treat as `<BASE>/USD` pairs.
pub const CRYPTO_BASES: &[&str] = &[
    "BTC", "ETH", "SOL", "XRP", "DOGE", "ADA", "AVAX", "DOT", "LTC", "LINK",
];

/// Quote-currency suffixes that mark a symbol as a crypto pair.
const CRYPTO_QUOTE_SUFFIXES: &[&str] = &["/USD", "-USD", "/USDT", "-USDT", "USDT", "USDC"];

/// Fractional lot precision for crypto quantities.
pub const CRYPTO_QTY_DECIMALS: u32 = 4;

/// Price tick used for stops, targets and minimum risk distance.
pub const PRICE_TICK: f64 = 0.01;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetClass {
    Equity,
    Crypto,
}

/// Instrument metadata derived from the ticker convention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub asset_class: AssetClass,
}

impl Instrument {
    /// Classify a symbol: quote suffix (`BTC/USD`, `ETH-USD`, `SOLUSDT`) or a
    /// bare crypto base ticker means crypto, everything else is an equity.
    pub fn from_symbol(symbol: &str) -> Self {
        let upper = symbol.trim().to_uppercase();
        let is_crypto = CRYPTO_QUOTE_SUFFIXES
            .iter()
            .any(|suffix| upper.ends_with(suffix) && upper.len() > suffix.len())
            || CRYPTO_BASES.contains(&upper.as_str());
        Self {
            symbol: upper,
            asset_class: if is_crypto {
                AssetClass::Crypto
            } else {
                AssetClass::Equity
            },
        }
    }

    pub fn is_fractional(&self) -> bool {
        self.asset_class == AssetClass::Crypto
    }

    /// Base ticker without quote suffix (`BTC/USD` → `BTC`).
    pub fn base(&self) -> &str {
        for suffix in CRYPTO_QUOTE_SUFFIXES {
            if let Some(base) = self.symbol.strip_suffix(suffix) {
                if !base.is_empty() {
                    return base;
                }
            }
        }
        &self.symbol
    }

    /// Symbol in the form the broker expects (`BTC` → `BTC/USD`).
    pub fn trading_symbol(&self) -> String {
        match self.asset_class {
            AssetClass::Crypto => format!("{}/USD", self.base()),
            AssetClass::Equity => self.symbol.clone(),
        }
    }

    /// Symbol in the form the chart feed expects (`BTC` → `BTC-USD`).
    pub fn feed_symbol(&self) -> String {
        match self.asset_class {
            AssetClass::Crypto => format!("{}-USD", self.base()),
            AssetClass::Equity => self.symbol.clone(),
        }
    }

    /// Round a quantity toward zero to the instrument's lot precision.
    ///
    /// Crypto keeps 4 decimals, equities trade whole units. Rounding toward
    /// zero keeps the result within any cap the raw quantity respected.
    pub fn format_quantity(&self, qty: f64) -> f64 {
        if !qty.is_finite() || qty <= 0.0 {
            return 0.0;
        }
        match self.asset_class {
            AssetClass::Equity => qty.trunc(),
            AssetClass::Crypto => {
                let scale = 10f64.powi(CRYPTO_QTY_DECIMALS as i32);
                // 1e-9 absorbs representation error such as 9.4999999999 → 9.5
                ((qty * scale) + 1e-9).floor() / scale
            }
        }
    }
}

/// Round a price to two decimals (cents).
pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_crypto_by_suffix_and_base() {
        assert!(Instrument::from_symbol("BTC/USD").is_fractional());
        assert!(Instrument::from_symbol("eth-usd").is_fractional());
        assert!(Instrument::from_symbol("SOLUSDT").is_fractional());
        assert!(Instrument::from_symbol("BTC").is_fractional());
        assert!(!Instrument::from_symbol("TSLA").is_fractional());
        assert!(!Instrument::from_symbol("USDT").is_fractional());
    }

    #[test]
    fn symbol_forms() {
        let btc = Instrument::from_symbol("btc");
        assert_eq!(btc.trading_symbol(), "BTC/USD");
        assert_eq!(btc.feed_symbol(), "BTC-USD");
        let pair = Instrument::from_symbol("ETH/USD");
        assert_eq!(pair.base(), "ETH");
        assert_eq!(pair.trading_symbol(), "ETH/USD");
        let spy = Instrument::from_symbol("SPY");
        assert_eq!(spy.trading_symbol(), "SPY");
        assert_eq!(spy.feed_symbol(), "SPY");
    }

    #[test]
    fn quantity_formatting() {
        let spy = Instrument::from_symbol("SPY");
        assert_eq!(spy.format_quantity(9.99), 9.0);
        assert_eq!(spy.format_quantity(0.7), 0.0);

        let btc = Instrument::from_symbol("BTC/USD");
        assert_eq!(btc.format_quantity(0.123456), 0.1234);
        assert_eq!(btc.format_quantity(9.5), 9.5);
        assert_eq!(btc.format_quantity(f64::NAN), 0.0);
        assert_eq!(btc.format_quantity(-1.0), 0.0);
    }

    #[test]
    fn price_rounding() {
        assert_eq!(round_price(100.126), 100.13);
        assert_eq!(round_price(100.124), 100.12);
    }
}
