//! Domain types for Sniper

pub mod bar;
pub mod instrument;

pub use bar::{Bar, BarSeries, SeriesError};
pub use instrument::{round_price, AssetClass, Instrument, CRYPTO_BASES, PRICE_TICK};
