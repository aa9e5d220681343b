//! CoinGecko v3 REST: batched spot prices and intraday market charts.

pub mod params;
pub mod provider;
pub mod response;

pub use params::ApiTier;
pub use provider::{CoinGeckoConfig, CoinGeckoProvider};
