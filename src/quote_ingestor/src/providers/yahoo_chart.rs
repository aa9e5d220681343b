//! Yahoo Finance v8 chart API: daily OHLCV history per ticker.

pub mod provider;
pub mod response;

pub use provider::YahooChartProvider;
