use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current market figures for one asset, as reported by a real-time provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeQuote {
    pub price: f64,
    pub market_cap: Option<f64>,
    /// 24h traded volume.
    pub volume: Option<f64>,
    /// 24h change, in percent.
    pub change_24h: Option<f64>,
    pub source: String,
}

/// A [`RealtimeQuote`] stamped with the moment it was collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeSample {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub quote: RealtimeQuote,
}

impl RealtimeSample {
    pub fn new(timestamp: DateTime<Utc>, quote: RealtimeQuote) -> Self {
        Self { timestamp, quote }
    }
}

/// A single intraday price observation from a market chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Price in the configured quote currency. The column keeps the
    /// `price_usd` name the bronze tables were built on.
    #[serde(rename = "price_usd")]
    pub price: f64,
}
