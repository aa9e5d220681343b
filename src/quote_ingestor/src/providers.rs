//! Provider abstraction for crypto quote sources.
//!
//! Two traits split the upstreams by what they serve:
//!
//! - [`HistoricalProvider`] returns the daily OHLCV history of one asset
//!   (implemented by [`yahoo_chart::YahooChartProvider`]).
//! - [`RealtimeProvider`] returns current prices for a whole asset set in one
//!   batched call, plus intraday market charts (implemented by
//!   [`coingecko::CoinGeckoProvider`]).
//!
//! Both traits are async and object safe, so callers hold them as
//! `Arc<dyn HistoricalProvider>` / `Arc<dyn RealtimeProvider>` and tests can
//! swap in stubs.
//!
//! Providers never retry on their own. A throttled request surfaces as
//! [`ProviderError::RateLimited`]; the caller decides whether to wait and try
//! again through [`retry::RateLimitRetry`].
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use chrono::NaiveDate;
//! use quote_ingestor::models::{asset::Asset, historical::HistoricalRecord};
//! use quote_ingestor::providers::{HistoricalProvider, ProviderError};
//!
//! struct NoHistory;
//!
//! #[async_trait]
//! impl HistoricalProvider for NoHistory {
//!     fn name(&self) -> &str {
//!         "none"
//!     }
//!
//!     async fn fetch_historical(
//!         &self,
//!         _asset: &Asset,
//!         _start: NaiveDate,
//!         _end: NaiveDate,
//!     ) -> Result<Vec<HistoricalRecord>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod coingecko;
pub mod retry;
pub mod yahoo_chart;

use async_trait::async_trait;
use chrono::NaiveDate;
use indexmap::IndexMap;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{
    asset::Asset,
    historical::HistoricalRecord,
    realtime::{PricePoint, RealtimeQuote},
};

/// Source of daily historical quotes.
#[async_trait]
pub trait HistoricalProvider: Send + Sync {
    /// Human-readable source name written into document metadata
    /// (e.g. "Yahoo Finance").
    fn name(&self) -> &str;

    /// Fetches daily records for `asset` between `start` and `end` (both inclusive).
    ///
    /// # Returns
    ///
    /// * `Ok(records)` - Possibly empty; an empty vector means the provider has
    ///   no data for the range, which is not an error.
    /// * `Err(ProviderError)` - Transport, HTTP or decoding failure.
    async fn fetch_historical(
        &self,
        asset: &Asset,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>, ProviderError>;
}

/// Source of current prices and intraday charts.
#[async_trait]
pub trait RealtimeProvider: Send + Sync {
    /// Human-readable source name written into document metadata
    /// (e.g. "CoinGecko API").
    fn name(&self) -> &str;

    /// Fetches current quotes for every asset in `assets` with a single request.
    ///
    /// The returned map is keyed by [`Asset::id`]. Assets the provider omitted
    /// from its response are simply absent.
    async fn fetch_realtime(
        &self,
        assets: &[Asset],
    ) -> Result<IndexMap<String, RealtimeQuote>, ProviderError>;

    /// Fetches the intraday price chart covering the last `days` days.
    async fn fetch_market_chart(
        &self,
        asset: &Asset,
        days: u32,
    ) -> Result<Vec<PricePoint>, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a provider implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider answered with a non-success status.
    #[snafu(display("API error (HTTP {status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The provider signalled throttling (HTTP 429).
    #[snafu(display("Rate limited by provider (retry-after: {retry_after:?}s)"))]
    RateLimited {
        retry_after: Option<u64>,
        backtrace: Backtrace,
    },

    /// Still throttled after the automatic retries were used up.
    #[snafu(display("Still rate limited after {attempts} attempts"))]
    RateLimitExhausted { attempts: u32, backtrace: Backtrace },

    /// The response body did not have the expected shape.
    #[snafu(display("Unexpected response format: {message}"))]
    Decode {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// Reads the `Retry-After` header as whole seconds, if present.
pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;

    struct EmptyHistory;
    struct FixedPrice;

    #[async_trait]
    impl HistoricalProvider for EmptyHistory {
        fn name(&self) -> &str {
            "empty"
        }

        async fn fetch_historical(
            &self,
            _asset: &Asset,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<HistoricalRecord>, ProviderError> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl RealtimeProvider for FixedPrice {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch_realtime(
            &self,
            assets: &[Asset],
        ) -> Result<IndexMap<String, RealtimeQuote>, ProviderError> {
            Ok(assets
                .iter()
                .map(|a| {
                    let quote = RealtimeQuote {
                        price: 1.0,
                        market_cap: None,
                        volume: None,
                        change_24h: None,
                        source: "fixed".into(),
                    };
                    (a.id.clone(), quote)
                })
                .collect())
        }

        async fn fetch_market_chart(
            &self,
            _asset: &Asset,
            _days: u32,
        ) -> Result<Vec<PricePoint>, ProviderError> {
            Ok(vec![PricePoint {
                timestamp: Utc::now(),
                price: 1.0,
            }])
        }
    }

    #[tokio::test]
    async fn providers_work_behind_trait_objects() {
        let historical: Arc<dyn HistoricalProvider> = Arc::new(EmptyHistory);
        let realtime: Arc<dyn RealtimeProvider> = Arc::new(FixedPrice);
        let btc = Asset::new("bitcoin", "BTC-USD", NaiveDate::from_ymd_opt(2014, 1, 1).unwrap());

        let rows = historical
            .fetch_historical(&btc, btc.start_date, Utc::now().date_naive())
            .await
            .unwrap();
        assert!(rows.is_empty());

        let quotes = realtime.fetch_realtime(std::slice::from_ref(&btc)).await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes["bitcoin"].price, 1.0);
    }

    #[test]
    fn only_throttling_counts_as_rate_limited() {
        assert!(RateLimitedSnafu { retry_after: Some(30u64) }.build().is_rate_limited());
        assert!(!ApiSnafu { status: 500u16, message: "boom" }.build().is_rate_limited());
        assert!(!RateLimitExhaustedSnafu { attempts: 2u32 }.build().is_rate_limited());
    }

    #[test]
    fn retry_after_header_parses_seconds_only() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), None);

        headers.insert(reqwest::header::RETRY_AFTER, "45".parse().unwrap());
        assert_eq!(retry_after_secs(&headers), Some(45));

        headers.insert(
            reqwest::header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(retry_after_secs(&headers), None);
    }
}
