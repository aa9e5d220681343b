use std::{num::NonZeroU32, time::Duration};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use indexmap::IndexMap;
use nonzero_ext::nonzero;
use reqwest::{Client, Response, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use shared_utils::env::get_env_var;
use snafu::ResultExt;

use crate::{
    models::{
        asset::Asset,
        realtime::{PricePoint, RealtimeQuote},
    },
    providers::{
        ApiSnafu, ClientBuildSnafu, DecodeSnafu, InvalidApiKeySnafu, MissingEnvVarSnafu,
        ProviderError, ProviderInitError, RateLimitedSnafu, RealtimeProvider, ReqwestSnafu,
        ValidationSnafu,
        coingecko::{
            params::{ApiTier, market_chart_params, simple_price_params},
            response::{MarketChartResponse, SimplePriceResponse, quote_from_fields},
        },
        retry_after_secs,
    },
};

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "COINGECKO_API_KEY";

/// Tag stored on every quote this provider produces.
pub const SOURCE_TAG: &str = "coingecko";

#[derive(Clone, Debug)]
pub struct CoinGeckoConfig {
    pub tier: ApiTier,
    /// Quote currency, e.g. `usd`.
    pub vs_currency: String,
    /// Client-side pacing; the demo plan allows roughly 30 calls per minute.
    pub requests_per_minute: NonZeroU32,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            tier: ApiTier::Demo,
            vs_currency: "usd".to_string(),
            requests_per_minute: nonzero!(30u32),
        }
    }
}

pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
    vs_currency: String,
    limiter: DefaultDirectRateLimiter,
    _api_key: SecretString,
}

impl CoinGeckoProvider {
    /// Creates a new CoinGecko provider.
    ///
    /// Reads the API key from the `COINGECKO_API_KEY` environment variable.
    pub fn new(config: CoinGeckoConfig) -> Result<Self, ProviderInitError> {
        let api_key =
            SecretString::new(get_env_var(API_KEY_VAR).context(MissingEnvVarSnafu)?.into());
        Self::with_api_key(config, api_key)
    }

    /// Creates a provider with an explicitly supplied key.
    pub fn with_api_key(
        config: CoinGeckoConfig,
        api_key: SecretString,
    ) -> Result<Self, ProviderInitError> {
        let mut key_value =
            header::HeaderValue::from_str(api_key.expose_secret()).context(InvalidApiKeySnafu)?;
        key_value.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(config.tier.key_header(), key_value);
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: config.tier.base_url().to_string(),
            vs_currency: config.vs_currency.to_lowercase(),
            limiter: RateLimiter::direct(Quota::per_minute(config.requests_per_minute)),
            _api_key: api_key,
        })
    }

    /// Points the provider at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, ProviderError> {
        self.limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let response = check_status(response).await?;
        let body = response.bytes().await.context(ReqwestSnafu)?;
        serde_json::from_slice(&body).map_err(|e| {
            DecodeSnafu {
                message: format!("{path}: {e}"),
            }
            .build()
        })
    }
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return RateLimitedSnafu {
            retry_after: retry_after_secs(response.headers()),
        }
        .fail();
    }
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown API error".to_string());
        return ApiSnafu {
            status: status.as_u16(),
            message,
        }
        .fail();
    }
    Ok(response)
}

#[async_trait]
impl RealtimeProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        "CoinGecko API"
    }

    async fn fetch_realtime(
        &self,
        assets: &[Asset],
    ) -> Result<IndexMap<String, RealtimeQuote>, ProviderError> {
        if assets.is_empty() {
            return Ok(IndexMap::new());
        }

        let body: SimplePriceResponse = self
            .get_json("/simple/price", &simple_price_params(assets, &self.vs_currency))
            .await?;

        // keep the caller's asset order
        let mut quotes = IndexMap::with_capacity(assets.len());
        for asset in assets {
            match body
                .get(&asset.id)
                .and_then(|fields| quote_from_fields(fields, &self.vs_currency, SOURCE_TAG))
            {
                Some(quote) => {
                    quotes.insert(asset.id.clone(), quote);
                }
                None => tracing::debug!(asset = %asset.id, "no price in response"),
            }
        }
        Ok(quotes)
    }

    async fn fetch_market_chart(
        &self,
        asset: &Asset,
        days: u32,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        if days == 0 {
            return ValidationSnafu {
                message: "market chart needs at least one day",
            }
            .fail();
        }

        let path = format!("/coins/{}/market_chart", asset.id);
        let body: MarketChartResponse = self
            .get_json(&path, &market_chart_params(&self.vs_currency, days))
            .await?;
        Ok(body.into_points())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn provider(tier: ApiTier) -> CoinGeckoProvider {
        let config = CoinGeckoConfig {
            tier,
            ..CoinGeckoConfig::default()
        };
        CoinGeckoProvider::with_api_key(config, SecretString::new("test-key".into())).unwrap()
    }

    #[test]
    fn tier_selects_base_url() {
        assert_eq!(provider(ApiTier::Demo).base_url, ApiTier::Demo.base_url());
        assert_eq!(provider(ApiTier::Pro).base_url, ApiTier::Pro.base_url());
    }

    #[test]
    fn rejects_key_with_control_characters() {
        let result = CoinGeckoProvider::with_api_key(
            CoinGeckoConfig::default(),
            SecretString::new("bad\nkey".into()),
        );
        assert!(matches!(result, Err(ProviderInitError::InvalidApiKey { .. })));
    }

    #[tokio::test]
    async fn empty_asset_set_makes_no_request() {
        // unroutable base url: a request would fail
        let provider = provider(ApiTier::Demo).with_base_url("http://127.0.0.1:9");
        let quotes = provider.fetch_realtime(&[]).await.unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn zero_day_chart_is_rejected() {
        let provider = provider(ApiTier::Demo);
        let btc = Asset::new("bitcoin", "BTC-USD", NaiveDate::from_ymd_opt(2014, 1, 1).unwrap());
        let err = provider.fetch_market_chart(&btc, 0).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
    }
}
