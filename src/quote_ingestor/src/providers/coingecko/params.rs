use serde::{Deserialize, Serialize};

use crate::models::asset::Asset;

/// CoinGecko API plan. Each tier has its own host and key header.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApiTier {
    #[default]
    Demo,
    Pro,
}

impl ApiTier {
    pub fn base_url(self) -> &'static str {
        match self {
            ApiTier::Demo => "https://api.coingecko.com/api/v3",
            ApiTier::Pro => "https://pro-api.coingecko.com/api/v3",
        }
    }

    pub fn key_header(self) -> &'static str {
        match self {
            ApiTier::Demo => "x-cg-demo-api-key",
            ApiTier::Pro => "x-cg-pro-api-key",
        }
    }
}

/// Query for `/simple/price` covering every asset at once.
pub fn simple_price_params(assets: &[Asset], vs_currency: &str) -> Vec<(&'static str, String)> {
    let ids = assets
        .iter()
        .map(|a| a.id.as_str())
        .collect::<Vec<_>>()
        .join(",");
    vec![
        ("ids", ids),
        ("vs_currencies", vs_currency.to_string()),
        ("include_market_cap", "true".to_string()),
        ("include_24hr_vol", "true".to_string()),
        ("include_24hr_change", "true".to_string()),
        ("include_last_updated_at", "true".to_string()),
    ]
}

/// Query for `/coins/{id}/market_chart`.
pub fn market_chart_params(vs_currency: &str, days: u32) -> Vec<(&'static str, String)> {
    vec![
        ("vs_currency", vs_currency.to_string()),
        ("days", days.to_string()),
    ]
}
