use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode};
use snafu::ResultExt;

use crate::{
    models::{asset::Asset, historical::HistoricalRecord},
    providers::{
        ApiSnafu, ClientBuildSnafu, DecodeSnafu, HistoricalProvider, ProviderError,
        ProviderInitError, RateLimitedSnafu, ReqwestSnafu, ValidationSnafu, retry_after_secs,
        yahoo_chart::response::{ChartData, ChartResponse},
    },
};

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Tag stored on every record this provider produces.
pub const SOURCE_TAG: &str = "yahoo_finance";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

pub struct YahooChartProvider {
    client: Client,
    base_url: String,
}

impl YahooChartProvider {
    /// Creates a provider against the public chart endpoint. No credentials needed.
    pub fn new() -> Result<Self, ProviderInitError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Points the provider at a different chart endpoint (proxies, mirrors).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn query_params(start: NaiveDate, end: NaiveDate) -> Vec<(&'static str, String)> {
        let period1 = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        // end day is inclusive
        let period2 = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp()
            - 1;
        vec![
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
            ("events", "history".to_string()),
        ]
    }
}

/// Converts a chart payload into records.
///
/// Rows missing any of open/high/low/close are dropped (Yahoo emits all-null
/// rows for gaps); a missing volume is stored as `0`. A "Not Found" error or a
/// result without timestamps means "no data" and yields an empty vector.
pub fn parse_chart(
    symbol: &str,
    resp: ChartResponse,
) -> Result<Vec<HistoricalRecord>, ProviderError> {
    let Some(results) = resp.chart.result else {
        return match resp.chart.error {
            Some(err) if err.code.eq_ignore_ascii_case("not found") => Ok(vec![]),
            Some(err) => DecodeSnafu {
                message: format!("{symbol}: {}: {}", err.code, err.description),
            }
            .fail(),
            None => Ok(vec![]),
        };
    };

    let Some(data) = results.into_iter().next() else {
        return Ok(vec![]);
    };
    rows_from_chart(symbol, data)
}

fn rows_from_chart(symbol: &str, data: ChartData) -> Result<Vec<HistoricalRecord>, ProviderError> {
    let Some(timestamps) = data.timestamp else {
        return Ok(vec![]);
    };
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

    let mut rows = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| {
                DecodeSnafu {
                    message: format!("{symbol}: invalid timestamp {ts}"),
                }
                .build()
            })?;

        let cell = |col: &Vec<Option<f64>>| col.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            cell(&quote.open),
            cell(&quote.high),
            cell(&quote.low),
            cell(&quote.close),
        ) else {
            continue;
        };

        rows.push(HistoricalRecord {
            date,
            open,
            high,
            low,
            close,
            volume: cell(&quote.volume).unwrap_or(0.0),
            source: SOURCE_TAG.to_string(),
        });
    }
    Ok(rows)
}

#[async_trait]
impl HistoricalProvider for YahooChartProvider {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    async fn fetch_historical(
        &self,
        asset: &Asset,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>, ProviderError> {
        if start > end {
            return ValidationSnafu {
                message: format!("start {start} is after end {end}"),
            }
            .fail();
        }

        let url = format!("{}/{}", self.base_url, asset.symbol);
        tracing::debug!(symbol = %asset.symbol, %start, %end, "requesting chart");

        let response = self
            .client
            .get(&url)
            .query(&Self::query_params(start, end))
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return RateLimitedSnafu {
                retry_after: retry_after_secs(response.headers()),
            }
            .fail();
        }
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(symbol = %asset.symbol, "chart endpoint reports unknown symbol");
            return Ok(vec![]);
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

        let body = response.bytes().await.context(ReqwestSnafu)?;
        let chart: ChartResponse = serde_json::from_slice(&body).map_err(|e| {
            DecodeSnafu {
                message: format!("{}: {e}", asset.symbol),
            }
            .build()
        })?;

        parse_chart(&asset.symbol, chart)
    }
}
