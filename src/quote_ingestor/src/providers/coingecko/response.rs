use std::collections::HashMap;

use chrono::DateTime;
use serde::Deserialize;

use crate::models::realtime::{PricePoint, RealtimeQuote};

/// `/simple/price` body: `{ "<coin id>": { "<field>": number | null } }`.
pub type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

/// `/coins/{id}/market_chart` body. Each entry is `[unix_millis, value]`.
#[derive(Deserialize, Debug)]
pub struct MarketChartResponse {
    #[serde(default)]
    pub prices: Vec<Vec<f64>>,
}

impl MarketChartResponse {
    /// Malformed pairs (short arrays, out-of-range timestamps) are dropped.
    pub fn into_points(self) -> Vec<PricePoint> {
        self.prices
            .into_iter()
            .filter_map(|pair| {
                let (&ms, &price) = (pair.first()?, pair.get(1)?);
                let timestamp = DateTime::from_timestamp_millis(ms as i64)?;
                Some(PricePoint { timestamp, price })
            })
            .collect()
    }
}

/// Builds a quote from the field map of one coin. `None` when there is no price.
pub fn quote_from_fields(
    fields: &HashMap<String, Option<f64>>,
    vs_currency: &str,
    source: &str,
) -> Option<RealtimeQuote> {
    let get = |suffix: &str| fields.get(&format!("{vs_currency}{suffix}")).copied().flatten();
    Some(RealtimeQuote {
        price: get("")?,
        market_cap: get("_market_cap"),
        volume: get("_24h_vol"),
        change_24h: get("_24h_change"),
        source: source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_reads_currency_prefixed_fields() {
        let body: SimplePriceResponse = serde_json::from_str(
            r#"{"bitcoin":{"usd":50000.0,"usd_market_cap":9.8e11,"usd_24h_vol":1e9,"usd_24h_change":null,"last_updated_at":1700000000}}"#,
        )
        .unwrap();
        let quote = quote_from_fields(&body["bitcoin"], "usd", "coingecko").unwrap();
        assert_eq!(quote.price, 50000.0);
        assert_eq!(quote.market_cap, Some(9.8e11));
        assert_eq!(quote.volume, Some(1e9));
        assert_eq!(quote.change_24h, None);
        assert_eq!(quote.source, "coingecko");
    }

    #[test]
    fn missing_price_yields_no_quote() {
        let body: SimplePriceResponse =
            serde_json::from_str(r#"{"bitcoin":{"eur":41000.0}}"#).unwrap();
        assert!(quote_from_fields(&body["bitcoin"], "usd", "coingecko").is_none());
    }

    #[test]
    fn market_chart_drops_malformed_pairs() {
        let body: MarketChartResponse = serde_json::from_str(
            r#"{"prices":[[1704067200000,42000.5],[1704070800000],[1704074400000,42100.0]],"market_caps":[]}"#,
        )
        .unwrap();
        let points = body.into_points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp.timestamp(), 1_704_067_200);
        assert_eq!(points[1].price, 42100.0);
    }
}
