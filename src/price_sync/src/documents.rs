//! JSON documents written to the landing store.
//!
//! Every document is a `{ "metadata": …, "data": … }` pair. The metadata always
//! names the asset and the source and carries timestamps, so files stay
//! self-describing once they leave the collector.

use chrono::{DateTime, NaiveDate, Utc};
use quote_ingestor::models::{
    asset::Asset,
    historical::{HistoricalRecord, HistoricalSeries},
    realtime::{PricePoint, RealtimeQuote, RealtimeSample},
    timestamp,
};
use serde::{Deserialize, Serialize};

/// The full daily history of one asset, written once by the backfill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalDocument {
    pub metadata: HistoricalMetadata,
    pub data: Vec<HistoricalRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMetadata {
    pub coin: String,
    pub symbol: String,
    pub source: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data_points: usize,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl HistoricalDocument {
    /// Builds the document for `asset`. `None` when the series is empty.
    pub fn from_series(
        asset: &Asset,
        source: &str,
        series: HistoricalSeries,
        created_at: DateTime<Utc>,
    ) -> Option<Self> {
        let start_date = series.first_date()?;
        let end_date = series.last_date()?;
        Some(Self {
            metadata: HistoricalMetadata {
                coin: asset.id.clone(),
                symbol: asset.symbol.clone(),
                source: source.to_string(),
                start_date,
                end_date,
                data_points: series.len(),
                created_at,
            },
            data: series.into_records(),
        })
    }
}

/// One real-time sample (hierarchical layout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeDocument {
    pub metadata: RealtimeMetadata,
    pub data: RealtimeQuote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMetadata {
    pub coin: String,
    pub source: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl RealtimeDocument {
    pub fn new(
        coin: &str,
        source: &str,
        sample: RealtimeSample,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            metadata: RealtimeMetadata {
                coin: coin.to_string(),
                source: source.to_string(),
                timestamp: sample.timestamp,
                created_at,
            },
            data: sample.quote,
        }
    }
}

/// All samples of one asset for one calendar month (flat monthly layout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMonthDocument {
    pub metadata: MonthMetadata,
    pub data: Vec<RealtimeSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthMetadata {
    pub coin: String,
    pub source: String,
    /// `YYYY-MM`
    pub month: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl RealtimeMonthDocument {
    /// Empty document for the month containing `first_sample`.
    pub fn new(
        coin: &str,
        source: &str,
        first_sample: &DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            metadata: MonthMetadata {
                coin: coin.to_string(),
                source: source.to_string(),
                month: first_sample.format("%Y-%m").to_string(),
                created_at,
            },
            data: Vec::new(),
        }
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.data.last().map(|s| s.timestamp)
    }

    /// Appends `sample`, keeping timestamps non-decreasing.
    ///
    /// On rejection the timestamp of the current last sample is returned.
    pub fn append(&mut self, sample: RealtimeSample) -> Result<(), DateTime<Utc>> {
        match self.last_timestamp() {
            Some(last) if sample.timestamp < last => Err(last),
            _ => {
                self.data.push(sample);
                Ok(())
            }
        }
    }
}

/// Intraday prices of one asset for one past UTC day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub metadata: DailyMetadata,
    pub data: Vec<PricePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetadata {
    pub asset_name: String,
    pub extraction_date: NaiveDate,
    pub source: String,
    pub time_interval: String,
    pub total_records: usize,
}

impl DailySnapshot {
    pub fn new(
        asset: &str,
        day: NaiveDate,
        source: &str,
        time_interval: &str,
        points: Vec<PricePoint>,
    ) -> Self {
        Self {
            metadata: DailyMetadata {
                asset_name: asset.to_string(),
                extraction_date: day,
                source: source.to_string(),
                time_interval: time_interval.to_string(),
                total_records: points.len(),
            },
            data: points,
        }
    }
}
