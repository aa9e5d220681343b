//! Canonical in-memory representation of daily historical quotes.
//!
//! Every [`HistoricalProvider`](crate::providers::HistoricalProvider) returns
//! [`HistoricalRecord`]s; callers that persist them go through
//! [`HistoricalSeries`], which guarantees ascending dates without duplicates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of OHLCV data for a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    /// Trading day (UTC), serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,

    /// Opening price.
    pub open: f64,

    /// Highest price of the day.
    pub high: f64,

    /// Lowest price of the day.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Traded volume for the day.
    pub volume: f64,

    /// Tag of the provider that produced the row (e.g. `yahoo_finance`).
    pub source: String,
}

/// An ordered, date-unique sequence of [`HistoricalRecord`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalSeries {
    records: Vec<HistoricalRecord>,
}

impl HistoricalSeries {
    /// Sorts records by date and collapses duplicate dates.
    ///
    /// When a provider returns the same day twice (Yahoo does this for the
    /// still-open current day), the row that came last wins.
    pub fn from_records(mut records: Vec<HistoricalRecord>) -> Self {
        // stable sort keeps provider order among equal dates
        records.sort_by_key(|r| r.date);

        let mut out: Vec<HistoricalRecord> = Vec::with_capacity(records.len());
        for record in records {
            match out.last_mut() {
                Some(last) if last.date == record.date => *last = record,
                _ => out.push(record),
            }
        }
        Self { records: out }
    }

    pub fn records(&self) -> &[HistoricalRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<HistoricalRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(date: NaiveDate, close: f64) -> HistoricalRecord {
        HistoricalRecord {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            source: "test".into(),
        }
    }

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(n as u64)
    }

    #[test]
    fn sorts_and_keeps_last_duplicate() {
        let series = HistoricalSeries::from_records(vec![
            rec(day(2), 3.0),
            rec(day(0), 1.0),
            rec(day(2), 4.0),
            rec(day(1), 2.0),
        ]);

        let closes: Vec<f64> = series.records().iter().map(|r| r.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 4.0]);
        assert_eq!(series.first_date(), Some(day(0)));
        assert_eq!(series.last_date(), Some(day(2)));
    }

    #[test]
    fn empty_series_has_no_bounds() {
        let series = HistoricalSeries::from_records(vec![]);
        assert!(series.is_empty());
        assert_eq!(series.first_date(), None);
        assert_eq!(series.last_date(), None);
    }

    #[test]
    fn record_serializes_date_as_plain_day() {
        let json = serde_json::to_value(rec(day(0), 42.5)).unwrap();
        assert_eq!(json["date"], "2024-01-01");
        assert_eq!(json["close"], 42.5);
        assert_eq!(json["source"], "test");
    }

    proptest! {
        #[test]
        fn dates_strictly_ascending(offsets in proptest::collection::vec(0u32..400, 0..60)) {
            let records = offsets.iter().map(|&o| rec(day(o), o as f64)).collect();
            let series = HistoricalSeries::from_records(records);

            prop_assert!(series.records().windows(2).all(|w| w[0].date < w[1].date));

            let mut distinct = offsets.clone();
            distinct.sort_unstable();
            distinct.dedup();
            prop_assert_eq!(series.len(), distinct.len());
        }
    }
}
