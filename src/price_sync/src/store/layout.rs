use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How real-time samples are laid out in the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeLayout {
    /// One document per sample under `<asset>/realtime/<yyyy>/<mm>/<dd>/`.
    #[default]
    HierarchicalDaily,
    /// One document per asset and month, appended on every tick.
    FlatMonthly,
}

/// Naming scheme for every key the collector reads or writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyLayout {
    pub realtime: RealtimeLayout,
}

impl KeyLayout {
    pub fn new(realtime: RealtimeLayout) -> Self {
        Self { realtime }
    }

    /// `<asset>/historical/<asset>_historical_complete.json`
    pub fn historical_key(&self, asset: &str) -> String {
        format!("{}complete.json", self.historical_prefix(asset))
    }

    /// Any key under this prefix counts as an existing historical backfill.
    pub fn historical_prefix(&self, asset: &str) -> String {
        format!("{asset}/historical/{asset}_historical_")
    }

    /// Key of the document that receives a sample taken at `ts`.
    ///
    /// For [`RealtimeLayout::FlatMonthly`] every sample of the month maps to
    /// the same key.
    pub fn realtime_key(&self, asset: &str, ts: &DateTime<Utc>) -> String {
        match self.realtime {
            RealtimeLayout::HierarchicalDaily => format!(
                "{asset}/realtime/{}/{asset}_{}.json",
                ts.format("%Y/%m/%d"),
                ts.format("%Y%m%d_%H%M%S"),
            ),
            RealtimeLayout::FlatMonthly => format!(
                "{asset}/realtime/{asset}_realtime_{}_{:02}.json",
                ts.year(),
                ts.month()
            ),
        }
    }

    pub fn realtime_prefix(&self, asset: &str) -> String {
        format!("{asset}/realtime/")
    }

    /// `<asset>/daily/<asset>_daily_<yyyy-mm-dd>.json`
    pub fn daily_key(&self, asset: &str, day: NaiveDate) -> String {
        format!("{asset}/daily/{asset}_daily_{}.json", day.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn historical_key_falls_under_discovery_prefix() {
        let layout = KeyLayout::default();
        let key = layout.historical_key("bitcoin");
        assert_eq!(key, "bitcoin/historical/bitcoin_historical_complete.json");
        assert!(key.starts_with(&layout.historical_prefix("bitcoin")));
    }

    #[test]
    fn hierarchical_keys_are_per_sample() {
        let layout = KeyLayout::new(RealtimeLayout::HierarchicalDaily);
        let ts = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 3).unwrap();
        assert_eq!(
            layout.realtime_key("ethereum", &ts),
            "ethereum/realtime/2025/03/07/ethereum_20250307_090503.json"
        );
    }

    #[test]
    fn monthly_keys_group_the_month() {
        let layout = KeyLayout::new(RealtimeLayout::FlatMonthly);
        let first = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(
            layout.realtime_key("bitcoin", &first),
            "bitcoin/realtime/bitcoin_realtime_2025_03.json"
        );
        assert_eq!(layout.realtime_key("bitcoin", &first), layout.realtime_key("bitcoin", &last));
        assert_ne!(layout.realtime_key("bitcoin", &last), layout.realtime_key("bitcoin", &next));
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn realtime_keys_stay_under_the_asset_prefix(secs in 1_388_534_400i64..4_102_444_800i64) {
            let ts = DateTime::from_timestamp(secs, 0).unwrap();
            for realtime in [RealtimeLayout::HierarchicalDaily, RealtimeLayout::FlatMonthly] {
                let layout = KeyLayout::new(realtime);
                let key = layout.realtime_key("bitcoin", &ts);
                prop_assert!(key.starts_with(&layout.realtime_prefix("bitcoin")));
                prop_assert!(key.ends_with(".json"));
                prop_assert!(!key.starts_with(&layout.historical_prefix("bitcoin")));
            }
        }
    }

    #[test]
    fn daily_key_uses_iso_date() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        assert_eq!(
            KeyLayout::default().daily_key("bitcoin", day),
            "bitcoin/daily/bitcoin_daily_2025-01-09.json"
        );
    }
}
