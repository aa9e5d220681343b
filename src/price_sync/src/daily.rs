//! Previous-day intraday snapshot, one document per asset and day.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use indexmap::IndexMap;
use quote_ingestor::{
    models::asset::Asset,
    providers::{RealtimeProvider, retry::RateLimitRetry},
};

use crate::{
    Error,
    documents::DailySnapshot,
    store::{BlobStore, KeyLayout, write_json},
};

/// The market chart window requested to cover all of yesterday.
pub const CHART_DAYS: u32 = 2;

/// Granularity CoinGecko serves for a 2-day chart.
pub const TIME_INTERVAL: &str = "hourly";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotResult {
    AlreadyPresent,
    Written { point_count: usize },
    Failed { reason: String },
}

impl SnapshotResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, SnapshotResult::Failed { .. })
    }
}

pub struct DailySnapshotter {
    provider: Arc<dyn RealtimeProvider>,
    store: Arc<dyn BlobStore>,
    layout: KeyLayout,
    retry: RateLimitRetry,
}

impl DailySnapshotter {
    pub fn new(
        provider: Arc<dyn RealtimeProvider>,
        store: Arc<dyn BlobStore>,
        layout: KeyLayout,
        retry: RateLimitRetry,
    ) -> Self {
        Self {
            provider,
            store,
            layout,
            retry,
        }
    }

    /// Snapshots yesterday (UTC).
    pub async fn snapshot_previous_day(&self, asset: &Asset) -> SnapshotResult {
        let today = Utc::now().date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        self.snapshot_day(asset, yesterday).await
    }

    /// Stores the intraday points of `day`, unless that snapshot already exists.
    pub async fn snapshot_day(&self, asset: &Asset, day: NaiveDate) -> SnapshotResult {
        match self.try_snapshot(asset, day).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(asset = %asset.id, %day, error = %e, "daily snapshot failed");
                SnapshotResult::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_snapshot(&self, asset: &Asset, day: NaiveDate) -> Result<SnapshotResult, Error> {
        let key = self.layout.daily_key(&asset.id, day);
        if self.store.exists(&key).await? {
            tracing::info!(asset = %asset.id, %key, "daily snapshot already present");
            return Ok(SnapshotResult::AlreadyPresent);
        }

        let points = self
            .retry
            .run("fetch_market_chart", || {
                self.provider.fetch_market_chart(asset, CHART_DAYS)
            })
            .await?;

        let points: Vec<_> = points
            .into_iter()
            .filter(|p| p.timestamp.date_naive() == day)
            .collect();
        if points.is_empty() {
            let reason = format!("no intraday prices for {day}");
            tracing::warn!(asset = %asset.id, "{reason}");
            return Ok(SnapshotResult::Failed { reason });
        }

        let snapshot =
            DailySnapshot::new(&asset.id, day, self.provider.name(), TIME_INTERVAL, points);
        let point_count = snapshot.metadata.total_records;
        write_json(self.store.as_ref(), &key, &snapshot).await?;
        tracing::info!(asset = %asset.id, %key, point_count, "daily snapshot stored");

        Ok(SnapshotResult::Written { point_count })
    }

    /// Snapshots yesterday for every asset in order; failures are isolated.
    pub async fn snapshot_all(&self, assets: &[Asset]) -> IndexMap<String, SnapshotResult> {
        let mut results = IndexMap::with_capacity(assets.len());
        for asset in assets {
            results.insert(asset.id.clone(), self.snapshot_previous_day(asset).await);
        }
        results
    }
}
