//! Wires backfill, collector and daily snapshot together.

use std::sync::Arc;

use indexmap::IndexMap;
use quote_ingestor::{
    models::asset::Asset,
    providers::{HistoricalProvider, RealtimeProvider},
};
use tokio_util::sync::CancellationToken;

use crate::{
    Error,
    backfill::{Backfill, BackfillResult},
    collector::{Collector, CollectorReport},
    config::Config,
    daily::{DailySnapshotter, SnapshotResult},
    store::BlobStore,
};

/// Result of a full [`Orchestrator::run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub backfill: IndexMap<String, BackfillResult>,
    pub collector: CollectorReport,
}

/// Historical backfill on its own. Needs no real-time credentials.
pub struct HistoricalSync {
    assets: Vec<Asset>,
    backfill: Backfill,
}

impl HistoricalSync {
    pub fn new(
        config: &Config,
        historical: Arc<dyn HistoricalProvider>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            assets: config.assets(),
            backfill: Backfill::new(historical, store, config.key_layout(), config.retry()),
        }
    }

    /// Builds the Yahoo provider and the store; never touches CoinGecko.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let historical = Arc::new(config.build_historical_provider()?);
        let store = config.build_store()?;
        Ok(Self::new(config, historical, store))
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Backfills every asset and logs the stored coverage.
    pub async fn backfill(&self) -> IndexMap<String, BackfillResult> {
        let results = self.backfill.ensure_all(&self.assets).await;

        for asset in &self.assets {
            match results.get(&asset.id) {
                Some(BackfillResult::AlreadyPresent) => {
                    tracing::info!(asset = %asset.id, "backfill: already present")
                }
                Some(BackfillResult::Fetched { point_count }) => {
                    tracing::info!(asset = %asset.id, point_count, "backfill: fetched")
                }
                Some(BackfillResult::Failed { reason }) => {
                    tracing::warn!(asset = %asset.id, %reason, "backfill: failed")
                }
                None => {}
            }

            match self.backfill.latest_historical_date(asset).await {
                Ok(Some(date)) => {
                    tracing::info!(asset = %asset.id, latest = %date, "historical coverage")
                }
                Ok(None) => tracing::info!(asset = %asset.id, "no historical coverage"),
                Err(e) => {
                    tracing::warn!(
                        asset = %asset.id,
                        error = %e,
                        "could not read historical coverage"
                    )
                }
            }
        }
        results
    }
}

pub struct Orchestrator {
    historical: HistoricalSync,
    collector: Collector,
    daily: DailySnapshotter,
}

impl Orchestrator {
    /// Builds every component from explicit providers and store.
    pub fn new(
        config: &Config,
        historical: Arc<dyn HistoricalProvider>,
        realtime: Arc<dyn RealtimeProvider>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        let layout = config.key_layout();
        let retry = config.retry();

        Self {
            historical: HistoricalSync::new(config, historical, store.clone()),
            collector: Collector::new(realtime.clone(), store.clone(), config.assets(), layout)
                .with_interval(config.interval())
                .with_retry(retry),
            daily: DailySnapshotter::new(realtime, store, layout, retry),
        }
    }

    /// Builds the production providers and store. Fails before any network
    /// traffic if the API key is missing or the storage cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let historical = Arc::new(config.build_historical_provider()?);
        let realtime = Arc::new(config.build_realtime_provider()?);
        let store = config.build_store()?;
        Ok(Self::new(config, historical, realtime, store))
    }

    pub fn assets(&self) -> &[Asset] {
        self.historical.assets()
    }

    /// See [`HistoricalSync::backfill`].
    pub async fn backfill(&self) -> IndexMap<String, BackfillResult> {
        self.historical.backfill().await
    }

    /// Backfill first, then collect until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) -> RunSummary {
        let backfill = self.backfill().await;
        let collector = self.collector.run(cancel).await;
        RunSummary {
            backfill,
            collector,
        }
    }

    /// Stores yesterday's intraday snapshot for every asset.
    pub async fn snapshot_previous_day(&self) -> IndexMap<String, SnapshotResult> {
        let results = self.daily.snapshot_all(self.assets()).await;
        let failed = results.values().filter(|r| r.is_failed()).count();
        tracing::info!(assets = results.len(), failed, "daily snapshots done");
        results
    }
}
