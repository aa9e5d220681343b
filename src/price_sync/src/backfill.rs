//! One-time historical backfill, gated on what is already stored.
//!
//! The presence of any key under an asset's historical discovery prefix means
//! the backfill already happened; the provider is not contacted again.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use indexmap::IndexMap;
use quote_ingestor::{
    models::{asset::Asset, historical::HistoricalSeries},
    providers::{HistoricalProvider, retry::RateLimitRetry},
};

use crate::{
    Error,
    documents::HistoricalDocument,
    store::{BlobStore, KeyLayout, StoreError, read_json, write_json},
};

/// Outcome of [`Backfill::ensure_historical`] for one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillResult {
    /// A historical document was already stored; nothing was fetched.
    AlreadyPresent,
    /// History was fetched and stored.
    Fetched { point_count: usize },
    /// Nothing was stored. The reason has already been logged.
    Failed { reason: String },
}

impl BackfillResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, BackfillResult::Failed { .. })
    }
}

pub struct Backfill {
    provider: Arc<dyn HistoricalProvider>,
    store: Arc<dyn BlobStore>,
    layout: KeyLayout,
    retry: RateLimitRetry,
}

impl Backfill {
    pub fn new(
        provider: Arc<dyn HistoricalProvider>,
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

    /// Stores the asset's full history unless some historical document already exists.
    pub async fn ensure_historical(&self, asset: &Asset) -> BackfillResult {
        self.ensure_historical_until(asset, Utc::now().date_naive()).await
    }

    /// Like [`Self::ensure_historical`] with an explicit last day.
    pub async fn ensure_historical_until(&self, asset: &Asset, end: NaiveDate) -> BackfillResult {
        match self.try_ensure(asset, end).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(asset = %asset.id, error = %e, "historical backfill failed");
                BackfillResult::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_ensure(&self, asset: &Asset, end: NaiveDate) -> Result<BackfillResult, Error> {
        let prefix = self.layout.historical_prefix(&asset.id);
        let existing = self.store.list_keys(&prefix).await?;
        if let Some(key) = existing.first() {
            tracing::info!(
                asset = %asset.id,
                %key,
                "historical data already present, skipping fetch"
            );
            return Ok(BackfillResult::AlreadyPresent);
        }

        tracing::info!(
            asset = %asset.id,
            symbol = %asset.symbol,
            start = %asset.start_date,
            %end,
            "fetching history"
        );
        let records = self
            .retry
            .run("fetch_historical", || {
                self.provider.fetch_historical(asset, asset.start_date, end)
            })
            .await?;

        let series = HistoricalSeries::from_records(records);
        let Some(doc) =
            HistoricalDocument::from_series(asset, self.provider.name(), series, Utc::now())
        else {
            let reason = format!("no historical data returned for {}", asset.symbol);
            tracing::warn!(asset = %asset.id, "{reason}");
            return Ok(BackfillResult::Failed { reason });
        };

        let point_count = doc.metadata.data_points;
        let key = self.layout.historical_key(&asset.id);
        write_json(self.store.as_ref(), &key, &doc).await?;
        tracing::info!(asset = %asset.id, %key, point_count, "historical data stored");

        Ok(BackfillResult::Fetched { point_count })
    }

    /// Runs [`Self::ensure_historical`] for every asset in order. A failure
    /// never stops the remaining assets.
    pub async fn ensure_all(&self, assets: &[Asset]) -> IndexMap<String, BackfillResult> {
        let mut results = IndexMap::with_capacity(assets.len());
        for asset in assets {
            let result = self.ensure_historical(asset).await;
            results.insert(asset.id.clone(), result);
        }
        results
    }

    /// Latest record date across the asset's stored historical documents.
    pub async fn latest_historical_date(
        &self,
        asset: &Asset,
    ) -> Result<Option<NaiveDate>, StoreError> {
        let keys = self
            .store
            .list_keys(&self.layout.historical_prefix(&asset.id))
            .await?;

        let mut latest = None;
        for key in keys {
            if let Some(doc) = read_json::<HistoricalDocument>(self.store.as_ref(), &key).await? {
                latest = latest.max(doc.data.iter().map(|r| r.date).max());
            }
        }
        Ok(latest)
    }
}
