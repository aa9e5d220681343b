//! The real-time collection loop.
//!
//! Every tick makes one batched provider call for all assets and persists one
//! sample per returned asset. The loop keeps a fixed cadence: the sleep after
//! a tick is the interval minus the time the tick took.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use quote_ingestor::{
    models::{
        asset::Asset,
        realtime::{RealtimeQuote, RealtimeSample},
    },
    providers::{RealtimeProvider, retry::RateLimitRetry},
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    documents::{RealtimeDocument, RealtimeMonthDocument},
    store::{
        BlobStore, KeyLayout, OutOfOrderSnafu, RealtimeLayout, StoreError, read_json, write_json,
    },
};

/// Default time between the starts of two ticks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Running,
    /// Stopped by cancellation. A collector is not restarted after this.
    Interrupted,
}

/// What one tick produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub samples_written: usize,
    /// The provider call failed; nothing was persisted.
    pub fetch_failed: bool,
}

/// Totals over the life of [`Collector::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorReport {
    pub ticks: u64,
    pub samples_written: u64,
    pub failed_ticks: u64,
    pub state: CollectorState,
}

pub struct Collector {
    provider: Arc<dyn RealtimeProvider>,
    store: Arc<dyn BlobStore>,
    assets: Vec<Asset>,
    layout: KeyLayout,
    retry: RateLimitRetry,
    interval: Duration,
    state: CollectorState,
}

impl Collector {
    pub fn new(
        provider: Arc<dyn RealtimeProvider>,
        store: Arc<dyn BlobStore>,
        assets: Vec<Asset>,
        layout: KeyLayout,
    ) -> Self {
        Self {
            provider,
            store,
            assets,
            layout,
            retry: RateLimitRetry::default(),
            interval: DEFAULT_INTERVAL,
            state: CollectorState::Idle,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RateLimitRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Fetches quotes for every asset and persists one sample each.
    ///
    /// A failed fetch is logged and yields no samples. A failed write for one
    /// asset is logged and does not prevent the others.
    pub async fn tick(&self) -> TickOutcome {
        let quotes = match self
            .retry
            .run("fetch_realtime", || self.provider.fetch_realtime(&self.assets))
            .await
        {
            Ok(quotes) => quotes,
            Err(e) => {
                tracing::warn!(error = %e, "real-time fetch failed, no samples this tick");
                return TickOutcome {
                    samples_written: 0,
                    fetch_failed: true,
                };
            }
        };

        let timestamp = Utc::now();
        let mut outcome = TickOutcome::default();
        for asset in &self.assets {
            let Some(quote) = quotes.get(&asset.id) else {
                tracing::debug!(asset = %asset.id, "asset missing from response, skipped");
                continue;
            };
            match self.persist(asset, timestamp, quote.clone()).await {
                Ok(key) => {
                    outcome.samples_written += 1;
                    tracing::info!(asset = %asset.id, price = quote.price, %key, "sample stored");
                }
                Err(e) => tracing::warn!(asset = %asset.id, error = %e, "failed to store sample"),
            }
        }
        outcome
    }

    async fn persist(
        &self,
        asset: &Asset,
        timestamp: DateTime<Utc>,
        quote: RealtimeQuote,
    ) -> Result<String, StoreError> {
        let key = self.layout.realtime_key(&asset.id, &timestamp);
        let sample = RealtimeSample::new(timestamp, quote);
        let source = self.provider.name();

        match self.layout.realtime {
            RealtimeLayout::HierarchicalDaily => {
                let doc = RealtimeDocument::new(&asset.id, source, sample, Utc::now());
                write_json(self.store.as_ref(), &key, &doc).await?;
            }
            RealtimeLayout::FlatMonthly => {
                let mut doc = read_json::<RealtimeMonthDocument>(self.store.as_ref(), &key)
                    .await?
                    .unwrap_or_else(|| {
                        RealtimeMonthDocument::new(&asset.id, source, &timestamp, Utc::now())
                    });
                if let Err(last) = doc.append(sample) {
                    return OutOfOrderSnafu {
                        key,
                        last: last.to_rfc3339(),
                        next: timestamp.to_rfc3339(),
                    }
                    .fail();
                }
                write_json(self.store.as_ref(), &key, &doc).await?;
            }
        }
        Ok(key)
    }

    /// Ticks until `cancel` fires, then returns the totals.
    ///
    /// Cancellation is observed between ticks: a tick in progress always
    /// finishes, a pending sleep is cut short.
    pub async fn run(&mut self, cancel: CancellationToken) -> CollectorReport {
        self.state = CollectorState::Running;
        tracing::info!(
            assets = self.assets.len(),
            interval_secs = self.interval.as_secs(),
            layout = ?self.layout.realtime,
            "collector started"
        );

        let mut report = CollectorReport {
            ticks: 0,
            samples_written: 0,
            failed_ticks: 0,
            state: self.state,
        };

        while !cancel.is_cancelled() {
            let started = Instant::now();
            let outcome = self.tick().await;
            report.ticks += 1;
            report.samples_written += outcome.samples_written as u64;
            if outcome.fetch_failed {
                report.failed_ticks += 1;
            }

            let wait = self.interval.saturating_sub(started.elapsed());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.state = CollectorState::Interrupted;
        report.state = self.state;
        tracing::info!(
            ticks = report.ticks,
            samples = report.samples_written,
            failed_ticks = report.failed_ticks,
            "collector interrupted"
        );
        report
    }
}
