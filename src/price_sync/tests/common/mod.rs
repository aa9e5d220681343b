#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use indexmap::IndexMap;
use object_store::memory::InMemory;
use price_sync::store::{BlobStore, ObjectStoreBlob};
use quote_ingestor::{
    models::{
        asset::Asset,
        historical::HistoricalRecord,
        realtime::{PricePoint, RealtimeQuote},
    },
    providers::{ApiSnafu, HistoricalProvider, ProviderError, RateLimitedSnafu, RealtimeProvider},
};
use tokio_util::sync::CancellationToken;

/// One scripted provider answer.
#[derive(Clone, Debug)]
pub enum Reply<T> {
    Ok(T),
    RateLimited,
    Fail,
}

impl<T> Reply<T> {
    fn into_result(self) -> Result<T, ProviderError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::RateLimited => Err(RateLimitedSnafu {
                retry_after: Some(60u64),
            }
            .build()),
            Reply::Fail => Err(ApiSnafu {
                status: 500u16,
                message: "upstream down",
            }
            .build()),
        }
    }
}

/// Replies in order; the last reply repeats forever.
pub struct Script<T> {
    replies: Vec<Reply<T>>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    pub fn new(replies: Vec<Reply<T>>) -> Self {
        assert!(!replies.is_empty(), "script needs at least one reply");
        Self {
            replies,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the 1-based call number and its reply.
    fn next(&self) -> (usize, Result<T, ProviderError>) {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies[n.min(self.replies.len() - 1)].clone();
        (n + 1, reply.into_result())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct StubHistorical {
    pub script: Script<Vec<HistoricalRecord>>,
}

impl StubHistorical {
    pub fn new(replies: Vec<Reply<Vec<HistoricalRecord>>>) -> Arc<Self> {
        Arc::new(Self {
            script: Script::new(replies),
        })
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl HistoricalProvider for StubHistorical {
    fn name(&self) -> &str {
        "Stub History"
    }

    async fn fetch_historical(
        &self,
        _asset: &Asset,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>, ProviderError> {
        self.script.next().1
    }
}

pub struct StubRealtime {
    pub quotes: Script<IndexMap<String, RealtimeQuote>>,
    pub chart: Script<Vec<PricePoint>>,
    /// Cancelled once `fetch_realtime` has been called this many times.
    cancel_after: Option<(CancellationToken, usize)>,
    /// Simulated latency of every `fetch_realtime` call.
    delay: Duration,
}

impl StubRealtime {
    pub fn new(replies: Vec<Reply<IndexMap<String, RealtimeQuote>>>) -> Self {
        Self {
            quotes: Script::new(replies),
            chart: Script::new(vec![Reply::Ok(vec![])]),
            cancel_after: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_chart(mut self, replies: Vec<Reply<Vec<PricePoint>>>) -> Self {
        self.chart = Script::new(replies);
        self
    }

    pub fn cancel_after(mut self, token: &CancellationToken, calls: usize) -> Self {
        self.cancel_after = Some((token.clone(), calls));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.quotes.calls()
    }
}

#[async_trait]
impl RealtimeProvider for StubRealtime {
    fn name(&self) -> &str {
        "Stub Realtime"
    }

    async fn fetch_realtime(
        &self,
        _assets: &[Asset],
    ) -> Result<IndexMap<String, RealtimeQuote>, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let (n, reply) = self.quotes.next();
        if let Some((token, after)) = &self.cancel_after {
            if n >= *after {
                token.cancel();
            }
        }
        reply
    }

    async fn fetch_market_chart(
        &self,
        _asset: &Asset,
        _days: u32,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        self.chart.next().1
    }
}

pub fn bitcoin() -> Asset {
    Asset::new("bitcoin", "BTC-USD", date(2014, 1, 1))
}

pub fn ethereum() -> Asset {
    Asset::new("ethereum", "ETH-USD", date(2015, 1, 1))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn record(day: NaiveDate, close: f64) -> HistoricalRecord {
    HistoricalRecord {
        date: day,
        open: close - 100.0,
        high: close + 250.0,
        low: close - 300.0,
        close,
        volume: 1e9,
        source: "yahoo_finance".to_string(),
    }
}

pub fn quote(price: f64, volume: f64) -> RealtimeQuote {
    RealtimeQuote {
        price,
        market_cap: Some(price * 19_000_000.0),
        volume: Some(volume),
        change_24h: Some(1.5),
        source: "coingecko".to_string(),
    }
}

pub fn quotes(entries: &[(&str, RealtimeQuote)]) -> IndexMap<String, RealtimeQuote> {
    entries
        .iter()
        .map(|(id, q)| (id.to_string(), q.clone()))
        .collect()
}

pub fn memory_store() -> Arc<dyn BlobStore> {
    Arc::new(ObjectStoreBlob::new(Arc::new(InMemory::new())))
}
