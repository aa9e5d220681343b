//! Crypto price landing collector.
//!
//! Keeps a blob store (local directory or object storage bucket) supplied with
//! self-describing JSON documents:
//!
//! - [`backfill`]: the full daily history of each asset, fetched once.
//! - [`collector`]: a sample of every asset on each tick of a periodic loop.
//! - [`daily`]: the previous day's intraday prices.
//!
//! [`orchestrator::Orchestrator`] runs them in order; [`config`] builds them
//! from a TOML file.

pub mod backfill;
pub mod collector;
pub mod config;
pub mod daily;
pub mod documents;
pub mod orchestrator;
pub mod store;

use quote_ingestor::providers::ProviderError;

use crate::{config::ConfigError, store::StoreError};

/// Crate-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
