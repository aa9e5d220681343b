//! Blob storage for landing documents.
//!
//! [`BlobStore`] is the only persistence seam: a flat key space of
//! `/`-separated keys holding opaque bytes. Two backends share the exact same
//! semantics:
//!
//! - [`local::LocalStore`]: a directory tree on the local filesystem.
//! - [`object::ObjectStoreBlob`]: any `object_store` backend (S3 in production,
//!   in-memory in tests), optionally under a key prefix such as `01.landing`.
//!
//! Key naming is owned by [`layout::KeyLayout`]; nothing else builds keys.

pub mod layout;
pub mod local;
pub mod object;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use snafu::{Backtrace, ResultExt, Snafu};

pub use layout::{KeyLayout, RealtimeLayout};
pub use local::LocalStore;
pub use object::ObjectStoreBlob;

/// Errors raised by blob store backends.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// Filesystem failure in the local backend.
    #[snafu(display("I/O error on '{key}': {source}"))]
    Io {
        key: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// Failure reported by the object storage backend.
    #[snafu(display("Object store error on '{key}': {source}"))]
    ObjectStore {
        key: String,
        source: object_store::Error,
        backtrace: Backtrace,
    },

    /// A stored document could not be encoded or decoded.
    #[snafu(display("Invalid JSON document '{key}': {source}"))]
    Serde {
        key: String,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    /// An append would put a sample before the last one already stored.
    #[snafu(display("Sample at {next} is older than the last stored sample ({last}) in '{key}'"))]
    OutOfOrder {
        key: String,
        last: String,
        next: String,
        backtrace: Backtrace,
    },

    /// The key is empty, absolute, or escapes the store root.
    #[snafu(display("Invalid blob key '{key}'"))]
    InvalidKey { key: String, backtrace: Backtrace },
}

/// A flat key/value store of documents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `false` for a missing key. Errors only on connectivity or permission failures.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Reads the bytes under `key`, `None` if the key is absent.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes `bytes` under `key`, replacing any existing value. Intermediate
    /// hierarchy is created implicitly.
    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Every key starting with `prefix`.
    ///
    /// This is a plain string-prefix match: the prefix may end in the middle of
    /// a path segment (`bitcoin/historical/bitcoin_historical_`).
    async fn list_keys(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError>;
}

/// Serializes `value` as pretty JSON and writes it under `key`.
pub async fn write_json<T: Serialize + Sync>(
    store: &dyn BlobStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).context(SerdeSnafu { key })?;
    store.write(key, bytes).await
}

/// Reads and decodes the JSON document under `key`, `None` if absent.
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn BlobStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.read(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .context(SerdeSnafu { key }),
        None => Ok(None),
    }
}

/// Rejects keys that cannot be mapped safely onto a hierarchy.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return InvalidKeySnafu { key }.fail();
    }
    Ok(())
}

/// Directory part of a prefix: everything up to and including the last `/`.
pub(crate) fn prefix_dir(prefix: &str) -> &str {
    match prefix.rfind('/') {
        Some(idx) => &prefix[..=idx],
        None => "",
    }
}
