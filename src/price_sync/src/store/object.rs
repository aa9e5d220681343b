use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::{ObjectStore, PutPayload, aws::AmazonS3Builder, path::Path};
use snafu::ResultExt;

use crate::store::{BlobStore, ObjectStoreSnafu, StoreError, prefix_dir, validate_key};

/// Blob store on top of any [`ObjectStore`], optionally rooted under a key
/// prefix (e.g. `01.landing`).
#[derive(Debug, Clone)]
pub struct ObjectStoreBlob {
    inner: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl ObjectStoreBlob {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            prefix: None,
        }
    }

    /// Roots every key under `prefix`. Surrounding slashes are ignored.
    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        let prefix = prefix.as_ref().trim_matches('/');
        self.prefix = (!prefix.is_empty()).then(|| prefix.to_string());
        self
    }

    /// S3 bucket store. Credentials come from the standard `AWS_*` environment
    /// variables.
    pub fn s3(bucket: &str, region: Option<&str>) -> Result<Self, StoreError> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        let store = builder.build().context(ObjectStoreSnafu { key: bucket })?;
        Ok(Self::new(Arc::new(store)))
    }

    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }

    fn location(&self, key: &str) -> Result<Path, StoreError> {
        validate_key(key)?;
        Ok(Path::from(self.full_key(key)))
    }

    fn strip_prefix<'a>(&self, location: &'a str) -> Option<&'a str> {
        match &self.prefix {
            Some(prefix) => location.strip_prefix(prefix.as_str())?.strip_prefix('/'),
            None => Some(location),
        }
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlob {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let location = self.location(key)?;
        match self.inner.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e).context(ObjectStoreSnafu { key }),
        }
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let location = self.location(key)?;
        let result = match self.inner.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e).context(ObjectStoreSnafu { key }),
        };
        let bytes = result.bytes().await.context(ObjectStoreSnafu { key })?;
        Ok(Some(bytes.to_vec()))
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let location = self.location(key)?;
        self.inner
            .put(&location, PutPayload::from(bytes))
            .await
            .context(ObjectStoreSnafu { key })?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        // object_store lists whole path segments; narrow to the mid-segment prefix afterwards
        let dir = self.full_key(prefix_dir(prefix));
        let dir = dir.trim_end_matches('/');
        let dir_path = (!dir.is_empty()).then(|| Path::from(dir));

        let metas: Vec<_> = self
            .inner
            .list(dir_path.as_ref())
            .try_collect()
            .await
            .context(ObjectStoreSnafu { key: prefix })?;

        Ok(metas
            .iter()
            .filter_map(|meta| self.strip_prefix(meta.location.as_ref()))
            .filter(|key| key.starts_with(prefix))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use object_store::memory::InMemory;

    use super::*;

    #[tokio::test]
    async fn prefix_roots_keys_and_is_hidden_from_listing() {
        let inner = Arc::new(InMemory::new());
        let store = ObjectStoreBlob::new(inner.clone()).with_prefix("/01.landing/");

        store
            .write("bitcoin/historical/bitcoin_historical_complete.json", b"{}".to_vec())
            .await
            .unwrap();

        let raw = Path::from("01.landing/bitcoin/historical/bitcoin_historical_complete.json");
        assert!(inner.head(&raw).await.is_ok());

        let keys = store.list_keys("bitcoin/historical/bitcoin_historical_").await.unwrap();
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec!["bitcoin/historical/bitcoin_historical_complete.json".to_string()]
        );
    }

    #[tokio::test]
    async fn listing_finds_ids_using_every_allowed_character() {
        let store = ObjectStoreBlob::new(Arc::new(InMemory::new()));
        let key = "wrapped-btc_v2.0/historical/wrapped-btc_v2.0_historical_complete.json";
        store.write(key, b"{}".to_vec()).await.unwrap();

        let keys = store
            .list_keys("wrapped-btc_v2.0/historical/wrapped-btc_v2.0_historical_")
            .await
            .unwrap();
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec![key.to_string()]);
    }

    #[tokio::test]
    async fn missing_key_is_absent_not_an_error() {
        let store = ObjectStoreBlob::new(Arc::new(InMemory::new()));
        assert!(!store.exists("bitcoin/none.json").await.unwrap());
        assert!(store.read("bitcoin/none.json").await.unwrap().is_none());
        assert!(store.list_keys("bitcoin/").await.unwrap().is_empty());
    }
}
