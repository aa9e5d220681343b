use std::{
    collections::BTreeSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use snafu::ResultExt;

use crate::store::{BlobStore, IoSnafu, StoreError, prefix_dir, validate_key};

const TMP_SUFFIX: &str = ".tmp";

/// Blob store backed by a directory tree. Keys map to relative paths.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context(IoSnafu { key }),
        }
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(IoSnafu { key }),
        }
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.context(IoSnafu { key })?;
        }

        // write-then-rename so readers never see a half-written document
        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        tokio::fs::write(&tmp, &bytes).await.context(IoSnafu { key })?;
        tokio::fs::rename(&tmp, &path).await.context(IoSnafu { key })
    }

    async fn list_keys(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        let dir = prefix_dir(prefix);
        let mut keys = BTreeSet::new();
        let mut pending = vec![dir.trim_end_matches('/').to_string()];

        while let Some(rel) = pending.pop() {
            let abs = if rel.is_empty() {
                self.root.clone()
            } else {
                self.path_for(&rel)?
            };
            let mut entries = match tokio::fs::read_dir(&abs).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e).context(IoSnafu { key: prefix }),
            };

            while let Some(entry) = entries.next_entry().await.context(IoSnafu { key: prefix })? {
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                let child = if rel.is_empty() {
                    name
                } else {
                    format!("{rel}/{name}")
                };
                let file_type = entry.file_type().await.context(IoSnafu { key: prefix })?;
                if file_type.is_dir() {
                    // only descend into directories that can still match
                    let dir_key = format!("{child}/");
                    if dir_key.starts_with(prefix) || prefix.starts_with(&dir_key) {
                        pending.push(child);
                    }
                } else if child.starts_with(prefix) && !child.ends_with(TMP_SUFFIX) {
                    keys.insert(child);
                }
            }
        }
        Ok(keys)
    }
}
