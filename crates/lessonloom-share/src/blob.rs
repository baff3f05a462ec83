//! Blob stores holding encrypted share bundles
//!
//! Bundles are addressed by their opaque id. [`FileBlobStore`] keeps one
//! `<id>.json` per bundle; [`MemoryBlobStore`] is for tests.

use crate::data::ShareBundle;
use crate::error::{Result, ShareError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Storage for share bundles
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a bundle under its id
    async fn put(&self, bundle: &ShareBundle) -> Result<()>;

    /// Fetch a bundle
    async fn get(&self, id: &str) -> Result<Option<ShareBundle>>;

    /// Delete a bundle; returns whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// In-memory blob store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    bundles: RwLock<HashMap<String, ShareBundle>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bundles
    pub async fn len(&self) -> usize {
        self.bundles.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.bundles.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bundle: &ShareBundle) -> Result<()> {
        self.bundles
            .write()
            .await
            .insert(bundle.id.clone(), bundle.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ShareBundle>> {
        Ok(self.bundles.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.bundles.write().await.remove(id).is_some())
    }
}

/// Directory-backed blob store
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Store rooted at `dir` (created on first write)
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
        if !valid {
            return Err(ShareError::Storage(format!("invalid share id: {:?}", id)));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, bundle: &ShareBundle) -> Result<()> {
        let path = self.path_for(&bundle.id)?;
        let json = serde_json::to_string_pretty(bundle)?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ShareError::Storage(format!("failed to create {}: {}", self.dir.display(), e))
        })?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| ShareError::Storage(format!("failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            ShareError::Storage(format!("failed to replace {}: {}", path.display(), e))
        })?;

        debug!(share_id = %bundle.id, "Stored share bundle");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ShareBundle>> {
        let path = self.path_for(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ShareError::Storage(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShareError::Storage(format!(
                "failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
