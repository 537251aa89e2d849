//! Store capability seam: local filesystem or remote object storage,
//! chosen once at run start.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use aoi_common::{StageError, StageResult};

/// Remote object-store connection settings (S3/MinIO compatible).
///
/// Credentials are part of the run configuration rather than ambient
/// process state, so concurrent runs can target different accounts and
/// tests can point at fake endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStoreConfig {
    /// Endpoint URL
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region ("us-east-1" for MinIO)
    #[serde(default = "default_region")]
    pub region: String,
    /// Allow plain HTTP (local MinIO)
    #[serde(default)]
    pub allow_http: bool,
    /// Key prefix all tier roots hang off
    #[serde(default)]
    pub root: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Read-side capabilities a run needs from its source tree.
///
/// `materialize` exists for readers that require a real filesystem path:
/// it is the identity for local trees and a download-to-scratch for remote
/// objects.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Read a whole object.
    async fn get(&self, path: &str) -> StageResult<Bytes>;

    /// List object keys under a prefix.
    async fn list(&self, prefix: &str) -> StageResult<Vec<String>>;

    /// Whether an object exists.
    async fn exists(&self, path: &str) -> StageResult<bool>;

    /// Yield a readable filesystem path for an object, staging a copy into
    /// `scratch` when necessary.
    async fn materialize(&self, path: &str, scratch: &Path) -> StageResult<PathBuf>;
}

/// Source tree on the local filesystem.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl DataStore for LocalStore {
    async fn get(&self, path: &str) -> StageResult<Bytes> {
        let full = self.resolve(path);
        let data = tokio::fs::read(&full).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StageError::LookupMiss(format!("{path} not found")),
            _ => StageError::Storage(format!("failed to read {path}: {e}")),
        })?;
        Ok(Bytes::from(data))
    }

    async fn list(&self, prefix: &str) -> StageResult<Vec<String>> {
        let dir = self.resolve(prefix);
        if !dir.is_dir() {
            return Err(StageError::LookupMiss(format!(
                "directory {prefix} not found"
            )));
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&dir) {
            let entry =
                entry.map_err(|e| StageError::Storage(format!("failed to list {prefix}: {e}")))?;
            if entry.file_type().is_file() {
                let relative = entry
                    .path()
                    .strip_prefix(&dir)
                    .map_err(|e| StageError::Storage(e.to_string()))?;
                keys.push(format!(
                    "{}/{}",
                    prefix.trim_end_matches('/'),
                    slash_path(relative)
                ));
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, path: &str) -> StageResult<bool> {
        Ok(self.resolve(path).is_file())
    }

    async fn materialize(&self, path: &str, _scratch: &Path) -> StageResult<PathBuf> {
        let full = self.resolve(path);
        if !full.is_file() {
            return Err(StageError::LookupMiss(format!("{path} not found")));
        }
        Ok(full)
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Source tree in S3-compatible object storage.
pub struct RemoteStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl RemoteStore {
    /// Create a client from explicit connection settings.
    pub fn new(config: &RemoteStoreConfig) -> StageResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_region(&config.region);

        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder.build().map_err(|e| {
            StageError::Storage(format!("failed to create object store client: {e}"))
        })?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl DataStore for RemoteStore {
    async fn get(&self, path: &str) -> StageResult<Bytes> {
        let location = object_store::path::Path::from(path);
        let result = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                StageError::LookupMiss(format!("{path} not found"))
            }
            other => StageError::Storage(format!("failed to read {path}: {other}")),
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StageError::Storage(format!("failed to read {path}: {e}")))?;

        debug!(bucket = %self.bucket, path, size = bytes.len(), "read object");
        Ok(bytes)
    }

    async fn list(&self, prefix: &str) -> StageResult<Vec<String>> {
        let prefix_path = object_store::path::Path::from(prefix);
        let mut keys = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| StageError::Storage(format!("list {prefix} failed: {e}")))?
        {
            keys.push(meta.location.to_string());
        }

        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, path: &str) -> StageResult<bool> {
        let location = object_store::path::Path::from(path);
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StageError::Storage(format!("failed to check {path}: {e}"))),
        }
    }

    async fn materialize(&self, path: &str, scratch: &Path) -> StageResult<PathBuf> {
        let data = self.get(path).await?;
        let name = path.rsplit('/').next().unwrap_or(path);
        let local = scratch.join(name);
        tokio::fs::write(&local, &data)
            .await
            .map_err(|e| StageError::Storage(format!("failed to stage {path}: {e}")))?;
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_list_is_sorted_and_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("bronze/sentinel-2")).unwrap();
        std::fs::write(root.join("bronze/sentinel-2/b.tif"), b"b").unwrap();
        std::fs::write(root.join("bronze/sentinel-2/a.tif"), b"a").unwrap();

        let store = LocalStore::new(root);
        let keys = store.list("bronze/sentinel-2").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "bronze/sentinel-2/a.tif".to_string(),
                "bronze/sentinel-2/b.tif".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_local_missing_directory_is_a_lookup_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let result = store.list("bronze/sentinel-2").await;
        assert!(matches!(result, Err(StageError::LookupMiss(_))));
    }

    #[tokio::test]
    async fn test_local_get_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.bin"), b"payload").unwrap();

        let store = LocalStore::new(dir.path());
        assert!(store.exists("file.bin").await.unwrap());
        assert!(!store.exists("other.bin").await.unwrap());
        assert_eq!(store.get("file.bin").await.unwrap(), Bytes::from("payload"));
        assert!(matches!(
            store.get("other.bin").await,
            Err(StageError::LookupMiss(_))
        ));
    }

    #[tokio::test]
    async fn test_local_materialize_returns_the_source_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("granule.h5"), b"x").unwrap();

        let store = LocalStore::new(dir.path());
        let scratch = tempfile::tempdir().unwrap();
        let local = store
            .materialize("granule.h5", scratch.path())
            .await
            .unwrap();
        assert_eq!(local, dir.path().join("granule.h5"));
    }
}
