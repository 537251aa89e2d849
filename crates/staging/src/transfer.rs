//! Byte transfer: single-object copies, sidecars, and the bounded bulk
//! mirror.

use std::path::Path;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use aoi_common::{StageError, StageResult};

use crate::store::DataStore;

/// Worker count for bulk mirroring; each worker moves one whole object,
/// read then write, sharing nothing with its peers.
pub const MIRROR_WORKERS: usize = 8;

/// Per-object transfer result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Object landed at the destination.
    Copied { bytes: usize },
    /// Source object was absent.
    SkippedMissing,
    /// Transfer failed.
    Failed(String),
}

/// File-name component of a store key.
pub fn object_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Sidecar key for a primary granule: same base name, different suffix.
pub fn sidecar_key(primary: &str, suffix: &str) -> String {
    match primary.rsplit_once('.') {
        Some((base, _)) => format!("{base}.{suffix}"),
        None => format!("{primary}.{suffix}"),
    }
}

/// Copy one object from the store to a local destination path, creating
/// parent directories as needed.
pub async fn copy_object(store: &dyn DataStore, source: &str, dest: &Path) -> CopyOutcome {
    let data = match store.get(source).await {
        Ok(data) => data,
        Err(StageError::LookupMiss(_)) => return CopyOutcome::SkippedMissing,
        Err(e) => return CopyOutcome::Failed(e.to_string()),
    };

    if let Some(parent) = dest.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return CopyOutcome::Failed(format!("create {}: {e}", parent.display()));
        }
    }

    match tokio::fs::write(dest, &data).await {
        Ok(()) => CopyOutcome::Copied { bytes: data.len() },
        Err(e) => CopyOutcome::Failed(format!("write {}: {e}", dest.display())),
    }
}

/// Counts from a bulk tree mirror.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MirrorSummary {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Mirror every object under `prefix` into `dest_root`, preserving the
/// relative layout. Up to [`MIRROR_WORKERS`] transfers run at a time; the
/// listing itself and the summary stay on the caller's side.
pub async fn mirror_tree(
    store: &dyn DataStore,
    prefix: &str,
    dest_root: &Path,
) -> StageResult<MirrorSummary> {
    let keys = store.list(prefix).await?;
    info!(prefix, objects = keys.len(), "mirroring tree");

    let results: Vec<(String, CopyOutcome)> = stream::iter(keys)
        .map(|key| async move {
            let relative = key
                .strip_prefix(prefix)
                .unwrap_or(&key)
                .trim_start_matches('/')
                .to_string();
            let dest = dest_root.join(relative);
            let outcome = copy_object(store, &key, &dest).await;
            (key, outcome)
        })
        .buffer_unordered(MIRROR_WORKERS)
        .collect()
        .await;

    let mut summary = MirrorSummary::default();
    for (key, outcome) in results {
        match outcome {
            CopyOutcome::Copied { bytes } => {
                debug!(key = %key, bytes, "mirrored object");
                summary.copied += 1;
            }
            CopyOutcome::SkippedMissing => {
                warn!(key = %key, "object vanished during mirror");
                summary.skipped += 1;
            }
            CopyOutcome::Failed(message) => {
                warn!(key = %key, error = %message, "mirror copy failed");
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;

    #[test]
    fn test_sidecar_key() {
        assert_eq!(
            sidecar_key("bronze/landsat/LC08_tile.tif", "json"),
            "bronze/landsat/LC08_tile.json"
        );
        assert_eq!(sidecar_key("noext", "json"), "noext.json");
    }

    #[test]
    fn test_object_name() {
        assert_eq!(object_name("a/b/c.tif"), "c.tif");
        assert_eq!(object_name("c.tif"), "c.tif");
    }

    #[tokio::test]
    async fn test_copy_object_round_trip() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("file.bin"), b"payload").unwrap();
        let store = LocalStore::new(src.path());

        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("nested/dir/file.bin");
        let outcome = copy_object(&store, "file.bin", &dest).await;
        assert_eq!(outcome, CopyOutcome::Copied { bytes: 7 });
        assert_eq!(std::fs::read(dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_copy_missing_object_is_skipped() {
        let src = tempfile::tempdir().unwrap();
        let store = LocalStore::new(src.path());

        let out = tempfile::tempdir().unwrap();
        let outcome = copy_object(&store, "absent.bin", &out.path().join("absent.bin")).await;
        assert_eq!(outcome, CopyOutcome::SkippedMissing);
    }

    #[tokio::test]
    async fn test_mirror_tree_preserves_layout() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("reference/lookup/tables")).unwrap();
        std::fs::write(src.path().join("reference/readme.txt"), b"top").unwrap();
        std::fs::write(
            src.path().join("reference/lookup/tables/codes.csv"),
            b"code,name",
        )
        .unwrap();
        let store = LocalStore::new(src.path());

        let out = tempfile::tempdir().unwrap();
        let summary = mirror_tree(&store, "reference", out.path()).await.unwrap();
        assert_eq!(summary.copied, 2);
        assert_eq!(summary.failed, 0);
        assert!(out.path().join("readme.txt").is_file());
        assert!(out.path().join("lookup/tables/codes.csv").is_file());
    }
}
