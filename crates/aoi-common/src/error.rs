//! Error taxonomy for staging runs.

use thiserror::Error;

/// Result type alias using StageError.
pub type StageResult<T> = Result<T, StageError>;

/// Primary error type for staging operations.
#[derive(Debug, Error)]
pub enum StageError {
    /// Malformed directive or unrecognized declaration.
    /// Always fatal, raised before any tier processing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing dataset directory, zero date matches, or a missing declared
    /// file. Fatal only under the strict missing-files policy.
    #[error("lookup miss: {0}")]
    LookupMiss(String),

    /// Spatial index construction failed; the whole granule batch is
    /// abandoned, never silently shortened.
    #[error("index build failed: {0}")]
    IndexBuild(String),

    /// Transferring a single file failed.
    #[error("copy failed for {path}: {message}")]
    Copy { path: String, message: String },

    /// Post-copy columnar filtering failed; the raw copy remains valid.
    #[error("post-copy filter failed for {path}: {message}")]
    PostProcess { path: String, message: String },

    /// Storage transport failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
