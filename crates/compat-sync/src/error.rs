//! Error types for the sync workflow

use compat_migration::StoreError;
use compat_schema::SnapshotError;
use std::path::PathBuf;

/// Sync workflow errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Registry snapshot could not be loaded
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Migration store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::SyncConfig`]
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl SyncError {
    /// Check if another sync wrote the store concurrently
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_conflict())
    }
}
