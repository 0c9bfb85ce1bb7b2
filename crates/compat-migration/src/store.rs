//! Durable migration set storage
//!
//! [`MigrationStore`] persists a [`MigrationSet`] as pretty JSON. Writes go
//! through a temporary file in the target directory followed by a rename,
//! and are guarded by a compare-and-swap on the fingerprint of the file
//! contents read at load time.

use crate::set::{MigrationSet, FORMAT_VERSION};
use compat_schema::Fingerprint;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A loaded migration set and the fingerprint of the bytes it came from
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMigrations {
    pub set: MigrationSet,
    pub fingerprint: Fingerprint,
}

/// File-backed migration set store
#[derive(Debug, Clone)]
pub struct MigrationStore {
    path: PathBuf,
}

impl MigrationStore {
    /// Store backed by `path` (the file need not exist yet)
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted set
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    ///
    /// # Errors
    /// - `StoreError::Io` if the file exists but cannot be read
    /// - `StoreError::Parse` if the contents are not a migration set
    /// - `StoreError::UnsupportedVersion` for newer format versions
    pub fn load(&self) -> Result<Option<StoredMigrations>, StoreError> {
        let Some(bytes) = self.read_bytes()? else {
            return Ok(None);
        };

        let set: MigrationSet =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        if set.version > FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: set.version,
                supported: FORMAT_VERSION,
            });
        }

        tracing::debug!(path = %self.path.display(), connectors = set.connectors.len(), "loaded migrations");
        Ok(Some(StoredMigrations {
            set,
            fingerprint: Fingerprint::compute(&bytes),
        }))
    }

    /// Fingerprint of the current file contents, `None` if absent
    ///
    /// # Errors
    /// Returns `StoreError::Io` if the file exists but cannot be read
    pub fn current_fingerprint(&self) -> Result<Option<Fingerprint>, StoreError> {
        Ok(self.read_bytes()?.map(|bytes| Fingerprint::compute(&bytes)))
    }

    /// Atomically replace the persisted set
    ///
    /// `expected` is the fingerprint returned by the `load` this write is
    /// based on, or `None` when nothing was persisted. If the file changed in
    /// between, nothing is written.
    ///
    /// # Errors
    /// - `StoreError::Conflict` if the file no longer matches `expected`
    /// - `StoreError::Io` / `StoreError::Serialize` on write failures
    pub fn save(
        &self,
        set: &MigrationSet,
        expected: Option<&Fingerprint>,
    ) -> Result<Fingerprint, StoreError> {
        let actual = self.current_fingerprint()?;
        if actual.as_ref() != expected {
            tracing::warn!(
                path = %self.path.display(),
                expected = %display_fingerprint(expected),
                actual = %display_fingerprint(actual.as_ref()),
                "migration store changed since it was loaded"
            );
            return Err(StoreError::Conflict {
                expected: expected.cloned(),
                actual,
            });
        }

        let mut rendered = set.to_json_pretty().map_err(StoreError::Serialize)?;
        rendered.push('\n');

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|source| self.io_error(source))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|source| self.io_error(source))?;
        temp.write_all(rendered.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|source| self.io_error(source))?;
        temp.persist(&self.path)
            .map_err(|err| self.io_error(err.error))?;

        let fingerprint = Fingerprint::compute(rendered.as_bytes());
        tracing::info!(path = %self.path.display(), %fingerprint, "saved migrations");
        Ok(fingerprint)
    }

    fn read_bytes(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn display_fingerprint(fingerprint: Option<&Fingerprint>) -> String {
    fingerprint.map_or_else(|| "<absent>".to_string(), ToString::to_string)
}

/// Errors reading or writing the migration store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("migration store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted document is malformed
    #[error("cannot parse migration store {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Set could not be rendered
    #[error("cannot serialize migrations: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Another writer replaced the file since it was loaded
    #[error(
        "migration store was modified concurrently: expected {}, found {}",
        display_fingerprint(.expected.as_ref()),
        display_fingerprint(.actual.as_ref())
    )]
    Conflict {
        expected: Option<Fingerprint>,
        actual: Option<Fingerprint>,
    },

    /// Written by a newer release
    #[error("unsupported migration format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

impl StoreError {
    /// Whether retrying after a fresh load can succeed
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
