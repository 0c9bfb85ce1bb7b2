//! Sync configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! store = "state/migrations.json"
//! connectors = ["slack", "jira"]
//!
//! [proxy]
//! reserved_prefix = "_"
//! ```

use crate::error::SyncError;
use compat_migration::{MigrationSet, MigrationStore};
use compat_proxy::{CompatSession, ProxyConfig};
use compat_schema::RegistrySnapshot;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default migration store location
pub const DEFAULT_STORE_PATH: &str = "migrations.json";

/// Sync workflow configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Migration store file
    pub store: PathBuf,

    /// Connectors to sync; empty means all
    pub connectors: Vec<String>,

    /// Proxy conventions for sessions opened from this file
    pub proxy: ProxyConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store: PathBuf::from(DEFAULT_STORE_PATH),
            connectors: Vec::new(),
            proxy: ProxyConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Create default config
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns `SyncError::ConfigParse` if the document does not match
    pub fn from_toml_str(source: &str, path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        toml::from_str(source).map_err(|source| SyncError::ConfigParse {
            path: path.into(),
            source,
        })
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns `SyncError::ConfigRead` or `SyncError::ConfigParse`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SyncError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content, path)?;
        tracing::debug!(path = %path.display(), store = %config.store.display(), "loaded sync config");
        Ok(config)
    }

    /// Set store path
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: impl Into<PathBuf>) -> Self {
        self.store = store.into();
        self
    }

    /// Restrict to connectors
    #[must_use]
    pub fn with_connectors<I, S>(mut self, connectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connectors = connectors.into_iter().map(Into::into).collect();
        self
    }

    /// Open a compatibility session over the stored migrations
    ///
    /// The session uses the `[proxy]` table. A missing store means no
    /// migrations.
    ///
    /// # Errors
    /// Returns `SyncError::Store` if the store exists but cannot be read
    pub fn open_session<E: ?Sized>(
        &self,
        registry: impl Into<Arc<RegistrySnapshot>>,
        executor: Arc<E>,
    ) -> Result<CompatSession<E>, SyncError> {
        let migrations = MigrationStore::new(&self.store)
            .load()?
            .map_or_else(MigrationSet::new, |stored| stored.set);
        tracing::debug!(
            store = %self.store.display(),
            connectors = migrations.connectors.len(),
            "opening compatibility session"
        );
        Ok(CompatSession::new(registry, migrations, executor).with_config(self.proxy.clone()))
    }

    /// Connector restriction as accepted by [`crate::plan_sync`]
    #[must_use]
    pub fn connector_filter(&self) -> Option<Vec<&str>> {
        if self.connectors.is_empty() {
            None
        } else {
            Some(self.connectors.iter().map(String::as_str).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let config = SyncConfig::from_toml_str(
            r#"
            store = "state/migrations.json"
            connectors = ["slack", "jira"]

            [proxy]
            reserved_prefix = "$"
            "#,
            "compat.toml",
        )
        .unwrap();

        assert_eq!(config.store, PathBuf::from("state/migrations.json"));
        assert_eq!(config.connector_filter(), Some(vec!["slack", "jira"]));
        assert_eq!(config.proxy.reserved_prefix, "$");
        assert_eq!(config.proxy.tenant_key, "tenant_id");
    }

    #[test]
    fn empty_document_is_default() {
        let config = SyncConfig::from_toml_str("", "compat.toml").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.connector_filter(), None);
    }

    #[test]
    fn wrong_type_is_parse_error() {
        let err = SyncConfig::from_toml_str("connectors = 3", "compat.toml").unwrap_err();
        assert!(matches!(err, SyncError::ConfigParse { .. }));
    }

    #[test]
    fn builders_override() {
        let config = SyncConfig::new()
            .with_store("other.json")
            .with_connectors(["github"]);
        assert_eq!(config.store, PathBuf::from("other.json"));
        assert_eq!(config.connectors, vec!["github".to_string()]);
    }
}
