//! Compatibility session
//!
//! Holds the registry snapshot and migration set loaded for one client and
//! hands out one cached [`ConnectorProxy`] per connector.

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::executor::{AsyncToolExecutor, ToolExecutor};
use crate::proxy::{CallOutcome, ConnectorProxy};
use compat_migration::MigrationSet;
use compat_schema::RegistrySnapshot;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Per-client state shared by all proxied calls
///
/// The migration set is never mutated after construction; sessions built
/// from different sets are independent.
pub struct CompatSession<E: ?Sized> {
    registry: Arc<RegistrySnapshot>,
    migrations: Arc<MigrationSet>,
    executor: Arc<E>,
    config: ProxyConfig,
    bound_connections: HashMap<String, String>,
    proxies: DashMap<String, Arc<ConnectorProxy<E>>>,
}

impl<E: ?Sized> CompatSession<E> {
    /// Create a session
    pub fn new(
        registry: impl Into<Arc<RegistrySnapshot>>,
        migrations: impl Into<Arc<MigrationSet>>,
        executor: Arc<E>,
    ) -> Self {
        Self {
            registry: registry.into(),
            migrations: migrations.into(),
            executor,
            config: ProxyConfig::default(),
            bound_connections: HashMap::new(),
            proxies: DashMap::new(),
        }
    }

    /// Use a custom proxy config
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    /// Pre-bind a connection for one connector
    #[must_use]
    pub fn with_bound_connection(
        mut self,
        connector: impl Into<String>,
        connection: impl Into<String>,
    ) -> Self {
        self.bound_connections
            .insert(connector.into(), connection.into());
        self
    }

    /// Registry snapshot
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &RegistrySnapshot {
        &self.registry
    }

    /// Migration set
    #[inline]
    #[must_use]
    pub fn migrations(&self) -> &MigrationSet {
        &self.migrations
    }

    /// Proxy for `connector`, created on first access
    ///
    /// Only connectors present in the registry are cached. Unknown names get
    /// a fresh proxy with no tools; their calls fail with
    /// `ProxyError::ToolNotFound`.
    pub fn connector(&self, name: &str) -> Arc<ConnectorProxy<E>> {
        if let Some(proxy) = self.proxies.get(name) {
            return Arc::clone(proxy.value());
        }

        if self.registry.connector(name).is_none() {
            tracing::debug!(connector = name, "connector not in registry, proxy not cached");
            return Arc::new(self.build_proxy(name));
        }

        let proxy = self.proxies.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(connector = name, "creating connector proxy");
            Arc::new(self.build_proxy(name))
        });
        Arc::clone(proxy.value())
    }

    fn build_proxy(&self, name: &str) -> ConnectorProxy<E> {
        let proxy = ConnectorProxy::new(
            name,
            Arc::clone(&self.registry),
            Arc::clone(&self.migrations),
            Arc::clone(&self.executor),
        )
        .with_config(self.config.clone());
        match self.bound_connections.get(name) {
            Some(connection) => proxy.with_bound_connection(connection.clone()),
            None => proxy,
        }
    }

    /// Number of proxies created so far
    #[inline]
    #[must_use]
    pub fn cached_connectors(&self) -> usize {
        self.proxies.len()
    }
}

impl<E: ToolExecutor + ?Sized> CompatSession<E> {
    /// Call `connector.tool` through the blocking executor
    ///
    /// # Errors
    /// See [`ConnectorProxy::call`]
    pub fn call(
        &self,
        connector: &str,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallOutcome, ProxyError> {
        self.connector(connector).call(tool, arguments)
    }
}

impl<E: AsyncToolExecutor + ?Sized> CompatSession<E> {
    /// Call `connector.tool` through the async executor
    ///
    /// # Errors
    /// See [`ConnectorProxy::call_async`]
    pub async fn call_async(
        &self,
        connector: &str,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallOutcome, ProxyError> {
        self.connector(connector).call_async(tool, arguments).await
    }
}

impl<E: ?Sized> fmt::Debug for CompatSession<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompatSession")
            .field("connectors", &self.registry.connectors.len())
            .field("cached_proxies", &self.proxies.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
