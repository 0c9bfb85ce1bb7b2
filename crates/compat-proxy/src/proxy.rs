//! Connector proxy
//!
//! One [`ConnectorProxy`] fronts one connector. Every call goes through the
//! same preparation routine:
//!
//! 1. reserved names are rejected
//! 2. the name is resolved ([`Strategy::ORDER`])
//! 3. active tools get their parameter migrations applied
//! 4. routing overrides are taken out of the arguments
//!
//! and the resulting [`ExecutionRequest`] is handed to the executor. The
//! blocking and async entry points differ only in how they dispatch.

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::executor::{
    AsyncToolExecutor, CallOverrides, ConnectorBinding, ExecutionRequest, ToolExecutor,
};
use crate::notice::{DeprecationNotice, NoticeKind};
use crate::resolve::{NameIndex, Resolution, Strategy};
use compat_migration::{ConnectorMigration, MigrationSet, ToolMigration};
use compat_schema::{ConnectorSchema, RegistrySnapshot, ToolSchema};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Result of a proxied call
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    /// Executor result, untouched
    pub result: Value,
    /// Shims applied to this call, in application order
    pub notices: Vec<DeprecationNotice>,
}

impl CallOutcome {
    /// Whether any shim was applied
    #[inline]
    #[must_use]
    pub fn has_notices(&self) -> bool {
        !self.notices.is_empty()
    }
}

/// A call that passed resolution and migration but was not yet dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    /// Registry (or removed) tool name the request resolved to
    pub tool: String,
    pub request: ExecutionRequest,
    pub notices: Vec<DeprecationNotice>,
}

/// Compatibility front for a single connector
pub struct ConnectorProxy<E: ?Sized> {
    name: String,
    registry: Arc<RegistrySnapshot>,
    migrations: Arc<MigrationSet>,
    executor: Arc<E>,
    config: ProxyConfig,
    bound_connection: Option<String>,
    index: NameIndex,
}

impl<E: ?Sized> ConnectorProxy<E> {
    /// Create a proxy with the default [`ProxyConfig`]
    pub fn new(
        name: impl Into<String>,
        registry: Arc<RegistrySnapshot>,
        migrations: Arc<MigrationSet>,
        executor: Arc<E>,
    ) -> Self {
        let name = name.into();
        let config = ProxyConfig::default();
        let index = build_index(&registry, &name, &config);
        Self {
            name,
            registry,
            migrations,
            executor,
            config,
            bound_connection: None,
            index,
        }
    }

    /// Use a custom config
    #[must_use]
    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.index = build_index(&self.registry, &self.name, &config);
        self.config = config;
        self
    }

    /// Pre-bind a connection used when a call carries no override
    #[inline]
    #[must_use]
    pub fn with_bound_connection(mut self, connection: impl Into<String>) -> Self {
        self.bound_connection = Some(connection.into());
        self
    }

    /// Connector name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pre-bound connection, if any
    #[inline]
    #[must_use]
    pub fn bound_connection(&self) -> Option<&str> {
        self.bound_connection.as_deref()
    }

    /// Current tool names
    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.schema()
            .into_iter()
            .flat_map(|c| c.tools.keys().map(String::as_str))
    }

    /// Removed tool names still recorded in the migration set
    pub fn deprecated_tool_names(&self) -> impl Iterator<Item = &str> {
        self.migration()
            .into_iter()
            .flat_map(|m| m.deprecated_tools.keys().map(String::as_str))
    }

    fn schema(&self) -> Option<&ConnectorSchema> {
        self.registry.connector(&self.name)
    }

    fn migration(&self) -> Option<&ConnectorMigration> {
        self.migrations.connector(&self.name)
    }

    /// Resolve a requested tool name
    ///
    /// # Errors
    /// Returns `ProxyError::ReservedName` for internal names. An unknown name
    /// is not an error here; it resolves to [`Resolution::NotFound`].
    pub fn resolve(&self, tool: &str) -> Result<Resolution<'_>, ProxyError> {
        if self.config.is_reserved(tool) {
            return Err(ProxyError::ReservedName {
                connector: self.name.clone(),
                tool: tool.to_string(),
            });
        }

        let tools = self.schema().map(|c| &c.tools);
        for strategy in Strategy::ORDER {
            let hit = match strategy {
                Strategy::Exact => tools
                    .and_then(|t| t.get_key_value(tool))
                    .map(|(name, schema)| Resolution::Active {
                        tool: name,
                        schema,
                        strategy,
                    }),
                Strategy::Normalized => self
                    .index
                    .get(&self.config.normalize(tool))
                    .and_then(|name| tools.and_then(|t| t.get_key_value(name)))
                    .map(|(name, schema)| Resolution::Active {
                        tool: name,
                        schema,
                        strategy,
                    }),
                Strategy::Deprecated => self
                    .migration()
                    .and_then(|m| m.deprecated_tools.get_key_value(tool))
                    .map(|(name, record)| Resolution::Deprecated { tool: name, record }),
            };
            if let Some(resolution) = hit {
                tracing::debug!(connector = %self.name, tool, %strategy, "resolved tool");
                return Ok(resolution);
            }
        }

        Ok(Resolution::NotFound {
            connector_has_tools: self.schema().is_some_and(ConnectorSchema::has_tools),
        })
    }

    /// Apply the parameter migrations recorded for an active tool
    ///
    /// Removed parameters are stripped, missing required parameters get their
    /// non-null default, and changed-type parameters are only reported. When
    /// the tool's schema wraps its parameters and the caller passed an object
    /// under the wrapper key, shims act inside that object; otherwise they act
    /// on the top-level arguments.
    pub fn apply_migrations(
        &self,
        tool: &str,
        arguments: &mut Map<String, Value>,
    ) -> Vec<DeprecationNotice> {
        let Some(migration) = self.migration().and_then(|m| m.tools.get(tool)) else {
            return Vec::new();
        };

        let wrapper = self
            .schema()
            .and_then(|c| c.tools.get(tool))
            .and_then(ToolSchema::param_wrapper);
        if let Some(Value::Object(params)) = wrapper.and_then(|key| arguments.get_mut(key)) {
            self.apply_shims(tool, migration, params)
        } else {
            self.apply_shims(tool, migration, arguments)
        }
    }

    fn apply_shims(
        &self,
        tool: &str,
        migration: &ToolMigration,
        params: &mut Map<String, Value>,
    ) -> Vec<DeprecationNotice> {
        let mut notices = Vec::new();

        for (param, deprecated) in &migration.deprecated_params {
            if params.remove(param).is_some() {
                notices.push(DeprecationNotice::new(
                    NoticeKind::IgnoredParam,
                    &self.name,
                    tool,
                    Some(param.as_str()),
                    &deprecated.message,
                ));
            }
        }

        for (param, default) in &migration.param_defaults {
            if params.contains_key(param) {
                continue;
            }
            if !default.default.is_null() {
                params.insert(param.clone(), default.default.clone());
            }
            notices.push(DeprecationNotice::new(
                NoticeKind::DefaultedParam,
                &self.name,
                tool,
                Some(param.as_str()),
                &default.message,
            ));
        }

        for (param, coercion) in &migration.type_coercions {
            if params.contains_key(param) {
                notices.push(DeprecationNotice::new(
                    NoticeKind::TypeChanged,
                    &self.name,
                    tool,
                    Some(param.as_str()),
                    &coercion.message,
                ));
            }
        }

        notices
    }

    /// Resolve, migrate and strip routing keys without dispatching
    ///
    /// # Errors
    /// - `ProxyError::ReservedName` for internal names
    /// - `ProxyError::ToolNotFound` when no strategy matched
    pub fn prepare(
        &self,
        tool: &str,
        mut arguments: Map<String, Value>,
    ) -> Result<PreparedCall, ProxyError> {
        let (resolved_tool, action_id, notices) = match self.resolve(tool)? {
            Resolution::Active { tool, schema, .. } => {
                let notices = self.apply_migrations(tool, &mut arguments);
                (tool.to_string(), schema.action_id.clone(), notices)
            }
            Resolution::Deprecated { tool, record } => {
                let notice = DeprecationNotice::new(
                    NoticeKind::RemovedTool,
                    &self.name,
                    tool,
                    None,
                    &record.message,
                );
                (tool.to_string(), record.action_id.clone(), vec![notice])
            }
            Resolution::NotFound { connector_has_tools } => {
                return Err(ProxyError::ToolNotFound {
                    connector: self.name.clone(),
                    tool: tool.to_string(),
                    connector_has_tools,
                });
            }
        };

        let overrides = self.take_overrides(&mut arguments);
        for notice in &notices {
            notice.log();
        }

        Ok(PreparedCall {
            tool: resolved_tool,
            request: ExecutionRequest {
                action_id,
                arguments,
                connector: ConnectorBinding {
                    name: self.name.clone(),
                    bound_connection: self.bound_connection.clone(),
                },
                overrides,
            },
            notices,
        })
    }

    fn take_overrides(&self, arguments: &mut Map<String, Value>) -> CallOverrides {
        let connection_id = take_string(arguments, &self.config.connection_key)
            .or_else(|| self.bound_connection.clone());
        let tenant_id = take_string(arguments, &self.config.tenant_key);
        CallOverrides {
            connection_id,
            tenant_id,
        }
    }
}

impl<E: ToolExecutor + ?Sized> ConnectorProxy<E> {
    /// Call a tool through the blocking executor
    ///
    /// # Errors
    /// Resolution errors from [`prepare`](Self::prepare), or
    /// `ProxyError::Execution` when the executor fails
    pub fn call(&self, tool: &str, arguments: Map<String, Value>) -> Result<CallOutcome, ProxyError> {
        let prepared = self.prepare(tool, arguments)?;
        let result = ToolExecutor::execute(&*self.executor, prepared.request)
            .map_err(|err| ProxyError::execution(&self.name, &prepared.tool, err))?;
        Ok(CallOutcome {
            result,
            notices: prepared.notices,
        })
    }
}

impl<E: AsyncToolExecutor + ?Sized> ConnectorProxy<E> {
    /// Call a tool through the async executor
    ///
    /// # Errors
    /// Same as [`call`](ConnectorProxy::call)
    pub async fn call_async(
        &self,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallOutcome, ProxyError> {
        let prepared = self.prepare(tool, arguments)?;
        let result = AsyncToolExecutor::execute(&*self.executor, prepared.request)
            .await
            .map_err(|err| ProxyError::execution(&self.name, &prepared.tool, err))?;
        Ok(CallOutcome {
            result,
            notices: prepared.notices,
        })
    }
}

impl<E: ?Sized> fmt::Debug for ConnectorProxy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorProxy")
            .field("name", &self.name)
            .field("bound_connection", &self.bound_connection)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn build_index(registry: &RegistrySnapshot, connector: &str, config: &ProxyConfig) -> NameIndex {
    let names = registry
        .connector(connector)
        .into_iter()
        .flat_map(|c| c.tools.keys().map(String::as_str));
    NameIndex::build(names, config)
}

fn take_string(arguments: &mut Map<String, Value>, key: &str) -> Option<String> {
    match arguments.remove(key)? {
        Value::Null => None,
        Value::String(value) => Some(value),
        other => Some(other.to_string()),
    }
}
