//! Execution seam
//!
//! The proxy never talks to a server itself. After resolution and migration it
//! hands an [`ExecutionRequest`] to an executor supplied by the host, either
//! blocking ([`ToolExecutor`]) or async ([`AsyncToolExecutor`]).

use serde::Serialize;
use serde_json::{Map, Value};

/// Connector a request is bound to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectorBinding {
    /// Connector name
    pub name: String,
    /// Connection pre-bound when the proxy was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound_connection: Option<String>,
}

/// Routing overrides taken out of the call arguments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallOverrides {
    /// Effective connection: the call-time override, else the pre-bound one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl CallOverrides {
    /// No override present
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connection_id.is_none() && self.tenant_id.is_none()
    }
}

/// Fully resolved call, ready for dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRequest {
    /// Server-side action identifier
    pub action_id: String,
    /// Migrated arguments, routing keys removed
    pub arguments: Map<String, Value>,
    pub connector: ConnectorBinding,
    pub overrides: CallOverrides,
}

/// Blocking executor
///
/// The returned value is passed back to the caller uninterpreted.
pub trait ToolExecutor: Send + Sync {
    /// Dispatch one request
    ///
    /// # Errors
    /// Transport or server failures
    fn execute(&self, request: ExecutionRequest) -> anyhow::Result<Value>;
}

impl<F> ToolExecutor for F
where
    F: Fn(ExecutionRequest) -> anyhow::Result<Value> + Send + Sync,
{
    fn execute(&self, request: ExecutionRequest) -> anyhow::Result<Value> {
        self(request)
    }
}

/// Non-blocking executor
#[async_trait::async_trait]
pub trait AsyncToolExecutor: Send + Sync {
    /// Dispatch one request
    ///
    /// # Errors
    /// Transport or server failures
    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<Value>;
}
