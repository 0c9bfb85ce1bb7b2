//! Error types for the compatibility layer
//!
//! Only resolution and execution can fail a call. Applied shims are reported
//! as [`crate::DeprecationNotice`]s, never as errors.

/// Errors surfaced by a proxied tool call
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Internal name used as a tool name
    #[error("'{tool}' is a reserved name on connector '{connector}'")]
    ReservedName { connector: String, tool: String },

    /// Neither a current nor a removed tool
    #[error("{}", not_found_message(.connector, .tool, .connector_has_tools))]
    ToolNotFound {
        connector: String,
        tool: String,
        /// False when the connector exposes no tools at all
        connector_has_tools: bool,
    },

    /// Executor failed
    #[error("{connector}.{tool} failed: {source}")]
    Execution {
        connector: String,
        tool: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ProxyError {
    /// Check if the call never reached the executor
    #[inline]
    #[must_use]
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Self::ReservedName { .. } | Self::ToolNotFound { .. })
    }

    pub(crate) fn execution(connector: &str, tool: &str, source: anyhow::Error) -> Self {
        Self::Execution {
            connector: connector.to_string(),
            tool: tool.to_string(),
            source: source.into(),
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn not_found_message(connector: &str, tool: &str, connector_has_tools: &bool) -> String {
    if *connector_has_tools {
        format!("tool '{tool}' not found on connector '{connector}'")
    } else {
        format!("tool '{tool}' not found: connector '{connector}' has no tools")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_distinguishes_empty_connector() {
        let typo = ProxyError::ToolNotFound {
            connector: "slack".to_string(),
            tool: "sned".to_string(),
            connector_has_tools: true,
        };
        let empty = ProxyError::ToolNotFound {
            connector: "slack".to_string(),
            tool: "send".to_string(),
            connector_has_tools: false,
        };
        assert_eq!(typo.to_string(), "tool 'sned' not found on connector 'slack'");
        assert!(empty.to_string().contains("has no tools"));
        assert!(typo.is_resolution_failure());
    }

    #[test]
    fn execution_keeps_source() {
        let err = ProxyError::execution("slack", "send", anyhow::anyhow!("timeout"));
        assert!(!err.is_resolution_failure());
        assert_eq!(err.to_string(), "slack.send failed: timeout");
        assert!(std::error::Error::source(&err).is_some());
    }
}
