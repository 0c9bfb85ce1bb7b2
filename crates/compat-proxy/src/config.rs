//! Proxy configuration

use serde::{Deserialize, Serialize};

/// Naming and routing conventions used by [`crate::ConnectorProxy`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Tool names starting with this prefix are internal; empty disables
    pub reserved_prefix: String,

    /// Characters stripped when normalizing tool names
    pub separators: String,

    /// Argument carrying a per-call connection override
    pub connection_key: String,

    /// Argument carrying a per-call tenant override
    pub tenant_key: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            reserved_prefix: "_".to_string(),
            separators: "_-.".to_string(),
            connection_key: "connection_id".to_string(),
            tenant_key: "tenant_id".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Create default config
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set reserved name prefix
    #[inline]
    #[must_use]
    pub fn with_reserved_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reserved_prefix = prefix.into();
        self
    }

    /// Set separator characters
    #[inline]
    #[must_use]
    pub fn with_separators(mut self, separators: impl Into<String>) -> Self {
        self.separators = separators.into();
        self
    }

    /// Set connection override argument key
    #[inline]
    #[must_use]
    pub fn with_connection_key(mut self, key: impl Into<String>) -> Self {
        self.connection_key = key.into();
        self
    }

    /// Set tenant override argument key
    #[inline]
    #[must_use]
    pub fn with_tenant_key(mut self, key: impl Into<String>) -> Self {
        self.tenant_key = key.into();
        self
    }

    /// Whether `name` is an internal name rather than a tool
    #[inline]
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        !self.reserved_prefix.is_empty() && name.starts_with(&self.reserved_prefix)
    }

    /// `name` with every separator character removed
    #[must_use]
    pub fn normalize(&self, name: &str) -> String {
        name.chars()
            .filter(|c| !self.separators.contains(*c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProxyConfig::default();
        assert!(config.is_reserved("_internal"));
        assert!(!config.is_reserved("send_message"));
        assert_eq!(config.normalize("send-message.v2_x"), "sendmessagev2x");
    }

    #[test]
    fn empty_prefix_reserves_nothing() {
        let config = ProxyConfig::new().with_reserved_prefix("");
        assert!(!config.is_reserved("_internal"));
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config: ProxyConfig = serde_json::from_str(r#"{"tenant_key": "org"}"#).unwrap();
        assert_eq!(config.tenant_key, "org");
        assert_eq!(config.connection_key, "connection_id");
        assert_eq!(config.separators, "_-.");
    }
}
