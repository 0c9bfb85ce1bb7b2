//! Tool name resolution
//!
//! A requested name is tried against a fixed, ordered list of [`Strategy`]s.
//! The first hit wins; nothing is retried beyond the list.

use crate::config::ProxyConfig;
use compat_migration::DeprecatedTool;
use compat_schema::ToolSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Lookup strategy, in the order they are attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Name is a current tool
    Exact,
    /// Name matches a current tool once separators are stripped from both
    Normalized,
    /// Name is a removed tool recorded in the migration set
    Deprecated,
}

impl Strategy {
    /// Attempt order
    pub const ORDER: [Strategy; 3] = [Self::Exact, Self::Normalized, Self::Deprecated];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
            Self::Deprecated => "deprecated",
        })
    }
}

/// Outcome of resolving a tool name
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    /// Current tool
    Active {
        /// Registry name of the tool
        tool: &'a str,
        schema: &'a ToolSchema,
        strategy: Strategy,
    },
    /// Removed tool; calls go to the recorded action
    Deprecated {
        tool: &'a str,
        record: &'a DeprecatedTool,
    },
    /// No strategy matched
    NotFound { connector_has_tools: bool },
}

impl Resolution<'_> {
    /// Action identifier a call would be forwarded to
    #[must_use]
    pub fn action_id(&self) -> Option<&str> {
        match self {
            Self::Active { schema, .. } => Some(&schema.action_id),
            Self::Deprecated { record, .. } => Some(&record.action_id),
            Self::NotFound { .. } => None,
        }
    }

    /// Whether the call can be dispatched
    #[inline]
    #[must_use]
    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }
}

/// Separator-free spelling → registry name
///
/// When two tools normalize to the same key the lexicographically first one
/// is kept.
#[derive(Debug, Clone, Default)]
pub(crate) struct NameIndex {
    by_normalized: BTreeMap<String, String>,
}

impl NameIndex {
    pub(crate) fn build<'a>(names: impl IntoIterator<Item = &'a str>, config: &ProxyConfig) -> Self {
        let mut by_normalized = BTreeMap::new();
        for name in names {
            by_normalized
                .entry(config.normalize(name))
                .or_insert_with(|| name.to_string());
        }
        Self { by_normalized }
    }

    pub(crate) fn get(&self, normalized: &str) -> Option<&str> {
        self.by_normalized.get(normalized).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_maps_spellings_to_registry_names() {
        let config = ProxyConfig::default();
        let index = NameIndex::build(["send_message", "list-users"], &config);
        assert_eq!(index.get("sendmessage"), Some("send_message"));
        assert_eq!(index.get(&config.normalize("list.users")), Some("list-users"));
        assert_eq!(index.get("send"), None);
    }

    #[test]
    fn index_collision_keeps_first() {
        let config = ProxyConfig::default();
        let index = NameIndex::build(["a-b", "a_b"], &config);
        assert_eq!(index.get("ab"), Some("a-b"));
    }

    #[test]
    fn strategy_order() {
        assert_eq!(
            Strategy::ORDER,
            [Strategy::Exact, Strategy::Normalized, Strategy::Deprecated]
        );
    }
}
