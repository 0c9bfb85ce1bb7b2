//! Migration set document
//!
//! [`MigrationSet`] is the persisted description of how to keep old calling
//! conventions working against a newer registry. Its JSON shape is the
//! on-disk format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

fn format_version() -> u32 {
    FORMAT_VERSION
}

/// Timestamp fields: RFC 3339 on write, RFC 3339 or naive ISO 8601 (read as
/// UTC) on read
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| raw.parse::<NaiveDateTime>().ok().map(|t| t.and_utc()))
    }

    fn checked<E: serde::de::Error>(raw: &str) -> Result<DateTime<Utc>, E> {
        parse(raw).ok_or_else(|| E::custom(format!("invalid timestamp {raw:?}")))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        checked(&raw)
    }

    pub(super) fn deserialize_option<'de, D>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| checked(&raw))
            .transpose()
    }
}

/// Accumulated compatibility knowledge for all connectors
///
/// # Invariants
/// - a freshly built set never contains empty connector or tool entries
/// - treated as immutable once loaded into a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationSet {
    /// Format version
    #[serde(default = "format_version")]
    pub version: u32,

    /// Creation time of the newest contributing build
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,

    /// Per-connector migrations
    #[serde(default)]
    pub connectors: BTreeMap<String, ConnectorMigration>,
}

impl Default for MigrationSet {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            created_at: None,
            connectors: BTreeMap::new(),
        }
    }
}

impl MigrationSet {
    /// Create an empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set creation time
    #[inline]
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builder-style connector insertion
    #[must_use]
    pub fn with_connector(mut self, name: impl Into<String>, migration: ConnectorMigration) -> Self {
        self.connectors.insert(name.into(), migration);
        self
    }

    /// Parse from JSON
    ///
    /// # Errors
    /// Returns error if the document does not match the migration set shape
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Pretty JSON rendering (the persisted form)
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// No connector carries any migration
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Migrations for one connector
    #[inline]
    #[must_use]
    pub fn connector(&self, name: &str) -> Option<&ConnectorMigration> {
        self.connectors.get(name)
    }

    /// Migrations for one active tool
    #[inline]
    #[must_use]
    pub fn tool(&self, connector: &str, tool: &str) -> Option<&ToolMigration> {
        self.connector(connector).and_then(|c| c.tools.get(tool))
    }

    /// Deprecation record for a removed tool
    #[inline]
    #[must_use]
    pub fn deprecated_tool(&self, connector: &str, tool: &str) -> Option<&DeprecatedTool> {
        self.connector(connector)
            .and_then(|c| c.deprecated_tools.get(tool))
    }

    /// Drop empty tool entries, then empty connector entries
    pub fn prune(&mut self) {
        for migration in self.connectors.values_mut() {
            migration.tools.retain(|_, tool| !tool.is_empty());
        }
        self.connectors.retain(|_, migration| !migration.is_empty());
    }

    /// Entry counts, for reports
    #[must_use]
    pub fn counts(&self) -> MigrationCounts {
        let mut counts = MigrationCounts {
            connectors: self.connectors.len(),
            ..MigrationCounts::default()
        };
        for connector in self.connectors.values() {
            counts.deprecated_tools += connector.deprecated_tools.len();
            for tool in connector.tools.values() {
                counts.deprecated_params += tool.deprecated_params.len();
                counts.param_defaults += tool.param_defaults.len();
                counts.type_coercions += tool.type_coercions.len();
            }
        }
        counts
    }
}

/// Migrations of a single connector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorMigration {
    /// Removed tools, kept for forwarding and messages
    #[serde(default)]
    pub deprecated_tools: BTreeMap<String, DeprecatedTool>,

    /// Shims for tools that still exist
    #[serde(default)]
    pub tools: BTreeMap<String, ToolMigration>,
}

impl ConnectorMigration {
    /// Neither removed tools nor tool shims
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deprecated_tools.is_empty() && self.tools.is_empty()
    }
}

/// Record of a tool that no longer exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeprecatedTool {
    /// Action identifier the tool used to dispatch to
    #[serde(rename = "actionId")]
    pub action_id: String,

    /// Wrapper parameter key of the old input schema
    #[serde(rename = "paramKey")]
    pub param_key: String,

    /// Human explanation
    pub message: String,

    /// When the removal was recorded
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub removed_at: DateTime<Utc>,
}

/// Parameter-level shims for one tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolMigration {
    /// Parameters the server no longer accepts
    #[serde(default)]
    pub deprecated_params: BTreeMap<String, DeprecatedParam>,

    /// Parameters that must now be present
    #[serde(default)]
    pub param_defaults: BTreeMap<String, ParamDefault>,

    /// Parameters whose declared type changed
    #[serde(default)]
    pub type_coercions: BTreeMap<String, TypeCoercion>,
}

impl ToolMigration {
    /// All three maps are empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deprecated_params.is_empty()
            && self.param_defaults.is_empty()
            && self.type_coercions.is_empty()
    }
}

/// What happens to a removed parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamAction {
    /// Stripped from the call before dispatch
    Ignored,
}

/// Removed parameter record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeprecatedParam {
    pub action: ParamAction,
    pub message: String,
}

/// Newly required parameter record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDefault {
    /// Injected when the caller omits the parameter; null means none
    #[serde(default)]
    pub default: Value,

    /// Declared type in the new schema
    #[serde(rename = "type")]
    pub type_name: String,

    pub message: String,
}

/// Advisory record of a type change; values are never converted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCoercion {
    pub from: String,
    pub to: String,
    pub message: String,
}

/// Entry counts of a migration set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationCounts {
    pub connectors: usize,
    pub deprecated_tools: usize,
    pub deprecated_params: usize,
    pub param_defaults: usize,
    pub type_coercions: usize,
}
