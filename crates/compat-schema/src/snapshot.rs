//! Registry snapshot model
//!
//! A [`RegistrySnapshot`] is a point-in-time description of every connector,
//! the tools it exposes and their input schemas. Snapshots are plain value
//! data: nothing in this workspace mutates one after it has been loaded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Declared type recorded for parameters whose schema has no `type`.
pub const ANY_TYPE: &str = "any";

/// Point-in-time view of all connectors of a registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Connector definitions by name
    #[serde(default)]
    pub connectors: BTreeMap<String, ConnectorSchema>,
}

impl RegistrySnapshot {
    /// Create an empty snapshot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a snapshot from its JSON representation
    ///
    /// # Errors
    /// Returns error if the document is not valid JSON or has the wrong shape
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a snapshot file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Builder-style connector insertion
    #[must_use]
    pub fn with_connector(mut self, name: impl Into<String>, connector: ConnectorSchema) -> Self {
        self.connectors.insert(name.into(), connector);
        self
    }

    /// Look up a connector
    #[inline]
    #[must_use]
    pub fn connector(&self, name: &str) -> Option<&ConnectorSchema> {
        self.connectors.get(name)
    }

    /// Look up a tool of a connector
    #[inline]
    #[must_use]
    pub fn tool(&self, connector: &str, tool: &str) -> Option<&ToolSchema> {
        self.connector(connector).and_then(|c| c.tools.get(tool))
    }

    /// Connector names in sorted order
    pub fn connector_names(&self) -> impl Iterator<Item = &str> {
        self.connectors.keys().map(String::as_str)
    }
}

/// One connector and its tools
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorSchema {
    /// Tool definitions by name
    #[serde(default)]
    pub tools: BTreeMap<String, ToolSchema>,

    /// Display metadata (name, category, counts); never hashed or diffed
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConnectorSchema {
    /// Create a connector without tools
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style tool insertion
    #[must_use]
    pub fn with_tool(mut self, name: impl Into<String>, tool: ToolSchema) -> Self {
        self.tools.insert(name.into(), tool);
        self
    }

    /// Whether the connector exposes any tool
    #[inline]
    #[must_use]
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// A single tool definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Server-side action identifier the tool dispatches to
    #[serde(rename = "actionId", default)]
    pub action_id: String,

    /// Human description
    #[serde(default)]
    pub description: String,

    /// JSON-Schema-like parameter tree
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,

    /// Remaining metadata
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolSchema {
    /// Create a tool with an empty schema
    #[must_use]
    pub fn new(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            ..Self::default()
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set input schema
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Parameters declared by the input schema, by name
    #[must_use]
    pub fn params(&self) -> BTreeMap<String, ParamSpec> {
        extract_params(&self.input_schema)
    }

    /// Key the parameters are nested under, when the schema is wrapped
    ///
    /// Same detection as [`extract_params`]: the outer schema has exactly one
    /// property and that property is an object schema with `properties`.
    #[must_use]
    pub fn param_wrapper(&self) -> Option<&str> {
        wrapper_entry(&self.input_schema).map(|(key, _)| key)
    }

    /// First property name of the outer schema object
    ///
    /// For wrapped schemas this is the key the real parameters are nested
    /// under. Properties are kept in sorted order, so "first" means
    /// lexicographically first.
    #[must_use]
    pub fn wrapper_key(&self) -> Option<&str> {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .and_then(|props| props.keys().next())
            .map(String::as_str)
    }
}

/// Declared metadata of one parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name
    pub name: String,

    /// Declared type, verbatim (`a|b` for type unions)
    pub type_name: String,

    /// Whether the schema lists the parameter as required
    pub required: bool,
}

/// Extract the parameters declared by an input schema
///
/// A schema whose only property is itself an object schema with
/// `properties` is treated as a wrapper and parameters are read one level
/// down. Anything that is not an object yields no parameters.
#[must_use]
pub fn extract_params(schema: &Value) -> BTreeMap<String, ParamSpec> {
    let Some(level) = parameter_level(schema) else {
        return BTreeMap::new();
    };

    let required: BTreeSet<&str> = level
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = level.get("properties").and_then(Value::as_object) else {
        return BTreeMap::new();
    };

    properties
        .iter()
        .map(|(name, decl)| {
            let spec = ParamSpec {
                name: name.clone(),
                type_name: declared_type(decl),
                required: required.contains(name.as_str()),
            };
            (name.clone(), spec)
        })
        .collect()
}

fn parameter_level(schema: &Value) -> Option<&Map<String, Value>> {
    let outer = schema.as_object()?;
    Some(wrapper_entry(schema).map_or(outer, |(_, inner)| inner))
}

fn wrapper_entry(schema: &Value) -> Option<(&str, &Map<String, Value>)> {
    let (key, inner) = schema
        .get("properties")
        .and_then(Value::as_object)
        .filter(|props| props.len() == 1)
        .and_then(|props| props.iter().next())?;

    inner
        .as_object()
        .filter(|inner| inner.get("properties").is_some_and(Value::is_object))
        .map(|inner| (key.as_str(), inner))
}

fn declared_type(decl: &Value) -> String {
    match decl.get("type") {
        Some(Value::String(name)) => name.clone(),
        Some(Value::Array(names)) => {
            let joined = names
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("|");
            if joined.is_empty() {
                ANY_TYPE.to_string()
            } else {
                joined
            }
        }
        _ => ANY_TYPE.to_string(),
    }
}

/// Errors loading a snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Snapshot file could not be read
    #[error("cannot read snapshot {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Document is not a valid snapshot
    #[error("invalid snapshot: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_parses_wire_shape() {
        let snapshot = RegistrySnapshot::from_json(
            r#"{
                "connectors": {
                    "slack": {
                        "displayName": "Slack",
                        "tools": {
                            "send_message": {
                                "actionId": "slack.send",
                                "description": "Send a message",
                                "inputSchema": {"type": "object"}
                            }
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        let tool = snapshot.tool("slack", "send_message").unwrap();
        assert_eq!(tool.action_id, "slack.send");
        assert_eq!(
            snapshot.connector("slack").unwrap().extra.get("displayName"),
            Some(&json!("Slack"))
        );
    }

    #[test]
    fn snapshot_tolerates_missing_fields() {
        let snapshot =
            RegistrySnapshot::from_json(r#"{"connectors": {"jira": {"tools": {"x": {}}}}}"#)
                .unwrap();
        let tool = snapshot.tool("jira", "x").unwrap();
        assert!(tool.action_id.is_empty());
        assert!(tool.input_schema.is_null());
        assert!(tool.params().is_empty());

        let empty = RegistrySnapshot::from_json("{}").unwrap();
        assert!(empty.connectors.is_empty());
    }

    #[test]
    fn params_from_flat_schema() {
        let tool = ToolSchema::new("a").with_input_schema(json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "count": {"type": "integer"}
            },
            "required": ["text"]
        }));

        let params = tool.params();
        assert_eq!(params.len(), 2);
        assert!(params["text"].required);
        assert!(!params["count"].required);
        assert_eq!(params["count"].type_name, "integer");
    }

    #[test]
    fn params_from_wrapped_schema() {
        let tool = ToolSchema::new("a").with_input_schema(json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "object",
                    "properties": {
                        "channel": {"type": "string"},
                        "text": {"type": "string"}
                    },
                    "required": ["channel"]
                }
            },
            "required": ["input"]
        }));

        let params = tool.params();
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["channel", "text"]);
        assert!(params["channel"].required);
        assert!(!params["text"].required);
        assert_eq!(tool.wrapper_key(), Some("input"));
        assert_eq!(tool.param_wrapper(), Some("input"));
    }

    #[test]
    fn single_scalar_property_is_not_a_wrapper() {
        let tool = ToolSchema::new("a").with_input_schema(json!({
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        }));
        let params = tool.params();
        assert!(params["query"].required);
        assert_eq!(tool.param_wrapper(), None);
        assert_eq!(tool.wrapper_key(), Some("query"));
    }

    #[test]
    fn declared_type_variants() {
        let tool = ToolSchema::new("a").with_input_schema(json!({
            "properties": {
                "a": {"type": ["string", "null"]},
                "b": {},
                "c": {"type": []}
            }
        }));
        let params = tool.params();
        assert_eq!(params["a"].type_name, "string|null");
        assert_eq!(params["b"].type_name, ANY_TYPE);
        assert_eq!(params["c"].type_name, ANY_TYPE);
    }

    #[test]
    fn wrapper_key_absent_without_properties() {
        let tool = ToolSchema::new("a").with_input_schema(json!({"type": "object"}));
        assert_eq!(tool.wrapper_key(), None);
    }

    #[test]
    fn from_path_reports_missing_file() {
        let result = RegistrySnapshot::from_path("/definitely/not/here.json");
        assert!(matches!(result, Err(SnapshotError::Io { .. })));
    }
}
