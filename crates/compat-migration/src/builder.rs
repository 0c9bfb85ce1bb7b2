//! Migration builder
//!
//! Turns the breaking changes of a [`DiffResult`] into a [`MigrationSet`].

use crate::set::{
    DeprecatedParam, DeprecatedTool, MigrationSet, ParamAction, ParamDefault, ToolMigration,
    TypeCoercion,
};
use chrono::{DateTime, Utc};
use compat_schema::{Change, ChangeKind, DiffResult, RegistrySnapshot, ToolSchema};
use serde_json::{json, Value};

/// Wrapper parameter key used when the old schema has no properties
pub const DEFAULT_PARAM_KEY: &str = "input";

/// Placeholder value for a newly required parameter of the given type
///
/// Unknown types fall back to an empty string.
#[must_use]
pub fn default_for_type(type_name: &str) -> Value {
    match type_name {
        "integer" => json!(0),
        "number" => json!(0.0),
        "boolean" => json!(false),
        "array" => json!([]),
        "object" => json!({}),
        _ => json!(""),
    }
}

/// Builds migration sets from diffs
///
/// Pure: the only input besides the diff and the old snapshot is the
/// timestamp, which defaults to the current time.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationBuilder {
    timestamp: Option<DateTime<Utc>>,
}

impl MigrationBuilder {
    /// Builder stamping with the current time
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed timestamp for `created_at` and `removed_at`
    #[inline]
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Build the migration set for the breaking changes of `diff`
    ///
    /// `old` is the snapshot the diff started from; removed tools take their
    /// action identifier and wrapper key from it.
    #[must_use]
    pub fn build(&self, diff: &DiffResult, old: &RegistrySnapshot) -> MigrationSet {
        let now = self.timestamp.unwrap_or_else(Utc::now);
        let mut set = MigrationSet::new().with_created_at(now);

        for change in diff.breaking_changes() {
            record(&mut set, change, old, now);
        }

        set.prune();
        let counts = set.counts();
        tracing::debug!(
            connectors = counts.connectors,
            deprecated_tools = counts.deprecated_tools,
            deprecated_params = counts.deprecated_params,
            param_defaults = counts.param_defaults,
            type_coercions = counts.type_coercions,
            "built migration set"
        );
        set
    }
}

/// Build a migration set stamped with the current time
#[must_use]
pub fn build_migrations(diff: &DiffResult, old: &RegistrySnapshot) -> MigrationSet {
    MigrationBuilder::new().build(diff, old)
}

fn record(set: &mut MigrationSet, change: &Change, old: &RegistrySnapshot, now: DateTime<Utc>) {
    let connector_name = change.connector();
    let tool_name = change.tool();
    let connector = set
        .connectors
        .entry(connector_name.to_string())
        .or_default();

    if change.kind() == ChangeKind::ToolRemoved {
        let old_tool = old.tool(connector_name, tool_name);
        let action_id = old_tool.map(|t| t.action_id.clone()).unwrap_or_default();
        let param_key = old_tool
            .and_then(ToolSchema::wrapper_key)
            .unwrap_or(DEFAULT_PARAM_KEY)
            .to_string();
        let message = format!(
            "Tool '{tool_name}' was removed from connector '{connector_name}'. \
             Calls are forwarded to the former action '{action_id}' and may be rejected \
             by the server; pass parameters under '{param_key}' as before or migrate to \
             a replacement tool."
        );
        connector.deprecated_tools.insert(
            tool_name.to_string(),
            DeprecatedTool {
                action_id,
                param_key,
                message,
                removed_at: now,
            },
        );
        return;
    }

    let Some(param) = change.param() else {
        tracing::debug!(%change, "parameter change without parameter name, skipped");
        return;
    };
    let tool: &mut ToolMigration = connector.tools.entry(tool_name.to_string()).or_default();

    match change.kind() {
        ChangeKind::ParamRemoved => {
            tool.deprecated_params.insert(
                param.to_string(),
                DeprecatedParam {
                    action: ParamAction::Ignored,
                    message: format!(
                        "Parameter '{param}' was removed from '{tool_name}'; \
                         it is now silently dropped from calls."
                    ),
                },
            );
        }
        ChangeKind::ParamAddedRequired => {
            let type_name = change.new_type().unwrap_or_default();
            let default = default_for_type(type_name);
            tool.param_defaults.insert(
                param.to_string(),
                ParamDefault {
                    message: format!(
                        "Parameter '{param}' ({type_name}) is now required by '{tool_name}'; \
                         {default} is sent when it is omitted."
                    ),
                    default,
                    type_name: type_name.to_string(),
                },
            );
        }
        ChangeKind::ParamTypeChanged => {
            let from = change.old_type().unwrap_or_default();
            let to = change.new_type().unwrap_or_default();
            tool.type_coercions.insert(
                param.to_string(),
                TypeCoercion {
                    from: from.to_string(),
                    to: to.to_string(),
                    message: format!(
                        "Parameter '{param}' of '{tool_name}' changed type from {from} to {to}; \
                         the value is passed through unchanged."
                    ),
                },
            );
        }
        ChangeKind::ParamNowRequired => {
            let type_name = change.new_type().unwrap_or_default();
            tool.param_defaults.insert(
                param.to_string(),
                ParamDefault {
                    default: Value::Null,
                    type_name: type_name.to_string(),
                    message: format!(
                        "Parameter '{param}' of '{tool_name}' is now required and has no \
                         default; calls that omit it will be rejected by the server."
                    ),
                },
            );
        }
        ChangeKind::ToolRemoved | ChangeKind::ToolAdded | ChangeKind::ParamNowOptional => {}
    }
}
