//! Testing utilities for the connector compatibility workspace
//!
//! Shared registry fixtures, migration fixtures and a recording executor.

#![allow(missing_docs)]

use compat_migration::{
    ConnectorMigration, DeprecatedParam, MigrationSet, ParamAction, ParamDefault, ToolMigration,
};
use compat_proxy::{AsyncToolExecutor, ExecutionRequest, ToolExecutor};
use compat_schema::{ConnectorSchema, RegistrySnapshot, ToolSchema};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

/// Object literal → argument map
pub fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("arguments must be a JSON object, got {other}"),
    }
}

fn send_message(channel_param: &str) -> ToolSchema {
    ToolSchema::new("slack.send_message")
        .with_description("Post a message")
        .with_input_schema(json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                channel_param: {"type": "string"}
            },
            "required": ["text", channel_param]
        }))
}

fn create_channel() -> ToolSchema {
    ToolSchema::new("slack.conversations_create")
        .with_description("Create a channel")
        .with_input_schema(json!({
            "type": "object",
            "properties": {
                "request": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "is_private": {"type": "boolean"}
                    },
                    "required": ["name"]
                }
            }
        }))
}

/// Slack with only a wrapped `create_channel(request: {name, <scope>})`,
/// both parameters required
pub fn slack_channels_scoped_by(scope: &str) -> RegistrySnapshot {
    RegistrySnapshot::new().with_connector(
        "slack",
        ConnectorSchema::new().with_tool(
            "create_channel",
            ToolSchema::new("slack.conversations_create").with_input_schema(json!({
                "type": "object",
                "properties": {
                    "request": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            scope: {"type": "string"}
                        },
                        "required": ["name", scope]
                    }
                }
            })),
        ),
    )
}

/// Slack with `send_message(text, channel)` and `create_channel`
pub fn slack_v1() -> RegistrySnapshot {
    RegistrySnapshot::new().with_connector(
        "slack",
        ConnectorSchema::new()
            .with_tool("send_message", send_message("channel"))
            .with_tool("create_channel", create_channel()),
    )
}

/// `send_message` takes `target_channel` instead of `channel`
pub fn slack_v2_target_channel() -> RegistrySnapshot {
    RegistrySnapshot::new().with_connector(
        "slack",
        ConnectorSchema::new()
            .with_tool("send_message", send_message("target_channel"))
            .with_tool("create_channel", create_channel()),
    )
}

/// `create_channel` is gone
pub fn slack_v2_without_create_channel() -> RegistrySnapshot {
    RegistrySnapshot::new().with_connector(
        "slack",
        ConnectorSchema::new().with_tool("send_message", send_message("channel")),
    )
}

/// Jira with a single `create_issue`
pub fn jira_v1() -> RegistrySnapshot {
    RegistrySnapshot::new().with_connector(
        "jira",
        ConnectorSchema::new().with_tool(
            "create_issue",
            ToolSchema::new("jira.create_issue").with_input_schema(json!({
                "type": "object",
                "properties": {
                    "summary": {"type": "string"},
                    "priority": {"type": "string"}
                },
                "required": ["summary"]
            })),
        ),
    )
}

fn tool_migration(
    ignored: &[(&str, &str)],
    defaults: &[(&str, Value, &str)],
) -> ToolMigration {
    let mut tool = ToolMigration::default();
    for (param, message) in ignored {
        tool.deprecated_params.insert(
            (*param).to_string(),
            DeprecatedParam {
                action: ParamAction::Ignored,
                message: (*message).to_string(),
            },
        );
    }
    for (param, default, type_name) in defaults {
        tool.param_defaults.insert(
            (*param).to_string(),
            ParamDefault {
                default: default.clone(),
                type_name: (*type_name).to_string(),
                message: format!("{param} is now required"),
            },
        );
    }
    tool
}

fn connector_with_tool(tool: &str, migration: ToolMigration) -> ConnectorMigration {
    let mut connector = ConnectorMigration::default();
    connector.tools.insert(tool.to_string(), migration);
    connector
}

/// Slack-only set: `send_message.channel` ignored
pub fn slack_migrations(message: &str) -> MigrationSet {
    MigrationSet::new().with_connector(
        "slack",
        connector_with_tool(
            "send_message",
            tool_migration(&[("channel", message)], &[]),
        ),
    )
}

/// Slack and Jira set: `send_message.channel` ignored, `jira.create_issue.project` defaulted
pub fn slack_and_jira_migrations(slack_message: &str) -> MigrationSet {
    slack_migrations(slack_message).with_connector(
        "jira",
        connector_with_tool(
            "create_issue",
            tool_migration(&[], &[("project", json!(""), "string")]),
        ),
    )
}

/// Executor recording every request it receives
///
/// Returns `{"ok": true, "action_id": ...}` unless built with [`failing`](Self::failing).
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    requests: Mutex<Vec<ExecutionRequest>>,
    failure: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor failing every call with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<ExecutionRequest> {
        self.requests.lock().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn record(&self, request: ExecutionRequest) -> anyhow::Result<Value> {
        let action_id = request.action_id.clone();
        self.requests.lock().push(request);
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(json!({"ok": true, "action_id": action_id})),
        }
    }
}

impl ToolExecutor for RecordingExecutor {
    fn execute(&self, request: ExecutionRequest) -> anyhow::Result<Value> {
        self.record(request)
    }
}

#[async_trait::async_trait]
impl AsyncToolExecutor for RecordingExecutor {
    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<Value> {
        self.record(request)
    }
}
