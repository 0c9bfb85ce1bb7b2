//! Proxy behavior against migration sets built from shared fixtures.

use compat_migration::{build_migrations, MigrationSet};
use compat_proxy::{CompatSession, NoticeKind, ProxyConfig, ProxyError};
use compat_schema::diff_registries;
use compat_test_utils::{
    args, slack_channels_scoped_by, slack_v1, slack_v2_target_channel,
    slack_v2_without_create_channel, RecordingExecutor,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn renamed_param_session() -> (CompatSession<RecordingExecutor>, Arc<RecordingExecutor>) {
    let old = slack_v1();
    let new = slack_v2_target_channel();
    let migrations = build_migrations(&diff_registries(&old, &new, None), &old);
    let executor = Arc::new(RecordingExecutor::new());
    (
        CompatSession::new(new, migrations, Arc::clone(&executor)),
        executor,
    )
}

#[test]
fn omitted_param_gets_default() {
    let (session, executor) = renamed_param_session();

    let outcome = session
        .call("slack", "send_message", args(json!({"text": "hi"})))
        .unwrap();

    assert_eq!(outcome.notices.len(), 1);
    assert_eq!(outcome.notices[0].kind, NoticeKind::DefaultedParam);
    assert_eq!(outcome.notices[0].param.as_deref(), Some("target_channel"));

    let request = executor.last_request().unwrap();
    assert_eq!(request.action_id, "slack.send_message");
    assert_eq!(
        request.arguments,
        args(json!({"text": "hi", "target_channel": ""}))
    );
    assert_eq!(outcome.result, json!({"ok": true, "action_id": "slack.send_message"}));
}

#[test]
fn old_param_is_stripped() {
    let (session, executor) = renamed_param_session();

    let outcome = session
        .call(
            "slack",
            "send_message",
            args(json!({"text": "hi", "channel": "C1", "target_channel": "C2"})),
        )
        .unwrap();

    assert_eq!(outcome.notices.len(), 1);
    assert_eq!(outcome.notices[0].kind, NoticeKind::IgnoredParam);
    assert_eq!(
        executor.last_request().unwrap().arguments,
        args(json!({"text": "hi", "target_channel": "C2"}))
    );
}

#[test]
fn removed_tool_is_forwarded_once() {
    let old = slack_v1();
    let new = slack_v2_without_create_channel();
    let migrations = build_migrations(&diff_registries(&old, &new, None), &old);
    let executor = Arc::new(RecordingExecutor::new());
    let session = CompatSession::new(new, migrations, Arc::clone(&executor));

    let outcome = session
        .call("slack", "create_channel", args(json!({"request": {"name": "ops"}})))
        .unwrap();

    assert_eq!(executor.call_count(), 1);
    assert_eq!(outcome.notices.len(), 1);
    assert_eq!(outcome.notices[0].kind, NoticeKind::RemovedTool);
    assert_eq!(
        executor.last_request().unwrap().action_id,
        "slack.conversations_create"
    );
}

#[test]
fn wrapped_tool_shims_apply_inside_wrapper() {
    let old = slack_channels_scoped_by("team");
    let new = slack_channels_scoped_by("workspace");
    let migrations = build_migrations(&diff_registries(&old, &new, None), &old);
    let executor = Arc::new(RecordingExecutor::new());
    let session = CompatSession::new(new, migrations, Arc::clone(&executor));

    let outcome = session
        .call(
            "slack",
            "create_channel",
            args(json!({"request": {"name": "ops", "team": "T1"}, "tenant_id": "acme"})),
        )
        .unwrap();

    let kinds: Vec<_> = outcome.notices.iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NoticeKind::IgnoredParam, NoticeKind::DefaultedParam]);
    assert_eq!(outcome.notices[0].param.as_deref(), Some("team"));
    assert_eq!(outcome.notices[1].param.as_deref(), Some("workspace"));

    let request = executor.last_request().unwrap();
    assert_eq!(
        request.arguments,
        args(json!({"request": {"name": "ops", "workspace": ""}}))
    );
    assert_eq!(request.overrides.tenant_id.as_deref(), Some("acme"));
}

#[test]
fn flat_arguments_to_wrapped_tool_are_shimmed_at_top_level() {
    let old = slack_channels_scoped_by("team");
    let new = slack_channels_scoped_by("workspace");
    let migrations = build_migrations(&diff_registries(&old, &new, None), &old);
    let executor = Arc::new(RecordingExecutor::new());
    let session = CompatSession::new(new, migrations, Arc::clone(&executor));

    session
        .call("slack", "create_channel", args(json!({"name": "ops", "team": "T1"})))
        .unwrap();

    assert_eq!(
        executor.last_request().unwrap().arguments,
        args(json!({"name": "ops", "workspace": ""}))
    );
}

#[test]
fn unknown_tool_is_not_dispatched() {
    let (session, executor) = renamed_param_session();

    let err = session.call("slack", "delete_message", args(json!({}))).unwrap_err();
    assert!(matches!(
        err,
        ProxyError::ToolNotFound { connector_has_tools: true, .. }
    ));
    let err = session.call("teams", "send_message", args(json!({}))).unwrap_err();
    assert!(matches!(
        err,
        ProxyError::ToolNotFound { connector_has_tools: false, .. }
    ));
    assert_eq!(executor.call_count(), 0);
}

#[test]
fn custom_reserved_prefix() {
    let executor = Arc::new(RecordingExecutor::new());
    let session = CompatSession::new(slack_v1(), MigrationSet::new(), executor)
        .with_config(ProxyConfig::new().with_reserved_prefix("$"));

    let err = session.call("slack", "$schema", args(json!({}))).unwrap_err();
    assert!(matches!(err, ProxyError::ReservedName { .. }));
    // default prefix no longer reserved; falls through to lookup
    let err = session.call("slack", "_schema", args(json!({}))).unwrap_err();
    assert!(matches!(err, ProxyError::ToolNotFound { .. }));
}

#[test]
fn executor_failure_is_surfaced() {
    let session = CompatSession::new(
        slack_v1(),
        MigrationSet::new(),
        Arc::new(RecordingExecutor::failing("rate limited")),
    );
    let err = session
        .call("slack", "send_message", args(json!({"text": "x", "channel": "c"})))
        .unwrap_err();
    assert!(matches!(err, ProxyError::Execution { .. }));
    assert!(err.to_string().contains("rate limited"));
}

#[tokio::test]
async fn async_and_blocking_calls_agree() {
    let (blocking, blocking_executor) = renamed_param_session();
    let (non_blocking, async_executor) = renamed_param_session();
    let arguments = json!({"text": "hi", "channel": "C1", "connection_id": "conn-9"});

    let sync_outcome = blocking
        .call("slack", "send-message", args(arguments.clone()))
        .unwrap();
    let async_outcome = non_blocking
        .call_async("slack", "send-message", args(arguments))
        .await
        .unwrap();

    assert_eq!(sync_outcome, async_outcome);
    assert_eq!(
        blocking_executor.requests(),
        async_executor.requests()
    );
    let request = async_executor.last_request().unwrap();
    assert_eq!(request.overrides.connection_id.as_deref(), Some("conn-9"));
    assert!(!request.arguments.contains_key("connection_id"));
}
