//! End-to-end builder and merger scenarios on shared fixtures.

use compat_migration::{build_migrations, merge_migrations, ParamAction};
use compat_schema::{diff_registries, ChangeKind};
use compat_test_utils::{
    slack_and_jira_migrations, slack_migrations, slack_v1, slack_v2_target_channel,
    slack_v2_without_create_channel,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn renamed_required_param() {
    let old = slack_v1();
    let diff = diff_registries(&old, &slack_v2_target_channel(), None);

    let kinds: Vec<_> = diff.breaking_changes().map(|c| (c.kind(), c.param())).collect();
    assert_eq!(
        kinds,
        vec![
            (ChangeKind::ParamRemoved, Some("channel")),
            (ChangeKind::ParamAddedRequired, Some("target_channel")),
        ]
    );
    assert_eq!(diff.len(), 2);

    let set = build_migrations(&diff, &old);
    let tool = set.tool("slack", "send_message").unwrap();
    assert_eq!(tool.deprecated_params["channel"].action, ParamAction::Ignored);
    assert_eq!(tool.param_defaults["target_channel"].default, json!(""));
    assert_eq!(tool.param_defaults["target_channel"].type_name, "string");
    assert!(tool.type_coercions.is_empty());
}

#[test]
fn removed_tool_keeps_action_id() {
    let old = slack_v1();
    let diff = diff_registries(&old, &slack_v2_without_create_channel(), None);
    assert_eq!(diff.len(), 1);
    assert_eq!(diff.changes()[0].kind(), ChangeKind::ToolRemoved);

    let set = build_migrations(&diff, &old);
    let removed = set.deprecated_tool("slack", "create_channel").unwrap();
    assert_eq!(removed.action_id, "slack.conversations_create");
    assert_eq!(removed.param_key, "request");
    assert!(set.connector("slack").unwrap().tools.is_empty());
}

#[test]
fn merge_adds_connectors_and_prefers_newer_leaves() {
    let older = slack_migrations("old message");
    let newer = slack_and_jira_migrations("new message");

    let merged = merge_migrations(Some(&older), Some(&newer));
    assert_eq!(
        merged.connectors.keys().collect::<Vec<_>>(),
        vec!["jira", "slack"]
    );
    assert_eq!(
        merged.tool("slack", "send_message").unwrap().deprecated_params["channel"].message,
        "new message"
    );
    assert_eq!(
        merged.tool("jira", "create_issue").unwrap().param_defaults["project"].default,
        json!("")
    );
}

#[test]
fn builder_ignores_non_breaking_changes() {
    // Reversed direction: only additions and loosened requirements
    let diff = diff_registries(&slack_v2_without_create_channel(), &slack_v1(), None);
    assert!(!diff.has_breaking());
    assert!(build_migrations(&diff, &slack_v2_without_create_channel()).is_empty());
}
