//! Sync workflow against a real store file.

use chrono::{TimeZone, Utc};
use compat_migration::{MigrationBuilder, MigrationStore, StoreError};
use compat_proxy::{NoticeKind, ProxyError};
use compat_sync::{plan_sync, SyncConfig, SyncError, SyncOutcome};
use compat_test_utils::{
    args, slack_v1, slack_v2_target_channel, slack_v2_without_create_channel, RecordingExecutor,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn builder() -> MigrationBuilder {
    MigrationBuilder::new().with_timestamp(Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap())
}

#[test]
fn consecutive_syncs_accumulate() {
    let dir = tempfile::tempdir().unwrap();
    let store = MigrationStore::new(dir.path().join("migrations.json"));

    let v1 = slack_v1();
    let v2 = slack_v2_without_create_channel();
    let report = plan_sync(&v1, &v2, None)
        .apply_with(&store, builder(), |_| true)
        .unwrap();
    assert_eq!(report.outcome, SyncOutcome::Written);
    assert_eq!(report.changed, vec!["slack".to_string()]);

    let v3 = slack_v2_target_channel();
    let report = plan_sync(&v1, &v3, None)
        .apply_with(&store, builder(), |diff| diff.breaking_changes().count() == 2)
        .unwrap();
    assert!(report.written());

    let counts = report.stored.unwrap();
    assert_eq!(counts.deprecated_tools, 1);
    assert_eq!(counts.deprecated_params, 1);
    assert_eq!(counts.param_defaults, 1);

    let stored = store.load().unwrap().unwrap();
    assert_eq!(Some(stored.fingerprint), report.fingerprint);
    assert!(stored.set.deprecated_tool("slack", "create_channel").is_some());
}

#[test]
fn identical_snapshots_skip_everything() {
    let dir = tempfile::tempdir().unwrap();
    let store = MigrationStore::new(dir.path().join("migrations.json"));

    let report = plan_sync(&slack_v1(), &slack_v1(), None)
        .apply(&store, |_| panic!("nothing to confirm"))
        .unwrap();
    assert_eq!(report.outcome, SyncOutcome::NoBreakingChanges);
    assert_eq!(report.unchanged, vec!["slack".to_string()]);
    assert!(report.changed.is_empty());
    assert!(store.load().unwrap().is_none());
}

#[test]
fn racing_sync_loses_with_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let store = MigrationStore::new(dir.path().join("migrations.json"));
    let v1 = slack_v1();
    let v2 = slack_v2_without_create_channel();
    let v3 = slack_v2_target_channel();

    // The first sync is confirmed only after a competing sync has written
    let err = plan_sync(&v1, &v2, None)
        .apply_with(&store, builder(), |_| {
            plan_sync(&v1, &v3, None)
                .apply_with(&store, builder(), |_| true)
                .unwrap();
            true
        })
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(matches!(err, SyncError::Store(StoreError::Conflict { .. })));

    let stored = store.load().unwrap().unwrap().set;
    assert!(stored.deprecated_tool("slack", "create_channel").is_none());
    assert!(stored.tool("slack", "send_message").is_some());
}

#[test]
fn session_opened_from_config_uses_store_and_proxy_table() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("state").join("migrations.json");
    let source = format!(
        "store = {:?}\n\n[proxy]\nreserved_prefix = \"$\"\n",
        store_path.display().to_string()
    );
    let config = SyncConfig::from_toml_str(&source, "compat.toml").unwrap();

    let executor = Arc::new(RecordingExecutor::new());
    let empty = config
        .open_session(slack_v2_target_channel(), Arc::clone(&executor))
        .unwrap();
    assert!(empty.migrations().is_empty());

    let v1 = slack_v1();
    let v2 = slack_v2_target_channel();
    plan_sync(&v1, &v2, None)
        .apply_with(&MigrationStore::new(&config.store), builder(), |_| true)
        .unwrap();

    let session = config.open_session(v2, Arc::clone(&executor)).unwrap();
    let outcome = session
        .call("slack", "send_message", args(json!({"text": "hi", "channel": "C1"})))
        .unwrap();
    let kinds: Vec<_> = outcome.notices.iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NoticeKind::IgnoredParam, NoticeKind::DefaultedParam]);

    let err = session.call("slack", "$internal", args(json!({}))).unwrap_err();
    assert!(matches!(err, ProxyError::ReservedName { .. }));
    let err = session.call("slack", "_internal", args(json!({}))).unwrap_err();
    assert!(matches!(err, ProxyError::ToolNotFound { .. }));
    assert_eq!(executor.call_count(), 1);
}
