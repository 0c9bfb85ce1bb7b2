//! Sync planning and application
//!
//! A sync compares the previously seen registry with the current one,
//! confirms the breaking changes with the operator and folds the resulting
//! migrations into the store:
//!
//! hash pre-check → diff → load → confirm → build → merge → save

use crate::error::SyncError;
use compat_migration::{merge_migrations, MigrationBuilder, MigrationCounts, MigrationStore};
use compat_schema::{
    compute_schema_hash, diff_registries, DiffResult, DiffSummary, Fingerprint, RegistrySnapshot,
};
use serde::Serialize;
use std::collections::BTreeSet;

/// Per-connector schema fingerprints, old and new
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorHashes {
    pub connector: String,
    pub old: Fingerprint,
    pub new: Fingerprint,
}

impl ConnectorHashes {
    /// Fingerprints differ
    #[inline]
    #[must_use]
    pub fn changed(&self) -> bool {
        self.old != self.new
    }
}

/// Result of comparing two snapshots, before anything is written
#[derive(Debug, Clone)]
pub struct SyncPlan<'a> {
    old: &'a RegistrySnapshot,
    hashes: Vec<ConnectorHashes>,
    added: Vec<String>,
    removed: Vec<String>,
    diff: DiffResult,
}

/// What [`SyncPlan::apply`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Nothing breaking; store untouched
    NoBreakingChanges,
    /// Operator refused; store untouched
    Declined,
    /// Merged set written
    Written,
}

/// Summary of a sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// Connectors skipped by the hash pre-check
    pub unchanged: Vec<String>,
    /// Connectors that were diffed
    pub changed: Vec<String>,
    pub summary: DiffSummary,
    /// Counts of the stored set after the write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<MigrationCounts>,
    /// Fingerprint of the written store file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
}

impl SyncReport {
    /// Whether the store was written
    #[inline]
    #[must_use]
    pub fn written(&self) -> bool {
        self.outcome == SyncOutcome::Written
    }
}

/// Compare `old` and `new`, diffing only connectors whose hash changed
///
/// `only` restricts the connectors considered; names absent from both
/// snapshots are ignored. Connectors present in just one snapshot are
/// reported as added or removed and not diffed.
#[must_use]
pub fn plan_sync<'a>(
    old: &'a RegistrySnapshot,
    new: &RegistrySnapshot,
    only: Option<&[&str]>,
) -> SyncPlan<'a> {
    let candidates: Vec<&str> = match only {
        Some(names) => {
            let mut seen = BTreeSet::new();
            names.iter().copied().filter(|n| seen.insert(*n)).collect()
        }
        None => old
            .connector_names()
            .chain(new.connector_names())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let mut hashes = Vec::new();
    let mut added = Vec::new();
    let mut removed = Vec::new();
    for name in candidates {
        match (old.connector(name).is_some(), new.connector(name).is_some()) {
            (true, true) => {
                let entry = ConnectorHashes {
                    connector: name.to_string(),
                    old: compute_schema_hash(old, name),
                    new: compute_schema_hash(new, name),
                };
                tracing::debug!(
                    connector = name,
                    old = %entry.old,
                    new = %entry.new,
                    changed = entry.changed(),
                    "schema hash pre-check"
                );
                hashes.push(entry);
            }
            (false, true) => added.push(name.to_string()),
            (true, false) => removed.push(name.to_string()),
            (false, false) => tracing::debug!(connector = name, "connector unknown, ignored"),
        }
    }

    let changed: Vec<&str> = hashes
        .iter()
        .filter(|h| h.changed())
        .map(|h| h.connector.as_str())
        .collect();
    let diff = if changed.is_empty() {
        DiffResult::default()
    } else {
        diff_registries(old, new, Some(changed.as_slice()))
    };

    tracing::info!(
        changed = changed.len(),
        unchanged = hashes.len() - changed.len(),
        changes = diff.len(),
        breaking = diff.breaking_changes().count(),
        "sync planned"
    );

    SyncPlan {
        old,
        hashes,
        added,
        removed,
        diff,
    }
}

impl SyncPlan<'_> {
    /// Diff of the changed connectors
    #[inline]
    #[must_use]
    pub fn diff(&self) -> &DiffResult {
        &self.diff
    }

    /// Hash pre-check results
    #[inline]
    #[must_use]
    pub fn hashes(&self) -> &[ConnectorHashes] {
        &self.hashes
    }

    /// Connectors whose hash did not change
    #[must_use]
    pub fn unchanged(&self) -> Vec<String> {
        self.hashes
            .iter()
            .filter(|h| !h.changed())
            .map(|h| h.connector.clone())
            .collect()
    }

    /// Connectors whose hash changed
    #[must_use]
    pub fn changed(&self) -> Vec<String> {
        self.hashes
            .iter()
            .filter(|h| h.changed())
            .map(|h| h.connector.clone())
            .collect()
    }

    /// Connectors only in the new snapshot
    #[inline]
    #[must_use]
    pub fn added_connectors(&self) -> &[String] {
        &self.added
    }

    /// Connectors only in the old snapshot
    #[inline]
    #[must_use]
    pub fn removed_connectors(&self) -> &[String] {
        &self.removed
    }

    /// Build, merge and persist migrations for the breaking changes
    ///
    /// `confirm` sees the diff before anything is written and is not called
    /// when there is nothing breaking. The store is read before `confirm`
    /// runs, so a write by another sync in the meantime is a conflict.
    ///
    /// # Errors
    /// Store failures, including `StoreError::Conflict` when another sync
    /// wrote the store after it was loaded here
    pub fn apply<F>(&self, store: &MigrationStore, confirm: F) -> Result<SyncReport, SyncError>
    where
        F: FnOnce(&DiffResult) -> bool,
    {
        self.apply_with(store, MigrationBuilder::new(), confirm)
    }

    /// [`apply`](Self::apply) with an explicit builder
    ///
    /// # Errors
    /// See [`apply`](Self::apply)
    pub fn apply_with<F>(
        &self,
        store: &MigrationStore,
        builder: MigrationBuilder,
        confirm: F,
    ) -> Result<SyncReport, SyncError>
    where
        F: FnOnce(&DiffResult) -> bool,
    {
        let report = |outcome, stored, fingerprint| SyncReport {
            outcome,
            unchanged: self.unchanged(),
            changed: self.changed(),
            summary: self.diff.summary(),
            stored,
            fingerprint,
        };

        if !self.diff.has_breaking() {
            tracing::info!("no breaking changes, store untouched");
            return Ok(report(SyncOutcome::NoBreakingChanges, None, None));
        }

        // Fingerprint taken before confirming; a write in between fails the save
        let existing = store.load()?;
        if !confirm(&self.diff) {
            tracing::info!("sync declined, store untouched");
            return Ok(report(SyncOutcome::Declined, None, None));
        }

        let built = builder.build(&self.diff, self.old);
        let merged = merge_migrations(existing.as_ref().map(|s| &s.set), Some(&built));
        let fingerprint = store.save(&merged, existing.as_ref().map(|s| &s.fingerprint))?;

        tracing::info!(
            path = %store.path().display(),
            %fingerprint,
            connectors = merged.connectors.len(),
            "migrations stored"
        );
        Ok(report(
            SyncOutcome::Written,
            Some(merged.counts()),
            Some(fingerprint),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compat_schema::{ConnectorSchema, ToolSchema};
    use serde_json::json;

    fn registry(github_required: &[&str]) -> RegistrySnapshot {
        RegistrySnapshot::new()
            .with_connector(
                "github",
                ConnectorSchema::new().with_tool(
                    "create_pr",
                    ToolSchema::new("github.create_pr").with_input_schema(json!({
                        "properties": {"title": {"type": "string"}, "body": {"type": "string"}},
                        "required": github_required
                    })),
                ),
            )
            .with_connector(
                "notion",
                ConnectorSchema::new().with_tool("search", ToolSchema::new("notion.search")),
            )
    }

    #[test]
    fn unchanged_connectors_are_skipped() {
        let old = registry(&["title"]);
        let new = registry(&["title", "body"]);
        let plan = plan_sync(&old, &new, None);

        assert_eq!(plan.changed(), vec!["github".to_string()]);
        assert_eq!(plan.unchanged(), vec!["notion".to_string()]);
        assert_eq!(plan.diff().len(), 1);
        assert!(plan.diff().has_breaking());
    }

    #[test]
    fn restriction_and_membership() {
        let old = registry(&["title"]);
        let new = registry(&["title"]).with_connector("linear", ConnectorSchema::new());
        let plan = plan_sync(&old, &new, Some(&["linear", "notion", "ghost"][..]));

        assert_eq!(plan.added_connectors().to_vec(), vec!["linear".to_string()]);
        assert!(plan.removed_connectors().is_empty());
        assert_eq!(plan.hashes().len(), 1);
        assert!(plan.diff().is_empty());
    }

    #[test]
    fn declined_sync_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = MigrationStore::new(dir.path().join("migrations.json"));
        let old = registry(&["title"]);
        let new = registry(&["title", "body"]);

        let report = plan_sync(&old, &new, None).apply(&store, |_| false).unwrap();
        assert_eq!(report.outcome, SyncOutcome::Declined);
        assert!(!report.written());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn confirm_not_asked_without_breaking_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = MigrationStore::new(dir.path().join("migrations.json"));
        let old = registry(&["title", "body"]);
        let new = registry(&["title"]);

        let report = plan_sync(&old, &new, None)
            .apply(&store, |_| panic!("confirmation requested"))
            .unwrap();
        assert_eq!(report.outcome, SyncOutcome::NoBreakingChanges);
        assert_eq!(report.summary.total, 1);
    }
}
