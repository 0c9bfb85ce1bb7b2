//! Migration set merging
//!
//! Last-write-wins union at the leaf-map level, so repeated syncs accumulate
//! shims without dropping earlier ones.

use crate::set::{ConnectorMigration, MigrationSet, ToolMigration};
use std::collections::BTreeMap;

/// Combine a persisted migration set with a newly built one
///
/// If either side is absent or has no connectors the other is returned
/// unchanged. Otherwise connectors, removed tools and the three per-tool
/// maps are unioned by key, with `incoming` winning on shared keys.
///
/// # Properties
/// - `merge(X, X) == X`
/// - `merge(A, merge(A, B)) == merge(A, B)`
/// - a key present in exactly one input is always kept
#[must_use]
pub fn merge_migrations(
    existing: Option<&MigrationSet>,
    incoming: Option<&MigrationSet>,
) -> MigrationSet {
    match (existing, incoming) {
        (None, None) => MigrationSet::default(),
        (Some(existing), None) => existing.clone(),
        (None, Some(incoming)) => incoming.clone(),
        (Some(existing), Some(incoming)) if incoming.is_empty() => existing.clone(),
        (Some(existing), Some(incoming)) if existing.is_empty() => incoming.clone(),
        (Some(existing), Some(incoming)) => merge_sets(existing, incoming),
    }
}

impl MigrationSet {
    /// Merge `newer` over `self`; see [`merge_migrations`]
    #[must_use]
    pub fn merged_with(&self, newer: &MigrationSet) -> MigrationSet {
        merge_migrations(Some(self), Some(newer))
    }
}

fn merge_sets(existing: &MigrationSet, incoming: &MigrationSet) -> MigrationSet {
    let mut merged = existing.clone();
    merged.version = existing.version.max(incoming.version);
    merged.created_at = incoming.created_at.or(existing.created_at);

    for (name, migration) in &incoming.connectors {
        match merged.connectors.get_mut(name) {
            Some(current) => merge_connector(current, migration),
            None => {
                merged.connectors.insert(name.clone(), migration.clone());
            }
        }
    }

    tracing::debug!(
        existing = existing.connectors.len(),
        incoming = incoming.connectors.len(),
        merged = merged.connectors.len(),
        "merged migration sets"
    );
    merged
}

fn merge_connector(current: &mut ConnectorMigration, incoming: &ConnectorMigration) {
    union_into(&mut current.deprecated_tools, &incoming.deprecated_tools);

    for (name, tool) in &incoming.tools {
        match current.tools.get_mut(name) {
            Some(existing) => merge_tool(existing, tool),
            None => {
                current.tools.insert(name.clone(), tool.clone());
            }
        }
    }
}

fn merge_tool(current: &mut ToolMigration, incoming: &ToolMigration) {
    union_into(&mut current.deprecated_params, &incoming.deprecated_params);
    union_into(&mut current.param_defaults, &incoming.param_defaults);
    union_into(&mut current.type_coercions, &incoming.type_coercions);
}

fn union_into<V: Clone>(target: &mut BTreeMap<String, V>, newer: &BTreeMap<String, V>) {
    for (key, value) in newer {
        target.insert(key.clone(), value.clone());
    }
}
