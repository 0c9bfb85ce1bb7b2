//! Registry diffing
//!
//! Compares two [`RegistrySnapshot`]s and classifies every difference as a
//! typed [`Change`]. Whether a change is breaking is decided by its
//! [`ChangeKind`] alone.

use crate::snapshot::{ConnectorSchema, ParamSpec, RegistrySnapshot};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

/// Closed set of detectable schema changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Tool present only in the old snapshot
    ToolRemoved,
    /// Tool present only in the new snapshot
    ToolAdded,
    /// Parameter dropped from an existing tool
    ParamRemoved,
    /// New parameter that callers must supply
    ParamAddedRequired,
    /// Declared type of a parameter changed
    ParamTypeChanged,
    /// Optional parameter became required
    ParamNowRequired,
    /// Required parameter became optional
    ParamNowOptional,
}

impl ChangeKind {
    /// Every kind, in declaration order
    pub const ALL: [Self; 7] = [
        Self::ToolRemoved,
        Self::ToolAdded,
        Self::ParamRemoved,
        Self::ParamAddedRequired,
        Self::ParamTypeChanged,
        Self::ParamNowRequired,
        Self::ParamNowOptional,
    ];

    /// Whether previously valid calls can be rejected after this change
    #[inline]
    #[must_use]
    pub const fn is_breaking(self) -> bool {
        !matches!(self, Self::ToolAdded | Self::ParamNowOptional)
    }

    /// Short label used in reports
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ToolRemoved => "tool removed",
            Self::ToolAdded => "tool added",
            Self::ParamRemoved => "param removed",
            Self::ParamAddedRequired => "required param added",
            Self::ParamTypeChanged => "param type changed",
            Self::ParamNowRequired => "param now required",
            Self::ParamNowOptional => "param now optional",
        }
    }
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One detected difference for a (connector, tool) pair
///
/// # Invariants
/// - breaking-ness is derived from `kind` on every access, never stored
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Change {
    connector: String,
    tool: String,
    kind: ChangeKind,
    detail: String,
    #[serde(default)]
    param: Option<String>,
    #[serde(default)]
    old_type: Option<String>,
    #[serde(default)]
    new_type: Option<String>,
}

impl Change {
    fn new(connector: &str, tool: &str, kind: ChangeKind, detail: String) -> Self {
        Self {
            connector: connector.to_string(),
            tool: tool.to_string(),
            kind,
            detail,
            param: None,
            old_type: None,
            new_type: None,
        }
    }

    fn with_param(mut self, param: &str, old_type: Option<&str>, new_type: Option<&str>) -> Self {
        self.param = Some(param.to_string());
        self.old_type = old_type.map(str::to_string);
        self.new_type = new_type.map(str::to_string);
        self
    }

    /// Tool disappeared
    #[must_use]
    pub fn tool_removed(connector: &str, tool: &str) -> Self {
        Self::new(
            connector,
            tool,
            ChangeKind::ToolRemoved,
            format!("tool '{tool}' was removed"),
        )
    }

    /// Tool appeared
    #[must_use]
    pub fn tool_added(connector: &str, tool: &str) -> Self {
        Self::new(
            connector,
            tool,
            ChangeKind::ToolAdded,
            format!("tool '{tool}' was added"),
        )
    }

    /// Parameter disappeared
    #[must_use]
    pub fn param_removed(connector: &str, tool: &str, old: &ParamSpec) -> Self {
        Self::new(
            connector,
            tool,
            ChangeKind::ParamRemoved,
            format!("parameter '{}' was removed", old.name),
        )
        .with_param(&old.name, Some(&old.type_name), None)
    }

    /// Required parameter appeared
    #[must_use]
    pub fn param_added_required(connector: &str, tool: &str, new: &ParamSpec) -> Self {
        Self::new(
            connector,
            tool,
            ChangeKind::ParamAddedRequired,
            format!(
                "required parameter '{}' ({}) was added",
                new.name, new.type_name
            ),
        )
        .with_param(&new.name, None, Some(&new.type_name))
    }

    /// Declared type changed
    #[must_use]
    pub fn param_type_changed(
        connector: &str,
        tool: &str,
        param: &str,
        old_type: &str,
        new_type: &str,
    ) -> Self {
        Self::new(
            connector,
            tool,
            ChangeKind::ParamTypeChanged,
            format!("parameter '{param}' changed type from {old_type} to {new_type}"),
        )
        .with_param(param, Some(old_type), Some(new_type))
    }

    /// Optional parameter became required
    #[must_use]
    pub fn param_now_required(connector: &str, tool: &str, old: &ParamSpec, new: &ParamSpec) -> Self {
        Self::new(
            connector,
            tool,
            ChangeKind::ParamNowRequired,
            format!("parameter '{}' is now required", new.name),
        )
        .with_param(&new.name, Some(&old.type_name), Some(&new.type_name))
    }

    /// Required parameter became optional
    #[must_use]
    pub fn param_now_optional(connector: &str, tool: &str, old: &ParamSpec, new: &ParamSpec) -> Self {
        Self::new(
            connector,
            tool,
            ChangeKind::ParamNowOptional,
            format!("parameter '{}' is now optional", new.name),
        )
        .with_param(&new.name, Some(&old.type_name), Some(&new.type_name))
    }

    /// Connector name
    #[inline]
    #[must_use]
    pub fn connector(&self) -> &str {
        &self.connector
    }

    /// Tool name
    #[inline]
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Change kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Human-readable detail
    #[inline]
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Whether this change breaks existing callers
    #[inline]
    #[must_use]
    pub fn is_breaking(&self) -> bool {
        self.kind.is_breaking()
    }

    /// Parameter the change is about, if any
    #[inline]
    #[must_use]
    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }

    /// Declared type before the change
    #[inline]
    #[must_use]
    pub fn old_type(&self) -> Option<&str> {
        self.old_type.as_deref()
    }

    /// Declared type after the change
    #[inline]
    #[must_use]
    pub fn new_type(&self) -> Option<&str> {
        self.new_type.as_deref()
    }
}

impl Serialize for Change {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Change", 8)?;
        state.serialize_field("connector", &self.connector)?;
        state.serialize_field("tool", &self.tool)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("detail", &self.detail)?;
        state.serialize_field("breaking", &self.is_breaking())?;
        state.serialize_field("param", &self.param)?;
        state.serialize_field("old_type", &self.old_type)?;
        state.serialize_field("new_type", &self.new_type)?;
        state.end()
    }
}

impl Display for Change {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let marker = if self.is_breaking() { "BREAKING" } else { "info" };
        write!(
            f,
            "[{marker}] {}.{}: {}",
            self.connector, self.tool, self.detail
        )
    }
}

/// Ordered result of one diff run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffResult {
    changes: Vec<Change>,
}

impl DiffResult {
    /// Wrap an ordered change list
    #[inline]
    #[must_use]
    pub fn new(changes: Vec<Change>) -> Self {
        Self { changes }
    }

    /// All changes in emission order
    #[inline]
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Iterate over changes
    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    /// Breaking subset, order preserved
    pub fn breaking_changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| c.is_breaking())
    }

    /// Non-breaking subset, order preserved
    pub fn non_breaking_changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| !c.is_breaking())
    }

    /// Whether any change is breaking
    #[inline]
    #[must_use]
    pub fn has_breaking(&self) -> bool {
        self.changes.iter().any(Change::is_breaking)
    }

    /// No changes at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Connectors touched by at least one change
    #[must_use]
    pub fn connectors(&self) -> BTreeSet<&str> {
        self.changes.iter().map(Change::connector).collect()
    }

    /// Counts per kind
    #[must_use]
    pub fn summary(&self) -> DiffSummary {
        let mut by_kind = BTreeMap::new();
        for change in &self.changes {
            *by_kind.entry(change.kind()).or_insert(0) += 1;
        }
        DiffSummary {
            total: self.changes.len(),
            breaking: self.breaking_changes().count(),
            by_kind,
        }
    }

    /// Consume into the change list
    #[inline]
    #[must_use]
    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

impl<'a> IntoIterator for &'a DiffResult {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl FromIterator<Change> for DiffResult {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Display for DiffResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "no schema changes");
        }
        for change in &self.changes {
            writeln!(f, "{change}")?;
        }
        let summary = self.summary();
        write!(
            f,
            "{} change(s), {} breaking",
            summary.total, summary.breaking
        )
    }
}

/// Aggregate counts of a diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// All changes
    pub total: usize,
    /// Breaking changes
    pub breaking: usize,
    /// Count per kind
    pub by_kind: BTreeMap<ChangeKind, usize>,
}

/// Compare two registry snapshots
///
/// Connectors are visited in sorted order, or in the order of `only` when a
/// restriction is given. A connector absent from either snapshot is skipped.
///
/// Per connector the changes are emitted as: removed tools, added tools,
/// then parameter changes of each tool present in both snapshots.
#[must_use]
pub fn diff_registries(
    old: &RegistrySnapshot,
    new: &RegistrySnapshot,
    only: Option<&[&str]>,
) -> DiffResult {
    let names: Vec<&str> = match only {
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

    let mut changes = Vec::new();
    for name in names {
        let (Some(before), Some(after)) = (old.connector(name), new.connector(name)) else {
            tracing::debug!(connector = %name, "connector missing from one snapshot, skipped");
            continue;
        };
        let start = changes.len();
        diff_connector(name, before, after, &mut changes);
        tracing::debug!(connector = %name, changes = changes.len() - start, "connector diffed");
    }

    DiffResult::new(changes)
}

fn diff_connector(
    connector: &str,
    old: &ConnectorSchema,
    new: &ConnectorSchema,
    out: &mut Vec<Change>,
) {
    for tool in old.tools.keys().filter(|t| !new.tools.contains_key(*t)) {
        out.push(Change::tool_removed(connector, tool));
    }

    for tool in new.tools.keys().filter(|t| !old.tools.contains_key(*t)) {
        out.push(Change::tool_added(connector, tool));
    }

    for (tool, before) in &old.tools {
        if let Some(after) = new.tools.get(tool) {
            diff_params(connector, tool, &before.params(), &after.params(), out);
        }
    }
}

fn diff_params(
    connector: &str,
    tool: &str,
    old: &BTreeMap<String, ParamSpec>,
    new: &BTreeMap<String, ParamSpec>,
    out: &mut Vec<Change>,
) {
    for spec in old.values().filter(|p| !new.contains_key(&p.name)) {
        out.push(Change::param_removed(connector, tool, spec));
    }

    // Optional additions are invisible to existing callers
    for spec in new
        .values()
        .filter(|p| p.required && !old.contains_key(&p.name))
    {
        out.push(Change::param_added_required(connector, tool, spec));
    }

    for (name, before) in old {
        let Some(after) = new.get(name) else {
            continue;
        };

        if before.type_name != after.type_name {
            out.push(Change::param_type_changed(
                connector,
                tool,
                name,
                &before.type_name,
                &after.type_name,
            ));
        }

        match (before.required, after.required) {
            (false, true) => out.push(Change::param_now_required(connector, tool, before, after)),
            (true, false) => out.push(Change::param_now_optional(connector, tool, before, after)),
            _ => {}
        }
    }
}
