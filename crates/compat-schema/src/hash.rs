//! Schema fingerprints
//!
//! Provides [`Fingerprint`], a short SHA-256 digest used as a cheap
//! "did anything change" check before running a full diff.

use crate::snapshot::RegistrySnapshot;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter, Write as _};
use std::str::FromStr;

/// Number of hex characters kept from the digest
pub const FINGERPRINT_LEN: usize = 16;

/// Truncated SHA-256 digest (16 lowercase hex characters)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint arbitrary bytes
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(hex::encode(&digest[..FINGERPRINT_LEN / 2]))
    }

    /// Fingerprint the canonical JSON rendering of a value
    #[must_use]
    pub fn compute_json(value: &Value) -> Self {
        Self::compute(canonical_json(value).as_bytes())
    }

    /// Hex representation
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != FINGERPRINT_LEN {
            return Err(HashError::InvalidLength {
                expected: FINGERPRINT_LEN,
                actual: s.len(),
            });
        }
        if !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(HashError::NotHex(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

/// Render JSON with sorted object keys at every depth and no whitespace
///
/// Strings are ASCII-only: anything outside printable ASCII is written as
/// `\uXXXX` (UTF-16 units, lowercase hex), so digests do not depend on how a
/// registry chose to encode non-ASCII text.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(text) => write_string(text, out),
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(text: &str, out: &mut String) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            ' '..='~' => out.push(ch),
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04x}");
                }
            }
        }
    }
    out.push('"');
}

/// Fingerprint one connector's tool schemas
///
/// Only tool names, action identifiers and input schemas contribute; any
/// other tool or connector metadata is ignored. A missing connector hashes
/// like a connector without tools.
#[must_use]
pub fn compute_schema_hash(snapshot: &RegistrySnapshot, connector: &str) -> Fingerprint {
    let mut canonical = Map::new();
    if let Some(schema) = snapshot.connector(connector) {
        for (name, tool) in &schema.tools {
            canonical.insert(
                name.clone(),
                json!({
                    "actionId": tool.action_id,
                    "inputSchema": tool.input_schema,
                }),
            );
        }
    }
    Fingerprint::compute_json(&Value::Object(canonical))
}

/// Fingerprints of every connector in a snapshot
#[must_use]
pub fn schema_hashes(snapshot: &RegistrySnapshot) -> BTreeMap<String, Fingerprint> {
    snapshot
        .connector_names()
        .map(|name| (name.to_string(), compute_schema_hash(snapshot, name)))
        .collect()
}

/// Connectors present in both snapshots whose fingerprints differ
#[must_use]
pub fn changed_connectors(old: &RegistrySnapshot, new: &RegistrySnapshot) -> Vec<String> {
    old.connector_names()
        .filter(|name| new.connector(name).is_some())
        .filter(|name| {
            let changed = compute_schema_hash(old, name) != compute_schema_hash(new, name);
            tracing::debug!(connector = %name, changed, "schema hash pre-check");
            changed
        })
        .map(str::to_string)
        .collect()
}

/// Errors parsing fingerprints
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Wrong number of characters
    #[error("invalid fingerprint length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Contains characters outside lowercase hex
    #[error("fingerprint is not lowercase hex: {0}")]
    NotHex(String),
}
