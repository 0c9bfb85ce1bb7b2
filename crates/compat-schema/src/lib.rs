//! Connector Registry Schemas
//!
//! Snapshot model, fingerprints and breaking-change detection for
//! versioned connector/tool registries.
//!
//! # Core Concepts
//!
//! - [`RegistrySnapshot`]: Point-in-time connectors → tools → input schemas
//! - [`Fingerprint`]: 16-hex SHA-256 prefix of a connector's tool schemas
//! - [`diff_registries`]: Ordered, classified [`Change`] list between two snapshots
//! - [`ChangeKind`]: Closed set of change kinds; decides breaking-ness
//!
//! # Example
//!
//! ```rust,ignore
//! use compat_schema::{compute_schema_hash, diff_registries, RegistrySnapshot};
//!
//! let old = RegistrySnapshot::from_path("registry.old.json")?;
//! let new = RegistrySnapshot::from_path("registry.json")?;
//!
//! if compute_schema_hash(&old, "slack") != compute_schema_hash(&new, "slack") {
//!     let diff = diff_registries(&old, &new, Some(&["slack"][..]));
//!     for change in diff.breaking_changes() {
//!         println!("{change}");
//!     }
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod diff;
mod hash;
mod snapshot;

pub use diff::{diff_registries, Change, ChangeKind, DiffResult, DiffSummary};
pub use hash::{
    canonical_json, changed_connectors, compute_schema_hash, schema_hashes, Fingerprint,
    HashError, FINGERPRINT_LEN,
};
pub use snapshot::{
    extract_params, ConnectorSchema, ParamSpec, RegistrySnapshot, SnapshotError, ToolSchema,
    ANY_TYPE,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
