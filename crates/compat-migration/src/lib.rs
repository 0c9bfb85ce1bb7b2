//! Connector Migrations
//!
//! Turns breaking registry changes into persisted compatibility shims and
//! accumulates them across syncs.
//!
//! # Core Concepts
//!
//! - [`MigrationSet`]: Removed tools and per-tool parameter shims, per connector
//! - [`MigrationBuilder`]: Breaking [`compat_schema::Change`]s → [`MigrationSet`]
//! - [`merge_migrations`]: Last-write-wins union of an existing and a new set
//! - [`MigrationStore`]: Atomic JSON persistence with fingerprint compare-and-swap
//!
//! # Example
//!
//! ```rust,ignore
//! use compat_migration::{merge_migrations, MigrationBuilder, MigrationStore};
//! use compat_schema::diff_registries;
//!
//! let diff = diff_registries(&old, &new, None);
//! let built = MigrationBuilder::new().build(&diff, &old);
//!
//! let store = MigrationStore::new("state/migrations.json");
//! let stored = store.load()?;
//! let merged = merge_migrations(stored.as_ref().map(|s| &s.set), Some(&built));
//! store.save(&merged, stored.as_ref().map(|s| &s.fingerprint))?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod builder;
mod merge;
mod set;
mod store;

pub use builder::{build_migrations, default_for_type, MigrationBuilder, DEFAULT_PARAM_KEY};
pub use merge::merge_migrations;
pub use set::{
    ConnectorMigration, DeprecatedParam, DeprecatedTool, MigrationCounts, MigrationSet,
    ParamAction, ParamDefault, ToolMigration, TypeCoercion, FORMAT_VERSION,
};
pub use store::{MigrationStore, StoreError, StoredMigrations};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
