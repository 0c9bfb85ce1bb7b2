//! Registry Sync Workflow
//!
//! Drives the offline half of the compatibility subsystem: compare two
//! registry snapshots, confirm breaking changes, and fold the resulting
//! migrations into the persisted store.
//!
//! # Core Concepts
//!
//! - [`plan_sync`]: Hash pre-check, then diff of the changed connectors
//! - [`SyncPlan::apply`]: Load → confirm → build → merge → compare-and-swap save
//! - [`SyncConfig`]: TOML configuration; [`SyncConfig::open_session`] opens a
//!   proxy session over the stored migrations
//!
//! # Example
//!
//! ```rust,ignore
//! use compat_migration::MigrationStore;
//! use compat_sync::{plan_sync, SyncConfig};
//!
//! let config = SyncConfig::from_path("compat.toml")?;
//! let plan = plan_sync(&old, &new, config.connector_filter().as_deref());
//! let report = plan.apply(&MigrationStore::new(&config.store), |diff| {
//!     println!("{diff}");
//!     true
//! })?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod error;
mod plan;

pub use config::{SyncConfig, DEFAULT_STORE_PATH};
pub use error::SyncError;
pub use plan::{plan_sync, ConnectorHashes, SyncOutcome, SyncPlan, SyncReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
