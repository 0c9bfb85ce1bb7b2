//! Connector Compatibility Layer
//!
//! Intercepts tool calls and applies a [`compat_migration::MigrationSet`] so
//! that code written against an older registry keeps being accepted.
//!
//! # Core Concepts
//!
//! - [`ConnectorProxy`]: Resolves a tool name, migrates arguments, dispatches
//! - [`Resolution`]: Tagged outcome of the ordered lookup [`Strategy`] list
//! - [`DeprecationNotice`]: Structured advisory returned with every [`CallOutcome`]
//! - [`ToolExecutor`] / [`AsyncToolExecutor`]: Host-provided dispatch seam
//! - [`CompatSession`]: Immutable per-client state with a proxy cache
//!
//! # Example
//!
//! ```rust,ignore
//! use compat_proxy::CompatSession;
//! use std::sync::Arc;
//!
//! let session = CompatSession::new(registry, migrations, Arc::new(executor));
//! let outcome = session.call("slack", "send_message", arguments)?;
//! for notice in &outcome.notices {
//!     eprintln!("deprecated: {notice}");
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod error;
mod executor;
mod notice;
mod proxy;
mod resolve;
mod session;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use executor::{
    AsyncToolExecutor, CallOverrides, ConnectorBinding, ExecutionRequest, ToolExecutor,
};
pub use notice::{DeprecationNotice, NoticeKind};
pub use proxy::{CallOutcome, ConnectorProxy, PreparedCall};
pub use resolve::{Resolution, Strategy};
pub use session::CompatSession;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
