//! grace - graceful port forwarder
//!
//! A long-running daemon accepts connections on source endpoints and relays
//! each one to that source's current destination. Switching the destination
//! only affects new connections; existing ones keep running against the old
//! backend, and callers can wait until the old backend has fully drained.
//! A local control socket lets the CLI add, remove, switch, list and wait
//! on pipes while the daemon is running.

pub mod cli;
pub mod config;
pub mod control;
pub mod endpoint;
pub mod error;
pub mod forward;
pub mod logging;
pub mod orchestrator;
pub mod service;
pub mod utils;

pub use error::{Error, Result};

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const NAME: &str = env!("CARGO_PKG_NAME");
