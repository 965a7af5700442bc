//! Running grace as a background service

mod daemon;

pub use daemon::{Daemon, DaemonStatus, StartOutcome};
