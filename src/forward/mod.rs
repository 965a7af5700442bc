//! Connection forwarding with graceful destination switching
//!
//! - `Forwarder`: listens on a source endpoint and relays each connection
//! - `DestinationTable`: per-destination connection counts and drain state
//! - `DrainHandle`: future resolving once a destination has drained
//! - `relay`: the byte pump for a single connection

mod drain;
mod forwarder;
mod relay;
mod table;

pub use drain::DrainHandle;
pub use forwarder::Forwarder;
pub use relay::{RelayStats, ReleaseGuard, relay};
pub use table::{DestinationStatus, DestinationTable};
