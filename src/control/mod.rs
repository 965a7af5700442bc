//! Administrative control channel
//!
//! - `ControlServer`: serves requests on `<basedir>/grace.socket`
//! - `ControlClient`: used by the CLI to talk to the daemon
//! - `Request` / `Response`: the command table and its replies
//! - `FrameCodec`: length-prefixed JSON framing

mod client;
mod codec;
mod protocol;
mod server;

pub use client::ControlClient;
pub use codec::FrameCodec;
pub use protocol::{Request, Response};
pub use server::{ControlServer, handle};
