//! Control channel messages
//!
//! Requests are JSON objects tagged by `command`, responses are tagged by
//! `result`:
//!
//! ```text
//! {"command":"switch","src":"tcp:8080","dst":"tcp:127.0.0.1:9002"}
//! {"result":"done"}
//!
//! {"command":"list"}
//! {"result":"pipes","pipes":[{"src":"tcp:8080","dst":"tcp:127.0.0.1:9002","conns":3,"active":true}]}
//!
//! {"command":"wait","src":"tcp:9999"}
//! {"result":"error","kind":"not_found","message":"No pipe is listening on tcp:9999"}
//! ```

use crate::endpoint::Endpoint;
use crate::error::{Error, ErrorKind, Result};
use crate::orchestrator::PipeStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single administrative command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    AddPipe { src: Endpoint, dst: Endpoint },
    RemovePipe { src: Endpoint },
    Switch { src: Endpoint, dst: Endpoint },
    Stop,
    List,
    Wait { src: Endpoint },
}

impl Request {
    /// Every command name understood by the daemon
    pub const COMMANDS: &'static [&'static str] =
        &["add_pipe", "remove_pipe", "switch", "stop", "list", "wait"];

    /// Command name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Request::AddPipe { .. } => "add_pipe",
            Request::RemovePipe { .. } => "remove_pipe",
            Request::Switch { .. } => "switch",
            Request::Stop => "stop",
            Request::List => "list",
            Request::Wait { .. } => "wait",
        }
    }

    /// Decode and validate a request frame.
    ///
    /// Fails with `UnknownCommand` for a command outside the table and with
    /// `Protocol` for anything else that does not decode.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(frame)
            .map_err(|e| Error::Protocol(format!("Malformed request: {}", e)))?;

        let command = value
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Protocol("Request has no command".to_string()))?;

        if !Self::COMMANDS.contains(&command) {
            return Err(Error::UnknownCommand(command.to_string()));
        }

        let command = command.to_string();
        serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("Invalid {} request: {}", command, e)))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Reply to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    Done,
    Pipes { pipes: Vec<PipeStatus> },
    Error { kind: ErrorKind, message: String },
}

impl Response {
    pub fn from_error(err: &Error) -> Self {
        Response::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Turn an error response back into an error
    pub fn into_result(self) -> Result<Self> {
        match self {
            Response::Error { kind, message } => Err(Error::Remote { kind, message }),
            other => Ok(other),
        }
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        serde_json::from_slice(frame)
            .map_err(|e| Error::Protocol(format!("Malformed response: {}", e)))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
