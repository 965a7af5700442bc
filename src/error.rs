//! Error types for grace

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for grace
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to listen on {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("No pipe is listening on {0}")]
    NotFound(String),

    #[error("A pipe is already listening on {0}")]
    Duplicate(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Daemon error: {0}")]
    Daemon(String),

    #[error("Socket error: {0}")]
    Socket(String),

    /// An error reported by the daemon over the control channel
    #[error("{message}")]
    Remote { kind: ErrorKind, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Error classification carried in control channel error responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Bind,
    Connect,
    NotFound,
    Duplicate,
    UnknownCommand,
    Protocol,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Bind => write!(f, "bind"),
            ErrorKind::Connect => write!(f, "connect"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Duplicate => write!(f, "duplicate"),
            ErrorKind::UnknownCommand => write!(f, "unknown_command"),
            ErrorKind::Protocol => write!(f, "protocol"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

impl Error {
    /// Classify this error for the control channel
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Bind { .. } => ErrorKind::Bind,
            Error::Connect { .. } => ErrorKind::Connect,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Duplicate(_) => ErrorKind::Duplicate,
            Error::UnknownCommand(_) => ErrorKind::UnknownCommand,
            Error::Protocol(_) | Error::InvalidEndpoint { .. } | Error::Json(_) => {
                ErrorKind::Protocol
            }
            Error::Remote { kind, .. } => *kind,
            _ => ErrorKind::Internal,
        }
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(Error::NotFound("tcp:1".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::Duplicate("tcp:1".into()).kind(), ErrorKind::Duplicate);
        assert_eq!(
            Error::UnknownCommand("frobnicate".into()).kind(),
            ErrorKind::UnknownCommand
        );
        assert_eq!(
            Error::InvalidEndpoint {
                endpoint: "bogus".into(),
                reason: "no scheme".into()
            }
            .kind(),
            ErrorKind::Protocol
        );
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_remote_error_keeps_kind() {
        let err = Error::Remote {
            kind: ErrorKind::Duplicate,
            message: "already there".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert_eq!(err.to_string(), "already there");
    }

    #[test]
    fn test_error_kind_wire_format() {
        let json = serde_json::to_string(&ErrorKind::UnknownCommand).unwrap();
        assert_eq!(json, "\"unknown_command\"");
        let kind: ErrorKind = serde_json::from_str("\"not_found\"").unwrap();
        assert_eq!(kind, ErrorKind::NotFound);
    }
}
