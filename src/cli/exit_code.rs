//! Exit code definitions for grace

use crate::error::{Error, ErrorKind};

/// Exit codes for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// General/unspecified error
    GeneralError = 1,
    /// The control channel failed or the daemon rejected the command
    RpcError = 2,
    /// The daemon process could not be started or stopped
    DaemonError = 3,
    /// A source endpoint could not be bound
    BindError = 4,
}

impl ExitCode {
    /// Pick the exit code for a failed command
    pub fn for_error(err: &anyhow::Error) -> Self {
        let Some(err) = err.downcast_ref::<Error>() else {
            return ExitCode::GeneralError;
        };
        match err {
            Error::Daemon(_) => ExitCode::DaemonError,
            Error::Bind { .. } => ExitCode::BindError,
            Error::Remote {
                kind: ErrorKind::Bind,
                ..
            } => ExitCode::BindError,
            Error::Remote { .. } | Error::Protocol(_) | Error::Connect { .. } => {
                ExitCode::RpcError
            }
            _ => ExitCode::GeneralError,
        }
    }
}

impl From<ExitCode> for u8 {
    fn from(code: ExitCode) -> Self {
        code as u8
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
