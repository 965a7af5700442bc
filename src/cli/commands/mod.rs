//! Command implementations for the grace CLI

pub mod add;
pub mod ls;
pub mod rm;
pub mod run;
pub mod start;
pub mod stop;
pub mod switch;
pub mod wait;

use anyhow::{Context, Result};

use crate::config::GraceDir;
use crate::control::ControlClient;
use crate::endpoint::Endpoint;

/// Connect to the daemon serving `dir`
pub(crate) async fn connect(dir: &GraceDir) -> Result<ControlClient> {
    let socket = dir.socket_path();
    ControlClient::connect(&socket).await.with_context(|| {
        format!(
            "Failed to reach the grace daemon at {}. Is it running?",
            socket.display()
        )
    })
}

/// Parse an endpoint argument
pub(crate) fn parse_endpoint(arg: &str) -> Result<Endpoint> {
    arg.parse()
        .with_context(|| format!("Invalid endpoint '{}'", arg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(parse_endpoint("tcp:8080").unwrap().as_str(), "tcp:8080");
        let err = parse_endpoint("8080").unwrap_err();
        assert!(err.to_string().contains("Invalid endpoint '8080'"));
    }

    #[tokio::test]
    async fn test_connect_without_daemon_mentions_socket() {
        let temp = tempfile::tempdir().unwrap();
        let dir = GraceDir::new(temp.path());
        let err = connect(&dir).await.unwrap_err();
        assert!(format!("{:#}", err).contains("grace.socket"));
    }
}
