//! Client side of the control channel

use super::codec::FrameCodec;
use super::protocol::{Request, Response};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::orchestrator::PipeStatus;
use std::path::Path;
use tokio::net::UnixStream;
use tracing::trace;

/// Connection to a running daemon's control socket
#[derive(Debug)]
pub struct ControlClient {
    stream: UnixStream,
}

impl ControlClient {
    pub async fn connect<P: AsRef<Path>>(socket_path: P) -> Result<Self> {
        let path = socket_path.as_ref();
        let stream = UnixStream::connect(path).await.map_err(|e| Error::Connect {
            endpoint: path.display().to_string(),
            source: e,
        })?;
        Ok(Self { stream })
    }

    /// Send one request and wait for its reply.
    ///
    /// Error replies come back as `Error::Remote`.
    pub async fn request(&mut self, request: &Request) -> Result<Response> {
        trace!(command = request.name(), "Sending control request");
        let (mut reader, mut writer) = self.stream.split();

        FrameCodec::write(&mut writer, &request.encode()?).await?;
        let frame = FrameCodec::read(&mut reader)
            .await?
            .ok_or_else(|| Error::Protocol("Daemon closed the connection".to_string()))?;

        Response::decode(&frame)?.into_result()
    }

    pub async fn add_pipe(&mut self, src: Endpoint, dst: Endpoint) -> Result<()> {
        self.expect_done(&Request::AddPipe { src, dst }).await
    }

    pub async fn remove_pipe(&mut self, src: Endpoint) -> Result<()> {
        self.expect_done(&Request::RemovePipe { src }).await
    }

    pub async fn switch(&mut self, src: Endpoint, dst: Endpoint) -> Result<()> {
        self.expect_done(&Request::Switch { src, dst }).await
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.expect_done(&Request::Stop).await
    }

    /// Blocks until the pipe's draining destinations have closed
    pub async fn wait(&mut self, src: Endpoint) -> Result<()> {
        self.expect_done(&Request::Wait { src }).await
    }

    pub async fn list(&mut self) -> Result<Vec<PipeStatus>> {
        match self.request(&Request::List).await? {
            Response::Pipes { pipes } => Ok(pipes),
            other => Err(unexpected(&other)),
        }
    }

    async fn expect_done(&mut self, request: &Request) -> Result<()> {
        match self.request(request).await? {
            Response::Done => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &Response) -> Error {
    Error::Protocol(format!("Unexpected response: {:?}", response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_without_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let err = ControlClient::connect(dir.path().join("grace.socket"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
    }
}
