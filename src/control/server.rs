//! Unix socket control server
//!
//! Each accepted connection is served by its own task, so a `wait` that
//! blocks on one connection never delays commands on another.

use super::codec::FrameCodec;
use super::protocol::{Request, Response};
use crate::error::{Error, Result};
use crate::orchestrator::{Orchestrator, PipeCommand};
use crate::utils::socket::{SocketCleanupGuard, prepare_socket_path, set_socket_permissions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// Control server bound to a local socket
pub struct ControlServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    cleanup: Option<SocketCleanupGuard>,
}

impl ControlServer {
    pub fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            listener: None,
            cleanup: None,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the control socket, replacing a stale one, owner access only
    pub async fn bind(&mut self) -> Result<()> {
        prepare_socket_path(&self.socket_path).map_err(|e| Error::Socket(e.to_string()))?;

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| {
            Error::Socket(format!(
                "Failed to bind control socket at {}: {}",
                self.socket_path.display(),
                e
            ))
        })?;
        self.cleanup = Some(SocketCleanupGuard::new(&self.socket_path));
        set_socket_permissions(&self.socket_path).map_err(|e| Error::Socket(e.to_string()))?;

        info!(path = %self.socket_path.display(), "Control socket listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// Serve requests until the shutdown flag is raised
    pub async fn run(
        &self,
        orchestrator: Arc<Orchestrator>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| Error::Socket("Control server is not bound".to_string()))?;

        loop {
            tokio::select! {
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    info!("Control server stopping");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _addr)) => {
                            trace!("Accepted control connection");
                            let orchestrator = Arc::clone(&orchestrator);
                            tokio::spawn(async move {
                                if let Err(e) = serve_connection(stream, orchestrator).await {
                                    debug!(error = %e, "Control connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept control connection");
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Answer requests on one connection until the peer hangs up
async fn serve_connection(mut stream: UnixStream, orchestrator: Arc<Orchestrator>) -> Result<()> {
    let (mut reader, mut writer) = stream.split();

    while let Some(frame) = FrameCodec::read(&mut reader).await? {
        let request = Request::decode(&frame);
        let stop = matches!(request, Ok(Request::Stop));

        let response = match request {
            Ok(request @ Request::Wait { .. }) => {
                debug!(command = request.name(), "Control request");
                tokio::select! {
                    result = handle(&orchestrator, request) => result,
                    _ = peer_input(&mut reader) => {
                        debug!("Control peer left before wait completed");
                        return Ok(());
                    }
                }
            }
            Ok(request) => {
                debug!(command = request.name(), "Control request");
                handle(&orchestrator, request).await
            }
            Err(e) => Err(e),
        }
        .unwrap_or_else(|e| {
            warn!(kind = %e.kind(), error = %e, "Control request failed");
            Response::from_error(&e)
        });

        FrameCodec::write(&mut writer, &response.encode()?).await?;

        if stop {
            orchestrator.shutdown();
        }
    }

    Ok(())
}

/// Resolves once the peer sends more input or hangs up.
///
/// Requests on a connection are answered in order, so either one during a
/// pending `wait` means the client has stopped waiting for the reply.
async fn peer_input<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut byte = [0u8; 1];
    let _ = reader.read(&mut byte).await;
}

/// Map a request onto the orchestrator
pub async fn handle(orchestrator: &Orchestrator, request: Request) -> Result<Response> {
    match request {
        Request::AddPipe { src, dst } => {
            orchestrator.add_forwarder(src, dst).await?;
            Ok(Response::Done)
        }
        Request::RemovePipe { src } => {
            orchestrator.remove_forwarder(&src).await?;
            Ok(Response::Done)
        }
        Request::Switch { src, dst } => {
            orchestrator
                .dispatch(&src, PipeCommand::Switch(dst))
                .await?;
            Ok(Response::Done)
        }
        // The caller terminates the service once this reply is sent
        Request::Stop => Ok(Response::Done),
        Request::List => Ok(Response::Pipes {
            pipes: orchestrator.list().await,
        }),
        Request::Wait { src } => {
            orchestrator.dispatch(&src, PipeCommand::Wait).await?;
            Ok(Response::Done)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::unix_endpoint;
    use crate::error::ErrorKind;
    use crate::orchestrator::ShutdownTerminator;
    use tempfile::tempdir;

    fn orchestrator() -> Orchestrator {
        let (terminator, _rx) = ShutdownTerminator::new();
        Orchestrator::new(Arc::new(terminator))
    }

    #[tokio::test]
    async fn test_handle_add_and_list() {
        let dir = tempdir().unwrap();
        let orch = orchestrator();
        let src = unix_endpoint(&dir.path().join("src.sock"));
        let dst = unix_endpoint(&dir.path().join("a.sock"));

        let resp = handle(
            &orch,
            Request::AddPipe {
                src: src.clone(),
                dst: dst.clone(),
            },
        )
        .await
        .unwrap();
        assert_eq!(resp, Response::Done);

        let Response::Pipes { pipes } = handle(&orch, Request::List).await.unwrap() else {
            panic!("expected pipes");
        };
        assert_eq!(pipes.len(), 1);
        assert_eq!(pipes[0].src, src);
        assert_eq!(pipes[0].dst, dst);
        assert_eq!(pipes[0].conns, 0);
        assert!(pipes[0].active);
    }

    #[tokio::test]
    async fn test_handle_errors_keep_kind() {
        let dir = tempdir().unwrap();
        let orch = orchestrator();
        let missing = unix_endpoint(&dir.path().join("missing.sock"));

        let err = handle(&orch, Request::Wait { src: missing.clone() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = handle(&orch, Request::RemovePipe { src: missing })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_bind_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("grace.socket");
        {
            let mut server = ControlServer::new(&path);
            server.bind().await.unwrap();
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_run_requires_bind() {
        let server = ControlServer::new("/tmp/never-bound.socket");
        let (_tx, rx) = watch::channel(false);
        assert!(server.run(Arc::new(orchestrator()), rx).await.is_err());
    }
}
