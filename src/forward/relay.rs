//! Bidirectional byte relay between an inbound connection and a backend
//!
//! Each direction is pumped by its own task. The two pumps share nothing
//! but a completion flag: whichever finishes first raises it, and the other
//! stops and shuts down its write side.

use super::table::DestinationTable;
use crate::endpoint::{Connection, Endpoint};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// Returns a connection's slot to the destination table when dropped.
///
/// The destination is fixed when the guard is created, so later switches
/// never change which entry the connection is counted against.
pub struct ReleaseGuard {
    table: Arc<Mutex<DestinationTable>>,
    endpoint: Endpoint,
}

impl ReleaseGuard {
    pub(crate) fn new(table: Arc<Mutex<DestinationTable>>, endpoint: Endpoint) -> Self {
        Self { table, endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        // A poisoned lock still holds consistent counts; each operation
        // completes before the guard is released.
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.release(&self.endpoint);
    }
}

/// Byte counts of a finished relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub to_backend: u64,
    pub to_client: u64,
}

/// Relay `inbound` to the destination held by `guard`.
///
/// Nothing is read from `inbound` until the backend connection is
/// established. On dial failure `inbound` is closed. The guard is dropped
/// when the relay ends, whatever the outcome.
pub async fn relay(inbound: Connection, guard: ReleaseGuard) -> Option<RelayStats> {
    let backend = match guard.endpoint().connect().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(dst = %guard.endpoint(), error = %e, "Backend connection failed");
            drop(inbound);
            return None;
        }
    };
    debug!(dst = %guard.endpoint(), "Backend connected");

    let (client_read, client_write) = tokio::io::split(inbound);
    let (backend_read, backend_write) = tokio::io::split(backend);

    let (done_tx, done_rx) = watch::channel(false);
    let done_tx = Arc::new(done_tx);

    let upstream = tokio::spawn(pump(
        client_read,
        backend_write,
        Arc::clone(&done_tx),
        done_rx.clone(),
    ));
    let downstream = tokio::spawn(pump(backend_read, client_write, done_tx, done_rx));

    let stats = RelayStats {
        to_backend: upstream.await.unwrap_or(0),
        to_client: downstream.await.unwrap_or(0),
    };
    trace!(
        dst = %guard.endpoint(),
        to_backend = stats.to_backend,
        to_client = stats.to_client,
        "Relay finished"
    );
    Some(stats)
}

/// Copy from `reader` to `writer` until EOF, an error, or the other
/// direction finishing. Returns the number of bytes copied.
async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    done_tx: Arc<watch::Sender<bool>>,
    mut done_rx: watch::Receiver<bool>,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut copied = 0u64;
    {
        let copy = copy_counting(&mut reader, &mut writer, &mut copied);
        tokio::pin!(copy);
        tokio::select! {
            res = &mut copy => {
                if let Err(e) = res {
                    debug!(error = %e, "Relay direction failed");
                }
            }
            _ = done_rx.wait_for(|done| *done) => {}
        }
    }
    let _ = writer.shutdown().await;
    done_tx.send_replace(true);
    copied
}

async fn copy_counting<R, W>(reader: &mut R, writer: &mut W, copied: &mut u64) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut buf = vec![0u8; 16 * 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        *copied += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::unix_endpoint;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;
    use tokio::net::{UnixListener, UnixStream};

    fn table_for(endpoint: &Endpoint) -> Arc<Mutex<DestinationTable>> {
        Arc::new(Mutex::new(DestinationTable::new(endpoint.clone())))
    }

    #[tokio::test]
    async fn test_relay_copies_both_directions_and_releases() {
        let dir = tempdir().unwrap();
        let backend_path = dir.path().join("backend.sock");
        let backend = UnixListener::bind(&backend_path).unwrap();
        let dst = unix_endpoint(&backend_path);

        let table = table_for(&dst);
        let acquired = table.lock().unwrap().acquire();
        let guard = ReleaseGuard::new(Arc::clone(&table), acquired);

        let (client, inbound) = UnixStream::pair().unwrap();
        let relay_task = tokio::spawn(relay(Connection::Unix(inbound), guard));

        let (mut server, _) = backend.accept().await.unwrap();
        let mut client = client;

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        server.write_all(b"hi back").await.unwrap();
        let mut buf = [0u8; 7];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi back");

        assert_eq!(table.lock().unwrap().list()[0].conns, 1);
        drop(client);

        let stats = tokio::time::timeout(Duration::from_secs(5), relay_task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.to_backend, 5);
        assert_eq!(table.lock().unwrap().list()[0].conns, 0);

        // Backend side sees EOF
        let mut rest = Vec::new();
        server.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_relay_dial_failure_closes_inbound_and_releases() {
        let dir = tempdir().unwrap();
        let dst = unix_endpoint(&dir.path().join("nobody-home.sock"));

        let table = table_for(&dst);
        let acquired = table.lock().unwrap().acquire();
        let guard = ReleaseGuard::new(Arc::clone(&table), acquired);

        let (mut client, inbound) = UnixStream::pair().unwrap();
        let result = relay(Connection::Unix(inbound), guard).await;
        assert!(result.is_none());
        assert_eq!(table.lock().unwrap().list()[0].conns, 0);

        let mut buf = Vec::new();
        let n = client.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_guard_releases_captured_destination_after_switch() {
        let a: Endpoint = "tcp:9001".parse().unwrap();
        let table = table_for(&a);
        let acquired = table.lock().unwrap().acquire();
        let guard = ReleaseGuard::new(Arc::clone(&table), acquired);

        let drained = table.lock().unwrap().switch("tcp:9002".parse().unwrap());
        assert_eq!(guard.endpoint(), &a);
        drop(guard);

        let endpoint = tokio::time::timeout(Duration::from_secs(1), drained)
            .await
            .unwrap();
        assert_eq!(endpoint, a);
    }
}
