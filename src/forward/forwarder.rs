//! Listening forwarder with a switchable destination

use super::drain::DrainHandle;
use super::relay::{ReleaseGuard, relay};
use super::table::{DestinationStatus, DestinationTable};
use crate::endpoint::{Connection, Endpoint, Listener};
use crate::error::Result;
use futures::future::{JoinAll, join_all};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Pause before accepting again after a transient accept error
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Relays every connection accepted on `source` to the destination that
/// was current when it was accepted.
pub struct Forwarder {
    source: Endpoint,
    table: Arc<Mutex<DestinationTable>>,
    shutdown_tx: watch::Sender<bool>,
    accept_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    local_port: Option<u16>,
}

impl Forwarder {
    /// Listen on `source` and start forwarding to `destination`
    pub async fn bind(source: Endpoint, destination: Endpoint) -> Result<Self> {
        let listener = source.listen().await?;
        info!(src = %source, dst = %destination, "Forwarder listening");

        let local_port = listener.local_port();
        let table = Arc::new(Mutex::new(DestinationTable::new(destination)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(
            source.clone(),
            listener,
            Arc::clone(&table),
            shutdown_rx,
        ));

        Ok(Self {
            source,
            table,
            shutdown_tx,
            accept_task: tokio::sync::Mutex::new(Some(accept_task)),
            local_port,
        })
    }

    pub fn source(&self) -> &Endpoint {
        &self.source
    }

    /// Port actually bound, for TCP sources
    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    /// The destination new connections are sent to
    pub fn current(&self) -> Endpoint {
        self.table().current().clone()
    }

    /// Send new connections to `destination`.
    ///
    /// Returns a handle that resolves once every connection to the previous
    /// destination has closed.
    pub fn switch(&self, destination: Endpoint) -> DrainHandle {
        self.table().switch(destination)
    }

    /// Resolves once every destination that is not current right now has
    /// drained. Destinations switched away from later are not waited for.
    pub fn wait(&self) -> JoinAll<DrainHandle> {
        join_all(self.table().pending_drains())
    }

    /// Connection counts per destination
    pub fn list(&self) -> Vec<DestinationStatus> {
        self.table().list()
    }

    /// Stop accepting connections and release the listener.
    ///
    /// Relays already running are left to finish on their own.
    pub async fn close(&self) {
        self.shutdown_tx.send_replace(true);
        if let Some(task) = self.accept_task.lock().await.take()
            && let Err(e) = task.await
        {
            error!(src = %self.source, error = %e, "Accept task failed");
        }
        info!(src = %self.source, "Forwarder closed");
    }

    fn table(&self) -> MutexGuard<'_, DestinationTable> {
        lock_table(&self.table)
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

fn lock_table(table: &Mutex<DestinationTable>) -> MutexGuard<'_, DestinationTable> {
    table.lock().unwrap_or_else(|e| e.into_inner())
}

/// Count the connection against the current destination and hand it to
/// a relay task.
fn accept(table: &Arc<Mutex<DestinationTable>>, conn: Connection) {
    let destination = lock_table(table).acquire();
    let guard = ReleaseGuard::new(Arc::clone(table), destination);
    tokio::spawn(relay(conn, guard));
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    ) || matches!(e.raw_os_error(), Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM))
}

async fn accept_loop(
    source: Endpoint,
    listener: Listener,
    table: Arc<Mutex<DestinationTable>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            // watch::Ref is not Send; drop it before the retry sleep below
            _ = async { shutdown_rx.wait_for(|stop| *stop).await.map(|_| ()) } => {
                debug!(src = %source, "Stopping accept loop");
                break;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok(conn) => accept(&table, conn),
                    Err(e) if is_transient(&e) => {
                        error!(src = %source, error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                    Err(e) => {
                        error!(
                            src = %source,
                            error = %e,
                            "Listener failed; forwarder no longer accepting connections"
                        );
                        break;
                    }
                }
            }
        }
    }
    // Dropping the listener unbinds it
    drop(listener);
}
