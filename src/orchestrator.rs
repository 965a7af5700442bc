//! Set of forwarders keyed by source endpoint
//!
//! The orchestrator creates and removes forwarders, routes per-forwarder
//! commands, aggregates listings and holds the capability to stop the
//! whole service.

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::forward::{DrainHandle, Forwarder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::{Mutex, watch};
use tracing::info;

/// Capability to terminate the running service
pub trait Terminator: Send + Sync {
    fn terminate(&self);
}

/// Terminator that raises a watch flag the daemon's main loop waits on
#[derive(Debug)]
pub struct ShutdownTerminator {
    tx: watch::Sender<bool>,
}

impl ShutdownTerminator {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }
}

impl Terminator for ShutdownTerminator {
    fn terminate(&self) {
        info!("Shutdown requested");
        self.tx.send_replace(true);
    }
}

/// Commands routed to a single forwarder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeCommand {
    Switch(Endpoint),
    Wait,
    List,
}

/// Result of a forwarder command
#[derive(Debug)]
pub enum PipeReply {
    /// Resolves once the previous destination has drained
    Switched(DrainHandle),
    /// Every destination that was draining at call time has drained
    Drained(Vec<Endpoint>),
    Listing(Vec<PipeStatus>),
}

/// One destination of one forwarder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeStatus {
    pub src: Endpoint,
    pub dst: Endpoint,
    pub conns: usize,
    pub active: bool,
}

/// Owns every forwarder of the service
pub struct Orchestrator {
    forwarders: Mutex<BTreeMap<Endpoint, Arc<Forwarder>>>,
    /// Sources whose listener is still being bound
    binding: StdMutex<BTreeSet<Endpoint>>,
    terminator: Arc<dyn Terminator>,
}

impl Orchestrator {
    pub fn new(terminator: Arc<dyn Terminator>) -> Self {
        Self {
            forwarders: Mutex::new(BTreeMap::new()),
            binding: StdMutex::new(BTreeSet::new()),
            terminator,
        }
    }

    /// Start forwarding from `src` to `dst`
    ///
    /// The source is reserved while it binds, so other commands are not
    /// queued behind a slow bind and a second add of it is a duplicate.
    pub async fn add_forwarder(&self, src: Endpoint, dst: Endpoint) -> Result<Arc<Forwarder>> {
        {
            let forwarders = self.forwarders.lock().await;
            let mut binding = lock_binding(&self.binding);
            if forwarders.contains_key(&src) || !binding.insert(src.clone()) {
                return Err(Error::Duplicate(src.to_string()));
            }
        }
        let _reservation = scopeguard::guard(&src, |src| {
            lock_binding(&self.binding).remove(src);
        });

        let forwarder = Arc::new(Forwarder::bind(src.clone(), dst).await?);
        self.forwarders
            .lock()
            .await
            .insert(src.clone(), Arc::clone(&forwarder));
        Ok(forwarder)
    }

    /// Stop listening on `src` and forget the forwarder.
    ///
    /// Completes once the listener is unbound; open relays keep running.
    pub async fn remove_forwarder(&self, src: &Endpoint) -> Result<()> {
        let forwarder = self
            .forwarders
            .lock()
            .await
            .remove(src)
            .ok_or_else(|| Error::NotFound(src.to_string()))?;
        forwarder.close().await;
        info!(src = %src, "Pipe removed");
        Ok(())
    }

    /// Look up the forwarder listening on `src`
    pub async fn forwarder(&self, src: &Endpoint) -> Result<Arc<Forwarder>> {
        self.forwarders
            .lock()
            .await
            .get(src)
            .cloned()
            .ok_or_else(|| Error::NotFound(src.to_string()))
    }

    /// Run `command` on the forwarder listening on `src`
    pub async fn dispatch(&self, src: &Endpoint, command: PipeCommand) -> Result<PipeReply> {
        // Look up first so a long wait does not hold the map lock
        let forwarder = self.forwarder(src).await?;
        match command {
            PipeCommand::Switch(dst) => Ok(PipeReply::Switched(forwarder.switch(dst))),
            PipeCommand::Wait => Ok(PipeReply::Drained(forwarder.wait().await)),
            PipeCommand::List => Ok(PipeReply::Listing(pipe_rows(&forwarder))),
        }
    }

    /// Every destination of every forwarder, ordered by source then
    /// destination
    pub async fn list(&self) -> Vec<PipeStatus> {
        let forwarders: Vec<Arc<Forwarder>> =
            self.forwarders.lock().await.values().cloned().collect();
        forwarders.iter().flat_map(|f| pipe_rows(f)).collect()
    }

    /// Source endpoints currently tracked
    pub async fn sources(&self) -> Vec<Endpoint> {
        self.forwarders.lock().await.keys().cloned().collect()
    }

    /// Close every forwarder
    pub async fn close_all(&self) {
        let forwarders: Vec<Arc<Forwarder>> = std::mem::take(&mut *self.forwarders.lock().await)
            .into_values()
            .collect();
        for forwarder in forwarders {
            forwarder.close().await;
        }
    }

    /// Stop the whole service
    pub fn shutdown(&self) {
        self.terminator.terminate();
    }
}

fn lock_binding(binding: &StdMutex<BTreeSet<Endpoint>>) -> MutexGuard<'_, BTreeSet<Endpoint>> {
    binding.lock().unwrap_or_else(|e| e.into_inner())
}

fn pipe_rows(forwarder: &Forwarder) -> Vec<PipeStatus> {
    forwarder
        .list()
        .into_iter()
        .map(|row| PipeStatus {
            src: forwarder.source().clone(),
            dst: row.endpoint,
            conns: row.conns,
            active: row.current,
        })
        .collect()
}
