//! Drain completion futures
//!
//! Every destination tracked by a forwarder owns exactly one drain signal.
//! Handles to it are cheap clones of the same shared future, so a caller
//! that obtained a handle before the destination was re-selected still
//! observes the eventual drain.

use crate::endpoint::Endpoint;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolves with the destination once it has fully drained
#[derive(Clone)]
pub struct DrainHandle {
    inner: Shared<BoxFuture<'static, Endpoint>>,
}

/// Resolving side of a drain signal, owned by the destination table
#[derive(Debug)]
pub(crate) struct DrainTrigger {
    endpoint: Endpoint,
    tx: oneshot::Sender<Endpoint>,
}

impl DrainTrigger {
    /// Resolve every handle. Consumes the trigger, so it can fire only once.
    pub(crate) fn fire(self) {
        // Nobody holding a handle is fine
        let _ = self.tx.send(self.endpoint);
    }
}

/// Create a linked trigger/handle pair for `endpoint`
pub(crate) fn drain_signal(endpoint: Endpoint) -> (DrainTrigger, DrainHandle) {
    let (tx, rx) = oneshot::channel();
    let fallback = endpoint.clone();
    // A dropped trigger means the table is gone; nothing can stay in
    // flight to that destination any more.
    let inner = rx.map(move |res| res.unwrap_or(fallback)).boxed().shared();
    (DrainTrigger { endpoint, tx }, DrainHandle { inner })
}

impl DrainHandle {
    /// Whether both handles observe the same drain signal
    pub fn same_as(&self, other: &DrainHandle) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// Whether the drain has already completed and been observed
    pub fn is_drained(&self) -> bool {
        self.inner.peek().is_some()
    }
}

impl Future for DrainHandle {
    type Output = Endpoint;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Endpoint> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl std::fmt::Debug for DrainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainHandle")
            .field("drained", &self.is_drained())
            .finish()
    }
}
