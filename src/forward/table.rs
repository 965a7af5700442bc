//! Per-forwarder destination accounting
//!
//! The table tracks, for every destination a forwarder has dialed, how many
//! relays are still connected to it. An entry exists while its destination
//! is current or while it still has live connections. Once a non-current
//! entry reaches zero connections it is removed and its drain signal fires.
//!
//! The table itself is synchronous; the forwarder serializes access with a
//! mutex so each operation runs to completion without interleaving.

use super::drain::{DrainHandle, DrainTrigger, drain_signal};
use crate::endpoint::Endpoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct DestinationEntry {
    active: usize,
    trigger: DrainTrigger,
    handle: DrainHandle,
}

impl DestinationEntry {
    fn new(endpoint: Endpoint) -> Self {
        let (trigger, handle) = drain_signal(endpoint);
        Self {
            active: 0,
            trigger,
            handle,
        }
    }
}

/// One row of a forwarder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationStatus {
    pub endpoint: Endpoint,
    pub conns: usize,
    pub current: bool,
}

/// Live connection counts and drain signals, keyed by destination
#[derive(Debug)]
pub struct DestinationTable {
    current: Endpoint,
    entries: BTreeMap<Endpoint, DestinationEntry>,
}

impl DestinationTable {
    pub fn new(current: Endpoint) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(current.clone(), DestinationEntry::new(current.clone()));
        Self { current, entries }
    }

    /// The destination new connections are dialed to
    pub fn current(&self) -> &Endpoint {
        &self.current
    }

    /// Count a new connection against the current destination and return
    /// the destination it must dial.
    pub fn acquire(&mut self) -> Endpoint {
        let current = self.current.clone();
        let entry = self
            .entries
            .entry(current.clone())
            .or_insert_with(|| DestinationEntry::new(current.clone()));
        entry.active += 1;
        debug!(dst = %current, conns = entry.active, "Connection acquired");
        current
    }

    /// Drop one connection from `endpoint`, finishing its drain if it was
    /// the last one and `endpoint` is no longer current.
    pub fn release(&mut self, endpoint: &Endpoint) {
        let Some(entry) = self.entries.get_mut(endpoint) else {
            warn!(dst = %endpoint, "Release for untracked destination");
            return;
        };

        if entry.active == 0 {
            warn!(dst = %endpoint, "Release with no active connections");
            return;
        }
        entry.active -= 1;
        debug!(dst = %endpoint, conns = entry.active, "Connection released");

        if entry.active == 0 && *endpoint != self.current {
            self.finish_drain(endpoint);
        }
    }

    /// Make `endpoint` current and return the drain handle of the
    /// destination being switched away from.
    ///
    /// An existing entry for `endpoint` is reused as is, so handles
    /// obtained for it earlier keep tracking the same drain.
    pub fn switch(&mut self, endpoint: Endpoint) -> DrainHandle {
        let old = std::mem::replace(&mut self.current, endpoint.clone());

        let Some(old_entry) = self.entries.get(&old) else {
            // `current` always has an entry; recreate it rather than panic
            warn!(dst = %old, "Current destination had no entry");
            self.entries
                .entry(endpoint.clone())
                .or_insert_with(|| DestinationEntry::new(endpoint));
            let (trigger, handle) = drain_signal(old);
            trigger.fire();
            return handle;
        };
        let handle = old_entry.handle.clone();
        let old_active = old_entry.active;

        if old == endpoint {
            return handle;
        }

        self.entries
            .entry(endpoint.clone())
            .or_insert_with(|| DestinationEntry::new(endpoint.clone()));
        info!(from = %old, to = %endpoint, draining = old_active, "Switched destination");

        if old_active == 0 {
            self.finish_drain(&old);
        }
        handle
    }

    /// Drain handles for every destination other than the current one
    pub fn pending_drains(&self) -> Vec<DrainHandle> {
        self.entries
            .iter()
            .filter(|(endpoint, _)| **endpoint != self.current)
            .map(|(_, entry)| entry.handle.clone())
            .collect()
    }

    /// Drain handle of a tracked destination
    pub fn drain_handle(&self, endpoint: &Endpoint) -> Option<DrainHandle> {
        self.entries.get(endpoint).map(|e| e.handle.clone())
    }

    /// One row per tracked destination, ordered by endpoint
    pub fn list(&self) -> Vec<DestinationStatus> {
        self.entries
            .iter()
            .map(|(endpoint, entry)| DestinationStatus {
                endpoint: endpoint.clone(),
                conns: entry.active,
                current: *endpoint == self.current,
            })
            .collect()
    }

    fn finish_drain(&mut self, endpoint: &Endpoint) {
        if let Some(entry) = self.entries.remove(endpoint) {
            info!(dst = %endpoint, "Destination drained");
            entry.trigger.fire();
        }
    }
}
