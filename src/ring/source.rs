//! The ring source contract and an in-memory implementation.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, RingError};
use crate::ring::snapshot::{InstanceDesc, InstanceState, RingSnapshot};
use crate::types::InstanceId;

/// Callback invoked after every observed ring update.
pub type WatchCallback = Box<dyn Fn() + Send + Sync>;

/// Read-only access to the ring maintained by the gossip/KV layer.
pub trait RingSource: Send + Sync {
    /// The current ring snapshot.
    fn current_snapshot(&self) -> Result<Arc<RingSnapshot>>;

    /// Register a callback invoked after every observed ring update. The
    /// callback must be cheap; the owned-series service uses it to nudge its
    /// reconciliation loop, not to do work inline.
    fn watch(&self, callback: WatchCallback);
}

/// An in-memory ring, used by tests and by embedders that maintain the ring
/// themselves.
///
/// Every mutation rebuilds the published snapshot and fires the registered
/// watch callbacks, mirroring how a KV-backed ring client behaves.
pub struct InMemoryRing {
    instances: RwLock<BTreeMap<InstanceId, InstanceDesc>>,
    snapshot: RwLock<Arc<RingSnapshot>>,
    watchers: RwLock<Vec<WatchCallback>>,
    fail_reads: AtomicBool,
}

impl InMemoryRing {
    /// Create an empty ring.
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(BTreeMap::new()),
            snapshot: RwLock::new(Arc::new(RingSnapshot::empty())),
            watchers: RwLock::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Register or replace an instance.
    pub fn upsert_instance(&self, desc: InstanceDesc) {
        self.instances.write().insert(desc.id.clone(), desc);
        self.publish();
    }

    /// Remove an instance.
    pub fn remove_instance(&self, id: &str) {
        let removed = self.instances.write().remove(id).is_some();
        if removed {
            self.publish();
        }
    }

    /// Change an instance's state, leaving its tokens in place.
    pub fn set_instance_state(&self, id: &str, state: InstanceState) {
        {
            let mut instances = self.instances.write();
            match instances.get_mut(id) {
                Some(desc) => desc.state = state,
                None => return,
            }
        }
        self.publish();
    }

    /// Record a heartbeat for an instance.
    pub fn heartbeat(&self, id: &str, unix_seconds: u64) {
        {
            let mut instances = self.instances.write();
            match instances.get_mut(id) {
                Some(desc) => desc.heartbeat = unix_seconds,
                None => return,
            }
        }
        self.publish();
    }

    /// Make subsequent `current_snapshot` calls fail, simulating a transient
    /// KV outage.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    fn publish(&self) {
        let snapshot = Arc::new(RingSnapshot::new(self.instances.read().values().cloned()));
        *self.snapshot.write() = snapshot;
        for callback in self.watchers.read().iter() {
            callback();
        }
    }
}

impl RingSource for InMemoryRing {
    fn current_snapshot(&self) -> Result<Arc<RingSnapshot>> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(RingError::ReadFailed("simulated ring outage".to_string()).into());
        }
        Ok(self.snapshot.read().clone())
    }

    fn watch(&self, callback: WatchCallback) {
        self.watchers.write().push(callback);
    }
}

impl std::fmt::Debug for InMemoryRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRing")
            .field("instances", &self.instances.read().len())
            .field("watchers", &self.watchers.read().len())
            .finish()
    }
}
