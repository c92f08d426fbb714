//! Activity registry: at most one in-flight animation per structure.
//!
//! Acquiring is a single check-and-set under a short-lived lock; nothing
//! holds the lock across a tick. A busy structure fails fast, there is no
//! waiting queue.

use crate::types::StructureId;
use log::debug;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;

/// The structure already has an animation in flight.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("structure {0} is busy")]
pub struct Busy(pub StructureId);

/// Cooperative cancellation flag shared by a lease and its registry record.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct ActivityRecord {
    lease_id: u64,
    cancel: CancelFlag,
}

#[derive(Default)]
struct Inner {
    records: HashMap<StructureId, ActivityRecord>,
    next_lease: u64,
}

#[derive(Default)]
pub struct ActivityRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the animation slot of `id`, or fail with [`Busy`].
    pub fn try_acquire(&self, id: StructureId) -> Result<Lease, Busy> {
        let mut inner = self.inner.lock();
        inner.next_lease += 1;
        let lease_id = inner.next_lease;
        match inner.records.entry(id) {
            Entry::Occupied(_) => Err(Busy(id)),
            Entry::Vacant(v) => {
                let cancel = CancelFlag::new();
                v.insert(ActivityRecord {
                    lease_id,
                    cancel: cancel.clone(),
                });
                debug!("Acquired lease {} for structure {}", lease_id, id);
                Ok(Lease {
                    id,
                    lease_id,
                    cancel,
                    registry: Arc::downgrade(&self.inner),
                })
            }
        }
    }

    /// Give the slot back. Equivalent to dropping the lease.
    pub fn release(&self, lease: Lease) {
        drop(lease);
    }

    /// Ask the animation on `id` to stop at its next tick. Returns whether an
    /// animation was in flight.
    pub fn abort(&self, id: StructureId) -> bool {
        match self.inner.lock().records.get(&id) {
            Some(record) => {
                record.cancel.cancel();
                debug!("Abort requested for structure {}", id);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, id: StructureId) -> bool {
        self.inner.lock().records.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Abort every in-flight animation (shutdown).
    pub fn abort_all(&self) -> usize {
        let inner = self.inner.lock();
        for record in inner.records.values() {
            record.cancel.cancel();
        }
        inner.records.len()
    }
}

/// Proof of exclusive ownership of a structure's animation slot.
///
/// Dropping the lease releases the slot, so every exit path of a toggle
/// pipeline gives it back.
#[derive(Debug)]
pub struct Lease {
    id: StructureId,
    lease_id: u64,
    cancel: CancelFlag,
    registry: Weak<Mutex<Inner>>,
}

impl Lease {
    pub fn structure_id(&self) -> StructureId {
        self.id
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let mut inner = inner.lock();
        // Only remove our own record.
        if inner
            .records
            .get(&self.id)
            .is_some_and(|r| r.lease_id == self.lease_id)
        {
            inner.records.remove(&self.id);
            debug!("Released lease {} for structure {}", self.lease_id, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy_until_release() {
        let registry = ActivityRegistry::new();
        let lease = registry.try_acquire(StructureId(1)).unwrap();
        assert_eq!(
            registry.try_acquire(StructureId(1)).unwrap_err(),
            Busy(StructureId(1))
        );
        registry.release(lease);
        assert!(registry.try_acquire(StructureId(1)).is_ok());
    }
}
