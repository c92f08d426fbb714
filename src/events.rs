//! Toggle lifecycle events and the listener bus.
//!
//! Only the prepare event can be vetoed, and a veto is a returned
//! [`Verdict`], never a flag flipped on a shared event.

use crate::request::{ToggleAction, ToggleCause};
use crate::structure::Structure;
use crate::types::{Cuboid, StructureId};
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Fired before a lease is taken; any listener may cancel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareToggleEvent {
    pub structure: Structure,
    pub cause: ToggleCause,
    pub action: ToggleAction,
    pub destination: Cuboid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleStartEvent {
    pub structure_id: StructureId,
    pub cause: ToggleCause,
    pub destination: Cuboid,
    pub duration_ticks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleEndEvent {
    pub structure_id: StructureId,
    pub cause: ToggleCause,
    pub is_open: bool,
    pub cuboid: Cuboid,
    pub committed_blocks: usize,
}

/// The animation aborted; the structure is unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleFailedEvent {
    pub structure_id: StructureId,
    pub cause: ToggleCause,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Cancelled(String),
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

pub trait ToggleListener: Send + Sync {
    fn on_prepare(&self, _event: &PrepareToggleEvent) -> Verdict {
        Verdict::Allowed
    }

    fn on_start(&self, _event: &ToggleStartEvent) {}

    fn on_end(&self, _event: &ToggleEndEvent) {}

    fn on_failed(&self, _event: &ToggleFailedEvent) {}
}

/// Fan-out to registered listeners, in registration order.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn ToggleListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn ToggleListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// First cancellation wins; later listeners are not asked.
    pub fn prepare(&self, event: &PrepareToggleEvent) -> Verdict {
        for listener in self.snapshot() {
            if let Verdict::Cancelled(reason) = listener.on_prepare(event) {
                info!(
                    "Toggle of structure {} cancelled by listener: {}",
                    event.structure.id, reason
                );
                return Verdict::Cancelled(reason);
            }
        }
        Verdict::Allowed
    }

    pub fn started(&self, event: &ToggleStartEvent) {
        debug!("Structure {} started moving", event.structure_id);
        for listener in self.snapshot() {
            listener.on_start(event);
        }
    }

    pub fn ended(&self, event: &ToggleEndEvent) {
        for listener in self.snapshot() {
            listener.on_end(event);
        }
    }

    pub fn failed(&self, event: &ToggleFailedEvent) {
        for listener in self.snapshot() {
            listener.on_failed(event);
        }
    }

    // Listeners run without the lock held so they may subscribe others.
    fn snapshot(&self) -> Vec<Arc<dyn ToggleListener>> {
        self.listeners.read().clone()
    }
}
