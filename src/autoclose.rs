//! Auto-close scheduler: one-shot timers that close a structure again after
//! it was opened.
//!
//! At most one timer is outstanding per structure. Scheduling again replaces
//! the pending timer, and a replaced or cancelled timer never fires. A fired
//! timer submits a server-caused close request into the request channel, the
//! same way any other trigger source does.

use crate::request::ToggleRequest;
use crate::types::StructureId;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct PendingClose {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct AutoCloseScheduler {
    requests: mpsc::UnboundedSender<ToggleRequest>,
    timers: Arc<Mutex<HashMap<StructureId, PendingClose>>>,
    next_generation: AtomicU64,
}

impl AutoCloseScheduler {
    pub fn new(requests: mpsc::UnboundedSender<ToggleRequest>) -> Self {
        Self {
            requests,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Close `id` after `delay`, replacing any pending close for it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule_close(&self, id: StructureId, delay: Duration) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);
        let requests = self.requests.clone();

        // Held across spawn + insert so the timer cannot look itself up first.
        let mut pending = self.timers.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let current = {
                let mut timers = timers.lock();
                match timers.get(&id) {
                    Some(p) if p.generation == generation => {
                        timers.remove(&id);
                        true
                    }
                    _ => false,
                }
            };
            if !current {
                return;
            }

            info!("Auto-closing structure {}", id);
            if requests.send(ToggleRequest::auto_close(id)).is_err() {
                warn!("Auto-close of structure {} dropped: request channel closed", id);
            }
        });

        if let Some(previous) = pending.insert(id, PendingClose { generation, handle }) {
            previous.handle.abort();
            debug!("Replaced pending auto-close of structure {}", id);
        } else {
            debug!("Scheduled auto-close of structure {} in {:?}", id, delay);
        }
    }

    /// Drop the pending close of `id`. Returns whether one was pending.
    pub fn cancel(&self, id: StructureId) -> bool {
        match self.timers.lock().remove(&id) {
            Some(pending) => {
                pending.handle.abort();
                debug!("Cancelled auto-close of structure {}", id);
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, id: StructureId) -> bool {
        self.timers.lock().contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.timers.lock().len()
    }

    pub fn cancel_all(&self) -> usize {
        let mut timers = self.timers.lock();
        let count = timers.len();
        for (_, pending) in timers.drain() {
            pending.handle.abort();
        }
        count
    }
}

impl Drop for AutoCloseScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
