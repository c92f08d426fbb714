//! DoorService – the tick-bound driver that owns every in-flight mover.
//!
//! World mutation only happens inside [`DoorService::tick`]. Orchestrator
//! pipelines hand movers over through a [`MoverQueue`] and wait on a oneshot
//! reply; the queue is drained at the start of each tick.

use crate::error::MoverError;
use crate::mover::{MoveReport, Mover, MoverStep};
use crate::types::{DoorServiceConfig, DoorStats, StructureId};
use crate::world::{BlockClassifier, WorldAccess};
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub type MoverResult = Result<MoveReport, MoverError>;

// ---------------------------------------------------------------------------
// Hand-off
// ---------------------------------------------------------------------------

/// A mover waiting to be picked up by the next tick.
pub struct MoverJob {
    pub mover: Mover,
    pub reply: oneshot::Sender<MoverResult>,
}

/// Sending half of the door service's job queue.
#[derive(Clone)]
pub struct MoverQueue {
    tx: mpsc::UnboundedSender<MoverJob>,
}

impl MoverQueue {
    /// Queue `mover` for the tick loop; the receiver resolves when it reaches
    /// a terminal state.
    pub fn submit(&self, mover: Mover) -> Result<oneshot::Receiver<MoverResult>, MoverError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MoverJob { mover, reply })
            .map_err(|_| MoverError::ServiceStopped)?;
        Ok(rx)
    }
}

// ---------------------------------------------------------------------------
// Tick result
// ---------------------------------------------------------------------------

/// Everything that happened during a single [`DoorService::tick`] call.
#[derive(Debug, Default)]
pub struct TickEvents {
    /// The tick counter that produced this set of events.
    pub tick: u64,
    /// Movers picked up from the queue this tick.
    pub started: Vec<StructureId>,
    pub completed: Vec<MoveReport>,
    pub aborted: Vec<(StructureId, MoverError)>,
    /// Movers still running after this tick.
    pub in_flight: usize,
}

struct ActiveMover {
    mover: Mover,
    reply: oneshot::Sender<MoverResult>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct DoorService {
    config: DoorServiceConfig,
    world: Arc<dyn WorldAccess>,
    classifier: Arc<dyn BlockClassifier>,
    jobs_tx: mpsc::UnboundedSender<MoverJob>,
    jobs_rx: mpsc::UnboundedReceiver<MoverJob>,
    movers: Vec<ActiveMover>,
    tick_count: u64,
    completed: u64,
    aborted: u64,
}

impl DoorService {
    pub fn new(
        config: DoorServiceConfig,
        world: Arc<dyn WorldAccess>,
        classifier: Arc<dyn BlockClassifier>,
    ) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        Self {
            config,
            world,
            classifier,
            jobs_tx,
            jobs_rx,
            movers: Vec::new(),
            tick_count: 0,
            completed: 0,
            aborted: 0,
        }
    }

    pub fn config(&self) -> &DoorServiceConfig {
        &self.config
    }

    pub fn queue(&self) -> MoverQueue {
        MoverQueue {
            tx: self.jobs_tx.clone(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.movers.len()
    }

    // -----------------------------------------------------------------------
    // Main tick
    // -----------------------------------------------------------------------

    /// Advance every in-flight mover by one step.
    pub fn tick(&mut self) -> TickEvents {
        self.tick_count += 1;
        let mut events = TickEvents {
            tick: self.tick_count,
            ..Default::default()
        };

        while let Ok(job) = self.jobs_rx.try_recv() {
            events.started.push(job.mover.structure_id());
            self.movers.push(ActiveMover {
                mover: job.mover,
                reply: job.reply,
            });
        }

        let world = self.world.as_ref();
        let classifier = self.classifier.as_ref();
        let mut still_running = Vec::with_capacity(self.movers.len());

        for mut active in std::mem::take(&mut self.movers) {
            match active.mover.step(world, classifier) {
                MoverStep::Running => still_running.push(active),
                MoverStep::Finished(result) => {
                    let id = active.mover.structure_id();
                    match &result {
                        Ok(report) => {
                            self.completed += 1;
                            events.completed.push(report.clone());
                        }
                        Err(e) => {
                            self.aborted += 1;
                            events.aborted.push((id, e.clone()));
                        }
                    }
                    if active.reply.send(result).is_err() {
                        warn!("Nobody is waiting for the animation of structure {}", id);
                    }
                }
            }
        }

        self.movers = still_running;
        events.in_flight = self.movers.len();
        events
    }

    /// Abort every in-flight and queued mover, restoring what they touched.
    pub fn shutdown(&mut self) -> usize {
        self.jobs_rx.close();
        while let Ok(job) = self.jobs_rx.try_recv() {
            self.movers.push(ActiveMover {
                mover: job.mover,
                reply: job.reply,
            });
        }

        let count = self.movers.len();
        for mut active in std::mem::take(&mut self.movers) {
            let id = active.mover.structure_id();
            if let MoverStep::Finished(result) = active.mover.shutdown(self.world.as_ref()) {
                self.aborted += 1;
                let _ = active.reply.send(result);
            }
            debug!("Stopped animation of structure {}", id);
        }
        count
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> DoorStats {
        DoorStats {
            in_flight: self.movers.len(),
            completed: self.completed,
            aborted: self.aborted,
            total_ticks: self.tick_count,
        }
    }
}
