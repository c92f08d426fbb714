//! Mover – the per-toggle animation state machine.
//!
//! ```text
//! Initialized → Snapshotting → Animating → Committing → Completed
//!                     │             │            │
//!                     └─────────────┴────────────┴──→ Aborted
//! ```
//!
//! A mover is driven exclusively by [`crate::service::DoorService::tick`],
//! one [`Mover::step`] per tick. Cancellation is read at the start of a step,
//! so a commit always runs to a pass boundary before it is honoured.

use crate::activity::CancelFlag;
use crate::archetype::TogglePlan;
use crate::block::{BlockState, Orientation, Rotation};
use crate::error::{MoverError, WorldError};
use crate::types::{Cuboid, DoorServiceConfig, StructureId, Vec3, Vec3i};
use crate::world::{BlockClassifier, MovingHandle, WorldAccess};
use log::{debug, warn};
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One captured block of the source cuboid.
#[derive(Debug, Clone)]
pub struct AnimatedBlockSnapshot {
    pub original: BlockState,
    pub start: Vec3i,
    pub dest: Vec3i,
    /// Block state written at `dest` (facing turned with the structure).
    pub final_state: BlockState,
    pub rotation: Rotation,
    /// Needs its support in place first; written in the second pass.
    pub deferred: bool,
    handle: Option<MovingHandle>,
}

impl AnimatedBlockSnapshot {
    pub fn handle(&self) -> Option<MovingHandle> {
        self.handle
    }
}

// ---------------------------------------------------------------------------
// State & results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoverState {
    Initialized,
    Snapshotting,
    Animating,
    Committing,
    Completed,
    Aborted,
}

impl MoverState {
    pub fn is_terminal(self) -> bool {
        matches!(self, MoverState::Completed | MoverState::Aborted)
    }
}

/// Summary of a completed animation.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub structure_id: StructureId,
    pub destination: Cuboid,
    pub captured: usize,
    pub committed: usize,
    pub deferred: usize,
    pub ticks: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoverStep {
    Running,
    Finished(Result<MoveReport, MoverError>),
}

/// Number of ticks an animation of `max_travel` blocks lasts.
///
/// Speed is `base_speed * multiplier` blocks per second, capped at
/// `max_speed`; a non-positive multiplier counts as 1. Skipping the animation
/// gives 0 ticks (commit on the first tick).
pub fn animation_ticks(
    max_travel: f32,
    config: &DoorServiceConfig,
    multiplier: f32,
    skip_animation: bool,
) -> u64 {
    if skip_animation {
        return 0;
    }
    let multiplier = if multiplier > 0.0 { multiplier } else { 1.0 };
    let speed = (config.base_speed * multiplier).min(config.max_speed);
    if speed <= 0.0 {
        return 1;
    }
    let seconds = max_travel / speed;
    ((seconds * config.tick_rate_hz).ceil() as u64).max(1)
}

// ---------------------------------------------------------------------------
// Mover
// ---------------------------------------------------------------------------

pub struct Mover {
    structure_id: StructureId,
    plan: TogglePlan,
    duration_ticks: u64,
    tick: u64,
    state: MoverState,
    snapshots: Vec<AnimatedBlockSnapshot>,
    cancel: CancelFlag,
    /// Destinations written during commit, for restoration on abort.
    written: Vec<Vec3i>,
    /// Sources cleared during commit, for restoration on abort.
    cleared: Vec<Vec3i>,
    result: Option<Result<MoveReport, MoverError>>,
}

impl Mover {
    pub fn new(
        structure_id: StructureId,
        plan: TogglePlan,
        duration_ticks: u64,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            structure_id,
            plan,
            duration_ticks,
            tick: 0,
            state: MoverState::Initialized,
            snapshots: Vec::new(),
            cancel,
            written: Vec::new(),
            cleared: Vec::new(),
            result: None,
        }
    }

    pub fn structure_id(&self) -> StructureId {
        self.structure_id
    }

    pub fn state(&self) -> MoverState {
        self.state
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn duration_ticks(&self) -> u64 {
        self.duration_ticks
    }

    pub fn snapshots(&self) -> &[AnimatedBlockSnapshot] {
        &self.snapshots
    }

    /// Advance by one tick.
    pub fn step(&mut self, world: &dyn WorldAccess, classifier: &dyn BlockClassifier) -> MoverStep {
        match self.state {
            MoverState::Initialized => {
                if self.cancel.is_cancelled() {
                    return self.abort(world, MoverError::Cancelled);
                }
                self.state = MoverState::Snapshotting;
                if let Err(e) = self.capture(world, classifier) {
                    return self.abort(world, e);
                }
                if self.duration_ticks == 0 {
                    return self.commit(world);
                }
                self.state = MoverState::Animating;
                MoverStep::Running
            }
            MoverState::Animating => {
                if self.cancel.is_cancelled() {
                    return self.abort(world, MoverError::Cancelled);
                }
                self.tick += 1;
                let t = self.tick as f32 / self.duration_ticks as f32;
                if let Err(e) = self.advance(world, t) {
                    return self.abort(world, e.into());
                }
                if self.tick >= self.duration_ticks {
                    return self.commit(world);
                }
                MoverStep::Running
            }
            MoverState::Snapshotting | MoverState::Committing => MoverStep::Running,
            MoverState::Completed | MoverState::Aborted => self.step_terminal(),
        }
    }

    /// Abort from outside the tick (service shutdown).
    pub fn shutdown(&mut self, world: &dyn WorldAccess) -> MoverStep {
        if self.state.is_terminal() {
            return self.step_terminal();
        }
        self.abort(world, MoverError::ServiceStopped)
    }

    fn step_terminal(&self) -> MoverStep {
        MoverStep::Finished(
            self.result
                .clone()
                .unwrap_or(Err(MoverError::ServiceStopped)),
        )
    }

    // -----------------------------------------------------------------------
    // Snapshotting
    // -----------------------------------------------------------------------

    fn capture(
        &mut self,
        world: &dyn WorldAccess,
        classifier: &dyn BlockClassifier,
    ) -> Result<(), MoverError> {
        let mut snapshots = Vec::with_capacity(self.plan.transforms.len());
        for (at, transform) in &self.plan.transforms {
            let original = world.read_block(*at)?;
            if original.is_air() {
                continue;
            }
            if !classifier.is_animatable(&original) {
                return Err(MoverError::UnsupportedBlock {
                    kind: original.kind,
                    at: *at,
                });
            }
            snapshots.push(AnimatedBlockSnapshot {
                final_state: original.rotated(transform.rotation),
                deferred: classifier.is_deferred_placement(&original),
                original,
                start: *at,
                dest: transform.dest,
                rotation: transform.rotation,
                handle: None,
            });
        }
        if snapshots.is_empty() {
            return Err(MoverError::NothingToMove(self.plan.source));
        }
        self.snapshots = snapshots;

        if self.duration_ticks > 0 {
            for snapshot in &mut self.snapshots {
                snapshot.handle = Some(world.spawn_moving(&snapshot.original, snapshot.start)?);
            }
        }

        debug!(
            "Structure {}: captured {} blocks ({} deferred), animating over {} ticks",
            self.structure_id,
            self.snapshots.len(),
            self.snapshots.iter().filter(|s| s.deferred).count(),
            self.duration_ticks
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Animating
    // -----------------------------------------------------------------------

    fn advance(&self, world: &dyn WorldAccess, t: f32) -> Result<(), WorldError> {
        for snapshot in &self.snapshots {
            let Some(handle) = snapshot.handle else {
                continue;
            };
            let position = Vec3::from(snapshot.start).lerp(Vec3::from(snapshot.dest), t);
            world.update_moving(handle, position, Orientation::partial(snapshot.rotation, t))?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Committing
    // -----------------------------------------------------------------------

    fn commit(&mut self, world: &dyn WorldAccess) -> MoverStep {
        self.state = MoverState::Committing;
        self.despawn_all(world);

        let committed = match self.place_both(world) {
            Ok(n) => n,
            Err(e) => return self.abort(world, e),
        };

        let captured = self.snapshots.len();
        if committed != captured {
            return self.abort(
                world,
                MoverError::ConservationViolated {
                    committed,
                    captured,
                },
            );
        }

        let report = MoveReport {
            structure_id: self.structure_id,
            destination: self.plan.destination,
            captured,
            committed,
            deferred: self.snapshots.iter().filter(|s| s.deferred).count(),
            ticks: self.tick,
        };
        debug!(
            "Structure {}: committed {} blocks into {}",
            self.structure_id, committed, report.destination
        );
        self.state = MoverState::Completed;
        self.result = Some(Ok(report.clone()));
        MoverStep::Finished(Ok(report))
    }

    /// Supports first, attachments second. The second pass never starts after
    /// a failed first pass.
    fn place_both(&mut self, world: &dyn WorldAccess) -> Result<usize, MoverError> {
        let supports = self.place_pass(world, false)?;
        let attachments = self.place_pass(world, true)?;
        Ok(supports + attachments)
    }

    /// Write every snapshot with the given `deferred` flag at its destination,
    /// then clear its source unless another block lands there.
    fn place_pass(&mut self, world: &dyn WorldAccess, deferred: bool) -> Result<usize, MoverError> {
        let destinations: HashSet<Vec3i> = self.snapshots.iter().map(|s| s.dest).collect();
        let starts: HashSet<Vec3i> = self.snapshots.iter().map(|s| s.start).collect();
        let mut placed = 0;

        for snapshot in self.snapshots.iter().filter(|s| s.deferred == deferred) {
            let occupant = world.read_block(snapshot.dest)?;
            if !occupant.is_air() && !starts.contains(&snapshot.dest) {
                return Err(WorldError::Obstructed(snapshot.dest).into());
            }
            world.write_block(snapshot.dest, snapshot.final_state.clone())?;
            self.written.push(snapshot.dest);

            if !destinations.contains(&snapshot.start) {
                world.write_block(snapshot.start, BlockState::air())?;
                self.cleared.push(snapshot.start);
            }
            placed += 1;
        }
        Ok(placed)
    }

    // -----------------------------------------------------------------------
    // Aborting
    // -----------------------------------------------------------------------

    fn abort(&mut self, world: &dyn WorldAccess, error: MoverError) -> MoverStep {
        warn!("Structure {}: animation aborted: {}", self.structure_id, error);
        self.despawn_all(world);

        if !self.written.is_empty() || !self.cleared.is_empty() {
            self.restore(world);
        }

        self.state = MoverState::Aborted;
        self.result = Some(Err(error.clone()));
        MoverStep::Finished(Err(error))
    }

    /// Best-effort: empty every written destination that was not a source,
    /// then put every original block back.
    fn restore(&mut self, world: &dyn WorldAccess) {
        let starts: HashSet<Vec3i> = self.snapshots.iter().map(|s| s.start).collect();
        for at in self.written.drain(..) {
            if !starts.contains(&at) {
                if let Err(e) = world.write_block(at, BlockState::air()) {
                    warn!("Restore: could not clear {}: {}", at, e);
                }
            }
        }
        for snapshot in &self.snapshots {
            if let Err(e) = world.write_block(snapshot.start, snapshot.original.clone()) {
                warn!("Restore: could not put back {} at {}: {}", snapshot.original, snapshot.start, e);
            }
        }
        self.cleared.clear();
    }

    fn despawn_all(&mut self, world: &dyn WorldAccess) {
        for snapshot in &mut self.snapshots {
            if let Some(handle) = snapshot.handle.take() {
                if let Err(e) = world.despawn_moving(handle) {
                    warn!("Failed to despawn moving block {:?}: {}", handle, e);
                }
            }
        }
    }
}
