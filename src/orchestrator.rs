//! ToggleOrchestrator – validates and sequences a toggle end to end.
//!
//! ```text
//! Created → Validating → AwaitingLease → Animating → CommittingState → Completed
//!               │              │              │
//!               └──────────────┴─→ Rejected   └─→ Failed
//! ```
//!
//! Validation, storage and protection lookups run in the calling task. The
//! only hand-off to the tick-bound stage is [`MoverQueue::submit`]; the
//! pipeline then waits for the mover's terminal state and commits the new
//! structure state while still holding the lease.

use crate::activity::{ActivityRegistry, Busy, Lease};
use crate::archetype::{plan_toggle, ArchetypeRegistry, TogglePlan, WorldBounds};
use crate::autoclose::AutoCloseScheduler;
use crate::error::{GeometryError, MoverError, StoreError, ToggleError};
use crate::events::{
    EventBus, PrepareToggleEvent, ToggleEndEvent, ToggleFailedEvent, ToggleStartEvent, Verdict,
};
use crate::mover::{animation_ticks, MoveReport, Mover};
use crate::request::{Rejection, ToggleCause, ToggleOutcome, ToggleReport, ToggleRequest};
use crate::service::MoverQueue;
use crate::structure::{Structure, StructureStore};
use crate::types::{DoorServiceConfig, PlayerId, StructureId, Vec3i};
use crate::world::{AuthorizationProvider, WorldAccess};
use log::{debug, error, info};
use std::sync::Arc;

/// Pipeline stage, logged as a toggle advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleStage {
    Created,
    Validating,
    AwaitingLease,
    Animating,
    CommittingState,
    Completed,
    Rejected,
    Failed,
}

/// Everything the orchestrator talks to. Built once at startup.
pub struct Collaborators {
    pub archetypes: Arc<ArchetypeRegistry>,
    pub store: Arc<dyn StructureStore>,
    /// Read only here (clearance check); writes happen in the door service.
    pub world: Arc<dyn WorldAccess>,
    pub authorization: Arc<dyn AuthorizationProvider>,
    pub events: Arc<EventBus>,
    pub activity: Arc<ActivityRegistry>,
    pub auto_close: Arc<AutoCloseScheduler>,
    pub movers: MoverQueue,
}

pub struct ToggleOrchestrator {
    config: DoorServiceConfig,
    parts: Collaborators,
}

impl ToggleOrchestrator {
    pub fn new(config: DoorServiceConfig, parts: Collaborators) -> Self {
        Self { config, parts }
    }

    pub fn activity(&self) -> &ActivityRegistry {
        &self.parts.activity
    }

    pub fn auto_close(&self) -> &AutoCloseScheduler {
        &self.parts.auto_close
    }

    pub fn events(&self) -> &EventBus {
        &self.parts.events
    }

    /// Ask a running animation to stop at its next tick.
    pub fn abort(&self, id: StructureId) -> bool {
        self.parts.activity.abort(id)
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Run one independent pipeline per selected structure.
    ///
    /// Outcomes come back in selector order; one structure's failure does not
    /// affect its siblings.
    pub async fn submit(self: &Arc<Self>, request: ToggleRequest) -> Vec<(StructureId, ToggleOutcome)> {
        let request = Arc::new(request);
        let handles: Vec<_> = request
            .selector
            .ids()
            .into_iter()
            .map(|id| {
                let this = Arc::clone(self);
                let request = Arc::clone(&request);
                (id, tokio::spawn(async move { this.submit_one(id, &request).await }))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let outcome = handle.await.unwrap_or_else(|e| {
                error!("Toggle pipeline for structure {} panicked: {}", id, e);
                ToggleOutcome::Failed(ToggleError::Internal(e.to_string()))
            });
            outcomes.push((id, outcome));
        }
        outcomes
    }

    /// Run the full pipeline for a single structure.
    pub async fn submit_one(&self, id: StructureId, request: &ToggleRequest) -> ToggleOutcome {
        stage(id, ToggleStage::Created);
        let outcome = self.run(id, request).await;
        match &outcome {
            ToggleOutcome::Completed(_) => stage(id, ToggleStage::Completed),
            ToggleOutcome::Rejected(r) => {
                stage(id, ToggleStage::Rejected);
                info!("Toggle of structure {} rejected: {}", id, r);
            }
            ToggleOutcome::Failed(e) => {
                stage(id, ToggleStage::Failed);
                info!("Toggle of structure {} failed: {}", id, e);
            }
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    async fn run(&self, id: StructureId, request: &ToggleRequest) -> ToggleOutcome {
        stage(id, ToggleStage::Validating);
        let structure = match self.load(id) {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };
        if let Err(rejection) = self.validate(&structure, request) {
            return ToggleOutcome::Rejected(rejection);
        }

        let plan = match self.plan(&structure) {
            Ok(plan) => plan,
            Err(e) => return ToggleOutcome::Failed(e.into()),
        };

        let prepare = PrepareToggleEvent {
            structure: structure.clone(),
            cause: request.cause.clone(),
            action: request.action,
            destination: plan.destination,
        };
        if let Verdict::Cancelled(reason) = self.parts.events.prepare(&prepare) {
            return ToggleOutcome::Rejected(Rejection::Cancelled(reason));
        }

        stage(id, ToggleStage::AwaitingLease);
        let lease = match self.parts.activity.try_acquire(id) {
            Ok(lease) => lease,
            Err(Busy(_)) => return ToggleOutcome::Rejected(Rejection::Busy),
        };
        let outcome = self.run_leased(structure, request, &lease).await;
        self.parts.activity.release(lease);
        outcome
    }

    /// Everything that must happen while the structure is leased.
    async fn run_leased(
        &self,
        prepared: Structure,
        request: &ToggleRequest,
        lease: &Lease,
    ) -> ToggleOutcome {
        // Another toggle may have committed between the first load and the lease.
        let structure = match self.load(prepared.id) {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };
        if structure != prepared {
            debug!(
                "Structure {} changed while its toggle was being prepared",
                structure.id
            );
            return ToggleOutcome::Rejected(Rejection::Busy);
        }
        let plan = match self.plan(&structure) {
            Ok(plan) => plan,
            Err(e) => return ToggleOutcome::Failed(e.into()),
        };

        let identity = responsible_identity(&structure, request);
        if let Some(at) = self.first_denied(identity.as_ref(), &plan) {
            return ToggleOutcome::Rejected(Rejection::Unauthorized { at });
        }

        if request.cause != ToggleCause::Server && self.parts.auto_close.cancel(structure.id) {
            debug!(
                "Manual toggle of structure {} superseded its auto-close",
                structure.id
            );
        }

        self.animate_and_commit(structure, request, plan, lease).await
    }

    fn load(&self, id: StructureId) -> Result<Structure, ToggleOutcome> {
        match self.parts.store.load_structure(id) {
            Ok(s) => Ok(s),
            Err(StoreError::NotFound(_)) => Err(ToggleOutcome::Rejected(Rejection::NotFound)),
            Err(e) => Err(ToggleOutcome::Failed(e.into())),
        }
    }

    fn validate(&self, structure: &Structure, request: &ToggleRequest) -> Result<(), Rejection> {
        if let ToggleCause::Player(player) = &request.cause {
            match structure.owner(player) {
                Some(owner) if owner.permission <= self.config.toggle_permission => {}
                _ => return Err(Rejection::NoPermission),
            }
        }
        if structure.is_locked {
            return Err(Rejection::Locked);
        }
        if !request.action.applies_to(structure.is_open) {
            return Err(Rejection::AlreadyInState);
        }
        Ok(())
    }

    /// Geometry for this toggle plus the "is the destination clear" check.
    fn plan(&self, structure: &Structure) -> Result<TogglePlan, GeometryError> {
        let archetype = self.parts.archetypes.get(&structure.archetype)?;
        let bounds = WorldBounds::new(self.config.world_min_y, self.config.world_max_y);
        let plan = plan_toggle(archetype.as_ref(), structure, bounds)?;

        for at in plan.destination.iter() {
            if plan.source.contains(at) {
                continue;
            }
            // An unreadable cell counts as blocked.
            let clear = self
                .parts
                .world
                .read_block(at)
                .map(|b| b.is_air())
                .unwrap_or(false);
            if !clear {
                return Err(GeometryError::Obstructed { at });
            }
        }
        Ok(plan)
    }

    fn first_denied(&self, identity: Option<&PlayerId>, plan: &TogglePlan) -> Option<Vec3i> {
        plan.source
            .iter()
            .chain(plan.destination.iter())
            .find(|at| !self.parts.authorization.can_mutate(identity, *at))
    }

    async fn animate_and_commit(
        &self,
        structure: Structure,
        request: &ToggleRequest,
        plan: TogglePlan,
        lease: &Lease,
    ) -> ToggleOutcome {
        let id = structure.id;
        stage(id, ToggleStage::Animating);

        let duration = animation_ticks(
            plan.max_travel(),
            &self.config,
            request.speed_multiplier,
            request.skip_animation,
        );
        self.parts.events.started(&ToggleStartEvent {
            structure_id: id,
            cause: request.cause.clone(),
            destination: plan.destination,
            duration_ticks: duration,
        });

        let mover = Mover::new(id, plan, duration, lease.cancel_flag());
        let result = match self.parts.movers.submit(mover) {
            Ok(reply) => reply.await.unwrap_or(Err(MoverError::ServiceStopped)),
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => self.commit_state(structure, request, report),
            Err(e) => {
                self.parts.events.failed(&ToggleFailedEvent {
                    structure_id: id,
                    cause: request.cause.clone(),
                    reason: e.to_string(),
                });
                ToggleOutcome::Failed(e.into())
            }
        }
    }

    fn commit_state(
        &self,
        mut structure: Structure,
        request: &ToggleRequest,
        report: MoveReport,
    ) -> ToggleOutcome {
        let id = structure.id;
        stage(id, ToggleStage::CommittingState);

        let previous_cuboid = structure.cuboid;
        structure.cuboid = report.destination;
        structure.is_open = !structure.is_open;

        let persisted = match self.parts.store.save_structure(&structure) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Structure {} moved to {} but could not be saved: {}; storage needs reconciling",
                    id, structure.cuboid, e
                );
                false
            }
        };

        self.parts.events.ended(&ToggleEndEvent {
            structure_id: id,
            cause: request.cause.clone(),
            is_open: structure.is_open,
            cuboid: structure.cuboid,
            committed_blocks: report.committed,
        });

        let auto_close_scheduled = match structure.auto_close_delay() {
            Some(delay) if structure.is_open => {
                self.parts.auto_close.schedule_close(id, delay);
                true
            }
            _ => false,
        };

        ToggleOutcome::Completed(ToggleReport {
            structure,
            previous_cuboid,
            committed_blocks: report.committed,
            persisted,
            auto_close_scheduled,
        })
    }
}

/// Identity used for protection checks.
fn responsible_identity(structure: &Structure, request: &ToggleRequest) -> Option<PlayerId> {
    if let Some(player) = &request.responsible {
        return Some(player.clone());
    }
    if let ToggleCause::Player(player) = &request.cause {
        return Some(player.clone());
    }
    structure.prime_owner().map(|o| o.player.clone())
}

fn stage(id: StructureId, current: ToggleStage) {
    debug!("Structure {}: {:?}", id, current);
}
