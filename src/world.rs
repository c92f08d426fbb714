//! World subsystem: the block-access, authorization and classification
//! boundaries the engine consumes, plus in-memory implementations.

use crate::block::{BlockState, Orientation};
use crate::error::WorldError;
use crate::types::{Cuboid, PlayerId, Vec3, Vec3i};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Handle to a moving block representation spawned by the world.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct MovingHandle(pub u64);

/// Block access. Implementations translate to a concrete game server and are
/// only ever mutated from the door service tick.
///
/// [`WorldAccess::read_block`] is also called from orchestrator tasks for the
/// advisory clearance check, so it must be safe to call off the tick. The
/// mover re-checks every destination cell at commit time.
pub trait WorldAccess: Send + Sync {
    /// May run concurrently with a tick.
    fn read_block(&self, at: Vec3i) -> Result<BlockState, WorldError>;
    fn write_block(&self, at: Vec3i, state: BlockState) -> Result<(), WorldError>;

    fn spawn_moving(&self, state: &BlockState, start: Vec3i) -> Result<MovingHandle, WorldError>;
    fn update_moving(
        &self,
        handle: MovingHandle,
        position: Vec3,
        orientation: Orientation,
    ) -> Result<(), WorldError>;
    fn despawn_moving(&self, handle: MovingHandle) -> Result<(), WorldError>;
}

/// World-protection check, asked for every block a toggle would touch.
pub trait AuthorizationProvider: Send + Sync {
    fn can_mutate(&self, identity: Option<&PlayerId>, at: Vec3i) -> bool;
}

/// Decides which blocks may move and which need their support placed first.
pub trait BlockClassifier: Send + Sync {
    fn is_animatable(&self, state: &BlockState) -> bool;
    fn is_deferred_placement(&self, state: &BlockState) -> bool;
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Grants everything. Used when no protection plugin is installed.
pub struct AllowAll;

impl AuthorizationProvider for AllowAll {
    fn can_mutate(&self, _identity: Option<&PlayerId>, _at: Vec3i) -> bool {
        true
    }
}

/// Denies every coordinate inside any of its protected regions.
#[derive(Default)]
pub struct ProtectedRegions {
    regions: RwLock<Vec<Cuboid>>,
}

impl ProtectedRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protect(&self, region: Cuboid) {
        self.regions.write().push(region);
    }
}

impl AuthorizationProvider for ProtectedRegions {
    fn can_mutate(&self, _identity: Option<&PlayerId>, at: Vec3i) -> bool {
        !self.regions.read().iter().any(|r| r.contains(at))
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Kind-name based classifier driven by the service configuration.
pub struct DefaultClassifier {
    blacklist: HashSet<String>,
    deferred: HashSet<String>,
}

impl DefaultClassifier {
    pub fn new<B, D>(blacklist: B, deferred: D) -> Self
    where
        B: IntoIterator<Item = String>,
        D: IntoIterator<Item = String>,
    {
        Self {
            blacklist: blacklist.into_iter().collect(),
            deferred: deferred.into_iter().collect(),
        }
    }

    pub fn from_config(config: &crate::types::DoorServiceConfig) -> Self {
        Self::new(config.blacklist.clone(), config.deferred_blocks.clone())
    }
}

impl BlockClassifier for DefaultClassifier {
    fn is_animatable(&self, state: &BlockState) -> bool {
        !self.blacklist.contains(&state.kind)
    }

    fn is_deferred_placement(&self, state: &BlockState) -> bool {
        self.deferred.contains(&state.kind)
    }
}

// ---------------------------------------------------------------------------
// In-memory world
// ---------------------------------------------------------------------------

/// A moving representation as the in-memory world tracks it.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingBlock {
    pub state: BlockState,
    pub position: Vec3,
    pub orientation: Orientation,
}

/// Sparse block map; absent coordinates are air.
///
/// Keeps a log of every successful write so callers can inspect placement
/// order, and supports unloaded regions and injected write failures.
pub struct MemoryWorld {
    blocks: RwLock<HashMap<Vec3i, BlockState>>,
    moving: RwLock<HashMap<MovingHandle, MovingBlock>>,
    next_handle: AtomicU64,
    write_log: Mutex<Vec<(Vec3i, BlockState)>>,
    unloaded: RwLock<Vec<Cuboid>>,
    failing: RwLock<HashSet<Vec3i>>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
            moving: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            write_log: Mutex::new(Vec::new()),
            unloaded: RwLock::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Set a block directly, bypassing the write log.
    pub fn set(&self, at: Vec3i, state: BlockState) {
        let mut blocks = self.blocks.write();
        if state.is_air() {
            blocks.remove(&at);
        } else {
            blocks.insert(at, state);
        }
    }

    /// Fill a region with one block kind.
    pub fn fill(&self, region: Cuboid, state: &BlockState) {
        for at in region.iter() {
            self.set(at, state.clone());
        }
    }

    pub fn get(&self, at: Vec3i) -> BlockState {
        self.blocks
            .read()
            .get(&at)
            .cloned()
            .unwrap_or_else(BlockState::air)
    }

    pub fn non_air_count(&self) -> usize {
        self.blocks.read().len()
    }

    /// Every non-air block inside `region`.
    pub fn blocks_in(&self, region: Cuboid) -> Vec<(Vec3i, BlockState)> {
        let blocks = self.blocks.read();
        let mut found: Vec<_> = blocks
            .iter()
            .filter(|(at, _)| region.contains(**at))
            .map(|(at, state)| (*at, state.clone()))
            .collect();
        found.sort_by_key(|(at, _)| *at);
        found
    }

    pub fn moving_count(&self) -> usize {
        self.moving.read().len()
    }

    pub fn moving_block(&self, handle: MovingHandle) -> Option<MovingBlock> {
        self.moving.read().get(&handle).cloned()
    }

    pub fn write_log(&self) -> Vec<(Vec3i, BlockState)> {
        self.write_log.lock().clone()
    }

    pub fn clear_write_log(&self) {
        self.write_log.lock().clear();
    }

    pub fn unload(&self, region: Cuboid) {
        self.unloaded.write().push(region);
    }

    pub fn load_all(&self) {
        self.unloaded.write().clear();
    }

    /// Make every subsequent write at `at` fail.
    pub fn fail_writes_at(&self, at: Vec3i) {
        self.failing.write().insert(at);
    }

    fn check_loaded(&self, at: Vec3i) -> Result<(), WorldError> {
        if self.unloaded.read().iter().any(|r| r.contains(at)) {
            return Err(WorldError::Unloaded(at));
        }
        Ok(())
    }
}

impl Default for MemoryWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldAccess for MemoryWorld {
    fn read_block(&self, at: Vec3i) -> Result<BlockState, WorldError> {
        self.check_loaded(at)?;
        Ok(self.get(at))
    }

    fn write_block(&self, at: Vec3i, state: BlockState) -> Result<(), WorldError> {
        self.check_loaded(at)?;
        if self.failing.read().contains(&at) {
            return Err(WorldError::WriteRejected {
                at,
                reason: "injected failure".into(),
            });
        }
        self.set(at, state.clone());
        self.write_log.lock().push((at, state));
        Ok(())
    }

    fn spawn_moving(&self, state: &BlockState, start: Vec3i) -> Result<MovingHandle, WorldError> {
        self.check_loaded(start)?;
        let handle = MovingHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.moving.write().insert(
            handle,
            MovingBlock {
                state: state.clone(),
                position: start.into(),
                orientation: Orientation::upright(),
            },
        );
        Ok(handle)
    }

    fn update_moving(
        &self,
        handle: MovingHandle,
        position: Vec3,
        orientation: Orientation,
    ) -> Result<(), WorldError> {
        let mut moving = self.moving.write();
        let block = moving
            .get_mut(&handle)
            .ok_or(WorldError::UnknownHandle(handle.0))?;
        block.position = position;
        block.orientation = orientation;
        Ok(())
    }

    fn despawn_moving(&self, handle: MovingHandle) -> Result<(), WorldError> {
        self.moving
            .write()
            .remove(&handle)
            .map(|_| ())
            .ok_or(WorldError::UnknownHandle(handle.0))
    }
}
