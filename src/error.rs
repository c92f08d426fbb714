//! Crate-level error types.

use crate::types::{Cuboid, Direction, StructureId, Vec3i};
use thiserror::Error;

/// The archetype could not produce a destination for this toggle.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    #[error("no valid destination: {0}")]
    NoValidDestination(String),
    #[error("archetype '{archetype}' cannot open {direction}")]
    InvalidOpenDirection {
        archetype: String,
        direction: Direction,
    },
    #[error("unsupported archetype '{0}'")]
    UnsupportedArchetype(String),
    #[error("destination obstructed at {at}")]
    Obstructed { at: Vec3i },
}

/// Failure reported by a [`crate::world::WorldAccess`] implementation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorldError {
    #[error("region at {0} is not loaded")]
    Unloaded(Vec3i),
    #[error("block at {0} is occupied")]
    Obstructed(Vec3i),
    #[error("unknown moving representation {0}")]
    UnknownHandle(u64),
    #[error("world rejected write at {at}: {reason}")]
    WriteRejected { at: Vec3i, reason: String },
}

/// Failure reported by a [`crate::structure::StructureStore`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("structure {0} not found")]
    NotFound(StructureId),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Terminal failure of a single animation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MoverError {
    #[error("block '{kind}' at {at} cannot be animated")]
    UnsupportedBlock { kind: String, at: Vec3i },
    #[error("animation cancelled")]
    Cancelled,
    #[error("no blocks to move in {0}")]
    NothingToMove(Cuboid),
    #[error("world error: {0}")]
    World(#[from] WorldError),
    #[error("committed {committed} blocks but captured {captured}")]
    ConservationViolated { committed: usize, captured: usize },
    #[error("door service stopped before the animation finished")]
    ServiceStopped,
}

/// Why a toggle pipeline failed after it started doing real work.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToggleError {
    #[error("geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error("animation: {0}")]
    Mover(#[from] MoverError),
    #[error("storage: {0}")]
    Store(#[from] StoreError),
    #[error("internal: {0}")]
    Internal(String),
}

/// Archetype extension loading failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("dependency cycle between archetype extensions: {0:?}")]
    DependencyCycle(Vec<String>),
    #[error("archetype extension '{extension}' depends on unknown '{dependency}'")]
    MissingDependency {
        extension: String,
        dependency: String,
    },
    #[error("archetype '{0}' is registered twice")]
    Duplicate(String),
}
