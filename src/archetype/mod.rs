//! Archetype subsystem: per-kind geometry of a toggle.
//!
//! Every archetype answers two questions for a structure in its current
//! state: which cuboid it will occupy after the toggle, and where each block
//! of the source cuboid ends up (and how it is turned). Everything here is
//! pure; world reads such as the clearance check live in the orchestrator.

mod big_door;
mod drawbridge;
mod portcullis;
pub mod registry;
mod sliding;

pub use big_door::BigDoor;
pub use drawbridge::Drawbridge;
pub use portcullis::Portcullis;
pub use registry::{ArchetypeExtension, ArchetypeRegistry};
pub use sliding::SlidingDoor;

use crate::block::Rotation;
use crate::error::GeometryError;
use crate::structure::Structure;
use crate::types::{Cuboid, Direction, Vec3i};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Vertical limits of the world a destination must stay inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldBounds {
    pub min_y: i32,
    pub max_y: i32,
}

impl WorldBounds {
    pub fn new(min_y: i32, max_y: i32) -> Self {
        Self { min_y, max_y }
    }

    pub fn check(&self, cuboid: Cuboid) -> Result<Cuboid, GeometryError> {
        if cuboid.min().y < self.min_y || cuboid.max().y > self.max_y {
            return Err(GeometryError::NoValidDestination(format!(
                "{} leaves the world height range {}..={}",
                cuboid, self.min_y, self.max_y
            )));
        }
        Ok(cuboid)
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::new(-64, 319)
    }
}

/// Where one source block goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTransform {
    pub dest: Vec3i,
    pub rotation: Rotation,
}

pub trait Archetype: Send + Sync {
    /// Registry name, also stored on each [`Structure`].
    fn name(&self) -> &str;

    /// Open directions this archetype understands.
    fn open_directions(&self) -> &'static [Direction];

    /// Direction of this toggle cycle: the open direction when closed, its
    /// opposite when open.
    fn current_toggle_dir(&self, structure: &Structure) -> Direction {
        if structure.is_open {
            structure.open_dir.opposite()
        } else {
            structure.open_dir
        }
    }

    fn potential_new_cuboid(
        &self,
        structure: &Structure,
        dir: Direction,
        bounds: WorldBounds,
    ) -> Result<Cuboid, GeometryError>;

    fn block_transform(&self, structure: &Structure, dir: Direction, at: Vec3i) -> BlockTransform;

    fn check_direction(&self, dir: Direction) -> Result<(), GeometryError> {
        if self.open_directions().contains(&dir) {
            Ok(())
        } else {
            Err(GeometryError::InvalidOpenDirection {
                archetype: self.name().to_string(),
                direction: dir,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Toggle plan
// ---------------------------------------------------------------------------

/// Full geometry of one toggle: source, destination and every block transform.
#[derive(Debug, Clone)]
pub struct TogglePlan {
    pub direction: Direction,
    pub source: Cuboid,
    pub destination: Cuboid,
    /// One entry per coordinate of `source`, in [`Cuboid::iter`] order.
    pub transforms: Vec<(Vec3i, BlockTransform)>,
}

impl TogglePlan {
    /// Farthest any block travels, in blocks.
    pub fn max_travel(&self) -> f32 {
        self.transforms
            .iter()
            .map(|(from, t)| from.distance(t.dest))
            .fold(0.0, f32::max)
    }
}

/// Compute the plan for toggling `structure` once with `archetype`.
pub fn plan_toggle(
    archetype: &dyn Archetype,
    structure: &Structure,
    bounds: WorldBounds,
) -> Result<TogglePlan, GeometryError> {
    let direction = archetype.current_toggle_dir(structure);
    let destination = archetype.potential_new_cuboid(structure, direction, bounds)?;
    let transforms = structure
        .cuboid
        .iter()
        .map(|at| (at, archetype.block_transform(structure, direction, at)))
        .collect();

    Ok(TogglePlan {
        direction,
        source: structure.cuboid,
        destination,
        transforms,
    })
}

/// Translation distance for `blocks_to_move`, or `default` when it is 0.
pub(crate) fn travel_distance(blocks_to_move: u32, default: i32) -> Result<i32, GeometryError> {
    match blocks_to_move {
        0 => Ok(default),
        n => i32::try_from(n)
            .map_err(|_| GeometryError::NoValidDestination(format!("cannot move {} blocks", n))),
    }
}

/// `cuboid` moved by `offset`, rejected when it leaves the coordinate range.
pub(crate) fn translated(cuboid: Cuboid, offset: Vec3i) -> Result<Cuboid, GeometryError> {
    cuboid.checked_translate(offset).ok_or_else(|| {
        GeometryError::NoValidDestination(format!("{} moved by {} is out of range", cuboid, offset))
    })
}

/// Cuboid spanned by the transformed corners of `cuboid`.
pub(crate) fn rotated_cuboid(cuboid: Cuboid, pivot: Vec3i, rotation: Rotation) -> Cuboid {
    Cuboid::new(
        rotation.apply_about(pivot, cuboid.min()),
        rotation.apply_about(pivot, cuboid.max()),
    )
}
