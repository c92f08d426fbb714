//! Sliding door: translates horizontally by `blocks_to_move`.

use super::{translated, travel_distance, Archetype, BlockTransform, WorldBounds};
use crate::block::Rotation;
use crate::error::GeometryError;
use crate::structure::Structure;
use crate::types::{Cuboid, Direction, Vec3i};

pub struct SlidingDoor;

impl SlidingDoor {
    pub const NAME: &'static str = "sliding_door";

    /// Signed offset for one toggle in `dir`.
    pub fn offset(structure: &Structure, dir: Direction) -> Result<Vec3i, GeometryError> {
        let unit = dir.unit().ok_or_else(|| {
            GeometryError::NoValidDestination(format!("cannot slide {}", dir))
        })?;
        let dims = structure.cuboid.dimensions();
        let default = match dir {
            Direction::East | Direction::West => dims.x,
            _ => dims.z,
        };
        let distance = travel_distance(structure.blocks_to_move, default)?;
        Ok(unit.scale(distance))
    }
}

impl Archetype for SlidingDoor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn open_directions(&self) -> &'static [Direction] {
        &[
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    fn potential_new_cuboid(
        &self,
        structure: &Structure,
        dir: Direction,
        bounds: WorldBounds,
    ) -> Result<Cuboid, GeometryError> {
        self.check_direction(dir)?;
        let offset = Self::offset(structure, dir)?;
        bounds.check(translated(structure.cuboid, offset)?)
    }

    fn block_transform(&self, structure: &Structure, dir: Direction, at: Vec3i) -> BlockTransform {
        let offset = Self::offset(structure, dir).unwrap_or(Vec3i::ZERO);
        BlockTransform {
            dest: at + offset,
            rotation: Rotation::IDENTITY,
        }
    }
}
