//! Hinged door swinging a quarter turn about the vertical axis through its
//! engine.

use super::{rotated_cuboid, Archetype, BlockTransform, WorldBounds};
use crate::block::Rotation;
use crate::error::GeometryError;
use crate::structure::Structure;
use crate::types::{Axis, Cuboid, Direction, Vec3i};

pub struct BigDoor;

impl BigDoor {
    pub const NAME: &'static str = "big_door";

    fn rotation(dir: Direction) -> Rotation {
        // Right-handed about +y: a positive quarter turn is counterclockwise
        // seen from above.
        match dir {
            Direction::Counterclockwise => Rotation::quarter(Axis::Y, 1),
            _ => Rotation::quarter(Axis::Y, -1),
        }
    }
}

impl Archetype for BigDoor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn open_directions(&self) -> &'static [Direction] {
        &[Direction::Clockwise, Direction::Counterclockwise]
    }

    fn potential_new_cuboid(
        &self,
        structure: &Structure,
        dir: Direction,
        bounds: WorldBounds,
    ) -> Result<Cuboid, GeometryError> {
        self.check_direction(dir)?;
        let dims = structure.cuboid.dimensions();
        if dims.x != 1 && dims.z != 1 {
            return Err(GeometryError::NoValidDestination(
                "a hinged door must be a single block thick".into(),
            ));
        }
        let pivot = Vec3i::new(structure.engine.x, 0, structure.engine.z);
        bounds.check(rotated_cuboid(structure.cuboid, pivot, Self::rotation(dir)))
    }

    fn block_transform(&self, structure: &Structure, dir: Direction, at: Vec3i) -> BlockTransform {
        let rotation = Self::rotation(dir);
        let pivot = Vec3i::new(structure.engine.x, at.y, structure.engine.z);
        BlockTransform {
            dest: rotation.apply_about(pivot, at),
            rotation,
        }
    }
}
