//! Drawbridge tipping a quarter turn about a horizontal axis through its
//! engine. The open direction names the side the top of the bridge falls
//! toward.

use super::{rotated_cuboid, Archetype, BlockTransform, WorldBounds};
use crate::block::Rotation;
use crate::error::GeometryError;
use crate::structure::Structure;
use crate::types::{Axis, Cuboid, Direction, Vec3i};

pub struct Drawbridge;

impl Drawbridge {
    pub const NAME: &'static str = "drawbridge";

    fn rotation(dir: Direction) -> Rotation {
        match dir {
            Direction::North => Rotation::quarter(Axis::X, -1),
            Direction::South => Rotation::quarter(Axis::X, 1),
            Direction::East => Rotation::quarter(Axis::Z, -1),
            _ => Rotation::quarter(Axis::Z, 1),
        }
    }
}

impl Archetype for Drawbridge {
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
        let dims = structure.cuboid.dimensions();
        let thin = match Self::rotation(dir).axis {
            Axis::X => dims.z == 1 || dims.y == 1,
            _ => dims.x == 1 || dims.y == 1,
        };
        if !thin {
            return Err(GeometryError::NoValidDestination(format!(
                "a drawbridge tipping {} must be a single block thick",
                dir
            )));
        }
        bounds.check(rotated_cuboid(
            structure.cuboid,
            structure.engine,
            Self::rotation(dir),
        ))
    }

    fn block_transform(&self, structure: &Structure, dir: Direction, at: Vec3i) -> BlockTransform {
        let rotation = Self::rotation(dir);
        BlockTransform {
            dest: rotation.apply_about(structure.engine, at),
            rotation,
        }
    }
}
