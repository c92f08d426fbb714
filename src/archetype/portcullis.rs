//! Portcullis: translates vertically by `blocks_to_move` (default: its own
//! height).

use super::{translated, travel_distance, Archetype, BlockTransform, WorldBounds};
use crate::block::Rotation;
use crate::error::GeometryError;
use crate::structure::Structure;
use crate::types::{Cuboid, Direction, Vec3i};

pub struct Portcullis;

impl Portcullis {
    pub const NAME: &'static str = "portcullis";

    fn offset(structure: &Structure, dir: Direction) -> Result<Vec3i, GeometryError> {
        let distance = travel_distance(structure.blocks_to_move, structure.cuboid.dimensions().y)?;
        Ok(match dir {
            Direction::Down => Vec3i::new(0, -distance, 0),
            _ => Vec3i::new(0, distance, 0),
        })
    }
}

impl Archetype for Portcullis {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn open_directions(&self) -> &'static [Direction] {
        &[Direction::Up, Direction::Down]
    }

    fn potential_new_cuboid(
        &self,
        structure: &Structure,
        dir: Direction,
        bounds: WorldBounds,
    ) -> Result<Cuboid, GeometryError> {
        self.check_direction(dir)?;
        bounds.check(translated(structure.cuboid, Self::offset(structure, dir)?)?)
    }

    fn block_transform(&self, structure: &Structure, dir: Direction, at: Vec3i) -> BlockTransform {
        BlockTransform {
            dest: at + Self::offset(structure, dir).unwrap_or(Vec3i::ZERO),
            rotation: Rotation::IDENTITY,
        }
    }
}
