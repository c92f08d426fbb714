//! Block states and the quarter-turn rotations applied to them.

use crate::types::{Axis, Vec3i};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Facing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    North,
    East,
    South,
    West,
    Up,
    Down,
}

impl Facing {
    pub fn vector(self) -> Vec3i {
        match self {
            Facing::North => Vec3i::new(0, 0, -1),
            Facing::East => Vec3i::new(1, 0, 0),
            Facing::South => Vec3i::new(0, 0, 1),
            Facing::West => Vec3i::new(-1, 0, 0),
            Facing::Up => Vec3i::new(0, 1, 0),
            Facing::Down => Vec3i::new(0, -1, 0),
        }
    }

    /// Inverse of [`Facing::vector`]; any non-unit vector yields `None`.
    pub fn from_vector(v: Vec3i) -> Option<Self> {
        match (v.x, v.y, v.z) {
            (0, 0, -1) => Some(Facing::North),
            (1, 0, 0) => Some(Facing::East),
            (0, 0, 1) => Some(Facing::South),
            (-1, 0, 0) => Some(Facing::West),
            (0, 1, 0) => Some(Facing::Up),
            (0, -1, 0) => Some(Facing::Down),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Block state
// ---------------------------------------------------------------------------

/// Platform-neutral block identity. Adapters map this onto the game's own
/// block data; the engine only needs a kind name and an optional facing.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockState {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<Facing>,
}

impl BlockState {
    pub const AIR_KIND: &'static str = "air";

    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            facing: None,
        }
    }

    pub fn facing(kind: impl Into<String>, facing: Facing) -> Self {
        Self {
            kind: kind.into(),
            facing: Some(facing),
        }
    }

    pub fn air() -> Self {
        Self::new(Self::AIR_KIND)
    }

    pub fn is_air(&self) -> bool {
        self.kind == Self::AIR_KIND
    }

    /// The same block turned by `rotation`.
    pub fn rotated(&self, rotation: Rotation) -> Self {
        Self {
            kind: self.kind.clone(),
            facing: self
                .facing
                .map(|f| Facing::from_vector(rotation.apply(f.vector())).unwrap_or(f)),
        }
    }
}

impl std::fmt::Display for BlockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.facing {
            Some(facing) => write!(f, "{}[{:?}]", self.kind, facing),
            None => f.write_str(&self.kind),
        }
    }
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Right-handed rotation by a whole number of quarter turns about one axis.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub axis: Axis,
    /// Signed quarter turns, normalised into `0..4`.
    turns: u8,
}

impl Rotation {
    pub const IDENTITY: Rotation = Rotation {
        axis: Axis::Y,
        turns: 0,
    };

    pub fn quarter(axis: Axis, turns: i32) -> Self {
        Self {
            axis,
            turns: turns.rem_euclid(4) as u8,
        }
    }

    pub fn turns(&self) -> u8 {
        self.turns
    }

    pub fn is_identity(&self) -> bool {
        self.turns == 0
    }

    pub fn inverse(&self) -> Self {
        Self::quarter(self.axis, -(self.turns as i32))
    }

    /// Signed angle in degrees, in `(-180, 180]`.
    pub fn degrees(&self) -> f32 {
        match self.turns {
            0 => 0.0,
            1 => 90.0,
            2 => 180.0,
            _ => -90.0,
        }
    }

    /// Integer rotation matrix (row major).
    pub fn matrix(&self) -> [[i32; 3]; 3] {
        let (c, s) = match self.turns {
            0 => (1, 0),
            1 => (0, 1),
            2 => (-1, 0),
            _ => (0, -1),
        };
        match self.axis {
            Axis::X => [[1, 0, 0], [0, c, -s], [0, s, c]],
            Axis::Y => [[c, 0, s], [0, 1, 0], [-s, 0, c]],
            Axis::Z => [[c, -s, 0], [s, c, 0], [0, 0, 1]],
        }
    }

    pub fn apply(&self, v: Vec3i) -> Vec3i {
        let m = self.matrix();
        Vec3i::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }

    /// Rotate `p` about `pivot`.
    pub fn apply_about(&self, pivot: Vec3i, p: Vec3i) -> Vec3i {
        pivot + self.apply(p - pivot)
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Orientation of a moving representation: an angle about one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub axis: Axis,
    pub degrees: f32,
}

impl Orientation {
    pub fn upright() -> Self {
        Self {
            axis: Axis::Y,
            degrees: 0.0,
        }
    }

    /// Partial orientation `t` of the way through `rotation`.
    pub fn partial(rotation: Rotation, t: f32) -> Self {
        Self {
            axis: rotation.axis,
            degrees: rotation.degrees() * t.clamp(0.0, 1.0),
        }
    }
}
