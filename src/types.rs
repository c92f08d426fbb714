//! Core types shared across all modules.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

/// Continuous position, used for moving block representations mid-animation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Linear interpolation from `self` to `other`; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

impl From<Vec3i> for Vec3 {
    fn from(v: Vec3i) -> Self {
        Self::new(v.x as f32, v.y as f32, v.z as f32)
    }
}

/// Integer block coordinate.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Vec3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3i {
    pub const ZERO: Vec3i = Vec3i::new(0, 0, 0);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    pub fn scale(self, factor: i32) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Euclidean distance in blocks.
    pub fn distance(self, other: Self) -> f32 {
        let dx = i64::from(other.x) - i64::from(self.x);
        let dy = i64::from(other.y) - i64::from(self.y);
        let dz = i64::from(other.z) - i64::from(self.z);
        ((dx * dx + dy * dy + dz * dz) as f64).sqrt() as f32
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self::new(
            self.x.checked_add(other.x)?,
            self.y.checked_add(other.y)?,
            self.z.checked_add(other.z)?,
        ))
    }
}

impl Add for Vec3i {
    type Output = Vec3i;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3i {
    type Output = Vec3i;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3i {
    type Output = Vec3i;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl std::fmt::Display for Vec3i {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Cuboid
// ---------------------------------------------------------------------------

/// Axis-aligned block region, inclusive on both corners.
///
/// Always normalised: `min <= max` on every axis. Geometry changes produce a
/// new cuboid instead of mutating an existing one.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "CuboidCorners")]
pub struct Cuboid {
    min: Vec3i,
    max: Vec3i,
}

#[derive(Deserialize)]
struct CuboidCorners {
    min: Vec3i,
    max: Vec3i,
}

impl From<CuboidCorners> for Cuboid {
    fn from(c: CuboidCorners) -> Self {
        Cuboid::new(c.min, c.max)
    }
}

impl Cuboid {
    /// Build a cuboid from any two opposite corners.
    pub fn new(a: Vec3i, b: Vec3i) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn min(&self) -> Vec3i {
        self.min
    }

    pub fn max(&self) -> Vec3i {
        self.max
    }

    /// Size in blocks along each axis.
    pub fn dimensions(&self) -> Vec3i {
        self.max - self.min + Vec3i::new(1, 1, 1)
    }

    pub fn volume(&self) -> u64 {
        let d = self.dimensions();
        d.x as u64 * d.y as u64 * d.z as u64
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) as f32 / 2.0,
            (self.min.y + self.max.y) as f32 / 2.0,
            (self.min.z + self.max.z) as f32 / 2.0,
        )
    }

    pub fn contains(&self, p: Vec3i) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// `None` when the moved cuboid leaves the `i32` coordinate range.
    pub fn checked_translate(&self, offset: Vec3i) -> Option<Self> {
        Some(Self {
            min: self.min.checked_add(offset)?,
            max: self.max.checked_add(offset)?,
        })
    }

    /// Every contained coordinate, x fastest, then z, then y (bottom layer first).
    pub fn iter(&self) -> impl Iterator<Item = Vec3i> {
        let (min, max) = (self.min, self.max);
        (min.y..=max.y).flat_map(move |y| {
            (min.z..=max.z).flat_map(move |z| (min.x..=max.x).map(move |x| Vec3i::new(x, y, z)))
        })
    }
}

impl std::fmt::Display for Cuboid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Open direction of a structure, and the direction of a single toggle cycle.
///
/// Compass directions follow block coordinates: north is −z, east is +x.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
    Up,
    Down,
    Clockwise,
    Counterclockwise,
    None,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Clockwise => Direction::Counterclockwise,
            Direction::Counterclockwise => Direction::Clockwise,
            Direction::None => Direction::None,
        }
    }

    /// Unit offset for linear directions, `None` for rotational ones.
    pub fn unit(self) -> Option<Vec3i> {
        match self {
            Direction::North => Some(Vec3i::new(0, 0, -1)),
            Direction::East => Some(Vec3i::new(1, 0, 0)),
            Direction::South => Some(Vec3i::new(0, 0, 1)),
            Direction::West => Some(Vec3i::new(-1, 0, 0)),
            Direction::Up => Some(Vec3i::new(0, 1, 0)),
            Direction::Down => Some(Vec3i::new(0, -1, 0)),
            Direction::Clockwise | Direction::Counterclockwise | Direction::None => None,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(
            self,
            Direction::North | Direction::East | Direction::South | Direction::West
        )
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Clockwise => "clockwise",
            Direction::Counterclockwise => "counterclockwise",
            Direction::None => "none",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureId(pub u64);

impl std::fmt::Display for StructureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoorStats {
    pub in_flight: usize,
    pub completed: u64,
    pub aborted: u64,
    pub total_ticks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoorServiceConfig {
    /// Session name stamped on every outbound event envelope.
    pub session: String,
    /// Animation tick rate in Hz.
    pub tick_rate_hz: f32,
    /// Animation speed in blocks per second before the request multiplier.
    pub base_speed: f32,
    /// Upper bound on the effective speed, whatever the multiplier.
    pub max_speed: f32,
    /// Lowest buildable y coordinate.
    pub world_min_y: i32,
    /// Highest buildable y coordinate.
    pub world_max_y: i32,
    /// Highest owner permission level allowed to toggle (0 = prime owner only).
    pub toggle_permission: u8,
    /// Block kinds that must never be animated.
    pub blacklist: Vec<String>,
    /// Block kinds placed only after their support (torches, rails, signs…).
    pub deferred_blocks: Vec<String>,
}

impl Default for DoorServiceConfig {
    fn default() -> Self {
        Self {
            session: "default".into(),
            tick_rate_hz: 20.0,
            base_speed: 4.0,
            max_speed: 20.0,
            world_min_y: -64,
            world_max_y: 319,
            toggle_permission: 2,
            blacklist: vec!["bedrock".into(), "spawner".into(), "end_portal".into()],
            deferred_blocks: vec![
                "torch".into(),
                "wall_torch".into(),
                "rail".into(),
                "lever".into(),
                "stone_button".into(),
                "ladder".into(),
                "hanging_sign".into(),
                "wall_sign".into(),
                "lantern".into(),
            ],
        }
    }
}
