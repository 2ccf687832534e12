//! World model: geometry, entities, terrain and the read-only world provider

pub mod snapshot;
pub mod terrain;

pub use snapshot::WorldSnapshot;
pub use terrain::{RayHit, Terrain};

use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Continuous world position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn distance_squared(&self, other: Vec3) -> f64 {
        (*self - other).length_squared()
    }

    pub fn distance(&self, other: Vec3) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Block containing this point
    pub fn block(&self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Integer block coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn up(&self) -> BlockPos {
        self.offset(Face::Up)
    }

    pub fn down(&self) -> BlockPos {
        self.offset(Face::Down)
    }

    pub fn offset(&self, face: Face) -> BlockPos {
        let (dx, dy, dz) = face.normal();
        BlockPos::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Minimum corner as a point
    pub fn corner(&self) -> Vec3 {
        Vec3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    pub fn center(&self) -> Vec3 {
        self.corner() + Vec3::new(0.5, 0.5, 0.5)
    }

    /// Squared distance from the block's minimum corner to a point
    pub fn corner_distance_squared(&self, point: Vec3) -> f64 {
        self.corner().distance_squared(point)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

/// Block face / cardinal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Face {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Down,
        Face::Up,
        Face::North,
        Face::South,
        Face::West,
        Face::East,
    ];

    pub const HORIZONTAL: [Face; 4] = [Face::North, Face::South, Face::West, Face::East];

    pub const fn normal(&self) -> (i32, i32, i32) {
        match self {
            Face::Down => (0, -1, 0),
            Face::Up => (0, 1, 0),
            Face::North => (0, 0, -1),
            Face::South => (0, 0, 1),
            Face::West => (-1, 0, 0),
            Face::East => (1, 0, 0),
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box of the given footprint standing on `feet`
    pub fn around_feet(feet: Vec3, width: f64, height: f64) -> Self {
        let half = width / 2.0;
        Self {
            min: Vec3::new(feet.x - half, feet.y, feet.z - half),
            max: Vec3::new(feet.x + half, feet.y + height, feet.z + half),
        }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }
}

/// Terrain material classes relevant to blast simulation and placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    #[default]
    Air,
    /// Destroyed by a blast
    Breakable,
    /// Survives a blast, accepts hazard placement
    Resistant,
    /// Never destroyed, accepts hazard placement
    Unbreakable,
}

impl BlockKind {
    pub fn is_air(&self) -> bool {
        matches!(self, BlockKind::Air)
    }

    /// Whether this block stops a ray, given that breakable terrain may be
    /// assumed destroyed
    pub fn blocks_ray(&self, ignore_breakable: bool) -> bool {
        match self {
            BlockKind::Air => false,
            BlockKind::Breakable => !ignore_breakable,
            BlockKind::Resistant | BlockKind::Unbreakable => true,
        }
    }

    /// Hazards may only be placed on top of these
    pub fn supports_hazard(&self) -> bool {
        matches!(self, BlockKind::Resistant | BlockKind::Unbreakable)
    }
}

/// Remote entity identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Monster,
    Neutral,
    Animal,
    /// Detonatable area-damage source
    Hazard,
    Item,
    ExperienceOrb,
    Other,
}

/// Armor state relevant to damage mitigation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArmorState {
    /// Total armor points (0..=20)
    pub points: f32,
    pub toughness: f32,
    /// Enchantment protection factor against blasts (0..=20 effective)
    pub protection: f32,
    /// Remaining durability of the most worn piece, in percent
    pub lowest_durability_pct: Option<f32>,
}

/// Immutable copy of one live entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Feet position
    pub pos: Vec3,
    /// Velocity in blocks per tick
    pub velocity: Vec3,
    pub width: f64,
    pub height: f64,
    pub health: f32,
    pub absorption: f32,
    pub armor: ArmorState,
    /// Damage resistance effect level (0 = none)
    pub resistance: u8,
    pub alive: bool,
    pub age_ticks: u32,
    pub friend: bool,
}

impl EntitySnapshot {
    pub fn new(id: EntityId, kind: EntityKind, pos: Vec3) -> Self {
        let (width, height) = match kind {
            EntityKind::Player => (0.6, 1.8),
            EntityKind::Hazard => (2.0, 2.0),
            EntityKind::Item | EntityKind::ExperienceOrb => (0.25, 0.25),
            _ => (0.9, 1.4),
        };
        Self {
            id,
            kind,
            pos,
            velocity: Vec3::ZERO,
            width,
            height,
            health: 20.0,
            absorption: 0.0,
            armor: ArmorState::default(),
            resistance: 0,
            alive: true,
            age_ticks: 0,
            friend: false,
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        Aabb::around_feet(self.pos, self.width, self.height)
    }

    pub fn total_health(&self) -> f32 {
        self.health + self.absorption
    }

    pub fn damage_profile(&self) -> DamageProfile {
        DamageProfile {
            pos: self.pos,
            velocity: self.velocity,
            width: self.width,
            height: self.height,
            armor: self.armor,
            resistance: self.resistance,
            is_player: self.kind == EntityKind::Player,
        }
    }
}

/// Which hand an interaction uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    Main,
    Off,
}

/// The controlling actor as seen at capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorState {
    pub id: EntityId,
    pub pos: Vec3,
    pub velocity: Vec3,
    pub eye_height: f64,
    pub health: f32,
    pub absorption: f32,
    pub armor: ArmorState,
    pub resistance: u8,
    pub creative: bool,
    /// Hand currently holding a placeable hazard, if any
    pub hazard_hand: Option<Hand>,
}

impl ActorState {
    pub fn new(id: EntityId, pos: Vec3) -> Self {
        Self {
            id,
            pos,
            velocity: Vec3::ZERO,
            eye_height: 1.62,
            health: 20.0,
            absorption: 0.0,
            armor: ArmorState::default(),
            resistance: 0,
            creative: false,
            hazard_hand: Some(Hand::Main),
        }
    }

    pub fn eye_pos(&self) -> Vec3 {
        self.pos + Vec3::new(0.0, self.eye_height, 0.0)
    }

    pub fn total_health(&self) -> f32 {
        self.health + self.absorption
    }

    pub fn damage_profile(&self) -> DamageProfile {
        DamageProfile {
            pos: self.pos,
            velocity: self.velocity,
            width: 0.6,
            height: 1.8,
            armor: self.armor,
            resistance: self.resistance,
            is_player: true,
        }
    }
}

/// The part of an entity the damage simulator reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageProfile {
    pub pos: Vec3,
    pub velocity: Vec3,
    pub width: f64,
    pub height: f64,
    pub armor: ArmorState,
    pub resistance: u8,
    pub is_player: bool,
}

/// Read-only access to the live world, called from the main tick only
pub trait WorldView {
    fn actor(&self) -> ActorState;

    fn entities(&self) -> Vec<EntitySnapshot>;

    /// Cube of block positions within `radius` of `origin` on each axis
    fn blocks_in_radius(&self, origin: BlockPos, radius: i32) -> Vec<BlockPos>;

    fn block_at(&self, pos: BlockPos) -> BlockKind;

    /// Blocks currently being mined by anyone the actor knows about
    fn mining_blocks(&self) -> Vec<BlockPos>;
}
