// world_server_core/server/src/core/types.rs
use nalgebra as na;
use serde::Deserialize;
use std::fmt;

pub type MapId = u32;
pub type InstanceId = u32;
pub type SpawnId = u64;
pub type QuestId = u32;
pub type SpellId = u32;

/// World-space vector used by collision and movement.
pub type Vec3 = na::Vector3<f32>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectGuid(pub u64);

impl ObjectGuid {
    pub const EMPTY: ObjectGuid = ObjectGuid(0);

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ObjectGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid-{:#x}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default)]
    pub orientation: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Position { x, y, z, orientation: 0.0 }
    }

    pub fn with_orientation(x: f32, y: f32, z: f32, orientation: f32) -> Self {
        Position { x, y, z, orientation }
    }

    pub fn to_vec3(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn distance_2d(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance(&self, other: &Position) -> f32 {
        (self.to_vec3() - other.to_vec3()).norm()
    }

    pub fn relocate(&mut self, v: &Vec3) {
        self.x = v.x;
        self.y = v.y;
        self.z = v.z;
    }
}

impl From<Vec3> for Position {
    fn from(v: Vec3) -> Self {
        Position::new(v.x, v.y, v.z)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldLocation {
    pub map_id: MapId,
    pub position: Position,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Default)]
pub enum Difficulty {
    #[default]
    None,
    Normal,
    Heroic,
    Mythic,
    Raid10Normal,
    Raid25Normal,
    Raid10Heroic,
    Raid25Heroic,
}

impl Difficulty {
    /// Next lower difficulty tried when a map does not offer this one.
    pub fn fallback(self) -> Option<Difficulty> {
        match self {
            Difficulty::Heroic => Some(Difficulty::Normal),
            Difficulty::Mythic => Some(Difficulty::Heroic),
            Difficulty::Raid25Heroic => Some(Difficulty::Raid25Normal),
            Difficulty::Raid10Heroic => Some(Difficulty::Raid10Normal),
            Difficulty::Raid25Normal => Some(Difficulty::Raid10Normal),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpawnObjectType {
    Creature,
    GameObject,
    AreaTrigger,
}

/// Outcome of a map entry check. Values are stable; collaborators map them
/// to client messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnterState {
    CanEnter = 0,
    AlreadyInMap = 1,
    NoEntry = 2,
    UninstancedDungeon = 3,
    DifficultyUnavailable = 4,
    NotInRaid = 5,
    CorpseInDifferentInstance = 6,
    InstanceBindMismatch = 7,
    TooManyInstances = 8,
    MaxPlayers = 9,
    ZoneInCombat = 10,
    UnspecifiedReason = 11,
}

impl EnterState {
    pub fn allowed(self) -> bool {
        self == EnterState::CanEnter
    }
}
