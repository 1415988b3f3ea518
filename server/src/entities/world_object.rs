// world_server_core/server/src/entities/world_object.rs
use super::creature::Creature;
use crate::core::types::{ObjectGuid, Position, SpawnId, SpawnObjectType};
use crate::world::grid::{compute_cell_coord, CellCoord};

#[derive(Clone, Debug)]
pub struct GameObject {
    pub guid: ObjectGuid,
    pub entry: u32,
    pub spawn_id: Option<SpawnId>,
    pub position: Position,
    pub home: Position,
    pub respawn_delay_secs: u32,
}

#[derive(Clone, Debug)]
pub struct AreaTrigger {
    pub guid: ObjectGuid,
    pub spawn_id: Option<SpawnId>,
    pub position: Position,
    pub radius: f32,
    /// Caster for spell-created triggers. Those die with their grid.
    pub caster: Option<ObjectGuid>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Corpse {
    pub guid: ObjectGuid,
    pub owner: ObjectGuid,
    pub position: Position,
}

/// Closed set of objects a grid cell can hold.
#[derive(Debug)]
pub enum WorldObject {
    Creature(Box<Creature>),
    GameObject(GameObject),
    AreaTrigger(AreaTrigger),
    Corpse(Corpse),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Creature,
    GameObject,
    AreaTrigger,
    Corpse,
}

impl WorldObject {
    pub fn guid(&self) -> ObjectGuid {
        match self {
            WorldObject::Creature(c) => c.guid,
            WorldObject::GameObject(g) => g.guid,
            WorldObject::AreaTrigger(a) => a.guid,
            WorldObject::Corpse(c) => c.guid,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            WorldObject::Creature(_) => ObjectKind::Creature,
            WorldObject::GameObject(_) => ObjectKind::GameObject,
            WorldObject::AreaTrigger(_) => ObjectKind::AreaTrigger,
            WorldObject::Corpse(_) => ObjectKind::Corpse,
        }
    }

    pub fn position(&self) -> &Position {
        match self {
            WorldObject::Creature(c) => c.position(),
            WorldObject::GameObject(g) => &g.position,
            WorldObject::AreaTrigger(a) => &a.position,
            WorldObject::Corpse(c) => &c.position,
        }
    }

    pub fn cell(&self) -> CellCoord {
        let p = self.position();
        compute_cell_coord(p.x, p.y)
    }

    /// Persistent spawn this object came from, if any.
    pub fn spawn_key(&self) -> Option<(SpawnObjectType, SpawnId)> {
        match self {
            WorldObject::Creature(c) => c.spawn_id.map(|id| (SpawnObjectType::Creature, id)),
            WorldObject::GameObject(g) => g.spawn_id.map(|id| (SpawnObjectType::GameObject, id)),
            WorldObject::AreaTrigger(a) => a.spawn_id.map(|id| (SpawnObjectType::AreaTrigger, id)),
            WorldObject::Corpse(_) => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, WorldObject::Creature(c) if c.active)
    }

    pub fn as_creature(&self) -> Option<&Creature> {
        match self {
            WorldObject::Creature(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_creature_mut(&mut self) -> Option<&mut Creature> {
        match self {
            WorldObject::Creature(c) => Some(c),
            _ => None,
        }
    }
}
