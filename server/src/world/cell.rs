// world_server_core/server/src/world/cell.rs
use crate::core::types::ObjectGuid;
use crate::entities::world_object::ObjectKind;
use crate::world::grid::CellCoord;
use smallvec::SmallVec;

type GuidList = SmallVec<[ObjectGuid; 8]>;

/// A loaded cell: the guids it holds, by kind, and how long it has been idle.
#[derive(Debug)]
pub struct GridCell {
    coord: CellCoord,
    creatures: GuidList,
    gameobjects: GuidList,
    area_triggers: GuidList,
    corpses: GuidList,
    idle_ms: u32,
    unload_pending: bool,
}

impl GridCell {
    pub fn new(coord: CellCoord) -> Self {
        GridCell {
            coord,
            creatures: SmallVec::new(),
            gameobjects: SmallVec::new(),
            area_triggers: SmallVec::new(),
            corpses: SmallVec::new(),
            idle_ms: 0,
            unload_pending: false,
        }
    }

    pub fn coord(&self) -> CellCoord {
        self.coord
    }

    fn list_mut(&mut self, kind: ObjectKind) -> &mut GuidList {
        match kind {
            ObjectKind::Creature => &mut self.creatures,
            ObjectKind::GameObject => &mut self.gameobjects,
            ObjectKind::AreaTrigger => &mut self.area_triggers,
            ObjectKind::Corpse => &mut self.corpses,
        }
    }

    pub fn guids(&self, kind: ObjectKind) -> &[ObjectGuid] {
        match kind {
            ObjectKind::Creature => &self.creatures,
            ObjectKind::GameObject => &self.gameobjects,
            ObjectKind::AreaTrigger => &self.area_triggers,
            ObjectKind::Corpse => &self.corpses,
        }
    }

    pub fn insert(&mut self, kind: ObjectKind, guid: ObjectGuid) {
        let list = self.list_mut(kind);
        if !list.contains(&guid) {
            list.push(guid);
        }
    }

    pub fn remove(&mut self, kind: ObjectKind, guid: ObjectGuid) -> bool {
        let list = self.list_mut(kind);
        match list.iter().position(|g| *g == guid) {
            Some(i) => {
                list.swap_remove(i);
                true
            }
            None => false,
        }
    }

    pub fn object_count(&self) -> usize {
        self.creatures.len() + self.gameobjects.len() + self.area_triggers.len() + self.corpses.len()
    }

    pub fn idle_ms(&self) -> u32 {
        self.idle_ms
    }

    pub fn add_idle(&mut self, diff: u32) {
        self.idle_ms = self.idle_ms.saturating_add(diff);
    }

    /// Something kept the cell busy this tick.
    pub fn touch(&mut self) {
        self.idle_ms = 0;
        self.unload_pending = false;
    }

    pub fn is_unload_pending(&self) -> bool {
        self.unload_pending
    }

    pub fn set_unload_pending(&mut self) {
        self.unload_pending = true;
    }
}
