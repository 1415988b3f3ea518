// world_server_core/server/src/world/spawn_store.rs
use crate::core::error::ServerResult;
use crate::core::types::{Difficulty, InstanceId, MapId, Position, SpawnId, SpawnObjectType};
use crate::entities::world_object::Corpse;
use crate::world::grid::compute_cell_coord;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

fn default_respawn_secs() -> u32 {
    300
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Default)]
pub enum SpawnMovement {
    #[default]
    Idle,
    Random,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreatureSpawn {
    pub spawn_id: SpawnId,
    pub map_id: MapId,
    pub entry: u32,
    pub position: Position,
    /// Empty means the open-world difficulty only.
    #[serde(default)]
    pub difficulties: Vec<Difficulty>,
    #[serde(default)]
    pub wander_distance: f32,
    #[serde(default)]
    pub movement: SpawnMovement,
    #[serde(default = "default_respawn_secs")]
    pub respawn_secs: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GameObjectSpawn {
    pub spawn_id: SpawnId,
    pub map_id: MapId,
    pub entry: u32,
    pub position: Position,
    #[serde(default)]
    pub difficulties: Vec<Difficulty>,
    #[serde(default = "default_respawn_secs")]
    pub respawn_secs: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AreaTriggerSpawn {
    pub spawn_id: SpawnId,
    pub map_id: MapId,
    pub position: Position,
    pub radius: f32,
}

/// Spawn ids listed for one (map, difficulty, cell).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellSpawns {
    pub creatures: Vec<SpawnId>,
    pub gameobjects: Vec<SpawnId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SpawnFile {
    creatures: Vec<CreatureSpawn>,
    gameobjects: Vec<GameObjectSpawn>,
    area_triggers: Vec<AreaTriggerSpawn>,
}

type CellKey = (MapId, Difficulty, u32);

fn difficulties_or_default(list: &[Difficulty]) -> Vec<Difficulty> {
    if list.is_empty() {
        vec![Difficulty::None]
    } else {
        list.to_vec()
    }
}

fn cell_id(p: &Position) -> u32 {
    compute_cell_coord(p.x, p.y).id()
}

/// Persisted spawn data shared by every map. Read by grid loads on worker
/// threads, written by spawn/despawn/move commands.
#[derive(Default)]
pub struct SpawnStore {
    creatures: DashMap<SpawnId, CreatureSpawn>,
    gameobjects: DashMap<SpawnId, GameObjectSpawn>,
    area_triggers: DashMap<SpawnId, AreaTriggerSpawn>,
    cells: DashMap<CellKey, CellSpawns>,
    area_trigger_cells: DashMap<(MapId, u32), Vec<SpawnId>>,
    respawn_times: DashMap<(MapId, InstanceId), HashMap<(SpawnObjectType, SpawnId), u64>>,
    corpses: DashMap<MapId, Vec<Corpse>>,
}

impl SpawnStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let store = SpawnStore::new();
        if !path.exists() {
            warn!("Spawn file {} not found, world starts empty", path.display());
            return Ok(store);
        }
        let file: SpawnFile = serde_yaml::from_str(&std::fs::read_to_string(path)?)?;
        for c in file.creatures {
            store.add_creature_spawn(c);
        }
        for g in file.gameobjects {
            store.add_gameobject_spawn(g);
        }
        for a in file.area_triggers {
            store.add_area_trigger_spawn(a);
        }
        info!(
            "Loaded spawns from {}: {} creatures, {} gameobjects, {} area triggers",
            path.display(),
            store.creatures.len(),
            store.gameobjects.len(),
            store.area_triggers.len()
        );
        Ok(store)
    }

    pub fn add_creature_spawn(&self, spawn: CreatureSpawn) {
        let cell = cell_id(&spawn.position);
        for d in difficulties_or_default(&spawn.difficulties) {
            self.cells.entry((spawn.map_id, d, cell)).or_default().creatures.push(spawn.spawn_id);
        }
        if let Some(old) = self.creatures.insert(spawn.spawn_id, spawn) {
            warn!("Creature spawn {} replaced", old.spawn_id);
            self.unindex_creature(&old);
        }
    }

    pub fn remove_creature_spawn(&self, spawn_id: SpawnId) -> Option<CreatureSpawn> {
        let (_, spawn) = self.creatures.remove(&spawn_id)?;
        self.unindex_creature(&spawn);
        Some(spawn)
    }

    pub fn move_creature_spawn(&self, spawn_id: SpawnId, position: Position) -> bool {
        match self.remove_creature_spawn(spawn_id) {
            Some(mut spawn) => {
                spawn.position = position;
                self.add_creature_spawn(spawn);
                debug!("Creature spawn {} moved", spawn_id);
                true
            }
            None => false,
        }
    }

    fn unindex_creature(&self, spawn: &CreatureSpawn) {
        let cell = cell_id(&spawn.position);
        for d in difficulties_or_default(&spawn.difficulties) {
            if let Some(mut list) = self.cells.get_mut(&(spawn.map_id, d, cell)) {
                if let Some(pos) = list.creatures.iter().position(|&id| id == spawn.spawn_id) {
                    list.creatures.remove(pos);
                }
            }
        }
    }

    pub fn add_gameobject_spawn(&self, spawn: GameObjectSpawn) {
        let cell = cell_id(&spawn.position);
        for d in difficulties_or_default(&spawn.difficulties) {
            self.cells.entry((spawn.map_id, d, cell)).or_default().gameobjects.push(spawn.spawn_id);
        }
        if let Some(old) = self.gameobjects.insert(spawn.spawn_id, spawn) {
            warn!("GameObject spawn {} replaced", old.spawn_id);
            self.unindex_gameobject(&old);
        }
    }

    pub fn remove_gameobject_spawn(&self, spawn_id: SpawnId) -> Option<GameObjectSpawn> {
        let (_, spawn) = self.gameobjects.remove(&spawn_id)?;
        self.unindex_gameobject(&spawn);
        Some(spawn)
    }

    pub fn move_gameobject_spawn(&self, spawn_id: SpawnId, position: Position) -> bool {
        match self.remove_gameobject_spawn(spawn_id) {
            Some(mut spawn) => {
                spawn.position = position;
                self.add_gameobject_spawn(spawn);
                true
            }
            None => false,
        }
    }

    fn unindex_gameobject(&self, spawn: &GameObjectSpawn) {
        let cell = cell_id(&spawn.position);
        for d in difficulties_or_default(&spawn.difficulties) {
            if let Some(mut list) = self.cells.get_mut(&(spawn.map_id, d, cell)) {
                if let Some(pos) = list.gameobjects.iter().position(|&id| id == spawn.spawn_id) {
                    list.gameobjects.remove(pos);
                }
            }
        }
    }

    pub fn add_area_trigger_spawn(&self, spawn: AreaTriggerSpawn) {
        self.area_trigger_cells
            .entry((spawn.map_id, cell_id(&spawn.position)))
            .or_default()
            .push(spawn.spawn_id);
        self.area_triggers.insert(spawn.spawn_id, spawn);
    }

    pub fn cell_spawns(&self, map_id: MapId, difficulty: Difficulty, cell: u32) -> CellSpawns {
        self.cells.get(&(map_id, difficulty, cell)).map(|c| c.clone()).unwrap_or_default()
    }

    pub fn area_triggers_for_cell(&self, map_id: MapId, cell: u32) -> Vec<SpawnId> {
        self.area_trigger_cells.get(&(map_id, cell)).map(|c| c.clone()).unwrap_or_default()
    }

    pub fn creature(&self, spawn_id: SpawnId) -> Option<CreatureSpawn> {
        self.creatures.get(&spawn_id).map(|c| c.clone())
    }

    pub fn gameobject(&self, spawn_id: SpawnId) -> Option<GameObjectSpawn> {
        self.gameobjects.get(&spawn_id).map(|g| g.clone())
    }

    pub fn area_trigger(&self, spawn_id: SpawnId) -> Option<AreaTriggerSpawn> {
        self.area_triggers.get(&spawn_id).map(|a| a.clone())
    }

    pub fn save_respawn_time(&self, map_id: MapId, instance_id: InstanceId, kind: SpawnObjectType, spawn_id: SpawnId, when: u64) {
        self.respawn_times.entry((map_id, instance_id)).or_default().insert((kind, spawn_id), when);
    }

    pub fn remove_respawn_time(&self, map_id: MapId, instance_id: InstanceId, kind: SpawnObjectType, spawn_id: SpawnId) {
        if let Some(mut times) = self.respawn_times.get_mut(&(map_id, instance_id)) {
            times.remove(&(kind, spawn_id));
        }
    }

    pub fn respawn_times(&self, map_id: MapId, instance_id: InstanceId) -> HashMap<(SpawnObjectType, SpawnId), u64> {
        self.respawn_times.get(&(map_id, instance_id)).map(|t| t.clone()).unwrap_or_default()
    }

    /// Instance ids with persisted state. Seeds the instance id allocator.
    pub fn persisted_instance_ids(&self) -> Vec<InstanceId> {
        let mut ids: Vec<InstanceId> =
            self.respawn_times.iter().map(|e| e.key().1).filter(|&id| id != 0).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Drops every persisted respawn time of an instance, e.g. on reset.
    pub fn clear_respawn_times(&self, map_id: MapId, instance_id: InstanceId) {
        self.respawn_times.remove(&(map_id, instance_id));
    }

    pub fn save_corpse(&self, map_id: MapId, corpse: Corpse) {
        self.corpses.entry(map_id).or_default().push(corpse);
    }

    pub fn remove_corpse(&self, map_id: MapId, owner: crate::core::types::ObjectGuid) {
        if let Some(mut list) = self.corpses.get_mut(&map_id) {
            list.retain(|c| c.owner != owner);
        }
    }

    pub fn corpses(&self, map_id: MapId) -> Vec<Corpse> {
        self.corpses.get(&map_id).map(|c| c.clone()).unwrap_or_default()
    }
}
