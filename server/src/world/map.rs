// world_server_core/server/src/world/map.rs
//! One live map (a base map or an instance of one).
//!
//! Objects live in an id-indexed table. Cells only hold guids. All structural
//! changes requested during `update` go through the mutation queue and are
//! applied in `delayed_update`, after every object has been updated.

use super::cell::GridCell;
use super::content::MapRecord;
use super::context::WorldContext;
use super::grid::{compute_cell_coord, CellCoord};
use super::spawn_store::SpawnMovement;
use crate::collision::static_tree::StaticMapTree;
use crate::collision::TerrainQuery;
use crate::concurrent::mutation_queue::{MapMutation, MutationQueue};
use crate::core::constants::{DEFAULT_HEIGHT_SEARCH, PLAYER_VISIBILITY_CELL_RADIUS};
use crate::core::timer::unix_now;
use crate::core::types::{
    Difficulty, EnterState, InstanceId, MapId, ObjectGuid, Position, SpawnId, SpawnObjectType, SpellId, Vec3,
};
use crate::entities::creature::Creature;
use crate::entities::player::Player;
use crate::entities::world_object::{AreaTrigger, Corpse, GameObject, ObjectKind, WorldObject};
use crate::movement::path::{DirectPathGenerator, PathGenerator};
use crate::movement::random::{MovementContext, RandomMovementGenerator};
use crate::systems::ai::CreatureAction;
use crate::systems::scenario::{Scenario, ScenarioMessage};
use ahash::{AHashMap, AHashSet};
use rand::rngs::StdRng;
use rand::SeedableRng;
use smallvec::SmallVec;
use tracing::{debug, error, info, trace, warn};

/// Outgoing notifications for the message-delivery layer.
#[derive(Clone, Debug, PartialEq)]
pub enum MapEvent {
    SpellCast { caster: ObjectGuid, spell_id: SpellId, target: ObjectGuid },
    ObjectSpawned { guid: ObjectGuid, kind: ObjectKind },
    ObjectRemoved { guid: ObjectGuid },
    Scenario(ScenarioMessage),
}

#[derive(Clone, Copy, Debug)]
struct PlayerPresence {
    position: Position,
    is_game_master: bool,
}

/// State only instances carry.
#[derive(Debug, Default)]
pub struct InstanceData {
    pub encounter_in_progress: bool,
    pub scenario: Option<Scenario>,
    empty_ms: u32,
}

impl InstanceData {
    /// Time spent without any player inside.
    pub fn empty_ms(&self) -> u32 {
        self.empty_ms
    }
}

pub struct Map {
    record: MapRecord,
    instance_id: InstanceId,
    difficulty: Difficulty,
    ctx: WorldContext,
    cells: AHashMap<u32, GridCell>,
    objects: AHashMap<ObjectGuid, WorldObject>,
    object_cells: AHashMap<ObjectGuid, CellCoord>,
    spawned: AHashMap<(SpawnObjectType, SpawnId), ObjectGuid>,
    grid_refs: AHashMap<u32, u32>,
    static_tree: StaticMapTree,
    players: AHashMap<ObjectGuid, PlayerPresence>,
    corpses: AHashMap<u32, Vec<Corpse>>,
    respawn_times: AHashMap<(SpawnObjectType, SpawnId), u64>,
    rng: StdRng,
    paths: Box<dyn PathGenerator>,
    events: Vec<MapEvent>,
    mutations: MutationQueue,
    instance: Option<InstanceData>,
    grid_cleanup_delay: u32,
    child_terrain: Vec<MapId>,
    start_time: u64,
    clock_ms: u64,
}

impl Map {
    pub fn new(ctx: WorldContext, record: MapRecord, instance_id: InstanceId, difficulty: Difficulty) -> Self {
        let map_id = record.id;
        let static_tree = StaticMapTree::new(map_id, ctx.catalog.clone(), ctx.models.clone(), ctx.config.los_ignore_m2);
        let rng = match ctx.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ ((map_id as u64) << 32 | instance_id as u64)),
            None => StdRng::from_entropy(),
        };

        let respawn_times: AHashMap<_, _> = ctx.spawns.respawn_times(map_id, instance_id).into_iter().collect();
        let mut corpses: AHashMap<u32, Vec<Corpse>> = AHashMap::new();
        if !record.instanceable() {
            for corpse in ctx.spawns.corpses(map_id) {
                let cell = compute_cell_coord(corpse.position.x, corpse.position.y);
                corpses.entry(cell.id()).or_default().push(corpse);
            }
        }

        let instance = if record.instanceable() && instance_id != 0 {
            let scenario = ctx.content.scenario_for_map(map_id).cloned().map(Scenario::new);
            Some(InstanceData { scenario, ..InstanceData::default() })
        } else {
            None
        };

        let child_terrain = ctx.content.child_maps(map_id).to_vec();
        if !child_terrain.is_empty() {
            debug!("[Map] {} registered child terrain maps {:?}", map_id, child_terrain);
        }

        Map {
            grid_cleanup_delay: ctx.config.grid_cleanup_delay_ms,
            record,
            instance_id,
            difficulty,
            cells: AHashMap::new(),
            objects: AHashMap::new(),
            object_cells: AHashMap::new(),
            spawned: AHashMap::new(),
            grid_refs: AHashMap::new(),
            static_tree,
            players: AHashMap::new(),
            corpses,
            respawn_times,
            rng,
            paths: Box::new(DirectPathGenerator::default()),
            events: Vec::new(),
            mutations: MutationQueue::new(),
            instance,
            child_terrain,
            start_time: unix_now(),
            clock_ms: 0,
            ctx,
        }
    }

    pub fn id(&self) -> MapId {
        self.record.id
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn record(&self) -> &MapRecord {
        &self.record
    }

    pub fn is_instance(&self) -> bool {
        self.instance.is_some()
    }

    pub fn instance_data(&self) -> Option<&InstanceData> {
        self.instance.as_ref()
    }

    pub fn instance_data_mut(&mut self) -> Option<&mut InstanceData> {
        self.instance.as_mut()
    }

    pub fn child_terrain_maps(&self) -> &[MapId] {
        &self.child_terrain
    }

    pub fn static_tree(&self) -> &StaticMapTree {
        &self.static_tree
    }

    pub fn set_path_generator(&mut self, paths: Box<dyn PathGenerator>) {
        self.paths = paths;
    }

    pub fn set_grid_cleanup_delay(&mut self, delay_ms: u32) {
        self.grid_cleanup_delay = delay_ms;
    }

    /// Seconds since the epoch as seen by this map's simulation.
    pub fn game_time(&self) -> u64 {
        self.start_time + self.clock_ms / 1000
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn non_gm_player_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_game_master).count()
    }

    pub fn has_players(&self) -> bool {
        !self.players.is_empty()
    }

    pub fn has_player(&self, guid: ObjectGuid) -> bool {
        self.players.contains_key(&guid)
    }

    pub fn loaded_cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_cell_loaded(&self, coord: CellCoord) -> bool {
        self.cells.contains_key(&coord.id())
    }

    pub fn cell(&self, coord: CellCoord) -> Option<&GridCell> {
        self.cells.get(&coord.id())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object(&self, guid: ObjectGuid) -> Option<&WorldObject> {
        self.objects.get(&guid)
    }

    pub fn creature(&self, guid: ObjectGuid) -> Option<&Creature> {
        self.objects.get(&guid).and_then(WorldObject::as_creature)
    }

    pub fn creature_mut(&mut self, guid: ObjectGuid) -> Option<&mut Creature> {
        self.objects.get_mut(&guid).and_then(WorldObject::as_creature_mut)
    }

    pub fn creatures(&self) -> impl Iterator<Item = &Creature> {
        self.objects.values().filter_map(WorldObject::as_creature)
    }

    pub fn live_creature_count(&self) -> usize {
        self.creatures().filter(|c| c.is_alive()).count()
    }

    /// Guid of the live object spawned from a persistent spawn.
    pub fn spawned_guid(&self, kind: SpawnObjectType, spawn_id: SpawnId) -> Option<ObjectGuid> {
        self.spawned.get(&(kind, spawn_id)).copied()
    }

    pub fn pending_mutations(&self) -> usize {
        self.mutations.len()
    }

    pub fn drain_events(&mut self) -> Vec<MapEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- respawn times ----

    pub fn respawn_time(&self, kind: SpawnObjectType, spawn_id: SpawnId) -> Option<u64> {
        self.respawn_times.get(&(kind, spawn_id)).copied()
    }

    pub fn save_respawn_time(&mut self, kind: SpawnObjectType, spawn_id: SpawnId, when: u64) {
        self.respawn_times.insert((kind, spawn_id), when);
        self.ctx.spawns.save_respawn_time(self.record.id, self.instance_id, kind, spawn_id, when);
    }

    pub fn remove_respawn_time(&mut self, kind: SpawnObjectType, spawn_id: SpawnId) {
        self.respawn_times.remove(&(kind, spawn_id));
        self.ctx.spawns.remove_respawn_time(self.record.id, self.instance_id, kind, spawn_id);
    }

    /// False while the spawn is cooling down. An elapsed respawn time is
    /// consumed.
    pub fn should_be_spawned_on_grid_load(&mut self, kind: SpawnObjectType, spawn_id: SpawnId) -> bool {
        match self.respawn_times.get(&(kind, spawn_id)) {
            Some(&when) if when > self.game_time() => false,
            Some(_) => {
                self.remove_respawn_time(kind, spawn_id);
                true
            }
            None => true,
        }
    }

    // ---- grid load / unload ----

    /// Loads a cell with its persistent spawns and corpses. Returns false
    /// when it was already loaded.
    pub fn load_cell(&mut self, coord: CellCoord) -> bool {
        let cell_id = coord.id();
        if self.cells.contains_key(&cell_id) {
            return false;
        }

        let grid = coord.grid();
        let refs = self.grid_refs.entry(grid.id()).or_insert(0);
        if *refs == 0 {
            self.static_tree.load_tile(grid);
        }
        *refs += 1;
        self.cells.insert(cell_id, GridCell::new(coord));

        let spawns = self.ctx.spawns.cell_spawns(self.record.id, self.difficulty, cell_id);
        let mut creatures = 0;
        for spawn_id in spawns.creatures {
            if self.spawn_creature(spawn_id) {
                creatures += 1;
            }
        }
        let mut gameobjects = 0;
        for spawn_id in spawns.gameobjects {
            if self.spawn_gameobject(spawn_id) {
                gameobjects += 1;
            }
        }
        for spawn_id in self.ctx.spawns.area_triggers_for_cell(self.record.id, cell_id) {
            self.spawn_area_trigger(spawn_id);
        }
        let corpses = self.corpses.get(&cell_id).cloned().unwrap_or_default();
        for corpse in corpses {
            self.insert_object(WorldObject::Corpse(corpse));
        }

        debug!(
            "[Map] {}/{} cell {:?} loaded: {} creatures, {} gameobjects",
            self.record.id, self.instance_id, coord, creatures, gameobjects
        );
        true
    }

    fn spawn_creature(&mut self, spawn_id: SpawnId) -> bool {
        let key = (SpawnObjectType::Creature, spawn_id);
        if self.spawned.contains_key(&key) || !self.should_be_spawned_on_grid_load(key.0, spawn_id) {
            return false;
        }
        let Some(spawn) = self.ctx.spawns.creature(spawn_id) else {
            warn!("[Map] {} creature spawn {} indexed but missing", self.record.id, spawn_id);
            return false;
        };
        let Some(template) = self.ctx.content.creature_template(spawn.entry) else {
            error!(
                "[Map] {} creature spawn {} has unknown entry {}, skipped",
                self.record.id, spawn_id, spawn.entry
            );
            return false;
        };
        let mut creature = Creature::new(self.ctx.next_guid(), template, spawn.position);
        creature.spawn_id = Some(spawn_id);
        creature.wander_distance = spawn.wander_distance;
        creature.respawn_delay_secs = spawn.respawn_secs;
        if spawn.movement == SpawnMovement::Random {
            creature.motion = Some(RandomMovementGenerator::new(spawn.wander_distance));
        }
        self.insert_object(WorldObject::Creature(Box::new(creature)));
        true
    }

    fn spawn_gameobject(&mut self, spawn_id: SpawnId) -> bool {
        let key = (SpawnObjectType::GameObject, spawn_id);
        if self.spawned.contains_key(&key) || !self.should_be_spawned_on_grid_load(key.0, spawn_id) {
            return false;
        }
        let Some(spawn) = self.ctx.spawns.gameobject(spawn_id) else {
            warn!("[Map] {} gameobject spawn {} indexed but missing", self.record.id, spawn_id);
            return false;
        };
        let object = GameObject {
            guid: self.ctx.next_guid(),
            entry: spawn.entry,
            spawn_id: Some(spawn_id),
            position: spawn.position,
            home: spawn.position,
            respawn_delay_secs: spawn.respawn_secs,
        };
        self.insert_object(WorldObject::GameObject(object));
        true
    }

    fn spawn_area_trigger(&mut self, spawn_id: SpawnId) -> bool {
        if self.spawned.contains_key(&(SpawnObjectType::AreaTrigger, spawn_id)) {
            return false;
        }
        let Some(spawn) = self.ctx.spawns.area_trigger(spawn_id) else {
            return false;
        };
        let trigger = AreaTrigger {
            guid: self.ctx.next_guid(),
            spawn_id: Some(spawn_id),
            position: spawn.position,
            radius: spawn.radius,
            caster: None,
        };
        self.insert_object(WorldObject::AreaTrigger(trigger));
        true
    }

    fn insert_object(&mut self, object: WorldObject) {
        let guid = object.guid();
        let kind = object.kind();
        let coord = object.cell();
        if let Some(key) = object.spawn_key() {
            self.spawned.insert(key, guid);
        }
        if let Some(cell) = self.cells.get_mut(&coord.id()) {
            cell.insert(kind, guid);
        }
        self.object_cells.insert(guid, coord);
        self.objects.insert(guid, object);
        self.events.push(MapEvent::ObjectSpawned { guid, kind });
    }

    fn remove_object(&mut self, guid: ObjectGuid) -> Option<WorldObject> {
        let object = self.objects.remove(&guid)?;
        if let Some(coord) = self.object_cells.remove(&guid) {
            if let Some(cell) = self.cells.get_mut(&coord.id()) {
                cell.remove(object.kind(), guid);
            }
        }
        if let Some(key) = object.spawn_key() {
            if self.spawned.get(&key) == Some(&guid) {
                self.spawned.remove(&key);
            }
        }
        self.events.push(MapEvent::ObjectRemoved { guid });
        Some(object)
    }

    fn move_registration(&mut self, guid: ObjectGuid, to: CellCoord) {
        let Some(kind) = self.objects.get(&guid).map(WorldObject::kind) else {
            return;
        };
        if let Some(from) = self.object_cells.insert(guid, to) {
            if let Some(cell) = self.cells.get_mut(&from.id()) {
                cell.remove(kind, guid);
            }
        }
        if let Some(cell) = self.cells.get_mut(&to.id()) {
            cell.insert(kind, guid);
        }
    }

    /// Only active objects stream cells in. Anything else crossing into an
    /// unloaded cell goes back to its respawn point.
    fn relocate_object(&mut self, guid: ObjectGuid, to: CellCoord) {
        let Some(active) = self.objects.get(&guid).map(WorldObject::is_active) else {
            return;
        };
        if self.object_cells.get(&guid) == Some(&to) {
            return;
        }
        if active || self.is_cell_loaded(to) {
            self.load_cell(to);
            self.move_registration(guid, to);
            return;
        }
        let Some(creature) = self.objects.get_mut(&guid).and_then(WorldObject::as_creature_mut) else {
            return;
        };
        creature.return_home();
        let home = creature.cell();
        trace!("[Map] {} left loaded cells, returned to {:?}", guid, home);
        if self.is_cell_loaded(home) && self.object_cells.get(&guid) != Some(&home) {
            self.move_registration(guid, home);
        }
    }

    /// Unloads a cell in four passes: stop, evacuate, clean, delete.
    /// Corpses leave the object table but stay in the corpse store.
    pub fn unload_cell(&mut self, coord: CellCoord) -> bool {
        let cell_id = coord.id();
        let Some(cell) = self.cells.get(&cell_id) else {
            return false;
        };
        let creatures = cell.guids(ObjectKind::Creature).to_vec();
        let gameobjects = cell.guids(ObjectKind::GameObject).to_vec();
        let cast_triggers: Vec<ObjectGuid> = cell
            .guids(ObjectKind::AreaTrigger)
            .iter()
            .copied()
            .filter(|g| matches!(self.objects.get(g), Some(WorldObject::AreaTrigger(a)) if a.caster.is_some()))
            .collect();

        // stop
        for guid in &creatures {
            if let Some(c) = self.objects.get_mut(guid).and_then(WorldObject::as_creature_mut) {
                c.combat_stop();
            }
        }
        for guid in cast_triggers {
            self.remove_object(guid);
        }

        // evacuate
        for guid in creatures.iter().chain(gameobjects.iter()) {
            self.evacuate(*guid, coord);
        }

        // clean
        let remaining = self.cells.get(&cell_id).map(|c| c.guids(ObjectKind::Creature).to_vec()).unwrap_or_default();
        for guid in &remaining {
            if let Some(c) = self.objects.get_mut(guid).and_then(WorldObject::as_creature_mut) {
                c.scheduler.cancel_all();
                if let Some(mut motion) = c.motion.take() {
                    motion.finalize(c, true);
                }
            }
        }

        // delete
        let Some(cell) = self.cells.remove(&cell_id) else {
            return false;
        };
        let mut deleted = 0;
        for kind in [ObjectKind::Creature, ObjectKind::GameObject, ObjectKind::AreaTrigger, ObjectKind::Corpse] {
            for &guid in cell.guids(kind) {
                if self.remove_object(guid).is_some() && kind != ObjectKind::Corpse {
                    deleted += 1;
                }
            }
        }

        let grid = coord.grid();
        if let Some(refs) = self.grid_refs.get_mut(&grid.id()) {
            *refs = refs.saturating_sub(1);
            if *refs == 0 {
                self.grid_refs.remove(&grid.id());
                self.static_tree.unload_tile(grid);
            }
        }
        debug!(
            "[Map] {}/{} cell {:?} unloaded, {} objects deleted",
            self.record.id, self.instance_id, coord, deleted
        );
        true
    }

    /// Sends an object whose respawn point lies in another loaded cell back
    /// there. Objects with an unloaded home stay and are deleted.
    fn evacuate(&mut self, guid: ObjectGuid, from: CellCoord) {
        let home = match self.objects.get(&guid) {
            Some(WorldObject::Creature(c)) => c.home,
            Some(WorldObject::GameObject(g)) => g.home,
            _ => return,
        };
        let home_cell = compute_cell_coord(home.x, home.y);
        if home_cell == from || !self.cells.contains_key(&home_cell.id()) {
            return;
        }
        match self.objects.get_mut(&guid) {
            Some(WorldObject::Creature(c)) => {
                c.return_home();
                if let Some(mut motion) = c.motion.take() {
                    motion.deactivate(c);
                    c.motion = Some(motion);
                }
            }
            Some(WorldObject::GameObject(g)) => g.position = g.home,
            _ => return,
        }
        trace!("[Map] {} evacuated to home cell {:?}", guid, home_cell);
        self.move_registration(guid, home_cell);
    }

    // ---- update ----

    pub fn update(&mut self, diff: u32) {
        self.clock_ms += diff as u64;

        let mut busy: AHashSet<u32> = AHashSet::new();
        let centers: SmallVec<[CellCoord; 8]> =
            self.players.values().map(|p| compute_cell_coord(p.position.x, p.position.y)).collect();
        for center in centers {
            for coord in center.area(PLAYER_VISIBILITY_CELL_RADIUS) {
                self.load_cell(coord);
                busy.insert(coord.id());
            }
        }
        for (guid, object) in &self.objects {
            if object.is_active() {
                if let Some(coord) = self.object_cells.get(guid) {
                    busy.insert(coord.id());
                }
            }
        }
        for id in &busy {
            if let Some(cell) = self.cells.get_mut(id) {
                cell.touch();
            }
        }

        self.update_creatures(diff);
        self.process_respawns();

        let delay = self.grid_cleanup_delay;
        for (id, cell) in self.cells.iter_mut() {
            if busy.contains(id) {
                continue;
            }
            cell.add_idle(diff);
            if cell.idle_ms() >= delay && !cell.is_unload_pending() {
                cell.set_unload_pending();
                self.mutations.push(MapMutation::UnloadCell(cell.coord()));
            }
        }

        if let Some(instance) = self.instance.as_mut() {
            if self.players.is_empty() {
                instance.empty_ms = instance.empty_ms.saturating_add(diff);
            } else {
                instance.empty_ms = 0;
            }
            if let Some(scenario) = instance.scenario.as_mut() {
                self.events.extend(scenario.drain_messages().into_iter().map(MapEvent::Scenario));
            }
        }
    }

    fn update_creatures(&mut self, diff: u32) {
        let mut guids: Vec<ObjectGuid> = self
            .objects
            .iter()
            .filter(|(_, o)| o.kind() == ObjectKind::Creature)
            .map(|(g, _)| *g)
            .collect();
        guids.sort_unstable();

        for guid in guids {
            let Some(WorldObject::Creature(creature)) = self.objects.get_mut(&guid) else {
                continue;
            };
            for action in creature.scheduler.update(diff) {
                match action {
                    CreatureAction::CastSpell { spell_id, target } => {
                        self.events.push(MapEvent::SpellCast { caster: guid, spell_id, target });
                    }
                }
            }
            if let Some(mut motion) = creature.motion.take() {
                let mut ctx = MovementContext {
                    terrain: &self.static_tree,
                    paths: &mut *self.paths,
                    rng: &mut self.rng,
                };
                motion.update(Some(&mut **creature), diff, &mut ctx);
                creature.motion = Some(motion);
            }
            creature.update_movement(diff);

            let now_in = creature.cell();
            if let Some(&registered) = self.object_cells.get(&guid) {
                if registered != now_in {
                    self.mutations.push(MapMutation::Relocate { guid, from: registered, to: now_in });
                }
            }
        }
    }

    /// Re-spawns due spawns whose cell is loaded. Others wait for their
    /// grid load.
    fn process_respawns(&mut self) {
        let now = self.game_time();
        let due: Vec<(SpawnObjectType, SpawnId)> =
            self.respawn_times.iter().filter(|(_, &when)| when <= now).map(|(k, _)| *k).collect();
        for (kind, spawn_id) in due {
            let position = match kind {
                SpawnObjectType::Creature => self.ctx.spawns.creature(spawn_id).map(|s| s.position),
                SpawnObjectType::GameObject => self.ctx.spawns.gameobject(spawn_id).map(|s| s.position),
                SpawnObjectType::AreaTrigger => self.ctx.spawns.area_trigger(spawn_id).map(|s| s.position),
            };
            let Some(position) = position else {
                self.remove_respawn_time(kind, spawn_id);
                continue;
            };
            if !self.is_cell_loaded(compute_cell_coord(position.x, position.y)) {
                continue;
            }
            self.remove_respawn_time(kind, spawn_id);
            let respawned = match kind {
                SpawnObjectType::Creature => self.spawn_creature(spawn_id),
                SpawnObjectType::GameObject => self.spawn_gameobject(spawn_id),
                SpawnObjectType::AreaTrigger => self.spawn_area_trigger(spawn_id),
            };
            if respawned {
                debug!("[Map] {}/{} respawned {:?} {}", self.record.id, self.instance_id, kind, spawn_id);
            }
        }
    }

    /// Applies queued structural changes. Runs serially after every map's
    /// update.
    pub fn delayed_update(&mut self, _diff: u32) {
        for mutation in self.mutations.drain() {
            match mutation {
                MapMutation::Remove(guid) => {
                    self.remove_object(guid);
                }
                MapMutation::Add(object) => {
                    self.load_cell(object.cell());
                    self.insert_object(object);
                }
                MapMutation::Relocate { guid, to, .. } => {
                    self.relocate_object(guid, to);
                }
                MapMutation::UnloadCell(coord) => {
                    let still_idle = self.cells.get(&coord.id()).map(GridCell::is_unload_pending).unwrap_or(false);
                    if still_idle {
                        self.unload_cell(coord);
                    }
                }
            }
        }
    }

    // ---- object commands ----

    /// Kills a creature, records its respawn time and queues its removal.
    pub fn kill_creature(&mut self, guid: ObjectGuid) -> bool {
        let now = self.game_time();
        let Some(creature) = self.creature_mut(guid) else {
            return false;
        };
        creature.set_dead();
        let respawn = creature.spawn_id.map(|id| (id, now + creature.respawn_delay_secs as u64));
        if let Some((spawn_id, when)) = respawn {
            self.save_respawn_time(SpawnObjectType::Creature, spawn_id, when);
        }
        self.mutations.push(MapMutation::Remove(guid));
        true
    }

    pub fn despawn(&self, guid: ObjectGuid) {
        self.mutations.push(MapMutation::Remove(guid));
    }

    /// Queues a temporary creature. Returns its guid, or `None` for an
    /// unknown entry.
    pub fn summon_creature(&self, entry: u32, position: Position) -> Option<ObjectGuid> {
        let Some(template) = self.ctx.content.creature_template(entry) else {
            warn!("[Map] {} cannot summon unknown creature entry {}", self.record.id, entry);
            return None;
        };
        let creature = Creature::new(self.ctx.next_guid(), template, position);
        let guid = creature.guid;
        self.mutations.push(MapMutation::Add(WorldObject::Creature(Box::new(creature))));
        Some(guid)
    }

    pub fn add_corpse(&mut self, corpse: Corpse) {
        let coord = compute_cell_coord(corpse.position.x, corpse.position.y);
        if !self.record.instanceable() {
            self.ctx.spawns.save_corpse(self.record.id, corpse.clone());
        }
        self.corpses.entry(coord.id()).or_default().push(corpse.clone());
        if self.is_cell_loaded(coord) {
            self.insert_object(WorldObject::Corpse(corpse));
        }
    }

    pub fn remove_corpse(&mut self, owner: ObjectGuid) {
        let mut removed = Vec::new();
        for list in self.corpses.values_mut() {
            list.retain(|c| {
                if c.owner == owner {
                    removed.push(c.guid);
                    false
                } else {
                    true
                }
            });
        }
        for guid in removed {
            self.remove_object(guid);
        }
        self.ctx.spawns.remove_corpse(self.record.id, owner);
    }

    // ---- players ----

    pub fn add_player(&mut self, player: &mut Player) -> bool {
        if self.players.contains_key(&player.guid) {
            return false;
        }
        self.players.insert(
            player.guid,
            PlayerPresence { position: player.position, is_game_master: player.is_game_master },
        );
        player.current_map = Some((self.record.id, self.instance_id));
        let center = compute_cell_coord(player.position.x, player.position.y);
        for coord in center.area(PLAYER_VISIBILITY_CELL_RADIUS) {
            self.load_cell(coord);
        }
        if let Some(instance) = self.instance.as_mut() {
            instance.empty_ms = 0;
            player.add_instance_enter_time(self.instance_id, unix_now());
            if let Some(scenario) = instance.scenario.as_mut() {
                scenario.on_player_enter(player.guid);
            }
        }
        info!(
            "[Map] player {} entered map {} instance {}",
            player.name, self.record.id, self.instance_id
        );
        true
    }

    pub fn remove_player(&mut self, player: &mut Player) -> bool {
        if self.players.remove(&player.guid).is_none() {
            return false;
        }
        if player.current_map == Some((self.record.id, self.instance_id)) {
            player.current_map = None;
        }
        if let Some(scenario) = self.instance.as_mut().and_then(|i| i.scenario.as_mut()) {
            scenario.on_player_exit(player.guid);
        }
        info!("[Map] player {} left map {} instance {}", player.name, self.record.id, self.instance_id);
        true
    }

    pub fn relocate_player(&mut self, player: &mut Player, position: Position) {
        player.position = position;
        if let Some(presence) = self.players.get_mut(&player.guid) {
            presence.position = position;
        }
    }

    /// Map-level entry checks. Base maps admit everyone.
    pub fn cannot_enter(&self, player: &Player) -> EnterState {
        if self.instance.is_none() {
            return EnterState::CanEnter;
        }
        if player.current_map == Some((self.record.id, self.instance_id)) || self.has_player(player.guid) {
            return EnterState::AlreadyInMap;
        }
        if player.is_game_master {
            return EnterState::CanEnter;
        }
        let max_players = self.record.max_players as usize;
        if max_players > 0 && self.non_gm_player_count() >= max_players {
            return EnterState::MaxPlayers;
        }
        let in_combat = self.instance.as_ref().map(|i| i.encounter_in_progress).unwrap_or(false);
        if !player.is_loading && self.record.is_raid() && in_combat {
            return EnterState::ZoneInCombat;
        }
        if let Some(bind) = player.bound_instance(self.record.id) {
            if bind.permanent && bind.instance_id != self.instance_id {
                return EnterState::InstanceBindMismatch;
            }
        }
        EnterState::CanEnter
    }

    /// Instance can be dropped once empty for `delay_ms`.
    pub fn can_unload(&self, delay_ms: u32) -> bool {
        match &self.instance {
            Some(instance) => self.players.is_empty() && instance.empty_ms >= delay_ms,
            None => false,
        }
    }

    // ---- terrain ----

    pub fn is_in_line_of_sight(&self, from: &Position, to: &Position) -> bool {
        TerrainQuery::is_in_line_of_sight(&self.static_tree, from.to_vec3(), to.to_vec3())
    }

    pub fn get_height(&self, x: f32, y: f32, z: f32) -> Option<f32> {
        self.static_tree.get_height(Vec3::new(x, y, z), DEFAULT_HEIGHT_SEARCH)
    }

    /// Runs the full unload for every loaded cell and drops static geometry.
    pub fn unload_all(&mut self) {
        let dropped = self.mutations.drain().len();
        if dropped > 0 {
            debug!("[Map] {}/{} dropped {} pending mutations on unload", self.record.id, self.instance_id, dropped);
        }
        let coords: Vec<CellCoord> = self.cells.values().map(GridCell::coord).collect();
        for coord in coords {
            self.unload_cell(coord);
        }
        self.static_tree.unload_all();
        self.grid_refs.clear();
        info!("[Map] {}/{} unloaded", self.record.id, self.instance_id);
    }
}
