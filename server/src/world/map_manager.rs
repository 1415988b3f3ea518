// world_server_core/server/src/world/map_manager.rs
//! Registry of base maps and their instances, instance id allocation and the
//! world-wide map update.

use super::context::WorldContext;
use super::content::MapRecord;
use super::grid::{compute_grid_coord, is_valid_map_coord};
use super::instance_ids::InstanceIdAllocator;
use super::map::Map;
use crate::concurrent::thread_pools::MapUpdater;
use crate::core::constants::{MIN_GRID_DELAY_MS, MIN_MAP_UPDATE_DELAY_MS};
use crate::core::error::ServerResult;
use crate::core::timer::{unix_now, IntervalTimer};
use crate::core::types::{Difficulty, EnterState, InstanceId, MapId, ObjectGuid};
use crate::entities::player::{Group, InstanceBind, Player};
use crate::operational::monitoring::metrics;
use ahash::AHashSet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub type MapRef = Arc<Mutex<Map>>;

const MAX_PARENT_DEPTH: u32 = 8;

/// Persistent record of an instance: survives the instance map unloading
/// while anyone is still bound to it.
#[derive(Clone, Debug)]
pub struct InstanceSave {
    pub map_id: MapId,
    pub instance_id: InstanceId,
    pub difficulty: Difficulty,
    bound: AHashSet<ObjectGuid>,
}

impl InstanceSave {
    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    pub fn is_bound(&self, guid: ObjectGuid) -> bool {
        self.bound.contains(&guid)
    }
}

#[derive(Default)]
struct Registry {
    maps: HashMap<(MapId, InstanceId), MapRef>,
    instance_ids: InstanceIdAllocator,
    saves: HashMap<InstanceId, InstanceSave>,
}

pub struct MapManager {
    ctx: WorldContext,
    registry: Mutex<Registry>,
    timer: Mutex<IntervalTimer>,
    updater: MapUpdater,
    grid_cleanup_delay: AtomicU32,
    instance_unload_delay: u32,
    shutdown: Arc<AtomicBool>,
}

impl MapManager {
    pub fn new(ctx: WorldContext) -> ServerResult<Self> {
        let updater = MapUpdater::new(&ctx.config.thread_pools)?;
        info!(
            "[MapManager] created, {} update mode, interval {} ms",
            if updater.is_parallel() { "parallel" } else { "serial" },
            ctx.config.map_update_interval_ms
        );
        Ok(MapManager {
            registry: Mutex::new(Registry::default()),
            timer: Mutex::new(IntervalTimer::new(ctx.config.map_update_interval_ms.max(MIN_MAP_UPDATE_DELAY_MS))),
            updater,
            grid_cleanup_delay: AtomicU32::new(ctx.config.grid_cleanup_delay_ms),
            instance_unload_delay: ctx.config.instance_unload_delay_ms,
            shutdown: Arc::new(AtomicBool::new(false)),
            ctx,
        })
    }

    pub fn context(&self) -> &WorldContext {
        &self.ctx
    }

    // ---- lookup / creation ----

    /// Returns the base map, creating it and its parent maps first if needed.
    pub fn create_base_map(&self, map_id: MapId) -> Option<MapRef> {
        let mut reg = self.registry.lock();
        self.create_base_map_locked(&mut reg, map_id, 0)
    }

    fn create_base_map_locked(&self, reg: &mut Registry, map_id: MapId, depth: u32) -> Option<MapRef> {
        if let Some(map) = reg.maps.get(&(map_id, 0)) {
            return Some(map.clone());
        }
        let Some(record) = self.ctx.content.map(map_id).cloned() else {
            warn!("[MapManager] no map record for {}", map_id);
            return None;
        };
        if depth >= MAX_PARENT_DEPTH {
            error!("[MapManager] parent chain of map {} too deep, cycle in content?", map_id);
            return None;
        }
        for parent in [record.parent_map_id, record.cosmetic_parent_map_id].into_iter().flatten() {
            if parent != map_id {
                self.create_base_map_locked(reg, parent, depth + 1);
            }
        }

        let mut map = Map::new(self.ctx.clone(), record, 0, Difficulty::None);
        map.set_grid_cleanup_delay(self.grid_cleanup_delay.load(Ordering::Relaxed));
        let map = Arc::new(Mutex::new(map));
        reg.maps.insert((map_id, 0), map.clone());
        info!("[MapManager] base map {} created", map_id);
        Some(map)
    }

    fn create_instance_locked(
        &self,
        reg: &mut Registry,
        record: MapRecord,
        instance_id: InstanceId,
        difficulty: Difficulty,
    ) -> MapRef {
        let map_id = record.id;
        if let Some(map) = reg.maps.get(&(map_id, instance_id)) {
            return map.clone();
        }
        reg.instance_ids.register(instance_id);
        reg.saves.entry(instance_id).or_insert_with(|| InstanceSave {
            map_id,
            instance_id,
            difficulty,
            bound: AHashSet::new(),
        });
        let mut map = Map::new(self.ctx.clone(), record, instance_id, difficulty);
        map.set_grid_cleanup_delay(self.grid_cleanup_delay.load(Ordering::Relaxed));
        let map = Arc::new(Mutex::new(map));
        reg.maps.insert((map_id, instance_id), map.clone());
        metrics::record_instance_created();
        info!("[MapManager] instance {} of map {} created ({:?})", instance_id, map_id, difficulty);
        map
    }

    /// Resolves the map `player` should be placed in: the base map for open
    /// world maps, otherwise the battleground, bound, rejoined or a new
    /// instance.
    pub fn create_map(&self, map_id: MapId, player: &mut Player, login_instance_id: InstanceId) -> Option<MapRef> {
        let record = self.ctx.content.map(map_id)?.clone();
        let mut reg = self.registry.lock();
        let base = self.create_base_map_locked(&mut reg, map_id, 0)?;
        if !record.instanceable() {
            return Some(base);
        }

        if record.is_battleground_or_arena() {
            let Some(instance_id) = player.battleground_instance else {
                warn!("[MapManager] player {} has no battleground instance for map {}", player.name, map_id);
                return None;
            };
            let difficulty = record.default_difficulty();
            return Some(self.create_instance_locked(&mut reg, record, instance_id, difficulty));
        }

        let own_bind = player.bound_instance(map_id);
        let group_bind = player.group.as_ref().and_then(|g| g.read().bound_instance(map_id));
        let (instance_id, difficulty) = match own_bind.or(group_bind) {
            Some(bind) => (bind.instance_id, bind.difficulty),
            None => {
                if login_instance_id != 0 {
                    if let Some(map) = reg.maps.get(&(map_id, login_instance_id)) {
                        debug!("[MapManager] player {} rejoins instance {}", player.name, login_instance_id);
                        return Some(map.clone());
                    }
                }
                let instance_id = match reg.instance_ids.generate() {
                    Ok(id) => id,
                    Err(e) => {
                        error!("[MapManager] {}, requesting shutdown", e);
                        self.shutdown.store(true, Ordering::SeqCst);
                        return None;
                    }
                };
                let wanted = player.wanted_difficulty(record.is_raid());
                let difficulty = record.downscaled_difficulty(wanted).unwrap_or_else(|| record.default_difficulty());
                (instance_id, difficulty)
            }
        };

        let map = self.create_instance_locked(&mut reg, record, instance_id, difficulty);
        if own_bind.is_none() && group_bind.is_none() {
            let bind = InstanceBind { instance_id, difficulty, permanent: false };
            let save = reg.saves.get_mut(&instance_id);
            match &player.group {
                Some(group) => {
                    let mut group = group.write();
                    group.bind_to_instance(map_id, bind);
                    if let Some(save) = save {
                        save.bound.insert(group.guid);
                    }
                }
                None => {
                    player.bind_to_instance(map_id, bind);
                    if let Some(save) = save {
                        save.bound.insert(player.guid);
                    }
                }
            }
        }
        Some(map)
    }

    pub fn find_map(&self, map_id: MapId, instance_id: InstanceId) -> Option<MapRef> {
        self.registry.lock().maps.get(&(map_id, instance_id)).cloned()
    }

    pub fn find_base_map(&self, map_id: MapId) -> Option<MapRef> {
        self.find_map(map_id, 0)
    }

    /// Base map of an open world map. Instanceable maps have none.
    pub fn find_base_non_instance_map(&self, map_id: MapId) -> Option<MapRef> {
        let record = self.ctx.content.map(map_id)?;
        if record.instanceable() {
            return None;
        }
        self.find_base_map(map_id)
    }

    pub fn instance_save(&self, instance_id: InstanceId) -> Option<InstanceSave> {
        self.registry.lock().saves.get(&instance_id).cloned()
    }

    // ---- binds ----

    pub fn unbind_player(&self, player: &mut Player, map_id: MapId) {
        let Some(bind) = player.unbind_instance(map_id) else {
            return;
        };
        self.release_bind(bind.instance_id, player.guid);
    }

    pub fn unbind_group(&self, group: &mut Group, map_id: MapId) {
        let Some(bind) = group.unbind_instance(map_id) else {
            return;
        };
        self.release_bind(bind.instance_id, group.guid);
    }

    fn release_bind(&self, instance_id: InstanceId, guid: ObjectGuid) {
        let mut reg = self.registry.lock();
        let Some(save) = reg.saves.get_mut(&instance_id) else {
            return;
        };
        save.bound.remove(&guid);
        let map_id = save.map_id;
        if save.bound.is_empty() && !reg.maps.contains_key(&(map_id, instance_id)) {
            reg.saves.remove(&instance_id);
            reg.instance_ids.free(instance_id);
            debug!("[MapManager] instance {} released", instance_id);
        }
    }

    // ---- entry checks ----

    /// Fixed-order entry checks for `player` teleporting to `map_id`.
    pub fn player_cannot_enter(&self, map_id: MapId, player: &Player, login_check: bool) -> EnterState {
        let content = &self.ctx.content;
        let Some(record) = content.map(map_id) else {
            return EnterState::NoEntry;
        };
        if !record.is_dungeon() {
            return EnterState::CanEnter;
        }
        if content.instance_template(map_id).is_none() {
            return EnterState::UninstancedDungeon;
        }

        let wanted = player.wanted_difficulty(record.is_raid());
        let Some(difficulty) = record.downscaled_difficulty(wanted) else {
            return EnterState::DifficultyUnavailable;
        };

        if player.is_game_master {
            return EnterState::CanEnter;
        }

        if let Some(req) = content.access_requirement(map_id, difficulty) {
            if !player.satisfies(req) {
                return EnterState::UnspecifiedReason;
            }
        }

        let config = &self.ctx.config;
        if record.is_raid()
            && record.expansion >= config.expansion
            && !player.is_in_raid_group()
            && !config.instance_ignore_raid
        {
            return EnterState::NotInRaid;
        }

        if !player.is_alive() {
            if let Some(corpse) = player.corpse {
                if corpse.map_id != map_id && !self.corpse_reachable(corpse.map_id, map_id) {
                    return EnterState::CorpseInDifferentInstance;
                }
            }
        }

        if !login_check {
            let group_bind = player.group.as_ref().and_then(|g| g.read().bound_instance(map_id));
            if let Some(bind) = group_bind {
                if let Some(bound_map) = self.find_map(map_id, bind.instance_id) {
                    let state = bound_map.lock().cannot_enter(player);
                    if !state.allowed() {
                        return state;
                    }
                }
            }
        }

        if !player.is_in_lfg_group() {
            let save_id = player.instance_save(map_id).map(|b| b.instance_id).unwrap_or(0);
            if !player.check_instance_count(save_id, config.max_instances_per_hour, unix_now()) && player.is_alive() {
                return EnterState::TooManyInstances;
            }
        }

        EnterState::CanEnter
    }

    /// Walks instance parents from the corpse map looking for `map_id`.
    fn corpse_reachable(&self, corpse_map: MapId, map_id: MapId) -> bool {
        let mut current = corpse_map;
        for _ in 0..MAX_PARENT_DEPTH {
            current = self.ctx.content.instance_template(current).map(|t| t.parent).unwrap_or(0);
            if current == 0 {
                return false;
            }
            if current == map_id {
                return true;
            }
        }
        false
    }

    // ---- update ----

    /// Accumulates `diff`; once the update interval elapsed, updates every map
    /// in parallel, then runs the serial delayed pass.
    pub fn update(&self, diff: u32) {
        let mut timer = self.timer.lock();
        timer.update(diff);
        if !timer.passed() {
            return;
        }
        let elapsed = timer.current();
        let started = Instant::now();

        let maps: Vec<MapRef> = self.registry.lock().maps.values().cloned().collect();
        self.updater.update_all(&maps, elapsed);
        for map in &maps {
            map.lock().delayed_update(elapsed);
        }
        self.unload_expired_instances();

        timer.set_current(0);
        metrics::record_map_update(started.elapsed().as_secs_f64());
        let cells: usize = maps.iter().map(|m| m.lock().loaded_cell_count()).sum();
        metrics::record_world_counts(maps.len(), self.num_instances(), cells);
    }

    fn unload_expired_instances(&self) {
        let mut reg = self.registry.lock();
        let delay = self.instance_unload_delay;
        let expired: Vec<(MapId, InstanceId)> = reg
            .maps
            .iter()
            .filter(|((_, instance_id), map)| *instance_id != 0 && map.lock().can_unload(delay))
            .map(|(key, _)| *key)
            .collect();
        for key in expired {
            if let Some(map) = reg.maps.remove(&key) {
                map.lock().unload_all();
            }
            let (map_id, instance_id) = key;
            let unbound = reg.saves.get(&instance_id).map(|s| s.bound.is_empty()).unwrap_or(true);
            if unbound {
                reg.saves.remove(&instance_id);
                reg.instance_ids.free(instance_id);
            }
            info!("[MapManager] instance {} of map {} unloaded", instance_id, map_id);
        }
    }

    // ---- queries ----

    pub fn map_count(&self) -> usize {
        self.registry.lock().maps.len()
    }

    pub fn num_instances(&self) -> usize {
        self.registry.lock().maps.keys().filter(|(_, instance_id)| *instance_id != 0).count()
    }

    pub fn num_players_in_instances(&self) -> usize {
        let maps: Vec<MapRef> = self
            .registry
            .lock()
            .maps
            .iter()
            .filter(|((_, instance_id), _)| *instance_id != 0)
            .map(|(_, m)| m.clone())
            .collect();
        maps.iter().map(|m| m.lock().player_count()).sum()
    }

    pub fn do_for_all_maps(&self, mut f: impl FnMut(&mut Map)) {
        let maps: Vec<MapRef> = self.registry.lock().maps.values().cloned().collect();
        for map in maps {
            f(&mut *map.lock());
        }
    }

    pub fn do_for_all_maps_with_map_id(&self, map_id: MapId, mut f: impl FnMut(&mut Map)) {
        let maps: Vec<MapRef> = self
            .registry
            .lock()
            .maps
            .iter()
            .filter(|((id, _), _)| *id == map_id)
            .map(|(_, m)| m.clone())
            .collect();
        for map in maps {
            f(&mut *map.lock());
        }
    }

    /// At startup any record counts. Later, dungeons also need an instance
    /// template.
    pub fn is_valid_map(&self, map_id: MapId, startup: bool) -> bool {
        let Some(record) = self.ctx.content.map(map_id) else {
            return false;
        };
        startup || !record.is_dungeon() || self.ctx.content.instance_template(map_id).is_some()
    }

    /// Map exists and, when the catalog carries geometry for it, the tile
    /// under (x, y) is present.
    pub fn exist_map_and_vmap(&self, map_id: MapId, x: f32, y: f32) -> bool {
        if !is_valid_map_coord(x, y) || self.ctx.content.map(map_id).is_none() {
            return false;
        }
        if !self.ctx.catalog.has_map(map_id) {
            return true;
        }
        let (tile_x, tile_y) = compute_grid_coord(x, y).tile();
        self.ctx.catalog.has_tile(map_id, tile_x, tile_y)
    }

    // ---- settings ----

    pub fn set_grid_cleanup_delay(&self, delay_ms: u32) {
        let delay_ms = delay_ms.max(MIN_GRID_DELAY_MS);
        self.grid_cleanup_delay.store(delay_ms, Ordering::Relaxed);
        self.do_for_all_maps(|map| map.set_grid_cleanup_delay(delay_ms));
    }

    pub fn grid_cleanup_delay(&self) -> u32 {
        self.grid_cleanup_delay.load(Ordering::Relaxed)
    }

    pub fn set_map_update_interval(&self, interval_ms: u32) {
        let interval_ms = interval_ms.max(MIN_MAP_UPDATE_DELAY_MS);
        let mut timer = self.timer.lock();
        timer.set_interval(interval_ms);
        timer.set_current(0);
    }

    pub fn map_update_interval(&self) -> u32 {
        self.timer.lock().interval()
    }

    // ---- instance ids ----

    /// Seeds the allocator from ids recorded in the instance registry.
    pub fn init_instance_ids(&self, existing: &[InstanceId]) {
        let max = existing.iter().copied().max().unwrap_or(0);
        let mut allocator = InstanceIdAllocator::new(max);
        for &id in existing {
            allocator.register(id);
        }
        info!("[MapManager] instance ids initialized, {} in use, next {}", existing.len(), allocator.next_id());
        self.registry.lock().instance_ids = allocator;
    }

    pub fn register_instance_id(&self, id: InstanceId) {
        self.registry.lock().instance_ids.register(id);
    }

    /// Lowest unused id. On overflow the shutdown flag is raised.
    pub fn generate_instance_id(&self) -> ServerResult<InstanceId> {
        let result = self.registry.lock().instance_ids.generate();
        if result.is_err() {
            self.shutdown.store(true, Ordering::SeqCst);
        }
        result
    }

    pub fn free_instance_id(&self, id: InstanceId) {
        self.registry.lock().instance_ids.free(id);
    }

    pub fn next_instance_id(&self) -> InstanceId {
        self.registry.lock().instance_ids.next_id()
    }

    pub fn set_next_instance_id(&self, id: InstanceId) {
        self.registry.lock().instance_ids.set_next_id(id);
    }

    // ---- lifecycle ----

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn unload_all(&self) {
        let maps: Vec<MapRef> = {
            let mut reg = self.registry.lock();
            reg.maps.drain().map(|(_, m)| m).collect()
        };
        for map in &maps {
            map.lock().unload_all();
        }
        info!("[MapManager] {} maps unloaded", maps.len());
    }
}
