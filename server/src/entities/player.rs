// world_server_core/server/src/entities/player.rs
use crate::core::types::{Difficulty, InstanceId, MapId, ObjectGuid, Position, QuestId, WorldLocation};
use crate::world::content::AccessRequirement;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const INSTANCE_ENTER_WINDOW_SECS: u64 = 60 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceBind {
    pub instance_id: InstanceId,
    pub difficulty: Difficulty,
    /// Permanent binds survive resets and pin the player to this id.
    pub permanent: bool,
}

pub type GroupRef = Arc<RwLock<Group>>;

#[derive(Debug)]
pub struct Group {
    pub guid: ObjectGuid,
    pub leader: ObjectGuid,
    pub members: Vec<ObjectGuid>,
    pub is_raid: bool,
    pub is_lfg: bool,
    pub dungeon_difficulty: Difficulty,
    pub raid_difficulty: Difficulty,
    binds: HashMap<MapId, InstanceBind>,
}

impl Group {
    pub fn new(guid: ObjectGuid, leader: ObjectGuid) -> Self {
        Group {
            guid,
            leader,
            members: vec![leader],
            is_raid: false,
            is_lfg: false,
            dungeon_difficulty: Difficulty::Normal,
            raid_difficulty: Difficulty::Raid10Normal,
            binds: HashMap::new(),
        }
    }

    pub fn into_ref(self) -> GroupRef {
        Arc::new(RwLock::new(self))
    }

    pub fn bound_instance(&self, map_id: MapId) -> Option<InstanceBind> {
        self.binds.get(&map_id).copied()
    }

    pub fn bind_to_instance(&mut self, map_id: MapId, bind: InstanceBind) {
        self.binds.insert(map_id, bind);
    }

    pub fn unbind_instance(&mut self, map_id: MapId) -> Option<InstanceBind> {
        self.binds.remove(&map_id)
    }
}

#[derive(Debug)]
pub struct Player {
    pub guid: ObjectGuid,
    pub name: String,
    pub level: u8,
    pub is_game_master: bool,
    alive: bool,
    /// Set while loading into the world after login.
    pub is_loading: bool,
    pub position: Position,
    pub current_map: Option<(MapId, InstanceId)>,
    pub corpse: Option<WorldLocation>,
    pub group: Option<GroupRef>,
    pub dungeon_difficulty: Difficulty,
    pub raid_difficulty: Difficulty,
    pub battleground_instance: Option<InstanceId>,
    binds: HashMap<MapId, InstanceBind>,
    instance_enter_times: HashMap<InstanceId, u64>,
    items: HashSet<u32>,
    rewarded_quests: HashSet<QuestId>,
}

impl Player {
    pub fn new(guid: ObjectGuid, name: &str, level: u8) -> Self {
        Player {
            guid,
            name: name.to_string(),
            level,
            is_game_master: false,
            alive: true,
            is_loading: false,
            position: Position::default(),
            current_map: None,
            corpse: None,
            group: None,
            dungeon_difficulty: Difficulty::Normal,
            raid_difficulty: Difficulty::Raid10Normal,
            battleground_instance: None,
            binds: HashMap::new(),
            instance_enter_times: HashMap::new(),
            items: HashSet::new(),
            rewarded_quests: HashSet::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Kills the player, leaving a corpse where they stood.
    pub fn die(&mut self, map_id: MapId) {
        self.alive = false;
        self.corpse = Some(WorldLocation { map_id, position: self.position });
    }

    pub fn resurrect(&mut self) {
        self.alive = true;
        self.corpse = None;
    }

    pub fn is_in_raid_group(&self) -> bool {
        self.group.as_ref().map(|g| g.read().is_raid).unwrap_or(false)
    }

    pub fn is_in_lfg_group(&self) -> bool {
        self.group.as_ref().map(|g| g.read().is_lfg).unwrap_or(false)
    }

    /// Difficulty the player asks for on a map, taken from the group when in one.
    pub fn wanted_difficulty(&self, is_raid: bool) -> Difficulty {
        match (&self.group, is_raid) {
            (Some(g), true) => g.read().raid_difficulty,
            (Some(g), false) => g.read().dungeon_difficulty,
            (None, true) => self.raid_difficulty,
            (None, false) => self.dungeon_difficulty,
        }
    }

    pub fn bound_instance(&self, map_id: MapId) -> Option<InstanceBind> {
        self.binds.get(&map_id).copied()
    }

    pub fn bind_to_instance(&mut self, map_id: MapId, bind: InstanceBind) {
        self.binds.insert(map_id, bind);
    }

    pub fn unbind_instance(&mut self, map_id: MapId) -> Option<InstanceBind> {
        self.binds.remove(&map_id)
    }

    /// Own bind first, then the group's.
    pub fn instance_save(&self, map_id: MapId) -> Option<InstanceBind> {
        self.bound_instance(map_id)
            .or_else(|| self.group.as_ref().and_then(|g| g.read().bound_instance(map_id)))
    }

    pub fn add_instance_enter_time(&mut self, instance_id: InstanceId, now: u64) {
        self.update_instance_enter_times(now);
        self.instance_enter_times.entry(instance_id).or_insert(now);
    }

    /// Drops hourly-limit entries older than one hour.
    pub fn update_instance_enter_times(&mut self, now: u64) {
        self.instance_enter_times
            .retain(|_, entered| now.saturating_sub(*entered) < INSTANCE_ENTER_WINDOW_SECS);
    }

    /// May the player enter `instance_id` without exceeding the hourly limit.
    /// Only entries younger than one hour at `now` count.
    pub fn check_instance_count(&self, instance_id: InstanceId, max_per_hour: u32, now: u64) -> bool {
        let within_window = |entered: &u64| now.saturating_sub(*entered) < INSTANCE_ENTER_WINDOW_SECS;
        let recent = self.instance_enter_times.values().filter(|e| within_window(e)).count() as u32;
        if recent < max_per_hour {
            return true;
        }
        self.instance_enter_times.get(&instance_id).map_or(false, within_window)
    }

    pub fn add_item(&mut self, item: u32) {
        self.items.insert(item);
    }

    pub fn has_item(&self, item: u32) -> bool {
        self.items.contains(&item)
    }

    pub fn reward_quest(&mut self, quest: QuestId) {
        self.rewarded_quests.insert(quest);
    }

    pub fn has_rewarded_quest(&self, quest: QuestId) -> bool {
        self.rewarded_quests.contains(&quest)
    }

    pub fn satisfies(&self, req: &AccessRequirement) -> bool {
        if req.level_min != 0 && self.level < req.level_min {
            return false;
        }
        if req.level_max != 0 && self.level > req.level_max {
            return false;
        }
        if let Some(item) = req.item {
            if !self.has_item(item) {
                return false;
            }
        }
        if let Some(quest) = req.quest_done {
            if !self.has_rewarded_quest(quest) {
                return false;
            }
        }
        true
    }
}
