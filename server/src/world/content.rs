// world_server_core/server/src/world/content.rs
//! Static content tables consumed by maps: map records, instance templates,
//! access requirements, creature templates and scenario definitions.

use crate::core::error::{ServerError, ServerResult};
use crate::core::types::{Difficulty, MapId, QuestId, SpellId};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum MapType {
    Common,
    Instance,
    Raid,
    Battleground,
    Arena,
    Scenario,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MapRecord {
    pub id: MapId,
    pub name: String,
    pub map_type: MapType,
    #[serde(default)]
    pub parent_map_id: Option<MapId>,
    #[serde(default)]
    pub cosmetic_parent_map_id: Option<MapId>,
    #[serde(default)]
    pub expansion: u8,
    #[serde(default)]
    pub max_players: u32,
    /// Difficulties this map offers. Empty means `Difficulty::None` only.
    #[serde(default)]
    pub difficulties: Vec<Difficulty>,
}

impl MapRecord {
    pub fn new(id: MapId, name: &str, map_type: MapType) -> Self {
        MapRecord {
            id,
            name: name.to_string(),
            map_type,
            parent_map_id: None,
            cosmetic_parent_map_id: None,
            expansion: 0,
            max_players: 0,
            difficulties: Vec::new(),
        }
    }

    pub fn is_dungeon(&self) -> bool {
        matches!(self.map_type, MapType::Instance | MapType::Raid | MapType::Scenario)
    }

    pub fn is_raid(&self) -> bool {
        self.map_type == MapType::Raid
    }

    pub fn is_battleground_or_arena(&self) -> bool {
        matches!(self.map_type, MapType::Battleground | MapType::Arena)
    }

    pub fn instanceable(&self) -> bool {
        self.is_dungeon() || self.is_battleground_or_arena()
    }

    pub fn has_difficulty(&self, difficulty: Difficulty) -> bool {
        if self.difficulties.is_empty() {
            difficulty == Difficulty::None
        } else {
            self.difficulties.contains(&difficulty)
        }
    }

    pub fn default_difficulty(&self) -> Difficulty {
        self.difficulties.first().copied().unwrap_or(Difficulty::None)
    }

    /// Walks the fallback chain until a difficulty this map offers.
    pub fn downscaled_difficulty(&self, wanted: Difficulty) -> Option<Difficulty> {
        let mut current = Some(wanted);
        while let Some(d) = current {
            if self.has_difficulty(d) {
                return Some(d);
            }
            current = d.fallback();
        }
        None
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct InstanceTemplate {
    pub map_id: MapId,
    /// Map whose graveyards serve this instance. Zero means none.
    #[serde(default)]
    pub parent: MapId,
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AccessRequirement {
    pub map_id: MapId,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub level_min: u8,
    #[serde(default)]
    pub level_max: u8,
    #[serde(default)]
    pub item: Option<u32>,
    #[serde(default)]
    pub quest_done: Option<QuestId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Default)]
pub enum RandomMovementType {
    #[default]
    Walk,
    CanRun,
    AlwaysRun,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Default)]
pub enum CreatureAiKind {
    #[default]
    Null,
    /// Casts `spell_id` on itself every `interval_ms`.
    PeriodicTrigger { spell_id: SpellId, interval_ms: u32 },
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreatureTemplate {
    pub entry: u32,
    pub name: String,
    #[serde(default = "default_walk_speed")]
    pub speed_walk: f32,
    #[serde(default = "default_run_speed")]
    pub speed_run: f32,
    #[serde(default)]
    pub movement_type: RandomMovementType,
    #[serde(default)]
    pub ai: CreatureAiKind,
    #[serde(default)]
    pub can_move_while_casting: bool,
    /// Always kept active: the creature's cell never idles out.
    #[serde(default)]
    pub active: bool,
}

fn default_walk_speed() -> f32 {
    crate::core::constants::DEFAULT_WALK_SPEED
}

fn default_run_speed() -> f32 {
    crate::core::constants::DEFAULT_RUN_SPEED
}

impl CreatureTemplate {
    pub fn new(entry: u32, name: &str) -> Self {
        CreatureTemplate {
            entry,
            name: name.to_string(),
            speed_walk: default_walk_speed(),
            speed_run: default_run_speed(),
            movement_type: RandomMovementType::Walk,
            ai: CreatureAiKind::Null,
            can_move_while_casting: false,
            active: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScenarioStepTemplate {
    pub id: u32,
    pub order_index: u32,
    pub criteria_tree_id: u32,
    #[serde(default)]
    pub bonus_objective: bool,
    #[serde(default)]
    pub reward_quest: Option<QuestId>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScenarioTemplate {
    pub id: u32,
    pub map_id: MapId,
    pub steps: Vec<ScenarioStepTemplate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentFile {
    maps: Vec<MapRecord>,
    instance_templates: Vec<InstanceTemplate>,
    access_requirements: Vec<AccessRequirement>,
    creature_templates: Vec<CreatureTemplate>,
    scenarios: Vec<ScenarioTemplate>,
}

#[derive(Debug, Default)]
pub struct ContentStore {
    maps: HashMap<MapId, MapRecord>,
    child_maps: HashMap<MapId, Vec<MapId>>,
    instance_templates: HashMap<MapId, InstanceTemplate>,
    access_requirements: HashMap<(MapId, Difficulty), AccessRequirement>,
    creature_templates: HashMap<u32, CreatureTemplate>,
    scenarios: HashMap<MapId, ScenarioTemplate>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let store = Self::from_yaml(&text)?;
        info!(
            "Loaded content from {}: {} maps, {} creature templates",
            path.display(),
            store.maps.len(),
            store.creature_templates.len()
        );
        Ok(store)
    }

    pub fn from_yaml(text: &str) -> ServerResult<Self> {
        let file: ContentFile = serde_yaml::from_str(text)?;
        let mut store = ContentStore::new();
        for map in file.maps {
            store.add_map(map);
        }
        for t in file.instance_templates {
            store.add_instance_template(t);
        }
        for a in file.access_requirements {
            store.add_access_requirement(a);
        }
        for c in file.creature_templates {
            store.add_creature_template(c);
        }
        for s in file.scenarios {
            store.add_scenario(s);
        }
        store.validate()?;
        Ok(store)
    }

    /// Rejects parent links to unknown maps.
    pub fn validate(&self) -> ServerResult<()> {
        for map in self.maps.values() {
            for parent in [map.parent_map_id, map.cosmetic_parent_map_id].into_iter().flatten() {
                if parent == map.id || !self.maps.contains_key(&parent) {
                    return Err(ServerError::ContentError(format!(
                        "map {} references invalid parent map {}",
                        map.id, parent
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn add_map(&mut self, map: MapRecord) {
        for parent in [map.parent_map_id, map.cosmetic_parent_map_id].into_iter().flatten() {
            let children = self.child_maps.entry(parent).or_default();
            if !children.contains(&map.id) {
                children.push(map.id);
            }
        }
        if self.maps.insert(map.id, map).is_some() {
            warn!("Duplicate map record replaced");
        }
    }

    pub fn add_instance_template(&mut self, t: InstanceTemplate) {
        self.instance_templates.insert(t.map_id, t);
    }

    pub fn add_access_requirement(&mut self, a: AccessRequirement) {
        self.access_requirements.insert((a.map_id, a.difficulty), a);
    }

    pub fn add_creature_template(&mut self, c: CreatureTemplate) {
        self.creature_templates.insert(c.entry, c);
    }

    pub fn add_scenario(&mut self, s: ScenarioTemplate) {
        self.scenarios.insert(s.map_id, s);
    }

    pub fn map(&self, id: MapId) -> Option<&MapRecord> {
        self.maps.get(&id)
    }

    pub fn maps(&self) -> impl Iterator<Item = &MapRecord> {
        self.maps.values()
    }

    /// Maps that declared `id` as parent or cosmetic parent.
    pub fn child_maps(&self, id: MapId) -> &[MapId] {
        self.child_maps.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn instance_template(&self, map_id: MapId) -> Option<&InstanceTemplate> {
        self.instance_templates.get(&map_id)
    }

    pub fn access_requirement(&self, map_id: MapId, difficulty: Difficulty) -> Option<&AccessRequirement> {
        self.access_requirements.get(&(map_id, difficulty))
    }

    pub fn creature_template(&self, entry: u32) -> Option<&CreatureTemplate> {
        self.creature_templates.get(&entry)
    }

    pub fn scenario_for_map(&self, map_id: MapId) -> Option<&ScenarioTemplate> {
        self.scenarios.get(&map_id)
    }
}
