// world_server_core/server/tests/integration/grid_loading.rs

use world_server_core::core::config::ServerConfig;
use world_server_core::core::types::{Difficulty, Position, SpawnObjectType};
use world_server_core::world::content::{ContentStore, CreatureTemplate, MapRecord, MapType};
use world_server_core::world::context::WorldContext;
use world_server_core::world::grid::{compute_cell_coord, CellCoord};
use world_server_core::world::map::Map;
use world_server_core::world::spawn_store::{CreatureSpawn, GameObjectSpawn, SpawnMovement, SpawnStore};

fn world_with(spawns: SpawnStore) -> Map {
    let mut content = ContentStore::new();
    content.add_map(MapRecord::new(0, "Eastern Kingdoms", MapType::Common));
    content.add_creature_template(CreatureTemplate::new(299, "Young Wolf"));
    let config = ServerConfig { rng_seed: Some(11), ..ServerConfig::default() };
    let ctx = WorldContext::with_content(config, content, spawns);
    let record = ctx.content.map(0).cloned().unwrap();
    Map::new(ctx, record, 0, Difficulty::None)
}

fn wolf_in_cell(spawn_id: u64, cell: CellCoord) -> CreatureSpawn {
    let (x, y) = cell.center();
    CreatureSpawn {
        spawn_id,
        map_id: 0,
        entry: 299,
        position: Position::new(x, y, 0.0),
        difficulties: Vec::new(),
        wander_distance: 0.0,
        movement: SpawnMovement::Idle,
        respawn_secs: 300,
    }
}

#[test]
fn cooling_down_spawn_stays_absent_on_grid_load() {
    let cell = CellCoord::new(3, 4);
    let spawns = SpawnStore::new();
    spawns.add_creature_spawn(wolf_in_cell(1, cell));
    let mut map = world_with(spawns);

    let later = map.game_time() + 3600;
    map.save_respawn_time(SpawnObjectType::Creature, 1, later);
    assert!(map.load_cell(cell));
    assert_eq!(map.live_creature_count(), 0);
    assert_eq!(map.respawn_time(SpawnObjectType::Creature, 1), Some(later));
}

#[test]
fn spawn_without_cooldown_appears_on_grid_load() {
    let cell = CellCoord::new(3, 4);
    let spawns = SpawnStore::new();
    spawns.add_creature_spawn(wolf_in_cell(1, cell));
    let mut map = world_with(spawns);

    assert!(map.load_cell(cell));
    assert_eq!(map.live_creature_count(), 1);
    assert!(map.spawned_guid(SpawnObjectType::Creature, 1).is_some());
}

#[test]
fn elapsed_respawn_time_is_consumed_on_load() {
    let cell = CellCoord::new(3, 4);
    let spawns = SpawnStore::new();
    spawns.add_creature_spawn(wolf_in_cell(1, cell));
    let mut map = world_with(spawns);

    let past = map.game_time().saturating_sub(10);
    map.save_respawn_time(SpawnObjectType::Creature, 1, past);
    map.load_cell(cell);
    assert_eq!(map.live_creature_count(), 1);
    assert!(map.respawn_time(SpawnObjectType::Creature, 1).is_none());
}

#[test]
fn reload_spawns_fresh_objects_for_the_same_spawns() {
    let cell = compute_cell_coord(-8913.2, -136.0);
    let spawns = SpawnStore::new();
    spawns.add_creature_spawn(wolf_in_cell(1, cell));
    let (x, y) = cell.center();
    spawns.add_gameobject_spawn(GameObjectSpawn {
        spawn_id: 1,
        map_id: 0,
        entry: 1731,
        position: Position::new(x + 1.0, y, 0.0),
        difficulties: Vec::new(),
        respawn_secs: 300,
    });
    let mut map = world_with(spawns);

    map.load_cell(cell);
    assert_eq!(map.object_count(), 2);
    let first = map.spawned_guid(SpawnObjectType::Creature, 1).unwrap();

    assert!(map.unload_cell(cell));
    assert_eq!(map.object_count(), 0);
    assert!(!map.unload_cell(cell));

    map.load_cell(cell);
    assert_eq!(map.object_count(), 2);
    assert_ne!(map.spawned_guid(SpawnObjectType::Creature, 1), Some(first));
}

#[test]
fn heroic_only_spawn_is_missing_from_open_world() {
    let cell = CellCoord::new(40, 40);
    let spawns = SpawnStore::new();
    let mut spawn = wolf_in_cell(9, cell);
    spawn.difficulties = vec![Difficulty::Heroic];
    spawns.add_creature_spawn(spawn);
    let mut map = world_with(spawns);

    map.load_cell(cell);
    assert_eq!(map.object_count(), 0);
}
