// world_server_core/server/tests/performance/map_update_stress.rs

use metrics::histogram;
use std::sync::Arc;
use std::time::Instant;
use world_server_core::core::config::ServerConfig;
use world_server_core::core::types::{Difficulty, ObjectGuid, Position};
use world_server_core::entities::player::Player;
use world_server_core::server::instance::WorldServer;
use world_server_core::world::content::{ContentStore, CreatureTemplate, InstanceTemplate, MapRecord, MapType};
use world_server_core::world::context::WorldContext;
use world_server_core::world::spawn_store::{CreatureSpawn, SpawnMovement, SpawnStore};

const DUNGEON: u32 = 33;
const PLAYERS: u64 = 24;
const WOLVES_PER_AXIS: u64 = 20;

fn setup_world() -> WorldServer {
    let mut content = ContentStore::new();
    content.add_map(MapRecord::new(0, "Eastern Kingdoms", MapType::Common));
    let mut dungeon = MapRecord::new(DUNGEON, "Shadowfang Keep", MapType::Instance);
    dungeon.difficulties = vec![Difficulty::Normal];
    dungeon.max_players = 5;
    content.add_map(dungeon);
    content.add_instance_template(InstanceTemplate { map_id: DUNGEON, parent: 0, script: None });
    content.add_creature_template(CreatureTemplate::new(299, "Young Wolf"));

    let spawns = SpawnStore::new();
    let mut spawn_id = 0;
    for map_id in [0, DUNGEON] {
        let difficulties = if map_id == DUNGEON { vec![Difficulty::Normal] } else { Vec::new() };
        for i in 0..WOLVES_PER_AXIS {
            for j in 0..WOLVES_PER_AXIS {
                spawn_id += 1;
                spawns.add_creature_spawn(CreatureSpawn {
                    spawn_id,
                    map_id,
                    entry: 299,
                    position: Position::new(i as f32 * 5.0 - 50.0, j as f32 * 5.0 - 50.0, 0.0),
                    difficulties: difficulties.clone(),
                    wander_distance: 6.0,
                    movement: SpawnMovement::Random,
                    respawn_secs: 30,
                });
            }
        }
    }

    let mut config = ServerConfig { rng_seed: Some(99), ..ServerConfig::default() };
    config.thread_pools.map_update_threads = 4;
    config.map_update_interval_ms = 50;
    WorldServer::new(WorldContext::with_content(config, content, spawns)).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn stress_test_parallel_map_update() {
    let world = Arc::new(setup_world());
    world.start();

    let mut players: Vec<Player> = (1..=PLAYERS)
        .map(|i| {
            let mut p = Player::new(ObjectGuid(i), &format!("Stress{}", i), 80);
            p.position = Position::new(10.0 + (i % 5) as f32, 10.0 + (i / 5) as f32, 0.0);
            p
        })
        .collect();
    for player in players.iter_mut() {
        let map = world.map_manager.create_map(DUNGEON, player, 0).unwrap();
        assert!(map.lock().add_player(player));
    }
    assert_eq!(world.map_manager.num_instances() as u64, PLAYERS);

    for _ in 0..400 {
        let start = Instant::now();
        world.tick(50);
        histogram!("world_tick_duration_ms").record(start.elapsed().as_secs_f64() * 1000.0);
    }

    assert_eq!(world.map_manager.num_players_in_instances() as u64, PLAYERS);
    let mut live = 0;
    world.map_manager.do_for_all_maps_with_map_id(DUNGEON, |map| live += map.live_creature_count());
    assert_eq!(live as u64, PLAYERS * WOLVES_PER_AXIS * WOLVES_PER_AXIS);
    assert!(!world.map_manager.is_shutdown_requested());
    world.shutdown();
    assert_eq!(world.map_manager.map_count(), 0);
}
