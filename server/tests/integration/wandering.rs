// world_server_core/server/tests/integration/wandering.rs

use rand::rngs::StdRng;
use rand::SeedableRng;
use world_server_core::core::config::ServerConfig;
use world_server_core::core::types::{Difficulty, ObjectGuid, Position, SpawnObjectType};
use world_server_core::entities::creature::{Creature, UnitState};
use world_server_core::movement::flags::MovementGeneratorFlags;
use world_server_core::movement::path::{DirectPathGenerator, OpenTerrain};
use world_server_core::movement::random::{MovementContext, RandomMovementGenerator};
use world_server_core::world::content::{ContentStore, CreatureTemplate, MapRecord, MapType};
use world_server_core::world::context::WorldContext;
use world_server_core::world::grid::compute_cell_coord;
use world_server_core::world::map::Map;
use world_server_core::world::spawn_store::{CreatureSpawn, SpawnMovement, SpawnStore};

const HOME: (f32, f32) = (100.0, 100.0);
const RADIUS: f32 = 10.0;
const EPSILON: f32 = 1.0e-3;

fn map_with_wanderer(seed: u64) -> Map {
    let spawns = SpawnStore::new();
    spawns.add_creature_spawn(CreatureSpawn {
        spawn_id: 1,
        map_id: 0,
        entry: 299,
        position: Position::new(HOME.0, HOME.1, 0.0),
        difficulties: Vec::new(),
        wander_distance: RADIUS,
        movement: SpawnMovement::Random,
        respawn_secs: 300,
    });
    let mut content = ContentStore::new();
    content.add_map(MapRecord::new(0, "Eastern Kingdoms", MapType::Common));
    content.add_creature_template(CreatureTemplate::new(299, "Young Wolf"));
    let config = ServerConfig { rng_seed: Some(seed), ..ServerConfig::default() };
    let ctx = WorldContext::with_content(config, content, spawns);
    let record = ctx.content.map(0).cloned().unwrap();
    Map::new(ctx, record, 0, Difficulty::None)
}

fn horizontal_distance_from_home(p: &Position) -> f32 {
    p.distance_2d(&Position::new(HOME.0, HOME.1, 0.0))
}

#[test]
fn wander_destinations_stay_inside_radius() {
    let mut map = map_with_wanderer(1);
    map.load_cell(compute_cell_coord(HOME.0, HOME.1));
    let guid = map.spawned_guid(SpawnObjectType::Creature, 1).unwrap();

    let mut checked = 0;
    for _ in 0..50 {
        map.update(250);
        map.delayed_update(250);
        let creature = map.creature(guid).unwrap();
        if let Some(dest) = creature.destination() {
            let dest = Position::from(dest);
            assert!(horizontal_distance_from_home(&dest) <= RADIUS + EPSILON, "destination {:?} out of range", dest);
            checked += 1;
        }
        assert!(horizontal_distance_from_home(creature.position()) <= RADIUS + EPSILON);
    }
    let motion = map.creature(guid).unwrap().motion.as_ref().unwrap();
    assert!(motion.destinations_issued() >= 1);
    assert!(checked > 0);
}

#[test]
fn wanderer_settles_across_many_seeds() {
    for seed in 0..16u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut paths = DirectPathGenerator::default();
        let mut wolf = Creature::new(
            ObjectGuid(seed + 1),
            &CreatureTemplate::new(299, "Young Wolf"),
            Position::new(HOME.0, HOME.1, 0.0),
        );
        let mut gen = RandomMovementGenerator::new(RADIUS);

        for _ in 0..50 {
            let mut ctx = MovementContext { terrain: &OpenTerrain, paths: &mut paths, rng: &mut rng };
            gen.update(Some(&mut wolf), 250, &mut ctx);
            wolf.update_movement(250);
            if let Some(last) = gen.last_destination() {
                assert!(horizontal_distance_from_home(last) <= RADIUS + EPSILON, "seed {} strayed to {:?}", seed, last);
            }
        }
        assert!(gen.flags().is_consistent());
    }
}

#[test]
fn paused_generator_issues_nothing_until_resumed() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut paths = DirectPathGenerator::default();
    let mut wolf = Creature::new(ObjectGuid(1), &CreatureTemplate::new(299, "Young Wolf"), Position::new(HOME.0, HOME.1, 0.0));
    let mut gen = RandomMovementGenerator::new(RADIUS);
    gen.initialize(&mut wolf, &mut rng);
    gen.pause(0);
    assert!(gen.flags().has(MovementGeneratorFlags::PAUSED));

    for _ in 0..10 {
        let mut ctx = MovementContext { terrain: &OpenTerrain, paths: &mut paths, rng: &mut rng };
        gen.update(Some(&mut wolf), 500, &mut ctx);
    }
    assert_eq!(gen.destinations_issued(), 0);
    assert!(!wolf.has_unit_state(UnitState::ROAMING_MOVE));

    gen.resume(0);
    for _ in 0..10 {
        let mut ctx = MovementContext { terrain: &OpenTerrain, paths: &mut paths, rng: &mut rng };
        gen.update(Some(&mut wolf), 500, &mut ctx);
        wolf.update_movement(500);
    }
    assert!(gen.destinations_issued() >= 1);
}
