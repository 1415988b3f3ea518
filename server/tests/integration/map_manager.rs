// world_server_core/server/tests/integration/map_manager.rs

use std::sync::Arc;
use world_server_core::core::config::ServerConfig;
use world_server_core::core::timer::unix_now;
use world_server_core::core::types::{Difficulty, EnterState, ObjectGuid};
use world_server_core::entities::player::{Group, Player};
use world_server_core::world::content::{AccessRequirement, ContentStore, InstanceTemplate, MapRecord, MapType};
use world_server_core::world::context::WorldContext;
use world_server_core::world::map_manager::MapManager;
use world_server_core::world::spawn_store::SpawnStore;

const OPEN_WORLD: u32 = 0;
const DUNGEON: u32 = 33;
const SOLO_DUNGEON: u32 = 34;
const RAID: u32 = 249;
const HEROIC_ONLY: u32 = 35;
const UNINSTANCED: u32 = 36;

fn dungeon(id: u32, name: &str, map_type: MapType, difficulties: Vec<Difficulty>, max_players: u32) -> MapRecord {
    let mut record = MapRecord::new(id, name, map_type);
    record.difficulties = difficulties;
    record.max_players = max_players;
    record.expansion = 2;
    record
}

fn manager() -> MapManager {
    let mut content = ContentStore::new();
    content.add_map(MapRecord::new(OPEN_WORLD, "Eastern Kingdoms", MapType::Common));
    content.add_map(dungeon(DUNGEON, "Shadowfang Keep", MapType::Instance, vec![Difficulty::Normal, Difficulty::Heroic], 5));
    content.add_map(dungeon(SOLO_DUNGEON, "Stockade", MapType::Instance, vec![Difficulty::Normal], 1));
    content.add_map(dungeon(RAID, "Onyxias Lair", MapType::Raid, vec![Difficulty::Raid10Normal], 10));
    content.add_map(dungeon(HEROIC_ONLY, "Magisters Terrace", MapType::Instance, vec![Difficulty::Heroic], 5));
    content.add_map(dungeon(UNINSTANCED, "Unfinished Crypt", MapType::Instance, vec![Difficulty::Normal], 5));
    for map_id in [DUNGEON, SOLO_DUNGEON, RAID, HEROIC_ONLY] {
        content.add_instance_template(InstanceTemplate { map_id, parent: OPEN_WORLD, script: None });
    }
    content.add_access_requirement(AccessRequirement {
        map_id: DUNGEON,
        difficulty: Difficulty::Normal,
        level_min: 14,
        level_max: 0,
        item: None,
        quest_done: None,
    });

    let mut config = ServerConfig::default();
    config.thread_pools.map_update_threads = 0;
    config.instance_unload_delay_ms = 0;
    config.max_instances_per_hour = 2;
    MapManager::new(WorldContext::with_content(config, content, SpawnStore::new())).unwrap()
}

#[test]
fn freed_instance_id_is_reused_first() {
    let mgr = manager();
    assert_eq!(mgr.generate_instance_id().unwrap(), 1);
    assert_eq!(mgr.generate_instance_id().unwrap(), 2);
    assert_eq!(mgr.generate_instance_id().unwrap(), 3);
    mgr.free_instance_id(2);
    assert_eq!(mgr.generate_instance_id().unwrap(), 2);
    assert_eq!(mgr.generate_instance_id().unwrap(), 4);
}

#[test]
fn persisted_ids_are_skipped_by_the_allocator() {
    let mgr = manager();
    mgr.init_instance_ids(&[1, 2, 5]);
    assert_eq!(mgr.generate_instance_id().unwrap(), 3);
    assert_eq!(mgr.generate_instance_id().unwrap(), 4);
    assert_eq!(mgr.generate_instance_id().unwrap(), 6);
}

#[test]
fn open_world_always_admits() {
    let mgr = manager();
    let player = Player::new(ObjectGuid(1), "Anduin", 1);
    assert_eq!(mgr.player_cannot_enter(OPEN_WORLD, &player, false), EnterState::CanEnter);
    assert_eq!(mgr.player_cannot_enter(999, &player, false), EnterState::NoEntry);
}

#[test]
fn structural_checks_precede_the_game_master_bypass() {
    let mgr = manager();
    let mut gm = Player::new(ObjectGuid(1), "Gamemaster", 1);
    gm.is_game_master = true;

    assert_eq!(mgr.player_cannot_enter(UNINSTANCED, &gm, false), EnterState::UninstancedDungeon);
    assert_eq!(mgr.player_cannot_enter(HEROIC_ONLY, &gm, false), EnterState::DifficultyUnavailable);
    // below the level requirement and outside a raid group
    assert_eq!(mgr.player_cannot_enter(DUNGEON, &gm, false), EnterState::CanEnter);
    assert_eq!(mgr.player_cannot_enter(RAID, &gm, false), EnterState::CanEnter);
}

#[test]
fn access_requirement_is_checked_before_raid_membership() {
    let mgr = manager();
    let low = Player::new(ObjectGuid(2), "Newbie", 5);
    assert_eq!(mgr.player_cannot_enter(DUNGEON, &low, false), EnterState::UnspecifiedReason);

    let soloist = Player::new(ObjectGuid(3), "Soloist", 80);
    assert_eq!(mgr.player_cannot_enter(DUNGEON, &soloist, false), EnterState::CanEnter);
    assert_eq!(mgr.player_cannot_enter(RAID, &soloist, false), EnterState::NotInRaid);

    let mut raider = Player::new(ObjectGuid(4), "Raider", 80);
    let mut group = Group::new(ObjectGuid(400), raider.guid);
    group.is_raid = true;
    raider.group = Some(group.into_ref());
    assert_eq!(mgr.player_cannot_enter(RAID, &raider, false), EnterState::CanEnter);
}

#[test]
fn corpse_in_another_instance_blocks_entry() {
    let mgr = manager();
    let mut ghost = Player::new(ObjectGuid(5), "Ghost", 80);
    ghost.die(SOLO_DUNGEON);
    assert_eq!(mgr.player_cannot_enter(DUNGEON, &ghost, false), EnterState::CorpseInDifferentInstance);
    assert_eq!(mgr.player_cannot_enter(SOLO_DUNGEON, &ghost, false), EnterState::CanEnter);
}

#[test]
fn hourly_instance_limit_applies_to_new_instances_only() {
    let mgr = manager();
    let mut player = Player::new(ObjectGuid(6), "Farmer", 80);
    let now = unix_now();
    player.add_instance_enter_time(10, now - 60);
    player.add_instance_enter_time(11, now - 30);
    assert_eq!(mgr.player_cannot_enter(DUNGEON, &player, false), EnterState::TooManyInstances);

    let mut lfg = Group::new(ObjectGuid(600), player.guid);
    lfg.is_lfg = true;
    player.group = Some(lfg.into_ref());
    assert_eq!(mgr.player_cannot_enter(DUNGEON, &player, false), EnterState::CanEnter);
}

#[test]
fn hourly_instance_limit_expires_after_an_hour() {
    let mgr = manager();
    let mut player = Player::new(ObjectGuid(9), "Returning", 80);
    let two_hours_ago = unix_now() - 2 * 3600;
    player.add_instance_enter_time(10, two_hours_ago);
    player.add_instance_enter_time(11, two_hours_ago);
    assert_eq!(mgr.player_cannot_enter(DUNGEON, &player, false), EnterState::CanEnter);
}

#[test]
fn full_group_instance_reports_max_players() {
    let mgr = manager();
    let mut leader = Player::new(ObjectGuid(7), "Leader", 80);
    let mut member = Player::new(ObjectGuid(8), "Member", 80);
    let group = Group::new(ObjectGuid(700), leader.guid).into_ref();
    leader.group = Some(Arc::clone(&group));
    member.group = Some(Arc::clone(&group));

    let map = mgr.create_map(SOLO_DUNGEON, &mut leader, 0).unwrap();
    assert!(map.lock().add_player(&mut leader));
    assert_eq!(group.read().bound_instance(SOLO_DUNGEON).map(|b| b.instance_id), Some(1));

    assert_eq!(mgr.player_cannot_enter(SOLO_DUNGEON, &member, false), EnterState::MaxPlayers);
    assert_eq!(mgr.player_cannot_enter(SOLO_DUNGEON, &member, true), EnterState::CanEnter);
    assert_eq!(map.lock().cannot_enter(&leader), EnterState::AlreadyInMap);

    let joined = mgr.create_map(SOLO_DUNGEON, &mut member, 0).unwrap();
    assert!(Arc::ptr_eq(&map, &joined));
    assert_eq!(mgr.num_players_in_instances(), 1);
}

#[test]
fn abandoned_instance_expires_and_releases_its_id() {
    let mgr = manager();
    let mut player = Player::new(ObjectGuid(9), "Wanderer", 80);
    let map = mgr.create_map(DUNGEON, &mut player, 0).unwrap();
    let instance_id = map.lock().instance_id();
    drop(map);

    mgr.update(mgr.map_update_interval());
    assert!(mgr.find_map(DUNGEON, instance_id).is_none());
    assert!(mgr.instance_save(instance_id).is_some());

    mgr.unbind_player(&mut player, DUNGEON);
    assert!(mgr.instance_save(instance_id).is_none());
    assert_eq!(mgr.generate_instance_id().unwrap(), instance_id);
}

#[test]
fn login_rejoins_a_live_instance() {
    let mgr = manager();
    let mut first = Player::new(ObjectGuid(10), "First", 80);
    let map = mgr.create_map(DUNGEON, &mut first, 0).unwrap();
    let instance_id = map.lock().instance_id();

    let mut returning = Player::new(ObjectGuid(11), "Returning", 80);
    let rejoined = mgr.create_map(DUNGEON, &mut returning, instance_id).unwrap();
    assert!(Arc::ptr_eq(&map, &rejoined));
    assert!(returning.bound_instance(DUNGEON).is_none());
}
