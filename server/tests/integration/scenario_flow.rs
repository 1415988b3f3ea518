// world_server_core/server/tests/integration/scenario_flow.rs

use world_server_core::core::config::ServerConfig;
use world_server_core::core::types::{Difficulty, ObjectGuid};
use world_server_core::entities::player::Player;
use world_server_core::systems::scenario::{Scenario, ScenarioMessage, ScenarioStepState};
use world_server_core::world::content::{
    ContentStore, InstanceTemplate, MapRecord, MapType, ScenarioStepTemplate, ScenarioTemplate,
};
use world_server_core::world::context::WorldContext;
use world_server_core::world::map::MapEvent;
use world_server_core::world::map_manager::MapManager;
use world_server_core::world::spawn_store::SpawnStore;

const SCENARIO_MAP: u32 = 1100;

fn step(id: u32, order_index: u32, bonus_objective: bool, reward_quest: Option<u32>) -> ScenarioStepTemplate {
    ScenarioStepTemplate { id, order_index, criteria_tree_id: id * 10, bonus_objective, reward_quest }
}

fn outpost() -> ScenarioTemplate {
    ScenarioTemplate {
        id: 1,
        map_id: SCENARIO_MAP,
        steps: vec![
            step(10, 0, false, None),
            step(11, 1, false, None),
            step(12, 2, false, Some(25001)),
            step(13, 3, true, None),
        ],
    }
}

#[test]
fn completed_step_never_leaves_done() {
    let mut scenario = Scenario::new(outpost());
    assert_eq!(scenario.current_step(), Some(10));
    assert_eq!(scenario.step_state(10), Some(ScenarioStepState::InProgress));

    scenario.completed_criteria_tree(10);
    assert_eq!(scenario.step_state(10), Some(ScenarioStepState::Done));
    assert_eq!(scenario.current_step(), Some(11));

    // a second completion of the same tree is ignored
    scenario.completed_criteria_tree(10);
    assert_eq!(scenario.step_state(10), Some(ScenarioStepState::Done));
    assert_eq!(scenario.current_step(), Some(11));

    // steps that are not current cannot be pushed ahead
    assert!(!scenario.can_update_criteria_tree(12));
    scenario.completed_criteria_tree(12);
    assert_eq!(scenario.step_state(12), Some(ScenarioStepState::NotStarted));

    scenario.completed_criteria_tree(11);
    scenario.completed_criteria_tree(12);
    for id in [10, 11, 12] {
        assert_eq!(scenario.step_state(id), Some(ScenarioStepState::Done));
    }
    assert!(scenario.is_complete());
    assert_eq!(scenario.current_step(), None);
}

#[test]
fn bonus_objective_completes_out_of_order() {
    let mut scenario = Scenario::new(outpost());
    assert!(scenario.can_update_criteria_tree(13));
    assert!(scenario.can_complete_criteria_tree(13));
    scenario.completed_criteria_tree(13);
    assert_eq!(scenario.step_state(13), Some(ScenarioStepState::Done));
    assert_eq!(scenario.current_step(), Some(10));
    assert_eq!(scenario.build_state().bonus_objectives, vec![(13, true)]);
    assert!(!scenario.is_complete());
}

#[test]
fn final_step_rewards_everyone_inside() {
    let mut scenario = Scenario::new(outpost());
    scenario.on_player_enter(ObjectGuid(1));
    scenario.on_player_enter(ObjectGuid(2));
    scenario.drain_messages();

    for id in [10, 11, 12] {
        let tree = id * 10;
        assert_eq!(scenario.step_for_criteria_tree(tree), Some(id));
        scenario.completed_criteria_tree(id);
    }
    let messages = scenario.drain_messages();
    let rewarded: Vec<ObjectGuid> = messages
        .iter()
        .filter_map(|m| match m {
            ScenarioMessage::RewardQuest { player, quest: 25001 } => Some(*player),
            _ => None,
        })
        .collect();
    assert_eq!(rewarded, vec![ObjectGuid(1), ObjectGuid(2)]);
    assert!(messages.contains(&ScenarioMessage::Completed { scenario_id: 1 }));
}

#[test]
fn reset_starts_a_new_lifetime() {
    let mut scenario = Scenario::new(outpost());
    scenario.completed_criteria_tree(10);
    scenario.completed_criteria_tree(13);
    scenario.reset();
    assert_eq!(scenario.current_step(), Some(10));
    assert_eq!(scenario.step_state(10), Some(ScenarioStepState::InProgress));
    assert_eq!(scenario.step_state(11), Some(ScenarioStepState::NotStarted));
    assert_eq!(scenario.step_state(13), Some(ScenarioStepState::NotStarted));
}

#[test]
fn scenario_instance_reports_state_to_entering_players() {
    let mut content = ContentStore::new();
    content.add_map(MapRecord::new(0, "Eastern Kingdoms", MapType::Common));
    let mut record = MapRecord::new(SCENARIO_MAP, "Scarlet Outpost", MapType::Scenario);
    record.difficulties = vec![Difficulty::Normal];
    record.max_players = 3;
    content.add_map(record);
    content.add_instance_template(InstanceTemplate { map_id: SCENARIO_MAP, parent: 0, script: None });
    content.add_scenario(outpost());
    let mut config = ServerConfig::default();
    config.thread_pools.map_update_threads = 0;
    let mgr = MapManager::new(WorldContext::with_content(config, content, SpawnStore::new())).unwrap();

    let mut player = Player::new(ObjectGuid(42), "Scout", 85);
    let map = mgr.create_map(SCENARIO_MAP, &mut player, 0).unwrap();
    let mut map = map.lock();
    assert!(map.add_player(&mut player));
    map.update(50);

    let personal = map.drain_events().into_iter().any(|e| {
        matches!(e, MapEvent::Scenario(ScenarioMessage::State { to: Some(ObjectGuid(42)), ref state }) if state.current_step == Some(10))
    });
    assert!(personal);

    let scenario = map.instance_data_mut().unwrap().scenario.as_mut().unwrap();
    scenario.completed_criteria_tree(10);
    assert_eq!(scenario.current_step(), Some(11));

    assert!(map.remove_player(&mut player));
    map.update(50);
    let booted = map
        .drain_events()
        .into_iter()
        .any(|e| matches!(e, MapEvent::Scenario(ScenarioMessage::Boot { player: ObjectGuid(42), scenario_id: 1 })));
    assert!(booted);
}
