// world_server_core/server/src/systems/scenario.rs
//! Per-instance scenario progression.
//!
//! Step states only move forward within one lifetime:
//!
//! | from        | to          | trigger                                  |
//! |-------------|-------------|------------------------------------------|
//! | NotStarted  | InProgress  | step becomes current                     |
//! | InProgress  | Done        | its criteria tree completes              |
//! | NotStarted  | Done        | bonus objective completes                |
//! | any         | NotStarted  | `reset` (starts a new lifetime)          |

use crate::core::types::{ObjectGuid, QuestId};
use crate::world::content::{ScenarioStepTemplate, ScenarioTemplate};
use std::collections::HashMap;
use tracing::{debug, error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioStepState {
    NotStarted,
    InProgress,
    Done,
}

/// Snapshot sent to players on entry and on each step change.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioState {
    pub scenario_id: u32,
    pub current_step: Option<u32>,
    /// Non-bonus steps that are in progress or done.
    pub picked_steps: Vec<u32>,
    /// (step id, complete) for every bonus objective.
    pub bonus_objectives: Vec<(u32, bool)>,
    pub complete: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScenarioMessage {
    State { to: Option<ObjectGuid>, state: ScenarioState },
    RewardQuest { player: ObjectGuid, quest: QuestId },
    Completed { scenario_id: u32 },
    Boot { player: ObjectGuid, scenario_id: u32 },
}

#[derive(Debug)]
pub struct Scenario {
    template: ScenarioTemplate,
    current_step: Option<u32>,
    step_states: HashMap<u32, ScenarioStepState>,
    players: Vec<ObjectGuid>,
    outbox: Vec<ScenarioMessage>,
}

impl Scenario {
    pub fn new(template: ScenarioTemplate) -> Self {
        let mut scenario = Scenario {
            template,
            current_step: None,
            step_states: HashMap::new(),
            players: Vec::new(),
            outbox: Vec::new(),
        };
        scenario.start_lifetime();
        scenario
    }

    fn start_lifetime(&mut self) {
        self.step_states = self.template.steps.iter().map(|s| (s.id, ScenarioStepState::NotStarted)).collect();
        match self.first_step() {
            Some(first) => self.set_step(Some(first)),
            None => {
                self.current_step = None;
                error!("[Scenario] {} has no valid step, not launched", self.template.id);
            }
        }
    }

    pub fn id(&self) -> u32 {
        self.template.id
    }

    pub fn reset(&mut self) {
        info!("[Scenario] {} reset", self.template.id);
        self.start_lifetime();
    }

    fn step(&self, id: u32) -> Option<&ScenarioStepTemplate> {
        self.template.steps.iter().find(|s| s.id == id)
    }

    fn main_steps(&self) -> impl Iterator<Item = &ScenarioStepTemplate> {
        self.template.steps.iter().filter(|s| !s.bonus_objective)
    }

    pub fn first_step(&self) -> Option<u32> {
        self.main_steps().min_by_key(|s| s.order_index).map(|s| s.id)
    }

    pub fn last_step(&self) -> Option<u32> {
        self.main_steps().max_by_key(|s| s.order_index).map(|s| s.id)
    }

    pub fn current_step(&self) -> Option<u32> {
        self.current_step
    }

    pub fn step_state(&self, step_id: u32) -> Option<ScenarioStepState> {
        self.step_states.get(&step_id).copied()
    }

    /// Ignores any transition out of `Done`.
    fn set_step_state(&mut self, step_id: u32, state: ScenarioStepState) {
        let Some(current) = self.step_states.get_mut(&step_id) else {
            return;
        };
        if *current == ScenarioStepState::Done && state != ScenarioStepState::Done {
            debug!("[Scenario] step {} already done, keeping it", step_id);
            return;
        }
        *current = state;
    }

    fn set_step(&mut self, step_id: Option<u32>) {
        self.current_step = step_id;
        if let Some(id) = step_id {
            self.set_step_state(id, ScenarioStepState::InProgress);
        }
        let state = self.build_state();
        self.outbox.push(ScenarioMessage::State { to: None, state });
    }

    pub fn is_complete(&self) -> bool {
        self.main_steps()
            .all(|s| self.step_states.get(&s.id) == Some(&ScenarioStepState::Done))
    }

    fn complete_step(&mut self, step_id: u32) {
        let Some(step) = self.step(step_id).cloned() else {
            return;
        };
        if let Some(quest) = step.reward_quest {
            for &player in &self.players {
                self.outbox.push(ScenarioMessage::RewardQuest { player, quest });
            }
        }
        if step.bonus_objective {
            return;
        }

        let next = self
            .main_steps()
            .filter(|s| self.step_states.get(&s.id) != Some(&ScenarioStepState::Done))
            .min_by_key(|s| s.order_index)
            .map(|s| s.id);
        self.set_step(next);

        if self.is_complete() {
            info!("[Scenario] {} complete", self.template.id);
            self.outbox.push(ScenarioMessage::Completed { scenario_id: self.template.id });
        } else if next.is_none() {
            error!(
                "[Scenario] {} step {} completed but no next step could be determined",
                self.template.id, step_id
            );
        }
    }

    fn owns(&self, step_id: u32) -> Option<&ScenarioStepTemplate> {
        self.step(step_id)
    }

    /// Criteria of `step_id` may progress: bonus objectives always, main
    /// steps only while current.
    pub fn can_update_criteria_tree(&self, step_id: u32) -> bool {
        let Some(step) = self.owns(step_id) else {
            return false;
        };
        if self.current_step.is_none() {
            return false;
        }
        step.bonus_objective || self.current_step == Some(step_id)
    }

    pub fn can_complete_criteria_tree(&self, step_id: u32) -> bool {
        let Some(step) = self.owns(step_id) else {
            return false;
        };
        if step.bonus_objective {
            return !self.is_complete();
        }
        self.current_step == Some(step_id)
    }

    /// The criteria tree backing `step_id` finished.
    pub fn completed_criteria_tree(&mut self, step_id: u32) {
        let Some(step) = self.owns(step_id) else {
            return;
        };
        if !step.bonus_objective && self.current_step != Some(step_id) {
            return;
        }
        if self.step_state(step_id) == Some(ScenarioStepState::Done) {
            return;
        }
        self.set_step_state(step_id, ScenarioStepState::Done);
        self.complete_step(step_id);
    }

    /// Looks up the step whose criteria tree is `tree_id`.
    pub fn step_for_criteria_tree(&self, tree_id: u32) -> Option<u32> {
        self.template.steps.iter().find(|s| s.criteria_tree_id == tree_id).map(|s| s.id)
    }

    pub fn build_state(&self) -> ScenarioState {
        let mut picked_steps: Vec<u32> = self
            .main_steps()
            .filter(|s| {
                matches!(
                    self.step_states.get(&s.id),
                    Some(ScenarioStepState::InProgress | ScenarioStepState::Done)
                )
            })
            .map(|s| s.id)
            .collect();
        picked_steps.sort_unstable();
        let bonus_objectives = self
            .template
            .steps
            .iter()
            .filter(|s| s.bonus_objective)
            .map(|s| (s.id, self.step_states.get(&s.id) == Some(&ScenarioStepState::Done)))
            .collect();
        ScenarioState {
            scenario_id: self.template.id,
            current_step: self.current_step,
            picked_steps,
            bonus_objectives,
            complete: self.is_complete(),
        }
    }

    pub fn on_player_enter(&mut self, player: ObjectGuid) {
        if !self.players.contains(&player) {
            self.players.push(player);
        }
        let state = self.build_state();
        self.outbox.push(ScenarioMessage::State { to: Some(player), state });
    }

    pub fn on_player_exit(&mut self, player: ObjectGuid) {
        self.players.retain(|p| *p != player);
        self.outbox.push(ScenarioMessage::Boot { player, scenario_id: self.template.id });
    }

    pub fn players(&self) -> &[ObjectGuid] {
        &self.players
    }

    pub fn drain_messages(&mut self) -> Vec<ScenarioMessage> {
        std::mem::take(&mut self.outbox)
    }
}

impl Drop for Scenario {
    fn drop(&mut self) {
        if !self.players.is_empty() {
            debug!("[Scenario] {} dropped with {} players inside", self.template.id, self.players.len());
        }
    }
}
