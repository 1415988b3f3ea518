// world_server_core/server/src/entities/creature.rs
use crate::core::types::{ObjectGuid, Position, SpawnId, SpellId, Vec3};
use crate::movement::random::RandomMovementGenerator;
use crate::movement::spline::MoveSpline;
use crate::systems::ai::{self, CreatureAction};
use crate::systems::scheduler::TaskScheduler;
use crate::world::content::{CreatureAiKind, CreatureTemplate, RandomMovementType};
use crate::world::grid::{compute_cell_coord, CellCoord};
use std::ops::BitOr;
use tracing::trace;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct UnitState(pub u32);

impl UnitState {
    pub const DIED: UnitState = UnitState(1 << 0);
    pub const IN_COMBAT: UnitState = UnitState(1 << 1);
    pub const STUNNED: UnitState = UnitState(1 << 2);
    pub const ROAMING: UnitState = UnitState(1 << 3);
    pub const ROAMING_MOVE: UnitState = UnitState(1 << 4);
    pub const ROOT: UnitState = UnitState(1 << 5);
    pub const CONFUSED: UnitState = UnitState(1 << 6);
    pub const FLEEING: UnitState = UnitState(1 << 7);
    pub const DISTRACTED: UnitState = UnitState(1 << 8);
    pub const CASTING: UnitState = UnitState(1 << 9);
    pub const POSSESSED: UnitState = UnitState(1 << 10);

    /// States that forbid any self-driven movement.
    pub const NOT_MOVE: UnitState = UnitState(Self::ROOT.0 | Self::STUNNED.0 | Self::DIED.0 | Self::DISTRACTED.0);
    pub const LOST_CONTROL: UnitState = UnitState(Self::CONFUSED.0 | Self::FLEEING.0 | Self::POSSESSED.0);
    pub const MOVING: UnitState = UnitState(Self::ROAMING_MOVE.0);

    pub fn has(&self, other: UnitState) -> bool {
        self.0 & other.0 != 0
    }

    pub fn add(&mut self, other: UnitState) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: UnitState) {
        self.0 &= !other.0;
    }
}

impl BitOr for UnitState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug)]
pub struct Creature {
    pub guid: ObjectGuid,
    pub entry: u32,
    pub spawn_id: Option<SpawnId>,
    position: Position,
    /// Respawn point. Evacuated creatures return here.
    pub home: Position,
    alive: bool,
    unit_state: UnitState,
    walking: bool,
    speed_walk: f32,
    speed_run: f32,
    pub can_move_while_casting: bool,
    pub wander_distance: f32,
    pub movement_template: RandomMovementType,
    pub spline: MoveSpline,
    pub motion: Option<RandomMovementGenerator>,
    pub scheduler: TaskScheduler<CreatureAction>,
    pub ai: CreatureAiKind,
    pub active: bool,
    pub respawn_delay_secs: u32,
    casting: Option<(SpellId, i32)>,
}

impl Creature {
    pub fn new(guid: ObjectGuid, template: &CreatureTemplate, position: Position) -> Self {
        let mut creature = Creature {
            guid,
            entry: template.entry,
            spawn_id: None,
            position,
            home: position,
            alive: true,
            unit_state: UnitState::default(),
            walking: false,
            speed_walk: template.speed_walk,
            speed_run: template.speed_run,
            can_move_while_casting: template.can_move_while_casting,
            wander_distance: 0.0,
            movement_template: template.movement_type,
            spline: MoveSpline::default(),
            motion: None,
            scheduler: TaskScheduler::new(),
            ai: template.ai,
            active: template.active,
            respawn_delay_secs: 0,
            casting: None,
        };
        ai::install(&mut creature);
        creature
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn cell(&self) -> CellCoord {
        compute_cell_coord(self.position.x, self.position.y)
    }

    pub fn home_cell(&self) -> CellCoord {
        compute_cell_coord(self.home.x, self.home.y)
    }

    pub fn relocate(&mut self, position: Position) {
        self.position = position;
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn set_dead(&mut self) {
        self.alive = false;
        self.unit_state.add(UnitState::DIED);
        self.stop_moving();
        self.scheduler.cancel_all();
    }

    pub fn unit_state(&self) -> UnitState {
        self.unit_state
    }

    pub fn has_unit_state(&self, state: UnitState) -> bool {
        self.unit_state.has(state)
    }

    pub fn add_unit_state(&mut self, state: UnitState) {
        self.unit_state.add(state);
    }

    pub fn clear_unit_state(&mut self, state: UnitState) {
        self.unit_state.remove(state);
    }

    pub fn is_in_combat(&self) -> bool {
        self.unit_state.has(UnitState::IN_COMBAT)
    }

    pub fn combat_stop(&mut self) {
        self.unit_state.remove(UnitState::IN_COMBAT);
    }

    pub fn is_walking(&self) -> bool {
        self.walking
    }

    pub fn set_walk(&mut self, walk: bool) {
        self.walking = walk;
    }

    pub fn speed(&self, walk: bool) -> f32 {
        if walk {
            self.speed_walk
        } else {
            self.speed_run
        }
    }

    /// Changes a movement speed and lets the active generator react.
    pub fn set_speed(&mut self, walk: bool, value: f32) {
        if walk {
            self.speed_walk = value;
        } else {
            self.speed_run = value;
        }
        if let Some(motion) = self.motion.as_mut() {
            motion.unit_speed_changed();
        }
    }

    pub fn start_cast(&mut self, spell_id: SpellId, cast_time_ms: i32) {
        self.casting = Some((spell_id, cast_time_ms));
        self.unit_state.add(UnitState::CASTING);
    }

    pub fn is_movement_prevented_by_casting(&self) -> bool {
        self.casting.is_some() && !self.can_move_while_casting
    }

    /// Halts the current spline.
    pub fn stop_moving(&mut self) {
        self.unit_state.remove(UnitState::MOVING);
        self.spline.stop();
    }

    /// Advances casts and spline playback.
    pub fn update_movement(&mut self, diff: u32) {
        if let Some((spell, remaining)) = self.casting.as_mut() {
            *remaining -= diff as i32;
            if *remaining <= 0 {
                trace!("[Creature] {} finished casting {}", self.guid, spell);
                self.casting = None;
                self.unit_state.remove(UnitState::CASTING);
            }
        }
        if let Some(p) = self.spline.update(diff) {
            self.position.relocate(&p);
            if self.spline.finalized() {
                self.unit_state.remove(UnitState::MOVING);
            }
        }
    }

    /// Moves back to the respawn point, dropping any motion in progress.
    pub fn return_home(&mut self) {
        self.stop_moving();
        self.position = self.home;
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.spline.destination()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_state_masks() {
        let t = CreatureTemplate::new(1, "Boar");
        let mut c = Creature::new(ObjectGuid(1), &t, Position::new(0.0, 0.0, 0.0));
        assert!(!c.has_unit_state(UnitState::NOT_MOVE));
        c.add_unit_state(UnitState::ROOT);
        assert!(c.has_unit_state(UnitState::NOT_MOVE));
        c.start_cast(10, 500);
        assert!(c.is_movement_prevented_by_casting());
        c.update_movement(600);
        assert!(!c.is_movement_prevented_by_casting());
    }

    #[test]
    fn death_stops_everything() {
        let t = CreatureTemplate::new(1, "Boar");
        let mut c = Creature::new(ObjectGuid(1), &t, Position::new(0.0, 0.0, 0.0));
        c.set_dead();
        assert!(!c.is_alive());
        assert!(c.has_unit_state(UnitState::NOT_MOVE));
    }

    #[test]
    fn combined_masks_match_any_member() {
        let blocked = UnitState::NOT_MOVE | UnitState::LOST_CONTROL;
        assert!(blocked.has(UnitState::FLEEING));
        assert!(blocked.has(UnitState::ROOT));
        assert!(!blocked.has(UnitState::ROAMING));

        let t = CreatureTemplate::new(1, "Boar");
        let mut c = Creature::new(ObjectGuid(1), &t, Position::new(0.0, 0.0, 0.0));
        c.add_unit_state(UnitState::CONFUSED);
        assert!(!c.has_unit_state(UnitState::NOT_MOVE));
        assert!(c.has_unit_state(blocked));
    }
}
