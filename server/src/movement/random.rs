// world_server_core/server/src/movement/random.rs
use super::flags::MovementGeneratorFlags as Flags;
use super::path::{move_position_to_first_collision, PathGenerator, PathResult};
use super::spline::MoveSplineInit;
use crate::collision::TerrainQuery;
use crate::core::constants::*;
use crate::core::timer::TimeTracker;
use crate::core::types::{Position, Vec3};
use crate::entities::creature::{Creature, UnitState};
use crate::world::content::RandomMovementType;
use rand::{Rng, RngCore};
use std::f32::consts::TAU;
use tracing::{debug, trace};

/// Collaborators a generator needs while picking destinations.
pub struct MovementContext<'a> {
    pub terrain: &'a dyn TerrainQuery,
    pub paths: &'a mut dyn PathGenerator,
    pub rng: &'a mut dyn RngCore,
}

/// Timed, path-validated wandering around a reference point.
#[derive(Debug, Clone)]
pub struct RandomMovementGenerator {
    flags: Flags,
    reference: Position,
    wander_distance: f32,
    wander_steps: u32,
    timer: TimeTracker,
    path: Option<PathResult>,
    last_destination: Option<Position>,
    destinations_issued: u32,
}

impl RandomMovementGenerator {
    /// `wander_distance` of zero takes the creature's own radius at
    /// initialization.
    pub fn new(wander_distance: f32) -> Self {
        RandomMovementGenerator {
            flags: Flags::INITIALIZATION_PENDING,
            reference: Position::default(),
            wander_distance,
            wander_steps: 0,
            timer: TimeTracker::new(0),
            path: None,
            last_destination: None,
            destinations_issued: 0,
        }
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn reference(&self) -> &Position {
        &self.reference
    }

    pub fn wander_distance(&self) -> f32 {
        self.wander_distance
    }

    pub fn wander_steps(&self) -> u32 {
        self.wander_steps
    }

    pub fn timer(&self) -> &TimeTracker {
        &self.timer
    }

    pub fn last_destination(&self) -> Option<&Position> {
        self.last_destination.as_ref()
    }

    pub fn destinations_issued(&self) -> u32 {
        self.destinations_issued
    }

    pub fn initialize(&mut self, owner: &mut Creature, rng: &mut dyn RngCore) {
        self.flags.remove(Flags::INITIALIZATION_PENDING | Flags::TRANSITORY | Flags::DEACTIVATED | Flags::PAUSED);
        self.flags.add(Flags::INITIALIZED);

        if !owner.is_alive() {
            return;
        }

        self.reference = *owner.position();
        owner.stop_moving();

        if self.wander_distance == 0.0 {
            self.wander_distance = owner.wander_distance;
        }

        self.wander_steps = rng.gen_range(RANDOM_MOVE_MIN_STEPS..=RANDOM_MOVE_MAX_STEPS);
        self.timer.reset(0);
        self.path = None;
        debug_assert!(self.flags.is_consistent());
    }

    pub fn reset(&mut self, owner: &mut Creature, rng: &mut dyn RngCore) {
        self.flags.remove(Flags::TRANSITORY | Flags::DEACTIVATED);
        self.initialize(owner, rng);
    }

    /// Per tick driver. Always keeps the generator alive.
    pub fn update(&mut self, owner: Option<&mut Creature>, diff: u32, ctx: &mut MovementContext<'_>) -> bool {
        let Some(owner) = owner else {
            return true;
        };
        if !owner.is_alive() {
            return true;
        }
        if self.flags.has(Flags::INITIALIZATION_PENDING) {
            self.initialize(owner, ctx.rng);
        } else if self.flags.has(Flags::DEACTIVATED) {
            self.reset(owner, ctx.rng);
        }
        if self.flags.has(Flags::FINALIZED | Flags::PAUSED) {
            return true;
        }

        if owner.has_unit_state(UnitState::NOT_MOVE) || owner.is_movement_prevented_by_casting() {
            self.flags.add(Flags::INTERRUPTED);
            owner.stop_moving();
            self.path = None;
            return true;
        }
        self.flags.remove(Flags::INTERRUPTED);

        self.timer.update(diff);
        let spline_done = owner.spline.finalized();
        if (self.flags.has(Flags::SPEED_UPDATE_PENDING) && !spline_done) || (self.timer.passed() && spline_done) {
            self.set_random_location(owner, ctx);
        }
        true
    }

    fn set_random_location(&mut self, owner: &mut Creature, ctx: &mut MovementContext<'_>) {
        if owner.has_unit_state(UnitState::NOT_MOVE | UnitState::LOST_CONTROL) || owner.is_movement_prevented_by_casting() {
            self.flags.add(Flags::INTERRUPTED);
            owner.stop_moving();
            self.path = None;
            return;
        }

        let distance = if self.wander_distance > 0.0 {
            ctx.rng.gen_range(0.0..=self.wander_distance)
        } else {
            0.0
        };
        let angle = ctx.rng.gen_range(0.0..TAU);
        let destination = move_position_to_first_collision(ctx.terrain, &self.reference, distance, angle);

        let eye = Vec3::new(0.0, 0.0, LOS_EYE_HEIGHT);
        let here = owner.position().to_vec3();
        if !ctx.terrain.is_in_line_of_sight(here + eye, destination.to_vec3() + eye) {
            trace!("[RandomMovement] {} destination out of sight, retrying", owner.guid);
            self.timer.reset(RANDOM_MOVE_LOS_RETRY_MS);
            return;
        }

        ctx.paths.set_path_length_limit(RANDOM_MOVE_MAX_PATH_LENGTH);
        let (ok, path) = ctx.paths.calculate_path(ctx.terrain, here, destination.to_vec3());
        if !ok || path.path_type.is_rejected() {
            trace!("[RandomMovement] {} path rejected ({:?}), retrying", owner.guid, path.path_type);
            self.timer.reset(RANDOM_MOVE_PATH_RETRY_MS);
            return;
        }

        let walk = match owner.movement_template {
            RandomMovementType::CanRun => owner.is_walking(),
            RandomMovementType::AlwaysRun => false,
            RandomMovementType::Walk => true,
        };
        let duration = MoveSplineInit::new(path.points.clone())
            .set_walk(walk)
            .set_velocity(owner.speed(walk))
            .launch(&mut owner.spline);
        if duration == 0 {
            self.timer.reset(RANDOM_MOVE_PATH_RETRY_MS);
            return;
        }

        self.flags.remove(Flags::TRANSITORY | Flags::TIMED_PAUSED);
        owner.add_unit_state(UnitState::ROAMING_MOVE);
        owner.set_walk(walk);

        let end = path.end().map(Position::from).unwrap_or(destination);
        self.last_destination = Some(end);
        self.destinations_issued += 1;
        self.path = Some(path);

        self.wander_steps = self.wander_steps.saturating_sub(1);
        if self.wander_steps > 0 {
            self.timer.reset(duration as i32);
        } else {
            let rest = ctx.rng.gen_range(RANDOM_MOVE_REST_MIN_SECS..=RANDOM_MOVE_REST_MAX_SECS) * 1000;
            self.timer.reset((duration + rest) as i32);
            self.wander_steps = ctx.rng.gen_range(RANDOM_MOVE_MIN_STEPS..=RANDOM_MOVE_MAX_STEPS);
        }
        debug!(
            "[RandomMovement] {} heading to ({:.1}, {:.1}, {:.1}) over {} ms",
            owner.guid, end.x, end.y, end.z, duration
        );
    }

    pub fn pause(&mut self, timer: u32) {
        if timer > 0 {
            self.flags.add(Flags::TIMED_PAUSED);
            self.timer.reset(timer as i32);
            self.flags.remove(Flags::PAUSED);
        } else {
            self.flags.add(Flags::PAUSED);
            self.flags.remove(Flags::TIMED_PAUSED);
        }
        debug_assert!(self.flags.is_consistent());
    }

    pub fn resume(&mut self, override_timer: u32) {
        if override_timer > 0 {
            self.timer.reset(override_timer as i32);
        }
        self.flags.remove(Flags::PAUSED);
    }

    pub fn unit_speed_changed(&mut self) {
        self.flags.add(Flags::SPEED_UPDATE_PENDING);
    }

    pub fn deactivate(&mut self, owner: &mut Creature) {
        self.flags.add(Flags::DEACTIVATED);
        owner.clear_unit_state(UnitState::ROAMING_MOVE);
    }

    /// Terminal. `active` means the generator was on top of the motion
    /// stack and its movement must be hard-stopped.
    pub fn finalize(&mut self, owner: &mut Creature, active: bool) {
        self.flags.add(Flags::FINALIZED);
        if active {
            owner.clear_unit_state(UnitState::ROAMING_MOVE);
            owner.stop_moving();
            owner.set_walk(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ObjectGuid;
    use crate::movement::path::{DirectPathGenerator, OpenTerrain, PathType};
    use crate::world::content::CreatureTemplate;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Blocked;

    impl TerrainQuery for Blocked {
        fn is_in_line_of_sight(&self, _from: Vec3, _to: Vec3) -> bool {
            false
        }
        fn object_hit_pos(&self, _from: Vec3, _to: Vec3, _modify_dist: f32) -> Option<Vec3> {
            None
        }
        fn ground_height(&self, _p: Vec3, _max_search: f32) -> Option<f32> {
            None
        }
    }

    struct Shortcut;

    impl PathGenerator for Shortcut {
        fn set_path_length_limit(&mut self, _limit: f32) {}

        fn calculate_path(&mut self, _terrain: &dyn TerrainQuery, from: Vec3, to: Vec3) -> (bool, PathResult) {
            (true, PathResult { points: smallvec::smallvec![from, to], path_type: PathType::SHORTCUT })
        }
    }

    fn creature_at(x: f32, y: f32) -> Creature {
        let mut c = Creature::new(ObjectGuid(7), &CreatureTemplate::new(1, "Wolf"), Position::new(x, y, 0.0));
        c.wander_distance = 10.0;
        c
    }

    fn tick(
        gen: &mut RandomMovementGenerator,
        c: &mut Creature,
        terrain: &dyn TerrainQuery,
        paths: &mut dyn PathGenerator,
        rng: &mut StdRng,
        diff: u32,
    ) {
        let mut ctx = MovementContext { terrain, paths, rng };
        gen.update(Some(c), diff, &mut ctx);
        c.update_movement(diff);
    }

    #[test]
    fn initialize_captures_reference_and_steps() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut c = creature_at(5.0, 6.0);
        let mut gen = RandomMovementGenerator::new(0.0);
        gen.initialize(&mut c, &mut rng);
        assert!(gen.flags().has(Flags::INITIALIZED));
        assert!(!gen.flags().has(Flags::INITIALIZATION_PENDING));
        assert_eq!(gen.wander_distance(), 10.0);
        assert!((2..=10).contains(&gen.wander_steps()));
        assert_eq!(gen.reference().x, 5.0);
    }

    #[test]
    fn first_tick_issues_destination() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut paths = DirectPathGenerator::default();
        let mut c = creature_at(0.0, 0.0);
        let mut gen = RandomMovementGenerator::new(0.0);
        for _ in 0..5 {
            tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 100);
        }
        assert!(gen.destinations_issued() >= 1);
        assert!(c.has_unit_state(UnitState::ROAMING_MOVE) || c.spline.finalized());
    }

    #[test]
    fn blocked_owner_is_interrupted() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut paths = DirectPathGenerator::default();
        let mut c = creature_at(0.0, 0.0);
        c.add_unit_state(UnitState::ROOT);
        let mut gen = RandomMovementGenerator::new(0.0);
        tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 100);
        assert!(gen.flags().has(Flags::INTERRUPTED));
        assert_eq!(gen.destinations_issued(), 0);
        c.clear_unit_state(UnitState::ROOT);
        tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 100);
        assert!(!gen.flags().has(Flags::INTERRUPTED));
    }

    #[test]
    fn los_failure_retries_in_200ms() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut paths = DirectPathGenerator::default();
        let mut c = creature_at(0.0, 0.0);
        let mut gen = RandomMovementGenerator::new(0.0);
        tick(&mut gen, &mut c, &Blocked, &mut paths, &mut rng, 0);
        assert_eq!(gen.timer().expiry(), RANDOM_MOVE_LOS_RETRY_MS);
        assert_eq!(gen.destinations_issued(), 0);
    }

    #[test]
    fn shortcut_path_retries_in_100ms() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut c = creature_at(0.0, 0.0);
        let mut gen = RandomMovementGenerator::new(0.0);
        tick(&mut gen, &mut c, &OpenTerrain, &mut Shortcut, &mut rng, 0);
        assert_eq!(gen.timer().expiry(), RANDOM_MOVE_PATH_RETRY_MS);
        assert!(c.spline.finalized());
    }

    #[test]
    fn paused_generator_is_inert_until_resumed() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut paths = DirectPathGenerator::default();
        let mut c = creature_at(0.0, 0.0);
        let mut gen = RandomMovementGenerator::new(0.0);
        gen.initialize(&mut c, &mut rng);
        gen.pause(0);
        for _ in 0..10 {
            tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 1000);
        }
        assert_eq!(gen.destinations_issued(), 0);
        gen.resume(0);
        for _ in 0..10 {
            tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 100);
        }
        assert!(gen.destinations_issued() > 0);
    }

    #[test]
    fn timed_pause_waits_then_clears() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut paths = DirectPathGenerator::default();
        let mut c = creature_at(0.0, 0.0);
        let mut gen = RandomMovementGenerator::new(0.0);
        gen.initialize(&mut c, &mut rng);
        gen.pause(1000);
        assert!(gen.flags().has(Flags::TIMED_PAUSED));
        tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 500);
        assert_eq!(gen.destinations_issued(), 0);
        for _ in 0..20 {
            tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 100);
        }
        assert!(gen.destinations_issued() > 0);
        assert!(!gen.flags().has(Flags::TIMED_PAUSED));
    }

    #[test]
    fn finalize_is_terminal_and_stops() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut paths = DirectPathGenerator::default();
        let mut c = creature_at(0.0, 0.0);
        let mut gen = RandomMovementGenerator::new(0.0);
        tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 0);
        gen.finalize(&mut c, true);
        assert!(c.spline.finalized());
        assert!(!c.has_unit_state(UnitState::ROAMING_MOVE));
        let issued = gen.destinations_issued();
        for _ in 0..50 {
            tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 1000);
        }
        assert_eq!(gen.destinations_issued(), issued);
    }

    #[test]
    fn speed_change_replans_running_spline() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut paths = DirectPathGenerator::default();
        let mut c = creature_at(0.0, 0.0);
        let mut gen = RandomMovementGenerator::new(0.0);
        while gen.destinations_issued() == 0 {
            tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 100);
        }
        let before = gen.destinations_issued();
        gen.unit_speed_changed();
        // replans only while the spline is still running
        if !c.spline.finalized() {
            tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 0);
            assert!(gen.destinations_issued() > before || gen.flags().has(Flags::SPEED_UPDATE_PENDING));
        }
    }

    #[test]
    fn dead_or_missing_owner_is_noop() {
        let mut rng = StdRng::seed_from_u64(10);
        let mut paths = DirectPathGenerator::default();
        let mut gen = RandomMovementGenerator::new(5.0);
        let mut ctx = MovementContext { terrain: &OpenTerrain, paths: &mut paths, rng: &mut rng };
        assert!(gen.update(None, 100, &mut ctx));
        let mut c = creature_at(0.0, 0.0);
        c.set_dead();
        assert!(gen.update(Some(&mut c), 100, &mut ctx));
        assert!(gen.flags().has(Flags::INITIALIZATION_PENDING));
    }

    proptest! {
        #[test]
        fn destinations_stay_within_radius(seed in any::<u64>(), radius in 0.5f32..25.0) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut paths = DirectPathGenerator::default();
            let mut c = creature_at(100.0, 100.0);
            c.wander_distance = radius;
            let mut gen = RandomMovementGenerator::new(0.0);
            let origin = Position::new(100.0, 100.0, 0.0);
            for _ in 0..60 {
                tick(&mut gen, &mut c, &OpenTerrain, &mut paths, &mut rng, 250);
                if let Some(dest) = gen.last_destination() {
                    prop_assert!(dest.distance_2d(&origin) <= radius + 1.0e-3);
                }
            }
        }
    }
}
