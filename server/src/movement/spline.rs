// world_server_core/server/src/movement/spline.rs
use crate::core::constants::{MIN_SPLINE_SEGMENT_LENGTH, MIN_SPLINE_VELOCITY};
use crate::core::types::Vec3;
use smallvec::SmallVec;
use tracing::{debug, warn};

pub type PathPoints = SmallVec<[Vec3; 8]>;

/// Linear path playback. Positions are interpolated per segment by elapsed
/// time at a constant velocity.
#[derive(Clone, Debug, Default)]
pub struct MoveSpline {
    points: PathPoints,
    /// Arrival time at each point, ms from launch.
    times: SmallVec<[u32; 8]>,
    elapsed: u32,
    walk: bool,
}

impl MoveSpline {
    pub fn finalized(&self) -> bool {
        self.points.len() < 2 || self.elapsed >= self.duration()
    }

    pub fn duration(&self) -> u32 {
        self.times.last().copied().unwrap_or(0)
    }

    pub fn is_walking(&self) -> bool {
        self.walk
    }

    pub fn destination(&self) -> Option<Vec3> {
        if self.finalized() {
            None
        } else {
            self.points.last().copied()
        }
    }

    pub fn stop(&mut self) {
        self.points.clear();
        self.times.clear();
        self.elapsed = 0;
    }

    /// Advances playback and returns the new position while moving.
    pub fn update(&mut self, diff: u32) -> Option<Vec3> {
        if self.finalized() {
            return None;
        }
        self.elapsed = self.elapsed.saturating_add(diff).min(self.duration());
        Some(self.position_at(self.elapsed))
    }

    fn position_at(&self, t: u32) -> Vec3 {
        let seg = self.times.iter().position(|&arrival| arrival >= t).unwrap_or(self.times.len() - 1);
        if seg == 0 {
            return self.points[0];
        }
        let (t0, t1) = (self.times[seg - 1], self.times[seg]);
        let span = (t1 - t0).max(1) as f32;
        let frac = (t - t0) as f32 / span;
        self.points[seg - 1] + (self.points[seg] - self.points[seg - 1]) * frac
    }
}

/// Launch arguments for a spline.
#[derive(Clone, Debug)]
pub struct MoveSplineInit {
    pub path: PathPoints,
    pub walk: bool,
    pub velocity: f32,
}

impl MoveSplineInit {
    pub fn new(path: PathPoints) -> Self {
        MoveSplineInit { path, walk: false, velocity: 0.0 }
    }

    pub fn set_walk(mut self, walk: bool) -> Self {
        self.walk = walk;
        self
    }

    pub fn set_velocity(mut self, velocity: f32) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn validate(&self) -> bool {
        if self.path.len() < 2 {
            warn!("[MoveSplineInit] path has {} points", self.path.len());
            return false;
        }
        if !(self.velocity >= MIN_SPLINE_VELOCITY) {
            warn!("[MoveSplineInit] velocity {} too low", self.velocity);
            return false;
        }
        if self.path.len() > 2 {
            for w in self.path.windows(2) {
                if (w[1] - w[0]).norm() < MIN_SPLINE_SEGMENT_LENGTH {
                    warn!("[MoveSplineInit] degenerate segment {:?} -> {:?}", w[0], w[1]);
                    return false;
                }
            }
        }
        true
    }

    /// Replaces `spline` with this path. Returns the duration in ms, zero
    /// when the arguments are rejected.
    pub fn launch(self, spline: &mut MoveSpline) -> u32 {
        if !self.validate() {
            return 0;
        }
        let mut times = SmallVec::with_capacity(self.path.len());
        let mut total = 0.0f32;
        times.push(0);
        for w in self.path.windows(2) {
            total += (w[1] - w[0]).norm() / self.velocity * 1000.0;
            times.push(total.round().max(1.0) as u32);
        }
        spline.points = self.path;
        spline.times = times;
        spline.elapsed = 0;
        spline.walk = self.walk;
        debug!("[MoveSpline] launched {} points over {} ms", spline.points.len(), spline.duration());
        spline.duration()
    }
}
