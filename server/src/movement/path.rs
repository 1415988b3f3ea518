// world_server_core/server/src/movement/path.rs
use super::spline::PathPoints;
use crate::collision::TerrainQuery;
use crate::core::constants::*;
use crate::core::types::{Position, Vec3};
use smallvec::smallvec;
use std::ops::BitOr;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct PathType(pub u16);

impl PathType {
    pub const BLANK: PathType = PathType(0);
    pub const NORMAL: PathType = PathType(1 << 0);
    pub const SHORTCUT: PathType = PathType(1 << 1);
    pub const INCOMPLETE: PathType = PathType(1 << 2);
    pub const NOPATH: PathType = PathType(1 << 3);
    pub const NOT_USING_PATH: PathType = PathType(1 << 4);
    pub const SHORT: PathType = PathType(1 << 5);
    pub const FARFROMPOLY_START: PathType = PathType(1 << 6);
    pub const FARFROMPOLY_END: PathType = PathType(1 << 7);
    pub const FARFROMPOLY: PathType = PathType((1 << 6) | (1 << 7));

    pub fn has(&self, other: PathType) -> bool {
        self.0 & other.0 != 0
    }

    /// Path unusable for wandering.
    pub fn is_rejected(&self) -> bool {
        self.has(PathType::NOPATH) || self.has(PathType::SHORTCUT) || self.has(PathType::FARFROMPOLY)
    }
}

impl BitOr for PathType {
    type Output = PathType;

    fn bitor(self, rhs: PathType) -> PathType {
        PathType(self.0 | rhs.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PathResult {
    pub points: PathPoints,
    pub path_type: PathType,
}

impl PathResult {
    pub fn length(&self) -> f32 {
        self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }

    pub fn end(&self) -> Option<Vec3> {
        self.points.last().copied()
    }
}

/// Pathfinding collaborator.
pub trait PathGenerator: Send {
    fn set_path_length_limit(&mut self, limit: f32);

    /// Computes a path and classifies it. `false` when no path at all could
    /// be produced.
    fn calculate_path(&mut self, terrain: &dyn TerrainQuery, from: Vec3, to: Vec3) -> (bool, PathResult);
}

/// Straight segment validated against static geometry. Used where no
/// navigation mesh is loaded.
#[derive(Clone, Debug)]
pub struct DirectPathGenerator {
    length_limit: f32,
}

impl Default for DirectPathGenerator {
    fn default() -> Self {
        DirectPathGenerator { length_limit: f32::INFINITY }
    }
}

impl PathGenerator for DirectPathGenerator {
    fn set_path_length_limit(&mut self, limit: f32) {
        self.length_limit = limit;
    }

    fn calculate_path(&mut self, terrain: &dyn TerrainQuery, from: Vec3, to: Vec3) -> (bool, PathResult) {
        let delta = to - from;
        let length = delta.norm();
        if !length.is_finite() || length < MIN_SPLINE_SEGMENT_LENGTH {
            return (false, PathResult { points: smallvec![from], path_type: PathType::NOPATH });
        }
        let eye = Vec3::new(0.0, 0.0, LOS_EYE_HEIGHT);
        if !terrain.is_in_line_of_sight(from + eye, to + eye) {
            return (false, PathResult { points: smallvec![from], path_type: PathType::NOPATH });
        }
        if length > self.length_limit {
            let end = from + delta * (self.length_limit / length);
            return (true, PathResult { points: smallvec![from, end], path_type: PathType::NORMAL | PathType::SHORT });
        }
        (true, PathResult { points: smallvec![from, to], path_type: PathType::NORMAL })
    }
}

/// Projects `from` by `dist` along `angle` in the horizontal plane, stopping
/// short of the first static collision. The result never lies farther than
/// `dist` from `from` horizontally.
pub fn move_position_to_first_collision(terrain: &dyn TerrainQuery, from: &Position, dist: f32, angle: f32) -> Position {
    let eye = Vec3::new(0.0, 0.0, COLLISION_CONTACT_DISTANCE);
    let start = from.to_vec3();
    let mut dest = Vec3::new(from.x + dist * angle.cos(), from.y + dist * angle.sin(), from.z);
    let limit = MAP_HALFSIZE - 0.5;
    dest.x = dest.x.clamp(-limit, limit);
    dest.y = dest.y.clamp(-limit, limit);

    let ground_at = |p: Vec3| terrain.ground_height(Vec3::new(p.x, p.y, p.z + LOS_EYE_HEIGHT), DEFAULT_HEIGHT_SEARCH);
    if let Some(z) = ground_at(dest) {
        dest.z = z;
    }
    if let Some(hit) = terrain.object_hit_pos(start + eye, dest + eye, COLLISION_CONTACT_DISTANCE) {
        dest = hit - eye;
        if let Some(z) = ground_at(dest) {
            dest.z = z;
        }
    }
    Position::with_orientation(dest.x, dest.y, dest.z, angle)
}

/// Terrain without geometry: always visible, no ground data.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenTerrain;

impl TerrainQuery for OpenTerrain {
    fn is_in_line_of_sight(&self, _from: Vec3, _to: Vec3) -> bool {
        true
    }

    fn object_hit_pos(&self, _from: Vec3, _to: Vec3, _modify_dist: f32) -> Option<Vec3> {
        None
    }

    fn ground_height(&self, _p: Vec3, _max_search: f32) -> Option<f32> {
        None
    }
}
