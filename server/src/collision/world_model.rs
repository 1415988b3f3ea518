// world_server_core/server/src/collision/world_model.rs
//! Shared static geometry. One `WorldModel` is loaded per model file and
//! referenced by every instance that spawns it.

use super::bounds::{Aabb, Ray};
use crate::core::types::Vec3;

/// Query filters applied to whole models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ModelIgnoreFlags(pub u8);

impl ModelIgnoreFlags {
    pub const NOTHING: ModelIgnoreFlags = ModelIgnoreFlags(0);
    pub const M2: ModelIgnoreFlags = ModelIgnoreFlags(1 << 0);

    pub fn contains(&self, other: ModelIgnoreFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

/// Horizontal liquid surface over a rectangle of the group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LiquidPlane {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
    pub height: f32,
    pub liquid_type: u32,
}

impl LiquidPlane {
    fn level_at(&self, p: &Vec3) -> Option<f32> {
        (p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y)
            .then_some(self.height)
    }
}

#[derive(Clone, Debug)]
pub struct GroupModel {
    bound: Aabb,
    pub mogp_flags: u32,
    pub group_wmo_id: u32,
    triangles: Vec<Triangle>,
    liquid: Option<LiquidPlane>,
}

impl GroupModel {
    pub fn new(mogp_flags: u32, group_wmo_id: u32, triangles: Vec<Triangle>, liquid: Option<LiquidPlane>) -> Self {
        let mut bound = Aabb::empty();
        for t in &triangles {
            bound.merge_point(&t.a);
            bound.merge_point(&t.b);
            bound.merge_point(&t.c);
        }
        GroupModel { bound, mogp_flags, group_wmo_id, triangles, liquid }
    }

    /// Closed box made of twelve triangles.
    pub fn solid_box(lo: Vec3, hi: Vec3, group_wmo_id: u32) -> Self {
        let c = Aabb::new(lo, hi).corners();
        let quads = [
            [0, 1, 3, 2], // bottom
            [4, 6, 7, 5], // top
            [0, 4, 5, 1],
            [2, 3, 7, 6],
            [0, 2, 6, 4],
            [1, 5, 7, 3],
        ];
        let triangles = quads
            .iter()
            .flat_map(|q| {
                [
                    Triangle { a: c[q[0]], b: c[q[1]], c: c[q[2]] },
                    Triangle { a: c[q[0]], b: c[q[2]], c: c[q[3]] },
                ]
            })
            .collect();
        GroupModel::new(0, group_wmo_id, triangles, None)
    }

    pub fn with_liquid(mut self, liquid: LiquidPlane) -> Self {
        self.bound.merge_point(&Vec3::new(liquid.min_x, liquid.min_y, liquid.height));
        self.bound.merge_point(&Vec3::new(liquid.max_x, liquid.max_y, liquid.height));
        self.liquid = Some(liquid);
        self
    }

    pub fn bound(&self) -> &Aabb {
        &self.bound
    }

    fn intersect_ray(&self, ray: &Ray, max_dist: &mut f32, stop_at_first: bool) -> bool {
        if self.triangles.is_empty() || ray.intersection_time(&self.bound) > *max_dist {
            return false;
        }
        let mut hit = false;
        for t in &self.triangles {
            if let Some(d) = ray.intersect_triangle(&t.a, &t.b, &t.c, *max_dist) {
                *max_dist = d;
                hit = true;
                if stop_at_first {
                    break;
                }
            }
        }
        hit
    }

    pub fn liquid_level(&self, p: &Vec3) -> Option<f32> {
        self.liquid.as_ref().and_then(|l| l.level_at(p))
    }
}

/// Which group of a model a point query landed in.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GroupLocationInfo {
    pub root_id: u32,
    pub group_index: Option<usize>,
    pub mogp_flags: u32,
    pub group_wmo_id: u32,
}

#[derive(Clone, Debug)]
pub struct WorldModel {
    pub root_wmo_id: u32,
    /// Doodad (M2) geometry. Never carries area information.
    pub is_m2: bool,
    groups: Vec<GroupModel>,
    bound: Aabb,
}

impl WorldModel {
    pub fn new(root_wmo_id: u32, is_m2: bool, groups: Vec<GroupModel>) -> Self {
        let mut bound = Aabb::empty();
        for g in &groups {
            if !g.bound.is_empty() {
                bound.merge_point(&g.bound.lo);
                bound.merge_point(&g.bound.hi);
            }
        }
        WorldModel { root_wmo_id, is_m2, groups, bound }
    }

    pub fn bound(&self) -> &Aabb {
        &self.bound
    }

    pub fn groups(&self) -> &[GroupModel] {
        &self.groups
    }

    /// Ray test in object space. `max_dist` shrinks to the nearest hit.
    pub fn intersect_ray(&self, ray: &Ray, max_dist: &mut f32, stop_at_first: bool, ignore: ModelIgnoreFlags) -> bool {
        if self.is_m2 && ignore.contains(ModelIgnoreFlags::M2) {
            return false;
        }
        let mut hit = false;
        for group in &self.groups {
            if group.intersect_ray(ray, max_dist, stop_at_first) {
                hit = true;
                if stop_at_first {
                    break;
                }
            }
        }
        hit
    }

    /// Casts from `p` along `down` and reports the nearest group below.
    pub fn intersect_point(&self, p: &Vec3, down: &Vec3, z_dist: &mut f32, info: &mut GroupLocationInfo) -> bool {
        let ray = match Ray::new(*p, *down) {
            Some(r) => r,
            None => return false,
        };
        let mut found = false;
        for (idx, group) in self.groups.iter().enumerate() {
            if !group.bound.contains_xy(p) {
                continue;
            }
            let mut dist = *z_dist;
            if group.intersect_ray(&ray, &mut dist, false) && dist < *z_dist {
                *z_dist = dist;
                *info = GroupLocationInfo {
                    root_id: self.root_wmo_id,
                    group_index: Some(idx),
                    mogp_flags: group.mogp_flags,
                    group_wmo_id: group.group_wmo_id,
                };
                found = true;
            }
        }
        found
    }

    pub fn liquid_level(&self, p: &Vec3, info: &GroupLocationInfo) -> Option<f32> {
        info.group_index
            .and_then(|idx| self.groups.get(idx))
            .and_then(|g| g.liquid_level(p))
    }
}
