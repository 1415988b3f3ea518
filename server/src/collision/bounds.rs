// world_server_core/server/src/collision/bounds.rs
use crate::core::types::Vec3;
use rstar::AABB;

/// Axis aligned box, inclusive on both corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub lo: Vec3,
    pub hi: Vec3,
}

impl Aabb {
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Aabb { lo: a.inf(&b), hi: a.sup(&b) }
    }

    pub fn empty() -> Self {
        Aabb {
            lo: Vec3::repeat(f32::INFINITY),
            hi: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lo.x > self.hi.x || self.lo.y > self.hi.y || self.lo.z > self.hi.z
    }

    pub fn merge_point(&mut self, p: &Vec3) {
        self.lo = self.lo.inf(p);
        self.hi = self.hi.sup(p);
    }

    pub fn contains(&self, p: &Vec3) -> bool {
        p.x >= self.lo.x && p.x <= self.hi.x
            && p.y >= self.lo.y && p.y <= self.hi.y
            && p.z >= self.lo.z && p.z <= self.hi.z
    }

    pub fn contains_xy(&self, p: &Vec3) -> bool {
        p.x >= self.lo.x && p.x <= self.hi.x && p.y >= self.lo.y && p.y <= self.hi.y
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (l, h) = (self.lo, self.hi);
        [
            Vec3::new(l.x, l.y, l.z),
            Vec3::new(h.x, l.y, l.z),
            Vec3::new(l.x, h.y, l.z),
            Vec3::new(h.x, h.y, l.z),
            Vec3::new(l.x, l.y, h.z),
            Vec3::new(h.x, l.y, h.z),
            Vec3::new(l.x, h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
        ]
    }

    pub fn to_envelope(&self) -> AABB<[f32; 3]> {
        AABB::from_corners([self.lo.x, self.lo.y, self.lo.z], [self.hi.x, self.hi.y, self.hi.z])
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    /// Returns `None` for a zero-length direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let len = direction.norm();
        if !len.is_finite() || len <= f32::EPSILON {
            return None;
        }
        Some(Ray { origin, direction: direction / len })
    }

    pub fn between(from: Vec3, to: Vec3) -> Option<(Self, f32)> {
        let delta = to - from;
        Ray::new(from, delta).map(|r| (r, delta.norm()))
    }

    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Entry time into `bound` along the ray, zero when starting inside,
    /// infinite on a miss.
    pub fn intersection_time(&self, bound: &Aabb) -> f32 {
        let mut t_min = 0.0f32;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let o = self.origin[axis];
            let d = self.direction[axis];
            let (lo, hi) = (bound.lo[axis], bound.hi[axis]);
            if d.abs() < 1.0e-12 {
                if o < lo || o > hi {
                    return f32::INFINITY;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (lo - o) * inv;
            let mut t1 = (hi - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return f32::INFINITY;
            }
        }
        t_min
    }

    /// Moller-Trumbore. Returns the hit distance when it is below `max_dist`.
    pub fn intersect_triangle(&self, a: &Vec3, b: &Vec3, c: &Vec3, max_dist: f32) -> Option<f32> {
        const EPS: f32 = 1.0e-6;
        let e1 = b - a;
        let e2 = c - a;
        let p = self.direction.cross(&e2);
        let det = e1.dot(&p);
        if det.abs() < EPS {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(&e1);
        let v = self.direction.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(&q) * inv_det;
        if t > EPS && t < max_dist {
            Some(t)
        } else {
            None
        }
    }
}
