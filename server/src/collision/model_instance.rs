// world_server_core/server/src/collision/model_instance.rs
use super::bounds::{Aabb, Ray};
use super::world_model::{GroupLocationInfo, ModelIgnoreFlags, WorldModel};
use crate::core::error::CatalogError;
use crate::core::types::Vec3;
use bytes::{Buf, BufMut};
use nalgebra::Rotation3;
use std::f32::consts::PI;
use std::sync::Arc;

pub const MOD_M2: u8 = 1 << 0;
pub const MOD_HAS_BOUND: u8 = 1 << 1;
pub const MOD_PARENT_SPAWN: u8 = 1 << 2;

const MAX_MODEL_NAME_LEN: u32 = 500;
const SPAWN_FIXED_LEN: usize = 1 + 1 + 4 + 12 + 12 + 4;
const BOUND_LEN: usize = 24;

/// Placement of one model as stored in the geometry catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpawn {
    pub flags: u8,
    pub adt_id: u8,
    pub id: u32,
    pub position: Vec3,
    /// Degrees. x pitch, y yaw, z roll.
    pub rotation: Vec3,
    pub scale: f32,
    pub bound: Option<Aabb>,
    pub name: String,
}

fn ensure(buf: &impl Buf, needed: usize) -> Result<(), CatalogError> {
    if buf.remaining() < needed {
        Err(CatalogError::Truncated { needed, available: buf.remaining() })
    } else {
        Ok(())
    }
}

fn get_vec3(buf: &mut impl Buf) -> Vec3 {
    let x = buf.get_f32_le();
    let y = buf.get_f32_le();
    let z = buf.get_f32_le();
    Vec3::new(x, y, z)
}

fn put_vec3(buf: &mut impl BufMut, v: &Vec3) {
    buf.put_f32_le(v.x);
    buf.put_f32_le(v.y);
    buf.put_f32_le(v.z);
}

impl ModelSpawn {
    pub fn is_m2(&self) -> bool {
        self.flags & MOD_M2 != 0
    }

    pub fn read(buf: &mut impl Buf) -> Result<ModelSpawn, CatalogError> {
        ensure(buf, SPAWN_FIXED_LEN)?;
        let flags = buf.get_u8();
        let adt_id = buf.get_u8();
        let id = buf.get_u32_le();
        let position = get_vec3(buf);
        let rotation = get_vec3(buf);
        let scale = buf.get_f32_le();

        let bound = if flags & MOD_HAS_BOUND != 0 {
            ensure(buf, BOUND_LEN)?;
            let lo = get_vec3(buf);
            let hi = get_vec3(buf);
            Some(Aabb::new(lo, hi))
        } else {
            None
        };

        ensure(buf, 4)?;
        let name_len = buf.get_u32_le();
        if name_len > MAX_MODEL_NAME_LEN {
            return Err(CatalogError::NameTooLong(name_len));
        }
        ensure(buf, name_len as usize)?;
        let mut raw = vec![0u8; name_len as usize];
        buf.copy_to_slice(&mut raw);
        let name = String::from_utf8(raw).map_err(|_| CatalogError::InvalidName)?;

        Ok(ModelSpawn { flags, adt_id, id, position, rotation, scale, bound, name })
    }

    pub fn write(&self, buf: &mut impl BufMut) {
        let mut flags = self.flags & !MOD_HAS_BOUND;
        if self.bound.is_some() {
            flags |= MOD_HAS_BOUND;
        }
        buf.put_u8(flags);
        buf.put_u8(self.adt_id);
        buf.put_u32_le(self.id);
        put_vec3(buf, &self.position);
        put_vec3(buf, &self.rotation);
        buf.put_f32_le(self.scale);
        if let Some(b) = &self.bound {
            put_vec3(buf, &b.lo);
            put_vec3(buf, &b.hi);
        }
        buf.put_u32_le(self.name.len() as u32);
        buf.put_slice(self.name.as_bytes());
    }
}

/// Best ground hit found by a point query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaInfo {
    pub result: bool,
    pub ground_z: f32,
    pub adt_id: u8,
    pub flags: u32,
    pub root_id: u32,
    pub group_id: u32,
}

impl Default for AreaInfo {
    fn default() -> Self {
        AreaInfo { result: false, ground_z: f32::NEG_INFINITY, adt_id: 0, flags: 0, root_id: 0, group_id: 0 }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocationInfo {
    pub ground_z: f32,
    /// Spawn id of the instance that produced the ground hit.
    pub hit_instance: Option<u32>,
    pub hit_model: GroupLocationInfo,
}

impl Default for LocationInfo {
    fn default() -> Self {
        LocationInfo { ground_z: f32::NEG_INFINITY, hit_instance: None, hit_model: GroupLocationInfo::default() }
    }
}

/// A spawn bound to its shared model with the transform precomputed.
#[derive(Clone, Debug)]
pub struct ModelInstance {
    spawn: ModelSpawn,
    bound: Aabb,
    rot: Rotation3<f32>,
    inv_rot: Rotation3<f32>,
    inv_scale: f32,
    model: Option<Arc<WorldModel>>,
}

impl ModelInstance {
    pub fn new(spawn: ModelSpawn, model: Option<Arc<WorldModel>>) -> Self {
        let to_rad = |deg: f32| deg * PI / 180.0;
        // yaw about z, then pitch about y, then roll about x
        let rot = Rotation3::from_euler_angles(
            to_rad(spawn.rotation.z),
            to_rad(spawn.rotation.x),
            to_rad(spawn.rotation.y),
        );
        let inv_rot = rot.inverse();
        let inv_scale = if spawn.scale != 0.0 { 1.0 / spawn.scale } else { 1.0 };

        let bound = match (&spawn.bound, &model) {
            (Some(b), _) => *b,
            (None, Some(m)) if !m.bound().is_empty() => {
                let mut world = Aabb::empty();
                for corner in m.bound().corners() {
                    world.merge_point(&(rot * (corner * spawn.scale) + spawn.position));
                }
                world
            }
            _ => Aabb::new(spawn.position, spawn.position),
        };

        ModelInstance { spawn, bound, rot, inv_rot, inv_scale, model }
    }

    pub fn spawn(&self) -> &ModelSpawn {
        &self.spawn
    }

    pub fn id(&self) -> u32 {
        self.spawn.id
    }

    pub fn bound(&self) -> &Aabb {
        &self.bound
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn set_unloaded(&mut self) {
        self.model = None;
    }

    fn to_model_space(&self, p: &Vec3) -> Vec3 {
        self.inv_rot * ((p - self.spawn.position) * self.inv_scale)
    }

    /// Nearest hit distance along `ray`, never above `max_dist`.
    pub fn intersect_ray(&self, ray: &Ray, max_dist: f32, stop_at_first: bool, ignore: ModelIgnoreFlags) -> Option<f32> {
        let model = self.model.as_ref()?;
        let time = ray.intersection_time(&self.bound);
        if time.is_infinite() || time > max_dist {
            return None;
        }

        let model_ray = Ray {
            origin: self.to_model_space(&ray.origin),
            direction: self.inv_rot * ray.direction,
        };
        let mut distance = max_dist * self.inv_scale;
        if model.intersect_ray(&model_ray, &mut distance, stop_at_first, ignore) {
            Some((distance * self.spawn.scale).min(max_dist))
        } else {
            None
        }
    }

    // Shared by the point queries: downward cast in object space.
    fn ground_below(&self, p: &Vec3) -> Option<(f32, GroupLocationInfo)> {
        let model = self.model.as_ref()?;
        if self.spawn.is_m2() || !self.bound.contains(p) {
            return None;
        }
        let p_model = self.to_model_space(p);
        let z_dir = self.inv_rot * Vec3::new(0.0, 0.0, -1.0);
        let mut z_dist = f32::INFINITY;
        let mut group = GroupLocationInfo::default();
        if !model.intersect_point(&p_model, &z_dir, &mut z_dist, &mut group) {
            return None;
        }
        let model_ground = p_model + z_dir * z_dist;
        let world_z = (self.rot * (model_ground * self.spawn.scale) + self.spawn.position).z;
        Some((world_z, group))
    }

    /// Raises `info` to this model's ground when it is higher.
    pub fn intersect_point(&self, p: &Vec3, info: &mut AreaInfo) {
        if let Some((world_z, group)) = self.ground_below(p) {
            if info.ground_z < world_z {
                info.result = true;
                info.ground_z = world_z;
                info.adt_id = self.spawn.adt_id;
                info.flags = group.mogp_flags;
                info.root_id = group.root_id;
                info.group_id = group.group_wmo_id;
            }
        }
    }

    /// Same as `intersect_point` but remembers which instance was hit.
    pub fn get_location_info(&self, p: &Vec3, info: &mut LocationInfo) -> bool {
        match self.ground_below(p) {
            Some((world_z, group)) if info.ground_z < world_z => {
                info.ground_z = world_z;
                info.hit_instance = Some(self.spawn.id);
                info.hit_model = group;
                true
            }
            _ => false,
        }
    }

    /// World height of the liquid surface in the group recorded in `group`.
    pub fn get_liquid_level(&self, p: &Vec3, group: &GroupLocationInfo) -> Option<f32> {
        let model = self.model.as_ref()?;
        let p_model = self.to_model_space(p);
        model
            .liquid_level(&p_model, group)
            .map(|z_dist| z_dist * self.spawn.scale + self.spawn.position.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::world_model::{GroupModel, LiquidPlane};
    use bytes::BytesMut;
    use proptest::prelude::*;

    fn box_model() -> Arc<WorldModel> {
        let group = GroupModel::solid_box(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 2.0), 11).with_liquid(LiquidPlane {
            min_x: -1.0,
            min_y: -1.0,
            max_x: 1.0,
            max_y: 1.0,
            height: 1.5,
            liquid_type: 1,
        });
        Arc::new(WorldModel::new(3, false, vec![group]))
    }

    fn spawn_at(pos: Vec3, rot: Vec3, scale: f32) -> ModelSpawn {
        ModelSpawn {
            flags: 0,
            adt_id: 9,
            id: 42,
            position: pos,
            rotation: rot,
            scale,
            bound: None,
            name: "crate.wmo".to_string(),
        }
    }

    #[test]
    fn spawn_bytes_decode() {
        let mut spawn = spawn_at(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 90.0, 0.0), 1.5);
        spawn.bound = Some(Aabb::new(Vec3::zeros(), Vec3::repeat(4.0)));
        let mut buf = BytesMut::new();
        spawn.write(&mut buf);
        let decoded = ModelSpawn::read(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.flags & MOD_HAS_BOUND, MOD_HAS_BOUND);
        assert_eq!(decoded, ModelSpawn { flags: MOD_HAS_BOUND, ..spawn });
    }

    #[test]
    fn truncated_record_is_an_error() {
        let mut buf = BytesMut::new();
        spawn_at(Vec3::zeros(), Vec3::zeros(), 1.0).write(&mut buf);
        let mut short = buf.freeze().slice(0..20);
        assert!(matches!(ModelSpawn::read(&mut short), Err(CatalogError::Truncated { .. })));
    }

    #[test]
    fn scaled_and_rotated_hit_distance() {
        // yaw 90 degrees, scale 2: box covers x in [8, 12], y in [-2, 2], z in [0, 4]
        let inst = ModelInstance::new(spawn_at(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 90.0, 0.0), 2.0), Some(box_model()));
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0)).unwrap();
        let d = inst.intersect_ray(&ray, 100.0, false, ModelIgnoreFlags::NOTHING).unwrap();
        assert!((d - 8.0).abs() < 1.0e-3, "got {}", d);
        assert!(inst.intersect_ray(&ray, 5.0, false, ModelIgnoreFlags::NOTHING).is_none());
    }

    #[test]
    fn unloaded_model_never_hits() {
        let mut inst = ModelInstance::new(spawn_at(Vec3::new(10.0, 0.0, 0.0), Vec3::zeros(), 1.0), Some(box_model()));
        inst.set_unloaded();
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert!(inst.intersect_ray(&ray, 100.0, false, ModelIgnoreFlags::NOTHING).is_none());
        let mut info = AreaInfo::default();
        inst.intersect_point(&Vec3::new(10.0, 0.0, 1.9), &mut info);
        assert!(!info.result);
    }

    #[test]
    fn point_query_keeps_higher_ground() {
        let inst = ModelInstance::new(spawn_at(Vec3::new(0.0, 0.0, 0.0), Vec3::zeros(), 1.0), Some(box_model()));
        let mut info = AreaInfo::default();
        inst.intersect_point(&Vec3::new(0.0, 0.0, 1.9), &mut info);
        assert!(info.result);
        assert!(info.ground_z.abs() < 1.0e-4);
        assert_eq!(info.adt_id, 9);

        let mut higher = AreaInfo { ground_z: 5.0, ..AreaInfo::default() };
        inst.intersect_point(&Vec3::new(0.0, 0.0, 1.9), &mut higher);
        assert!(!higher.result);

        let mut loc = LocationInfo::default();
        assert!(inst.get_location_info(&Vec3::new(0.0, 0.0, 1.9), &mut loc));
        assert_eq!(loc.hit_instance, Some(42));
        let liquid = inst.get_liquid_level(&Vec3::new(0.0, 0.0, 1.9), &loc.hit_model).unwrap();
        assert!((liquid - 1.5).abs() < 1.0e-4);
    }

    #[test]
    fn m2_spawns_skip_point_queries() {
        let mut spawn = spawn_at(Vec3::zeros(), Vec3::zeros(), 1.0);
        spawn.flags = MOD_M2;
        let inst = ModelInstance::new(spawn, Some(box_model()));
        let mut info = AreaInfo::default();
        inst.intersect_point(&Vec3::new(0.0, 0.0, 1.9), &mut info);
        assert!(!info.result);
    }

    proptest! {
        #[test]
        fn hit_distance_never_exceeds_max(
            ox in -30.0f32..30.0, oy in -30.0f32..30.0, oz in -5.0f32..10.0,
            dx in -1.0f32..1.0, dy in -1.0f32..1.0, dz in -1.0f32..1.0,
            yaw in 0.0f32..360.0, scale in 0.25f32..4.0, max in 0.1f32..60.0,
        ) {
            let inst = ModelInstance::new(spawn_at(Vec3::new(5.0, 5.0, 0.0), Vec3::new(0.0, yaw, 0.0), scale), Some(box_model()));
            if let Some(ray) = Ray::new(Vec3::new(ox, oy, oz), Vec3::new(dx, dy, dz)) {
                let bound_time = ray.intersection_time(inst.bound());
                match inst.intersect_ray(&ray, max, false, ModelIgnoreFlags::NOTHING) {
                    Some(d) => {
                        prop_assert!(d <= max);
                        prop_assert!(bound_time.is_finite());
                    }
                    None => {}
                }
                if bound_time.is_infinite() {
                    prop_assert!(inst.intersect_ray(&ray, max, false, ModelIgnoreFlags::NOTHING).is_none());
                }
            }
        }
    }
}
