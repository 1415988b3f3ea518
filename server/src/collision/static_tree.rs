// world_server_core/server/src/collision/static_tree.rs
use super::bounds::Ray;
use super::catalog::{read_tile, GeometryCatalog};
use super::model_instance::{AreaInfo, LocationInfo, ModelInstance};
use super::model_store::ModelStore;
use super::world_model::ModelIgnoreFlags;
use super::TerrainQuery;
use crate::core::types::{MapId, Vec3};
use crate::world::grid::GridCoord;
use ahash::AHashMap;
use rstar::{RTree, RTreeObject, AABB};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Clone, Debug)]
struct IndexedBound {
    envelope: AABB<[f32; 3]>,
    spawn_id: u32,
}

impl RTreeObject for IndexedBound {
    type Envelope = AABB<[f32; 3]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

struct TreeEntry {
    instance: ModelInstance,
    refs: u32,
}

/// Static geometry of one map, streamed in per catalog tile.
pub struct StaticMapTree {
    map_id: MapId,
    catalog: Arc<GeometryCatalog>,
    models: Arc<ModelStore>,
    instances: AHashMap<u32, TreeEntry>,
    loaded_tiles: AHashMap<(u32, u32), Vec<u32>>,
    rtree: RTree<IndexedBound>,
    los_ignore: ModelIgnoreFlags,
}

impl StaticMapTree {
    pub fn new(map_id: MapId, catalog: Arc<GeometryCatalog>, models: Arc<ModelStore>, los_ignore_m2: bool) -> Self {
        StaticMapTree {
            map_id,
            catalog,
            models,
            instances: AHashMap::new(),
            loaded_tiles: AHashMap::new(),
            rtree: RTree::new(),
            los_ignore: if los_ignore_m2 { ModelIgnoreFlags::M2 } else { ModelIgnoreFlags::NOTHING },
        }
    }

    pub fn is_tile_loaded(&self, grid: GridCoord) -> bool {
        self.loaded_tiles.contains_key(&grid.tile())
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn instance(&self, spawn_id: u32) -> Option<&ModelInstance> {
        self.instances.get(&spawn_id).map(|e| &e.instance)
    }

    /// Streams in the catalog tile covering `grid`. Returns the number of
    /// spawns referenced by the tile.
    pub fn load_tile(&mut self, grid: GridCoord) -> usize {
        let tile = grid.tile();
        if self.loaded_tiles.contains_key(&tile) {
            return self.loaded_tiles[&tile].len();
        }
        let data = match self.catalog.tile(self.map_id, tile.0, tile.1) {
            Some(d) => d,
            None => {
                self.loaded_tiles.insert(tile, Vec::new());
                return 0;
            }
        };

        let mut referenced = Vec::new();
        for spawn in read_tile(data) {
            let id = spawn.id;
            if let Some(entry) = self.instances.get_mut(&id) {
                entry.refs += 1;
                referenced.push(id);
                continue;
            }
            let model = self.models.acquire(&spawn.name);
            if model.is_none() {
                warn!("[StaticTree] map {} spawn {} references missing model {}", self.map_id, id, spawn.name);
                continue;
            }
            self.instances.insert(id, TreeEntry { instance: ModelInstance::new(spawn, model), refs: 1 });
            referenced.push(id);
        }

        let count = referenced.len();
        self.loaded_tiles.insert(tile, referenced);
        self.rebuild();
        debug!("[StaticTree] map {} tile {:?} loaded with {} spawns", self.map_id, tile, count);
        count
    }

    pub fn unload_tile(&mut self, grid: GridCoord) {
        let tile = grid.tile();
        let Some(ids) = self.loaded_tiles.remove(&tile) else {
            return;
        };
        for id in ids {
            let gone = match self.instances.get_mut(&id) {
                Some(entry) => {
                    entry.refs -= 1;
                    if entry.refs == 0 {
                        entry.instance.set_unloaded();
                        true
                    } else {
                        false
                    }
                }
                None => false,
            };
            if gone {
                self.instances.remove(&id);
            }
        }
        self.rebuild();
        debug!("[StaticTree] map {} tile {:?} unloaded", self.map_id, tile);
    }

    pub fn unload_all(&mut self) {
        for entry in self.instances.values_mut() {
            entry.instance.set_unloaded();
        }
        self.instances.clear();
        self.loaded_tiles.clear();
        self.rtree = RTree::new();
    }

    fn rebuild(&mut self) {
        let bounds: Vec<IndexedBound> = self
            .instances
            .iter()
            .filter(|(_, e)| e.instance.is_loaded())
            .map(|(&spawn_id, e)| IndexedBound { envelope: e.instance.bound().to_envelope(), spawn_id })
            .collect();
        self.rtree = RTree::bulk_load(bounds);
        trace!("[StaticTree] map {} index rebuilt with {} bounds", self.map_id, self.rtree.size());
    }

    fn candidates(&self, lo: Vec3, hi: Vec3) -> SmallVec<[&ModelInstance; 8]> {
        let query = AABB::from_corners([lo.x, lo.y, lo.z], [hi.x, hi.y, hi.z]);
        self.rtree
            .locate_in_envelope_intersecting(&query)
            .filter_map(|b| self.instances.get(&b.spawn_id).map(|e| &e.instance))
            .collect()
    }

    /// Nearest hit along `ray` within `max_dist`.
    pub fn intersect_ray(&self, ray: &Ray, max_dist: f32, stop_at_first: bool, ignore: ModelIgnoreFlags) -> Option<f32> {
        if max_dist <= 0.0 || !max_dist.is_finite() {
            return None;
        }
        let end = ray.point_at(max_dist);
        let mut best: Option<f32> = None;
        for inst in self.candidates(ray.origin.inf(&end), ray.origin.sup(&end)) {
            let limit = best.unwrap_or(max_dist);
            if let Some(d) = inst.intersect_ray(ray, limit, stop_at_first, ignore) {
                best = Some(d);
                if stop_at_first {
                    break;
                }
            }
        }
        best
    }

    pub fn is_in_line_of_sight(&self, from: Vec3, to: Vec3, ignore: ModelIgnoreFlags) -> bool {
        match Ray::between(from, to) {
            Some((ray, dist)) => self.intersect_ray(&ray, dist, true, ignore).is_none(),
            None => true,
        }
    }

    /// First collision between `from` and `to`, pulled back by `modify_dist`
    /// toward `from`.
    pub fn get_object_hit_pos(&self, from: Vec3, to: Vec3, modify_dist: f32) -> Option<Vec3> {
        let (ray, dist) = Ray::between(from, to)?;
        let hit = self.intersect_ray(&ray, dist, false, ModelIgnoreFlags::NOTHING)?;
        Some(ray.point_at((hit - modify_dist).max(0.0)))
    }

    /// Height of the first surface below `p`, searching `max_search` down.
    pub fn get_height(&self, p: Vec3, max_search: f32) -> Option<f32> {
        let ray = Ray::new(p, Vec3::new(0.0, 0.0, -1.0))?;
        self.intersect_ray(&ray, max_search, false, ModelIgnoreFlags::NOTHING)
            .map(|d| p.z - d)
    }

    pub fn get_area_info(&self, p: Vec3) -> Option<AreaInfo> {
        let mut info = AreaInfo::default();
        for inst in self.candidates(p, p) {
            inst.intersect_point(&p, &mut info);
        }
        info.result.then_some(info)
    }

    pub fn get_location_info(&self, p: Vec3) -> Option<LocationInfo> {
        let mut info = LocationInfo::default();
        let mut found = false;
        for inst in self.candidates(p, p) {
            found |= inst.get_location_info(&p, &mut info);
        }
        found.then_some(info)
    }

    pub fn get_liquid_level(&self, p: Vec3) -> Option<f32> {
        let info = self.get_location_info(p)?;
        let inst = self.instance(info.hit_instance?)?;
        inst.get_liquid_level(&p, &info.hit_model)
    }
}

impl TerrainQuery for StaticMapTree {
    fn is_in_line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        StaticMapTree::is_in_line_of_sight(self, from, to, self.los_ignore)
    }

    fn object_hit_pos(&self, from: Vec3, to: Vec3, modify_dist: f32) -> Option<Vec3> {
        self.get_object_hit_pos(from, to, modify_dist)
    }

    fn ground_height(&self, p: Vec3, max_search: f32) -> Option<f32> {
        self.get_height(p, max_search)
    }
}
