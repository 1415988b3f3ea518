// world_server_core/server/src/collision/mod.rs
//! Static geometry queries: shared models, per-spawn instances and the
//! per-map tree that streams them with the grid.

pub mod bounds;
pub mod catalog;
pub mod model_instance;
pub mod model_store;
pub mod static_tree;
pub mod world_model;

use crate::core::types::Vec3;

/// Terrain queries needed by movement. Implemented by the static map tree;
/// tests may substitute flat or walled worlds.
pub trait TerrainQuery {
    fn is_in_line_of_sight(&self, from: Vec3, to: Vec3) -> bool;
    fn object_hit_pos(&self, from: Vec3, to: Vec3, modify_dist: f32) -> Option<Vec3>;
    fn ground_height(&self, p: Vec3, max_search: f32) -> Option<f32>;
}
