// world_server_core/server/src/lib.rs
//! Persistent-world server core: grid-partitioned maps with dynamic cell
//! loading, instancing, static collision queries and creature movement.

pub mod collision;
pub mod concurrent;
pub mod core;
pub mod entities;
pub mod movement;
pub mod operational;
pub mod server;
pub mod systems;
pub mod world;

pub use crate::server::instance::WorldServer;
pub use crate::world::context::WorldContext;
pub use crate::world::map::Map;
pub use crate::world::map_manager::MapManager;
