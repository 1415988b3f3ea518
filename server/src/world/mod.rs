// world_server_core/server/src/world/mod.rs
pub mod cell;
pub mod content;
pub mod context;
pub mod grid;
pub mod instance_ids;
pub mod map;
pub mod map_manager;
pub mod spawn_store;
