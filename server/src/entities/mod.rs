// world_server_core/server/src/entities/mod.rs
pub mod creature;
pub mod player;
pub mod world_object;
