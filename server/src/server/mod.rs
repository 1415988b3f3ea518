// world_server_core/server/src/server/mod.rs
pub mod game_loop;
pub mod instance;
