// world_server_core/server/src/core/mod.rs
pub mod config;
pub mod constants;
pub mod error;
pub mod timer;
pub mod types;
