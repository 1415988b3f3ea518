// world_server_core/server/src/systems/mod.rs
pub mod ai;
pub mod scenario;
pub mod scheduler;
