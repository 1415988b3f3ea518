// world_server_core/server/src/operational/mod.rs
pub mod monitoring;
