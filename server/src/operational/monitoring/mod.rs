// world_server_core/server/src/operational/monitoring/mod.rs
pub mod metrics;
