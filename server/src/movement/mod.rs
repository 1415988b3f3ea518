// world_server_core/server/src/movement/mod.rs
//! Creature motion: generator flags, path generation, spline playback and
//! random wandering.

pub mod flags;
pub mod path;
pub mod random;
pub mod spline;
