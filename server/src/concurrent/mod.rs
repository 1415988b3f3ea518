// world_server_core/server/src/concurrent/mod.rs
pub mod mutation_queue;
pub mod thread_pools;
