// world_server_core/server/src/concurrent/thread_pools.rs
use crate::core::config::ThreadPoolConfig;
use crate::core::error::{ServerError, ServerResult};
use crate::world::map::Map;
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs one map update per worker. `update_all` returns once every map of the
/// batch has finished.
pub struct MapUpdater {
    pool: Option<ThreadPool>,
}

impl MapUpdater {
    pub fn new(config: &ThreadPoolConfig) -> ServerResult<Self> {
        if config.map_update_threads == 0 {
            warn!("Map update pool configured with 0 threads, maps update on the world thread");
            return Ok(MapUpdater { pool: None });
        }
        let pool = Self::create_pool("map-update", config.map_update_threads)?;
        Ok(MapUpdater { pool: Some(pool) })
    }

    fn create_pool(name_str: &str, num_threads: usize) -> ServerResult<ThreadPool> {
        let name_for_thread_name = name_str.to_string();
        let name_for_start_handler = name_str.to_string();

        ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(move |i| format!("{}-{}", name_for_thread_name, i))
            .start_handler(move |idx| {
                debug!("Worker {}-{} started", name_for_start_handler, idx);
            })
            .build()
            .map_err(|e| ServerError::ThreadingError(format!("Failed to build {} pool: {}", name_str, e)))
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    pub fn update_all(&self, maps: &[Arc<Mutex<Map>>], diff: u32) {
        match &self.pool {
            Some(pool) => pool.install(|| {
                maps.par_iter().for_each(|map| map.lock().update(diff));
            }),
            None => {
                for map in maps {
                    map.lock().update(diff);
                }
            }
        }
    }
}
