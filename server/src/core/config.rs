// world_server_core/server/src/core/config.rs
use super::constants::*;
use super::error::{ServerError, ServerResult};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    /// Workers for parallel map updates. Zero updates maps on the calling thread.
    pub map_update_threads: usize,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        ThreadPoolConfig {
            map_update_threads: num_cpus::get().min(8),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub tick_rate: u64,
    pub map_update_interval_ms: u32,
    pub grid_cleanup_delay_ms: u32,
    pub instance_unload_delay_ms: u32,
    pub thread_pools: ThreadPoolConfig,
    /// Highest content expansion enabled on this realm.
    pub expansion: u8,
    /// When set, raid maps of the current expansion do not require a raid group.
    pub instance_ignore_raid: bool,
    pub max_instances_per_hour: u32,
    /// Line of sight queries skip M2 (doodad) models.
    pub los_ignore_m2: bool,
    pub metrics_port: Option<u16>,
    /// Fixed seed for per-map random generators. Unset seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            tick_rate: SERVER_TICK_RATE,
            map_update_interval_ms: TICK_DURATION_MS as u32,
            grid_cleanup_delay_ms: DEFAULT_GRID_CLEANUP_DELAY_MS,
            instance_unload_delay_ms: DEFAULT_INSTANCE_UNLOAD_DELAY_MS,
            thread_pools: ThreadPoolConfig::default(),
            expansion: 2,
            instance_ignore_raid: false,
            max_instances_per_hour: DEFAULT_MAX_INSTANCES_PER_HOUR,
            los_ignore_m2: true,
            metrics_port: None,
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    /// Reads a YAML config. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let mut config: ServerConfig = serde_yaml::from_str(&text)
            .map_err(|e| ServerError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.clamp_timings();
        info!("Loaded server config from {}", path.display());
        Ok(config)
    }

    /// Raises timings below their floors.
    pub fn clamp_timings(&mut self) {
        if self.map_update_interval_ms < MIN_MAP_UPDATE_DELAY_MS {
            warn!("map_update_interval_ms {} below minimum, clamped", self.map_update_interval_ms);
            self.map_update_interval_ms = MIN_MAP_UPDATE_DELAY_MS;
        }
        if self.grid_cleanup_delay_ms < MIN_GRID_DELAY_MS {
            warn!("grid_cleanup_delay_ms {} below minimum, clamped", self.grid_cleanup_delay_ms);
            self.grid_cleanup_delay_ms = MIN_GRID_DELAY_MS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let mut cfg: ServerConfig = serde_yaml::from_str("expansion: 1\ngrid_cleanup_delay_ms: 10\n").unwrap();
        cfg.clamp_timings();
        assert_eq!(cfg.expansion, 1);
        assert_eq!(cfg.grid_cleanup_delay_ms, MIN_GRID_DELAY_MS);
        assert_eq!(cfg.max_instances_per_hour, DEFAULT_MAX_INSTANCES_PER_HOUR);
    }

    #[test]
    fn missing_file_is_default() {
        let cfg = ServerConfig::load("/definitely/not/here.yaml").unwrap();
        assert_eq!(cfg.tick_rate, SERVER_TICK_RATE);
    }
}
