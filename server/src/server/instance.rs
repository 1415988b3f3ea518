// world_server_core/server/src/server/instance.rs
use crate::collision::catalog::GeometryCatalog;
use crate::collision::model_store::{InMemoryModelLoader, ModelStore};
use crate::core::config::ServerConfig;
use crate::core::error::ServerResult;
use crate::core::types::InstanceId;
use crate::operational::monitoring::metrics::MetricsSystem;
use crate::world::content::ContentStore;
use crate::world::context::WorldContext;
use crate::world::map::MapEvent;
use crate::world::map_manager::MapManager;
use crate::world::spawn_store::SpawnStore;
use anyhow::Context;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, trace, warn};

/// The world: shared context plus the map manager. Constructed once and
/// passed explicitly to whoever drives it.
pub struct WorldServer {
    pub config: Arc<ServerConfig>,
    pub context: WorldContext,
    pub map_manager: Arc<MapManager>,
    pub frame_counter: AtomicU64,
    pub events_delivered: AtomicU64,
    metrics: Option<MetricsSystem>,
}

impl WorldServer {
    pub fn new(context: WorldContext) -> ServerResult<Self> {
        let map_manager = Arc::new(MapManager::new(context.clone())?);
        Ok(WorldServer {
            config: context.config.clone(),
            context,
            map_manager,
            frame_counter: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            metrics: None,
        })
    }

    /// Loads content, spawns and geometry from `data_dir`:
    /// `world.yaml`, `spawns.yaml` and the `vmaps/` tile directory.
    pub fn from_data_dir(config: ServerConfig, data_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let data_dir = data_dir.as_ref();
        let content = ContentStore::load(data_dir.join("world.yaml")).context("Failed to load world content")?;
        let spawns = SpawnStore::load(data_dir.join("spawns.yaml")).context("Failed to load spawns")?;
        let vmaps = data_dir.join("vmaps");
        let catalog = if vmaps.is_dir() {
            GeometryCatalog::load_directory(&vmaps).context("Failed to load geometry catalog")?
        } else {
            warn!("No geometry catalog at {}, maps have no static collision", vmaps.display());
            GeometryCatalog::new()
        };
        let models = ModelStore::new(Box::new(InMemoryModelLoader::new()));

        let context = WorldContext::new(
            Arc::new(config),
            Arc::new(content),
            Arc::new(spawns),
            Arc::new(catalog),
            Arc::new(models),
        );
        Ok(Self::new(context)?)
    }

    pub fn install_metrics(&mut self) -> anyhow::Result<()> {
        if let Some(port) = self.config.metrics_port {
            self.metrics = Some(MetricsSystem::new(port)?);
            info!("Prometheus exporter listening on port {}", port);
        }
        Ok(())
    }

    /// Seeds instance ids from persisted state and creates every open world
    /// base map.
    pub fn start(&self) {
        let ids: Vec<InstanceId> = self.context.spawns.persisted_instance_ids();
        self.map_manager.init_instance_ids(&ids);

        let open_world: Vec<_> = self
            .context
            .content
            .maps()
            .filter(|m| !m.instanceable())
            .map(|m| m.id)
            .collect();
        for map_id in open_world {
            self.map_manager.create_base_map(map_id);
        }
        info!("World started with {} maps", self.map_manager.map_count());
    }

    /// One world tick: map updates, then event delivery.
    pub fn tick(&self, diff: u32) {
        self.map_manager.update(diff);
        let mut delivered = 0u64;
        self.map_manager.do_for_all_maps(|map| {
            let (map_id, instance_id) = (map.id(), map.instance_id());
            for event in map.drain_events() {
                Self::deliver(map_id, instance_id, &event);
                delivered += 1;
            }
        });
        self.events_delivered.fetch_add(delivered, Ordering::Relaxed);
    }

    fn deliver(map_id: u32, instance_id: InstanceId, event: &MapEvent) {
        trace!("[World] {}/{} {:?}", map_id, instance_id, event);
    }

    pub fn uptime_secs(&self) -> Option<u64> {
        self.metrics.as_ref().map(MetricsSystem::uptime_secs)
    }

    pub fn shutdown(&self) {
        info!("World shutting down after {} frames", self.frame_counter.load(Ordering::Relaxed));
        self.map_manager.unload_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundled_world() -> WorldServer {
        let mut config = ServerConfig::default();
        config.thread_pools.map_update_threads = 0;
        WorldServer::from_data_dir(config, concat!(env!("CARGO_MANIFEST_DIR"), "/data")).unwrap()
    }

    #[test]
    fn start_creates_open_world_base_maps() {
        let world = bundled_world();
        world.start();
        assert_eq!(world.map_manager.map_count(), 2);
        assert!(world.map_manager.find_base_non_instance_map(0).is_some());
        assert!(world.map_manager.find_base_map(33).is_none());
    }

    #[test]
    fn tick_then_shutdown_unloads_everything() {
        let world = bundled_world();
        world.start();
        for _ in 0..4 {
            world.tick(world.map_manager.map_update_interval());
        }
        world.shutdown();
        assert_eq!(world.map_manager.map_count(), 0);
    }
}
