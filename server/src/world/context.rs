// world_server_core/server/src/world/context.rs
use crate::collision::catalog::GeometryCatalog;
use crate::collision::model_store::{InMemoryModelLoader, ModelStore};
use crate::core::config::ServerConfig;
use crate::core::types::ObjectGuid;
use crate::world::content::ContentStore;
use crate::world::spawn_store::SpawnStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared world services handed to every map. Built once at startup and
/// cloned by reference.
#[derive(Clone)]
pub struct WorldContext {
    pub config: Arc<ServerConfig>,
    pub content: Arc<ContentStore>,
    pub spawns: Arc<SpawnStore>,
    pub catalog: Arc<GeometryCatalog>,
    pub models: Arc<ModelStore>,
    guids: Arc<AtomicU64>,
}

impl WorldContext {
    pub fn new(
        config: Arc<ServerConfig>,
        content: Arc<ContentStore>,
        spawns: Arc<SpawnStore>,
        catalog: Arc<GeometryCatalog>,
        models: Arc<ModelStore>,
    ) -> Self {
        WorldContext { config, content, spawns, catalog, models, guids: Arc::new(AtomicU64::new(1)) }
    }

    /// Context without static geometry, for tools and tests.
    pub fn with_content(config: ServerConfig, content: ContentStore, spawns: SpawnStore) -> Self {
        WorldContext::new(
            Arc::new(config),
            Arc::new(content),
            Arc::new(spawns),
            Arc::new(GeometryCatalog::new()),
            Arc::new(ModelStore::new(Box::new(InMemoryModelLoader::new()))),
        )
    }

    pub fn next_guid(&self) -> ObjectGuid {
        ObjectGuid(self.guids.fetch_add(1, Ordering::Relaxed))
    }
}
