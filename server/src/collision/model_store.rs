// world_server_core/server/src/collision/model_store.rs
use super::world_model::WorldModel;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Source of model geometry by file name.
pub trait ModelLoader: Send + Sync {
    fn load(&self, name: &str) -> Option<WorldModel>;
}

/// Loader over geometry already held in memory.
#[derive(Default)]
pub struct InMemoryModelLoader {
    models: HashMap<String, WorldModel>,
}

impl InMemoryModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, model: WorldModel) {
        self.models.insert(name.into(), model);
    }
}

impl ModelLoader for InMemoryModelLoader {
    fn load(&self, name: &str) -> Option<WorldModel> {
        self.models.get(name).cloned()
    }
}

/// Name keyed cache of shared models. Entries are weak: a model is dropped
/// when the last instance referencing it unloads.
pub struct ModelStore {
    loader: Box<dyn ModelLoader>,
    cache: DashMap<String, Weak<WorldModel>>,
}

impl ModelStore {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        ModelStore { loader, cache: DashMap::new() }
    }

    pub fn acquire(&self, name: &str) -> Option<Arc<WorldModel>> {
        let mut entry = self.cache.entry(name.to_string()).or_default();
        if let Some(model) = entry.upgrade() {
            return Some(model);
        }
        match self.loader.load(name) {
            Some(model) => {
                let model = Arc::new(model);
                *entry = Arc::downgrade(&model);
                debug!("[ModelStore] loaded {}", name);
                Some(model)
            }
            None => {
                error!("[ModelStore] could not load model file {}", name);
                None
            }
        }
    }

    /// Number of models currently alive.
    pub fn live_models(&self) -> usize {
        self.cache.iter().filter(|e| e.value().strong_count() > 0).count()
    }

    /// Drops cache slots whose model is gone.
    pub fn purge(&self) {
        self.cache.retain(|_, w| w.strong_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::world_model::GroupModel;
    use crate::core::types::Vec3;

    fn store() -> ModelStore {
        let mut loader = InMemoryModelLoader::new();
        loader.insert("box.wmo", WorldModel::new(1, false, vec![GroupModel::solid_box(Vec3::zeros(), Vec3::repeat(1.0), 1)]));
        ModelStore::new(Box::new(loader))
    }

    #[test]
    fn instances_share_one_model() {
        let store = store();
        let a = store.acquire("box.wmo").unwrap();
        let b = store.acquire("box.wmo").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.live_models(), 1);
        drop(a);
        drop(b);
        assert_eq!(store.live_models(), 0);
        store.purge();
        assert!(store.acquire("box.wmo").is_some());
    }

    #[test]
    fn missing_model_is_absent() {
        assert!(store().acquire("nope.wmo").is_none());
    }
}
