use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;

use crate::error::GraphError;
use crate::graph::RoadNetwork;

/// Recently loaded road networks keyed by the OSM file they came from.
pub struct NetworkCache {
    networks: Mutex<LruCache<String, Arc<RoadNetwork>>>,
}

impl NetworkCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        NetworkCache {
            networks: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<RoadNetwork>>> {
        // Entries are only ever whole networks, so a poisoned map is still consistent.
        self.networks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Arc<RoadNetwork>> {
        self.lock().get(key).cloned()
    }

    /// Returns the cached network for `key`, loading it with `load` on a miss.
    /// The lock is not held while loading; when two callers race, the first
    /// one to finish is kept.
    pub fn get_or_load<F>(&self, key: &str, load: F) -> Result<Arc<RoadNetwork>, GraphError>
    where
        F: FnOnce() -> Result<RoadNetwork, GraphError>,
    {
        if let Some(network) = self.get(key) {
            return Ok(network);
        }

        let loaded = Arc::new(load()?);
        let mut networks = self.lock();
        if let Some(existing) = networks.get(key) {
            return Ok(Arc::clone(existing));
        }
        networks.put(key.to_string(), Arc::clone(&loaded));
        Ok(loaded)
    }
}
