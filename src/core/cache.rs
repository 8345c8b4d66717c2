//! Process-wide sharing of loaded checkpoints.
//!
//! A loaded model is read-only after initialization, so every pipeline built
//! for the same checkpoint and device can score with one copy of the weights.
//! Models are cloned out of the cache; clones share weights through `Arc`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Implemented by model option types to produce a stable cache key.
pub trait ModelOptions {
    fn cache_key(&self) -> String;
}

type CacheStorage = HashMap<(TypeId, String), Arc<dyn Any + Send + Sync>>;

/// Thread-safe store of loaded models keyed by model type and checkpoint key.
pub struct ModelCache {
    models: Arc<Mutex<CacheStorage>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self {
            models: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the cached model for `key`, loading it with `loader` on a miss.
    ///
    /// A failed load leaves the cache untouched so the next call retries.
    pub async fn get_or_create<M, F>(&self, key: &str, loader: F) -> anyhow::Result<M>
    where
        M: Clone + Send + Sync + 'static,
        F: FnOnce() -> anyhow::Result<M>,
    {
        let slot = (TypeId::of::<M>(), key.to_string());

        {
            let models = self.models.lock().await;
            if let Some(model) = models.get(&slot).and_then(|m| m.downcast_ref::<M>()) {
                tracing::debug!(key, "model cache hit");
                return Ok(model.clone());
            }
        }

        tracing::debug!(key, "model cache miss, loading");
        let model = loader()?;

        let mut models = self.models.lock().await;
        models.insert(slot, Arc::new(model.clone()) as Arc<dyn Any + Send + Sync>);

        Ok(model)
    }

    pub async fn clear(&self) {
        self.models.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.models.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.models.lock().await.is_empty()
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_MODEL_CACHE: once_cell::sync::Lazy<ModelCache> =
    once_cell::sync::Lazy::new(ModelCache::new);

/// The cache shared by every pipeline builder in the process.
pub fn global_cache() -> &'static ModelCache {
    &GLOBAL_MODEL_CACHE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct FakeCheckpoint {
        path: String,
    }

    #[tokio::test]
    async fn second_lookup_reuses_loaded_model() {
        let cache = ModelCache::new();

        let first = cache
            .get_or_create::<FakeCheckpoint, _>("colbert-local", || {
                Ok(FakeCheckpoint {
                    path: "first".to_string(),
                })
            })
            .await
            .unwrap();

        let second = cache
            .get_or_create::<FakeCheckpoint, _>("colbert-local", || {
                Ok(FakeCheckpoint {
                    path: "second".to_string(),
                })
            })
            .await
            .unwrap();

        assert_eq!(first.path, "first");
        assert_eq!(second.path, "first");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let cache = ModelCache::new();

        let failed = cache
            .get_or_create::<FakeCheckpoint, _>("broken", || Err(anyhow::anyhow!("missing weights")))
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty().await);

        let loaded = cache
            .get_or_create::<FakeCheckpoint, _>("broken", || {
                Ok(FakeCheckpoint {
                    path: "retry".to_string(),
                })
            })
            .await
            .unwrap();
        assert_eq!(loaded.path, "retry");
    }
}
