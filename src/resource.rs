//! Single-slot cache for an expensive, keyed resource.
//!
//! Holds at most one loaded handle. Acquiring with the key the handle was
//! loaded with returns the same instance; any other key tears the current
//! handle down before loading a new one. A failure while the handle is in
//! use releases it, so the next acquire starts from a fresh load.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Knows how to build and tear down the cached resource
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    /// Load parameters; compared structurally to decide reuse
    type Key: Clone + Eq + Hash + Debug + Send + Sync;
    type Handle: Send + Sync;

    async fn load(&self, key: &Self::Key) -> Result<Self::Handle>;

    /// Called once when a handle leaves the cache
    fn teardown(&self, handle: Arc<Self::Handle>) {
        drop(handle);
    }
}

struct CachedResource<K, H> {
    key: K,
    handle: Arc<H>,
    loaded_at: DateTime<Utc>,
}

pub struct ResourceCache<L: ResourceLoader> {
    loader: L,
    slot: Mutex<Option<CachedResource<L::Key, L::Handle>>>,
}

/// Structural hash of a key, for logs
pub fn fingerprint<K: Hash>(key: &K) -> String {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

impl<L: ResourceLoader> ResourceCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            slot: Mutex::new(None),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Return the loaded handle for `key`, loading it if needed
    pub async fn acquire(&self, key: &L::Key) -> Result<Arc<L::Handle>> {
        let mut slot = self.slot.lock().await;
        self.acquire_locked(&mut slot, key).await
    }

    /// Tear down the loaded handle, if any
    pub async fn release(&self) {
        let mut slot = self.slot.lock().await;
        self.release_locked(&mut slot);
    }

    /// Run `work` with the handle for `key` while holding the slot.
    ///
    /// Other callers wait until `work` finishes. If `work` fails the handle
    /// is released before the error is returned.
    pub async fn with_resource<T, F, Fut>(&self, key: &L::Key, work: F) -> Result<T>
    where
        F: FnOnce(Arc<L::Handle>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut slot = self.slot.lock().await;
        let handle = self.acquire_locked(&mut slot, key).await?;

        match work(handle).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("Resource failed during use, releasing it: {}", e);
                self.release_locked(&mut slot);
                Err(e)
            }
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    pub async fn current_key(&self) -> Option<L::Key> {
        self.slot.lock().await.as_ref().map(|cached| cached.key.clone())
    }

    pub async fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.slot.lock().await.as_ref().map(|cached| cached.loaded_at)
    }

    async fn acquire_locked(
        &self,
        slot: &mut Option<CachedResource<L::Key, L::Handle>>,
        key: &L::Key,
    ) -> Result<Arc<L::Handle>> {
        if let Some(cached) = slot.as_ref() {
            if cached.key == *key {
                debug!("Reusing loaded resource {}", fingerprint(key));
                return Ok(Arc::clone(&cached.handle));
            }
            info!("Resource configuration changed, reloading");
            self.release_locked(slot);
        }

        info!("Loading resource {:?} ({})", key, fingerprint(key));
        let started = Instant::now();
        let handle = Arc::new(self.loader.load(key).await?);
        info!("Resource loaded in {:.2}s", started.elapsed().as_secs_f64());

        *slot = Some(CachedResource {
            key: key.clone(),
            handle: Arc::clone(&handle),
            loaded_at: Utc::now(),
        });
        Ok(handle)
    }

    fn release_locked(&self, slot: &mut Option<CachedResource<L::Key, L::Handle>>) {
        if let Some(cached) = slot.take() {
            info!("Releasing resource {}", fingerprint(&cached.key));
            self.loader.teardown(cached.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DubmuxError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
        teardowns: AtomicUsize,
        fail_load: bool,
    }

    #[derive(Debug)]
    struct Model {
        name: String,
    }

    #[async_trait]
    impl ResourceLoader for CountingLoader {
        type Key = (String, u32);
        type Handle = Model;

        async fn load(&self, key: &Self::Key) -> Result<Model> {
            if self.fail_load {
                return Err(DubmuxError::Resource("load failed".to_string()));
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Model { name: key.0.clone() })
        }

        fn teardown(&self, _handle: Arc<Model>) {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn key(name: &str, shifts: u32) -> (String, u32) {
        (name.to_string(), shifts)
    }

    #[tokio::test]
    async fn test_same_key_reuses_handle() {
        let cache = ResourceCache::new(CountingLoader::default());

        let first = cache.acquire(&key("htdemucs_ft", 5)).await.unwrap();
        let second = cache.acquire(&key("htdemucs_ft", 5)).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.loader().loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.loader().teardowns.load(Ordering::SeqCst), 0);
        assert!(cache.loaded_at().await.is_some());
    }

    #[tokio::test]
    async fn test_key_change_releases_once_then_loads() {
        let cache = ResourceCache::new(CountingLoader::default());

        let first = cache.acquire(&key("htdemucs_ft", 5)).await.unwrap();
        let second = cache.acquire(&key("htdemucs", 0)).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.name, "htdemucs");
        assert_eq!(cache.loader().loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.loader().teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(cache.current_key().await, Some(key("htdemucs", 0)));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let cache = ResourceCache::new(CountingLoader::default());
        cache.release().await;

        cache.acquire(&key("htdemucs_ft", 5)).await.unwrap();
        cache.release().await;
        cache.release().await;

        assert!(!cache.is_loaded().await);
        assert_eq!(cache.loader().teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_during_use_forces_reload() {
        let cache = ResourceCache::new(CountingLoader::default());
        let k = key("htdemucs_ft", 5);

        let result: Result<()> = cache
            .with_resource(&k, |_model| async {
                Err(DubmuxError::Separation("corrupted".to_string()))
            })
            .await;

        assert!(matches!(result, Err(DubmuxError::Separation(_))));
        assert!(!cache.is_loaded().await);
        assert_eq!(cache.loader().teardowns.load(Ordering::SeqCst), 1);

        let name = cache
            .with_resource(&k, |model| async move { Ok(model.name.clone()) })
            .await
            .unwrap();
        assert_eq!(name, "htdemucs_ft");
        assert_eq!(cache.loader().loads.load(Ordering::SeqCst), 2);
        assert!(cache.is_loaded().await);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_slot_empty() {
        let cache = ResourceCache::new(CountingLoader {
            fail_load: true,
            ..CountingLoader::default()
        });

        assert!(cache.acquire(&key("htdemucs_ft", 5)).await.is_err());
        assert!(!cache.is_loaded().await);
    }

    #[test]
    fn test_fingerprint_is_structural() {
        assert_eq!(fingerprint(&key("a", 1)), fingerprint(&key("a", 1)));
        assert_ne!(fingerprint(&key("a", 1)), fingerprint(&key("a", 2)));
    }
}
