//! High-level cache service for applications.
//!
//! Provides a typed, cheaply clonable facade over a backend, bundling the
//! backend with its [`Invalidator`] so every consumer sees the same version
//! counter and invalidation rules.

use crate::backend::{CacheBackend, LruStore, SweepHandle};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::invalidation::Invalidator;
use crate::memoize::Memoizer;
use crate::serialization::{decode_or_miss, serialize_for_cache};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

struct ServiceInner<B: CacheBackend> {
    backend: B,
    invalidator: Invalidator<B>,
    // aborted when the last clone of the service is dropped
    _sweeper: Option<SweepHandle>,
}

/// High-level cache service.
///
/// Build one at startup and clone it into every consumer. Clones share the
/// backend, the invalidation rules and the key version.
///
/// # Example
///
/// ```
/// use cache_warden::{CacheConfig, CacheService};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, PartialEq, Debug)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # #[tokio::main]
/// # async fn main() -> cache_warden::Result<()> {
/// let cache = CacheService::in_memory(&CacheConfig::default())?;
/// let user = User { id: 1, name: "alice".into() };
///
/// cache.set("user:1", &user, None).await?;
/// let cached: Option<User> = cache.get("user:1").await?;
/// assert_eq!(cached, Some(user));
/// # Ok(())
/// # }
/// ```
pub struct CacheService<B: CacheBackend> {
    inner: Arc<ServiceInner<B>>,
}

impl<B: CacheBackend> Clone for CacheService<B> {
    fn clone(&self) -> Self {
        CacheService {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl CacheService<LruStore> {
    /// Service over a fresh in-process store built from configuration.
    ///
    /// When `cleanup_interval` is set a TTL sweeper runs for as long as the
    /// service is alive, which requires a Tokio runtime.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the configuration is invalid or the
    /// sweeper cannot be started.
    pub fn in_memory(config: &CacheConfig) -> Result<Self> {
        let store = LruStore::from_config(config)?;
        let sweeper = config
            .cleanup_interval
            .map(|interval| store.spawn_sweeper(interval))
            .transpose()?;

        Ok(CacheService {
            inner: Arc::new(ServiceInner {
                invalidator: Invalidator::new(store.clone()),
                backend: store,
                _sweeper: sweeper,
            }),
        })
    }
}

impl<B: CacheBackend> CacheService<B> {
    /// Create a new cache service with the given backend.
    pub fn new(backend: B) -> Self {
        CacheService {
            inner: Arc::new(ServiceInner {
                invalidator: Invalidator::new(backend.clone()),
                backend,
                _sweeper: None,
            }),
        }
    }

    /// Fetch and decode a value.
    ///
    /// An entry that fails to decode (written by another schema version, or
    /// under another type) is logged and reported as a miss.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let cached = self.inner.backend.get(key).await?;
        Ok(cached.and_then(|bytes| decode_or_miss(key, &bytes)))
    }

    /// Encode and store a value.
    ///
    /// # Errors
    /// - `Error::SerializationError` if the value cannot be encoded
    /// - any backend failure
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let bytes = serialize_for_cache(value)?;
        self.inner.backend.set(key, bytes, ttl).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.backend.delete(key).await
    }

    /// Delete every key matching a glob pattern.
    pub async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        self.inner.backend.delete_pattern(pattern).await
    }

    /// Fetch a value stored under the current key version.
    pub async fn get_versioned<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let versioned = self.inner.invalidator.get_versioned_key(key);
        self.get(&versioned).await
    }

    /// Store a value under the current key version.
    pub async fn set_versioned<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let versioned = self.inner.invalidator.get_versioned_key(key);
        self.set(&versioned, value, ttl).await
    }

    /// Invalidation rules and key version shared by every clone.
    pub fn invalidator(&self) -> &Invalidator<B> {
        &self.inner.invalidator
    }

    /// Memoizer for `function` that stores its results in this service's backend.
    pub fn memoizer(&self, function: impl Into<String>) -> Memoizer<B> {
        Memoizer::with_backend(self.inner.backend.clone(), function)
    }

    /// Get a reference to the underlying backend.
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.inner.backend.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DistributedBackend;
    use crate::transport::MemoryKv;
    use serde::Deserialize;

    #[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
    struct Profile {
        id: String,
        value: String,
    }

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.to_string(),
            value: format!("value_{}", id),
        }
    }

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let service = CacheService::new(LruStore::default());
        service
            .set("profile:1", &profile("1"), None)
            .await
            .expect("Failed to set");

        let cached: Option<Profile> = service.get("profile:1").await.expect("Failed to get");
        assert_eq!(cached, Some(profile("1")));
    }

    #[tokio::test]
    async fn test_wrong_type_is_a_miss() {
        let service = CacheService::new(LruStore::default());
        service
            .set("n", &"not a number", None)
            .await
            .expect("Failed to set");
        service
            .backend()
            .set("raw", b"raw bytes".to_vec(), None)
            .await
            .expect("Failed to set");

        let n: Option<Profile> = service.get("n").await.expect("Failed to get");
        let raw: Option<u32> = service.get("raw").await.expect("Failed to get");
        assert!(n.is_none());
        assert!(raw.is_none());
    }

    #[tokio::test]
    async fn test_versioned_values_are_orphaned_by_version_bump() {
        let service = CacheService::new(LruStore::default());
        service
            .set_versioned("profile:1", &profile("1"), None)
            .await
            .expect("Failed to set");
        assert!(service
            .get_versioned::<Profile>("profile:1")
            .await
            .expect("Failed to get")
            .is_some());

        service.invalidator().increment_version();

        assert!(service
            .get_versioned::<Profile>("profile:1")
            .await
            .expect("Failed to get")
            .is_none());
    }

    #[test]
    fn test_cache_service_clone() {
        let service1 = CacheService::new(LruStore::default());
        let service2 = service1.clone();

        // Both services share the same state
        assert!(Arc::ptr_eq(&service1.inner, &service2.inner));
        service1.invalidator().increment_version();
        assert_eq!(service2.invalidator().version(), 1);
    }

    #[tokio::test]
    async fn test_memoizer_shares_backend() {
        let service = CacheService::new(LruStore::default());
        let memo = service.memoizer("answer");

        let _: u32 = memo
            .call_async(&(), || async { 42 })
            .await
            .expect("Failed to call");
        assert_eq!(service.backend().len(), 1);

        service
            .delete_pattern("answer:*")
            .await
            .expect("Failed to delete pattern");
        assert!(service.backend().is_empty());
    }

    #[tokio::test]
    async fn test_over_distributed_backend() {
        let service = CacheService::new(DistributedBackend::new(MemoryKv::new()).with_namespace("svc"));
        service
            .set("profile:2", &profile("2"), None)
            .await
            .expect("Failed to set");

        let cached: Option<Profile> = service.get("profile:2").await.expect("Failed to get");
        assert_eq!(cached, Some(profile("2")));
        assert!(service.health_check().await.expect("Failed to ping"));
    }

    #[tokio::test]
    async fn test_cache_service_thread_safety() {
        let service = CacheService::new(LruStore::default());

        let mut handles = vec![];

        for i in 0..5 {
            let service_clone = service.clone();
            let handle = tokio::spawn(async move {
                let key = format!("profile:{}", i);
                service_clone
                    .set(&key, &profile(&i.to_string()), None)
                    .await
                    .expect("Failed to set");

                let cached: Option<Profile> =
                    service_clone.get(&key).await.expect("Failed to get");
                assert!(cached.is_some());
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.await.expect("Task failed");
        }
        assert_eq!(service.backend().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_memory_runs_configured_sweeper() {
        let config = CacheConfig::default().with_cleanup_interval(Duration::from_secs(1));
        let service = CacheService::in_memory(&config).expect("valid config");
        service
            .set("short", &1u32, Some(Duration::from_millis(500)))
            .await
            .expect("Failed to set");

        tokio::time::sleep(Duration::from_millis(1500)).await;

        // purged without a read touching it
        assert!(service.backend().is_empty());
    }
}
