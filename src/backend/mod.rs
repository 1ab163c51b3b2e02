//! Cache backend trait and implementations.

use crate::error::{Error, Result};
use crate::pattern::KeyPattern;
use std::collections::HashMap;
use std::time::Duration;

pub mod distributed;
pub mod lru;
pub mod sweep;

pub use distributed::DistributedBackend;
pub use lru::{LruStore, StoreStats};
pub use sweep::SweepHandle;

/// Trait for cache backend implementations.
///
/// Implemented by the in-process [`LruStore`], the network-backed
/// [`DistributedBackend`], and wrappers such as [`crate::MonitoredCache`],
/// so callers can stack layers without changing call sites.
///
/// **IMPORTANT:** All methods use `&self` instead of `&mut self` to allow concurrent access.
/// Backend implementations use interior mutability or external storage.
///
/// **ASYNC:** All methods are async and must be awaited.
///
/// Values are opaque bytes. A miss is `Ok(None)`, never an error.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve value from cache by key.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs (connection lost, etc.)
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store value in cache with optional TTL.
    ///
    /// `ttl: None` applies the backend's default TTL, if it has one.
    ///
    /// # Errors
    /// - `Error::InvalidTtl` for a zero TTL
    /// - `Error::SerializationError` if the backend cannot encode the entry
    /// - `Error::BackendUnavailable` on transport failure
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove value from cache. Returns `true` if something was removed.
    ///
    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check if key exists in cache.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Bulk get. Returns only the keys that were found.
    ///
    /// Default implementation calls `get()` for each key. A key whose lookup
    /// fails is logged and left out of the result.
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Vec<u8>>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            match self.get(key).await {
                Ok(Some(value)) => {
                    found.insert((*key).to_string(), value);
                }
                Ok(None) => {}
                Err(e) => warn!("get_many: lookup of {} failed: {}", key, e),
            }
        }
        Ok(found)
    }

    /// Bulk set with a shared TTL.
    ///
    /// Every item is attempted. Failures are aggregated into
    /// `Error::PartialFailure` once the batch is done.
    async fn set_many(&self, items: Vec<(String, Vec<u8>)>, ttl: Option<Duration>) -> Result<()> {
        let mut failed = Vec::new();
        let mut first_error = None;
        for (key, value) in items {
            if let Err(e) = self.set(&key, value, ttl).await {
                first_error.get_or_insert_with(|| e.to_string());
                failed.push(key);
            }
        }
        partial_failure(failed, first_error)
    }

    /// Bulk delete. Returns the number of keys removed.
    async fn delete_many(&self, keys: &[&str]) -> Result<usize> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// All current, non-expired keys.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Delete every key matching a glob pattern. Returns the number removed.
    ///
    /// # Errors
    /// Returns `Error::InvalidPattern` for a malformed pattern.
    async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let pattern = KeyPattern::new(pattern)?;
        let matched: Vec<String> = self
            .keys()
            .await?
            .into_iter()
            .filter(|k| pattern.matches(k))
            .collect();
        let refs: Vec<&str> = matched.iter().map(String::as_str).collect();
        self.delete_many(&refs).await
    }

    /// Remove every entry.
    async fn clear(&self) -> Result<()>;

    /// Health check - verify backend is accessible.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Turn the outcome of a batch into `Ok(())` or `Error::PartialFailure`.
pub(crate) fn partial_failure(failed: Vec<String>, first_error: Option<String>) -> Result<()> {
    if failed.is_empty() {
        return Ok(());
    }
    warn!("Batch operation: {} item(s) failed", failed.len());
    Err(Error::PartialFailure {
        failed,
        message: first_error.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_exists_default() {
        let backend = LruStore::new(8).expect("store");
        backend
            .set("key", vec![1, 2, 3], None)
            .await
            .expect("Failed to set key");
        assert!(backend.exists("key").await.expect("Failed to check exists"));
        assert!(!backend
            .exists("nonexistent")
            .await
            .expect("Failed to check exists"));
    }

    #[test]
    fn test_partial_failure_empty_is_ok() {
        assert!(partial_failure(Vec::new(), None).is_ok());
        let err = partial_failure(vec!["k".into()], Some("boom".into())).unwrap_err();
        assert!(matches!(err, Error::PartialFailure { .. }));
    }
}
