//! In-process key-value transport.
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding and
//! honours remote-style TTLs on access. Serves as a loopback for single-node
//! deployments and for exercising [`DistributedBackend`](crate::backend::DistributedBackend)
//! without a network service.

use super::KvClient;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// Thread-safe in-memory key-value service.
///
/// Clones share the same map, like connections to one server.
#[derive(Clone, Default)]
pub struct MemoryKv {
    store: Arc<DashMap<String, StoredValue>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, expired ones included.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Overwrite the raw bytes of a key, bypassing any encoding.
    pub fn put_raw(&self, key: &str, data: Vec<u8>) {
        self.store.insert(
            key.to_string(),
            StoredValue {
                data,
                expires_at: None,
            },
        );
    }

    /// Raw bytes of a key, if present and not expired.
    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        self.store
            .get(key)
            .filter(|v| !v.is_expired(now))
            .map(|v| v.data.clone())
    }
}

impl KvClient for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        if let Some(value) = self.store.get(key) {
            if !value.is_expired(now) {
                return Ok(Some(value.data.clone()));
            }
        }

        self.store.remove_if(key, |_, v| v.is_expired(now));
        Ok(None)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.store.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<usize> {
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|k| self.store.remove(k))
            .filter(|(_, v)| !v.is_expired(now))
            .count();
        Ok(removed)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let keys = self
            .store
            .iter()
            .filter(|item| item.key().starts_with(prefix) && !item.value().is_expired(now))
            .map(|item| item.key().clone())
            .collect();
        Ok(keys)
    }

    async fn ping(&self) -> Result<bool> {
        Ok(true)
    }
}
