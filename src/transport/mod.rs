//! Key-value transports for [`DistributedBackend`](crate::backend::DistributedBackend).
//!
//! A transport speaks to the remote key-value service. It moves raw bytes,
//! applies remote TTLs and reports transport failures as
//! `Error::BackendUnavailable`. Encoding, namespacing, timeouts and retries
//! are the backend's job.

use crate::error::Result;
use std::time::Duration;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryKv;
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisConfig, RedisKv};

/// Client for a remote key-value service.
///
/// Implementations reuse connections internally (pooling) and must be cheap
/// to clone.
#[allow(async_fn_in_trait)]
pub trait KvClient: Send + Sync + Clone {
    /// Fetch raw bytes for a key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Fetch several keys in one round trip. Result order matches `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Store bytes, with a remote expiry when `ttl` is given.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Delete keys. Returns how many existed.
    async fn del(&self, keys: &[String]) -> Result<usize>;

    /// All keys starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Round trip to the service.
    async fn ping(&self) -> Result<bool>;
}
