//! # cache-warden
//!
//! A caching and invalidation engine: an in-process store with LRU eviction
//! and per-entry TTL, a distributed backend for multi-node deployments,
//! pattern- and event-based invalidation, key versioning, function-level
//! memoization and a monitoring wrapper.
//!
//! ## Features
//!
//! - **One backend trait:** [`CacheBackend`] is implemented by the in-process
//!   [`LruStore`], the network-backed [`DistributedBackend`] and the
//!   [`MonitoredCache`] wrapper, so layers stack freely
//! - **Typed values:** [`CacheService`] encodes values with a versioned
//!   postcard envelope; undecodable entries are misses, never stale data
//! - **Invalidation:** glob patterns bound to events, plus versioned keys
//! - **Memoization:** deterministic keys from function name and arguments
//! - **Redis:** pooled transport behind the `redis` cargo feature
//!
//! ## Quick Start
//!
//! ```
//! use cache_warden::backend::{CacheBackend, LruStore};
//! use cache_warden::{CacheConfig, Invalidator, MonitoredCache};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> cache_warden::Result<()> {
//! let config = CacheConfig::default()
//!     .with_max_size(1_000)
//!     .with_default_ttl(Duration::from_secs(300));
//!
//! let cache = MonitoredCache::new(LruStore::from_config(&config)?);
//! cache.set("user:1", b"alice".to_vec(), None).await?;
//! assert!(cache.get("user:1").await?.is_some());
//!
//! let invalidator = Invalidator::new(cache.clone());
//! invalidator.register_pattern("user:*", "user_updated")?;
//! invalidator.invalidate_by_event("user_updated", None).await?;
//!
//! assert!(cache.get("user:1").await?.is_none());
//! assert_eq!(cache.hit_rate(), 0.5);
//! # Ok(())
//! # }
//! ```
//!
//! ### Distributed
//!
//! ```ignore
//! use cache_warden::backend::DistributedBackend;
//! use cache_warden::transport::RedisKv;
//!
//! let kv = RedisKv::from_connection_string("redis://localhost:6379/0")?;
//! let backend = DistributedBackend::from_config(kv, &config)?;
//! let cache = CacheService::new(backend);
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod entry;
pub mod error;
pub mod invalidation;
pub mod key;
pub mod memoize;
pub mod monitor;
pub mod observability;
pub mod pattern;
pub mod retry;
pub mod serialization;
pub mod service;
pub mod transport;

// Re-exports for convenience
pub use backend::{CacheBackend, DistributedBackend, LruStore};
pub use config::CacheConfig;
pub use entry::{Entry, EntryMeta};
pub use error::{Error, Result};
pub use invalidation::Invalidator;
pub use memoize::Memoizer;
pub use monitor::{MonitorStats, MonitoredCache};
pub use pattern::KeyPattern;
pub use retry::RetryPolicy;
pub use service::CacheService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
