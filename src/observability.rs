//! Metrics hooks for cache operations.
//!
//! [`MonitoredCache`](crate::MonitoredCache) keeps its own counters and
//! latency window. To forward every operation to an external monitoring
//! system as well, implement [`CacheMetrics`] and attach it:
//!
//! ```ignore
//! use cache_warden::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &str, _duration: Duration) {
//!         // counter!("cache_hits").inc();
//!         // histogram!("cache_latency").record(duration);
//!     }
//!     // ... implement other methods
//! }
//!
//! // let cache = MonitoredCache::new(store)
//! //     .with_metrics(Arc::new(PrometheusMetrics));
//! ```
//!
//! Default behavior uses [`LogMetrics`], which logs via the `log` crate.
//!
//! # Metrics Methods
//!
//! - `record_hit()` - Cache hit with operation duration
//! - `record_miss()` - Cache miss with operation duration
//! - `record_set()` - Cache write with operation duration
//! - `record_delete()` - Cache delete with operation duration
//! - `record_error()` - Operation failure with error message

use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// Record a cache miss.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// Record a cache set operation.
    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    /// Record a cache delete operation.
    fn record_delete(&self, key: &str, duration: Duration) {
        debug!("Cache DELETE: {} took {:?}", key, duration);
    }

    /// Record an error.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Logs every operation through the `log` facade.
#[derive(Clone, Debug, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}

/// Discards every event.
#[derive(Clone, Debug, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_delete(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}
