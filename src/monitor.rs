//! Hit/miss and latency tracking around any backend.
//!
//! [`MonitoredCache`] implements [`CacheBackend`] by delegation, so it can be
//! dropped in front of a store without changing call sites. Every operation
//! is timed, whichever way it returns (including errors and cancellation),
//! and the last N samples feed a moving average.

use crate::backend::CacheBackend;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::observability::{CacheMetrics, LogMetrics};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Default number of latency samples kept.
pub const DEFAULT_LATENCY_WINDOW: usize = 100;

/// Point-in-time copy of the monitoring counters.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    /// Keys actually removed by `delete`, `delete_many` and `delete_pattern`.
    pub deletes: u64,
    pub errors: u64,
    pub hit_rate: f64,
    pub avg_latency: Duration,
    /// Latency samples currently in the window.
    pub samples: usize,
}

struct MonitorState {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    latencies: Mutex<VecDeque<Duration>>,
    window: usize,
}

impl MonitorState {
    fn new(window: usize) -> Self {
        MonitorState {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latencies: Mutex::new(VecDeque::with_capacity(window)),
            window,
        }
    }

    fn latencies(&self) -> MutexGuard<'_, VecDeque<Duration>> {
        self.latencies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_latency(&self, elapsed: Duration) {
        let mut samples = self.latencies();
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(elapsed);
    }
}

/// Records the elapsed time when dropped.
struct LatencyTimer<'a> {
    state: &'a MonitorState,
    start: Instant,
}

impl LatencyTimer<'_> {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LatencyTimer<'_> {
    fn drop(&mut self) {
        self.state.record_latency(self.start.elapsed());
    }
}

/// Transparent monitoring wrapper.
///
/// Clones share counters and latency window.
///
/// # Example
///
/// ```
/// use cache_warden::backend::{CacheBackend, LruStore};
/// use cache_warden::MonitoredCache;
///
/// # #[tokio::main]
/// # async fn main() -> cache_warden::Result<()> {
/// let cache = MonitoredCache::new(LruStore::new(100)?);
/// cache.set("a", b"1".to_vec(), None).await?;
/// cache.get("a").await?;
/// cache.get("b").await?;
///
/// assert_eq!(cache.hit_rate(), 0.5);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MonitoredCache<B: CacheBackend> {
    inner: B,
    state: Arc<MonitorState>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> MonitoredCache<B> {
    pub fn new(inner: B) -> Self {
        Self::with_window(inner, DEFAULT_LATENCY_WINDOW)
    }

    /// Keep the last `window` latency samples (at least one).
    pub fn with_window(inner: B, window: usize) -> Self {
        MonitoredCache {
            inner,
            state: Arc::new(MonitorState::new(window.max(1))),
            metrics: Arc::new(LogMetrics),
        }
    }

    /// Use `latency_window` of an engine config.
    pub fn from_config(inner: B, config: &CacheConfig) -> Self {
        Self::with_window(inner, config.latency_window)
    }

    /// Forward every operation to an external metrics sink as well.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn timer(&self) -> LatencyTimer<'_> {
        LatencyTimer {
            state: &self.state,
            start: Instant::now(),
        }
    }

    fn track_error<T>(&self, key: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.state.errors.fetch_add(1, Ordering::Relaxed);
            self.metrics.record_error(key, &e.to_string());
        }
        result
    }

    /// `hits / (hits + misses)`, or `0.0` before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.state.hits.load(Ordering::Relaxed);
        let misses = self.state.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Mean of the samples in the latency window, zero when empty.
    pub fn avg_latency(&self) -> Duration {
        let samples = self.state.latencies();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        samples.iter().sum::<Duration>() / samples.len() as u32
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            hits: self.state.hits.load(Ordering::Relaxed),
            misses: self.state.misses.load(Ordering::Relaxed),
            writes: self.state.writes.load(Ordering::Relaxed),
            deletes: self.state.deletes.load(Ordering::Relaxed),
            errors: self.state.errors.load(Ordering::Relaxed),
            hit_rate: self.hit_rate(),
            avg_latency: self.avg_latency(),
            samples: self.state.latencies().len(),
        }
    }

    /// Zero every counter and empty the latency window.
    pub fn reset(&self) {
        for counter in [
            &self.state.hits,
            &self.state.misses,
            &self.state.writes,
            &self.state.deletes,
            &self.state.errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.state.latencies().clear();
    }
}

impl<B: CacheBackend> CacheBackend for MonitoredCache<B> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let timer = self.timer();
        let result = self.inner.get(key).await;
        match &result {
            Ok(Some(_)) => {
                self.state.hits.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_hit(key, timer.elapsed());
            }
            Ok(None) => {
                self.state.misses.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_miss(key, timer.elapsed());
            }
            Err(_) => {}
        }
        self.track_error(key, result)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let timer = self.timer();
        let result = self.inner.set(key, value, ttl).await;
        if result.is_ok() {
            self.state.writes.fetch_add(1, Ordering::Relaxed);
            self.metrics.record_set(key, timer.elapsed());
        }
        self.track_error(key, result)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let timer = self.timer();
        let result = self.inner.delete(key).await;
        if let Ok(removed) = &result {
            if *removed {
                self.state.deletes.fetch_add(1, Ordering::Relaxed);
            }
            self.metrics.record_delete(key, timer.elapsed());
        }
        self.track_error(key, result)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let _timer = self.timer();
        let result = self.inner.exists(key).await;
        self.track_error(key, result)
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Vec<u8>>> {
        let _timer = self.timer();
        let result = self.inner.get_many(keys).await;
        if let Ok(found) = &result {
            // per requested key, so a repeated key counts once per occurrence
            let misses = keys.iter().filter(|k| !found.contains_key(**k)).count() as u64;
            self.state
                .hits
                .fetch_add(keys.len() as u64 - misses, Ordering::Relaxed);
            self.state.misses.fetch_add(misses, Ordering::Relaxed);
        }
        self.track_error("<get_many>", result)
    }

    async fn set_many(&self, items: Vec<(String, Vec<u8>)>, ttl: Option<Duration>) -> Result<()> {
        let _timer = self.timer();
        let attempted = items.len() as u64;
        let result = self.inner.set_many(items, ttl).await;
        match &result {
            Ok(()) => {
                self.state.writes.fetch_add(attempted, Ordering::Relaxed);
            }
            Err(Error::PartialFailure { failed, message }) => {
                let failed = failed.len() as u64;
                self.state
                    .writes
                    .fetch_add(attempted.saturating_sub(failed), Ordering::Relaxed);
                self.state.errors.fetch_add(failed, Ordering::Relaxed);
                self.metrics.record_error("<set_many>", message);
                return result;
            }
            Err(_) => {}
        }
        self.track_error("<set_many>", result)
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<usize> {
        let _timer = self.timer();
        let result = self.inner.delete_many(keys).await;
        if let Ok(removed) = &result {
            self.state
                .deletes
                .fetch_add(*removed as u64, Ordering::Relaxed);
        }
        self.track_error("<delete_many>", result)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let _timer = self.timer();
        let result = self.inner.keys().await;
        self.track_error("<keys>", result)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let _timer = self.timer();
        let result = self.inner.delete_pattern(pattern).await;
        if let Ok(removed) = &result {
            self.state
                .deletes
                .fetch_add(*removed as u64, Ordering::Relaxed);
        }
        self.track_error(pattern, result)
    }

    async fn clear(&self) -> Result<()> {
        let _timer = self.timer();
        let result = self.inner.clear().await;
        self.track_error("<clear>", result)
    }

    async fn health_check(&self) -> Result<bool> {
        let result = self.inner.health_check().await;
        self.track_error("<health_check>", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LruStore;

    /// Backend whose every operation fails.
    #[derive(Clone)]
    struct DownBackend;

    impl CacheBackend for DownBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(Error::BackendUnavailable("down".into()))
        }
        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            Err(Error::BackendUnavailable("down".into()))
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            Err(Error::BackendUnavailable("down".into()))
        }
        async fn keys(&self) -> Result<Vec<String>> {
            Err(Error::BackendUnavailable("down".into()))
        }
        async fn clear(&self) -> Result<()> {
            Err(Error::BackendUnavailable("down".into()))
        }
    }

    /// Backend whose lookups never complete.
    #[derive(Clone)]
    struct StalledBackend;

    impl CacheBackend for StalledBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            std::future::pending().await
        }
        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }
        async fn keys(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    fn monitored() -> MonitoredCache<LruStore> {
        MonitoredCache::new(LruStore::new(100).expect("store"))
    }

    #[tokio::test]
    async fn test_hit_rate_arithmetic() {
        let cache = monitored();
        assert_eq!(cache.hit_rate(), 0.0);

        cache
            .set("a", b"1".to_vec(), None)
            .await
            .expect("Failed to set");
        for _ in 0..3 {
            cache.get("a").await.expect("Failed to get");
        }
        cache.get("missing").await.expect("Failed to get");

        let stats = cache.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.hit_rate, 0.75);
        assert_eq!(stats.samples, 5);
    }

    #[tokio::test]
    async fn test_delete_counts() {
        let cache = monitored();
        cache
            .set("a", b"1".to_vec(), None)
            .await
            .expect("Failed to set");
        assert!(cache.delete("a").await.expect("Failed to delete"));
        assert!(!cache.delete("a").await.expect("Failed to delete"));
        assert_eq!(cache.stats().deletes, 1);
    }

    #[tokio::test]
    async fn test_get_many_counts_repeated_keys() {
        let cache = monitored();
        cache
            .set("a", b"1".to_vec(), None)
            .await
            .expect("Failed to set");

        let found = cache
            .get_many(&["a", "a", "b"])
            .await
            .expect("Failed to get_many");
        assert_eq!(found.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_batch_deletes_count_removed_keys() {
        let cache = monitored();
        for key in ["a", "b", "c"] {
            cache
                .set(key, b"1".to_vec(), None)
                .await
                .expect("Failed to set");
        }

        let removed = cache
            .delete_many(&["a", "missing"])
            .await
            .expect("Failed to delete_many");
        assert_eq!(removed, 1);
        assert_eq!(cache.stats().deletes, 1);

        let removed = cache
            .delete_pattern("*")
            .await
            .expect("Failed to delete pattern");
        assert_eq!(removed, 2);
        assert_eq!(cache.stats().deletes, 3);
    }

    #[test]
    fn test_window_from_config() {
        let config = CacheConfig {
            latency_window: 3,
            ..CacheConfig::default()
        };
        let cache = MonitoredCache::from_config(LruStore::default(), &config);
        assert_eq!(cache.stats().samples, 0);
        assert_eq!(cache.state.window, 3);
    }

    #[tokio::test]
    async fn test_latency_window_is_bounded() {
        let cache = MonitoredCache::with_window(LruStore::default(), 3);
        for _ in 0..10 {
            cache.get("k").await.expect("Failed to get");
        }

        let stats = cache.stats();
        assert_eq!(stats.samples, 3);
        assert_eq!(stats.misses, 10);
    }

    #[tokio::test]
    async fn test_errors_are_counted_and_returned_unchanged() {
        let cache = MonitoredCache::new(DownBackend);

        let result = cache.get("k").await;
        assert!(matches!(result, Err(Error::BackendUnavailable(_))));
        assert!(cache.set("k", Vec::new(), None).await.is_err());

        let stats = cache.stats();
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.hits + stats.misses + stats.writes, 0);
        assert_eq!(stats.samples, 2);
    }

    #[tokio::test]
    async fn test_partial_failure_is_split_between_writes_and_errors() {
        let cache = MonitoredCache::new(LruStore::new(10).expect("store"));
        let result = cache
            .set_many(
                vec![("a".into(), b"1".to_vec()), ("b".into(), b"2".to_vec())],
                Some(Duration::ZERO),
            )
            .await;

        assert!(matches!(result, Err(Error::PartialFailure { .. })));
        let stats = cache.stats();
        assert_eq!(stats.writes, 0);
        assert_eq!(stats.errors, 2);
    }

    #[tokio::test]
    async fn test_cancelled_lookup_still_records_latency() {
        let cache = MonitoredCache::new(StalledBackend);

        let outcome =
            tokio::time::timeout(Duration::from_millis(10), cache.get("k")).await;
        assert!(outcome.is_err());

        let stats = cache.stats();
        assert_eq!(stats.samples, 1);
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[tokio::test]
    async fn test_reset() {
        let cache = monitored();
        cache.get("k").await.expect("Failed to get");
        cache.reset();

        let stats = cache.stats();
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.samples, 0);
        assert_eq!(stats.avg_latency, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_clones_share_counters() {
        let cache = monitored();
        let clone = cache.clone();
        clone.get("k").await.expect("Failed to get");
        assert_eq!(cache.stats().misses, 1);
    }
}
