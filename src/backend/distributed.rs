//! Distributed backend over a remote key-value service.
//!
//! Entries are wrapped in a wire entry carrying creation time and TTL, then
//! encoded with the versioned envelope before they leave the process. Keys are
//! namespaced (`"{prefix}:{key}"`) so several applications can share one
//! service. Eviction is left to the remote service.

use super::CacheBackend;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::pattern::KeyPattern;
use crate::retry::RetryPolicy;
use crate::serialization::{decode_or_miss, serialize_for_cache};
use crate::transport::KvClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Payload stored remotely for every key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct WireEntry {
    value: Vec<u8>,
    created_at_ms: u64,
    ttl_ms: Option<u64>,
}

impl WireEntry {
    fn is_expired_at(&self, now_ms: u64) -> bool {
        self.ttl_ms
            .is_some_and(|ttl| now_ms.saturating_sub(self.created_at_ms) > ttl)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Cache backend talking to a shared key-value service through a [`KvClient`].
///
/// Every remote call is bounded by the operation timeout and, when a
/// [`RetryPolicy`] is configured, retried on `Error::BackendUnavailable`.
///
/// # Example
///
/// ```
/// use cache_warden::backend::{CacheBackend, DistributedBackend};
/// use cache_warden::transport::MemoryKv;
///
/// # #[tokio::main]
/// # async fn main() -> cache_warden::Result<()> {
/// let backend = DistributedBackend::new(MemoryKv::new()).with_namespace("app");
/// backend.set("user:1", b"alice".to_vec(), None).await?;
///
/// assert_eq!(backend.keys().await?, vec!["user:1".to_string()]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DistributedBackend<C: KvClient> {
    client: C,
    namespace: String,
    default_ttl: Option<Duration>,
    op_timeout: Duration,
    retry: RetryPolicy,
}

impl<C: KvClient> DistributedBackend<C> {
    pub fn new(client: C) -> Self {
        DistributedBackend {
            client,
            namespace: String::new(),
            default_ttl: None,
            op_timeout: DEFAULT_OP_TIMEOUT,
            retry: RetryPolicy::none(),
        }
    }

    /// Build from configuration: namespace, default TTL, timeout and retries.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the configuration is invalid.
    pub fn from_config(client: C, config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "✓ Distributed backend initialized (namespace: {:?}, timeout: {:?})",
            config.namespace_prefix, config.op_timeout
        );
        Ok(DistributedBackend {
            client,
            namespace: config.namespace_prefix.clone(),
            default_ttl: config.default_ttl,
            op_timeout: config.op_timeout,
            retry: config.retry.clone(),
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The underlying transport client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Full remote key for a caller key.
    pub fn remote_key(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.namespace, key)
        }
    }

    fn strip_namespace<'a>(&self, remote: &'a str) -> Option<&'a str> {
        if self.namespace.is_empty() {
            Some(remote)
        } else {
            remote
                .strip_prefix(self.namespace.as_str())
                .and_then(|rest| rest.strip_prefix(':'))
        }
    }

    /// Run one remote operation under the timeout and retry policy.
    async fn call<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // tokio timers panic outside a runtime context
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::ConfigError(format!(
                "{} requires a Tokio runtime context",
                op_name
            )));
        }

        let timeout = self.op_timeout;
        self.retry
            .run(|| {
                let fut = op();
                async move {
                    tokio::time::timeout(timeout, fut).await.map_err(|_| {
                        Error::BackendUnavailable(format!(
                            "{} timed out after {:?}",
                            op_name, timeout
                        ))
                    })?
                }
            })
            .await
    }

    fn decode(&self, key: &str, bytes: &[u8], now_ms: u64) -> Option<Vec<u8>> {
        let entry: WireEntry = decode_or_miss(key, bytes)?;
        if entry.is_expired_at(now_ms) {
            debug!("✓ Distributed GET {} -> EXPIRED", key);
            return None;
        }
        Some(entry.value)
    }

    /// Remote keys under the namespace that start with `prefix`, as caller keys.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        let remote_prefix = self.remote_key(prefix);
        let remote = self
            .call("SCAN", || self.client.scan_prefix(&remote_prefix))
            .await?;
        Ok(remote
            .iter()
            .filter_map(|k| self.strip_namespace(k))
            .map(str::to_string)
            .collect())
    }

    async fn delete_remote(&self, keys: &[&str]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let remote: Vec<String> = keys.iter().map(|k| self.remote_key(k)).collect();
        self.call("DEL", || self.client.del(&remote)).await
    }
}

impl<C: KvClient> CacheBackend for DistributedBackend<C> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let remote = self.remote_key(key);
        let bytes = self.call("GET", || self.client.get(&remote)).await?;

        let value = bytes.and_then(|b| self.decode(key, &b, unix_millis()));
        debug!(
            "✓ Distributed GET {} -> {}",
            key,
            if value.is_some() { "HIT" } else { "MISS" }
        );
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let ttl = ttl.or(self.default_ttl);
        if ttl.is_some_and(|d| d.is_zero()) {
            return Err(Error::InvalidTtl(format!("zero TTL for key {}", key)));
        }

        let entry = WireEntry {
            value,
            created_at_ms: unix_millis(),
            ttl_ms: ttl.map(|d| d.as_millis() as u64),
        };
        let bytes = serialize_for_cache(&entry)?;
        let remote = self.remote_key(key);

        self.call("SET", || self.client.set(&remote, bytes.clone(), ttl))
            .await?;
        debug!("✓ Distributed SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.delete_remote(&[key]).await?;
        debug!("✓ Distributed DELETE {}", key);
        Ok(removed > 0)
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Vec<u8>>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let remote: Vec<String> = keys.iter().map(|k| self.remote_key(k)).collect();
        let values = self.call("MGET", || self.client.mget(&remote)).await?;

        let now_ms = unix_millis();
        let found: HashMap<String, Vec<u8>> = keys
            .iter()
            .zip(values)
            .filter_map(|(key, bytes)| {
                let value = self.decode(key, &bytes?, now_ms)?;
                Some(((*key).to_string(), value))
            })
            .collect();

        debug!("✓ Distributed MGET {} keys -> {} hits", keys.len(), found.len());
        Ok(found)
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<usize> {
        let removed = self.delete_remote(keys).await?;
        debug!("✓ Distributed DEL {} keys ({} removed)", keys.len(), removed);
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.scan("").await
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let pattern = KeyPattern::new(pattern)?;
        let matched: Vec<String> = self
            .scan(pattern.literal_prefix())
            .await?
            .into_iter()
            .filter(|k| pattern.matches(k))
            .collect();

        let refs: Vec<&str> = matched.iter().map(String::as_str).collect();
        let removed = self.delete_remote(&refs).await?;
        debug!(
            "✓ Distributed DELETE PATTERN {} -> {} removed",
            pattern, removed
        );
        Ok(removed)
    }

    /// Delete every key under the namespace.
    ///
    /// With an empty namespace this removes every key the service holds.
    async fn clear(&self) -> Result<()> {
        warn!(
            "⚠ Distributed CLEAR: removing all keys in namespace {:?}",
            self.namespace
        );
        let keys = self.keys().await?;
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.delete_remote(&refs).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        self.call("PING", || self.client.ping()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryKv;

    fn backend() -> (MemoryKv, DistributedBackend<MemoryKv>) {
        let kv = MemoryKv::new();
        let backend = DistributedBackend::new(kv.clone()).with_namespace("app");
        (kv, backend)
    }

    #[test]
    fn test_call_outside_runtime_is_config_error() {
        let (_kv, backend) = backend();
        let result = futures::executor::block_on(backend.get("k"));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let (_, backend) = backend();

        backend
            .set("user:1", b"alice".to_vec(), None)
            .await
            .expect("Failed to set");
        assert_eq!(
            backend.get("user:1").await.expect("Failed to get"),
            Some(b"alice".to_vec())
        );

        assert!(backend.delete("user:1").await.expect("Failed to delete"));
        assert!(!backend.delete("user:1").await.expect("Failed to delete"));
        assert_eq!(backend.get("user:1").await.expect("Failed to get"), None);
    }

    #[tokio::test]
    async fn test_keys_are_namespaced_remotely() {
        let (kv, backend) = backend();
        backend
            .set("k", b"v".to_vec(), None)
            .await
            .expect("Failed to set");

        assert!(kv.get_raw("app:k").is_some());
        assert!(kv.get_raw("k").is_none());
        assert_eq!(backend.keys().await.expect("Failed to list"), vec!["k"]);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let kv = MemoryKv::new();
        let a = DistributedBackend::new(kv.clone()).with_namespace("a");
        let b = DistributedBackend::new(kv.clone()).with_namespace("b");

        a.set("k", b"1".to_vec(), None).await.expect("Failed to set");
        b.set("k", b"2".to_vec(), None).await.expect("Failed to set");
        a.clear().await.expect("Failed to clear");

        assert_eq!(a.get("k").await.expect("Failed to get"), None);
        assert_eq!(
            b.get("k").await.expect("Failed to get"),
            Some(b"2".to_vec())
        );
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_a_miss() {
        let (kv, backend) = backend();
        kv.put_raw("app:bad", b"garbage".to_vec());

        assert_eq!(backend.get("bad").await.expect("Failed to get"), None);
    }

    #[tokio::test]
    async fn test_expired_wire_entry_is_a_miss() {
        let (kv, backend) = backend();
        let stale = WireEntry {
            value: b"old".to_vec(),
            created_at_ms: unix_millis() - 10_000,
            ttl_ms: Some(1_000),
        };
        kv.put_raw(
            "app:stale",
            serialize_for_cache(&stale).expect("Failed to encode"),
        );

        assert_eq!(backend.get("stale").await.expect("Failed to get"), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let (_, backend) = backend();
        let result = backend.set("k", Vec::new(), Some(Duration::ZERO)).await;
        assert!(matches!(result, Err(Error::InvalidTtl(_))));
    }

    #[tokio::test]
    async fn test_get_many_skips_missing_and_corrupted() {
        let (kv, backend) = backend();
        backend
            .set_many(
                vec![("a".into(), b"1".to_vec()), ("b".into(), b"2".to_vec())],
                None,
            )
            .await
            .expect("Failed to set_many");
        kv.put_raw("app:c", b"junk".to_vec());

        let found = backend
            .get_many(&["a", "b", "c", "d"])
            .await
            .expect("Failed to get_many");
        assert_eq!(found.len(), 2);
        assert_eq!(found.get("b"), Some(&b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_delete_pattern_uses_glob() {
        let (_, backend) = backend();
        for key in ["user:1", "user:2", "user:1:posts", "order:1"] {
            backend
                .set(key, Vec::new(), None)
                .await
                .expect("Failed to set");
        }

        let removed = backend
            .delete_pattern("user:?")
            .await
            .expect("Failed to delete pattern");
        assert_eq!(removed, 2);

        let mut keys = backend.keys().await.expect("Failed to list");
        keys.sort();
        assert_eq!(keys, vec!["order:1", "user:1:posts"]);
    }

    #[tokio::test]
    async fn test_delete_pattern_rejects_malformed_glob() {
        let (_, backend) = backend();
        assert!(matches!(
            backend.delete_pattern("user:[").await,
            Err(Error::InvalidPattern(_))
        ));
    }

    #[tokio::test]
    async fn test_from_config_applies_namespace_and_default_ttl() {
        let config = CacheConfig::default()
            .with_namespace("svc")
            .with_default_ttl(Duration::from_secs(60));
        let kv = MemoryKv::new();
        let backend = DistributedBackend::from_config(kv.clone(), &config).expect("valid config");

        backend
            .set("k", b"v".to_vec(), None)
            .await
            .expect("Failed to set");
        assert_eq!(backend.namespace(), "svc");
        assert!(kv.get_raw("svc:k").is_some());
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_, backend) = backend();
        assert!(backend.health_check().await.expect("Failed to ping"));
    }

    #[test]
    fn test_strip_namespace() {
        let (_, backend) = backend();
        assert_eq!(backend.strip_namespace("app:user:1"), Some("user:1"));
        assert_eq!(backend.strip_namespace("application:x"), None);

        let bare = DistributedBackend::new(MemoryKv::new());
        assert_eq!(bare.strip_namespace("user:1"), Some("user:1"));
    }
}
