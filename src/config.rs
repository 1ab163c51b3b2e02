//! Strongly typed engine configuration.
//!
//! The engine does not read configuration on its own: the embedding
//! application builds a [`CacheConfig`] (directly or from JSON) and hands it
//! to the components it constructs.
//!
//! Durations are written as seconds (floating point) in JSON:
//!
//! ```
//! use cache_warden::CacheConfig;
//! use std::time::Duration;
//!
//! let config = CacheConfig::from_json(r#"{
//!     "max_size": 5000,
//!     "default_ttl": 300,
//!     "namespace_prefix": "app",
//!     "cleanup_interval": 0.5
//! }"#).unwrap();
//!
//! assert_eq!(config.default_ttl, Some(Duration::from_secs(300)));
//! assert_eq!(config.cleanup_interval, Some(Duration::from_millis(500)));
//! ```

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries held by an in-process store.
    pub max_size: usize,

    /// TTL applied when `set` is called without one. `None` = no expiry.
    #[serde(with = "opt_duration_secs")]
    pub default_ttl: Option<Duration>,

    /// Prefix namespacing every key of a distributed backend.
    pub namespace_prefix: String,

    /// Connection string of the distributed backend, e.g. `redis://localhost:6379/0`.
    pub backend_url: Option<String>,

    /// Interval of the proactive TTL sweep. `None` = lazy expiry only.
    #[serde(with = "opt_duration_secs")]
    pub cleanup_interval: Option<Duration>,

    /// Per-call timeout for distributed backend operations.
    #[serde(with = "duration_secs")]
    pub op_timeout: Duration,

    /// Internal retries for transient backend failures.
    pub retry: RetryPolicy,

    /// Number of latency samples kept by a monitored cache.
    pub latency_window: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_size: 10_000,
            default_ttl: None,
            namespace_prefix: String::new(),
            backend_url: None,
            cleanup_interval: None,
            op_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            latency_window: 100,
        }
    }
}

impl CacheConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` for malformed JSON or invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CacheConfig = serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("invalid cache config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reject values no component can honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::ConfigError("max_size must be at least 1".into()));
        }
        if self.default_ttl.is_some_and(|d| d.is_zero()) {
            return Err(Error::ConfigError("default_ttl must be greater than zero".into()));
        }
        if self.cleanup_interval.is_some_and(|d| d.is_zero()) {
            return Err(Error::ConfigError(
                "cleanup_interval must be greater than zero".into(),
            ));
        }
        if self.op_timeout.is_zero() {
            return Err(Error::ConfigError("op_timeout must be greater than zero".into()));
        }
        if self.latency_window == 0 {
            return Err(Error::ConfigError("latency_window must be at least 1".into()));
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            return Err(Error::ConfigError("retry.multiplier must be >= 1.0".into()));
        }
        Ok(())
    }
}

/// Serde adapter: `Duration` as floating point seconds.
pub(crate) mod duration_secs {
    use serde::{de::Error as _, Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

/// Serde adapter: `Option<Duration>` as optional floating point seconds.
pub(crate) mod opt_duration_secs {
    use serde::{de::Error as _, Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        match Option::<f64>::deserialize(d)? {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}
