//! Error types for the cache engine.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache engine.
///
/// A cache miss is never an error: lookups return `Ok(None)`.
/// The variants below cover misuse, encoding problems and transport failures.
#[derive(Debug, Clone)]
pub enum Error {
    /// Serialization failed when converting a value to cache bytes.
    ///
    /// Raised on write paths so the caller knows the value was not stored.
    SerializationError(String),

    /// Deserialization failed when converting cache bytes to a value.
    ///
    /// Read paths that hit this log it and treat the entry as a miss.
    DeserializationError(String),

    /// Invalid cache entry: corrupted envelope or bad magic.
    ///
    /// Returned when:
    /// - Magic header is not `b"CWRD"`
    /// - Non-cache-warden data stored under a cache key
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and cached data.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// Malformed invalidation pattern.
    ///
    /// Reported when the pattern is registered, never deferred to invalidation time.
    InvalidPattern(String),

    /// Backend transport failure (connection lost, pool exhausted, timeout).
    ///
    /// **Recovery:** Retry with exponential backoff and jitter, see [`crate::retry::RetryPolicy`].
    BackendUnavailable(String),

    /// A TTL that cannot be honoured, such as zero.
    InvalidTtl(String),

    /// Configuration error during construction.
    ///
    /// Common causes:
    /// - `max_size` of zero
    /// - Invalid connection string
    /// - Zero timeout or sweep interval
    ConfigError(String),

    /// Some items of a batch operation failed.
    ///
    /// All items were attempted; `failed` lists the keys that did not go through.
    PartialFailure {
        /// Keys whose operation failed
        failed: Vec<String>,
        /// First underlying error message
        message: String,
    },

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// Whether the failure is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::BackendUnavailable(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::InvalidPattern(msg) => write!(f, "Invalid pattern: {}", msg),
            Error::BackendUnavailable(msg) => write!(f, "Backend unavailable: {}", msg),
            Error::InvalidTtl(msg) => write!(f, "Invalid TTL: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::PartialFailure { failed, message } => write!(
                f,
                "Partial failure: {} item(s) failed, first error: {}",
                failed.len(),
                message
            ),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendUnavailable(e.to_string())
        } else if e.is_syntax() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::ConfigError(e.to_string())
        }
    }
}

impl From<postcard::Error> for Error {
    fn from(e: postcard::Error) -> Self {
        Error::DeserializationError(e.to_string())
    }
}

impl From<glob::PatternError> for Error {
    fn from(e: glob::PatternError) -> Self {
        Error::InvalidPattern(format!("{} at position {}", e.msg, e.pos))
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Error::BackendUnavailable(format!("operation timed out: {}", e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendUnavailable(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::BackendUnavailable(format!("Redis error: {}", e))
    }
}
