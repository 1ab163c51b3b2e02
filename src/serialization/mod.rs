//! Postcard-based value encoding with versioned envelopes.
//!
//! Every typed value that crosses a backend boundary (the distributed wire
//! format, memoized results, values stored through [`crate::CacheService`])
//! is wrapped in an envelope:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│ VERSION (u32)   │POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "CWRD"              varint             postcard::to_allocvec(T)
//! ```
//!
//! Encoding is deterministic: the same value always produces the same bytes.
//!
//! # Read vs write failures
//!
//! A value that fails to encode is an error for the writer (the data would
//! otherwise be lost silently). A value that fails to decode is, for readers,
//! just a miss: use [`decode_or_miss`] on read paths.
//!
//! ```rust
//! use cache_warden::serialization::{deserialize_from_cache, serialize_for_cache};
//!
//! # fn main() -> cache_warden::Result<()> {
//! let bytes = serialize_for_cache(&("alice", 42u32))?;
//! let (name, age): (String, u32) = deserialize_from_cache(&bytes)?;
//! assert_eq!((name.as_str(), age), ("alice", 42));
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Magic header for cache-warden entries: b"CWRD"
pub const CACHE_MAGIC: [u8; 4] = *b"CWRD";

/// Current schema version.
///
/// Bump when the layout of [`CacheEnvelope`] or of any engine-owned payload
/// (such as the distributed wire entry) changes. Entries written with another
/// version decode as [`Error::VersionMismatch`] and are treated as misses.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope for encoded values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    /// Magic header: must be b"CWRD"
    pub magic: [u8; 4],
    /// Schema version: must match CURRENT_SCHEMA_VERSION
    pub version: u32,
    /// The encoded value
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    /// Create a new envelope with current magic and version.
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Encode a value with envelope for cache storage.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn serialize_for_cache<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let envelope = CacheEnvelope::new(value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        error!("Cache serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Decode a value from cache storage, validating magic and version.
///
/// # Errors
///
/// - `Error::DeserializationError`: Corrupted or truncated payload
/// - `Error::InvalidCacheEntry`: Invalid magic header
/// - `Error::VersionMismatch`: Schema version mismatch
pub fn deserialize_from_cache<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: CacheEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        debug!("Cache deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != CACHE_MAGIC {
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}

/// Decode a cached value, turning any decode failure into a logged miss.
pub fn decode_or_miss<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Option<T> {
    match deserialize_from_cache(bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Undecodable cache entry for {} treated as miss: {}", key, e);
            None
        }
    }
}
