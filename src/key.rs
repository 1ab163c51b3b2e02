//! Cache key management utilities.

use crate::error::{Error, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Bytes of the SHA-256 digest kept in a memo key (128 bits).
const MEMO_HASH_BYTES: usize = 16;

/// Builder for cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Build cache key with custom prefix.
    ///
    /// An empty prefix yields the id unchanged.
    pub fn build_with_prefix(prefix: &str, id: &dyn std::fmt::Display) -> String {
        if prefix.is_empty() {
            id.to_string()
        } else {
            format!("{}:{}", prefix, id)
        }
    }

    /// Build a versioned key: `"v{version}:{key}"`.
    pub fn versioned(version: u64, key: &str) -> String {
        format!("v{}:{}", version, key)
    }

    /// Build composite key from multiple parts.
    pub fn build_composite(parts: &[&str]) -> String {
        parts.join(":")
    }

    /// Parse a composite key into parts.
    pub fn parse(key: &str) -> Vec<&str> {
        key.split(':').collect()
    }

    /// Hex digest identifying one call of `function` with `args`.
    ///
    /// The digest covers the postcard encoding of `(function, args)`, so
    /// argument-equal inputs hash identically in every process. Positional
    /// arguments go in a tuple; named arguments in a struct or `BTreeMap`.
    ///
    /// The digest is SHA-256 truncated to 128 bits. Distinct arguments
    /// colliding is possible in principle but needs around 2^64 keys.
    ///
    /// # Errors
    /// Returns `Error::SerializationError` if `args` cannot be encoded.
    pub fn args_digest<A: Serialize + ?Sized>(function: &str, args: &A) -> Result<String> {
        let encoded = postcard::to_allocvec(&(function, args)).map_err(|e| {
            Error::SerializationError(format!("memo arguments for {}: {}", function, e))
        })?;

        let digest = Sha256::digest(&encoded);
        let mut hex = String::with_capacity(MEMO_HASH_BYTES * 2);
        for byte in &digest[..MEMO_HASH_BYTES] {
            let _ = write!(hex, "{:02x}", byte);
        }
        Ok(hex)
    }

    /// Memo key: `"{prefix}:{function}:{digest}"`, prefix omitted when empty.
    ///
    /// The digest keeps 128 bits of SHA-256. Two distinct argument sets share
    /// a key only on a hash collision, which becomes likely around 2^64 keys
    /// per function. Colliding calls would read each other's results.
    ///
    /// # Errors
    /// Returns `Error::SerializationError` if `args` cannot be encoded.
    pub fn memo_key<A: Serialize + ?Sized>(prefix: &str, function: &str, args: &A) -> Result<String> {
        let digest = Self::args_digest(function, args)?;
        let tail = Self::build_composite(&[function, &digest]);
        Ok(Self::build_with_prefix(prefix, &tail))
    }
}
