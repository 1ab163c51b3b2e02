//! Function-level memoization.
//!
//! A [`Memoizer`] caches the results of one function, keyed by a digest of
//! the function name and its arguments (see [`CacheKeyBuilder::memo_key`]).
//! There are two entry points sharing one lookup/store routine:
//! [`Memoizer::call_async`] for async callers and [`Memoizer::call`] for
//! synchronous ones.
//!
//! ```
//! use cache_warden::Memoizer;
//!
//! # #[tokio::main]
//! # async fn main() -> cache_warden::Result<()> {
//! let memo = Memoizer::new("square").with_key_prefix("math");
//!
//! let first: u64 = memo.call_async(&(12u64,), || async { 12 * 12 }).await?;
//! // Served from the cache; the closure does not run.
//! let second: u64 = memo.call_async(&(12u64,), || async { 0 }).await?;
//! assert_eq!(first, second);
//! # Ok(())
//! # }
//! ```
//!
//! Concurrent calls with the same arguments are not coalesced: if two start
//! before either has stored its result, both run the function.

use crate::backend::{CacheBackend, LruStore};
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::serialization::{decode_or_miss, serialize_for_cache};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;

/// Memoizes one function through a cache backend.
#[derive(Clone)]
pub struct Memoizer<B: CacheBackend = LruStore> {
    backend: B,
    function: String,
    ttl: Option<Duration>,
    key_prefix: String,
    runtime: Option<Handle>,
}

impl Memoizer<LruStore> {
    /// Memoize into a private in-process store of default size.
    pub fn new(function: impl Into<String>) -> Self {
        Self::with_backend(LruStore::default(), function)
    }
}

impl<B: CacheBackend> Memoizer<B> {
    /// Memoize into an existing backend.
    ///
    /// `function` should identify the function uniquely among everything
    /// sharing the backend (a module path works well).
    pub fn with_backend(backend: B, function: impl Into<String>) -> Self {
        Memoizer {
            backend,
            function: function.into(),
            ttl: None,
            key_prefix: String::new(),
            runtime: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Runtime entered by [`Memoizer::call`] when the calling thread has
    /// none, so backends built on tokio timers work from plain threads.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Cache key for one set of arguments.
    ///
    /// # Errors
    /// Returns `Error::SerializationError` if `args` cannot be encoded.
    pub fn key_for<A: Serialize + ?Sized>(&self, args: &A) -> Result<String> {
        CacheKeyBuilder::memo_key(&self.key_prefix, &self.function, args)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let cached = self.backend.get(key).await?;
        Ok(cached.and_then(|bytes| decode_or_miss(key, &bytes)))
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serialize_for_cache(value)?;
        self.backend.set(key, bytes, self.ttl).await
    }

    /// Memoized call of a fallible async function.
    ///
    /// Only `Ok` results are cached; an `Err` is returned and the next call
    /// runs the function again.
    ///
    /// # Errors
    /// The function's own error, or a cache error converted into `E`.
    pub async fn try_call_async<A, T, E, F, Fut>(&self, args: &A, f: F) -> std::result::Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        E: From<Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let key = self.key_for(args)?;

        if let Some(value) = self.lookup(&key).await? {
            debug!("✓ Memo {} -> HIT", key);
            return Ok(value);
        }

        debug!("✓ Memo {} -> MISS", key);
        let value = f().await?;
        self.store(&key, &value).await?;
        Ok(value)
    }

    /// Memoized call of an async function.
    ///
    /// # Errors
    /// Propagates backend errors and `Error::SerializationError` for values
    /// or arguments that cannot be encoded.
    pub async fn call_async<A, T, F, Fut>(&self, args: &A, f: F) -> Result<T>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.try_call_async(args, || async move { Ok::<T, Error>(f().await) })
            .await
    }

    /// Memoized call of a synchronous function.
    ///
    /// Blocks the current thread on the shared async routine, so it must not
    /// be called from inside an async task. The runtime set with
    /// [`Memoizer::with_runtime`] is entered for the duration of the call;
    /// it must be a multi-threaded runtime, whose workers drive the timers.
    ///
    /// # Errors
    /// Same as [`Memoizer::call_async`]. A backend that needs a runtime
    /// (such as [`DistributedBackend`](crate::backend::DistributedBackend))
    /// returns `Error::ConfigError` when none was set and the calling thread
    /// has none.
    pub fn call<A, T, F>(&self, args: &A, f: F) -> Result<T>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let _guard = self.runtime.as_ref().map(Handle::enter);
        futures::executor::block_on(self.call_async(args, || std::future::ready(f())))
    }

    /// Drop the memoized result for `args`. Returns `true` if one existed.
    pub async fn invalidate<A: Serialize + ?Sized>(&self, args: &A) -> Result<bool> {
        let key = self.key_for(args)?;
        self.backend.delete(&key).await
    }
}
