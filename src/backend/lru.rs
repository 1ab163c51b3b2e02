//! In-process LRU store with per-entry TTL.
//!
//! Entries live in a slab of nodes threaded on a doubly-linked recency list
//! (head = most recently used, tail = least recently used) and are indexed by
//! a `HashMap` from key to slot. Every operation is O(1) apart from scans
//! (`keys`, `delete_pattern`, `purge_expired`).
//!
//! All state sits behind one `Mutex`: reads move entries in the recency list,
//! so they mutate too. The lock is never held across an `.await`.
//!
//! Expiry is lazy: an expired entry is removed by the read that finds it. A
//! periodic sweep can be added with [`LruStore::spawn_sweeper`].

use super::sweep::SweepHandle;
use super::CacheBackend;
use crate::config::CacheConfig;
use crate::entry::{Entry, EntryMeta};
use crate::error::{Error, Result};
use crate::pattern::KeyPattern;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Capacity used by [`LruStore::default`].
pub const DEFAULT_MAX_SIZE: usize = 10_000;

struct Node {
    key: String,
    entry: Entry,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Default)]
struct LruState {
    index: HashMap<String, usize>,
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    evictions: u64,
    expirations: u64,
}

impl LruState {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn node(&self, idx: usize) -> &Node {
        self.slots[idx].as_ref().expect("indexed slot is occupied")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        self.slots[idx].as_mut().expect("indexed slot is occupied")
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let node = self.node_mut(idx);
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.node_mut(h).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn insert_new(&mut self, key: String, entry: Entry) {
        let node = Node {
            key: key.clone(),
            entry,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.push_front(idx);
    }

    fn remove_slot(&mut self, idx: usize) -> Node {
        self.unlink(idx);
        let node = self.slots[idx].take().expect("indexed slot is occupied");
        self.index.remove(&node.key);
        self.free.push(idx);
        node
    }

    fn remove_key(&mut self, key: &str) -> Option<Node> {
        let idx = *self.index.get(key)?;
        Some(self.remove_slot(idx))
    }

    fn evict_lru(&mut self) -> Option<String> {
        let tail = self.tail?;
        let node = self.remove_slot(tail);
        self.evictions += 1;
        Some(node.key)
    }

    /// Walk from most to least recently used, dropping expired entries.
    fn live_keys(&mut self, now: Instant) -> Vec<String> {
        let mut live = Vec::with_capacity(self.len());
        let mut expired = Vec::new();
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = self.node(idx);
            if node.entry.is_expired_at(now) {
                expired.push(idx);
            } else {
                live.push(node.key.clone());
            }
            cursor = node.next;
        }
        for idx in expired {
            self.remove_slot(idx);
            self.expirations += 1;
        }
        live
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.len();
        self.live_keys(now);
        before - self.len()
    }

    fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }
}

pub(crate) struct StoreInner {
    state: Mutex<LruState>,
    max_size: usize,
    default_ttl: Option<Duration>,
}

impl StoreInner {
    fn lock(&self) -> MutexGuard<'_, LruState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.lock().purge_expired(now)
    }
}

/// Thread-safe LRU + TTL store.
///
/// Cloning is cheap and every clone shares the same entries.
///
/// # Example
///
/// ```no_run
/// use cache_warden::backend::{CacheBackend, LruStore};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> cache_warden::Result<()> {
///     let store = LruStore::new(2)?;
///
///     store.set("a", b"1".to_vec(), None).await?;
///     store.set("b", b"2".to_vec(), Some(Duration::from_secs(30))).await?;
///     store.get("a").await?;                   // "a" is now most recently used
///     store.set("c", b"3".to_vec(), None).await?; // evicts "b"
///
///     assert!(store.get("b").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct LruStore {
    inner: Arc<StoreInner>,
}

impl LruStore {
    /// Create a store holding at most `max_size` entries.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` when `max_size` is zero.
    pub fn new(max_size: usize) -> Result<Self> {
        Self::with_default_ttl(max_size, None)
    }

    /// Create a store whose entries expire after `default_ttl` unless `set`
    /// is given an explicit TTL.
    ///
    /// # Errors
    /// - `Error::ConfigError` when `max_size` is zero
    /// - `Error::InvalidTtl` when `default_ttl` is zero
    pub fn with_default_ttl(max_size: usize, default_ttl: Option<Duration>) -> Result<Self> {
        if max_size == 0 {
            return Err(Error::ConfigError(
                "LruStore max_size must be at least 1".to_string(),
            ));
        }
        check_ttl(default_ttl)?;

        Ok(LruStore {
            inner: Arc::new(StoreInner {
                state: Mutex::new(LruState::default()),
                max_size,
                default_ttl,
            }),
        })
    }

    /// Build a store from `max_size` and `default_ttl` of a validated config.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        Self::with_default_ttl(config.max_size, config.default_ttl)
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.inner.default_ttl
    }

    /// Look up a key, marking it most recently used on a hit.
    ///
    /// An expired entry found here is removed and reported as a miss.
    pub fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let mut state = self.inner.lock();
        let idx = *state.index.get(key)?;

        if state.node(idx).entry.is_expired_at(now) {
            state.remove_slot(idx);
            state.expirations += 1;
            debug!("✓ LruStore GET {} -> EXPIRED", key);
            return None;
        }

        let node = state.node_mut(idx);
        node.entry.touch(now);
        let value = node.entry.value().to_vec();
        state.move_to_front(idx);
        debug!("✓ LruStore GET {} -> HIT", key);
        Some(value)
    }

    /// Insert or overwrite a key.
    ///
    /// A new key arriving at capacity evicts exactly one entry, the least
    /// recently used. An overwrite replaces the entry (resetting its creation
    /// time) and makes it most recently used.
    ///
    /// # Errors
    /// Returns `Error::InvalidTtl` for a zero TTL.
    pub fn insert(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        check_ttl(ttl)?;
        let ttl = ttl.or(self.inner.default_ttl);
        let now = Instant::now();
        let entry = Entry::new(value, ttl, now);

        let mut state = self.inner.lock();
        if let Some(idx) = state.index.get(key).copied() {
            state.node_mut(idx).entry = entry;
            state.move_to_front(idx);
        } else {
            if state.len() >= self.inner.max_size {
                if let Some(evicted) = state.evict_lru() {
                    debug!("✓ LruStore EVICT {} (capacity {})", evicted, self.inner.max_size);
                }
            }
            state.insert_new(key.to_string(), entry);
        }
        drop(state);

        match ttl {
            Some(d) => debug!("✓ LruStore SET {} (TTL: {:?})", key, d),
            None => debug!("✓ LruStore SET {}", key),
        }
        Ok(())
    }

    /// Remove a key. Returns `true` if a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        let now = Instant::now();
        let removed = self.inner.lock().remove_key(key);
        debug!("✓ LruStore DELETE {}", key);
        removed.is_some_and(|node| !node.entry.is_expired_at(now))
    }

    /// `true` if the key holds a live entry. Does not affect recency.
    pub fn contains(&self, key: &str) -> bool {
        self.peek(key).is_some()
    }

    /// Metadata of a live entry without touching recency or access stats.
    pub fn peek(&self, key: &str) -> Option<EntryMeta> {
        let now = Instant::now();
        let state = self.inner.lock();
        let idx = *state.index.get(key)?;
        let entry = &state.node(idx).entry;
        (!entry.is_expired_at(now)).then(|| entry.meta())
    }

    /// Current live keys, most recently used first.
    ///
    /// Expired entries met during the scan are purged as a side effect.
    pub fn live_keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.inner.lock().live_keys(now)
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    /// Remove every entry.
    pub fn flush(&self) {
        self.inner.lock().clear();
    }

    /// Number of physically stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get memory statistics.
    pub fn stats(&self) -> StoreStats {
        let now = Instant::now();
        let state = self.inner.lock();
        let mut expired_entries = 0;
        let mut total_bytes = 0;
        for node in state.slots.iter().flatten() {
            total_bytes += node.entry.value().len();
            if node.entry.is_expired_at(now) {
                expired_entries += 1;
            }
        }

        StoreStats {
            total_entries: state.len(),
            expired_entries,
            total_bytes,
            max_size: self.inner.max_size,
            evictions: state.evictions,
            expirations: state.expirations,
        }
    }

    /// Print store statistics to debug log.
    pub fn log_stats(&self) {
        let stats = self.stats();
        debug!(
            "LruStore stats: {}/{} entries ({} expired), {} bytes, {} evictions",
            stats.total_entries,
            stats.max_size,
            stats.expired_entries,
            stats.total_bytes,
            stats.evictions
        );
    }

    /// Start a background task purging expired entries every `interval`.
    ///
    /// The task stops when the returned handle is shut down or dropped, or
    /// once every clone of this store is gone. Must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` for a zero interval.
    pub fn spawn_sweeper(&self, interval: Duration) -> Result<SweepHandle> {
        SweepHandle::spawn(Arc::downgrade(&self.inner), interval)
    }
}

impl Default for LruStore {
    fn default() -> Self {
        LruStore {
            inner: Arc::new(StoreInner {
                state: Mutex::new(LruState::default()),
                max_size: DEFAULT_MAX_SIZE,
                default_ttl: None,
            }),
        }
    }
}

fn check_ttl(ttl: Option<Duration>) -> Result<()> {
    match ttl {
        Some(d) if d.is_zero() => Err(Error::InvalidTtl(
            "TTL must be greater than zero".to_string(),
        )),
        _ => Ok(()),
    }
}

impl CacheBackend for LruStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.insert(key, value, ttl)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.remove(key))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.contains(key))
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Vec<u8>>> {
        let found: HashMap<String, Vec<u8>> = keys
            .iter()
            .filter_map(|k| self.lookup(k).map(|v| ((*k).to_string(), v)))
            .collect();
        debug!("✓ LruStore MGET {} keys ({} found)", keys.len(), found.len());
        Ok(found)
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<usize> {
        let now = Instant::now();
        let mut state = self.inner.lock();
        let removed = keys
            .iter()
            .filter_map(|k| state.remove_key(k))
            .filter(|node| !node.entry.is_expired_at(now))
            .count();
        drop(state);

        debug!("✓ LruStore MDELETE {} keys ({} removed)", keys.len(), removed);
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.live_keys())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let pattern = KeyPattern::new(pattern)?;
        let now = Instant::now();
        let mut state = self.inner.lock();
        let matched: Vec<String> = state
            .live_keys(now)
            .into_iter()
            .filter(|k| pattern.matches(k))
            .collect();
        for key in &matched {
            state.remove_key(key);
        }
        drop(state);

        debug!("✓ LruStore DELETE_PATTERN {} -> {} keys", pattern, matched.len());
        Ok(matched.len())
    }

    async fn clear(&self) -> Result<()> {
        self.flush();
        warn!("⚠ LruStore CLEAR executed - all entries removed!");
        Ok(())
    }
}

/// Store statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: usize,
    pub max_size: usize,
    pub evictions: u64,
    pub expirations: u64,
}
