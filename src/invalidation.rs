//! Event- and pattern-based invalidation with key versioning.
//!
//! Rules map a glob pattern to an event type. When the event fires, every
//! backend key matching one of the event's patterns is deleted:
//!
//! ```
//! use cache_warden::backend::{CacheBackend, LruStore};
//! use cache_warden::Invalidator;
//!
//! # #[tokio::main]
//! # async fn main() -> cache_warden::Result<()> {
//! let store = LruStore::new(100)?;
//! for key in ["user:1", "user:2", "order:1"] {
//!     store.set(key, Vec::new(), None).await?;
//! }
//!
//! let invalidator = Invalidator::new(store.clone());
//! invalidator.register_pattern("user:*", "user_updated")?;
//!
//! assert_eq!(invalidator.invalidate_by_event("user_updated", None).await?, 2);
//! assert_eq!(store.keys().await?, vec!["order:1".to_string()]);
//! # Ok(())
//! # }
//! ```
//!
//! Versioned keys offer the other route: bump the version and every key built
//! with [`Invalidator::get_versioned_key`] before the bump is never read again.

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::key::CacheKeyBuilder;
use crate::pattern::KeyPattern;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

#[derive(Default)]
struct Rules {
    patterns: Vec<(KeyPattern, String)>,
    last_invalidation: Option<SystemTime>,
}

/// Turns events into batch deletions against a backend.
pub struct Invalidator<B: CacheBackend> {
    backend: B,
    rules: Mutex<Rules>,
    version: AtomicU64,
}

impl<B: CacheBackend> Invalidator<B> {
    pub fn new(backend: B) -> Self {
        Invalidator {
            backend,
            rules: Mutex::new(Rules::default()),
            version: AtomicU64::new(0),
        }
    }

    fn rules(&self) -> MutexGuard<'_, Rules> {
        self.rules.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a glob pattern for an event type.
    ///
    /// Several patterns may share an event, and the same pattern may serve
    /// several events.
    ///
    /// # Errors
    /// Returns `Error::InvalidPattern` for a malformed pattern.
    pub fn register_pattern(&self, pattern: &str, event_type: &str) -> Result<()> {
        let compiled = KeyPattern::new(pattern)?;
        self.rules()
            .patterns
            .push((compiled, event_type.to_string()));
        debug!("✓ Registered pattern {} for event {}", pattern, event_type);
        Ok(())
    }

    /// Drop every pattern registered for `event_type`. Returns how many were removed.
    pub fn unregister_event(&self, event_type: &str) -> usize {
        let mut rules = self.rules();
        let before = rules.patterns.len();
        rules.patterns.retain(|(_, event)| event != event_type);
        before - rules.patterns.len()
    }

    /// Patterns registered for `event_type`, in registration order.
    pub fn patterns_for(&self, event_type: &str) -> Vec<String> {
        self.rules()
            .patterns
            .iter()
            .filter(|(_, event)| event == event_type)
            .map(|(pattern, _)| pattern.as_str().to_string())
            .collect()
    }

    /// Invalidate the keys affected by an event.
    ///
    /// With `related_keys`, exactly those keys are deleted and their count is
    /// returned; patterns are not consulted. Otherwise every backend key
    /// matching at least one of the event's patterns is deleted and the number
    /// of distinct keys removed is returned. An event without patterns
    /// deletes nothing.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub async fn invalidate_by_event(
        &self,
        event_type: &str,
        related_keys: Option<&[&str]>,
    ) -> Result<usize> {
        if let Some(keys) = related_keys {
            let removed = self.backend.delete_many(keys).await?;
            self.touch();
            info!(
                "Invalidated {} related key(s) for event {}",
                removed, event_type
            );
            return Ok(keys.len());
        }

        // Patterns are cloned out so the lock is not held across awaits
        let patterns: Vec<KeyPattern> = self
            .rules()
            .patterns
            .iter()
            .filter(|(_, event)| event == event_type)
            .map(|(pattern, _)| pattern.clone())
            .collect();

        if patterns.is_empty() {
            debug!("No patterns registered for event {}", event_type);
            return Ok(0);
        }

        let matched: HashSet<String> = self
            .backend
            .keys()
            .await?
            .into_iter()
            .filter(|key| patterns.iter().any(|p| p.matches(key)))
            .collect();

        let refs: Vec<&str> = matched.iter().map(String::as_str).collect();
        let removed = self.backend.delete_many(&refs).await?;
        self.touch();

        info!(
            "Invalidated {} key(s) for event {} ({} pattern(s))",
            removed,
            event_type,
            patterns.len()
        );
        Ok(removed)
    }

    /// Prefix `key` with the current version: `"v{version}:{key}"`.
    pub fn get_versioned_key(&self, key: &str) -> String {
        CacheKeyBuilder::versioned(self.version(), key)
    }

    /// Bump the version, orphaning every previously versioned key.
    /// Returns the new version.
    pub fn increment_version(&self) -> u64 {
        let mut rules = self.rules();
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        rules.last_invalidation = Some(SystemTime::now());
        info!("Cache version bumped to {}", version);
        version
    }

    /// Current version. Starts at 0.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Wall-clock time of the last invalidation or version bump.
    pub fn last_invalidation(&self) -> Option<SystemTime> {
        self.rules().last_invalidation
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn touch(&self) {
        self.rules().last_invalidation = Some(SystemTime::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LruStore;
    use crate::error::Error;

    async fn seeded(keys: &[&str]) -> LruStore {
        let store = LruStore::new(100).expect("store");
        for key in keys {
            store
                .set(key, b"v".to_vec(), None)
                .await
                .expect("Failed to set");
        }
        store
    }

    #[tokio::test]
    async fn test_invalidate_by_pattern() {
        let store = seeded(&["user:1", "user:2", "order:1"]).await;
        let invalidator = Invalidator::new(store.clone());
        invalidator
            .register_pattern("user:*", "user_updated")
            .expect("valid pattern");

        let removed = invalidator
            .invalidate_by_event("user_updated", None)
            .await
            .expect("Failed to invalidate");

        assert_eq!(removed, 2);
        assert!(store.contains("order:1"));
        assert!(!store.contains("user:1"));
        assert!(invalidator.last_invalidation().is_some());
    }

    #[tokio::test]
    async fn test_overlapping_patterns_count_distinct_keys() {
        let store = seeded(&["user:1", "user:1:profile", "user:2"]).await;
        let invalidator = Invalidator::new(store.clone());
        invalidator
            .register_pattern("user:*", "user_updated")
            .expect("valid pattern");
        invalidator
            .register_pattern("user:1*", "user_updated")
            .expect("valid pattern");

        let removed = invalidator
            .invalidate_by_event("user_updated", None)
            .await
            .expect("Failed to invalidate");
        assert_eq!(removed, 3);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_related_keys_bypass_patterns() {
        let store = seeded(&["user:1", "user:2"]).await;
        let invalidator = Invalidator::new(store.clone());
        invalidator
            .register_pattern("user:*", "user_updated")
            .expect("valid pattern");

        let removed = invalidator
            .invalidate_by_event("user_updated", Some(&["user:1"]))
            .await
            .expect("Failed to invalidate");

        assert_eq!(removed, 1);
        assert!(store.contains("user:2"));
    }

    #[tokio::test]
    async fn test_unknown_event_deletes_nothing() {
        let store = seeded(&["user:1"]).await;
        let invalidator = Invalidator::new(store.clone());

        let removed = invalidator
            .invalidate_by_event("nothing_registered", None)
            .await
            .expect("Failed to invalidate");
        assert_eq!(removed, 0);
        assert_eq!(store.len(), 1);
        assert!(invalidator.last_invalidation().is_none());
    }

    #[test]
    fn test_malformed_pattern_rejected_at_registration() {
        let invalidator = Invalidator::new(LruStore::default());
        let result = invalidator.register_pattern("user:[", "user_updated");
        assert!(matches!(result, Err(Error::InvalidPattern(_))));
        assert!(invalidator.patterns_for("user_updated").is_empty());
    }

    #[test]
    fn test_versioned_keys() {
        let invalidator = Invalidator::new(LruStore::default());
        assert_eq!(invalidator.get_versioned_key("user:1"), "v0:user:1");

        assert_eq!(invalidator.increment_version(), 1);
        assert_eq!(invalidator.increment_version(), 2);
        assert_eq!(invalidator.get_versioned_key("user:1"), "v2:user:1");
        assert!(invalidator.last_invalidation().is_some());
    }

    #[test]
    fn test_patterns_for_and_unregister() {
        let invalidator = Invalidator::new(LruStore::default());
        invalidator.register_pattern("a:*", "e1").expect("valid");
        invalidator.register_pattern("b:*", "e1").expect("valid");
        invalidator.register_pattern("c:*", "e2").expect("valid");

        assert_eq!(invalidator.patterns_for("e1"), vec!["a:*", "b:*"]);
        assert_eq!(invalidator.unregister_event("e1"), 2);
        assert!(invalidator.patterns_for("e1").is_empty());
        assert_eq!(invalidator.patterns_for("e2"), vec!["c:*"]);
    }
}
