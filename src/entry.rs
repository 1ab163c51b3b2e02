//! Cache entry with TTL and access metadata.

use std::time::Duration;
use tokio::time::Instant;

/// A stored value plus the metadata needed for expiry and LRU decisions.
///
/// Timestamps come from [`tokio::time::Instant`], which follows the paused
/// test clock under `tokio::time::pause()` and the system monotonic clock
/// otherwise.
#[derive(Debug, Clone)]
pub struct Entry {
    value: Vec<u8>,
    created_at: Instant,
    ttl: Option<Duration>,
    last_accessed: Instant,
    access_count: u64,
}

impl Entry {
    /// Create an entry stamped with `now`.
    pub fn new(value: Vec<u8>, ttl: Option<Duration>, now: Instant) -> Self {
        Entry {
            value,
            created_at: now,
            ttl,
            last_accessed: now,
            access_count: 0,
        }
    }

    /// `true` when a TTL is set and more than `ttl` has elapsed since creation.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(self.created_at) > ttl,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Time left before expiry, `None` for entries without TTL.
    pub fn remaining_ttl(&self, now: Instant) -> Option<Duration> {
        self.ttl
            .map(|ttl| ttl.saturating_sub(now.saturating_duration_since(self.created_at)))
    }

    /// Record a successful read.
    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Metadata view without the payload.
    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            created_at: self.created_at,
            ttl: self.ttl,
            last_accessed: self.last_accessed,
            access_count: self.access_count,
            size: self.value.len(),
        }
    }
}

/// Read-only snapshot of an entry's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub created_at: Instant,
    pub ttl: Option<Duration>,
    pub last_accessed: Instant,
    pub access_count: u64,
    pub size: usize,
}
