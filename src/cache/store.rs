//! Cache Store Module
//!
//! Keyed response storage with permanent and time-bounded retention.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::{CacheEntry, CacheStats};

// == Cache Store ==
/// In-memory store mapping a request key to a cached payload.
///
/// Entries are either permanent or expire after a TTL. Expired entries are
/// dropped when read; [`CacheStore::cleanup_expired`] may sweep them early
/// without changing what `get` returns.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Hit/miss counters
    stats: CacheStats,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
        }
    }

    // == Put ==
    /// Stores `value` under `key`.
    ///
    /// With a TTL the entry expires at `now + ttl`; without one it is kept
    /// until overwritten. Any existing entry for `key` is replaced together
    /// with its retention policy.
    pub fn put(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        self.put_at(key, value, ttl, Instant::now());
    }

    /// Stores `value` as if the write happened at `now`.
    pub fn put_at(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>, now: Instant) {
        self.entries
            .insert(key.into(), CacheEntry::stored_at(value, ttl, now));
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns the value stored under `key` if it is still servable.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Looks up `key` as of `now`.
    pub fn get_at(&mut self, key: &str, now: Instant) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => true,
            Some(entry) => {
                self.stats.record_hit();
                return Some(entry.value.clone());
            }
            None => false,
        };

        if expired {
            self.entries.remove(key);
            self.stats.set_total_entries(self.entries.len());
            self.stats.record_expired_on_read();
        } else {
            self.stats.record_miss();
        }
        None
    }

    // == Cleanup Expired ==
    /// Removes every entry that has expired at `now`.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - self.entries.len();

        self.stats.record_swept(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    /// Removes every entry that has expired by now.
    pub fn cleanup_expired(&mut self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    // == Stats ==
    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
