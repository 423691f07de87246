//! Cache Statistics Module
//!
//! Tracks hits, misses and expirations of the response cache.

use serde::Serialize;

// == Cache Stats ==
/// Response cache counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing servable (absent or expired)
    pub misses: u64,
    /// Entries dropped on read because their TTL had elapsed
    pub expired_on_read: u64,
    /// Entries dropped by the background sweep
    pub swept: u64,
    /// Current number of stored entries, expired or not
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Records a lazy eviction; the lookup itself still counts as a miss.
    pub fn record_expired_on_read(&mut self) {
        self.expired_on_read += 1;
        self.misses += 1;
    }

    pub fn record_swept(&mut self, count: usize) {
        self.swept += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.expired_on_read, 0);
        assert_eq!(stats.swept, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_expired_on_read();
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_expired_on_read_counts_as_miss() {
        let mut stats = CacheStats::new();
        stats.record_expired_on_read();
        assert_eq!(stats.expired_on_read, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_record_swept_accumulates() {
        let mut stats = CacheStats::new();
        stats.record_swept(3);
        stats.record_swept(2);
        assert_eq!(stats.swept, 5);
    }
}
