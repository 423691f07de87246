//! Cache Entry Module
//!
//! Defines a single cached payload together with its retention policy.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// A cached payload and the instant after which it is no longer served.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached payload
    pub value: V,
    /// When the entry was stored
    pub created_at: Instant,
    /// Expiry instant, None = permanent retention
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stored now.
    ///
    /// # Arguments
    /// * `value` - The payload to store
    /// * `ttl` - Optional time-to-live; `None` keeps the entry forever
    pub fn new(value: V, ttl: Option<Duration>) -> Self {
        Self::stored_at(value, ttl, Instant::now())
    }

    /// Creates an entry as if it had been stored at `now`.
    pub fn stored_at(value: V, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            created_at: now,
            // An overflowing deadline is as good as permanent
            expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has expired at `now`.
    ///
    /// An entry is expired once `now >= expires_at`, so a zero TTL is
    /// never served.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Checks whether the entry has expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Returns true if the entry never expires.
    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None for permanent entries.
    ///
    /// Expired entries report `Duration::ZERO`.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }
}
