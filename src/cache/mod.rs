//! Cache Module
//!
//! In-process response cache keyed by request path and query string, with
//! permanent and time-bounded retention.

mod entry;
mod stats;
mod store;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::response::ResponseEnvelope;

// Re-export public types
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::CacheStore;

/// Cache of fully built response envelopes.
pub type ResponseCache = CacheStore<ResponseEnvelope>;

/// Response cache shared between handlers and background tasks.
pub type SharedCache = Arc<RwLock<ResponseCache>>;

// == Cache Policy ==
/// Retention policy chosen per route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Kept until overwritten; used for static infrastructure layers
    Permanent,
    /// Expires after the configured cache timeout
    Temporary,
}

impl CachePolicy {
    /// Resolves the policy to a TTL given the configured temporary timeout.
    pub fn ttl(self, temporary: Duration) -> Option<Duration> {
        match self {
            CachePolicy::Permanent => None,
            CachePolicy::Temporary => Some(temporary),
        }
    }
}

/// Creates an empty shared response cache.
pub fn shared() -> SharedCache {
    Arc::new(RwLock::new(ResponseCache::new()))
}
