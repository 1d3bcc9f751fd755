//! Cache Entry Module
//!
//! A stored value with its priority and optional expiration.

use chrono::Utc;

use crate::cache::CachePriority;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized value
    pub value: String,
    /// Eviction priority
    pub priority: CachePriority,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<i64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL in seconds.
    pub fn new(value: String, priority: CachePriority, ttl_seconds: Option<u64>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl_seconds.map(|ttl| now.saturating_add((ttl as i64).saturating_mul(1000)));

        Self {
            value,
            priority,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires| current_timestamp_ms() >= expires)
            .unwrap_or(false)
    }

    pub fn is_evictable(&self) -> bool {
        self.priority != CachePriority::NotRemovable
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}
