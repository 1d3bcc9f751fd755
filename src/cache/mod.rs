//! Cache Module
//!
//! The cache provider contract plus its in-memory (TTL + LRU) and Redis
//! implementations.

mod entry;
mod lru;
mod memory;
mod provider;
#[cfg(feature = "redis")]
mod redis;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use memory::InMemoryCacheProvider;
pub use provider::{CachePriority, CacheProvider, CacheProviderExt};
#[cfg(feature = "redis")]
pub use self::redis::{RedisCacheProvider, RedisSettings};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 512;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 4 * 1024 * 1024; // 4 MB
