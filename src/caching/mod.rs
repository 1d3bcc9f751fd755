//! Caching Module
//!
//! Cache key derivation, generational invalidation and the strategies that
//! decide how repository reads are cached.

mod configured;
mod key;
mod query;
mod standard;
mod strategy;

// Re-export public types
pub use configured::ConfiguredStrategy;
pub use key::{CacheKey, KeyNamespace};
pub use query::{CacheEverything, CacheLookup, CachePolicy, Query, QueryKind};
pub use standard::{StandardCachingStrategy, TimeoutCachingStrategy, INITIAL_GENERATION};
pub use strategy::{CachingStrategy, NoCachingStrategy};
