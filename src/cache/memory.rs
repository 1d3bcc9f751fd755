//! In-Memory Cache Provider
//!
//! `CacheProvider` over a lock-protected `CacheStore`.

use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::cache::{CachePriority, CacheProvider, CacheStats, CacheStore};
use crate::error::{RepositoryError, Result};

/// Process-local provider. Share it between repositories through an `Arc`.
#[derive(Debug)]
pub struct InMemoryCacheProvider {
    store: Mutex<CacheStore>,
}

impl InMemoryCacheProvider {
    /// # Arguments
    /// * `max_entries` - Capacity before LRU eviction kicks in
    /// * `default_ttl` - TTL in seconds for removable entries written without one
    pub fn new(max_entries: usize, default_ttl: Option<u64>) -> Self {
        Self {
            store: Mutex::new(CacheStore::new(max_entries, default_ttl)),
        }
    }

    /// Drops every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let removed = self.lock()?.cleanup_expired();
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        Ok(self.lock()?.stats())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheStore>> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::Provider("In-memory cache lock poisoned".to_string()))
    }
}

impl Default for InMemoryCacheProvider {
    fn default() -> Self {
        Self::new(10_000, None)
    }
}

impl CacheProvider for InMemoryCacheProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn set(&self, key: &str, value: String, priority: CachePriority, ttl_seconds: Option<u64>) -> Result<()> {
        self.lock()?.set(key, value, priority, ttl_seconds)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.exists(key))
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn increment(&self, key: &str, default_value: i64, increment_by: i64) -> Result<i64> {
        self.lock()?.increment(key, default_value, increment_by)
    }
}
