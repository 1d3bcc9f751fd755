//! Cache Store Module
//!
//! Single-threaded cache engine: HashMap storage with LRU eviction, TTL
//! expiration and integer counters. Wrapped in a lock by the in-memory provider.

use std::collections::HashMap;

use crate::cache::{CacheEntry, CachePriority, CacheStats, LruTracker, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{RepositoryError, Result};

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// TTL in seconds applied to removable entries written without one
    default_ttl: Option<u64>,
}

impl CacheStore {
    // == Constructor ==
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the cache can hold
    /// * `default_ttl` - TTL in seconds for removable entries written without one
    pub fn new(max_entries: usize, default_ttl: Option<u64>) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries,
            default_ttl,
        }
    }

    // == Set ==
    /// Stores a value, overwriting any existing entry and resetting its TTL.
    ///
    /// At capacity the least recently used removable entry is evicted;
    /// `NotRemovable` entries never expire by default and are never evicted.
    pub fn set(&mut self, key: &str, value: String, priority: CachePriority, ttl: Option<u64>) -> Result<()> {
        if key.len() > MAX_KEY_LENGTH {
            return Err(RepositoryError::Provider(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        if value.len() > MAX_VALUE_SIZE {
            return Err(RepositoryError::Provider(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            self.evict_one()?;
        }

        let effective_ttl = match priority {
            CachePriority::NotRemovable => ttl,
            _ => ttl.or(self.default_ttl),
        };

        self.entries
            .insert(key.to_string(), CacheEntry::new(value, priority, effective_ttl));
        self.lru.touch(key);
        self.stats.set_total_entries(self.entries.len());

        Ok(())
    }

    // == Get ==
    /// Returns the live value for `key`; expired entries are dropped and count as misses.
    pub fn get(&mut self, key: &str) -> Option<String> {
        match self.live_entry(key) {
            Some(value) => {
                self.stats.record_hit();
                self.lru.touch(key);
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Exists ==
    /// Like `get` without touching LRU order or statistics.
    pub fn exists(&mut self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    // == Remove ==
    /// Returns whether an entry was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    // == Increment ==
    /// Adds `by` to the counter at `key`, starting from `default` when absent.
    ///
    /// Counters are stored `NotRemovable` without expiry. Runs entirely under
    /// the caller's `&mut`, which is what makes the provider's increment atomic.
    pub fn increment(&mut self, key: &str, default: i64, by: i64) -> Result<i64> {
        let current = match self.live_entry(key) {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                RepositoryError::Provider(format!("Value at '{}' is not an integer", key))
            })?,
            None => default,
        };
        let next = current.checked_add(by).ok_or_else(|| {
            RepositoryError::Provider(format!("Counter at '{}' overflowed", key))
        })?;
        self.set(key, next.to_string(), CachePriority::NotRemovable, None)?;
        Ok(next)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
            self.lru.remove(key);
        }

        self.stats.record_expirations(expired.len());
        self.stats.set_total_entries(self.entries.len());
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Internals ==
    /// Value of a non-expired entry; drops the entry if it has expired.
    fn live_entry(&mut self, key: &str) -> Option<String> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.entries.remove(key);
            self.lru.remove(key);
            self.stats.record_expirations(1);
            self.stats.set_total_entries(self.entries.len());
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    fn evict_one(&mut self) -> Result<()> {
        let entries = &self.entries;
        let evicted = self
            .lru
            .evict_oldest_where(|k| entries.get(k).map(|e| e.is_evictable()).unwrap_or(true));
        match evicted {
            Some(key) => {
                self.entries.remove(&key);
                self.stats.record_eviction();
                Ok(())
            }
            None => Err(RepositoryError::Provider(
                "Cache is full and holds only non-removable entries".to_string(),
            )),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn store(max: usize) -> CacheStore {
        CacheStore::new(max, Some(300))
    }

    fn put(store: &mut CacheStore, key: &str, value: &str) {
        store
            .set(key, value.to_string(), CachePriority::Normal, None)
            .unwrap();
    }

    #[test]
    fn test_set_get_overwrite() {
        let mut store = store(10);
        put(&mut store, "k", "v1");
        put(&mut store, "k", "v2");
        assert_eq!(store.get("k").as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_missing_counts_miss() {
        let mut store = store(10);
        assert_eq!(store.get("nope"), None);
        put(&mut store, "k", "v");
        store.get("k");
        let stats = store.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_exists_does_not_touch_stats() {
        let mut store = store(10);
        put(&mut store, "k", "v");
        assert!(store.exists("k"));
        assert!(!store.exists("other"));
        assert_eq!(store.stats().hits + store.stats().misses, 0);
    }

    #[test]
    fn test_remove() {
        let mut store = store(10);
        put(&mut store, "k", "v");
        assert!(store.remove("k"));
        assert!(!store.remove("k"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_ttl_expiration() {
        let mut store = store(10);
        store
            .set("k", "v".to_string(), CachePriority::Normal, Some(1))
            .unwrap();
        assert!(store.get("k").is_some());

        sleep(Duration::from_millis(1100));

        assert!(store.get("k").is_none());
        assert_eq!(store.stats().expirations, 1);
    }

    #[test]
    fn test_lru_eviction_spares_pinned_entries() {
        let mut store = store(3);
        store.increment("gen", 1, 1).unwrap();
        put(&mut store, "a", "1");
        put(&mut store, "b", "2");

        // "gen" is oldest but pinned, so "a" goes.
        put(&mut store, "c", "3");

        assert_eq!(store.len(), 3);
        assert!(store.exists("gen"));
        assert!(!store.exists("a"));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_full_of_pinned_entries_rejects_writes() {
        let mut store = store(1);
        store.increment("gen", 0, 1).unwrap();
        let result = store.set("k", "v".to_string(), CachePriority::Normal, None);
        assert!(matches!(result, Err(RepositoryError::Provider(_))));
    }

    #[test]
    fn test_increment_uses_default_then_accumulates() {
        let mut store = store(10);
        assert_eq!(store.increment("gen", 1, 1).unwrap(), 2);
        assert_eq!(store.increment("gen", 1, 1).unwrap(), 3);
        assert_eq!(store.increment("gen", 1, 5).unwrap(), 8);
    }

    #[test]
    fn test_increment_rejects_non_integer() {
        let mut store = store(10);
        put(&mut store, "k", "abc");
        assert!(store.increment("k", 0, 1).is_err());
    }

    #[test]
    fn test_counters_ignore_default_ttl() {
        let mut store = CacheStore::new(10, Some(1));
        store.increment("gen", 1, 1).unwrap();

        sleep(Duration::from_millis(1100));

        assert_eq!(store.get("gen").as_deref(), Some("2"));
    }

    #[test]
    fn test_cleanup_expired() {
        let mut store = store(10);
        store
            .set("short", "v".to_string(), CachePriority::Normal, Some(1))
            .unwrap();
        store
            .set("long", "v".to_string(), CachePriority::Normal, Some(60))
            .unwrap();

        sleep(Duration::from_millis(1100));

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.exists("long"));
    }

    #[test]
    fn test_key_and_value_limits() {
        let mut store = store(10);
        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);
        assert!(store
            .set(&long_key, "v".to_string(), CachePriority::Normal, None)
            .is_err());

        let large_value = "x".repeat(MAX_VALUE_SIZE + 1);
        assert!(store
            .set("k", large_value, CachePriority::Normal, None)
            .is_err());
    }
}
