//! LRU Tracker Module
//!
//! Least-recently-used ordering for cache eviction.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Tracks access order with a logical clock.
///
/// Every touch stamps the key with the next tick; the smallest tick is the
/// least recently used key. Touch, remove and eviction are O(log n).
#[derive(Debug, Default)]
pub struct LruTracker {
    clock: u64,
    /// tick -> key, oldest first
    by_tick: BTreeMap<u64, String>,
    /// key -> tick
    ticks: HashMap<String, u64>,
}

impl LruTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: &str) {
        self.clock += 1;
        if let Some(old) = self.ticks.insert(key.to_string(), self.clock) {
            self.by_tick.remove(&old);
        }
        self.by_tick.insert(self.clock, key.to_string());
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) {
        if let Some(tick) = self.ticks.remove(key) {
            self.by_tick.remove(&tick);
        }
    }

    // == Evict ==
    /// Removes and returns the least recently used key accepted by `evictable`.
    ///
    /// Keys rejected by `evictable` keep their position.
    pub fn evict_oldest_where<F>(&mut self, mut evictable: F) -> Option<String>
    where
        F: FnMut(&str) -> bool,
    {
        let tick = self
            .by_tick
            .iter()
            .find(|(_, key)| evictable(key))
            .map(|(tick, _)| *tick)?;
        let key = self.by_tick.remove(&tick)?;
        self.ticks.remove(&key);
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}
