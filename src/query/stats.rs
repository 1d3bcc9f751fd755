//! Query Statistics Module
//!
//! Per-repository counters for how reads were served.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QueryStats {
    /// Reads served from cache
    pub hits: u64,
    /// Reads that materialized and were eligible for caching
    pub misses: u64,
    /// Reads that skipped the cache entirely
    pub bypassed: u64,
}

impl QueryStats {
    pub fn total(&self) -> u64 {
        self.hits + self.misses + self.bypassed
    }

    /// hits / total, or 0.0 before the first read.
    pub fn hit_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}
