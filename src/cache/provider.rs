//! Cache Provider Module
//!
//! The key/value contract every cache backend implements.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

// == Priority ==
/// Eviction priority hint passed with every write.
///
/// `NotRemovable` entries are never evicted to make room; generation counters
/// rely on this, since a lost counter would resurrect invalidated results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePriority {
    Low,
    #[default]
    Normal,
    High,
    NotRemovable,
}

// == Cache Provider ==
/// Uniform key/value cache contract.
///
/// Implementations must be safe for concurrent use and `increment` must be a
/// single atomic operation: two concurrent increments from 5 must end at 7.
/// Disposal is `Drop`.
pub trait CacheProvider: Send + Sync {
    /// Short backend name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Stores `value` under `key`; `ttl_seconds` of `None` uses the provider default.
    fn set(&self, key: &str, value: String, priority: CachePriority, ttl_seconds: Option<u64>) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<String>>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// Removes `key`; removing a missing key is not an error.
    fn clear(&self, key: &str) -> Result<()>;

    /// Atomically adds `increment_by` to the integer at `key` and returns the new value.
    ///
    /// A missing key starts from `default_value`, so the first call returns
    /// `default_value + increment_by`.
    fn increment(&self, key: &str, default_value: i64, increment_by: i64) -> Result<i64>;
}

// == Typed Helpers ==
/// JSON (de)serialization on top of any provider.
pub trait CacheProviderExt: CacheProvider {
    fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        priority: CachePriority,
        ttl_seconds: Option<u64>,
    ) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.set(key, json, priority, ttl_seconds)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

impl<P: CacheProvider + ?Sized> CacheProviderExt for P {}
