//! Caching Strategy Module
//!
//! The contract between the query manager and a cache provider.

use serde::{de::DeserializeOwned, Serialize};

use crate::caching::{CacheKey, CacheLookup, Query};
use crate::expr::{Selector, Specification};
use crate::query::QueryOptions;
use crate::repository::Entity;

// == Caching Strategy ==
/// Mediates between repository reads/writes and a cache provider.
///
/// `lookup` and `store` are the primitives; the named `try_*`/`save_*` pairs
/// cover each repository read shape. A save always uses the key returned by
/// the matching lookup, so a write that lands in between cannot make a stale
/// result reachable under the new generation.
///
/// Implementations never return provider errors: every provider failure is
/// logged and degrades to a miss, a bypass, or a skipped save.
pub trait CachingStrategy<T: Entity>: Send + Sync {
    fn name(&self) -> &str;

    fn lookup<R: DeserializeOwned>(&self, query: &Query<'_, T>) -> CacheLookup<R>;

    /// Writes a computed result; `number_of_results` feeds the result-size cap.
    fn store<R: Serialize>(&self, key: &CacheKey, value: &R, number_of_results: usize);

    /// Invalidates every cached read of this entity type.
    fn invalidate(&self);

    // == Get ==
    fn try_get_result<R: DeserializeOwned>(
        &self,
        key: &T::Key,
        selector: Option<&Selector>,
    ) -> CacheLookup<R> {
        self.lookup(&Query::get(key).with_selector(selector))
    }

    /// Absent results are not cached.
    fn save_get_result<R: Serialize>(&self, key: &CacheKey, value: &Option<R>) {
        if let Some(value) = value {
            self.store(key, value, 1);
        }
    }

    // == Get All ==
    fn try_get_all_result<R: DeserializeOwned>(
        &self,
        selector: Option<&Selector>,
        options: Option<&QueryOptions>,
    ) -> CacheLookup<Vec<R>> {
        self.lookup(&Query::get_all().with_selector(selector).with_options(options))
    }

    fn save_get_all_result<R: Serialize>(&self, key: &CacheKey, values: &[R]) {
        self.store(key, &values, values.len());
    }

    // == Find ==
    fn try_find_result<R: DeserializeOwned>(
        &self,
        specification: &Specification<T>,
        selector: Option<&Selector>,
        options: Option<&QueryOptions>,
    ) -> CacheLookup<R> {
        self.lookup(
            &Query::find(specification)
                .with_selector(selector)
                .with_options(options),
        )
    }

    /// Absent results are not cached.
    fn save_find_result<R: Serialize>(&self, key: &CacheKey, value: &Option<R>) {
        if let Some(value) = value {
            self.store(key, value, 1);
        }
    }

    // == Find All ==
    fn try_find_all_result<R: DeserializeOwned>(
        &self,
        specification: &Specification<T>,
        selector: Option<&Selector>,
        options: Option<&QueryOptions>,
    ) -> CacheLookup<Vec<R>> {
        self.lookup(
            &Query::find_all(specification)
                .with_selector(selector)
                .with_options(options),
        )
    }

    fn save_find_all_result<R: Serialize>(&self, key: &CacheKey, values: &[R]) {
        self.store(key, &values, values.len());
    }

    // == Write Notifications ==
    fn add_notification(&self, _entity: &T) {
        self.invalidate();
    }

    fn update_notification(&self, _entity: &T) {
        self.invalidate();
    }

    fn delete_notification(&self, _key: &T::Key) {
        self.invalidate();
    }

    /// Called once after a batch of writes.
    fn save_changes_notification(&self) {
        self.invalidate();
    }
}

// == No Caching ==
/// Null strategy: every lookup bypasses and every save or notification is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCachingStrategy;

impl<T: Entity> CachingStrategy<T> for NoCachingStrategy {
    fn name(&self) -> &str {
        "none"
    }

    fn lookup<R: DeserializeOwned>(&self, query: &Query<'_, T>) -> CacheLookup<R> {
        CacheLookup::Bypassed(format!("caching disabled for {}", query.kind))
    }

    fn store<R: Serialize>(&self, _key: &CacheKey, _value: &R, _number_of_results: usize) {}

    fn invalidate(&self) {}
}
