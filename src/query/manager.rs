//! Query Manager Module
//!
//! Runs every repository read through a caching strategy.
//!
//! Each `execute_*` call asks the strategy for a cached result and, when
//! there is none, invokes the caller's materialization closure exactly once.
//! A successful result is saved under the key the lookup returned; an error
//! is handed back untouched and nothing is cached.

use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::caching::{CacheKey, CacheLookup, CachingStrategy, Query, QueryKind};
use crate::expr::{Selector, Specification};
use crate::query::{QueryOptions, QueryStats};
use crate::repository::Entity;

/// Observational state of the last read.
#[derive(Debug, Default)]
struct Diagnostics {
    cache_used: bool,
    trace_info: String,
    number_of_results: usize,
    stats: QueryStats,
}

// == Query Manager ==
pub struct QueryManager<T, S> {
    strategy: S,
    diagnostics: Mutex<Diagnostics>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, S: CachingStrategy<T>> QueryManager<T, S> {
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            diagnostics: Mutex::new(Diagnostics::default()),
            _entity: PhantomData,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    // == Diagnostics ==
    /// Whether the last read was served from cache.
    pub fn cache_used(&self) -> bool {
        self.diagnostics().cache_used
    }

    pub fn trace_info(&self) -> String {
        self.diagnostics().trace_info.clone()
    }

    pub fn number_of_results(&self) -> usize {
        self.diagnostics().number_of_results
    }

    pub fn stats(&self) -> QueryStats {
        self.diagnostics().stats
    }

    // == Entity Reads ==
    pub fn execute_get<R, E, F>(
        &self,
        key: &T::Key,
        selector: Option<&Selector>,
        materialize: F,
    ) -> Result<Option<R>, E>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<Option<R>, E>,
    {
        let lookup = self.strategy.try_get_result::<R>(key, selector).map(Some);
        self.run(QueryKind::Get, lookup, materialize, count_option, |k, v| {
            self.strategy.save_get_result(k, v)
        })
    }

    pub fn execute_get_all<R, E, F>(
        &self,
        selector: Option<&Selector>,
        options: Option<&QueryOptions>,
        materialize: F,
    ) -> Result<Vec<R>, E>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<Vec<R>, E>,
    {
        let lookup = self.strategy.try_get_all_result::<R>(selector, options);
        self.run(QueryKind::GetAll, lookup, materialize, Vec::len, |k, v| {
            self.strategy.save_get_all_result(k, v)
        })
    }

    pub fn execute_find<R, E, F>(
        &self,
        specification: &Specification<T>,
        selector: Option<&Selector>,
        options: Option<&QueryOptions>,
        materialize: F,
    ) -> Result<Option<R>, E>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<Option<R>, E>,
    {
        let lookup = self
            .strategy
            .try_find_result::<R>(specification, selector, options)
            .map(Some);
        self.run(QueryKind::Find, lookup, materialize, count_option, |k, v| {
            self.strategy.save_find_result(k, v)
        })
    }

    pub fn execute_find_all<R, E, F>(
        &self,
        specification: &Specification<T>,
        selector: Option<&Selector>,
        options: Option<&QueryOptions>,
        materialize: F,
    ) -> Result<Vec<R>, E>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<Vec<R>, E>,
    {
        let lookup = self
            .strategy
            .try_find_all_result::<R>(specification, selector, options);
        self.run(QueryKind::FindAll, lookup, materialize, Vec::len, |k, v| {
            self.strategy.save_find_all_result(k, v)
        })
    }

    // == Aggregates ==
    pub fn execute_count<E, F>(&self, specification: &Specification<T>, materialize: F) -> Result<usize, E>
    where
        F: FnOnce() -> Result<usize, E>,
    {
        self.aggregate(QueryKind::Count, specification, None, materialize, |_| 1)
    }

    pub fn execute_long_count<E, F>(&self, specification: &Specification<T>, materialize: F) -> Result<u64, E>
    where
        F: FnOnce() -> Result<u64, E>,
    {
        self.aggregate(QueryKind::LongCount, specification, None, materialize, |_| 1)
    }

    pub fn execute_sum<R, E, F>(
        &self,
        specification: &Specification<T>,
        selector: &Selector,
        materialize: F,
    ) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<R, E>,
    {
        self.aggregate(QueryKind::Sum, specification, Some(selector), materialize, |_| 1)
    }

    pub fn execute_average<R, E, F>(
        &self,
        specification: &Specification<T>,
        selector: &Selector,
        materialize: F,
    ) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<R, E>,
    {
        self.aggregate(QueryKind::Average, specification, Some(selector), materialize, |_| 1)
    }

    pub fn execute_min<R, E, F>(
        &self,
        specification: &Specification<T>,
        selector: &Selector,
        materialize: F,
    ) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<R, E>,
    {
        self.aggregate(QueryKind::Min, specification, Some(selector), materialize, |_| 1)
    }

    pub fn execute_max<R, E, F>(
        &self,
        specification: &Specification<T>,
        selector: &Selector,
        materialize: F,
    ) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<R, E>,
    {
        self.aggregate(QueryKind::Max, specification, Some(selector), materialize, |_| 1)
    }

    /// Group sizes keyed by `key_selector`.
    pub fn execute_group_counts<K, E, F>(
        &self,
        specification: &Specification<T>,
        key_selector: &Selector,
        materialize: F,
    ) -> Result<Vec<(K, usize)>, E>
    where
        K: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<Vec<(K, usize)>, E>,
    {
        self.aggregate(
            QueryKind::GroupCounts,
            specification,
            Some(key_selector),
            materialize,
            Vec::len,
        )
    }

    /// Group members keyed by `key_selector`.
    pub fn execute_group_items<K, R, E, F>(
        &self,
        specification: &Specification<T>,
        key_selector: &Selector,
        materialize: F,
    ) -> Result<Vec<(K, Vec<R>)>, E>
    where
        K: Serialize + DeserializeOwned,
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<Vec<(K, Vec<R>)>, E>,
    {
        self.aggregate(
            QueryKind::GroupItems,
            specification,
            Some(key_selector),
            materialize,
            |groups: &Vec<(K, Vec<R>)>| groups.iter().map(|(_, items)| items.len()).sum(),
        )
    }

    // == Internals ==
    fn aggregate<R, E, F, C>(
        &self,
        kind: QueryKind,
        specification: &Specification<T>,
        selector: Option<&Selector>,
        materialize: F,
        count: C,
    ) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<R, E>,
        C: Fn(&R) -> usize,
    {
        let query = Query::filtered(kind, specification).with_selector(selector);
        let lookup = self.strategy.lookup::<R>(&query);
        self.run(kind, lookup, materialize, &count, |key, value| {
            self.strategy.store(key, value, count(value))
        })
    }

    fn run<R, E, F, C, W>(
        &self,
        kind: QueryKind,
        lookup: CacheLookup<R>,
        materialize: F,
        count: C,
        save: W,
    ) -> Result<R, E>
    where
        F: FnOnce() -> Result<R, E>,
        C: Fn(&R) -> usize,
        W: FnOnce(&CacheKey, &R),
    {
        let entity = T::type_name();
        match lookup {
            CacheLookup::Hit(value) => {
                let n = count(&value);
                let mut d = self.diagnostics();
                d.stats.hits += 1;
                d.cache_used = true;
                d.number_of_results = n;
                d.trace_info = format!("{} {}: served from cache ({} results)", entity, kind, n);
                Ok(value)
            }
            CacheLookup::Miss(key) => {
                self.diagnostics().stats.misses += 1;
                let result = materialize();
                match &result {
                    Ok(value) => {
                        save(&key, value);
                        self.finish(format!("{} {}: cache miss, stored as {}", entity, kind, key), count(value));
                    }
                    Err(_) => self.finish(format!("{} {}: cache miss, query failed", entity, kind), 0),
                }
                result
            }
            CacheLookup::Bypassed(reason) => {
                self.diagnostics().stats.bypassed += 1;
                debug!(entity, kind = %kind, reason = %reason, "Cache bypassed");
                let result = materialize();
                let n = result.as_ref().map(|v| count(v)).unwrap_or(0);
                self.finish(format!("{} {}: cache bypassed ({})", entity, kind, reason), n);
                result
            }
        }
    }

    fn finish(&self, trace_info: String, number_of_results: usize) {
        let mut d = self.diagnostics();
        d.cache_used = false;
        d.number_of_results = number_of_results;
        d.trace_info = trace_info;
    }

    /// Diagnostics are observational, so a poisoned lock is recovered.
    fn diagnostics(&self) -> MutexGuard<'_, Diagnostics> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn count_option<R>(value: &Option<R>) -> usize {
    usize::from(value.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheProvider;
    use crate::caching::{NoCachingStrategy, StandardCachingStrategy};
    use crate::expr::{FieldAccess, Lambda, Value};
    use serde::Deserialize;
    use std::cell::Cell;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: i64,
        kind: String,
    }

    impl FieldAccess for Item {
        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "id" => Some(self.id.into()),
                "kind" => Some(self.kind.as_str().into()),
                _ => None,
            }
        }
    }

    impl Entity for Item {
        type Key = i64;

        fn type_name() -> &'static str {
            "Item"
        }

        fn primary_key(&self) -> i64 {
            self.id
        }

        fn set_primary_key(&mut self, key: i64) {
            self.id = key;
        }
    }

    fn manager() -> QueryManager<Item, StandardCachingStrategy<Item>> {
        let provider = Arc::new(InMemoryCacheProvider::default());
        QueryManager::new(StandardCachingStrategy::new(provider, "qm"))
    }

    fn item(id: i64) -> Item {
        Item { id, kind: "a".into() }
    }

    #[test]
    fn test_hit_after_miss_invokes_delegate_once() {
        let qm = manager();
        let calls = Cell::new(0);
        let load = || -> Result<Option<Item>, String> {
            calls.set(calls.get() + 1);
            Ok(Some(item(7)))
        };

        assert_eq!(qm.execute_get(&7, None, load).unwrap(), Some(item(7)));
        assert!(!qm.cache_used());
        assert_eq!(qm.execute_get(&7, None, load).unwrap(), Some(item(7)));
        assert!(qm.cache_used());
        assert_eq!(calls.get(), 1);
        assert_eq!(qm.number_of_results(), 1);
        assert!(qm.trace_info().contains("served from cache"));
    }

    #[test]
    fn test_errors_propagate_and_are_not_cached() {
        let qm = manager();
        let failed: Result<Option<Item>, &str> = qm.execute_get(&1, None, || Err("backend down"));
        assert_eq!(failed, Err("backend down"));

        let calls = Cell::new(0);
        let ok = qm
            .execute_get(&1, None, || -> Result<Option<Item>, &str> {
                calls.set(calls.get() + 1);
                Ok(Some(item(1)))
            })
            .unwrap();
        assert_eq!(ok, Some(item(1)));
        assert_eq!(calls.get(), 1);
        assert!(!qm.cache_used());
    }

    #[test]
    fn test_absent_get_is_not_cached() {
        let qm = manager();
        let calls = Cell::new(0);
        for _ in 0..2 {
            let found = qm
                .execute_get::<Item, (), _>(&5, None, || {
                    calls.set(calls.get() + 1);
                    Ok(None)
                })
                .unwrap();
            assert!(found.is_none());
        }
        assert_eq!(calls.get(), 2);
        assert_eq!(qm.stats().misses, 2);
    }

    #[test]
    fn test_projection_and_entity_reads_use_different_keys() {
        let qm = manager();
        let name = Lambda::field("kind");
        qm.execute_get::<Item, (), _>(&3, None, || Ok(Some(item(3)))).unwrap();

        let projected = qm
            .execute_get::<Value, (), _>(&3, Some(&name), || Ok(Some(Value::from("a"))))
            .unwrap();
        assert_eq!(projected, Some(Value::from("a")));
        assert!(!qm.cache_used());
    }

    #[test]
    fn test_aggregates_cache_per_kind() {
        let qm = manager();
        let spec = Specification::<Item>::all();
        let id = Lambda::field("id");

        assert_eq!(qm.execute_count::<(), _>(&spec, || Ok(3)).unwrap(), 3);
        assert_eq!(qm.execute_count::<(), _>(&spec, || Ok(99)).unwrap(), 3);
        assert!(qm.cache_used());

        // Same filter, different shape: not served from the count entry.
        assert_eq!(qm.execute_long_count::<(), _>(&spec, || Ok(4)).unwrap(), 4);
        assert!(!qm.cache_used());

        let sum: Value = qm.execute_sum::<_, (), _>(&spec, &id, || Ok(Value::Int(6))).unwrap();
        assert_eq!(sum, Value::Int(6));
        let max: Option<Value> = qm.execute_max::<_, (), _>(&spec, &id, || Ok(Some(Value::Int(3)))).unwrap();
        assert_eq!(max, Some(Value::Int(3)));

        let groups = qm
            .execute_group_counts::<Value, (), _>(&spec, &Lambda::field("kind"), || {
                Ok(vec![(Value::from("a"), 3)])
            })
            .unwrap();
        assert_eq!(qm.number_of_results(), 1);
        assert_eq!(groups, vec![(Value::from("a"), 3)]);
    }

    #[test]
    fn test_write_notification_invalidates_reads() {
        let qm = manager();
        let spec = Specification::<Item>::all();
        qm.execute_find_all::<Item, (), _>(&spec, None, None, || Ok(vec![item(1)]))
            .unwrap();
        qm.strategy().add_notification(&item(2));

        let all = qm
            .execute_find_all::<Item, (), _>(&spec, None, None, || Ok(vec![item(1), item(2)]))
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(!qm.cache_used());
        assert_eq!(qm.stats().misses, 2);
    }

    #[test]
    fn test_no_caching_always_materializes() {
        let qm: QueryManager<Item, NoCachingStrategy> = QueryManager::new(NoCachingStrategy);
        let calls = Cell::new(0);
        for _ in 0..3 {
            qm.execute_get_all::<Item, (), _>(None, None, || {
                calls.set(calls.get() + 1);
                Ok(vec![item(1)])
            })
            .unwrap();
        }
        assert_eq!(calls.get(), 3);
        assert_eq!(qm.stats().bypassed, 3);
        assert!(qm.trace_info().contains("bypassed"));
    }
}
