//! Provider-backed caching strategies.
//!
//! `StandardCachingStrategy` qualifies every result key with the generation
//! counter of its `(entity type, key type)` namespace; a write bumps the
//! counter and so orphans all earlier keys at once. `TimeoutCachingStrategy`
//! leaves the generation out and relies on the TTL alone.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{CachePriority, CacheProvider, CacheProviderExt};
use crate::caching::{
    CacheEverything, CacheKey, CacheLookup, CachePolicy, CachingStrategy, KeyNamespace, Query,
};
use crate::error::{RepositoryError, Result};
use crate::repository::Entity;

/// Generation assumed before the first write.
pub const INITIAL_GENERATION: i64 = 1;

// == Standard Strategy ==
pub struct StandardCachingStrategy<T> {
    provider: Arc<dyn CacheProvider>,
    namespace: KeyNamespace,
    ttl_seconds: Option<u64>,
    max_results: Option<usize>,
    policy: Arc<dyn CachePolicy>,
    generational: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> StandardCachingStrategy<T> {
    /// # Arguments
    /// * `provider` - Shared cache provider
    /// * `prefix` - First segment of every key this strategy writes
    pub fn new(provider: Arc<dyn CacheProvider>, prefix: &str) -> Self {
        Self {
            provider,
            namespace: KeyNamespace::for_entity::<T>(prefix),
            ttl_seconds: None,
            max_results: None,
            policy: Arc::new(CacheEverything),
            generational: true,
            _entity: PhantomData,
        }
    }

    /// TTL for cached results; `None` leaves it to the provider default.
    pub fn with_timeout(mut self, ttl_seconds: Option<u64>) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Result lists longer than `max_results` are not cached.
    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_policy(mut self, policy: impl CachePolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn generation_key(&self) -> String {
        self.namespace.generation_key()
    }

    /// Current generation; a missing counter reads as [`INITIAL_GENERATION`].
    pub fn generation(&self) -> Result<i64> {
        let key = self.namespace.generation_key();
        match self.provider.get(&key)? {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                RepositoryError::Provider(format!(
                    "Generation counter at '{}' is not an integer",
                    key
                ))
            }),
            None => Ok(INITIAL_GENERATION),
        }
    }

    fn cache_key(&self, query: &Query<'_, T>) -> std::result::Result<CacheKey, String> {
        let generation = if self.generational {
            match self.generation() {
                Ok(generation) => Some(generation),
                Err(e) => {
                    warn!(
                        provider = self.provider.name(),
                        error = %e,
                        "Generation read failed; bypassing cache"
                    );
                    return Err(format!("generation unavailable: {}", e));
                }
            }
        } else {
            None
        };

        let canonical = query.canonical().map_err(|e| {
            warn!(
                entity = T::type_name(),
                kind = %query.kind,
                error = %e,
                "Query cannot be cached"
            );
            e.to_string()
        })?;

        Ok(self.namespace.result_key(generation, query.kind, &canonical))
    }
}

impl<T> fmt::Debug for StandardCachingStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardCachingStrategy")
            .field("provider", &self.provider.name())
            .field("namespace", &self.namespace)
            .field("ttl_seconds", &self.ttl_seconds)
            .field("max_results", &self.max_results)
            .field("generational", &self.generational)
            .finish()
    }
}

impl<T: Entity> CachingStrategy<T> for StandardCachingStrategy<T> {
    fn name(&self) -> &str {
        if self.generational {
            "standard"
        } else {
            "timeout"
        }
    }

    fn lookup<R: DeserializeOwned>(&self, query: &Query<'_, T>) -> CacheLookup<R> {
        if !T::cache_enabled() {
            return CacheLookup::Bypassed(format!("caching disabled for {}", T::type_name()));
        }
        if !self.policy.should_cache(query.kind) {
            return CacheLookup::Bypassed(format!("policy skips {}", query.kind));
        }

        let key = match self.cache_key(query) {
            Ok(key) => key,
            Err(reason) => return CacheLookup::Bypassed(reason),
        };

        match self.provider.get_json(key.as_str()) {
            Ok(Some(value)) => {
                debug!(key = %key, "Cache hit");
                CacheLookup::Hit(value)
            }
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                CacheLookup::Miss(key)
            }
            Err(e) => {
                warn!(
                    provider = self.provider.name(),
                    key = %key,
                    error = %e,
                    "Cache read failed; treating as miss"
                );
                CacheLookup::Miss(key)
            }
        }
    }

    fn store<R: Serialize>(&self, key: &CacheKey, value: &R, number_of_results: usize) {
        if let Some(max) = self.max_results {
            if number_of_results > max {
                debug!(key = %key, number_of_results, max, "Result too large to cache");
                return;
            }
        }

        if let Err(e) =
            self.provider
                .set_json(key.as_str(), value, CachePriority::Normal, self.ttl_seconds)
        {
            warn!(
                provider = self.provider.name(),
                key = %key,
                error = %e,
                "Cache write failed"
            );
        }
    }

    fn invalidate(&self) {
        if !self.generational {
            return;
        }
        let key = self.namespace.generation_key();
        match self.provider.increment(&key, INITIAL_GENERATION, 1) {
            Ok(generation) => debug!(key = %key, generation, "Generation bumped"),
            Err(e) => warn!(
                provider = self.provider.name(),
                key = %key,
                error = %e,
                "Generation bump failed; cached reads may be stale"
            ),
        }
    }
}

// == Timeout Strategy ==
/// Caches with a TTL only; writes do not invalidate.
#[derive(Debug)]
pub struct TimeoutCachingStrategy<T>(StandardCachingStrategy<T>);

impl<T: Entity> TimeoutCachingStrategy<T> {
    pub fn new(provider: Arc<dyn CacheProvider>, prefix: &str, ttl_seconds: Option<u64>) -> Self {
        let mut inner = StandardCachingStrategy::new(provider, prefix).with_timeout(ttl_seconds);
        inner.generational = false;
        Self(inner)
    }

    pub fn with_max_results(self, max_results: Option<usize>) -> Self {
        Self(self.0.with_max_results(max_results))
    }

    pub fn with_policy(self, policy: impl CachePolicy + 'static) -> Self {
        Self(self.0.with_policy(policy))
    }
}

impl<T: Entity> CachingStrategy<T> for TimeoutCachingStrategy<T> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn lookup<R: DeserializeOwned>(&self, query: &Query<'_, T>) -> CacheLookup<R> {
        self.0.lookup(query)
    }

    fn store<R: Serialize>(&self, key: &CacheKey, value: &R, number_of_results: usize) {
        self.0.store(key, value, number_of_results)
    }

    fn invalidate(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheProvider;
    use crate::caching::QueryKind;
    use crate::error::Result;
    use crate::expr::{FieldAccess, Specification, Value};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: i32,
        title: String,
    }

    impl FieldAccess for Note {
        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "id" => Some(self.id.into()),
                "title" => Some(self.title.as_str().into()),
                _ => None,
            }
        }
    }

    impl Entity for Note {
        type Key = i32;

        fn type_name() -> &'static str {
            "Note"
        }

        fn primary_key(&self) -> i32 {
            self.id
        }

        fn set_primary_key(&mut self, key: i32) {
            self.id = key;
        }
    }

    /// Provider whose every call fails.
    struct BrokenProvider;

    impl CacheProvider for BrokenProvider {
        fn name(&self) -> &str {
            "broken"
        }

        fn set(&self, _: &str, _: String, _: CachePriority, _: Option<u64>) -> Result<()> {
            Err(RepositoryError::Provider("connection refused".into()))
        }

        fn get(&self, _: &str) -> Result<Option<String>> {
            Err(RepositoryError::Provider("connection refused".into()))
        }

        fn exists(&self, _: &str) -> Result<bool> {
            Err(RepositoryError::Provider("connection refused".into()))
        }

        fn clear(&self, _: &str) -> Result<()> {
            Err(RepositoryError::Provider("connection refused".into()))
        }

        fn increment(&self, _: &str, _: i64, _: i64) -> Result<i64> {
            Err(RepositoryError::Provider("connection refused".into()))
        }
    }

    /// In-memory provider whose result reads fail while the generation counter stays readable.
    struct FlakyResultReads(InMemoryCacheProvider);

    impl CacheProvider for FlakyResultReads {
        fn name(&self) -> &str {
            "flaky"
        }

        fn set(&self, key: &str, value: String, priority: CachePriority, ttl: Option<u64>) -> Result<()> {
            self.0.set(key, value, priority, ttl)
        }

        fn get(&self, key: &str) -> Result<Option<String>> {
            if key.ends_with("/generation") {
                self.0.get(key)
            } else {
                Err(RepositoryError::Provider("read timed out".into()))
            }
        }

        fn exists(&self, key: &str) -> Result<bool> {
            self.0.exists(key)
        }

        fn clear(&self, key: &str) -> Result<()> {
            self.0.clear(key)
        }

        fn increment(&self, key: &str, default_value: i64, increment_by: i64) -> Result<i64> {
            self.0.increment(key, default_value, increment_by)
        }
    }

    fn note(id: i32) -> Note {
        Note {
            id,
            title: format!("note {}", id),
        }
    }

    fn strategy() -> (Arc<InMemoryCacheProvider>, StandardCachingStrategy<Note>) {
        let provider = Arc::new(InMemoryCacheProvider::default());
        let strategy = StandardCachingStrategy::new(provider.clone(), "test");
        (provider, strategy)
    }

    fn miss_key<R: std::fmt::Debug>(lookup: CacheLookup<R>) -> CacheKey {
        match lookup {
            CacheLookup::Miss(key) => key,
            other => panic!("expected miss, got {:?}", other),
        }
    }

    #[test]
    fn test_get_hit_after_save() {
        let (_, strategy) = strategy();
        let key = miss_key(strategy.try_get_result::<Note>(&1, None));
        strategy.save_get_result(&key, &Some(note(1)));

        match strategy.try_get_result::<Note>(&1, None) {
            CacheLookup::Hit(found) => assert_eq!(found, note(1)),
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn test_absent_result_is_not_cached() {
        let (_, strategy) = strategy();
        let key = miss_key(strategy.try_get_result::<Note>(&9, None));
        strategy.save_get_result::<Note>(&key, &None);
        assert!(!strategy.try_get_result::<Note>(&9, None).is_hit());
    }

    #[test]
    fn test_write_notification_moves_generation() {
        let (provider, strategy) = strategy();
        assert_eq!(strategy.generation().unwrap(), INITIAL_GENERATION);

        let key = miss_key(strategy.try_get_result::<Note>(&1, None));
        strategy.save_get_result(&key, &Some(note(1)));
        strategy.update_notification(&note(1));

        assert_eq!(strategy.generation().unwrap(), 2);
        assert!(!strategy.try_get_result::<Note>(&1, None).is_hit());
        // Counter is stored under the documented key.
        assert_eq!(
            provider.get("test/Note/i32/generation").unwrap().as_deref(),
            Some("2")
        );
    }

    #[test]
    fn test_stale_save_lands_under_old_generation() {
        let (_, strategy) = strategy();
        let key = miss_key(strategy.try_get_result::<Note>(&1, None));
        strategy.delete_notification(&1);
        strategy.save_get_result(&key, &Some(note(1)));
        assert!(!strategy.try_get_result::<Note>(&1, None).is_hit());
    }

    #[test]
    fn test_find_all_respects_max_results() {
        let (_, strategy) = strategy();
        let strategy = strategy.with_max_results(Some(2));
        let spec = Specification::<Note>::all();

        let key = miss_key(strategy.try_find_all_result::<Note>(&spec, None, None));
        strategy.save_find_all_result(&key, &[note(1), note(2), note(3)]);
        assert!(!strategy.try_find_all_result::<Note>(&spec, None, None).is_hit());

        strategy.save_find_all_result(&key, &[note(1), note(2)]);
        assert!(strategy.try_find_all_result::<Note>(&spec, None, None).is_hit());
    }

    #[test]
    fn test_policy_can_skip_shapes() {
        let (_, strategy) = strategy();
        let strategy = strategy.with_policy(|kind: QueryKind| kind != QueryKind::FindAll);
        let spec = Specification::<Note>::all();
        assert!(matches!(
            strategy.try_find_all_result::<Note>(&spec, None, None),
            CacheLookup::Bypassed(_)
        ));
        assert!(matches!(
            strategy.try_get_result::<Note>(&1, None),
            CacheLookup::Miss(_)
        ));
    }

    #[test]
    fn test_unsupported_expression_bypasses() {
        let (_, strategy) = strategy();
        let spec = Specification::<Note>::build("n", |n| {
            crate::expr::Expr::opaque("is_even", n.member("id"), |v| {
                Value::Bool(matches!(v, Value::Int(i) if i % 2 == 0))
            })
        });
        assert!(matches!(
            strategy.try_find_result::<Note>(&spec, None, None),
            CacheLookup::Bypassed(_)
        ));
    }

    #[test]
    fn test_broken_provider_fails_open() {
        let strategy = StandardCachingStrategy::<Note>::new(Arc::new(BrokenProvider), "test");
        assert!(matches!(
            strategy.try_get_result::<Note>(&1, None),
            CacheLookup::Bypassed(_)
        ));
        let timeout = TimeoutCachingStrategy::<Note>::new(Arc::new(BrokenProvider), "test", Some(5));
        let key = miss_key(timeout.try_get_result::<Note>(&1, None));
        timeout.save_get_result(&key, &Some(note(1)));
        timeout.add_notification(&note(1));
    }

    #[test]
    fn test_failed_result_read_is_a_miss() {
        let provider = Arc::new(FlakyResultReads(InMemoryCacheProvider::default()));
        let strategy = StandardCachingStrategy::<Note>::new(provider.clone(), "test");

        let key = miss_key(strategy.try_get_result::<Note>(&1, None));
        assert!(key.as_str().contains("/g1/"));
        strategy.save_get_result(&key, &Some(note(1)));
        assert!(provider.0.exists(key.as_str()).unwrap());

        // Still a miss with the value stored, never a bypass.
        assert_eq!(miss_key(strategy.try_get_result::<Note>(&1, None)), key);
    }

    #[test]
    fn test_non_finite_aggregate_round_trips() {
        let (_, strategy) = strategy();
        let spec = Specification::<Note>::all();
        let selector = crate::expr::Lambda::field("id");
        let query = Query::filtered(QueryKind::Sum, &spec).with_selector(Some(&selector));

        let key = miss_key(strategy.lookup::<Value>(&query));
        strategy.store(&key, &Value::Float(f64::INFINITY), 1);

        match strategy.lookup::<Value>(&query) {
            CacheLookup::Hit(Value::Float(x)) => assert_eq!(x, f64::INFINITY),
            other => panic!("expected cached infinity, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_strategy_ignores_writes() {
        let provider = Arc::new(InMemoryCacheProvider::default());
        let strategy = TimeoutCachingStrategy::<Note>::new(provider.clone(), "test", Some(60));
        let key = miss_key(strategy.try_get_result::<Note>(&1, None));
        assert_eq!(key.as_str().split('/').count(), 5);
        strategy.save_get_result(&key, &Some(note(1)));
        strategy.update_notification(&note(1));

        assert!(strategy.try_get_result::<Note>(&1, None).is_hit());
        assert!(!provider.exists("test/Note/i32/generation").unwrap());
    }
}
