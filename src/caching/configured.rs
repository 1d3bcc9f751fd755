//! Strategy selected from configuration.

use serde::{de::DeserializeOwned, Serialize};

use crate::caching::{
    CacheKey, CacheLookup, CachingStrategy, NoCachingStrategy, Query, StandardCachingStrategy,
    TimeoutCachingStrategy,
};
use crate::repository::Entity;

/// One of the built-in strategies, chosen once at construction.
#[derive(Debug)]
pub enum ConfiguredStrategy<T> {
    Standard(StandardCachingStrategy<T>),
    Timeout(TimeoutCachingStrategy<T>),
    None(NoCachingStrategy),
}

impl<T: Entity> CachingStrategy<T> for ConfiguredStrategy<T> {
    fn name(&self) -> &str {
        match self {
            ConfiguredStrategy::Standard(s) => s.name(),
            ConfiguredStrategy::Timeout(s) => s.name(),
            ConfiguredStrategy::None(s) => CachingStrategy::<T>::name(s),
        }
    }

    fn lookup<R: DeserializeOwned>(&self, query: &Query<'_, T>) -> CacheLookup<R> {
        match self {
            ConfiguredStrategy::Standard(s) => s.lookup(query),
            ConfiguredStrategy::Timeout(s) => s.lookup(query),
            ConfiguredStrategy::None(s) => s.lookup(query),
        }
    }

    fn store<R: Serialize>(&self, key: &CacheKey, value: &R, number_of_results: usize) {
        match self {
            ConfiguredStrategy::Standard(s) => s.store(key, value, number_of_results),
            ConfiguredStrategy::Timeout(s) => s.store(key, value, number_of_results),
            ConfiguredStrategy::None(s) => {
                CachingStrategy::<T>::store(s, key, value, number_of_results)
            }
        }
    }

    fn invalidate(&self) {
        match self {
            ConfiguredStrategy::Standard(s) => s.invalidate(),
            ConfiguredStrategy::Timeout(s) => s.invalidate(),
            ConfiguredStrategy::None(s) => CachingStrategy::<T>::invalidate(s),
        }
    }
}

impl<T> From<StandardCachingStrategy<T>> for ConfiguredStrategy<T> {
    fn from(strategy: StandardCachingStrategy<T>) -> Self {
        ConfiguredStrategy::Standard(strategy)
    }
}

impl<T> From<TimeoutCachingStrategy<T>> for ConfiguredStrategy<T> {
    fn from(strategy: TimeoutCachingStrategy<T>) -> Self {
        ConfiguredStrategy::Timeout(strategy)
    }
}

impl<T> From<NoCachingStrategy> for ConfiguredStrategy<T> {
    fn from(strategy: NoCachingStrategy) -> Self {
        ConfiguredStrategy::None(strategy)
    }
}
