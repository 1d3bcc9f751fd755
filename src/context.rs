//! Repository Context
//!
//! Builds the cache provider once from `CachingSettings` and hands out
//! strategies and caching repositories bound to it. Passed explicitly to
//! whatever constructs repositories.

use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheProvider, InMemoryCacheProvider};
use crate::caching::{
    ConfiguredStrategy, NoCachingStrategy, StandardCachingStrategy, TimeoutCachingStrategy,
};
use crate::config::{CachingSettings, ProviderKind, StrategyKind};
use crate::error::Result;
use crate::repository::{CachingRepository, Entity, Repository};

#[derive(Clone)]
pub struct RepositoryContext {
    settings: CachingSettings,
    provider: Arc<dyn CacheProvider>,
    /// Set when the provider is the in-memory one, for purging and stats.
    memory: Option<Arc<InMemoryCacheProvider>>,
}

impl RepositoryContext {
    /// Connects or creates the configured provider.
    pub fn from_settings(settings: CachingSettings) -> Result<Self> {
        match settings.provider {
            ProviderKind::Memory => {
                let memory = Arc::new(InMemoryCacheProvider::new(
                    settings.max_entries,
                    settings.timeout,
                ));
                info!(max_entries = settings.max_entries, "Using in-memory cache provider");
                Ok(Self {
                    provider: memory.clone(),
                    memory: Some(memory),
                    settings,
                })
            }
            ProviderKind::Redis => Self::redis(settings),
        }
    }

    /// Uses an already built provider, ignoring `settings.provider`.
    pub fn with_provider(settings: CachingSettings, provider: Arc<dyn CacheProvider>) -> Self {
        Self {
            settings,
            provider,
            memory: None,
        }
    }

    #[cfg(feature = "redis")]
    fn redis(settings: CachingSettings) -> Result<Self> {
        use std::time::Duration;

        use crate::cache::{RedisCacheProvider, RedisSettings};

        let redis = RedisSettings {
            host: settings.host.clone(),
            port: settings.port,
            password: settings.password.clone(),
            ssl: settings.ssl,
            connection_string: settings.connection_string.clone(),
            operation_timeout: Some(Duration::from_millis(settings.operation_timeout_ms)),
        };
        let provider = RedisCacheProvider::connect(&redis, settings.timeout)?;
        Ok(Self::with_provider(settings, Arc::new(provider)))
    }

    #[cfg(not(feature = "redis"))]
    fn redis(_settings: CachingSettings) -> Result<Self> {
        Err(crate::error::RepositoryError::Configuration(
            "the redis provider requires the `redis` feature".to_string(),
        ))
    }

    pub fn settings(&self) -> &CachingSettings {
        &self.settings
    }

    pub fn provider(&self) -> &Arc<dyn CacheProvider> {
        &self.provider
    }

    pub fn memory_provider(&self) -> Option<&Arc<InMemoryCacheProvider>> {
        self.memory.as_ref()
    }

    /// Strategy for entity type `T` as configured.
    pub fn strategy<T: Entity>(&self) -> ConfiguredStrategy<T> {
        let settings = &self.settings;
        match settings.strategy {
            StrategyKind::Standard => {
                StandardCachingStrategy::new(self.provider.clone(), &settings.prefix)
                    .with_timeout(settings.timeout)
                    .with_max_results(settings.max_results)
                    .into()
            }
            StrategyKind::Timeout => TimeoutCachingStrategy::new(
                self.provider.clone(),
                &settings.prefix,
                settings.timeout,
            )
            .with_max_results(settings.max_results)
            .into(),
            StrategyKind::None => NoCachingStrategy.into(),
        }
    }

    /// Wraps `backend` in a caching repository using the configured strategy.
    pub fn repository<T, B>(&self, backend: B) -> CachingRepository<T, B>
    where
        T: Entity,
        B: Repository<T>,
    {
        CachingRepository::new(backend, self.strategy::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::CachingStrategy;
    use crate::expr::{FieldAccess, Value};
    use crate::repository::InMemoryRepository;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Tag {
        id: u32,
    }

    impl FieldAccess for Tag {
        fn field(&self, name: &str) -> Option<Value> {
            (name == "id").then(|| self.id.into())
        }
    }

    impl Entity for Tag {
        type Key = u32;

        fn type_name() -> &'static str {
            "Tag"
        }

        fn primary_key(&self) -> u32 {
            self.id
        }

        fn set_primary_key(&mut self, key: u32) {
            self.id = key;
        }
    }

    fn context(strategy: StrategyKind) -> RepositoryContext {
        RepositoryContext::from_settings(CachingSettings {
            strategy,
            ..CachingSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_strategy_follows_settings() {
        assert_eq!(context(StrategyKind::Standard).strategy::<Tag>().name(), "standard");
        assert_eq!(context(StrategyKind::Timeout).strategy::<Tag>().name(), "timeout");
        assert_eq!(context(StrategyKind::None).strategy::<Tag>().name(), "none");
    }

    #[test]
    fn test_memory_provider_is_exposed() {
        let ctx = context(StrategyKind::Standard);
        assert!(ctx.memory_provider().is_some());
        assert_eq!(ctx.provider().name(), "memory");

        let shared = RepositoryContext::with_provider(
            CachingSettings::default(),
            Arc::new(InMemoryCacheProvider::default()),
        );
        assert!(shared.memory_provider().is_none());
    }

    #[test]
    fn test_repositories_share_the_provider() {
        let ctx = context(StrategyKind::Standard);
        let tags = ctx.repository(InMemoryRepository::<Tag>::new());
        tags.add(Tag { id: 0 }).unwrap();
        tags.get(&1).unwrap();
        tags.get(&1).unwrap();
        assert!(tags.cache_used());
        assert!(ctx.memory_provider().unwrap().len().unwrap() >= 2);
    }

    #[cfg(not(feature = "redis"))]
    #[test]
    fn test_redis_without_feature_is_configuration_error() {
        use crate::error::RepositoryError;

        let result = RepositoryContext::from_settings(CachingSettings {
            provider: ProviderKind::Redis,
            ..CachingSettings::default()
        });
        assert!(matches!(result, Err(RepositoryError::Configuration(_))));
    }
}
