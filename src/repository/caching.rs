//! Caching Repository Module
//!
//! Decorates any `Repository` with transparent result caching. Reads go
//! through a `QueryManager`; successful writes notify the caching strategy,
//! which invalidates every cached read of the entity type.

use tracing::debug;

use crate::caching::{CachingStrategy, ConfiguredStrategy};
use crate::error::Result;
use crate::expr::{Selector, Specification, Value};
use crate::query::{QueryManager, QueryOptions, QueryStats};
use crate::repository::{aggregate, Entity, Repository};

// == Caching Repository ==
pub struct CachingRepository<T, B, S = ConfiguredStrategy<T>>
where
    T: Entity,
    B: Repository<T>,
    S: CachingStrategy<T>,
{
    backend: B,
    manager: QueryManager<T, S>,
}

impl<T, B, S> CachingRepository<T, B, S>
where
    T: Entity,
    B: Repository<T>,
    S: CachingStrategy<T>,
{
    /// # Arguments
    /// * `backend` - The uncached store, owned by the decorator
    /// * `strategy` - How reads are cached and writes invalidate
    pub fn new(backend: B, strategy: S) -> Self {
        Self {
            backend,
            manager: QueryManager::new(strategy),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn strategy(&self) -> &S {
        self.manager.strategy()
    }

    // == Diagnostics ==
    pub fn cache_used(&self) -> bool {
        self.manager.cache_used()
    }

    pub fn trace_info(&self) -> String {
        self.manager.trace_info()
    }

    pub fn number_of_results(&self) -> usize {
        self.manager.number_of_results()
    }

    pub fn stats(&self) -> QueryStats {
        self.manager.stats()
    }

    // == Get ==
    pub fn get(&self, key: &T::Key) -> Result<Option<T>> {
        self.manager.execute_get(key, None, || self.backend.get(key))
    }

    /// Projection of one entity through `selector`.
    pub fn get_selected(&self, key: &T::Key, selector: &Selector) -> Result<Option<Value>> {
        self.manager.execute_get(key, Some(selector), || {
            self.backend
                .get(key)?
                .map(|entity| selector.evaluate(&entity))
                .transpose()
        })
    }

    pub fn get_all(&self) -> Result<Vec<T>> {
        self.get_all_with_options(&QueryOptions::new())
    }

    pub fn get_all_with_options(&self, options: &QueryOptions) -> Result<Vec<T>> {
        self.manager.execute_get_all(None, Some(options), || {
            self.backend.find_all(&Specification::all(), options)
        })
    }

    pub fn get_all_selected(&self, selector: &Selector, options: &QueryOptions) -> Result<Vec<Value>> {
        self.manager.execute_get_all(Some(selector), Some(options), || {
            let entities = self.backend.find_all(&Specification::all(), options)?;
            aggregate::project(&entities, selector)
        })
    }

    // == Find ==
    /// First entity matching `specification` under `options` ordering.
    pub fn find(&self, specification: &Specification<T>, options: &QueryOptions) -> Result<Option<T>> {
        self.manager
            .execute_find(specification, None, Some(options), || {
                Ok(self.backend.find_all(specification, options)?.into_iter().next())
            })
    }

    pub fn find_selected(
        &self,
        specification: &Specification<T>,
        selector: &Selector,
        options: &QueryOptions,
    ) -> Result<Option<Value>> {
        self.manager
            .execute_find(specification, Some(selector), Some(options), || {
                self.backend
                    .find_all(specification, options)?
                    .first()
                    .map(|entity| selector.evaluate(entity))
                    .transpose()
            })
    }

    pub fn find_all(&self, specification: &Specification<T>, options: &QueryOptions) -> Result<Vec<T>> {
        self.manager
            .execute_find_all(specification, None, Some(options), || {
                self.backend.find_all(specification, options)
            })
    }

    pub fn find_all_selected(
        &self,
        specification: &Specification<T>,
        selector: &Selector,
        options: &QueryOptions,
    ) -> Result<Vec<Value>> {
        self.manager
            .execute_find_all(specification, Some(selector), Some(options), || {
                let entities = self.backend.find_all(specification, options)?;
                aggregate::project(&entities, selector)
            })
    }

    // == Aggregates ==
    pub fn count(&self, specification: &Specification<T>) -> Result<usize> {
        self.manager
            .execute_count(specification, || Ok(self.matching(specification)?.len()))
    }

    pub fn long_count(&self, specification: &Specification<T>) -> Result<u64> {
        self.manager.execute_long_count(specification, || {
            Ok(self.matching(specification)?.len() as u64)
        })
    }

    pub fn sum(&self, specification: &Specification<T>, selector: &Selector) -> Result<Value> {
        self.manager.execute_sum(specification, selector, || {
            aggregate::sum(&self.projected(specification, selector)?)
        })
    }

    pub fn average(&self, specification: &Specification<T>, selector: &Selector) -> Result<Option<f64>> {
        self.manager.execute_average(specification, selector, || {
            aggregate::average(&self.projected(specification, selector)?)
        })
    }

    pub fn min(&self, specification: &Specification<T>, selector: &Selector) -> Result<Option<Value>> {
        self.manager.execute_min(specification, selector, || {
            Ok(aggregate::min(self.projected(specification, selector)?))
        })
    }

    pub fn max(&self, specification: &Specification<T>, selector: &Selector) -> Result<Option<Value>> {
        self.manager.execute_max(specification, selector, || {
            Ok(aggregate::max(self.projected(specification, selector)?))
        })
    }

    pub fn group_counts(
        &self,
        specification: &Specification<T>,
        key_selector: &Selector,
    ) -> Result<Vec<(Value, usize)>> {
        self.manager
            .execute_group_counts(specification, key_selector, || {
                aggregate::group_counts(self.matching(specification)?, key_selector)
            })
    }

    pub fn group_items(
        &self,
        specification: &Specification<T>,
        key_selector: &Selector,
    ) -> Result<Vec<(Value, Vec<T>)>> {
        self.manager
            .execute_group_items(specification, key_selector, || {
                aggregate::group_items(self.matching(specification)?, key_selector)
            })
    }

    // == Writes ==
    /// Stores a new entity; unset keys are generated by the backend.
    pub fn add(&self, entity: T) -> Result<T> {
        let added = self.backend.add(entity)?;
        self.strategy().add_notification(&added);
        debug!(entity = T::type_name(), key = ?added.primary_key(), "Entity added");
        Ok(added)
    }

    /// Adds every entity and invalidates once at the end.
    ///
    /// Stops at the first failure; entities added before it stay added and
    /// the cache is still invalidated.
    pub fn add_all<I>(&self, entities: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = T>,
    {
        let mut added = Vec::new();
        let mut outcome = Ok(());
        for entity in entities {
            match self.backend.add(entity) {
                Ok(entity) => added.push(entity),
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        if !added.is_empty() {
            self.strategy().save_changes_notification();
        }
        outcome.map(|_| added)
    }

    pub fn update(&self, entity: T) -> Result<()> {
        self.backend.update(entity.clone())?;
        self.strategy().update_notification(&entity);
        debug!(entity = T::type_name(), key = ?entity.primary_key(), "Entity updated");
        Ok(())
    }

    pub fn delete(&self, key: &T::Key) -> Result<()> {
        self.backend.delete(key)?;
        self.strategy().delete_notification(key);
        debug!(entity = T::type_name(), key = ?key, "Entity deleted");
        Ok(())
    }

    // == Internals ==
    fn matching(&self, specification: &Specification<T>) -> Result<Vec<T>> {
        self.backend.find_all(specification, &QueryOptions::new())
    }

    fn projected(&self, specification: &Specification<T>, selector: &Selector) -> Result<Vec<Value>> {
        aggregate::project(&self.matching(specification)?, selector)
    }
}
