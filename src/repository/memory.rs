//! In-memory backing store.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{RepositoryError, Result};
use crate::expr::Specification;
use crate::query::QueryOptions;
use crate::repository::{Entity, EntityKey, KeyGenerator, Repository};

/// Repository over a `BTreeMap`. Entities are cloned on every read and write.
pub struct InMemoryRepository<T: Entity> {
    entities: RwLock<BTreeMap<T::Key, T>>,
    key_generator: KeyGenerator,
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
            key_generator: KeyGenerator::for_kind(<T::Key as EntityKey>::kind()),
        }
    }

    pub fn key_generator(&self) -> KeyGenerator {
        self.key_generator
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<T::Key, T>>> {
        self.entities
            .read()
            .map_err(|_| RepositoryError::Internal("repository lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<T::Key, T>>> {
        self.entities
            .write()
            .map_err(|_| RepositoryError::Internal("repository lock poisoned".to_string()))
    }
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    fn get(&self, key: &T::Key) -> Result<Option<T>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn find_all(&self, specification: &Specification<T>, options: &QueryOptions) -> Result<Vec<T>> {
        let entities = self.read()?;
        let matching = specification
            .satisfying_entities_from(entities.values())?
            .into_iter()
            .cloned()
            .collect();
        Ok(options.apply(matching))
    }

    fn add(&self, mut entity: T) -> Result<T> {
        let mut entities = self.write()?;
        if entity.primary_key().is_unset() {
            let key = self.key_generator.next_key(entities.keys().next_back())?;
            entity.set_primary_key(key);
        }

        let key = entity.primary_key();
        if entities.contains_key(&key) {
            return Err(RepositoryError::DuplicateKey(format!("{:?}", key)));
        }
        debug!(entity = T::type_name(), key = ?key, "Added entity");
        entities.insert(key, entity.clone());
        Ok(entity)
    }

    fn update(&self, entity: T) -> Result<()> {
        let mut entities = self.write()?;
        let key = entity.primary_key();
        match entities.get_mut(&key) {
            Some(stored) => {
                *stored = entity;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!(
                "{} {:?}",
                T::type_name(),
                key
            ))),
        }
    }

    fn delete(&self, key: &T::Key) -> Result<()> {
        match self.write()?.remove(key) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound(format!(
                "{} {:?}",
                T::type_name(),
                key
            ))),
        }
    }
}
