//! Entity and backing-store contracts.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;
use crate::expr::{FieldAccess, Specification};
use crate::query::QueryOptions;
use crate::repository::EntityKey;

// == Entity ==
/// A storable, cacheable record.
///
/// `Clone` is the explicit copy used by in-memory backends so callers never
/// hold a live reference into the store.
pub trait Entity: Clone + Serialize + DeserializeOwned + FieldAccess + Send + Sync + 'static {
    type Key: EntityKey;

    /// Stable name used to namespace cache keys.
    fn type_name() -> &'static str;

    fn primary_key(&self) -> Self::Key;

    fn set_primary_key(&mut self, key: Self::Key);

    /// Entity-level switch for result caching.
    fn cache_enabled() -> bool {
        true
    }
}

// == Repository ==
/// The uncached backing store a `CachingRepository` decorates.
pub trait Repository<T: Entity>: Send + Sync {
    fn get(&self, key: &T::Key) -> Result<Option<T>>;

    /// Entities matching `specification`, sorted and paged by `options`.
    fn find_all(&self, specification: &Specification<T>, options: &QueryOptions) -> Result<Vec<T>>;

    /// Stores a new entity and returns it with its primary key assigned.
    fn add(&self, entity: T) -> Result<T>;

    fn update(&self, entity: T) -> Result<()>;

    fn delete(&self, key: &T::Key) -> Result<()>;
}
