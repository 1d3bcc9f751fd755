//! Cache key layout.
//!
//! Result keys: `{prefix}/{entity}/{key-type}/g{generation}/{kind}/{sha256}`.
//! Generation keys: `{prefix}/{entity}/{key-type}/generation`.

use std::fmt;

use crate::caching::QueryKind;
use crate::expr::HashGenerator;
use crate::repository::{Entity, EntityKey};

/// A fully qualified cache key for one query result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `(entity type, key type)` namespace a strategy owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespace {
    root: String,
}

impl KeyNamespace {
    pub fn new(prefix: &str, entity: &str, key_type: &str) -> Self {
        Self {
            root: format!("{}/{}/{}", prefix, entity, key_type),
        }
    }

    pub fn for_entity<T: Entity>(prefix: &str) -> Self {
        Self::new(prefix, T::type_name(), &<T::Key as EntityKey>::type_name())
    }

    pub fn generation_key(&self) -> String {
        format!("{}/generation", self.root)
    }

    /// # Arguments
    /// * `generation` - Current generation, or `None` for timeout-only keys
    /// * `kind` - Query shape
    /// * `canonical` - Canonical query text, hashed into the key
    pub fn result_key(&self, generation: Option<i64>, kind: QueryKind, canonical: &str) -> CacheKey {
        let digest = HashGenerator::digest(canonical);
        match generation {
            Some(generation) => CacheKey(format!(
                "{}/g{}/{}/{}",
                self.root,
                generation,
                kind.name(),
                digest
            )),
            None => CacheKey(format!("{}/{}/{}", self.root, kind.name(), digest)),
        }
    }
}
