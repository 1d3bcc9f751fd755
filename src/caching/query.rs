//! Query descriptions handed to caching strategies.

use std::fmt;

use crate::caching::CacheKey;
use crate::error::Result;
use crate::expr::{HashGenerator, Selector, Specification};
use crate::query::QueryOptions;
use crate::repository::Entity;

// == Query Kind ==
/// Every read shape a repository can serve from cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Get,
    GetAll,
    Find,
    FindAll,
    Count,
    LongCount,
    Sum,
    Average,
    Min,
    Max,
    GroupCounts,
    GroupItems,
}

impl QueryKind {
    pub fn name(self) -> &'static str {
        match self {
            QueryKind::Get => "get",
            QueryKind::GetAll => "get-all",
            QueryKind::Find => "find",
            QueryKind::FindAll => "find-all",
            QueryKind::Count => "count",
            QueryKind::LongCount => "long-count",
            QueryKind::Sum => "sum",
            QueryKind::Average => "average",
            QueryKind::Min => "min",
            QueryKind::Max => "max",
            QueryKind::GroupCounts => "group-counts",
            QueryKind::GroupItems => "group-items",
        }
    }

    pub fn is_aggregate(self) -> bool {
        !matches!(
            self,
            QueryKind::Get | QueryKind::GetAll | QueryKind::Find | QueryKind::FindAll
        )
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// == Query ==
/// Everything that identifies one read: its shape, target and modifiers.
pub struct Query<'a, T: Entity> {
    pub kind: QueryKind,
    pub key: Option<&'a T::Key>,
    pub specification: Option<&'a Specification<T>>,
    pub selector: Option<&'a Selector>,
    pub options: Option<&'a QueryOptions>,
}

impl<'a, T: Entity> Query<'a, T> {
    fn of(kind: QueryKind) -> Self {
        Self {
            kind,
            key: None,
            specification: None,
            selector: None,
            options: None,
        }
    }

    pub fn get(key: &'a T::Key) -> Self {
        Self {
            key: Some(key),
            ..Self::of(QueryKind::Get)
        }
    }

    pub fn get_all() -> Self {
        Self::of(QueryKind::GetAll)
    }

    pub fn find(specification: &'a Specification<T>) -> Self {
        Self::filtered(QueryKind::Find, specification)
    }

    pub fn find_all(specification: &'a Specification<T>) -> Self {
        Self::filtered(QueryKind::FindAll, specification)
    }

    /// Any filtered shape, including aggregates.
    pub fn filtered(kind: QueryKind, specification: &'a Specification<T>) -> Self {
        Self {
            specification: Some(specification),
            ..Self::of(kind)
        }
    }

    pub fn with_selector(mut self, selector: Option<&'a Selector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_options(mut self, options: Option<&'a QueryOptions>) -> Self {
        self.options = options.filter(|o| !o.is_empty());
        self
    }

    /// Canonical text identifying this query, independent of generation.
    ///
    /// Components are length-prefixed so no two component lists share a text.
    pub fn canonical(&self) -> Result<String> {
        let key = self.key.map(serde_json::to_string).transpose()?;
        let predicate =
            HashGenerator::from_predicate(self.specification.and_then(|s| s.predicate()))?;
        let selector = HashGenerator::from_selector(self.selector)?;
        let fetch = self
            .specification
            .map(|s| s.fetch_strategy())
            .filter(|f| !f.is_empty())
            .map(|f| f.canonical());
        let options = self.options.map(QueryOptions::canonical);

        let mut text = String::new();
        for component in [key, predicate, selector, fetch, options] {
            match component {
                Some(c) => text.push_str(&format!("{}:{};", c.len(), c)),
                None => text.push_str("~;"),
            }
        }
        Ok(text)
    }
}

impl<T: Entity> fmt::Debug for Query<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("specification", &self.specification)
            .field("selector", &self.selector)
            .field("options", &self.options)
            .finish()
    }
}

// == Cache Lookup ==
/// Outcome of asking a strategy for a cached result.
#[derive(Debug)]
pub enum CacheLookup<R> {
    Hit(R),
    /// Nothing cached; store the computed result under this key.
    Miss(CacheKey),
    /// Caching does not apply to this call.
    Bypassed(String),
}

impl<R> CacheLookup<R> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn map<U>(self, f: impl FnOnce(R) -> U) -> CacheLookup<U> {
        match self {
            CacheLookup::Hit(value) => CacheLookup::Hit(f(value)),
            CacheLookup::Miss(key) => CacheLookup::Miss(key),
            CacheLookup::Bypassed(reason) => CacheLookup::Bypassed(reason),
        }
    }
}

// == Cache Policy ==
/// Decides per operation whether caching is attempted.
pub trait CachePolicy: Send + Sync {
    fn should_cache(&self, kind: QueryKind) -> bool;
}

/// Default policy: every read shape is cached.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheEverything;

impl CachePolicy for CacheEverything {
    fn should_cache(&self, _kind: QueryKind) -> bool {
        true
    }
}

impl<F> CachePolicy for F
where
    F: Fn(QueryKind) -> bool + Send + Sync,
{
    fn should_cache(&self, kind: QueryKind) -> bool {
        self(kind)
    }
}
