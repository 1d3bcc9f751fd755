//! Specification Module
//!
//! Immutable, composable filter predicates with an optional fetch strategy.

use std::fmt;
use std::marker::PhantomData;

use crate::error::Result;
use crate::expr::{BinaryOp, Expr, FieldAccess, Lambda, Predicate, Value};

// == Fetch Strategy ==
/// Related-data paths a backend should load eagerly with the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStrategy {
    paths: Vec<String>,
}

impl FetchStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
        self
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Union of both strategies, keeping first-seen order.
    pub fn merge(&self, other: &FetchStrategy) -> FetchStrategy {
        other
            .paths
            .iter()
            .fold(self.clone(), |acc, p| acc.include(p.clone()))
    }

    /// Order-independent text used in cache keys.
    pub fn canonical(&self) -> String {
        let mut paths = self.paths.clone();
        paths.sort();
        paths.join(",")
    }
}

// == Specification ==
/// A filter over entities of type `T`.
///
/// A specification without a predicate matches every entity. Composition
/// never mutates its operands; it builds a new lambda whose right-hand side
/// is rebound onto the left-hand side's parameter.
pub struct Specification<T> {
    predicate: Option<Predicate>,
    fetch: FetchStrategy,
    _entity: PhantomData<fn(&T)>,
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            fetch: self.fetch.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("predicate", &self.predicate)
            .field("fetch", &self.fetch)
            .finish()
    }
}

impl<T> Default for Specification<T> {
    fn default() -> Self {
        Self::all()
    }
}

impl<T> Specification<T> {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate: Some(predicate),
            fetch: FetchStrategy::default(),
            _entity: PhantomData,
        }
    }

    /// Shorthand for `Specification::new(Lambda::build(param, f))`.
    pub fn build<F>(param: &str, f: F) -> Self
    where
        F: FnOnce(Expr) -> Expr,
    {
        Self::new(Lambda::build(param, f))
    }

    /// Matches every entity.
    pub fn all() -> Self {
        Self {
            predicate: None,
            fetch: FetchStrategy::default(),
            _entity: PhantomData,
        }
    }

    pub fn with_fetch_strategy(mut self, fetch: FetchStrategy) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.fetch = self.fetch.include(path);
        self
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn fetch_strategy(&self) -> &FetchStrategy {
        &self.fetch
    }

    pub fn matches_all(&self) -> bool {
        self.predicate.is_none()
    }

    // == Composition ==
    /// Non-short-circuit conjunction.
    pub fn and(&self, other: &Specification<T>) -> Self {
        self.combine(other, BinaryOp::And)
    }

    /// Non-short-circuit disjunction.
    pub fn or(&self, other: &Specification<T>) -> Self {
        self.combine(other, BinaryOp::Or)
    }

    /// Short-circuit conjunction.
    pub fn and_also(&self, other: &Specification<T>) -> Self {
        self.combine(other, BinaryOp::AndAlso)
    }

    /// Short-circuit disjunction.
    pub fn or_else(&self, other: &Specification<T>) -> Self {
        self.combine(other, BinaryOp::OrElse)
    }

    pub fn and_not(&self, other: &Specification<T>) -> Self {
        self.and(&other.not())
    }

    pub fn or_not(&self, other: &Specification<T>) -> Self {
        self.or(&other.not())
    }

    /// Negation; negating "match all" matches nothing.
    pub fn not(&self) -> Self {
        let predicate = match &self.predicate {
            Some(p) => Lambda::new(p.param(), p.body().clone().not()),
            None => Lambda::new("x", Expr::Const(Value::Bool(false))),
        };
        Self {
            predicate: Some(predicate),
            fetch: self.fetch.clone(),
            _entity: PhantomData,
        }
    }

    fn combine(&self, other: &Specification<T>, op: BinaryOp) -> Self {
        let conjunction = matches!(op, BinaryOp::And | BinaryOp::AndAlso);
        let predicate = match (&self.predicate, &other.predicate) {
            (Some(left), Some(right)) => {
                let right = right.body().rebind(right.param(), left.param());
                Some(Lambda::new(
                    left.param(),
                    left.body().clone().binary(op, right),
                ))
            }
            // "all AND p" is p; "all OR p" is all.
            (None, Some(p)) | (Some(p), None) if conjunction => Some(p.clone()),
            _ => None,
        };
        Self {
            predicate,
            fetch: self.fetch.merge(&other.fetch),
            _entity: PhantomData,
        }
    }
}

impl<T: FieldAccess> Specification<T> {
    /// Evaluates the predicate against `entity`, surfacing evaluation errors.
    pub fn try_is_satisfied_by(&self, entity: &T) -> Result<bool> {
        match &self.predicate {
            Some(p) => p.test(entity),
            None => Ok(true),
        }
    }

    /// Evaluates the predicate; evaluation errors count as "not satisfied".
    pub fn is_satisfied_by(&self, entity: &T) -> bool {
        self.try_is_satisfied_by(entity).unwrap_or(false)
    }

    /// Filters `entities`, stopping at the first evaluation error.
    pub fn satisfying_entities_from<'a, I>(&self, entities: I) -> Result<Vec<&'a T>>
    where
        I: IntoIterator<Item = &'a T>,
    {
        let mut matched = Vec::new();
        for entity in entities {
            if self.try_is_satisfied_by(entity)? {
                matched.push(entity);
            }
        }
        Ok(matched)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::HashGenerator;

    #[derive(Debug)]
    struct Person {
        id: i64,
        age: i64,
    }

    impl FieldAccess for Person {
        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "Id" => Some(Value::Int(self.id)),
                "Age" => Some(Value::Int(self.age)),
                _ => None,
            }
        }
    }

    fn adult() -> Specification<Person> {
        Specification::build("p", |p| p.member("Age").ge(18))
    }

    fn low_id() -> Specification<Person> {
        Specification::build("q", |q| q.member("Id").lt(10))
    }

    #[test]
    fn test_all_matches_everything() {
        let all = Specification::<Person>::all();
        assert!(all.is_satisfied_by(&Person { id: 1, age: 1 }));
        assert!(all.matches_all());
    }

    #[test]
    fn test_and_unifies_parameters() {
        let both = adult().and(&low_id());
        let predicate = both.predicate().unwrap();
        assert_eq!(predicate.param(), "p");
        assert!(!predicate.body().references("q"));
        assert!(both.is_satisfied_by(&Person { id: 3, age: 30 }));
        assert!(!both.is_satisfied_by(&Person { id: 30, age: 30 }));
    }

    #[test]
    fn test_or_and_not() {
        let either = adult().or(&low_id());
        assert!(either.is_satisfied_by(&Person { id: 3, age: 5 }));
        assert!(!either.is_satisfied_by(&Person { id: 30, age: 5 }));

        let minor = adult().not();
        assert!(minor.is_satisfied_by(&Person { id: 1, age: 5 }));
    }

    #[test]
    fn test_and_not_or_not() {
        let adult_high_id = adult().and_not(&low_id());
        assert!(adult_high_id.is_satisfied_by(&Person { id: 30, age: 30 }));
        assert!(!adult_high_id.is_satisfied_by(&Person { id: 3, age: 30 }));

        let adult_or_high_id = adult().or_not(&low_id());
        assert!(adult_or_high_id.is_satisfied_by(&Person { id: 30, age: 5 }));
        assert!(!adult_or_high_id.is_satisfied_by(&Person { id: 3, age: 5 }));
    }

    #[test]
    fn test_composition_with_all() {
        let all = Specification::<Person>::all();
        let anded = all.and(&adult());
        assert!(!anded.is_satisfied_by(&Person { id: 1, age: 5 }));

        let ored = all.or(&adult());
        assert!(ored.matches_all());

        let nothing = all.not();
        assert!(!nothing.is_satisfied_by(&Person { id: 1, age: 50 }));
    }

    #[test]
    fn test_operands_not_mutated() {
        let a = adult();
        let b = low_id();
        let before = HashGenerator::from_predicate(a.predicate()).unwrap();
        let _ = a.and(&b).or(&a).not();
        assert_eq!(HashGenerator::from_predicate(a.predicate()).unwrap(), before);
        assert_eq!(b.predicate().unwrap().param(), "q");
    }

    #[test]
    fn test_short_circuit_variants_hash_differently() {
        let plain = adult().and(&low_id());
        let short = adult().and_also(&low_id());
        let subject = Person { id: 3, age: 30 };
        assert_eq!(plain.is_satisfied_by(&subject), short.is_satisfied_by(&subject));
        assert_ne!(
            HashGenerator::from_predicate(plain.predicate()).unwrap(),
            HashGenerator::from_predicate(short.predicate()).unwrap()
        );
    }

    #[test]
    fn test_fetch_strategies_merge() {
        let a = adult().include("Orders");
        let b = low_id().include("Address").include("Orders");
        let merged = a.and(&b);
        assert_eq!(merged.fetch_strategy().paths(), &["Orders", "Address"]);
        assert_eq!(merged.fetch_strategy().canonical(), "Address,Orders");
    }

    #[test]
    fn test_evaluation_error_is_not_satisfied() {
        let broken = Specification::<Person>::build("p", |p| p.member("Missing").eq(1));
        let person = Person { id: 1, age: 1 };
        assert!(!broken.is_satisfied_by(&person));
        assert!(broken.try_is_satisfied_by(&person).is_err());
    }

    #[test]
    fn test_satisfying_entities_from() {
        let people = vec![Person { id: 1, age: 10 }, Person { id: 2, age: 40 }];
        let matched = adult().satisfying_entities_from(&people).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 2);
    }
}
