//! Lambda Module
//!
//! Single-parameter lambdas used as filter predicates and projections.

use std::fmt;

use crate::error::{RepositoryError, Result};
use crate::expr::{Expr, FieldAccess, Scope, Value};

// == Lambda ==
/// `param => body`
#[derive(Debug, Clone)]
pub struct Lambda {
    param: String,
    body: Expr,
}

/// Boolean-valued lambda used as a filter.
pub type Predicate = Lambda;

/// Lambda projecting an entity to a value (projection, aggregate input, group key).
pub type Selector = Lambda;

impl Lambda {
    pub fn new(param: impl Into<String>, body: Expr) -> Self {
        Self {
            param: param.into(),
            body,
        }
    }

    /// Builds a lambda from a closure receiving the parameter expression.
    ///
    /// ```ignore
    /// let by_id = Lambda::build("c", |c| c.member("Id").eq(5));
    /// ```
    pub fn build<F>(param: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(Expr) -> Expr,
    {
        let param = param.into();
        let body = f(Expr::Param(param.clone()));
        Self { param, body }
    }

    /// Projection reading a single field: `x => x.<name>`.
    pub fn field(name: impl Into<String>) -> Self {
        Self::build("x", |x| x.member(name))
    }

    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    /// Same lambda with its parameter renamed to `to`.
    pub fn rebind(&self, to: &str) -> Lambda {
        Lambda {
            param: to.to_string(),
            body: self.body.rebind(&self.param, to),
        }
    }

    /// Evaluates the body with the parameter bound to `entity`.
    pub fn evaluate(&self, entity: &dyn FieldAccess) -> Result<Value> {
        self.body.evaluate(&Scope::bind(&self.param, entity))
    }

    /// Evaluates a predicate; non-boolean results are errors.
    pub fn test(&self, entity: &dyn FieldAccess) -> Result<bool> {
        match self.evaluate(entity)? {
            Value::Bool(b) => Ok(b),
            other => Err(RepositoryError::Evaluation(format!(
                "predicate returned {} instead of bool",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {:?}", self.param, self.body)
    }
}
