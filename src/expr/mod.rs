//! Expression Module
//!
//! Inspectable predicate/selector trees, their canonical hashing, and
//! composable specifications.

mod hash;
mod lambda;
mod node;
mod specification;
mod value;


// Re-export public types
pub use hash::HashGenerator;
pub use lambda::{Lambda, Predicate, Selector};
pub use node::{BinaryOp, Expr, FieldAccess, Method, OpaqueFn, Scope, UnaryOp};
pub use specification::{FetchStrategy, Specification};
pub use value::Value;
