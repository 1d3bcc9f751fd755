//! Query Module
//!
//! Query options and the manager that routes reads through the cache.

mod manager;
mod options;
mod stats;

// Re-export public types
pub use manager::QueryManager;
pub use options::{QueryOptions, SortField};
pub use stats::QueryStats;
