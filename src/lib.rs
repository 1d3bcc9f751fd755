//! Cached Repo - repositories with a transparent caching decorator
//!
//! Reads are keyed by a canonical hash of their expression trees and
//! namespaced by a per-entity generation counter; writes bump the counter so
//! every earlier cached read of that entity type becomes unreachable. Cache
//! failures never fail a read.

pub mod api;
pub mod cache;
pub mod caching;
pub mod config;
pub mod context;
pub mod error;
pub mod expr;
pub mod models;
pub mod query;
pub mod repository;
pub mod tasks;

pub use api::AppState;
pub use config::{CachingSettings, Config};
pub use context::RepositoryContext;
pub use error::{RepositoryError, Result};
pub use repository::{CachingRepository, Entity, Repository};
pub use tasks::spawn_cleanup_task;
