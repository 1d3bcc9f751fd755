//! Repository Module
//!
//! Entity and backing-store contracts, the in-memory backend, and the
//! caching decorator.

pub mod aggregate;
mod caching;
mod entity;
mod key;
mod memory;

// Re-export public types
pub use caching::CachingRepository;
pub use entity::{Entity, Repository};
pub use key::{EntityKey, KeyGenerator, KeyKind};
pub use memory::InMemoryRepository;
