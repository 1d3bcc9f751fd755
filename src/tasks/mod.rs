//! Background Tasks Module
//!
//! # Tasks
//! - Cache purge: drops expired in-memory cache entries at a fixed interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
