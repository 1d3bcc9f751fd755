//! Response DTOs for the contacts API
//!
//! Read responses carry the diagnostics of the query that produced them.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::models::Contact;
use crate::query::QueryStats;

/// How a read was served.
#[derive(Debug, Clone, Serialize)]
pub struct QueryTrace {
    /// True when the result came from the cache
    pub cache_used: bool,
    pub trace_info: String,
}

/// Response body for GET /contacts/:id, POST and PUT
#[derive(Debug, Clone, Serialize)]
pub struct ContactResponse {
    pub contact: Contact,
    #[serde(flatten)]
    pub trace: QueryTrace,
}

/// Response body for GET /contacts
#[derive(Debug, Clone, Serialize)]
pub struct ContactListResponse {
    pub contacts: Vec<Contact>,
    pub count: usize,
    #[serde(flatten)]
    pub trace: QueryTrace,
}

impl ContactListResponse {
    pub fn new(contacts: Vec<Contact>, trace: QueryTrace) -> Self {
        Self {
            count: contacts.len(),
            contacts,
            trace,
        }
    }
}

/// Response body for GET /contacts/count
#[derive(Debug, Clone, Serialize)]
pub struct CountResponse {
    pub count: usize,
    #[serde(flatten)]
    pub trace: QueryTrace,
}

/// Response body for DELETE /contacts/:id
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: i32,
}

impl DeleteResponse {
    pub fn new(id: i32) -> Self {
        Self {
            message: format!("Contact {} deleted", id),
            id,
        }
    }
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Name of the active caching strategy
    pub strategy: String,
    /// Name of the active cache provider
    pub provider: String,
    pub queries: QueryStats,
    pub query_hit_rate: f64,
    /// Provider counters; only available for the in-memory provider
    pub cache: Option<CacheStats>,
}

impl StatsResponse {
    pub fn new(
        strategy: impl Into<String>,
        provider: impl Into<String>,
        queries: QueryStats,
        cache: Option<CacheStats>,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            provider: provider.into(),
            query_hit_rate: queries.hit_rate(),
            queries,
            cache,
        }
    }
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
