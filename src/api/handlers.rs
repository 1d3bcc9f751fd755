//! API Handlers
//!
//! HTTP request handlers for the contacts endpoints. Repository calls are
//! synchronous (the Redis provider blocks on I/O), so each one runs on the
//! blocking pool.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::warn;

use crate::caching::CachingStrategy;
use crate::config::Config;
use crate::context::RepositoryContext;
use crate::error::{RepositoryError, Result};
use crate::models::{
    Contact, ContactListResponse, ContactQuery, ContactResponse, CountResponse,
    CreateContactRequest, DeleteResponse, HealthResponse, QueryTrace, StatsResponse,
    UpdateContactRequest,
};
use crate::repository::{CachingRepository, InMemoryRepository};

/// Caching repository over the in-memory contact store.
pub type ContactRepository = CachingRepository<Contact, InMemoryRepository<Contact>>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub contacts: Arc<ContactRepository>,
    pub context: RepositoryContext,
}

impl AppState {
    /// Creates the contact repository on the context's provider.
    pub fn new(context: RepositoryContext) -> Self {
        Self {
            contacts: Arc::new(context.repository(InMemoryRepository::new())),
            context,
        }
    }

    /// Builds the repository context from the caching settings.
    ///
    /// # Errors
    /// Fails when the configured provider cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(RepositoryContext::from_settings(
            config.caching.clone(),
        )?))
    }
}

/// Runs `f` against the repository on the blocking pool.
async fn with_contacts<R, F>(state: &AppState, f: F) -> Result<R>
where
    F: FnOnce(&ContactRepository) -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    let contacts = state.contacts.clone();
    tokio::task::spawn_blocking(move || f(&contacts))
        .await
        .map_err(|e| {
            warn!(error = %e, "Repository task failed");
            RepositoryError::Internal(format!("repository task failed: {}", e))
        })?
}

fn query_trace(contacts: &ContactRepository) -> QueryTrace {
    QueryTrace {
        cache_used: contacts.cache_used(),
        trace_info: contacts.trace_info(),
    }
}

fn invalid(message: String) -> RepositoryError {
    RepositoryError::InvalidRequest(message)
}

/// Handler for POST /contacts
pub async fn create_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<Contact>)> {
    if let Some(error_msg) = req.validate() {
        return Err(invalid(error_msg));
    }

    let contact = req.into_contact();
    let added = with_contacts(&state, move |contacts| contacts.add(contact)).await?;
    Ok((StatusCode::CREATED, Json(added)))
}

/// Handler for GET /contacts
///
/// Filters, sorts and pages according to the query string.
pub async fn list_handler(
    State(state): State<AppState>,
    Query(query): Query<ContactQuery>,
) -> Result<Json<ContactListResponse>> {
    let spec = query.specification().map_err(invalid)?;
    let options = query.options();

    let (contacts, trace) = with_contacts(&state, move |contacts| {
        let found = contacts.find_all(&spec, &options)?;
        Ok((found, query_trace(contacts)))
    })
    .await?;

    Ok(Json(ContactListResponse::new(contacts, trace)))
}

/// Handler for GET /contacts/count
///
/// Accepts the same filters as the list endpoint; paging is ignored.
pub async fn count_handler(
    State(state): State<AppState>,
    Query(query): Query<ContactQuery>,
) -> Result<Json<CountResponse>> {
    let spec = query.specification().map_err(invalid)?;

    let (count, trace) = with_contacts(&state, move |contacts| {
        let count = contacts.count(&spec)?;
        Ok((count, query_trace(contacts)))
    })
    .await?;

    Ok(Json(CountResponse { count, trace }))
}

/// Handler for GET /contacts/:id
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ContactResponse>> {
    let (contact, trace) = with_contacts(&state, move |contacts| {
        let contact = contacts.get(&id)?;
        Ok((contact, query_trace(contacts)))
    })
    .await?;

    let contact =
        contact.ok_or_else(|| RepositoryError::NotFound(format!("Contact {}", id)))?;
    Ok(Json(ContactResponse { contact, trace }))
}

/// Handler for PUT /contacts/:id
pub async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(req): Json<UpdateContactRequest>,
) -> Result<Json<Contact>> {
    if let Some(error_msg) = req.validate() {
        return Err(invalid(error_msg));
    }

    let contact = req.into_contact(id);
    let updated = contact.clone();
    with_contacts(&state, move |contacts| contacts.update(contact)).await?;
    Ok(Json(updated))
}

/// Handler for DELETE /contacts/:id
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DeleteResponse>> {
    with_contacts(&state, move |contacts| contacts.delete(&id)).await?;
    Ok(Json(DeleteResponse::new(id)))
}

/// Handler for GET /stats
///
/// Query counters of the contact repository plus provider counters when the
/// provider is the in-memory one.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let cache = state
        .context
        .memory_provider()
        .map(|memory| memory.stats())
        .transpose()?;

    Ok(Json(StatsResponse::new(
        state.contacts.strategy().name(),
        state.context.provider().name(),
        state.contacts.stats(),
        cache,
    )))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
