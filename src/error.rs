//! Error types for the repository layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Repository Error Enum ==
/// Unified error type for repositories, expressions and cache providers.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Entity not found in the backing store
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// An entity with the same primary key already exists
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Primary key type cannot be generated or is not set
    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),

    /// Expression cannot be partially evaluated or canonicalized
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// Expression evaluation failed against an entity
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Cache provider failure (timeout, connection, corrupt counter)
    #[error("Cache provider error: {0}")]
    Provider(String),

    /// Malformed request from an API client
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration attribute
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON (de)serialization of cached values
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for RepositoryError {
    fn into_response(self) -> Response {
        let status = match &self {
            RepositoryError::NotFound(_) => StatusCode::NOT_FOUND,
            RepositoryError::DuplicateKey(_) => StatusCode::CONFLICT,
            RepositoryError::InvalidRequest(_)
            | RepositoryError::UnsupportedKey(_)
            | RepositoryError::UnsupportedExpression(_)
            | RepositoryError::Evaluation(_) => StatusCode::BAD_REQUEST,
            RepositoryError::Provider(_) => StatusCode::SERVICE_UNAVAILABLE,
            RepositoryError::Configuration(_)
            | RepositoryError::Serialization(_)
            | RepositoryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the repository layer.
pub type Result<T> = std::result::Result<T, RepositoryError>;
