//! API Module
//!
//! HTTP handlers and routing for the demo contacts service.
//!
//! # Endpoints
//! - `POST /contacts` - Create a contact
//! - `GET /contacts` - List contacts (`name`, `prefix`, `ids`, `page`, `size`, `sort`)
//! - `GET /contacts/count` - Count contacts matching the same filters
//! - `GET /contacts/:id` - Fetch one contact
//! - `PUT /contacts/:id` - Replace a contact
//! - `DELETE /contacts/:id` - Delete a contact
//! - `GET /stats` - Query and cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
