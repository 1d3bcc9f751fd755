//! Contact entity and the request/response models of the demo API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

mod contact;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use contact::Contact;
pub use requests::{ContactQuery, CreateContactRequest, UpdateContactRequest};
pub use responses::{
    ContactListResponse, ContactResponse, CountResponse, DeleteResponse, HealthResponse,
    QueryTrace, StatsResponse,
};
