//! Superthread REST API client.
//!
//! The tool dispatcher is the only consumer; the transport layer never calls
//! the backend directly.

mod client;
mod error;
pub mod models;
pub mod search;


pub use client::{ApiClient, DEFAULT_BASE_URL, RequestOptions, install_crypto_provider};
pub use error::{BackendError, BackendResult};
pub use search::{SearchObjectType, SearchOptions, search};
