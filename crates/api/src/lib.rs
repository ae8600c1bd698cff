//! HTTP API layer for formdesk.
//!
//! This crate provides the JSON API:
//!
//! - **Public endpoints**: form schema by slug and multipart submission
//! - **Admin endpoints**: form and submission management behind a bearer token
//! - **Extractors**: admin guard and client address
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
