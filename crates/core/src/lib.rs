//! Core business logic for formdesk.
//!
//! [`schema`] holds the field model and the rules derived from it;
//! [`services`] holds the form and submission workflows built on the
//! repositories of `formdesk-db`.

pub mod schema;
pub mod services;

pub use services::*;
