//! Database entities.

pub mod form;
pub mod form_submission;

pub use form::Entity as Form;
pub use form_submission::Entity as FormSubmission;
