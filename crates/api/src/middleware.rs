//! Shared application state.

use std::sync::Arc;

use formdesk_core::{FormService, SubmissionService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Form administration and public schema.
    pub form_service: FormService,
    /// Submission recording and administration.
    pub submission_service: SubmissionService,
    /// Bearer token accepted on `/admin` routes. Empty disables them.
    pub admin_token: Arc<str>,
}
