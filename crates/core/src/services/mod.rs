//! Business logic services.

#![allow(missing_docs)]

pub mod acceptance;
pub mod form;
pub mod submission;

pub use acceptance::{ClosedReason, check_acceptance, is_accepting_submissions};
pub use form::{
    ClosedForm, CreateFormInput, FormList, FormResponse, FormService, PublicField, PublicForm,
    PublicFormView, UpdateFormInput, clone_model, normalize_redirect,
};
pub use submission::{
    SUBMITTED_MESSAGE, SubmissionDetail, SubmissionList, SubmissionResponse, SubmissionService,
    SubmitOutcome, SubmitterIdentity, build_submission_data, collapse_single_values, dedupe_key,
    submitter_identity,
};
