//! Admin endpoints for forms and submissions.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
};
use formdesk_common::AppResult;
use formdesk_core::{
    CreateFormInput, FormList, FormResponse, SubmissionDetail, SubmissionList, UpdateFormInput,
};
use formdesk_db::repositories::{FormListFilter, SubmissionListFilter};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::AdminAuth,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

const MAX_LIMIT: u64 = 100;

const fn default_limit() -> u64 {
    20
}

/// List forms request.
#[derive(Debug, Deserialize)]
pub struct ListFormsQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub with_trashed: bool,
    /// Matches title or slug.
    pub search: Option<String>,
}

/// List submissions request.
#[derive(Debug, Deserialize)]
pub struct ListSubmissionsQuery {
    pub form_id: Option<String>,
    /// Matches submitter name, email or form title.
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

/// Ids selected for a bulk action.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkRequest {
    #[validate(length(min = 1, max = 100))]
    pub ids: Vec<String>,
}

/// Result of a bulk action.
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    /// Records the action applied to; unknown ids are skipped.
    pub affected: u64,
}

// ==================== Forms ====================

async fn create_form(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<CreateFormInput>,
) -> AppResult<ApiResponse<FormResponse>> {
    let form = state.form_service.create(req).await?;
    Ok(ApiResponse::ok(form))
}

async fn list_forms(
    _: AdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ListFormsQuery>,
) -> AppResult<ApiResponse<FormList>> {
    let filter = FormListFilter {
        is_active: query.is_active,
        with_trashed: query.with_trashed,
        search: query.search,
    };
    let forms = state
        .form_service
        .list(&filter, query.limit.min(MAX_LIMIT), query.offset)
        .await?;
    Ok(ApiResponse::ok(forms))
}

async fn show_form(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<FormResponse>> {
    let form = state.form_service.get(&id).await?;
    Ok(ApiResponse::ok(form))
}

async fn update_form(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFormInput>,
) -> AppResult<ApiResponse<FormResponse>> {
    let form = state.form_service.update(&id, req).await?;
    Ok(ApiResponse::ok(form))
}

async fn delete_form(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<FormResponse>> {
    let form = state.form_service.delete(&id).await?;
    Ok(ApiResponse::ok(form))
}

async fn restore_form(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<FormResponse>> {
    let form = state.form_service.restore(&id).await?;
    Ok(ApiResponse::ok(form))
}

async fn force_delete_form(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.form_service.force_delete(&id).await?;
    Ok(no_content())
}

async fn clone_form(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<FormResponse>> {
    let form = state.form_service.clone_form(&id).await?;
    Ok(ApiResponse::ok(form))
}

async fn bulk_delete_forms(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<BulkRequest>,
) -> AppResult<ApiResponse<BulkResponse>> {
    req.validate()?;
    let affected = state.form_service.delete_many(&req.ids).await?;
    Ok(ApiResponse::ok(BulkResponse { affected }))
}

async fn bulk_restore_forms(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<BulkRequest>,
) -> AppResult<ApiResponse<BulkResponse>> {
    req.validate()?;
    let affected = state.form_service.restore_many(&req.ids).await?;
    Ok(ApiResponse::ok(BulkResponse { affected }))
}

async fn bulk_force_delete_forms(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<BulkRequest>,
) -> AppResult<ApiResponse<BulkResponse>> {
    req.validate()?;
    let affected = state.form_service.force_delete_many(&req.ids).await?;
    Ok(ApiResponse::ok(BulkResponse { affected }))
}

// ==================== Submissions ====================

async fn list_submissions(
    _: AdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ListSubmissionsQuery>,
) -> AppResult<ApiResponse<SubmissionList>> {
    let filter = SubmissionListFilter {
        form_id: query.form_id,
        search: query.search,
    };
    let submissions = state
        .submission_service
        .list(&filter, query.limit.min(MAX_LIMIT), query.offset)
        .await?;
    Ok(ApiResponse::ok(submissions))
}

async fn show_submission(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<SubmissionDetail>> {
    let submission = state.submission_service.get(&id).await?;
    Ok(ApiResponse::ok(submission))
}

async fn delete_submission(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.submission_service.delete(&id).await?;
    Ok(no_content())
}

async fn bulk_delete_submissions(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<BulkRequest>,
) -> AppResult<ApiResponse<BulkResponse>> {
    req.validate()?;
    let affected = state.submission_service.delete_many(&req.ids).await?;
    Ok(ApiResponse::ok(BulkResponse { affected }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/forms", post(create_form).get(list_forms))
        .route(
            "/forms/{id}",
            get(show_form).patch(update_form).delete(delete_form),
        )
        .route("/forms/{id}/restore", post(restore_form))
        .route("/forms/{id}/force", delete(force_delete_form))
        .route("/forms/{id}/clone", post(clone_form))
        .route("/forms/bulk-delete", post(bulk_delete_forms))
        .route("/forms/bulk-restore", post(bulk_restore_forms))
        .route("/forms/bulk-force-delete", post(bulk_force_delete_forms))
        .route("/submissions", get(list_submissions))
        .route("/submissions/bulk-delete", post(bulk_delete_submissions))
        .route(
            "/submissions/{id}",
            get(show_submission).delete(delete_submission),
        )
}
