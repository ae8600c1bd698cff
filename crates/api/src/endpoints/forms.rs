//! Public form endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{get, post},
};
use chrono::Utc;
use formdesk_common::{AppError, AppResult};
use formdesk_core::schema::{SubmissionInput, UploadedFile};
use formdesk_core::{PublicFormView, SubmitOutcome};

use crate::{extractors::ClientIp, middleware::AppState};

/// Get the public view of a form.
async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<PublicFormView>> {
    let view = state.form_service.public_view(&slug, Utc::now()).await?;
    Ok(Json(view))
}

/// Submit a form.
async fn submit(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    ClientIp(ip): ClientIp,
    multipart: Multipart,
) -> AppResult<Json<SubmitOutcome>> {
    let input = read_submission(multipart).await?;
    let outcome = state
        .submission_service
        .submit(&slug, &input, ip.as_deref(), Utc::now())
        .await?;
    Ok(Json(outcome))
}

/// Collect a multipart body into submission input.
///
/// Parts with a filename are files; everything else is text.
async fn read_submission(mut multipart: Multipart) -> AppResult<SubmissionInput> {
    let mut input = SubmissionInput::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            input.push_file(
                &name,
                UploadedFile {
                    file_name,
                    content_type,
                    data,
                },
            );
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            input.push_text(&name, text);
        }
    }

    Ok(input)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{slug}", get(show))
        .route("/{slug}/submit", post(submit))
}
