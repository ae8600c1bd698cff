//! Form submission repository.

use std::sync::Arc;

use formdesk_common::{AppError, AppResult};
use sea_orm::sea_query::{Expr, Func, Query};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, SqlErr,
    Statement, TransactionTrait,
};

use super::column_contains;
use crate::entities::{Form, FormSubmission, form, form_submission};

fn db_err(e: DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// Gives the earliest submission per email its dedupe key, unless another
/// row of the form already holds that key.
const BACKFILL_DEDUPE_KEYS: &str = r#"
UPDATE form_submission AS s
SET dedupe_key = LOWER(s.submitted_by_email)
FROM (
    SELECT DISTINCT ON (LOWER(submitted_by_email)) id
    FROM form_submission
    WHERE form_id = $1 AND submitted_by_email IS NOT NULL
    ORDER BY LOWER(submitted_by_email), created_at
) AS earliest
WHERE s.id = earliest.id
  AND s.dedupe_key IS NULL
  AND NOT EXISTS (
      SELECT 1 FROM form_submission o
      WHERE o.form_id = $1 AND o.dedupe_key = LOWER(s.submitted_by_email)
  )
"#;

/// Filter for listing submissions.
#[derive(Debug, Clone, Default)]
pub struct SubmissionListFilter {
    /// Only submissions to this form.
    pub form_id: Option<String>,
    /// Case-insensitive match on submitter name, email or form title.
    pub search: Option<String>,
}

impl SubmissionListFilter {
    fn apply(&self, mut query: Select<FormSubmission>) -> Select<FormSubmission> {
        if let Some(form_id) = &self.form_id {
            query = query.filter(form_submission::Column::FormId.eq(form_id.as_str()));
        }
        if let Some(term) = self.search.as_deref().filter(|t| !t.trim().is_empty()) {
            let titled = Query::select()
                .column(form::Column::Id)
                .from(Form)
                .and_where(column_contains(form::Column::Title, term))
                .to_owned();
            query = query.filter(
                Condition::any()
                    .add(column_contains(form_submission::Column::SubmittedByName, term))
                    .add(column_contains(form_submission::Column::SubmittedByEmail, term))
                    .add(form_submission::Column::FormId.in_subquery(titled)),
            );
        }
        query
    }
}

/// Form submission repository for database operations.
#[derive(Clone)]
pub struct FormSubmissionRepository {
    db: Arc<DatabaseConnection>,
}

impl FormSubmissionRepository {
    /// Create a new form submission repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a submission by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<form_submission::Model>> {
        FormSubmission::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get a submission by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<form_submission::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Submission: {id}")))
    }

    /// List submissions, newest first.
    pub async fn find_all(
        &self,
        filter: &SubmissionListFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<form_submission::Model>> {
        filter
            .apply(FormSubmission::find())
            .order_by_desc(form_submission::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// All submissions of a form.
    pub async fn find_by_form_id(&self, form_id: &str) -> AppResult<Vec<form_submission::Model>> {
        FormSubmission::find()
            .filter(form_submission::Column::FormId.eq(form_id))
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Count submissions matching a filter.
    pub async fn count(&self, filter: &SubmissionListFilter) -> AppResult<u64> {
        filter
            .apply(FormSubmission::find())
            .count(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Check whether a form already holds a submission from this email.
    ///
    /// Matches on the stored email itself, so rows recorded while the form
    /// still allowed repeats or was anonymous count too. `email` must already
    /// be lowercase.
    pub async fn email_exists(&self, form_id: &str, email: &str) -> AppResult<bool> {
        let count = FormSubmission::find()
            .filter(form_submission::Column::FormId.eq(form_id))
            .filter(
                Expr::expr(Func::lower(Expr::col(
                    form_submission::Column::SubmittedByEmail,
                )))
                .eq(email),
            )
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Assign dedupe keys to earlier submissions of a form that just became
    /// single-submission. Returns the number of rows keyed.
    pub async fn backfill_dedupe_keys(&self, form_id: &str) -> AppResult<u64> {
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                self.db.get_database_backend(),
                BACKFILL_DEDUPE_KEYS,
                [form_id.into()],
            ))
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    /// Reserve a slot on the form counter and insert the submission, atomically.
    ///
    /// The reservation only succeeds while the form is live and under its
    /// submission limit, so concurrent requests cannot overshoot it. A unique
    /// violation on `(form_id, dedupe_key)` is reported as a duplicate.
    pub async fn record(
        &self,
        model: form_submission::ActiveModel,
    ) -> AppResult<form_submission::Model> {
        let form_id = match &model.form_id {
            ActiveValue::Set(id) | ActiveValue::Unchanged(id) => id.clone(),
            ActiveValue::NotSet => {
                return Err(AppError::Internal("submission without form_id".to_string()));
            }
        };
        let txn = self.db.begin().await.map_err(db_err)?;

        let reserved = Form::update_many()
            .col_expr(
                form::Column::SubmissionCount,
                Expr::col(form::Column::SubmissionCount).add(1),
            )
            .filter(form::Column::Id.eq(form_id.as_str()))
            .filter(form::Column::DeletedAt.is_null())
            .filter(
                Condition::any()
                    .add(form::Column::SubmissionLimit.is_null())
                    .add(
                        Expr::col(form::Column::SubmissionCount)
                            .lt(Expr::col(form::Column::SubmissionLimit)),
                    ),
            )
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if reserved.rows_affected == 0 {
            txn.rollback().await.map_err(db_err)?;
            return Err(AppError::NotAcceptingSubmissions {
                reason: "limit_reached",
            });
        }

        let submission = match model.insert(&txn).await {
            Ok(submission) => submission,
            Err(e) => {
                txn.rollback().await.map_err(db_err)?;
                return Err(match e.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateSubmission,
                    _ => db_err(e),
                });
            }
        };

        txn.commit().await.map_err(db_err)?;
        Ok(submission)
    }

    /// Delete a submission and release its slot on the form counter.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let submission = self.get_by_id(id).await?;
        let txn = self.db.begin().await.map_err(db_err)?;

        let deleted = FormSubmission::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if deleted.rows_affected > 0 {
            Form::update_many()
                .col_expr(
                    form::Column::SubmissionCount,
                    Expr::cust("GREATEST(submission_count - 1, 0)"),
                )
                .filter(form::Column::Id.eq(submission.form_id.as_str()))
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)
    }
}
