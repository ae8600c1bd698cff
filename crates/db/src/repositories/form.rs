//! Form repository.

use std::sync::Arc;

use chrono::Utc;
use formdesk_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, SqlErr,
};

use super::column_contains;
use crate::entities::{Form, form};

/// Filter for listing forms.
#[derive(Debug, Clone, Default)]
pub struct FormListFilter {
    /// Only forms with this active flag.
    pub is_active: Option<bool>,
    /// Include soft-deleted forms.
    pub with_trashed: bool,
    /// Case-insensitive match on title or slug.
    pub search: Option<String>,
}

impl FormListFilter {
    fn apply(&self, mut query: Select<Form>) -> Select<Form> {
        if !self.with_trashed {
            query = query.filter(form::Column::DeletedAt.is_null());
        }
        if let Some(is_active) = self.is_active {
            query = query.filter(form::Column::IsActive.eq(is_active));
        }
        if let Some(term) = self.search.as_deref().filter(|t| !t.trim().is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(column_contains(form::Column::Title, term))
                    .add(column_contains(form::Column::Slug, term)),
            );
        }
        query
    }
}

/// A unique violation on insert or update can only be the slug.
fn write_err(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Slug is already taken".to_string())
        }
        _ => AppError::Database(e.to_string()),
    }
}

/// Form repository for database operations.
#[derive(Clone)]
pub struct FormRepository {
    db: Arc<DatabaseConnection>,
}

impl FormRepository {
    /// Create a new form repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a form by ID, including soft-deleted forms.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<form::Model>> {
        Form::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a form by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<form::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Form: {id}")))
    }

    /// Find a live (not soft-deleted) form by slug.
    pub async fn find_by_slug(&self, slug: &str) -> AppResult<Option<form::Model>> {
        Form::find()
            .filter(form::Column::Slug.eq(slug))
            .filter(form::Column::DeletedAt.is_null())
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check whether a slug is taken by any form (trashed included), optionally
    /// ignoring one form.
    pub async fn slug_exists(&self, slug: &str, except_id: Option<&str>) -> AppResult<bool> {
        let mut query = Form::find().filter(form::Column::Slug.eq(slug));
        if let Some(id) = except_id {
            query = query.filter(form::Column::Id.ne(id));
        }
        let count = query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// List forms, newest first.
    pub async fn find_all(
        &self,
        filter: &FormListFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<form::Model>> {
        filter
            .apply(Form::find())
            .order_by_desc(form::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count forms matching a filter.
    pub async fn count(&self, filter: &FormListFilter) -> AppResult<u64> {
        filter
            .apply(Form::find())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new form.
    pub async fn create(&self, model: form::ActiveModel) -> AppResult<form::Model> {
        model.insert(self.db.as_ref()).await.map_err(write_err)
    }

    /// Update a form.
    pub async fn update(&self, model: form::ActiveModel) -> AppResult<form::Model> {
        model.update(self.db.as_ref()).await.map_err(write_err)
    }

    /// Soft-delete a form.
    pub async fn soft_delete(&self, id: &str) -> AppResult<form::Model> {
        let form = self.get_by_id(id).await?;
        if form.deleted_at.is_some() {
            return Ok(form);
        }
        let mut active: form::ActiveModel = form.into();
        active.deleted_at = Set(Some(Utc::now().into()));
        self.update(active).await
    }

    /// Restore a soft-deleted form.
    pub async fn restore(&self, id: &str) -> AppResult<form::Model> {
        let form = self.get_by_id(id).await?;
        if form.deleted_at.is_none() {
            return Ok(form);
        }
        let mut active: form::ActiveModel = form.into();
        active.deleted_at = Set(None);
        active.updated_at = Set(Some(Utc::now().into()));
        self.update(active).await
    }

    /// Permanently delete a form. Its submissions go with it (FK cascade).
    pub async fn force_delete(&self, id: &str) -> AppResult<()> {
        let result = Form::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Form: {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    fn create_test_form(id: &str, slug: &str) -> form::Model {
        form::Model {
            id: id.to_string(),
            title: "Survey".to_string(),
            slug: slug.to_string(),
            description: None,
            thumbnail: None,
            fields: json!([]),
            is_active: true,
            allow_multiple_submissions: true,
            is_anonymous: false,
            submission_limit: None,
            submission_count: 0,
            start_date: None,
            end_date: None,
            redirect: None,
            created_at: Utc::now().into(),
            updated_at: None,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_slug_returns_form() {
        let form = create_test_form("form1", "survey");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[form.clone()]])
                .into_connection(),
        );

        let repo = FormRepository::new(db);
        let found = repo.find_by_slug("survey").await.unwrap().unwrap();

        assert_eq!(found.id, "form1");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<form::Model>::new()])
                .into_connection(),
        );

        let repo = FormRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_all_searches_title_and_slug() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_form("form1", "member-survey")]])
                .into_connection(),
        );

        let repo = FormRepository::new(Arc::clone(&db));
        let filter = FormListFilter {
            search: Some("Survey".to_string()),
            ..FormListFilter::default()
        };
        let forms = repo.find_all(&filter, 20, 0).await.unwrap();
        assert_eq!(forms.len(), 1);
        drop(repo);

        let log = format!(
            "{:?}",
            Arc::try_unwrap(db).unwrap().into_transaction_log()
        );
        assert!(log.contains("LOWER("));
        assert!(log.contains("title"));
        assert!(log.contains("slug"));
        assert!(log.contains("%survey%"));
    }

    #[tokio::test]
    async fn test_slug_exists() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(1))
                }]])
                .into_connection(),
        );

        let repo = FormRepository::new(db);
        assert!(repo.slug_exists("survey", Some("form2")).await.unwrap());
    }

    #[tokio::test]
    async fn test_soft_delete_sets_deleted_at() {
        let form = create_test_form("form1", "survey");
        let mut trashed = form.clone();
        trashed.deleted_at = Some(Utc::now().into());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[form]])
                .append_query_results([[trashed]])
                .into_connection(),
        );

        let repo = FormRepository::new(db);
        let result = repo.soft_delete("form1").await.unwrap();

        assert!(result.deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_force_delete_missing_form() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = FormRepository::new(db);
        let result = repo.force_delete("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
