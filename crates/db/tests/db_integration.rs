//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `formdesk_test`)
//!   `TEST_DB_PASSWORD` (default: `formdesk_test`)
//!   `TEST_DB_NAME` (default: `formdesk_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::Utc;
use formdesk_common::AppError;
use formdesk_db::entities::{form, form_submission};
use formdesk_db::repositories::{FormRepository, FormSubmissionRepository, SubmissionListFilter};
use formdesk_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;
use serde_json::json;

fn new_form(id: &str, slug: &str, limit: Option<i32>) -> form::ActiveModel {
    form::ActiveModel {
        id: Set(id.to_string()),
        title: Set("Integration".to_string()),
        slug: Set(slug.to_string()),
        description: Set(None),
        thumbnail: Set(None),
        fields: Set(json!([])),
        is_active: Set(true),
        allow_multiple_submissions: Set(false),
        is_anonymous: Set(false),
        submission_limit: Set(limit),
        submission_count: Set(0),
        start_date: Set(None),
        end_date: Set(None),
        redirect: Set(None),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
        deleted_at: Set(None),
    }
}

fn new_submission(id: &str, form_id: &str, dedupe_key: Option<&str>) -> form_submission::ActiveModel {
    form_submission::ActiveModel {
        id: Set(id.to_string()),
        form_id: Set(form_id.to_string()),
        data: Set(json!({})),
        submitted_by_name: Set(None),
        submitted_by_email: Set(dedupe_key.map(str::to_string)),
        submitted_by_phone: Set(None),
        ip_address: Set(None),
        dedupe_key: Set(dedupe_key.map(str::to_string)),
        created_at: Set(Utc::now().into()),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_submission_limit_is_enforced_by_counter() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let conn = Arc::new(db.connection().clone());
    let forms = FormRepository::new(Arc::clone(&conn));
    let submissions = FormSubmissionRepository::new(Arc::clone(&conn));

    forms.create(new_form("f1", "limited", Some(2))).await.unwrap();

    submissions.record(new_submission("s1", "f1", None)).await.unwrap();
    submissions.record(new_submission("s2", "f1", None)).await.unwrap();
    let third = submissions.record(new_submission("s3", "f1", None)).await;

    assert!(matches!(
        third,
        Err(AppError::NotAcceptingSubmissions {
            reason: "limit_reached"
        })
    ));
    let filter = SubmissionListFilter {
        form_id: Some("f1".to_string()),
        search: None,
    };
    assert_eq!(submissions.count(&filter).await.unwrap(), 2);

    // Deleting a submission frees its slot
    submissions.delete("s1").await.unwrap();
    submissions.record(new_submission("s4", "f1", None)).await.unwrap();

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_dedupe_key_is_unique_per_form() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let conn = Arc::new(db.connection().clone());
    let forms = FormRepository::new(Arc::clone(&conn));
    let submissions = FormSubmissionRepository::new(Arc::clone(&conn));

    forms.create(new_form("f1", "once", None)).await.unwrap();

    submissions
        .record(new_submission("s1", "f1", Some("ada@example.com")))
        .await
        .unwrap();
    let again = submissions
        .record(new_submission("s2", "f1", Some("ada@example.com")))
        .await;
    assert!(matches!(again, Err(AppError::DuplicateSubmission)));

    // The failed attempt must not have consumed a slot
    let form = forms.get_by_id("f1").await.unwrap();
    assert_eq!(form.submission_count, 1);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_slug_is_a_conflict() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let forms = FormRepository::new(Arc::new(db.connection().clone()));

    forms.create(new_form("f1", "survey", None)).await.unwrap();
    let again = forms.create(new_form("f2", "survey", None)).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_unkeyed_rows_still_count_as_prior_submissions() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let conn = Arc::new(db.connection().clone());
    let forms = FormRepository::new(Arc::clone(&conn));
    let submissions = FormSubmissionRepository::new(Arc::clone(&conn));

    forms.create(new_form("f1", "switched", None)).await.unwrap();

    // Recorded while the form still allowed repeats: email stored, no key.
    for id in ["s1", "s2"] {
        let mut row = new_submission(id, "f1", None);
        row.submitted_by_email = Set(Some("Ada@Example.com".to_string()));
        submissions.record(row).await.unwrap();
    }

    assert!(submissions.email_exists("f1", "ada@example.com").await.unwrap());
    assert!(!submissions.email_exists("f1", "grace@example.com").await.unwrap());

    // Only the earliest row per email gets the key.
    assert_eq!(submissions.backfill_dedupe_keys("f1").await.unwrap(), 1);
    assert_eq!(submissions.backfill_dedupe_keys("f1").await.unwrap(), 0);

    let again = submissions
        .record(new_submission("s3", "f1", Some("ada@example.com")))
        .await;
    assert!(matches!(again, Err(AppError::DuplicateSubmission)));

    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}

#[test]
fn test_database_url_format() {
    let config = TestDbConfig {
        host: "testhost".to_string(),
        port: 5432,
        username: "testuser".to_string(),
        password: "testpass".to_string(),
        database: "testdb".to_string(),
    };

    let url = config.database_url();
    assert!(url.starts_with("postgres://"));
    assert!(url.contains("testhost"));
    assert!(url.contains("5432"));
    assert!(url.contains("testuser"));
    assert!(url.contains("testdb"));
}
