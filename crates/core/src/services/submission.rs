//! Form submission service.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use formdesk_common::{AppError, AppResult, IdGenerator, StorageService, generate_storage_key};
use formdesk_db::entities::{form, form_submission};
use formdesk_db::repositories::{FormRepository, FormSubmissionRepository, SubmissionListFilter};
use sea_orm::Set;
use serde::Serialize;
use serde_json::{Map, Value, json};

use super::acceptance::check_acceptance;
use crate::schema::{
    FieldType, FormSchema, InputValue, SUBMITTER_EMAIL, SUBMITTER_NAME, SUBMITTER_PHONE,
    MAX_FILE_KILOBYTES, SubmissionInput, build_rules_with_limit,
};

/// Storage prefix for uploaded submission files.
const UPLOAD_PREFIX: &str = "form-submissions";

/// Message returned for a recorded submission.
pub const SUBMITTED_MESSAGE: &str = "Form submitted successfully";

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub success: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip)]
    pub submission_id: String,
}

/// Who sent a submission, as far as it is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitterIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub ip_address: Option<String>,
    pub dedupe_key: Option<String>,
}

/// Key identifying a submitter on single-submission forms.
#[must_use]
pub fn dedupe_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Identity to store for a submission. Anonymous forms store nothing.
#[must_use]
pub fn submitter_identity(
    form: &form::Model,
    input: &SubmissionInput,
    ip_address: Option<&str>,
) -> SubmitterIdentity {
    if form.is_anonymous {
        return SubmitterIdentity::default();
    }

    let email = input.text(SUBMITTER_EMAIL).map(str::to_string);
    let key = if form.allow_multiple_submissions {
        None
    } else {
        email.as_deref().map(dedupe_key)
    };

    SubmitterIdentity {
        name: input.text(SUBMITTER_NAME).map(str::to_string),
        email,
        phone: input.text(SUBMITTER_PHONE).map(str::to_string),
        ip_address: ip_address.map(str::to_string),
        dedupe_key: key,
    }
}

/// Collapse repeated parts of single-valued inputs to the last one posted.
///
/// Checkboxes keep their lists and files are already single. The submitter
/// fields count as single-valued.
#[must_use]
pub fn collapse_single_values(schema: &FormSchema, input: &SubmissionInput) -> SubmissionInput {
    let mut input = input.clone();
    for name in [SUBMITTER_NAME, SUBMITTER_EMAIL, SUBMITTER_PHONE] {
        input.keep_last(name);
    }
    for field in schema
        .input_fields()
        .filter(|f| !matches!(f.field_type, FieldType::Checkbox | FieldType::File))
    {
        input.keep_last(&field.wire_name());
    }
    input
}

/// Map posted values onto field labels.
///
/// File fields hold their storage key (or null), checkboxes always hold a
/// list of trimmed items, everything else holds the trimmed text (or null
/// when blank). `stored` maps wire names of file fields to storage keys.
#[must_use]
pub fn build_submission_data(
    schema: &FormSchema,
    input: &SubmissionInput,
    stored: &HashMap<String, String>,
) -> Value {
    let mut data = Map::new();

    for field in schema.input_fields() {
        let wire = field.wire_name();
        let value = match field.field_type {
            FieldType::File => stored.get(&wire).map_or(Value::Null, |key| json!(key)),
            FieldType::Checkbox => match input.filled(&wire) {
                Some(InputValue::List(items)) => {
                    json!(items.iter().map(|item| item.trim()).collect::<Vec<_>>())
                }
                Some(InputValue::Text(item)) => json!([item.trim()]),
                _ => json!([]),
            },
            _ => match input.filled(&wire) {
                Some(InputValue::Text(text)) => json!(text.trim()),
                Some(InputValue::List(items)) => {
                    items.last().map_or(Value::Null, |last| json!(last.trim()))
                }
                _ => Value::Null,
            },
        };
        data.insert(field.storage_label().to_string(), value);
    }

    Value::Object(data)
}

/// Storage keys held by the file fields of a submission.
pub(crate) fn file_keys(schema: &FormSchema, data: &Value) -> Vec<String> {
    schema
        .file_labels()
        .into_iter()
        .filter_map(|label| data.get(label).and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Schema of a form about to lose rows. A corrupt schema only costs the
/// file cleanup, so it is logged rather than returned.
pub(crate) fn schema_for_cleanup(form: &form::Model) -> FormSchema {
    FormSchema::from_json(&form.fields).unwrap_or_else(|e| {
        tracing::warn!(form_id = %form.id, error = %e, "Stored form schema is unreadable");
        FormSchema::default()
    })
}

/// Delete stored files. Failures are logged, not returned.
pub(crate) async fn remove_files<'a>(
    storage: &StorageService,
    keys: impl IntoIterator<Item = &'a String>,
) {
    for key in keys {
        if let Err(e) = storage.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to delete stored file");
        }
    }
}

/// Submission as shown to administrators.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResponse {
    pub id: String,
    pub form_id: String,
    pub data: Value,
    pub submitted_by_name: Option<String>,
    pub submitted_by_email: Option<String>,
    pub submitted_by_phone: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: String,
}

impl From<form_submission::Model> for SubmissionResponse {
    fn from(s: form_submission::Model) -> Self {
        Self {
            id: s.id,
            form_id: s.form_id,
            data: s.data,
            submitted_by_name: s.submitted_by_name,
            submitted_by_email: s.submitted_by_email,
            submitted_by_phone: s.submitted_by_phone,
            ip_address: s.ip_address,
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

/// A page of submissions and the number of matches overall.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionList {
    pub submissions: Vec<SubmissionResponse>,
    pub total: u64,
}

/// A single submission with its form title and file links.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub submission: SubmissionResponse,
    pub form_title: Option<String>,
    /// Public URLs of uploaded files, by field label.
    pub files: BTreeMap<String, String>,
}

/// Service for recording and administering submissions.
#[derive(Clone)]
pub struct SubmissionService {
    form_repo: FormRepository,
    submission_repo: FormSubmissionRepository,
    storage: StorageService,
    id_gen: IdGenerator,
    max_file_kilobytes: u64,
}

impl SubmissionService {
    /// Create a new submission service.
    #[must_use]
    pub const fn new(
        form_repo: FormRepository,
        submission_repo: FormSubmissionRepository,
        storage: StorageService,
    ) -> Self {
        Self {
            form_repo,
            submission_repo,
            storage,
            id_gen: IdGenerator::new(),
            max_file_kilobytes: MAX_FILE_KILOBYTES,
        }
    }

    /// Set the per-file upload ceiling.
    #[must_use]
    pub const fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_file_kilobytes = bytes / 1024;
        self
    }

    /// Record a public submission to the form at `slug`.
    ///
    /// Runs the acceptance gate, the duplicate check, and validation, then
    /// stages uploads and records the row. Staged files are removed again if
    /// recording fails.
    pub async fn submit(
        &self,
        slug: &str,
        input: &SubmissionInput,
        ip_address: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<SubmitOutcome> {
        let form = self
            .form_repo
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Form: {slug}")))?;

        check_acceptance(&form, now)?;

        let schema = FormSchema::from_json(&form.fields)?;
        let input = &collapse_single_values(&schema, input);

        let identity = submitter_identity(&form, input, ip_address);
        if let Some(key) = identity.dedupe_key.as_deref()
            && self.submission_repo.email_exists(&form.id, key).await?
        {
            return Err(AppError::DuplicateSubmission);
        }

        build_rules_with_limit(schema.fields(), form.is_anonymous, self.max_file_kilobytes)
            .validate(input)
            .map_err(AppError::FieldValidation)?;

        let stored = self.stage_files(&schema, input).await?;
        let data = build_submission_data(&schema, input, &stored);

        let model = form_submission::ActiveModel {
            id: Set(self.id_gen.generate()),
            form_id: Set(form.id.clone()),
            data: Set(data),
            submitted_by_name: Set(identity.name),
            submitted_by_email: Set(identity.email),
            submitted_by_phone: Set(identity.phone),
            ip_address: Set(identity.ip_address),
            dedupe_key: Set(identity.dedupe_key),
            created_at: Set(now.into()),
        };

        let submission = match self.submission_repo.record(model).await {
            Ok(submission) => submission,
            Err(e) => {
                remove_files(&self.storage, stored.values()).await;
                return Err(e);
            }
        };

        tracing::info!(
            form_id = %form.id,
            submission_id = %submission.id,
            files = stored.len(),
            "Recorded form submission"
        );

        Ok(SubmitOutcome {
            success: SUBMITTED_MESSAGE,
            redirect: form.redirect.filter(|r| !r.is_empty()),
            submission_id: submission.id,
        })
    }

    /// Upload the files of a submission. Returns wire name to storage key.
    async fn stage_files(
        &self,
        schema: &FormSchema,
        input: &SubmissionInput,
    ) -> AppResult<HashMap<String, String>> {
        let mut stored = HashMap::new();

        for field in schema
            .input_fields()
            .filter(|f| f.field_type == FieldType::File)
        {
            let wire = field.wire_name();
            let Some(file) = input.file(&wire) else {
                continue;
            };

            let key = generate_storage_key(UPLOAD_PREFIX, &file.file_name);
            let content_type = if file.content_type.is_empty() {
                "application/octet-stream"
            } else {
                file.content_type.as_str()
            };

            match self.storage.upload(&key, &file.data, content_type).await {
                Ok(saved) => {
                    stored.insert(wire, saved.key);
                }
                Err(e) => {
                    remove_files(&self.storage, stored.values()).await;
                    return Err(e);
                }
            }
        }

        Ok(stored)
    }

    /// List submissions, newest first.
    pub async fn list(
        &self,
        filter: &SubmissionListFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<SubmissionList> {
        let submissions = self.submission_repo.find_all(filter, limit, offset).await?;
        let total = self.submission_repo.count(filter).await?;
        Ok(SubmissionList {
            submissions: submissions.into_iter().map(Into::into).collect(),
            total,
        })
    }

    /// Get one submission with links to its files.
    pub async fn get(&self, id: &str) -> AppResult<SubmissionDetail> {
        let submission = self.submission_repo.get_by_id(id).await?;
        let form = self.form_repo.find_by_id(&submission.form_id).await?;

        let mut files = BTreeMap::new();
        if let Some(form) = &form {
            let schema = FormSchema::from_json(&form.fields)?;
            for label in schema.file_labels() {
                if let Some(key) = submission.data.get(label).and_then(Value::as_str) {
                    files.insert(label.to_string(), self.storage.public_url(key));
                }
            }
        }

        Ok(SubmissionDetail {
            submission: submission.into(),
            form_title: form.map(|f| f.title),
            files,
        })
    }

    /// Delete a submission, free its slot and remove its files.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let submission = self.submission_repo.get_by_id(id).await?;
        let keys = match self.form_repo.find_by_id(&submission.form_id).await? {
            Some(form) => file_keys(&schema_for_cleanup(&form), &submission.data),
            None => Vec::new(),
        };

        self.submission_repo.delete(id).await?;
        tracing::info!(submission_id = %id, form_id = %submission.form_id, "Deleted submission");

        remove_files(&self.storage, &keys).await;
        Ok(())
    }

    /// Delete several submissions. Unknown ids are skipped; returns how many
    /// were deleted.
    pub async fn delete_many(&self, ids: &[String]) -> AppResult<u64> {
        let mut deleted = 0;
        for id in ids {
            match self.delete(id).await {
                Ok(()) => deleted += 1,
                Err(AppError::NotFound(_)) => {
                    tracing::debug!(submission_id = %id, "Skipped unknown submission");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(deleted)
    }
}
