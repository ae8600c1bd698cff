//! Form service.

use chrono::{DateTime, Utc};
use formdesk_common::{AppError, AppResult, IdGenerator, StorageService};
use formdesk_db::entities::form;
use formdesk_db::repositories::{FormListFilter, FormRepository, FormSubmissionRepository};
use sea_orm::Set;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use super::acceptance::{ClosedReason, check_acceptance};
use crate::schema::{FieldDef, FieldOption, FormSchema, is_valid_slug, slugify};

/// Maximum length of titles and slugs.
const MAX_TITLE_LENGTH: usize = 255;

/// Input for creating a form.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFormInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 255))]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    #[validate(length(min = 1))]
    pub fields: Vec<FieldDef>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub allow_multiple_submissions: bool,
    #[serde(default)]
    pub is_anonymous: bool,
    #[validate(range(min = 1))]
    pub submission_limit: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub redirect: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Input for updating a form. Absent keys are left alone; `null` clears
/// nullable settings.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateFormInput {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub thumbnail: Option<Option<String>>,
    #[validate(length(min = 1))]
    pub fields: Option<Vec<FieldDef>>,
    pub is_active: Option<bool>,
    pub allow_multiple_submissions: Option<bool>,
    pub is_anonymous: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub submission_limit: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub redirect: Option<Option<String>>,
}

/// Tell an explicit `null` apart from a missing key.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Form as shown to administrators.
#[derive(Debug, Clone, Serialize)]
pub struct FormResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub thumbnail_url: Option<String>,
    pub fields: Vec<FieldDef>,
    pub is_active: bool,
    pub allow_multiple_submissions: bool,
    pub is_anonymous: bool,
    pub submission_limit: Option<i32>,
    pub submission_count: i32,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub redirect: Option<String>,
    pub is_accepting_submissions: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl FormResponse {
    fn from_model(f: form::Model, storage: &StorageService, now: DateTime<Utc>) -> AppResult<Self> {
        let is_accepting_submissions = f.deleted_at.is_none() && check_acceptance(&f, now).is_ok();
        let fields = FormSchema::from_json(&f.fields)?.into_fields();
        Ok(Self {
            thumbnail_url: f.thumbnail.as_deref().map(|key| storage.public_url(key)),
            fields,
            is_accepting_submissions,
            id: f.id,
            title: f.title,
            slug: f.slug,
            description: f.description,
            thumbnail: f.thumbnail,
            is_active: f.is_active,
            allow_multiple_submissions: f.allow_multiple_submissions,
            is_anonymous: f.is_anonymous,
            submission_limit: f.submission_limit,
            submission_count: f.submission_count,
            start_date: f.start_date.map(|t| t.to_rfc3339()),
            end_date: f.end_date.map(|t| t.to_rfc3339()),
            redirect: f.redirect,
            created_at: f.created_at.to_rfc3339(),
            updated_at: f.updated_at.map(|t| t.to_rfc3339()),
            deleted_at: f.deleted_at.map(|t| t.to_rfc3339()),
        })
    }
}

/// A page of forms and the number of matches overall.
#[derive(Debug, Clone, Serialize)]
pub struct FormList {
    pub forms: Vec<FormResponse>,
    pub total: u64,
}

/// A field as rendered to the public.
#[derive(Debug, Clone, Serialize)]
pub struct PublicField {
    /// Name to post the value under; absent for layout fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
}

impl From<&FieldDef> for PublicField {
    fn from(field: &FieldDef) -> Self {
        Self {
            name: field.is_input().then(|| field.wire_name()),
            field_type: field.field_type.to_string(),
            label: field.label.clone(),
            content: field.content.clone(),
            required: field.required,
            placeholder: field.placeholder.clone(),
            help_text: field.help_text.clone(),
            options: field.options.clone(),
        }
    }
}

/// Schema of a form that is open for submissions.
#[derive(Debug, Clone, Serialize)]
pub struct PublicForm {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    /// Whether the submitter's name and email are asked for.
    pub collects_submitter: bool,
    pub fields: Vec<PublicField>,
}

/// What is shown of a closed form.
#[derive(Debug, Clone, Serialize)]
pub struct ClosedForm {
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

/// Public view of a form.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublicFormView {
    Open { form: PublicForm },
    Closed { reason: ClosedReason, form: ClosedForm },
}

/// Settings of a form under edit, before they are written back.
#[derive(Debug, Clone)]
struct FormDraft {
    title: String,
    slug: Option<String>,
    description: Option<String>,
    thumbnail: Option<String>,
    fields: Vec<FieldDef>,
    is_active: bool,
    allow_multiple_submissions: bool,
    is_anonymous: bool,
    submission_limit: Option<i32>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    redirect: Option<String>,
}

impl From<CreateFormInput> for FormDraft {
    fn from(input: CreateFormInput) -> Self {
        Self {
            title: input.title,
            slug: input.slug,
            description: input.description,
            thumbnail: input.thumbnail,
            fields: input.fields,
            is_active: input.is_active,
            allow_multiple_submissions: input.allow_multiple_submissions,
            is_anonymous: input.is_anonymous,
            submission_limit: input.submission_limit,
            start_date: input.start_date,
            end_date: input.end_date,
            redirect: input.redirect,
        }
    }
}

impl FormDraft {
    fn from_model(f: &form::Model) -> AppResult<Self> {
        Ok(Self {
            title: f.title.clone(),
            slug: Some(f.slug.clone()),
            description: f.description.clone(),
            thumbnail: f.thumbnail.clone(),
            fields: FormSchema::from_json(&f.fields)?.into_fields(),
            is_active: f.is_active,
            allow_multiple_submissions: f.allow_multiple_submissions,
            is_anonymous: f.is_anonymous,
            submission_limit: f.submission_limit,
            start_date: f.start_date.map(|t| t.with_timezone(&Utc)),
            end_date: f.end_date.map(|t| t.with_timezone(&Utc)),
            redirect: f.redirect.clone(),
        })
    }

    fn apply(&mut self, input: UpdateFormInput) {
        if let Some(title) = input.title {
            self.title = title;
        }
        if let Some(slug) = input.slug {
            self.slug = Some(slug);
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if let Some(thumbnail) = input.thumbnail {
            self.thumbnail = thumbnail;
        }
        if let Some(fields) = input.fields {
            self.fields = fields;
        }
        if let Some(is_active) = input.is_active {
            self.is_active = is_active;
        }
        if let Some(allow) = input.allow_multiple_submissions {
            self.allow_multiple_submissions = allow;
        }
        if let Some(is_anonymous) = input.is_anonymous {
            self.is_anonymous = is_anonymous;
        }
        if let Some(limit) = input.submission_limit {
            self.submission_limit = limit;
        }
        if let Some(start_date) = input.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = input.end_date {
            self.end_date = end_date;
        }
        if let Some(redirect) = input.redirect {
            self.redirect = redirect;
        }
    }

    /// Normalize and check everything that does not need the database.
    /// Returns the final slug.
    fn prepare(&mut self, id_gen: &IdGenerator) -> AppResult<String> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() || self.title.chars().count() > MAX_TITLE_LENGTH {
            return Err(AppError::Validation(
                "Title must be between 1 and 255 characters".to_string(),
            ));
        }

        let slug = match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => slugify(&self.title),
        };
        if slug.is_empty() {
            return Err(AppError::Validation(
                "Slug is required when the title has no usable characters".to_string(),
            ));
        }
        if slug.len() > MAX_TITLE_LENGTH || !is_valid_slug(&slug) {
            return Err(AppError::Validation(
                "Slug may only contain letters, numbers, dashes and underscores (max 255)"
                    .to_string(),
            ));
        }

        if let Some(limit) = self.submission_limit
            && limit < 1
        {
            return Err(AppError::Validation(
                "Submission limit must be at least 1".to_string(),
            ));
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && end <= start
        {
            return Err(AppError::Validation(
                "End date must be after start date".to_string(),
            ));
        }

        self.redirect = normalize_redirect(self.redirect.as_deref())?;

        let mut schema = FormSchema::new(std::mem::take(&mut self.fields));
        schema.prepare(id_gen);
        schema.check()?;
        self.fields = schema.into_fields();

        Ok(slug)
    }
}

/// Normalize a redirect target entered by an administrator.
///
/// Blank becomes `None`; a value without an `http://` or `https://` scheme
/// gets `https://` prepended. The result must parse as a URL.
pub fn normalize_redirect(redirect: Option<&str>) -> AppResult<Option<String>> {
    let Some(raw) = redirect.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    let lower = raw.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    match url::Url::parse(&candidate) {
        Ok(parsed) if parsed.host_str().is_some_and(|h| !h.is_empty()) => Ok(Some(candidate)),
        _ => Err(AppError::Validation(format!(
            "Redirect is not a valid URL: {raw}"
        ))),
    }
}

/// Build the copy of a form made by [`FormService::clone_form`].
///
/// The copy starts inactive with no submissions; fields (ids included) and
/// every other setting are kept.
#[must_use]
pub fn clone_model(source: &form::Model, id: String, now: DateTime<Utc>) -> form::ActiveModel {
    form::ActiveModel {
        id: Set(id),
        title: Set(format!("{} (Copy)", source.title)),
        slug: Set(slugify(&format!("{} Copy {}", source.title, now.timestamp()))),
        description: Set(source.description.clone()),
        thumbnail: Set(source.thumbnail.clone()),
        fields: Set(source.fields.clone()),
        is_active: Set(false),
        allow_multiple_submissions: Set(source.allow_multiple_submissions),
        is_anonymous: Set(source.is_anonymous),
        submission_limit: Set(source.submission_limit),
        submission_count: Set(0),
        start_date: Set(source.start_date),
        end_date: Set(source.end_date),
        redirect: Set(source.redirect.clone()),
        created_at: Set(now.into()),
        updated_at: Set(None),
        deleted_at: Set(None),
    }
}

/// Service for administering forms and serving their public schema.
#[derive(Clone)]
pub struct FormService {
    form_repo: FormRepository,
    submission_repo: FormSubmissionRepository,
    storage: StorageService,
    id_gen: IdGenerator,
}

impl FormService {
    /// Create a new form service.
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
        }
    }

    fn respond(&self, model: form::Model) -> AppResult<FormResponse> {
        FormResponse::from_model(model, &self.storage, Utc::now())
    }

    async fn ensure_slug_free(&self, slug: &str, except_id: Option<&str>) -> AppResult<()> {
        if self.form_repo.slug_exists(slug, except_id).await? {
            return Err(AppError::Conflict(format!("Slug '{slug}' is already taken")));
        }
        Ok(())
    }

    /// Create a form.
    pub async fn create(&self, input: CreateFormInput) -> AppResult<FormResponse> {
        input.validate()?;

        let mut draft = FormDraft::from(input);
        let slug = draft.prepare(&self.id_gen)?;
        self.ensure_slug_free(&slug, None).await?;

        let model = form::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(draft.title),
            slug: Set(slug),
            description: Set(draft.description),
            thumbnail: Set(draft.thumbnail),
            fields: Set(FormSchema::new(draft.fields).to_json()?),
            is_active: Set(draft.is_active),
            allow_multiple_submissions: Set(draft.allow_multiple_submissions),
            is_anonymous: Set(draft.is_anonymous),
            submission_limit: Set(draft.submission_limit),
            submission_count: Set(0),
            start_date: Set(draft.start_date.map(Into::into)),
            end_date: Set(draft.end_date.map(Into::into)),
            redirect: Set(draft.redirect),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
            deleted_at: Set(None),
        };

        let created = self.form_repo.create(model).await?;
        tracing::info!(form_id = %created.id, slug = %created.slug, "Created form");
        self.respond(created)
    }

    /// Update a form. Only the keys present in `input` change.
    pub async fn update(&self, id: &str, input: UpdateFormInput) -> AppResult<FormResponse> {
        input.validate()?;

        let existing = self.form_repo.get_by_id(id).await?;
        let was_single = !existing.allow_multiple_submissions && !existing.is_anonymous;
        let mut draft = FormDraft::from_model(&existing)?;
        draft.apply(input);
        let slug = draft.prepare(&self.id_gen)?;
        if slug != existing.slug {
            self.ensure_slug_free(&slug, Some(id)).await?;
        }

        let mut active: form::ActiveModel = existing.into();
        active.title = Set(draft.title);
        active.slug = Set(slug);
        active.description = Set(draft.description);
        active.thumbnail = Set(draft.thumbnail);
        active.fields = Set(FormSchema::new(draft.fields).to_json()?);
        active.is_active = Set(draft.is_active);
        active.allow_multiple_submissions = Set(draft.allow_multiple_submissions);
        active.is_anonymous = Set(draft.is_anonymous);
        active.submission_limit = Set(draft.submission_limit);
        active.start_date = Set(draft.start_date.map(Into::into));
        active.end_date = Set(draft.end_date.map(Into::into));
        active.redirect = Set(draft.redirect);
        active.updated_at = Set(Some(Utc::now().into()));

        let updated = self.form_repo.update(active).await?;
        tracing::info!(form_id = %updated.id, "Updated form");

        if !was_single && !updated.allow_multiple_submissions && !updated.is_anonymous {
            let keyed = self.submission_repo.backfill_dedupe_keys(&updated.id).await?;
            tracing::info!(form_id = %updated.id, keyed, "Form now accepts one submission per email");
        }

        self.respond(updated)
    }

    /// Get a form by ID, trashed forms included.
    pub async fn get(&self, id: &str) -> AppResult<FormResponse> {
        let form = self.form_repo.get_by_id(id).await?;
        self.respond(form)
    }

    /// List forms, newest first.
    pub async fn list(
        &self,
        filter: &FormListFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<FormList> {
        let forms = self
            .form_repo
            .find_all(filter, limit, offset)
            .await?
            .into_iter()
            .map(|f| self.respond(f))
            .collect::<AppResult<Vec<_>>>()?;
        let total = self.form_repo.count(filter).await?;
        Ok(FormList { forms, total })
    }

    /// Soft-delete a form.
    pub async fn delete(&self, id: &str) -> AppResult<FormResponse> {
        let form = self.form_repo.soft_delete(id).await?;
        tracing::info!(form_id = %id, "Moved form to trash");
        self.respond(form)
    }

    /// Restore a soft-deleted form.
    pub async fn restore(&self, id: &str) -> AppResult<FormResponse> {
        let form = self.form_repo.restore(id).await?;
        tracing::info!(form_id = %id, "Restored form");
        self.respond(form)
    }

    /// Permanently delete a form, its submissions and their uploaded files.
    pub async fn force_delete(&self, id: &str) -> AppResult<()> {
        let form = self.form_repo.get_by_id(id).await?;
        let schema = super::submission::schema_for_cleanup(&form);
        let submissions = self.submission_repo.find_by_form_id(id).await?;

        let keys: Vec<String> = submissions
            .iter()
            .flat_map(|s| super::submission::file_keys(&schema, &s.data))
            .collect();

        self.form_repo.force_delete(id).await?;
        tracing::info!(
            form_id = %id,
            submissions = submissions.len(),
            "Permanently deleted form"
        );

        super::submission::remove_files(&self.storage, &keys).await;
        Ok(())
    }

    /// Duplicate a form under a new slug.
    pub async fn clone_form(&self, id: &str) -> AppResult<FormResponse> {
        let source = self.form_repo.get_by_id(id).await?;
        let now = Utc::now();
        let mut model = clone_model(&source, self.id_gen.generate(), now);

        let base = slugify(&format!("{} Copy {}", source.title, now.timestamp()));
        let mut slug = base.clone();
        let mut suffix = 2;
        while self.form_repo.slug_exists(&slug, None).await? {
            slug = format!("{base}-{suffix}");
            suffix += 1;
        }
        model.slug = Set(slug);

        let cloned = self.form_repo.create(model).await?;
        tracing::info!(form_id = %id, clone_id = %cloned.id, "Cloned form");
        self.respond(cloned)
    }

    /// Soft-delete several forms. Returns how many were found.
    pub async fn delete_many(&self, ids: &[String]) -> AppResult<u64> {
        self.for_each_form(ids, |id| async move { self.delete(&id).await.map(drop) })
            .await
    }

    /// Restore several soft-deleted forms. Returns how many were found.
    pub async fn restore_many(&self, ids: &[String]) -> AppResult<u64> {
        self.for_each_form(ids, |id| async move { self.restore(&id).await.map(drop) })
            .await
    }

    /// Permanently delete several forms. Returns how many were found.
    pub async fn force_delete_many(&self, ids: &[String]) -> AppResult<u64> {
        self.for_each_form(ids, |id| async move { self.force_delete(&id).await })
            .await
    }

    /// Apply `action` to every id, skipping forms that do not exist.
    async fn for_each_form<F, Fut>(&self, ids: &[String], action: F) -> AppResult<u64>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = AppResult<()>>,
    {
        let mut affected = 0;
        for id in ids {
            match action(id.clone()).await {
                Ok(()) => affected += 1,
                Err(AppError::NotFound(_)) => {
                    tracing::debug!(form_id = %id, "Skipped unknown form");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(affected)
    }

    /// Public view of a live form: its schema when open, a summary otherwise.
    pub async fn public_view(&self, slug: &str, now: DateTime<Utc>) -> AppResult<PublicFormView> {
        let form = self
            .form_repo
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Form: {slug}")))?;

        let thumbnail = form.thumbnail.as_deref().map(|key| self.storage.public_url(key));

        if let Err(reason) = check_acceptance(&form, now) {
            return Ok(PublicFormView::Closed {
                reason,
                form: ClosedForm {
                    title: form.title,
                    description: form.description,
                    thumbnail,
                },
            });
        }

        let schema = FormSchema::from_json(&form.fields)?;
        Ok(PublicFormView::Open {
            form: PublicForm {
                title: form.title,
                slug: form.slug,
                description: form.description,
                thumbnail,
                collects_submitter: !form.is_anonymous,
                fields: schema.fields().iter().map(PublicField::from).collect(),
            },
        })
    }
}
