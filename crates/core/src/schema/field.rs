//! Field definitions embedded in a form.

use std::collections::HashSet;
use std::fmt;

use formdesk_common::{AppError, AppResult, IdGenerator};
use serde::{Deserialize, Serialize};

/// Prefix of every field wire name.
const WIRE_PREFIX: &str = "field_";

/// Kind of a form field.
///
/// Type strings this build does not know are kept as [`FieldType::Unknown`]
/// so stored schemas always load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Textarea,
    Email,
    Number,
    Date,
    Select,
    Radio,
    Checkbox,
    File,
    Heading,
    Paragraph,
    Unknown(String),
}

impl FieldType {
    /// The type name as stored in the schema.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Email => "email",
            Self::Number => "number",
            Self::Date => "date",
            Self::Select => "select",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::File => "file",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::Unknown(name) => name,
        }
    }

    /// Layout-only types carry content and never take input.
    #[must_use]
    pub const fn is_layout(&self) -> bool {
        matches!(self, Self::Heading | Self::Paragraph)
    }

    /// Types whose value must come from the option list.
    #[must_use]
    pub const fn has_options(&self) -> bool {
        matches!(self, Self::Select | Self::Radio | Self::Checkbox)
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" => Self::Text,
            "textarea" => Self::Textarea,
            "email" => Self::Email,
            "number" => Self::Number,
            "date" => Self::Date,
            "select" => Self::Select,
            "radio" => Self::Radio,
            "checkbox" => Self::Checkbox,
            "file" => Self::File,
            "heading" => Self::Heading,
            "paragraph" => Self::Paragraph,
            _ => Self::Unknown(value),
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        match value {
            FieldType::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl Default for FieldType {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One choice of a select, radio or checkbox field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: String,
}

/// A single field of a form schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldDef {
    /// Stable identifier, assigned when the form is saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Text of heading and paragraph fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
}

impl FieldDef {
    /// Whether the field takes a value.
    #[must_use]
    pub const fn is_input(&self) -> bool {
        !self.field_type.is_layout()
    }

    /// The key the value is stored under.
    #[must_use]
    pub fn storage_label(&self) -> &str {
        self.label.as_deref().unwrap_or_default()
    }

    /// The name the value is posted under.
    ///
    /// Fields saved before ids existed fall back to a hash of the label, so
    /// pages rendered from an old schema still submit correctly.
    #[must_use]
    pub fn wire_name(&self) -> String {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => format!("{WIRE_PREFIX}{id}"),
            _ => format!(
                "{WIRE_PREFIX}{:x}",
                md5::compute(self.storage_label().as_bytes())
            ),
        }
    }

    /// Values accepted by a choice field.
    #[must_use]
    pub fn option_values(&self) -> Vec<String> {
        self.options.iter().map(|o| o.value.clone()).collect()
    }
}

/// The ordered field list of a form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormSchema {
    fields: Vec<FieldDef>,
}

impl FormSchema {
    #[must_use]
    pub const fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    /// Parse a stored schema.
    pub fn from_json(value: &serde_json::Value) -> AppResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map(Self::new)
            .map_err(|e| AppError::Internal(format!("Invalid stored form schema: {e}")))
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> AppResult<serde_json::Value> {
        serde_json::to_value(&self.fields)
            .map_err(|e| AppError::Internal(format!("Failed to serialize form schema: {e}")))
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    #[must_use]
    pub fn into_fields(self) -> Vec<FieldDef> {
        self.fields
    }

    /// Fields that take a value, in schema order.
    pub fn input_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_input())
    }

    /// Resolve a wire name to its field.
    #[must_use]
    pub fn field_by_wire_name(&self, wire_name: &str) -> Option<&FieldDef> {
        self.input_fields().find(|f| f.wire_name() == wire_name)
    }

    /// Storage keys of file fields.
    #[must_use]
    pub fn file_labels(&self) -> Vec<&str> {
        self.input_fields()
            .filter(|f| f.field_type == FieldType::File)
            .map(FieldDef::storage_label)
            .collect()
    }

    /// Normalize a schema before saving: give every field an id and clear
    /// `required` on layout fields. Existing ids are never changed.
    pub fn prepare(&mut self, id_gen: &IdGenerator) {
        for field in &mut self.fields {
            if field.id.as_deref().is_none_or(str::is_empty) {
                field.id = Some(id_gen.generate_field_id());
            }
            if field.field_type.is_layout() {
                field.required = false;
            }
        }
    }

    /// Structural checks applied when a form is saved.
    pub fn check(&self) -> AppResult<()> {
        if self.fields.is_empty() {
            return Err(AppError::Validation(
                "A form needs at least one field".to_string(),
            ));
        }

        let mut labels = HashSet::new();
        let mut ids = HashSet::new();

        for (index, field) in self.fields.iter().enumerate() {
            let position = index + 1;

            if let FieldType::Unknown(name) = &field.field_type {
                return Err(AppError::Validation(format!(
                    "Field {position} has unknown type '{name}'"
                )));
            }

            if let Some(id) = field.id.as_deref()
                && !ids.insert(id)
            {
                return Err(AppError::Validation(format!(
                    "Field {position} repeats id '{id}'"
                )));
            }

            if !field.is_input() {
                continue;
            }

            let label = field.storage_label().trim();
            if label.is_empty() {
                return Err(AppError::Validation(format!(
                    "Field {position} needs a label"
                )));
            }
            if !labels.insert(label) {
                return Err(AppError::Validation(format!(
                    "Field label '{label}' is used more than once"
                )));
            }

            if field.field_type.has_options() {
                if field.options.is_empty() {
                    return Err(AppError::Validation(format!(
                        "Field '{label}' needs at least one option"
                    )));
                }
                if field
                    .options
                    .iter()
                    .any(|o| o.label.trim().is_empty() || o.value.trim().is_empty())
                {
                    return Err(AppError::Validation(format!(
                        "Options of field '{label}' need a label and a value"
                    )));
                }
            }
        }

        Ok(())
    }
}
