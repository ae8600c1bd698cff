//! Values posted to a form, keyed by wire name.

use std::collections::HashMap;

use bytes::Bytes;

/// Name of the submitter's name input.
pub const SUBMITTER_NAME: &str = "submitted_by_name";
/// Name of the submitter's email input.
pub const SUBMITTER_EMAIL: &str = "submitted_by_email";
/// Name of the submitter's phone input.
pub const SUBMITTER_PHONE: &str = "submitted_by_phone";

/// A file part of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A single posted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    Text(String),
    List(Vec<String>),
    File(UploadedFile),
}

impl InputValue {
    /// Empty strings, empty lists and empty files count as absent.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::File(file) => file.file_name.is_empty() && file.data.is_empty(),
        }
    }
}

/// Everything a client posted to the submit endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionInput {
    values: HashMap<String, InputValue>,
}

impl SubmissionInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text part.
    ///
    /// A trailing `[]` marks a list part; a name seen twice also becomes a
    /// list.
    pub fn push_text(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();

        if let Some(base) = name.strip_suffix("[]") {
            match self.values.get_mut(base) {
                Some(InputValue::List(items)) => items.push(value),
                Some(InputValue::Text(first)) => {
                    let first = std::mem::take(first);
                    self.values
                        .insert(base.to_string(), InputValue::List(vec![first, value]));
                }
                _ => {
                    self.values
                        .insert(base.to_string(), InputValue::List(vec![value]));
                }
            }
            return;
        }

        match self.values.get_mut(name) {
            Some(InputValue::List(items)) => items.push(value),
            Some(InputValue::Text(first)) => {
                let first = std::mem::take(first);
                self.values
                    .insert(name.to_string(), InputValue::List(vec![first, value]));
            }
            _ => {
                self.values.insert(name.to_string(), InputValue::Text(value));
            }
        }
    }

    /// Add a file part. Parts without a name and without content are ignored.
    pub fn push_file(&mut self, name: &str, file: UploadedFile) {
        let value = InputValue::File(file);
        if value.is_blank() {
            return;
        }
        self.values.insert(name.to_string(), value);
    }

    /// Replace a list value with its last item.
    pub fn keep_last(&mut self, name: &str) {
        if let Some(InputValue::List(items)) = self.values.get_mut(name) {
            let collapsed = items.pop().map_or(InputValue::List(Vec::new()), InputValue::Text);
            self.values.insert(name.to_string(), collapsed);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.values.get(name)
    }

    /// A present, non-blank value.
    #[must_use]
    pub fn filled(&self, name: &str) -> Option<&InputValue> {
        self.get(name).filter(|v| !v.is_blank())
    }

    /// Text value, trimmed, if present and non-blank.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.filled(name) {
            Some(InputValue::Text(text)) => Some(text.trim()),
            _ => None,
        }
    }

    #[must_use]
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        match self.filled(name) {
            Some(InputValue::File(file)) => Some(file),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_last_collapses_lists() {
        let mut input = SubmissionInput::new();
        input.push_text("field_a", "first");
        input.push_text("field_a", "second");
        input.push_text("field_b", "only");

        input.keep_last("field_a");
        input.keep_last("field_b");
        input.keep_last("missing");

        assert_eq!(input.text("field_a"), Some("second"));
        assert_eq!(input.text("field_b"), Some("only"));
        assert_eq!(input.get("missing"), None);
    }

    #[test]
    fn test_bracket_parts_collect_into_list() {
        let mut input = SubmissionInput::new();
        input.push_text("field_a[]", "x");
        input.push_text("field_a[]", "y");

        assert_eq!(
            input.get("field_a"),
            Some(&InputValue::List(vec!["x".to_string(), "y".to_string()]))
        );
    }

    #[test]
    fn test_repeated_plain_parts_become_list() {
        let mut input = SubmissionInput::new();
        input.push_text("field_a", "x");
        input.push_text("field_a", "y");

        assert_eq!(
            input.get("field_a"),
            Some(&InputValue::List(vec!["x".to_string(), "y".to_string()]))
        );
    }

    #[test]
    fn test_blank_text_is_not_filled() {
        let mut input = SubmissionInput::new();
        input.push_text("field_a", "   ");

        assert!(input.get("field_a").is_some());
        assert!(input.filled("field_a").is_none());
        assert!(input.text("field_a").is_none());
    }

    #[test]
    fn test_empty_file_part_is_ignored() {
        let mut input = SubmissionInput::new();
        input.push_file(
            "field_cv",
            UploadedFile {
                file_name: String::new(),
                content_type: "application/octet-stream".to_string(),
                data: Bytes::new(),
            },
        );

        assert!(input.get("field_cv").is_none());
    }
}
