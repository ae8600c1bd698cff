//! Validation rules derived from a form schema at request time.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use formdesk_common::FieldErrors;
use validator::ValidateEmail;

use super::field::{FieldDef, FieldType};
use super::input::{InputValue, SUBMITTER_EMAIL, SUBMITTER_NAME, SubmissionInput};

/// Largest accepted upload, in kilobytes.
pub const MAX_FILE_KILOBYTES: u64 = 10 * 1024;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// A single constraint on a posted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,
    String,
    Email,
    Numeric,
    Date,
    File { max_kilobytes: u64 },
    In(Vec<String>),
    List,
}

/// Rules contributed by one field type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFragment {
    /// Rules on the value itself.
    pub rules: Vec<Rule>,
    /// Rules on every element of a list value (`<name>.*`).
    pub each: Vec<Rule>,
}

impl FieldType {
    /// Type-specific rules for a field of this type.
    #[must_use]
    pub fn rule_fragment(&self, field: &FieldDef, max_file_kilobytes: u64) -> RuleFragment {
        match self {
            Self::Email => RuleFragment {
                rules: vec![Rule::Email],
                each: Vec::new(),
            },
            Self::Number => RuleFragment {
                rules: vec![Rule::Numeric],
                each: Vec::new(),
            },
            Self::Date => RuleFragment {
                rules: vec![Rule::Date],
                each: Vec::new(),
            },
            Self::File => RuleFragment {
                rules: vec![Rule::File {
                    max_kilobytes: max_file_kilobytes,
                }],
                each: Vec::new(),
            },
            Self::Select | Self::Radio => RuleFragment {
                rules: vec![Rule::In(field.option_values())],
                each: Vec::new(),
            },
            Self::Checkbox => RuleFragment {
                rules: vec![Rule::List],
                each: vec![Rule::In(field.option_values())],
            },
            Self::Text
            | Self::Textarea
            | Self::Heading
            | Self::Paragraph
            | Self::Unknown(_) => RuleFragment::default(),
        }
    }
}

/// Rules for one posted name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRules {
    /// Posted name.
    pub name: String,
    /// Name used in messages.
    pub attribute: String,
    pub rules: Vec<Rule>,
    pub each: Vec<Rule>,
}

/// All rules for a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    entries: Vec<FieldRules>,
}

/// Build the rules for a schema with the default upload ceiling.
#[must_use]
pub fn build_rules(fields: &[FieldDef], is_anonymous: bool) -> RuleSet {
    build_rules_with_limit(fields, is_anonymous, MAX_FILE_KILOBYTES)
}

/// Build the rules for a schema.
///
/// Non-anonymous forms also require the submitter's name and email. Layout
/// fields and fields without any constraint get no entry.
#[must_use]
pub fn build_rules_with_limit(
    fields: &[FieldDef],
    is_anonymous: bool,
    max_file_kilobytes: u64,
) -> RuleSet {
    let mut entries = Vec::new();

    if !is_anonymous {
        entries.push(FieldRules {
            name: SUBMITTER_NAME.to_string(),
            attribute: "name".to_string(),
            rules: vec![Rule::Required, Rule::String],
            each: Vec::new(),
        });
        entries.push(FieldRules {
            name: SUBMITTER_EMAIL.to_string(),
            attribute: "email".to_string(),
            rules: vec![Rule::Required, Rule::Email],
            each: Vec::new(),
        });
    }

    for field in fields.iter().filter(|f| f.is_input()) {
        let fragment = field.field_type.rule_fragment(field, max_file_kilobytes);
        let mut rules = Vec::with_capacity(fragment.rules.len() + 1);
        if field.required {
            rules.push(Rule::Required);
        }
        rules.extend(fragment.rules);

        if rules.is_empty() && fragment.each.is_empty() {
            continue;
        }

        entries.push(FieldRules {
            name: field.wire_name(),
            attribute: field.storage_label().to_string(),
            rules,
            each: fragment.each,
        });
    }

    RuleSet { entries }
}

impl RuleSet {
    #[must_use]
    pub fn entries(&self) -> &[FieldRules] {
        &self.entries
    }

    #[must_use]
    pub fn for_name(&self, name: &str) -> Option<&FieldRules> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Check a submission against every rule.
    pub fn validate(&self, input: &SubmissionInput) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        for entry in &self.entries {
            let Some(value) = input.filled(&entry.name) else {
                if entry.rules.contains(&Rule::Required) {
                    errors
                        .entry(entry.name.clone())
                        .or_default()
                        .push(format!("The {} field is required.", entry.attribute));
                }
                continue;
            };

            for rule in &entry.rules {
                if let Some(message) = check(rule, value, &entry.attribute) {
                    errors.entry(entry.name.clone()).or_default().push(message);
                }
            }

            if entry.each.is_empty() {
                continue;
            }
            let items: &[String] = match value {
                InputValue::List(items) => items,
                InputValue::Text(text) => std::slice::from_ref(text),
                InputValue::File(_) => &[],
            };
            for (index, item) in items.iter().enumerate() {
                let item = InputValue::Text(item.clone());
                for rule in &entry.each {
                    if let Some(message) = check(rule, &item, &entry.attribute) {
                        errors
                            .entry(format!("{}.{index}", entry.name))
                            .or_default()
                            .push(message);
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn check(rule: &Rule, value: &InputValue, attribute: &str) -> Option<String> {
    let text = match value {
        InputValue::Text(text) => Some(text.trim()),
        _ => None,
    };

    let ok = match rule {
        Rule::Required => !value.is_blank(),
        Rule::String => text.is_some(),
        Rule::Email => text.is_some_and(|t| t.validate_email()),
        Rule::Numeric => text.is_some_and(is_numeric),
        Rule::Date => text.is_some_and(is_date),
        Rule::File { max_kilobytes } => match value {
            InputValue::File(file) => {
                if file.size() > max_kilobytes * 1024 {
                    return Some(format!(
                        "The {attribute} field must not be greater than {max_kilobytes} kilobytes."
                    ));
                }
                true
            }
            _ => false,
        },
        Rule::In(allowed) => text.is_some_and(|t| allowed.iter().any(|a| a == t)),
        Rule::List => matches!(value, InputValue::List(_) | InputValue::Text(_)),
    };

    if ok {
        return None;
    }

    Some(match rule {
        Rule::Required => format!("The {attribute} field is required."),
        Rule::String => format!("The {attribute} field must be a string."),
        Rule::Email => format!("The {attribute} field must be a valid email address."),
        Rule::Numeric => format!("The {attribute} field must be a number."),
        Rule::Date => format!("The {attribute} field must be a valid date."),
        Rule::File { .. } => format!("The {attribute} field must be a file."),
        Rule::In(_) => format!("The selected {attribute} is invalid."),
        Rule::List => format!("The {attribute} field must be an array."),
    })
}

fn is_numeric(text: &str) -> bool {
    text.parse::<f64>().is_ok_and(f64::is_finite)
}

fn is_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        || DATETIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(text, fmt).is_ok())
        || DateTime::parse_from_rfc3339(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldOption, UploadedFile};
    use bytes::Bytes;

    fn field(field_type: FieldType, id: &str, label: &str, required: bool) -> FieldDef {
        FieldDef {
            id: Some(id.to_string()),
            field_type,
            label: Some(label.to_string()),
            required,
            ..FieldDef::default()
        }
    }

    fn with_options(mut f: FieldDef, values: &[&str]) -> FieldDef {
        f.options = values
            .iter()
            .map(|v| FieldOption {
                label: v.to_uppercase(),
                value: (*v).to_string(),
            })
            .collect();
        f
    }

    #[test]
    fn test_non_anonymous_requires_submitter() {
        let rules = build_rules(&[], false);

        assert_eq!(
            rules.for_name(SUBMITTER_NAME).unwrap().rules,
            vec![Rule::Required, Rule::String]
        );
        assert_eq!(
            rules.for_name(SUBMITTER_EMAIL).unwrap().rules,
            vec![Rule::Required, Rule::Email]
        );
    }

    #[test]
    fn test_anonymous_has_no_submitter_rules() {
        let rules = build_rules(&[], true);
        assert!(rules.entries().is_empty());
    }

    #[test]
    fn test_optional_text_gets_no_rules() {
        let rules = build_rules(&[field(FieldType::Text, "a", "Note", false)], true);
        assert!(rules.entries().is_empty());
    }

    #[test]
    fn test_layout_fields_are_skipped() {
        let heading = FieldDef {
            field_type: FieldType::Heading,
            content: Some("Intro".to_string()),
            required: true,
            ..FieldDef::default()
        };
        assert!(build_rules(&[heading], true).entries().is_empty());
    }

    #[test]
    fn test_unknown_type_only_presence() {
        let f = field(FieldType::Unknown("rating".to_string()), "a", "Stars", true);
        let rules = build_rules(&[f], true);
        assert_eq!(rules.for_name("field_a").unwrap().rules, vec![Rule::Required]);
    }

    #[test]
    fn test_checkbox_rule_targets_elements() {
        let f = with_options(field(FieldType::Checkbox, "a", "Days", false), &["mon", "tue"]);
        let rules = build_rules(&[f], true);
        let entry = rules.for_name("field_a").unwrap();

        assert_eq!(entry.rules, vec![Rule::List]);
        assert_eq!(
            entry.each,
            vec![Rule::In(vec!["mon".to_string(), "tue".to_string()])]
        );
    }

    #[test]
    fn test_select_outside_options_names_label() {
        let f = with_options(field(FieldType::Select, "t", "Track", true), &["a", "b"]);
        let rules = build_rules(&[f], true);

        let mut input = SubmissionInput::new();
        input.push_text("field_t", "z");

        let errors = rules.validate(&input).unwrap_err();
        let messages = &errors["field_t"];
        assert!(messages.iter().any(|m| m.contains("Track")));
    }

    #[test]
    fn test_checkbox_items_reported_by_index() {
        let f = with_options(field(FieldType::Checkbox, "a", "Days", false), &["mon", "tue"]);
        let rules = build_rules(&[f], true);

        let mut input = SubmissionInput::new();
        input.push_text("field_a[]", "mon");
        input.push_text("field_a[]", "sun");

        let errors = rules.validate(&input).unwrap_err();
        assert!(!errors.contains_key("field_a.0"));
        assert!(errors["field_a.1"][0].contains("Days"));
    }

    #[test]
    fn test_required_checkbox_needs_a_selection() {
        let f = with_options(field(FieldType::Checkbox, "a", "Days", true), &["mon"]);
        let rules = build_rules(&[f], true);

        let errors = rules.validate(&SubmissionInput::new()).unwrap_err();
        assert!(errors.contains_key("field_a"));
    }

    #[test]
    fn test_optional_absent_field_skips_rules() {
        let rules = build_rules(&[field(FieldType::Email, "e", "Work email", false)], true);

        let mut input = SubmissionInput::new();
        input.push_text("field_e", "");

        assert!(rules.validate(&input).is_ok());
    }

    #[test]
    fn test_number_and_date_formats() {
        let rules = build_rules(
            &[
                field(FieldType::Number, "n", "Age", true),
                field(FieldType::Date, "d", "Birthday", true),
            ],
            true,
        );

        let mut input = SubmissionInput::new();
        input.push_text("field_n", " 21.5 ");
        input.push_text("field_d", "2001-02-03");
        assert!(rules.validate(&input).is_ok());

        let mut input = SubmissionInput::new();
        input.push_text("field_n", "NaN");
        input.push_text("field_d", "03/02/2001");
        let errors = rules.validate(&input).unwrap_err();
        assert!(errors["field_n"][0].contains("Age"));
        assert!(errors["field_d"][0].contains("Birthday"));
    }

    #[test]
    fn test_date_accepts_datetime_forms() {
        assert!(is_date("2025-03-14T10:30"));
        assert!(is_date("2025-03-14 10:30:15"));
        assert!(is_date("2025-03-14T10:30:15+07:00"));
        assert!(!is_date("2025-13-01"));
    }

    #[test]
    fn test_file_size_limit() {
        let rules = build_rules(&[field(FieldType::File, "f", "CV", false)], true);
        let too_big = (MAX_FILE_KILOBYTES * 1024 + 1) as usize;

        let mut input = SubmissionInput::new();
        input.push_file(
            "field_f",
            UploadedFile {
                file_name: "cv.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                data: Bytes::from(vec![0u8; too_big]),
            },
        );

        let errors = rules.validate(&input).unwrap_err();
        assert!(errors["field_f"][0].contains("10240 kilobytes"));
    }

    #[test]
    fn test_file_limit_is_configurable() {
        let rules = build_rules_with_limit(&[field(FieldType::File, "f", "CV", false)], true, 1);

        let mut input = SubmissionInput::new();
        input.push_file(
            "field_f",
            UploadedFile {
                file_name: "cv.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                data: Bytes::from(vec![0u8; 2048]),
            },
        );

        let errors = rules.validate(&input).unwrap_err();
        assert!(errors["field_f"][0].contains("1 kilobytes"));
    }

    #[test]
    fn test_file_field_rejects_text() {
        let rules = build_rules(&[field(FieldType::File, "f", "CV", false)], true);

        let mut input = SubmissionInput::new();
        input.push_text("field_f", "cv.pdf");

        let errors = rules.validate(&input).unwrap_err();
        assert_eq!(errors["field_f"], vec!["The CV field must be a file.".to_string()]);
    }

    #[test]
    fn test_invalid_submitter_email() {
        let rules = build_rules(&[], false);

        let mut input = SubmissionInput::new();
        input.push_text(SUBMITTER_NAME, "Ada");
        input.push_text(SUBMITTER_EMAIL, "not-an-email");

        let errors = rules.validate(&input).unwrap_err();
        assert!(errors.contains_key(SUBMITTER_EMAIL));
        assert!(!errors.contains_key(SUBMITTER_NAME));
    }
}
