//! Form schema: field definitions, posted input, validation rules and slugs.

#![allow(missing_docs)]

mod field;
mod input;
mod rules;
mod slug;

pub use field::{FieldDef, FieldOption, FieldType, FormSchema};
pub use input::{
    InputValue, SUBMITTER_EMAIL, SUBMITTER_NAME, SUBMITTER_PHONE, SubmissionInput, UploadedFile,
};
pub use rules::{
    FieldRules, MAX_FILE_KILOBYTES, Rule, RuleFragment, RuleSet, build_rules,
    build_rules_with_limit,
};
pub use slug::{is_valid_slug, slugify};
