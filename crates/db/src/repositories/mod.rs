//! Repositories wrapping database access per aggregate.

mod form;
mod form_submission;

pub use form::{FormListFilter, FormRepository};
pub use form_submission::{FormSubmissionRepository, SubmissionListFilter};

use sea_orm::sea_query::{Expr, Func, IntoColumnRef, SimpleExpr};

/// `LIKE` pattern matching `term` anywhere, case-insensitively.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// `LOWER(col) LIKE '%term%'`.
fn column_contains<C: IntoColumnRef>(col: C, term: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(col))).like(contains_pattern(term))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern(" Survey "), "%survey%");
        assert_eq!(contains_pattern("100%_done"), "%100\\%\\_done%");
    }
}
