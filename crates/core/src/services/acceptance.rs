//! Acceptance gate: whether a form takes submissions right now.

use chrono::{DateTime, Utc};
use formdesk_common::AppError;
use formdesk_db::entities::form;
use serde::Serialize;
use thiserror::Error;

/// Why a form refuses submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedReason {
    #[error("form is inactive")]
    Inactive,
    #[error("form has not opened yet")]
    NotStarted,
    #[error("form has closed")]
    Ended,
    #[error("form has reached its submission limit")]
    LimitReached,
}

impl ClosedReason {
    /// Machine-readable reason code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::NotStarted => "not_started",
            Self::Ended => "ended",
            Self::LimitReached => "limit_reached",
        }
    }
}

impl From<ClosedReason> for AppError {
    fn from(reason: ClosedReason) -> Self {
        Self::NotAcceptingSubmissions {
            reason: reason.as_str(),
        }
    }
}

/// Check, in order: active flag, start date, end date, submission limit.
///
/// Both ends of the date window are inclusive.
pub fn check_acceptance(form: &form::Model, now: DateTime<Utc>) -> Result<(), ClosedReason> {
    if !form.is_active {
        return Err(ClosedReason::Inactive);
    }

    if let Some(start) = form.start_date
        && now < start
    {
        return Err(ClosedReason::NotStarted);
    }

    if let Some(end) = form.end_date
        && now > end
    {
        return Err(ClosedReason::Ended);
    }

    if let Some(limit) = form.submission_limit
        && form.submission_count >= limit
    {
        return Err(ClosedReason::LimitReached);
    }

    Ok(())
}

#[must_use]
pub fn is_accepting_submissions(form: &form::Model, now: DateTime<Utc>) -> bool {
    check_acceptance(form, now).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn open_form() -> form::Model {
        form::Model {
            id: "form1".to_string(),
            title: "Survey".to_string(),
            slug: "survey".to_string(),
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

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_open_form_accepts() {
        assert_eq!(check_acceptance(&open_form(), at(12)), Ok(()));
    }

    #[test]
    fn test_inactive_short_circuits() {
        let mut form = open_form();
        form.is_active = false;
        form.submission_limit = Some(1);
        form.submission_count = 5;

        assert_eq!(
            check_acceptance(&form, at(12)),
            Err(ClosedReason::Inactive)
        );
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let mut form = open_form();
        form.start_date = Some(at(9).into());
        form.end_date = Some(at(17).into());

        assert!(is_accepting_submissions(&form, at(9)));
        assert!(is_accepting_submissions(&form, at(17)));
        assert_eq!(
            check_acceptance(&form, at(9) - Duration::seconds(1)),
            Err(ClosedReason::NotStarted)
        );
        assert_eq!(
            check_acceptance(&form, at(17) + Duration::seconds(1)),
            Err(ClosedReason::Ended)
        );
    }

    #[test]
    fn test_window_compares_across_offsets() {
        let mut form = open_form();
        let plus_seven = chrono::FixedOffset::east_opt(7 * 3600).unwrap();
        // 17:00 at +07:00 is 10:00 UTC
        form.end_date = Some(at(10).with_timezone(&plus_seven));

        assert!(is_accepting_submissions(&form, at(10)));
        assert!(!is_accepting_submissions(&form, at(11)));
    }

    #[test]
    fn test_limit_reached() {
        let mut form = open_form();
        form.submission_limit = Some(3);

        form.submission_count = 2;
        assert!(is_accepting_submissions(&form, at(12)));

        form.submission_count = 3;
        assert_eq!(
            check_acceptance(&form, at(12)),
            Err(ClosedReason::LimitReached)
        );
    }

    #[test]
    fn test_reason_maps_to_app_error() {
        let err: AppError = ClosedReason::NotStarted.into();
        assert!(matches!(
            err,
            AppError::NotAcceptingSubmissions {
                reason: "not_started"
            }
        ));
    }
}
