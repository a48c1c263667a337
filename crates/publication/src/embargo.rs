//! Embargo durations and the access gate.
//!
//! The embargo end date derives from the publication date plus the
//! chosen duration. Partial publication dates round forward before the
//! duration is applied: a year-only date counts from January 1 of the
//! next year and a year-month date from the first of the next month.

use chrono::{Months, NaiveDate};
use openrepo_common::auth::Caller;
use openrepo_common::fedora::ObjectState;
use serde::{Deserialize, Serialize};

/// Enumerated embargo durations offered on deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbargoDuration {
    #[default]
    None,
    SixMonths,
    OneYear,
    EighteenMonths,
    TwoYears,
    ThreeYears,
}

impl EmbargoDuration {
    pub fn months(&self) -> u32 {
        match self {
            EmbargoDuration::None => 0,
            EmbargoDuration::SixMonths => 6,
            EmbargoDuration::OneYear => 12,
            EmbargoDuration::EighteenMonths => 18,
            EmbargoDuration::TwoYears => 24,
            EmbargoDuration::ThreeYears => 36,
        }
    }

    /// Display form as stored in metadata, e.g. "18 months"
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbargoDuration::None => "No embargo",
            EmbargoDuration::SixMonths => "6 months",
            EmbargoDuration::OneYear => "1 year",
            EmbargoDuration::EighteenMonths => "18 months",
            EmbargoDuration::TwoYears => "2 years",
            EmbargoDuration::ThreeYears => "3 years",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "no embargo" | "none" => Some(EmbargoDuration::None),
            "6 months" | "6-months" => Some(EmbargoDuration::SixMonths),
            "1 year" | "1-year" | "12 months" => Some(EmbargoDuration::OneYear),
            "18 months" | "18-months" => Some(EmbargoDuration::EighteenMonths),
            "2 years" | "2-years" | "24 months" => Some(EmbargoDuration::TwoYears),
            "3 years" | "3-years" | "36 months" => Some(EmbargoDuration::ThreeYears),
            _ => None,
        }
    }
}

/// Resolve a partial publication date (YYYY, YYYY-MM or YYYY-MM-DD) to
/// the day the embargo clock starts
fn embargo_start(publication_date: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = publication_date.split('-').collect();
    let year: i32 = parts.first()?.parse().ok()?;
    match parts.len() {
        1 => NaiveDate::from_ymd_opt(year + 1, 1, 1),
        2 => {
            let month: u32 = parts[1].parse().ok()?;
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            first.checked_add_months(Months::new(1))
        }
        _ => {
            let month: u32 = parts[1].parse().ok()?;
            let day: u32 = parts[2].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        }
    }
}

/// End of embargo, or None when there is no embargo or no usable
/// publication date
pub fn embargo_end(duration: EmbargoDuration, publication_date: Option<&str>) -> Option<NaiveDate> {
    if duration == EmbargoDuration::None {
        return None;
    }
    let start = embargo_start(publication_date?)?;
    start.checked_add_months(Months::new(duration.months()))
}

/// Outcome of the download access gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// Anonymous caller during embargo
    Deny401,
    /// Authenticated caller who is neither owner nor admin, during embargo
    Deny403,
    /// Hidden from this caller entirely
    NotFound,
}

/// Pure access decision for article content.
///
/// Withdrawn and unpublished objects are invisible to outsiders rather
/// than forbidden, so their existence leaks nothing.
pub fn access_decision(
    state: ObjectState,
    owners: &[String],
    embargo_until: Option<NaiveDate>,
    caller: &Caller,
    now: NaiveDate,
) -> AccessDecision {
    let is_owner = caller.owns(owners);
    match state {
        ObjectState::Withdrawn | ObjectState::Inactive if !caller.admin => {
            return AccessDecision::NotFound;
        }
        ObjectState::Unpublished if !is_owner && !caller.admin => {
            return AccessDecision::NotFound;
        }
        _ => {}
    }

    let embargoed = embargo_until.is_some_and(|end| now < end);
    if embargoed && !is_owner && !caller.admin {
        if caller.login.is_none() {
            AccessDecision::Deny401
        } else {
            AccessDecision::Deny403
        }
    } else {
        AccessDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_embargo_end_full_date() {
        let end = embargo_end(EmbargoDuration::SixMonths, Some("2023-03-15"));
        assert_eq!(end, Some(date(2023, 9, 15)));
    }

    #[test]
    fn test_embargo_end_year_only_counts_from_next_january() {
        let end = embargo_end(EmbargoDuration::OneYear, Some("2023"));
        assert_eq!(end, Some(date(2025, 1, 1)));
    }

    #[test]
    fn test_embargo_end_year_month_counts_from_next_month() {
        let end = embargo_end(EmbargoDuration::EighteenMonths, Some("2023-11"));
        assert_eq!(end, Some(date(2025, 6, 1)));
    }

    #[test]
    fn test_no_embargo_or_no_date() {
        assert_eq!(embargo_end(EmbargoDuration::None, Some("2023-01-01")), None);
        assert_eq!(embargo_end(EmbargoDuration::TwoYears, None), None);
        assert_eq!(embargo_end(EmbargoDuration::TwoYears, Some("garbage")), None);
    }

    #[test]
    fn test_duration_parse_round_trip() {
        for duration in [
            EmbargoDuration::None,
            EmbargoDuration::SixMonths,
            EmbargoDuration::OneYear,
            EmbargoDuration::EighteenMonths,
            EmbargoDuration::TwoYears,
            EmbargoDuration::ThreeYears,
        ] {
            assert_eq!(EmbargoDuration::parse(duration.as_str()), Some(duration));
        }
        assert_eq!(EmbargoDuration::parse("forever"), None);
    }

    #[test]
    fn test_access_withdrawn_hidden_from_non_admins() {
        let owners = vec!["jsmith".to_string()];
        let decision = access_decision(
            ObjectState::Withdrawn,
            &owners,
            None,
            &Caller::user("jsmith"),
            date(2024, 1, 1),
        );
        assert_eq!(decision, AccessDecision::NotFound);
        let decision = access_decision(
            ObjectState::Withdrawn,
            &owners,
            None,
            &Caller::admin("curator"),
            date(2024, 1, 1),
        );
        assert_eq!(decision, AccessDecision::Allow);
    }

    #[test]
    fn test_access_unpublished_visible_to_owner() {
        let owners = vec!["jsmith".to_string()];
        for (caller, expected) in [
            (Caller::anonymous(), AccessDecision::NotFound),
            (Caller::user("other"), AccessDecision::NotFound),
            (Caller::user("jsmith"), AccessDecision::Allow),
        ] {
            let decision = access_decision(
                ObjectState::Unpublished,
                &owners,
                None,
                &caller,
                date(2024, 1, 1),
            );
            assert_eq!(decision, expected);
        }
    }

    #[test]
    fn test_access_during_embargo() {
        let owners = vec!["jsmith".to_string()];
        let end = Some(date(2025, 1, 1));
        let now = date(2024, 6, 1);
        let cases = [
            (Caller::anonymous(), AccessDecision::Deny401),
            (Caller::user("other"), AccessDecision::Deny403),
            (Caller::user("jsmith"), AccessDecision::Allow),
            (Caller::admin("curator"), AccessDecision::Allow),
        ];
        for (caller, expected) in cases {
            let decision =
                access_decision(ObjectState::Published, &owners, end, &caller, now);
            assert_eq!(decision, expected);
        }
        // embargo over, anonymous allowed again
        let decision = access_decision(
            ObjectState::Published,
            &owners,
            end,
            &Caller::anonymous(),
            date(2025, 1, 1),
        );
        assert_eq!(decision, AccessDecision::Allow);
    }
}
