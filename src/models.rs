use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

const NAIVE_PATTERNS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFormat {
    Individual,
    Dyad,
    Group,
}

impl SessionFormat {
    pub fn parse_lossy(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "individual" => Some(Self::Individual),
            "dyad" => Some(Self::Dyad),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Dyad => "dyad",
            Self::Group => "group",
        }
    }
}

/// Workflow state of a session. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Draft,
    Submitted,
}

impl SessionStatus {
    /// Unrecognised values fall back to `Draft` so they are never billed.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "submitted" => Self::Submitted,
            _ => Self::Draft,
        }
    }

    /// A missing value is a draft.
    pub fn parse_optional(value: Option<&str>) -> Self {
        value.map(Self::parse_lossy).unwrap_or(Self::Draft)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
        }
    }

    pub fn submit(self) -> Self {
        Self::Submitted
    }
}

/// Whether a session satisfies training-hour requirements.
///
/// The stored flag is nullable; a missing value is kept as `Unspecified`
/// and treated the same as `Counts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountsForHours {
    Counts,
    Excluded,
    #[default]
    Unspecified,
}

impl CountsForHours {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Self::Counts,
            Some(false) => Self::Excluded,
            None => Self::Unspecified,
        }
    }

    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Self::Counts,
            "false" | "no" | "n" | "0" => Self::Excluded,
            _ => Self::Unspecified,
        }
    }

    pub fn parse_optional(value: Option<&str>) -> Self {
        value.map(Self::parse_lossy).unwrap_or_default()
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Counts => Some(true),
            Self::Excluded => Some(false),
            Self::Unspecified => None,
        }
    }

    pub fn counts(&self) -> bool {
        !matches!(self, Self::Excluded)
    }
}

/// Whole minutes only. Anything else is treated as a missing duration.
pub fn parse_duration_minutes(value: &str) -> Option<i32> {
    value.trim().parse().ok()
}

#[derive(Debug, Clone)]
pub struct SupervisionSession {
    pub id: Uuid,
    pub intern_id: Uuid,
    pub supervisor_id: Option<Uuid>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub format: Option<SessionFormat>,
    pub status: SessionStatus,
    pub counts_for_hours: CountsForHours,
    pub focus: Option<String>,
}

impl SupervisionSession {
    pub fn is_submitted(&self) -> bool {
        self.status == SessionStatus::Submitted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternStatus {
    Onboarding,
    Active,
    Paused,
    Graduated,
    Waitlisted,
    OnBreak,
    Completed,
}

impl InternStatus {
    /// Unrecognised values map to `Onboarding`, which is never eligible.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "paused" => Self::Paused,
            "graduated" => Self::Graduated,
            "waitlisted" => Self::Waitlisted,
            "on_break" => Self::OnBreak,
            "completed" => Self::Completed,
            _ => Self::Onboarding,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onboarding => "onboarding",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Graduated => "graduated",
            Self::Waitlisted => "waitlisted",
            Self::OnBreak => "on_break",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Intern {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub status: InternStatus,
    pub ready_for_clients: bool,
}

impl Intern {
    pub fn is_eligible_for_new_clients(&self) -> bool {
        self.status == InternStatus::Active && self.ready_for_clients
    }
}

pub fn eligible_interns(interns: &[Intern]) -> Vec<&Intern> {
    interns
        .iter()
        .filter(|intern| intern.is_eligible_for_new_clients())
        .collect()
}

/// Calendar month used as an invoice bucket key. Orders by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HoursByStatus {
    pub submitted_hours: f64,
    pub draft_hours: f64,
    pub total_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CountedHours {
    pub counted_minutes: i64,
    pub not_counted_minutes: i64,
    pub counted_hours: f64,
    pub not_counted_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyInvoicePreview {
    pub year_month: YearMonth,
    pub session_count: usize,
    pub total_minutes: i64,
    pub total_hours: f64,
    pub estimated_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InvoiceTotals {
    pub session_count: usize,
    pub total_minutes: i64,
    pub total_hours: f64,
    pub estimated_amount: f64,
}

/// Accepts RFC 3339, naive date-times and bare dates.
///
/// Naive date-times are wall-clock times in `tz`; a time skipped by a DST
/// gap yields `None`. Bare dates are midnight UTC.
pub fn parse_timestamp<Tz: TimeZone>(value: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    for pattern in NAIVE_PATTERNS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, pattern) {
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|local| local.with_timezone(&Utc));
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, FixedOffset, Timelike};

    fn sample_intern(status: InternStatus, ready_for_clients: bool) -> Intern {
        Intern {
            id: Uuid::new_v4(),
            full_name: "Rowan Price".to_string(),
            email: "rowan.price@example.org".to_string(),
            status,
            ready_for_clients,
        }
    }

    fn eligible(status: InternStatus, ready_for_clients: bool) -> bool {
        sample_intern(status, ready_for_clients)
            .is_eligible_for_new_clients()
    }

    #[test]
    fn missing_counts_flag_defaults_to_counted() {
        assert!(CountsForHours::from_flag(None).counts());
        assert!(CountsForHours::from_flag(Some(true)).counts());
        assert!(!CountsForHours::from_flag(Some(false)).counts());
        assert_eq!(CountsForHours::default(), CountsForHours::Unspecified);
    }

    #[test]
    fn counts_flag_parses_loosely() {
        let parse = CountsForHours::parse_lossy;
        assert_eq!(parse("Yes"), CountsForHours::Counts);
        assert_eq!(parse("0"), CountsForHours::Excluded);
        assert_eq!(parse(""), CountsForHours::Unspecified);
        assert_eq!(parse("maybe"), CountsForHours::Unspecified);
        assert_eq!(CountsForHours::Excluded.as_flag(), Some(false));

        let missing = CountsForHours::parse_optional(None);
        assert_eq!(missing, CountsForHours::Unspecified);
        assert!(missing.counts());
    }

    #[test]
    fn unknown_status_is_draft() {
        let parse = SessionStatus::parse_lossy;
        assert_eq!(parse("Submitted "), SessionStatus::Submitted);
        assert_eq!(parse("approved"), SessionStatus::Draft);
        assert_eq!(parse(""), SessionStatus::Draft);
    }

    #[test]
    fn missing_status_is_draft() {
        let parse = SessionStatus::parse_optional;
        assert_eq!(parse(None), SessionStatus::Draft);
        assert_eq!(parse(Some("")), SessionStatus::Draft);
        assert_eq!(parse(Some("submitted")), SessionStatus::Submitted);
    }

    #[test]
    fn submit_is_one_way() {
        assert_eq!(SessionStatus::Draft.submit(), SessionStatus::Submitted);
        assert_eq!(SessionStatus::Submitted.submit(), SessionStatus::Submitted);
    }

    #[test]
    fn unknown_format_is_none() {
        let dyad = SessionFormat::parse_lossy("DYAD");
        assert_eq!(dyad, Some(SessionFormat::Dyad));
        assert_eq!(SessionFormat::parse_lossy("walk-and-talk"), None);
    }

    #[test]
    fn durations_must_be_whole_minutes() {
        assert_eq!(parse_duration_minutes(""), None);
        assert_eq!(parse_duration_minutes("abc"), None);
        assert_eq!(parse_duration_minutes(" 45 "), Some(45));
        assert_eq!(parse_duration_minutes("-30"), Some(-30));
        assert_eq!(parse_duration_minutes("45.5"), None);
    }

    #[test]
    fn eligibility_requires_active_and_ready() {
        assert!(eligible(InternStatus::Active, true));
        assert!(!eligible(InternStatus::Active, false));
        assert!(!eligible(InternStatus::Paused, true));
        assert!(!eligible(InternStatus::Onboarding, true));
    }

    #[test]
    fn eligible_interns_keeps_only_eligible() {
        let interns = vec![
            sample_intern(InternStatus::Active, true),
            sample_intern(InternStatus::OnBreak, true),
            sample_intern(InternStatus::Active, false),
        ];
        let eligible = eligible_interns(&interns);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, interns[0].id);
    }

    #[test]
    fn intern_status_round_trips_known_values() {
        let parse = InternStatus::parse_lossy;
        assert_eq!(parse("on_break"), InternStatus::OnBreak);
        assert_eq!(parse("retired"), InternStatus::Onboarding);
    }

    #[test]
    fn year_month_orders_and_formats() {
        let march = YearMonth::new(2024, 3);
        let december = YearMonth::new(2023, 12);
        assert!(march > december);
        assert_eq!(march.to_string(), "2024-03");
    }

    #[test]
    fn parses_supported_timestamp_shapes() {
        let rfc = parse_timestamp("2024-03-15T10:00:00Z", &Utc).unwrap();
        let fields = (rfc.year(), rfc.month(), rfc.day(), rfc.hour());
        assert_eq!(fields, (2024, 3, 15, 10));

        let offset = parse_timestamp("2024-03-15T10:00:00+02:00", &Utc).unwrap();
        assert_eq!(offset.hour(), 8);

        let naive = parse_timestamp("2024-03-15 10:30:00", &Utc).unwrap();
        assert_eq!(naive.minute(), 30);

        let date_only = parse_timestamp("2024-03-15", &Utc).unwrap();
        assert_eq!(date_only.hour(), 0);

        assert!(parse_timestamp("", &Utc).is_none());
        assert!(parse_timestamp("last tuesday", &Utc).is_none());
    }

    #[test]
    fn naive_timestamps_are_wall_clock_in_the_given_zone() {
        let east = FixedOffset::east_opt(2 * 3600).unwrap();

        let naive = parse_timestamp("2024-03-31 23:30:00", &east).unwrap();
        let expected = parse_timestamp("2024-03-31T21:30:00Z", &Utc).unwrap();
        assert_eq!(naive, expected);

        let explicit = parse_timestamp("2024-03-31T23:30:00Z", &east).unwrap();
        assert_eq!(explicit.hour(), 23);

        let date_only = parse_timestamp("2024-03-31", &east).unwrap();
        assert_eq!((date_only.day(), date_only.hour()), (31, 0));
    }
}
