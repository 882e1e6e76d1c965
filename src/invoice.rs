use std::collections::BTreeMap;

use chrono::{Datelike, TimeZone};

use crate::hours::{minutes_to_hours, session_minutes};
use crate::models::{InvoiceTotals, MonthlyInvoicePreview, SupervisionSession, YearMonth};

/// Flat demo rate applied to billable hours.
pub const DEMO_HOURLY_RATE: f64 = 85.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvoicePolicy {
    /// Also drop submitted sessions flagged as not counting toward hours.
    /// Off by default: previews bill every submitted session.
    pub respect_counts_flag: bool,
}

impl InvoicePolicy {
    pub fn is_billable(&self, session: &SupervisionSession) -> bool {
        if !session.is_submitted() {
            return false;
        }
        !self.respect_counts_flag || session.counts_for_hours.counts()
    }
}

pub fn estimate_amount(hours: f64, rate: f64) -> f64 {
    hours * rate
}

/// Month of `occurred_at` in the calendar of `tz`.
pub fn month_key<Tz: TimeZone>(session: &SupervisionSession, tz: &Tz) -> Option<YearMonth> {
    session.occurred_at.map(|occurred_at| {
        let local = occurred_at.with_timezone(tz);
        YearMonth::new(local.year(), local.month())
    })
}

/// Groups billable sessions by month, most recent first. Sessions without a
/// timestamp are left out.
pub fn monthly_previews<Tz: TimeZone>(
    sessions: &[SupervisionSession],
    policy: InvoicePolicy,
    rate: f64,
    tz: &Tz,
) -> Vec<MonthlyInvoicePreview> {
    let mut buckets: BTreeMap<YearMonth, (usize, i64)> = BTreeMap::new();

    for session in sessions {
        if !policy.is_billable(session) {
            continue;
        }
        let Some(key) = month_key(session, tz) else {
            continue;
        };
        let entry = buckets.entry(key).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += session_minutes(session);
    }

    tracing::debug!(buckets = buckets.len(), "bucketed invoice previews");

    buckets
        .into_iter()
        .rev()
        .map(|(year_month, (session_count, total_minutes))| {
            let total_hours = minutes_to_hours(total_minutes);
            MonthlyInvoicePreview {
                year_month,
                session_count,
                total_minutes,
                total_hours,
                estimated_amount: estimate_amount(total_hours, rate),
            }
        })
        .collect()
}

pub fn invoice_totals(previews: &[MonthlyInvoicePreview]) -> InvoiceTotals {
    let mut totals = InvoiceTotals {
        session_count: 0,
        total_minutes: 0,
        total_hours: 0.0,
        estimated_amount: 0.0,
    };

    for preview in previews {
        totals.session_count += preview.session_count;
        totals.total_minutes += preview.total_minutes;
        totals.total_hours += preview.total_hours;
        totals.estimated_amount += preview.estimated_amount;
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hours::tests::{dated, sample_session};
    use crate::models::{parse_timestamp, SessionStatus};
    use chrono::{FixedOffset, Utc};

    const SUBMITTED: SessionStatus = SessionStatus::Submitted;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn previews_in<Tz: TimeZone>(
        sessions: &[SupervisionSession],
        tz: &Tz,
    ) -> Vec<MonthlyInvoicePreview> {
        monthly_previews(sessions, InvoicePolicy::default(), DEMO_HOURLY_RATE, tz)
    }

    fn previews(sessions: &[SupervisionSession]) -> Vec<MonthlyInvoicePreview> {
        previews_in(sessions, &Utc)
    }

    #[test]
    fn single_submitted_session_yields_one_bucket() {
        let sessions = vec![dated(90, SUBMITTED, "2024-03-15T10:00:00Z")];
        let previews = previews(&sessions);

        assert_eq!(previews.len(), 1);
        let preview = &previews[0];
        assert_eq!(preview.year_month, YearMonth::new(2024, 3));
        assert_eq!(preview.session_count, 1);
        assert_eq!(preview.total_minutes, 90);
        assert!(approx(preview.total_hours, 1.5));
        assert!(approx(preview.estimated_amount, 1.5 * DEMO_HOURLY_RATE));
    }

    #[test]
    fn drafts_never_reach_invoices() {
        let draft_at = Some("2024-03-11T09:00:00Z");
        let sessions = vec![
            dated(60, SUBMITTED, "2024-03-04T09:00:00Z"),
            sample_session(Some(30), SessionStatus::Draft, Some(true), draft_at),
        ];
        let previews = previews(&sessions);
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].total_minutes, 60);
        assert_eq!(previews[0].session_count, 1);
    }

    #[test]
    fn sessions_without_timestamp_are_not_bucketed() {
        let sessions = vec![sample_session(Some(60), SUBMITTED, None, None)];
        assert!(previews(&sessions).is_empty());
    }

    #[test]
    fn buckets_sort_most_recent_first_with_unique_keys() {
        let sessions = vec![
            dated(30, SUBMITTED, "2023-12-20T09:00:00Z"),
            dated(45, SUBMITTED, "2024-02-01T09:00:00Z"),
            dated(60, SUBMITTED, "2024-01-10T09:00:00Z"),
            dated(15, SUBMITTED, "2024-02-28T09:00:00Z"),
        ];
        let previews = previews(&sessions);
        let keys: Vec<String> = previews.iter().map(|p| p.year_month.to_string()).collect();
        assert_eq!(keys, vec!["2024-02", "2024-01", "2023-12"]);
        let descending = previews
            .windows(2)
            .all(|pair| pair[0].year_month > pair[1].year_month);
        assert!(descending);
        assert_eq!(previews[0].session_count, 2);
        assert_eq!(previews[0].total_minutes, 60);
    }

    #[test]
    fn bucket_minutes_sum_to_included_minutes() {
        let excluded_at = Some("2024-05-02T09:00:00Z");
        let sessions = vec![
            dated(50, SUBMITTED, "2024-04-02T09:00:00Z"),
            sample_session(Some(70), SUBMITTED, Some(false), excluded_at),
            dated(25, SUBMITTED, "2024-05-20T09:00:00Z"),
            dated(40, SessionStatus::Draft, "2024-05-21T09:00:00Z"),
            sample_session(Some(90), SUBMITTED, None, None),
        ];
        let previews = previews(&sessions);
        let bucketed: i64 = previews.iter().map(|p| p.total_minutes).sum();
        assert_eq!(bucketed, 50 + 70 + 25);
        assert_eq!(invoice_totals(&previews).total_minutes, bucketed);
    }

    #[test]
    fn default_policy_bills_excluded_submitted_sessions() {
        let at = Some("2024-06-03T09:00:00Z");
        let sessions = vec![sample_session(Some(60), SUBMITTED, Some(false), at)];
        assert_eq!(previews(&sessions).len(), 1);

        let strict = InvoicePolicy {
            respect_counts_flag: true,
        };
        let strict_previews = monthly_previews(&sessions, strict, DEMO_HOURLY_RATE, &Utc);
        assert!(strict_previews.is_empty());
    }

    #[test]
    fn month_follows_the_display_timezone() {
        let sessions = vec![dated(60, SUBMITTED, "2024-03-31T23:30:00Z")];
        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        let west = FixedOffset::west_opt(5 * 3600).unwrap();

        let in_utc = previews_in(&sessions, &Utc);
        let in_east = previews_in(&sessions, &east);
        let in_west = previews_in(&sessions, &west);

        assert_eq!(in_utc[0].year_month, YearMonth::new(2024, 3));
        assert_eq!(in_east[0].year_month, YearMonth::new(2024, 4));
        assert_eq!(in_west[0].year_month, YearMonth::new(2024, 3));
    }

    #[test]
    fn naive_timestamps_stay_in_their_local_month() {
        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        let mut session = sample_session(Some(60), SUBMITTED, None, None);
        session.occurred_at = parse_timestamp("2024-03-31 23:30:00", &east);

        let previews = previews_in(&[session], &east);
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].year_month, YearMonth::new(2024, 3));
    }

    #[test]
    fn previews_serialize_with_month_strings() {
        let sessions = vec![dated(90, SUBMITTED, "2024-03-15T10:00:00Z")];
        let previews = previews(&sessions);

        let value = serde_json::to_value(&previews[0]).unwrap();
        assert_eq!(value["year_month"], "2024-03");
        assert_eq!(value["session_count"], 1);
        assert_eq!(value["total_minutes"], 90);

        let totals = serde_json::to_value(invoice_totals(&previews)).unwrap();
        assert_eq!(totals["total_hours"], 1.5);
    }

    #[test]
    fn estimates_scale_linearly_with_rate() {
        let sessions = vec![
            dated(120, SUBMITTED, "2024-07-01T09:00:00Z"),
            dated(45, SUBMITTED, "2024-08-01T09:00:00Z"),
        ];
        let policy = InvoicePolicy::default();
        let base = monthly_previews(&sessions, policy, 50.0, &Utc);
        let doubled = monthly_previews(&sessions, policy, 100.0, &Utc);

        for (a, b) in base.iter().zip(doubled.iter()) {
            assert_eq!(a.year_month, b.year_month);
            assert_eq!(a.total_minutes, b.total_minutes);
            assert!(approx(a.estimated_amount, a.total_hours * 50.0));
            assert!(approx(b.estimated_amount, 2.0 * a.estimated_amount));
        }
        assert!(approx(estimate_amount(1.5, 85.0), 127.5));
    }

    #[test]
    fn totals_add_up_previews() {
        let sessions = vec![
            dated(60, SUBMITTED, "2024-07-01T09:00:00Z"),
            dated(30, SUBMITTED, "2024-08-01T09:00:00Z"),
        ];
        let policy = InvoicePolicy::default();
        let previews = monthly_previews(&sessions, policy, 80.0, &Utc);
        let totals = invoice_totals(&previews);
        assert_eq!(totals.session_count, 2);
        assert_eq!(totals.total_minutes, 90);
        assert!(approx(totals.total_hours, 1.5));
        assert!(approx(totals.estimated_amount, 120.0));
    }
}
