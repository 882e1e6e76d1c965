use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use chrono::{Datelike, TimeZone};
use uuid::Uuid;

use crate::hours;
use crate::invoice::{self, InvoicePolicy};
use crate::models::{eligible_interns, Intern, SupervisionSession};

pub struct ReportOptions<'a> {
    pub scope_label: &'a str,
    pub rate: f64,
    pub policy: InvoicePolicy,
}

const UNKNOWN_INTERN: &str = "Unknown intern";

pub fn intern_names(interns: &[Intern]) -> HashMap<Uuid, &str> {
    interns
        .iter()
        .map(|intern| (intern.id, intern.full_name.as_str()))
        .collect()
}

/// Submitted, counted hours per intern by name, largest first.
pub fn named_hours<'a>(
    by_intern: &BTreeMap<Uuid, f64>,
    names: &HashMap<Uuid, &'a str>,
) -> Vec<(&'a str, f64)> {
    let mut rows: Vec<(&str, f64)> = by_intern
        .iter()
        .map(|(id, hours)| (intern_label(names, id), *hours))
        .collect();
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    rows
}

fn intern_label<'a>(names: &HashMap<Uuid, &'a str>, id: &Uuid) -> &'a str {
    names.get(id).copied().unwrap_or(UNKNOWN_INTERN)
}

pub fn build_report<Tz: TimeZone>(
    options: &ReportOptions<'_>,
    sessions: &[SupervisionSession],
    interns: &[Intern],
    tz: &Tz,
) -> String {
    let by_status = hours::hours_by_status(sessions);
    let counted = hours::partition_by_counts(sessions);
    let by_intern = hours::hours_by_intern(sessions);
    let previews = invoice::monthly_previews(sessions, options.policy, options.rate, tz);
    let totals = invoice::invoice_totals(&previews);
    let names = intern_names(interns);

    let mut output = String::new();

    let _ = writeln!(output, "# Supervision Hours Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} sessions)",
        options.scope_label,
        sessions.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Hours by Status");
    let _ = writeln!(output, "- Submitted: {:.2} h", by_status.submitted_hours);
    let _ = writeln!(output, "- Draft: {:.2} h", by_status.draft_hours);
    let _ = writeln!(output, "- Total: {:.2} h", by_status.total_hours);
    let _ = writeln!(
        output,
        "- Counts toward hours: {:.2} h (not counted: {:.2} h)",
        counted.counted_hours, counted.not_counted_hours
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Hours by Intern");

    if by_intern.is_empty() {
        let _ = writeln!(output, "No submitted hours recorded.");
    } else {
        for (name, hours) in named_hours(&by_intern, &names) {
            let _ = writeln!(output, "- {}: {:.1} h", name, hours);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Invoice Preview");

    if previews.is_empty() {
        let _ = writeln!(output, "No billable sessions.");
    } else {
        for preview in &previews {
            let _ = writeln!(
                output,
                "- {}: {} sessions, {:.2} h, est. ${:.2}",
                preview.year_month,
                preview.session_count,
                preview.total_hours,
                preview.estimated_amount
            );
        }
        let _ = writeln!(
            output,
            "- Total: {} sessions, {:.2} h, est. ${:.2}",
            totals.session_count, totals.total_hours, totals.estimated_amount
        );
    }
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "_Rate ${:.2}/h. {}_",
        options.rate,
        if options.policy.respect_counts_flag {
            "Sessions marked as not counting toward hours are excluded."
        } else {
            "All submitted sessions are billed, including ones marked as not counting toward hours."
        }
    );

    let mut recent: Vec<&SupervisionSession> = sessions
        .iter()
        .filter(|session| session.occurred_at.is_some())
        .collect();
    recent.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Sessions");

    if recent.is_empty() {
        let _ = writeln!(output, "No dated sessions recorded.");
    } else {
        for session in recent.iter().take(5) {
            let when = session
                .occurred_at
                .map(|at| {
                    let local = at.with_timezone(tz);
                    format!("{:04}-{:02}-{:02}", local.year(), local.month(), local.day())
                })
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "- {} {} ({}, {}, {} min): {} [{}]",
                when,
                intern_label(&names, &session.intern_id),
                session.format.map(|f| f.as_str()).unwrap_or("unspecified"),
                session.status.as_str(),
                hours::session_minutes(session),
                session.focus.as_deref().unwrap_or("no focus noted"),
                session.id
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Ready for New Clients");

    let eligible = eligible_interns(interns);
    if eligible.is_empty() {
        let _ = writeln!(output, "No interns are currently eligible.");
    } else {
        for intern in eligible {
            let _ = writeln!(output, "- {} ({})", intern.full_name, intern.email);
        }
    }

    output
}
