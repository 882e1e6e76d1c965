use std::collections::BTreeMap;

use uuid::Uuid;

use crate::models::{CountedHours, HoursByStatus, SessionStatus, SupervisionSession};

/// Which sessions a view is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
    All,
    Intern(Uuid),
    Supervisor(Uuid),
}

impl SessionScope {
    pub fn from_args(intern: Option<Uuid>, supervisor: Option<Uuid>) -> Self {
        match (intern, supervisor) {
            (Some(id), _) => Self::Intern(id),
            (None, Some(id)) => Self::Supervisor(id),
            (None, None) => Self::All,
        }
    }

    pub fn matches(&self, session: &SupervisionSession) -> bool {
        match self {
            Self::All => true,
            Self::Intern(id) => session.intern_id == *id,
            Self::Supervisor(id) => session.supervisor_id == Some(*id),
        }
    }
}

pub fn scoped(sessions: &[SupervisionSession], scope: SessionScope) -> Vec<SupervisionSession> {
    sessions
        .iter()
        .filter(|session| scope.matches(session))
        .cloned()
        .collect()
}

/// Missing durations count as zero. Negative values pass through unchanged.
pub fn normalized_minutes(duration_minutes: Option<i32>) -> i64 {
    duration_minutes.map(i64::from).unwrap_or(0)
}

pub fn minutes_to_hours(minutes: i64) -> f64 {
    minutes as f64 / 60.0
}

pub fn session_minutes(session: &SupervisionSession) -> i64 {
    normalized_minutes(session.duration_minutes)
}

pub fn total_minutes<'a, I>(sessions: I) -> i64
where
    I: IntoIterator<Item = &'a SupervisionSession>,
{
    sessions.into_iter().map(session_minutes).sum()
}

/// Returns `(counted, not_counted)`.
pub fn split_by_counts(
    sessions: &[SupervisionSession],
) -> (Vec<&SupervisionSession>, Vec<&SupervisionSession>) {
    sessions
        .iter()
        .partition(|session| session.counts_for_hours.counts())
}

/// Returns `(submitted, draft)`.
pub fn split_by_status(
    sessions: &[SupervisionSession],
) -> (Vec<&SupervisionSession>, Vec<&SupervisionSession>) {
    sessions
        .iter()
        .partition(|session| session.status == SessionStatus::Submitted)
}

pub fn hours_by_status(sessions: &[SupervisionSession]) -> HoursByStatus {
    let (submitted, draft) = split_by_status(sessions);
    let submitted_minutes = total_minutes(submitted);
    let draft_minutes = total_minutes(draft);

    HoursByStatus {
        submitted_hours: minutes_to_hours(submitted_minutes),
        draft_hours: minutes_to_hours(draft_minutes),
        total_hours: minutes_to_hours(submitted_minutes + draft_minutes),
    }
}

pub fn partition_by_counts(sessions: &[SupervisionSession]) -> CountedHours {
    let (counted, not_counted) = split_by_counts(sessions);
    let counted_minutes = total_minutes(counted);
    let not_counted_minutes = total_minutes(not_counted);

    CountedHours {
        counted_minutes,
        not_counted_minutes,
        counted_hours: minutes_to_hours(counted_minutes),
        not_counted_hours: minutes_to_hours(not_counted_minutes),
    }
}

/// Hours per intern over sessions that are both submitted and counted.
pub fn hours_by_intern(sessions: &[SupervisionSession]) -> BTreeMap<Uuid, f64> {
    let mut minutes: BTreeMap<Uuid, i64> = BTreeMap::new();

    for session in sessions
        .iter()
        .filter(|session| session.is_submitted() && session.counts_for_hours.counts())
    {
        *minutes.entry(session.intern_id).or_insert(0) += session_minutes(session);
    }

    minutes
        .into_iter()
        .map(|(intern_id, total)| (intern_id, minutes_to_hours(total)))
        .collect()
}
