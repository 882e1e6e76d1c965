use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::hours::SessionScope;
use crate::models::{
    parse_duration_minutes, parse_timestamp, CountsForHours, Intern, InternStatus, SessionFormat,
    SessionStatus, SupervisionSession,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("migrations applied");
    Ok(())
}

async fn upsert_supervisor(
    pool: &PgPool,
    id: Uuid,
    full_name: &str,
    email: &str,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO supervision.supervisors (id, full_name, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(email)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

async fn upsert_intern(
    pool: &PgPool,
    id: Uuid,
    full_name: &str,
    email: &str,
    status: Option<InternStatus>,
    ready_for_clients: Option<bool>,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO supervision.interns (id, full_name, email, status, ready_for_clients)
        VALUES ($1, $2, $3, COALESCE($4, 'onboarding'), COALESCE($5, FALSE))
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            status = COALESCE($4, supervision.interns.status),
            ready_for_clients = COALESCE($5, supervision.interns.ready_for_clients)
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(email)
    .bind(status.map(|s| s.as_str()))
    .bind(ready_for_clients)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

struct NewSession<'a> {
    intern_id: Uuid,
    supervisor_id: Option<Uuid>,
    occurred_at: Option<DateTime<Utc>>,
    duration_minutes: Option<i32>,
    format: Option<SessionFormat>,
    status: SessionStatus,
    counts_for_hours: CountsForHours,
    focus: Option<&'a str>,
    source_key: &'a str,
}

/// Returns `false` when a session with the same source key already exists.
async fn insert_session(pool: &PgPool, session: NewSession<'_>) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO supervision.sessions
        (id, intern_id, supervisor_id, occurred_at, duration_minutes, format, status,
         counts_for_hours, focus, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session.intern_id)
    .bind(session.supervisor_id)
    .bind(session.occurred_at)
    .bind(session.duration_minutes)
    .bind(session.format.map(|f| f.as_str()))
    .bind(session.status.as_str())
    .bind(session.counts_for_hours.as_flag())
    .bind(session.focus)
    .bind(session.source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let supervisors = vec![
        (
            Uuid::parse_str("6a1f0c2e-4d7b-4f0a-9c61-2f4e8b7d3a10")?,
            "Dana Whitfield",
            "dana.whitfield@familyservices.org",
        ),
        (
            Uuid::parse_str("b83e5d47-19c2-4a6e-8f35-7c0d2a9e6b51")?,
            "Marcus Ortega",
            "marcus.ortega@familyservices.org",
        ),
    ];

    for (id, name, email) in &supervisors {
        upsert_supervisor(pool, *id, name, email).await?;
    }

    let interns = vec![
        (
            Uuid::parse_str("1c9d4e2a-7b3f-4a8e-b6d0-5e2f9a1c7d34")?,
            "Priya Nair",
            "priya.nair@familyservices.org",
            InternStatus::Active,
            true,
        ),
        (
            Uuid::parse_str("e47a2b90-3c5d-4f1e-a8b2-9d6c0e3f5a28")?,
            "Tomas Berg",
            "tomas.berg@familyservices.org",
            InternStatus::Active,
            false,
        ),
        (
            Uuid::parse_str("5f3b8c1d-2e4a-4b9f-8c7d-0a1e6f2b9c45")?,
            "Imani Brooks",
            "imani.brooks@familyservices.org",
            InternStatus::Onboarding,
            false,
        ),
    ];

    for (id, name, email, status, ready) in &interns {
        upsert_intern(pool, *id, name, email, Some(*status), Some(*ready)).await?;
    }

    let (priya, tomas, imani) = (interns[0].0, interns[1].0, interns[2].0);
    let (dana, marcus) = (supervisors[0].0, supervisors[1].0);

    let sessions = vec![
        NewSession {
            intern_id: priya,
            supervisor_id: Some(dana),
            occurred_at: parse_timestamp("2026-01-08T15:00:00Z", &Local),
            duration_minutes: Some(60),
            format: Some(SessionFormat::Individual),
            status: SessionStatus::Submitted,
            counts_for_hours: CountsForHours::Unspecified,
            focus: Some("Intake documentation"),
            source_key: "seed-001",
        },
        NewSession {
            intern_id: priya,
            supervisor_id: Some(dana),
            occurred_at: parse_timestamp("2026-01-22T15:00:00Z", &Local),
            duration_minutes: Some(90),
            format: Some(SessionFormat::Dyad),
            status: SessionStatus::Submitted,
            counts_for_hours: CountsForHours::Counts,
            focus: Some("Family systems mapping"),
            source_key: "seed-002",
        },
        NewSession {
            intern_id: priya,
            supervisor_id: Some(marcus),
            occurred_at: parse_timestamp("2026-02-05T17:30:00Z", &Local),
            duration_minutes: Some(45),
            format: Some(SessionFormat::Group),
            status: SessionStatus::Submitted,
            counts_for_hours: CountsForHours::Excluded,
            focus: Some("Peer case consult"),
            source_key: "seed-003",
        },
        NewSession {
            intern_id: tomas,
            supervisor_id: Some(marcus),
            occurred_at: parse_timestamp("2026-02-12T16:00:00Z", &Local),
            duration_minutes: Some(60),
            format: Some(SessionFormat::Individual),
            status: SessionStatus::Submitted,
            counts_for_hours: CountsForHours::Unspecified,
            focus: Some("Safety planning review"),
            source_key: "seed-004",
        },
        NewSession {
            intern_id: tomas,
            supervisor_id: Some(marcus),
            occurred_at: parse_timestamp("2026-02-26T16:00:00Z", &Local),
            duration_minutes: Some(30),
            format: Some(SessionFormat::Individual),
            status: SessionStatus::Draft,
            counts_for_hours: CountsForHours::Unspecified,
            focus: Some("Boundaries and self-care"),
            source_key: "seed-005",
        },
        NewSession {
            intern_id: imani,
            supervisor_id: None,
            occurred_at: None,
            duration_minutes: None,
            format: Some(SessionFormat::Group),
            status: SessionStatus::Draft,
            counts_for_hours: CountsForHours::Unspecified,
            focus: Some("Orientation overview"),
            source_key: "seed-006",
        },
    ];

    let session_count = sessions.len();
    for session in sessions {
        insert_session(pool, session).await?;
    }

    tracing::info!(
        supervisors = supervisors.len(),
        interns = interns.len(),
        sessions = session_count,
        "seed data applied"
    );
    Ok(())
}

fn session_from_row(row: &PgRow) -> SupervisionSession {
    let format: Option<String> = row.get("format");
    let status: String = row.get("status");
    let counts_for_hours: Option<bool> = row.get("counts_for_hours");

    SupervisionSession {
        id: row.get("id"),
        intern_id: row.get("intern_id"),
        supervisor_id: row.get("supervisor_id"),
        occurred_at: row.get("occurred_at"),
        duration_minutes: row.get("duration_minutes"),
        format: format.as_deref().and_then(SessionFormat::parse_lossy),
        status: SessionStatus::parse_lossy(&status),
        counts_for_hours: CountsForHours::from_flag(counts_for_hours),
        focus: row.get("focus"),
    }
}

pub async fn fetch_sessions(
    pool: &PgPool,
    scope: SessionScope,
) -> anyhow::Result<Vec<SupervisionSession>> {
    let mut query = String::from(
        "SELECT id, intern_id, supervisor_id, occurred_at, duration_minutes, format, status, \
         counts_for_hours, focus \
         FROM supervision.sessions",
    );

    let scope_id = match scope {
        SessionScope::All => None,
        SessionScope::Intern(id) => {
            query.push_str(" WHERE intern_id = $1");
            Some(id)
        }
        SessionScope::Supervisor(id) => {
            query.push_str(" WHERE supervisor_id = $1");
            Some(id)
        }
    };
    query.push_str(" ORDER BY occurred_at DESC NULLS LAST");

    let mut rows = sqlx::query(&query);
    if let Some(id) = scope_id {
        rows = rows.bind(id);
    }

    let records = rows.fetch_all(pool).await?;
    let sessions: Vec<SupervisionSession> = records.iter().map(session_from_row).collect();

    tracing::debug!(?scope, count = sessions.len(), "fetched sessions");
    Ok(sessions)
}

pub async fn fetch_interns(pool: &PgPool) -> anyhow::Result<Vec<Intern>> {
    let records = sqlx::query(
        "SELECT id, full_name, email, status, ready_for_clients \
         FROM supervision.interns ORDER BY full_name",
    )
    .fetch_all(pool)
    .await?;

    let mut interns = Vec::new();
    for row in records {
        let status: String = row.get("status");
        interns.push(Intern {
            id: row.get("id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            status: InternStatus::parse_lossy(&status),
            ready_for_clients: row.get("ready_for_clients"),
        });
    }

    tracing::debug!(count = interns.len(), "fetched interns");
    Ok(interns)
}

/// Moves a draft session to submitted. Returns `false` if the session is
/// missing or already submitted.
pub async fn submit_session(pool: &PgPool, session_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE supervision.sessions
        SET status = $1
        WHERE id = $2 AND status = $3
        "#,
    )
    .bind(SessionStatus::Draft.submit().as_str())
    .bind(session_id)
    .bind(SessionStatus::Draft.as_str())
    .execute(pool)
    .await?;

    let changed = result.rows_affected() > 0;
    tracing::info!(%session_id, changed, "submit session");
    Ok(changed)
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    intern_name: String,
    intern_email: String,
    #[serde(default)]
    supervisor_name: Option<String>,
    #[serde(default)]
    supervisor_email: Option<String>,
    #[serde(default)]
    occurred_at: Option<String>,
    #[serde(default)]
    duration_minutes: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    counts_for_hours: Option<String>,
    #[serde(default)]
    focus: Option<String>,
    #[serde(default)]
    source_key: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;
    let mut skipped = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let intern_id = upsert_intern(
            pool,
            Uuid::new_v4(),
            &row.intern_name,
            &row.intern_email,
            None,
            None,
        )
        .await?;

        let supervisor_id = match non_blank(row.supervisor_email) {
            Some(email) => {
                let name = non_blank(row.supervisor_name).unwrap_or_else(|| email.clone());
                Some(upsert_supervisor(pool, Uuid::new_v4(), &name, &email).await?)
            }
            None => None,
        };

        let source_key = non_blank(row.source_key)
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let focus = non_blank(row.focus);
        let occurred_at = row
            .occurred_at
            .as_deref()
            .and_then(|at| parse_timestamp(at, &Local));
        let duration_minutes = row
            .duration_minutes
            .as_deref()
            .and_then(parse_duration_minutes);
        let counts_for_hours = row.counts_for_hours.as_deref();

        let added = insert_session(
            pool,
            NewSession {
                intern_id,
                supervisor_id,
                occurred_at,
                duration_minutes,
                format: row.format.as_deref().and_then(SessionFormat::parse_lossy),
                status: SessionStatus::parse_optional(row.status.as_deref()),
                counts_for_hours: CountsForHours::parse_optional(counts_for_hours),
                focus: focus.as_deref(),
                source_key: &source_key,
            },
        )
        .await?;

        if added {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    tracing::info!(inserted, skipped, path = %csv_path.display(), "csv import finished");
    Ok(inserted)
}
