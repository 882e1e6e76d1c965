use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod config;
mod db;
mod error;
mod hours;
mod invoice;
mod models;
mod report;

use hours::SessionScope;
use invoice::InvoicePolicy;

#[derive(Parser)]
#[command(name = "supervision-hours")]
#[command(about = "Supervision hours and invoice previews", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("scope")
        .args(["intern", "supervisor"])
        .multiple(false)
))]
struct ScopeArgs {
    /// Only sessions for this intern
    #[arg(long)]
    intern: Option<Uuid>,
    /// Only sessions led by this supervisor
    #[arg(long)]
    supervisor: Option<Uuid>,
}

impl ScopeArgs {
    fn scope(&self) -> SessionScope {
        SessionScope::from_args(self.intern, self.supervisor)
    }

    fn label(&self) -> String {
        match self.scope() {
            SessionScope::All => "all interns".to_string(),
            SessionScope::Intern(id) => format!("intern {id}"),
            SessionScope::Supervisor(id) => format!("supervisor {id}"),
        }
    }
}

#[derive(Args)]
struct BillingArgs {
    /// Hourly rate for estimates (defaults to SUPERVISION_HOURLY_RATE)
    #[arg(long)]
    rate: Option<f64>,
    /// Leave sessions marked as not counting toward hours out of invoices
    #[arg(long)]
    respect_counts_flag: bool,
}

impl BillingArgs {
    fn rate(&self, configured: f64) -> anyhow::Result<f64> {
        match self.rate {
            Some(rate) => Ok(config::validate_rate(rate)?),
            None => Ok(configured),
        }
    }

    fn policy(&self) -> InvoicePolicy {
        InvoicePolicy {
            respect_counts_flag: self.respect_counts_flag,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo supervisors, interns and sessions
    Seed,
    /// Import supervision sessions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Summarize supervision hours by status and intern
    Summary {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        json: bool,
    },
    /// Show monthly invoice previews
    Invoices {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        billing: BillingArgs,
        #[arg(long)]
        json: bool,
    },
    /// List interns eligible for new client assignments
    Eligible,
    /// Mark a draft session as submitted
    Submit {
        #[arg(long)]
        session: Uuid,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        billing: BillingArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supervision_hours=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = config::Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} sessions from {}.", csv.display());
        }
        Commands::Summary { scope, json } => {
            let sessions = db::fetch_sessions(&pool, scope.scope()).await?;
            let by_status = hours::hours_by_status(&sessions);
            let counted = hours::partition_by_counts(&sessions);
            let by_intern = hours::hours_by_intern(&sessions);
            let interns = db::fetch_interns(&pool).await?;
            let names = report::intern_names(&interns);

            if json {
                let value = serde_json::json!({
                    "hours_by_status": by_status,
                    "counted_hours": counted,
                    "hours_by_intern": by_intern,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(());
            }

            println!("Supervision hours for {}:", scope.label());
            println!(
                "- submitted {:.2} h, draft {:.2} h, total {:.2} h",
                by_status.submitted_hours, by_status.draft_hours, by_status.total_hours
            );
            println!(
                "- counted {:.2} h, not counted {:.2} h",
                counted.counted_hours, counted.not_counted_hours
            );
            for (name, hours) in report::named_hours(&by_intern, &names) {
                println!("- {name}: {hours:.1} h");
            }
        }
        Commands::Invoices {
            scope,
            billing,
            json,
        } => {
            let rate = billing.rate(config.hourly_rate)?;
            let sessions = db::fetch_sessions(&pool, scope.scope()).await?;
            let previews = invoice::monthly_previews(&sessions, billing.policy(), rate, &Local);
            let totals = invoice::invoice_totals(&previews);

            if json {
                let value = serde_json::json!({
                    "rate": rate,
                    "months": previews,
                    "totals": totals,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(());
            }

            if previews.is_empty() {
                println!("No billable sessions for {}.", scope.label());
                return Ok(());
            }

            println!("Invoice previews for {} at ${rate:.2}/h:", scope.label());
            for preview in &previews {
                println!(
                    "- {}: {} sessions, {:.2} h, est. ${:.2}",
                    preview.year_month,
                    preview.session_count,
                    preview.total_hours,
                    preview.estimated_amount
                );
            }
            println!(
                "Total: {} sessions, {:.2} h, est. ${:.2}",
                totals.session_count, totals.total_hours, totals.estimated_amount
            );
        }
        Commands::Eligible => {
            let interns = db::fetch_interns(&pool).await?;
            let eligible = models::eligible_interns(&interns);

            if eligible.is_empty() {
                println!("No interns are currently eligible for new clients.");
                return Ok(());
            }

            println!("Interns ready for new clients:");
            for intern in eligible {
                println!("- {} ({})", intern.full_name, intern.email);
            }
        }
        Commands::Submit { session } => {
            if db::submit_session(&pool, session).await? {
                println!("Session {session} submitted.");
            } else {
                println!("Session {session} is not a draft; nothing changed.");
            }
        }
        Commands::Report {
            scope,
            billing,
            out,
        } => {
            let rate = billing.rate(config.hourly_rate)?;
            let snapshot = db::fetch_sessions(&pool, SessionScope::All).await?;
            let sessions = hours::scoped(&snapshot, scope.scope());
            let interns = db::fetch_interns(&pool).await?;
            let label = scope.label();
            let options = report::ReportOptions {
                scope_label: &label,
                rate,
                policy: billing.policy(),
            };
            let report = report::build_report(&options, &sessions, &interns, &Local);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
