//! Session management CLI commands.

use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use bottlegate_access::{
    EnforcerDispatch, InsertionSweeper, PgSessionStore, SessionController, SystemClock,
};
use bottlegate_core::config::AppConfig;
use bottlegate_core::error::AppError;
use bottlegate_database::repositories::{RatingRepository, SessionRepository};
use bottlegate_entity::session::{Session, SessionStatus};

use crate::output::{self, OutputFormat};

/// Arguments for session commands
#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Session subcommand
    #[command(subcommand)]
    pub command: SessionCommand,
}

/// Session subcommands
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// List recent sessions
    List {
        /// Only sessions in this status (e.g. `active`)
        #[arg(long)]
        status: Option<SessionStatus>,
        /// Maximum number of rows
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Show one session
    Show {
        /// Session ID
        id: i64,
    },
    /// Expire a session now and revoke its access
    Expire {
        /// Session ID
        id: i64,
    },
    /// Release insertion slots held longer than the configured timeout
    ReleaseStale,
    /// Count sessions per status
    Count,
}

/// Session display row
#[derive(Debug, Serialize, Tabled)]
struct SessionRow {
    /// Session ID
    id: i64,
    /// Device identity
    identity: String,
    /// IP Address
    ip: String,
    /// Status
    status: String,
    /// Bottles
    bottles: i32,
    /// Earned seconds
    seconds: i64,
    /// Access end
    ends: String,
    /// Created
    created: String,
}

impl From<&Session> for SessionRow {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id,
            identity: s.identity.clone(),
            ip: s.ip_address.clone(),
            status: s.status.to_string(),
            bottles: s.bottles_inserted,
            seconds: s.seconds_earned,
            ends: output::time_cell(s.session_end),
            created: output::time_cell(Some(s.created_at)),
        }
    }
}

/// Per-status count row
#[derive(Debug, Serialize, Tabled)]
struct CountRow {
    /// Status
    status: String,
    /// Sessions
    count: i64,
}

/// Execute session commands
pub async fn execute(
    args: &SessionArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let pool = super::create_db_pool(config).await?.into_pool();
    let sessions = Arc::new(SessionRepository::new(pool.clone()));

    match &args.command {
        SessionCommand::List { status, limit } => {
            let rows: Vec<SessionRow> = sessions
                .list_recent(*status, *limit)
                .await?
                .iter()
                .map(SessionRow::from)
                .collect();

            output::print_list(&rows, format);
        }
        SessionCommand::Show { id } => {
            let session = sessions
                .find_by_id(*id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Session {id} not found")))?;

            match format {
                OutputFormat::Json => output::print_item(&session, format),
                OutputFormat::Table => print_session(&session),
            }
        }
        SessionCommand::Expire { id } => {
            let store = Arc::new(PgSessionStore::new(
                sessions.clone(),
                Arc::new(RatingRepository::new(pool.clone())),
            ));
            let enforcer = Arc::new(EnforcerDispatch::from_config(
                &config.enforcement,
                config.mock_sensor,
            )?);
            let controller = SessionController::new(
                store,
                enforcer,
                Arc::new(SystemClock),
                config.session.clone(),
            );

            let session = controller.expire(*id).await?;
            output::print_success(&format!("Session {} is {}", session.id, session.status));
        }
        SessionCommand::ReleaseStale => {
            let store = Arc::new(PgSessionStore::new(
                sessions.clone(),
                Arc::new(RatingRepository::new(pool.clone())),
            ));
            let sweeper = InsertionSweeper::new(store, Arc::new(SystemClock), &config.session);

            let released = sweeper.sweep().await?;
            output::print_success(&format!("Released {} insertion slot(s)", released.len()));
        }
        SessionCommand::Count => {
            let rows: Vec<CountRow> = sessions
                .count_by_status()
                .await?
                .into_iter()
                .map(|(status, count)| CountRow {
                    status: status.to_string(),
                    count,
                })
                .collect();

            output::print_list(&rows, format);
        }
    }

    Ok(())
}

fn print_session(s: &Session) {
    println!("Session {}", s.id);
    output::print_kv("Identity", &s.identity);
    output::print_kv("IP address", &s.ip_address);
    output::print_kv("Status", s.status.as_str());
    output::print_kv("Bottles", &s.bottles_inserted.to_string());
    output::print_kv("Seconds earned", &s.seconds_earned.to_string());
    output::print_kv("Inserting since", &output::time_cell(s.inserting_since));
    output::print_kv("Access start", &output::time_cell(s.session_start));
    output::print_kv("Access end", &output::time_cell(s.session_end));
    output::print_kv("Ended", &output::time_cell(s.ended_at));
    output::print_kv(
        "Rating",
        &s.rating.map_or_else(|| "-".to_string(), |r| r.to_string()),
    );
    output::print_kv("Created", &output::time_cell(Some(s.created_at)));
}
