//! Data retention: deletes ended sessions and their ratings.

use chrono::{Duration, Utc};
use clap::{ArgGroup, Args};

use bottlegate_core::config::AppConfig;
use bottlegate_core::error::AppError;
use bottlegate_database::repositories::SessionRepository;

use crate::output;

/// Arguments for the purge command
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("scope").required(true).args(["all", "older_than_days"])))]
pub struct PurgeArgs {
    /// Delete every expired or revoked session
    #[arg(long)]
    pub all: bool,
    /// Delete sessions that ended more than N days ago
    #[arg(long, value_name = "N")]
    pub older_than_days: Option<i64>,
    /// Skip confirmation
    #[arg(long)]
    pub force: bool,
}

/// Execute the purge command
pub async fn execute(args: &PurgeArgs, config: &AppConfig) -> Result<(), AppError> {
    let before = match args.older_than_days {
        Some(days) if days < 0 => {
            return Err(AppError::validation("--older-than-days must not be negative"));
        }
        Some(days) => Some(Utc::now() - Duration::days(days)),
        None => None,
    };

    let prompt = match before {
        Some(cutoff) => format!(
            "Delete ended sessions and their ratings from before {}?",
            cutoff.format("%Y-%m-%d %H:%M")
        ),
        None => "Delete ALL ended sessions and their ratings?".to_string(),
    };

    if !args.force && !output::confirm(&prompt)? {
        println!("Cancelled.");
        return Ok(());
    }

    let pool = super::create_db_pool(config).await?.into_pool();
    let deleted = SessionRepository::new(pool).purge_terminal(before).await?;

    output::print_success(&format!("Deleted {deleted} session(s)"));
    Ok(())
}
