//! Rating CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use bottlegate_core::config::AppConfig;
use bottlegate_core::error::AppError;
use bottlegate_database::repositories::RatingRepository;

use crate::output::{self, OutputFormat};

/// Arguments for rating commands
#[derive(Debug, Args)]
pub struct RatingArgs {
    /// Rating subcommand
    #[command(subcommand)]
    pub command: RatingCommand,
}

/// Rating subcommands
#[derive(Debug, Subcommand)]
pub enum RatingCommand {
    /// List the most recent ratings
    List {
        /// Maximum number of rows
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

/// Rating display row
#[derive(Debug, Serialize, Tabled)]
struct RatingRow {
    /// Rating ID
    id: i64,
    /// Session ID
    session: i64,
    /// Score
    rating: String,
    /// Answered questions
    answered: usize,
    /// Comment
    comment: String,
    /// Submitted
    submitted: String,
}

/// Execute rating commands
pub async fn execute(
    args: &RatingArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let pool = super::create_db_pool(config).await?.into_pool();
    let ratings = RatingRepository::new(pool);

    match &args.command {
        RatingCommand::List { limit } => {
            let rows: Vec<RatingRow> = ratings
                .list_recent(*limit)
                .await?
                .into_iter()
                .map(|r| RatingRow {
                    id: r.id,
                    session: r.session_id,
                    rating: r.rating.map_or_else(|| "-".to_string(), |v| v.to_string()),
                    answered: r
                        .answers
                        .as_object()
                        .map_or(0, |a| a.values().filter(|v| !v.is_null()).count()),
                    comment: r.comment.unwrap_or_default(),
                    submitted: output::time_cell(Some(r.created_at)),
                })
                .collect();

            output::print_list(&rows, format);
        }
    }

    Ok(())
}
