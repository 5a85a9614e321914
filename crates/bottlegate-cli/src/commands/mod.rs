//! CLI command definitions and dispatch.

pub mod migrate;
pub mod purge;
pub mod rating;
pub mod session;

use clap::{Parser, Subcommand};

use bottlegate_core::config::AppConfig;
use bottlegate_core::error::AppError;
use bottlegate_database::DatabasePool;

use crate::output::OutputFormat;

/// BottleGate: bottle deposit captive portal administration
#[derive(Debug, Parser)]
#[command(name = "bottlegate", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Session inspection and administration
    Session(session::SessionArgs),
    /// Rating listing
    Rating(rating::RatingArgs),
    /// Delete ended sessions and their ratings
    Purge(purge::PurgeArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = load_config(&self.config)?;

        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &config).await,
            Commands::Session(args) => session::execute(args, &config, self.format).await,
            Commands::Rating(args) => rating::execute(args, &config, self.format).await,
            Commands::Purge(args) => purge::execute(args, &config).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load_file(config_path)
}

/// Helper: create database pool from config
pub async fn create_db_pool(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}
