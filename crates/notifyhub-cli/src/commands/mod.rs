//! CLI command definitions and dispatch.

pub mod config;
pub mod listen;
pub mod migrate;
pub mod notify;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use notifyhub_core::config::{AppConfig, StoreProvider};
use notifyhub_core::error::AppError;
use notifyhub_database::{DatabasePool, NotificationStore, PgNotificationStore};
use notifyhub_service::{NoopBroadcaster, NotificationService};

use crate::output::OutputFormat;

/// NotifyHub: real-time notification distribution hub
#[derive(Debug, Parser)]
#[command(name = "notifyhub", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding default.toml and environment overlays
    #[arg(short, long, default_value = "config")]
    pub config_dir: String,

    /// Environment overlay to load
    #[arg(short, long, default_value = "development")]
    pub env: String,

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
    /// Apply pending database migrations
    Migrate,
    /// Create a notification for one user
    Send(notify::SendArgs),
    /// Create a notification for every user holding a role
    NotifyRole(notify::NotifyRoleArgs),
    /// Connect to a hub as a client and print events
    Listen(listen::ListenArgs),
    /// Configuration inspection
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate => migrate::execute(self).await,
            Commands::Send(args) => notify::send(args, self).await,
            Commands::NotifyRole(args) => notify::notify_role(args, self).await,
            Commands::Listen(args) => listen::execute(args).await,
            Commands::Config(args) => config::execute(args, self).await,
        }
    }

    /// Load configuration for the selected environment.
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        AppConfig::load_from(&self.config_dir, &self.env)
    }
}

/// Helper: connect to the configured PostgreSQL store.
///
/// The in-memory provider lives inside the hub process, so commands that
/// write notifications from outside need the shared database.
pub async fn create_db_pool(config: &AppConfig) -> Result<DatabasePool, AppError> {
    if config.database.provider != StoreProvider::Postgres {
        return Err(AppError::configuration(
            "this command needs database.provider = \"postgres\"",
        ));
    }
    DatabasePool::connect(&config.database).await
}

/// Helper: notification service writing straight to the store.
///
/// Nothing is pushed from here; the hub's scheduler picks the new rows up
/// on its next sweep.
pub async fn create_service(config: &AppConfig) -> Result<NotificationService, AppError> {
    let pool = create_db_pool(config).await?;
    debug!("Connected to the notification store");
    let store: Arc<dyn NotificationStore> = Arc::new(PgNotificationStore::new(pool.into_pool()));
    Ok(NotificationService::new(store, Arc::new(NoopBroadcaster)))
}
