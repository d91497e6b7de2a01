//! Database migration command.

use tracing::info;

use notifyhub_core::error::AppError;

use super::Cli;
use crate::output;

/// Run all pending migrations
pub async fn execute(cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let pool = super::create_db_pool(&config).await?;

    println!("Running database migrations...");
    notifyhub_database::migration::run_migrations(pool.pool()).await?;
    pool.close().await;
    info!("Migrations applied");
    output::print_success("All migrations applied successfully.");
    Ok(())
}
