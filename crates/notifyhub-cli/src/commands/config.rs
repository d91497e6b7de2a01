//! Configuration inspection commands.

use clap::{Args, Subcommand};

use notifyhub_core::error::AppError;
use notifyhub_database::connection::mask_password;

use super::Cli;
use crate::output;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the merged configuration
    Show,
    /// Validate the configuration and print a summary
    Validate,
}

/// Execute config commands
pub async fn execute(args: &ConfigArgs, cli: &Cli) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut config = cli.load_config()?;
            config.database.url = mask_password(&config.database.url);
            output::print_item(&config, cli.format);
        }
        ConfigCommand::Validate => match cli.load_config() {
            Ok(config) => {
                output::print_success(&format!(
                    "Configuration '{}/{}' is valid",
                    cli.config_dir, cli.env
                ));
                output::print_kv("Listen", &config.server.bind_address());
                output::print_kv("Store", &format!("{:?}", config.database.provider));
                output::print_kv("Database", &mask_password(&config.database.url));
                output::print_kv("Scheduler", &format!("{:?}", config.realtime.scheduler.mode));
                output::print_kv(
                    "Base interval",
                    &format!("{}s", config.realtime.scheduler.base_interval_seconds),
                );
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {e}"));
                return Err(e);
            }
        },
    }

    Ok(())
}
