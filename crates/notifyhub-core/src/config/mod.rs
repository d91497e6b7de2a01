//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod logging;
pub mod realtime;
pub mod server;

use serde::{Deserialize, Serialize};

pub use self::database::{DatabaseConfig, StoreProvider};
pub use self::logging::LoggingConfig;
pub use self::realtime::{
    MAX_PRIORITY, MIN_PRIORITY, RealtimeConfig, SchedulerConfig, SchedulerMode,
    VisibilityPriorityConfig,
};
pub use self::server::ServerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// files (default.toml + environment overlay) and `NOTIFYHUB__*` variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Notification store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Real-time hub settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from the `config/` directory.
    ///
    /// Merges `config/default` with an environment-specific overlay and
    /// environment variables prefixed with `NOTIFYHUB`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::load_from("config", env)
    }

    /// Load configuration from an explicit directory.
    pub fn load_from(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("NOTIFYHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let app: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        app.validate()?;
        Ok(app)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.database.provider == StoreProvider::Postgres && self.database.url.is_empty() {
            return Err(AppError::configuration(
                "database.url is required for the postgres provider",
            ));
        }
        self.realtime.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_without_files_uses_defaults() {
        let config = AppConfig::load_from("does-not-exist", "test").expect("load");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.provider, StoreProvider::Memory);
        assert_eq!(config.realtime.scheduler.base_interval_seconds, 30);
        assert_eq!(config.realtime.scheduler.mode, SchedulerMode::Deadline);
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut config = AppConfig::default();
        config.database.provider = StoreProvider::Postgres;
        assert!(config.validate().is_err());
    }
}
