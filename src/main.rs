//! NotifyHub server: real-time notification distribution hub.
//!
//! Main entry point that wires the store, the real-time engine, and the
//! HTTP/WebSocket layer together.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use notifyhub_api::{AppState, build_app};
use notifyhub_core::config::{AppConfig, StoreProvider};
use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_database::{
    DatabasePool, MemoryNotificationStore, NotificationStore, PgNotificationStore,
};
use notifyhub_realtime::RealtimeEngine;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load `config/default.toml`, the `NOTIFYHUB_ENV` overlay, and env vars.
fn load_configuration() -> AppResult<AppConfig> {
    let dir = std::env::var("NOTIFYHUB_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let env = std::env::var("NOTIFYHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load_from(&dir, &env)
}

/// Initialize tracing; `RUST_LOG` overrides the configured level.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> AppResult<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting NotifyHub");

    // ── Store ────────────────────────────────────────────────────
    let (store, db_pool) = open_store(&config).await?;

    // ── Real-time engine + scheduler ─────────────────────────────
    let engine = RealtimeEngine::new(config.realtime.clone(), Arc::clone(&store));
    let scheduler = engine.start_scheduler();

    // ── HTTP / WebSocket ─────────────────────────────────────────
    let addr = config.server.bind_address();
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let app = build_app(AppState::new(config, store, engine.clone()));

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(ErrorKind::Internal, format!("Failed to bind {addr}"), e)
    })?;
    info!(address = %addr, "NotifyHub listening");

    let shutdown_engine = engine.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, starting graceful shutdown");
            shutdown_engine.shutdown();
        })
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Server error", e))?;

    // ── Drain ────────────────────────────────────────────────────
    if tokio::time::timeout(grace, scheduler).await.is_err() {
        warn!(grace_seconds = grace.as_secs(), "Scheduler did not stop in time");
    }
    if let Some(pool) = db_pool {
        pool.close().await;
    }

    info!("NotifyHub shut down gracefully");
    Ok(())
}

/// Build the configured notification store.
async fn open_store(
    config: &AppConfig,
) -> AppResult<(Arc<dyn NotificationStore>, Option<DatabasePool>)> {
    match config.database.provider {
        StoreProvider::Memory => {
            warn!("Using the in-memory notification store; notifications are lost on restart");
            Ok((Arc::new(MemoryNotificationStore::new()), None))
        }
        StoreProvider::Postgres => {
            let pool = DatabasePool::connect(&config.database).await?;
            if config.database.run_migrations {
                info!("Running database migrations");
                notifyhub_database::migration::run_migrations(pool.pool()).await?;
            }
            let store = PgNotificationStore::new(pool.pool().clone());
            Ok((Arc::new(store), Some(pool)))
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
