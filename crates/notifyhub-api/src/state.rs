//! Application state shared across all handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use notifyhub_core::config::AppConfig;
use notifyhub_database::NotificationStore;
use notifyhub_realtime::RealtimeEngine;
use notifyhub_service::{NotificationBroadcaster, NotificationService};

/// Dependencies handed to every Axum handler via `State<AppState>`.
///
/// All fields are cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Notification store.
    pub store: Arc<dyn NotificationStore>,
    /// Real-time engine.
    pub engine: RealtimeEngine,
    /// Notification creation, pushed through the engine.
    pub notifications: Arc<NotificationService>,
    /// Process start, for uptime.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire the service to push through `engine`.
    pub fn new(config: AppConfig, store: Arc<dyn NotificationStore>, engine: RealtimeEngine) -> Self {
        let broadcaster: Arc<dyn NotificationBroadcaster> = Arc::new(engine.clone());
        let notifications = Arc::new(NotificationService::new(Arc::clone(&store), broadcaster));
        Self {
            config: Arc::new(config),
            store,
            engine,
            notifications,
            started_at: Utc::now(),
        }
    }
}
