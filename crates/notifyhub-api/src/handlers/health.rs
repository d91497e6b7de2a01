//! Health check handler.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use tracing::warn;

use crate::dto::{ApiResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let store_ok = match state.store.health_check().await {
        Ok(ok) => ok,
        Err(e) => {
            warn!(error = %e, "Store health check failed");
            false
        }
    };

    Json(ApiResponse::ok(HealthResponse {
        status: if store_ok { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        store: if store_ok { "ok" } else { "unavailable" }.to_string(),
        connections: state.engine.registry.connection_count(),
    }))
}
