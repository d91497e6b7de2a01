//! Real-time statistics handler.

use axum::Json;
use axum::extract::State;

use notifyhub_realtime::EngineStats;

use crate::dto::ApiResponse;
use crate::state::AppState;

/// GET /api/realtime/stats
pub async fn realtime_stats(State(state): State<AppState>) -> Json<ApiResponse<EngineStats>> {
    Json(ApiResponse::ok(state.engine.stats()))
}
