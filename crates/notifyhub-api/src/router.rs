//! Route definitions for the NotifyHub HTTP API.
//!
//! REST routes are mounted under `/api`; the WebSocket upgrade lives at `/ws`.

use axum::Router;
use axum::routing::{get, post};

use crate::handlers;
use crate::state::AppState;

/// Build the router and thread `state` through every route.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(health_routes())
        .merge(realtime_routes())
        .merge(notification_routes());

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(handlers::ws::ws_upgrade))
        .with_state(state)
}

fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

fn realtime_routes() -> Router<AppState> {
    Router::new().route("/realtime/stats", get(handlers::stats::realtime_stats))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            post(handlers::notification::create_notification),
        )
        .route(
            "/notifications/roles/{role}",
            post(handlers::notification::notify_role),
        )
}
