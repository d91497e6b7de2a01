//! Application builder: wires router, middleware, and state into an Axum app.

use std::time::Duration;

use axum::Router;
use axum::http::{Method, header};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    build_router(state)
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Browser clients connect from arbitrary origins.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}
