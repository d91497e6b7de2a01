//! # notifyhub-api
//!
//! HTTP layer for NotifyHub built on Axum.
//!
//! Serves the `/ws` upgrade bound to the real-time channel handler, plus
//! health and statistics endpoints under `/api`.

pub mod app;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use app::build_app;
pub use error::ApiError;
pub use state::AppState;
