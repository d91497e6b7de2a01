//! Notification creation handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use notifyhub_entity::{NewNotification, Notification, UserRole};

use crate::dto::{ApiResponse, CreateNotificationRequest, FanOutResponse, RoleNotificationRequest};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/notifications
pub async fn create_notification(
    State(state): State<AppState>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Notification>>), ApiError> {
    let mut input = NewNotification::new(req.user_id, req.title, req.message, req.kind);
    if let Some(related) = req.related_id {
        input = input.related_to(related);
    }
    let notification = state.notifications.create_notification(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(notification))))
}

/// POST /api/notifications/roles/{role}
pub async fn notify_role(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Json(req): Json<RoleNotificationRequest>,
) -> Result<Json<ApiResponse<FanOutResponse>>, ApiError> {
    let role: UserRole = role.parse()?;
    let created = state
        .notifications
        .notify_role(
            role,
            &req.title,
            &req.message,
            req.kind,
            req.related_id.as_deref(),
        )
        .await?;
    Ok(Json(ApiResponse::ok(FanOutResponse {
        created: created.len(),
    })))
}
