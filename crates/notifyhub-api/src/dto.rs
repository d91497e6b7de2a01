//! Request and response bodies.

use serde::{Deserialize, Serialize};

use notifyhub_core::types::UserId;
use notifyhub_entity::NotificationType;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Health check body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Seconds since start.
    pub uptime_seconds: i64,
    /// `ok` or `unavailable`.
    pub store: String,
    /// Registered connections.
    pub connections: usize,
}

/// Create one notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    /// Recipient.
    pub user_id: UserId,
    /// Title.
    pub title: String,
    /// Body.
    pub message: String,
    /// Category.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Originating entity.
    #[serde(default)]
    pub related_id: Option<String>,
}

/// Notify every user holding a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleNotificationRequest {
    /// Title.
    pub title: String,
    /// Body.
    pub message: String,
    /// Category.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Originating entity.
    #[serde(default)]
    pub related_id: Option<String>,
}

/// Result of a role fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanOutResponse {
    /// Notifications created.
    pub created: usize,
}
