//! Client agent configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use notifyhub_core::config::realtime::{MAX_PRIORITY, MIN_PRIORITY};
use notifyhub_core::error::AppError;
use notifyhub_core::types::UserId;
use notifyhub_entity::UserRole;

/// Settings for one [`ClientAgent`](crate::ClientAgent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Hub WebSocket URL, e.g. `ws://127.0.0.1:8080/ws`.
    pub url: String,
    /// User this agent registers as.
    pub user_id: UserId,
    /// Optional role sent with `register`.
    #[serde(default)]
    pub role: Option<UserRole>,
    /// Reconnect after the transport drops.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    /// Delay before the first reconnect attempt.
    #[serde(default = "default_base_delay")]
    pub base_reconnect_delay_ms: u64,
    /// Upper bound on the reconnect delay.
    #[serde(default = "default_max_delay")]
    pub max_reconnect_delay_ms: u64,
    /// Priority reported while the host is visible.
    #[serde(default = "default_visible_priority")]
    pub visible_priority: u8,
    /// Priority reported while the host is hidden.
    #[serde(default = "default_hidden_priority")]
    pub hidden_priority: u8,
    /// Notifications kept in the local cache.
    #[serde(default = "default_cache_limit")]
    pub cache_limit: usize,
    /// Capacity of the event channel handed to the host.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl ClientConfig {
    /// Config with defaults for everything but the endpoint and user.
    pub fn new(url: impl Into<String>, user_id: UserId) -> Self {
        Self {
            url: url.into(),
            user_id,
            role: None,
            auto_reconnect: true,
            base_reconnect_delay_ms: default_base_delay(),
            max_reconnect_delay_ms: default_max_delay(),
            visible_priority: default_visible_priority(),
            hidden_priority: default_hidden_priority(),
            cache_limit: default_cache_limit(),
            event_buffer: default_event_buffer(),
        }
    }

    /// Set the role sent with `register`.
    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Priority to report for the given visibility.
    pub fn priority_for(&self, visible: bool) -> u8 {
        if visible {
            self.visible_priority
        } else {
            self.hidden_priority
        }
    }

    /// Base reconnect delay.
    pub fn base_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.base_reconnect_delay_ms)
    }

    /// Reconnect delay cap.
    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }

    /// Reject settings the agent cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.url.is_empty() {
            return Err(AppError::configuration("client url must not be empty"));
        }
        for (name, p) in [
            ("visible_priority", self.visible_priority),
            ("hidden_priority", self.hidden_priority),
        ] {
            if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&p) {
                return Err(AppError::configuration(format!(
                    "{name} must be within {MIN_PRIORITY}..={MAX_PRIORITY}, got {p}"
                )));
            }
        }
        if self.base_reconnect_delay_ms == 0 || self.max_reconnect_delay_ms == 0 {
            return Err(AppError::configuration("reconnect delays must be positive"));
        }
        if self.event_buffer == 0 {
            return Err(AppError::configuration("event_buffer must be positive"));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_visible_priority() -> u8 {
    7
}

fn default_hidden_priority() -> u8 {
    3
}

fn default_cache_limit() -> usize {
    50
}

fn default_event_buffer() -> usize {
    128
}
