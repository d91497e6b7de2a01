//! Real-time hub configuration: connections, scheduler cadence, visibility mapping.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Lowest client priority.
pub const MIN_PRIORITY: u8 = 1;
/// Highest client priority.
pub const MAX_PRIORITY: u8 = 10;

/// Real-time (WebSocket) hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Per-connection outbound queue capacity.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer_size: usize,
    /// Maximum simultaneous connections per user (0 = unlimited).
    #[serde(default)]
    pub max_connections_per_user: usize,
    /// Maximum inbound frame size in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Number of notifications sent in `initial_notifications`.
    #[serde(default = "default_initial_batch")]
    pub initial_batch_size: u32,
    /// Adaptive scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Priority derived from tab visibility.
    #[serde(default)]
    pub visibility: VisibilityPriorityConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_buffer_size: default_outbound_buffer(),
            max_connections_per_user: 0,
            max_message_bytes: default_max_message_bytes(),
            initial_batch_size: default_initial_batch(),
            scheduler: SchedulerConfig::default(),
            visibility: VisibilityPriorityConfig::default(),
        }
    }
}

impl RealtimeConfig {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.outbound_buffer_size == 0 {
            return Err(AppError::configuration(
                "realtime.outbound_buffer_size must be positive",
            ));
        }
        self.scheduler.validate()?;
        self.visibility.validate()
    }
}

/// How the scheduler drives periodic deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerMode {
    /// One loop keyed by each connection's next due time.
    #[default]
    Deadline,
    /// Two fixed-period scans: a base sweep and a priority sweep.
    DualSweep,
}

/// Adaptive scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scheduling strategy.
    #[serde(default)]
    pub mode: SchedulerMode,
    /// Base sweep period; also the staleness bound for active connections.
    #[serde(default = "default_base_interval")]
    pub base_interval_seconds: u64,
    /// Priority sweep tick period.
    #[serde(default = "default_priority_tick")]
    pub priority_tick_seconds: u64,
    /// Tick resolution of the deadline loop in milliseconds.
    #[serde(default = "default_deadline_resolution")]
    pub deadline_resolution_ms: u64,
    /// Delivery interval per priority; index 0 is priority 1.
    #[serde(default = "default_priority_intervals")]
    pub priority_intervals_seconds: Vec<u64>,
    /// Upper bound on deliveries running at once within a sweep.
    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: SchedulerMode::default(),
            base_interval_seconds: default_base_interval(),
            priority_tick_seconds: default_priority_tick(),
            deadline_resolution_ms: default_deadline_resolution(),
            priority_intervals_seconds: default_priority_intervals(),
            max_concurrent_deliveries: default_max_concurrent_deliveries(),
        }
    }
}

impl SchedulerConfig {
    /// Base sweep period.
    pub fn base_interval(&self) -> Duration {
        Duration::from_secs(self.base_interval_seconds)
    }

    /// Priority sweep period.
    pub fn priority_tick(&self) -> Duration {
        Duration::from_secs(self.priority_tick_seconds)
    }

    /// Deadline loop resolution.
    pub fn deadline_resolution(&self) -> Duration {
        Duration::from_millis(self.deadline_resolution_ms)
    }

    /// Validate the interval table and periods.
    ///
    /// The table must have one positive entry per priority and must not
    /// increase as priority rises.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.base_interval_seconds == 0 || self.priority_tick_seconds == 0 {
            return Err(AppError::configuration(
                "scheduler periods must be positive",
            ));
        }
        if self.deadline_resolution_ms == 0 {
            return Err(AppError::configuration(
                "scheduler.deadline_resolution_ms must be positive",
            ));
        }
        if self.max_concurrent_deliveries == 0 {
            return Err(AppError::configuration(
                "scheduler.max_concurrent_deliveries must be positive",
            ));
        }

        let table = &self.priority_intervals_seconds;
        let expected = usize::from(MAX_PRIORITY - MIN_PRIORITY + 1);
        if table.len() != expected {
            return Err(AppError::configuration(format!(
                "scheduler.priority_intervals_seconds needs {expected} entries, got {}",
                table.len()
            )));
        }
        if table.iter().any(|s| *s == 0) {
            return Err(AppError::configuration(
                "scheduler.priority_intervals_seconds entries must be positive",
            ));
        }
        if table.windows(2).any(|w| w[1] > w[0]) {
            return Err(AppError::configuration(
                "scheduler.priority_intervals_seconds must not increase with priority",
            ));
        }
        Ok(())
    }
}

/// Priority reported for visible and hidden tabs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityPriorityConfig {
    /// Priority applied when a tab becomes visible.
    #[serde(default = "default_visible_priority")]
    pub visible_priority: u8,
    /// Priority applied when a tab becomes hidden.
    #[serde(default = "default_hidden_priority")]
    pub hidden_priority: u8,
}

impl Default for VisibilityPriorityConfig {
    fn default() -> Self {
        Self {
            visible_priority: default_visible_priority(),
            hidden_priority: default_hidden_priority(),
        }
    }
}

impl VisibilityPriorityConfig {
    /// Priority for the given visibility.
    pub fn priority_for(&self, visible: bool) -> u8 {
        if visible {
            self.visible_priority
        } else {
            self.hidden_priority
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        let range = MIN_PRIORITY..=MAX_PRIORITY;
        if !range.contains(&self.visible_priority) || !range.contains(&self.hidden_priority) {
            return Err(AppError::configuration(
                "visibility priorities must be within 1..=10",
            ));
        }
        Ok(())
    }
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_max_message_bytes() -> usize {
    65_536
}

fn default_initial_batch() -> u32 {
    50
}

fn default_base_interval() -> u64 {
    30
}

fn default_priority_tick() -> u64 {
    5
}

fn default_deadline_resolution() -> u64 {
    1000
}

fn default_priority_intervals() -> Vec<u64> {
    vec![300, 180, 120, 90, 60, 45, 30, 20, 15, 10]
}

fn default_max_concurrent_deliveries() -> usize {
    32
}

fn default_visible_priority() -> u8 {
    7
}

fn default_hidden_priority() -> u8 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        RealtimeConfig::default().validate().expect("defaults valid");
    }

    #[test]
    fn test_increasing_table_rejected() {
        let mut config = SchedulerConfig::default();
        config.priority_intervals_seconds[9] = 400;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_short_table_rejected() {
        let config = SchedulerConfig {
            priority_intervals_seconds: vec![60, 30],
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_visibility_mapping() {
        let v = VisibilityPriorityConfig::default();
        assert_eq!(v.priority_for(true), 7);
        assert_eq!(v.priority_for(false), 3);
    }
}
