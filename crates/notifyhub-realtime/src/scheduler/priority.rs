//! Client priority levels and the priority → interval table.

use std::time::Duration;

use notifyhub_core::config::{MAX_PRIORITY, MIN_PRIORITY, SchedulerConfig};

/// Priority assigned at registration.
pub const DEFAULT_PRIORITY: u8 = 5;

/// Clamp a client-supplied priority into 1..=10.
pub fn clamp_priority(priority: i64) -> u8 {
    priority.clamp(i64::from(MIN_PRIORITY), i64::from(MAX_PRIORITY)) as u8
}

/// Fixed lookup from priority to delivery interval.
#[derive(Debug, Clone)]
pub struct PriorityTable {
    intervals: Vec<Duration>,
}

impl PriorityTable {
    /// Build the table from validated scheduler settings.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            intervals: config
                .priority_intervals_seconds
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }

    /// Interval for `priority`; out-of-range values are clamped.
    pub fn interval_for(&self, priority: u8) -> Duration {
        let index = usize::from(clamp_priority(i64::from(priority)) - MIN_PRIORITY);
        self.intervals
            .get(index)
            .or_else(|| self.intervals.last())
            .copied()
            .unwrap_or(Duration::from_secs(30))
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = PriorityTable::default();
        assert_eq!(table.interval_for(1), Duration::from_secs(300));
        assert_eq!(table.interval_for(5), Duration::from_secs(60));
        assert_eq!(table.interval_for(10), Duration::from_secs(10));
        assert_eq!(table.interval_for(0), Duration::from_secs(300));
        assert_eq!(table.interval_for(200), Duration::from_secs(10));
    }

    #[test]
    fn test_lower_priority_never_polls_more_often() {
        let table = PriorityTable::default();
        for p in MIN_PRIORITY..MAX_PRIORITY {
            assert!(table.interval_for(p) >= table.interval_for(p + 1));
        }
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_priority(-3), 1);
        assert_eq!(clamp_priority(0), 1);
        assert_eq!(clamp_priority(7), 7);
        assert_eq!(clamp_priority(11), 10);
    }
}
