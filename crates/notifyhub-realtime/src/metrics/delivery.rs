//! Delivery and sweep metrics helpers.

use std::sync::atomic::Ordering;

use super::EngineMetrics;

/// Record a delivery that reached the store
pub fn record_attempt(metrics: &EngineMetrics) {
    metrics.deliveries_attempted.fetch_add(1, Ordering::Relaxed);
}

/// Record a completed delivery
pub fn record_success(metrics: &EngineMetrics, pushed: usize, priority: usize) {
    metrics.deliveries_succeeded.fetch_add(1, Ordering::Relaxed);
    metrics
        .notifications_pushed
        .fetch_add(pushed as u64, Ordering::Relaxed);
    metrics
        .priority_alerts_pushed
        .fetch_add(priority as u64, Ordering::Relaxed);
}

/// Record a failed delivery
pub fn record_failure(metrics: &EngineMetrics) {
    metrics.deliveries_failed.fetch_add(1, Ordering::Relaxed);
}

/// Record one scheduler pass
pub fn record_sweep(metrics: &EngineMetrics) {
    metrics.sweeps_run.fetch_add(1, Ordering::Relaxed);
}
