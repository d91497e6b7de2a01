//! Connection metrics helpers.

use std::sync::atomic::Ordering;

use super::EngineMetrics;

/// Record a new transport connection
pub fn record_connect(metrics: &EngineMetrics) {
    metrics.connections_total.fetch_add(1, Ordering::Relaxed);
    metrics.connections_active.fetch_add(1, Ordering::Relaxed);
}

/// Record a disconnection
pub fn record_disconnect(metrics: &EngineMetrics) {
    metrics.connections_active.fetch_sub(1, Ordering::Relaxed);
}

/// Record a successful registration
pub fn record_registration(metrics: &EngineMetrics) {
    metrics.registrations.fetch_add(1, Ordering::Relaxed);
}

/// Record connections closed by the per-user cap
pub fn record_evicted(metrics: &EngineMetrics, count: usize) {
    metrics
        .connections_evicted
        .fetch_add(count as u64, Ordering::Relaxed);
}
