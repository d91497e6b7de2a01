//! Realtime engine metrics.

pub mod connections;
pub mod delivery;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Total connections established
    pub connections_total: AtomicU64,
    /// Connections currently open
    pub connections_active: AtomicU64,
    /// Successful `register` intents
    pub registrations: AtomicU64,
    /// Connections closed to honor the per-user cap
    pub connections_evicted: AtomicU64,
    /// Frames received from clients
    pub messages_received: AtomicU64,
    /// Messages queued to clients
    pub messages_sent: AtomicU64,
    /// Messages dropped because a client queue was full
    pub messages_dropped: AtomicU64,
    /// Calls to the delivery primitive that reached the store
    pub deliveries_attempted: AtomicU64,
    /// Deliveries that completed and advanced the cursor
    pub deliveries_succeeded: AtomicU64,
    /// Deliveries that failed on a store error
    pub deliveries_failed: AtomicU64,
    /// Notifications pushed in `new_notifications`
    pub notifications_pushed: AtomicU64,
    /// Notifications pushed in `priority_notifications`
    pub priority_alerts_pushed: AtomicU64,
    /// Scheduler sweeps (or deadline batches) run
    pub sweeps_run: AtomicU64,
}

impl EngineMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message queued to a client
    pub fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message dropped on a full queue
    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame received from a client
    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            connections_evicted: self.connections_evicted.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            deliveries_attempted: self.deliveries_attempted.load(Ordering::Relaxed),
            deliveries_succeeded: self.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
            notifications_pushed: self.notifications_pushed.load(Ordering::Relaxed),
            priority_alerts_pushed: self.priority_alerts_pushed.load(Ordering::Relaxed),
            sweeps_run: self.sweeps_run.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total connections ever established
    pub connections_total: u64,
    /// Currently open connections
    pub connections_active: u64,
    /// Successful registrations
    pub registrations: u64,
    /// Connections evicted by the per-user cap
    pub connections_evicted: u64,
    /// Frames received
    pub messages_received: u64,
    /// Messages queued
    pub messages_sent: u64,
    /// Messages dropped
    pub messages_dropped: u64,
    /// Deliveries attempted
    pub deliveries_attempted: u64,
    /// Deliveries succeeded
    pub deliveries_succeeded: u64,
    /// Deliveries failed
    pub deliveries_failed: u64,
    /// Notifications pushed
    pub notifications_pushed: u64,
    /// Priority alerts pushed
    pub priority_alerts_pushed: u64,
    /// Sweeps run
    pub sweeps_run: u64,
}
