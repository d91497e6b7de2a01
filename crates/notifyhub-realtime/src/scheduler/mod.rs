//! Adaptive scheduler: decides when each connection gets a delivery.
//!
//! Two strategies share the same sweep primitives:
//!
//! - `dual_sweep`: a base sweep every `base_interval` delivering to every
//!   visible connection, and a priority sweep every `priority_tick`
//!   delivering to visible connections whose priority interval elapsed.
//! - `deadline`: one loop over a queue of per-connection due times,
//!   `last_fetch + min(priority interval, base interval)`. Hidden
//!   connections are parked and rechecked every base interval.

pub mod deadline;
pub mod priority;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notifyhub_core::config::{SchedulerConfig, SchedulerMode};
use notifyhub_core::types::ConnectionId;

use crate::connection::record::ConnectionRecord;
use crate::connection::registry::ClientRegistry;
use crate::delivery::{Deliverer, DeliveryOutcome};
use crate::metrics::{EngineMetrics, delivery as delivery_metrics};

use self::deadline::DeadlineQueue;
use self::priority::PriorityTable;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Visible connections examined.
    pub considered: usize,
    /// Deliveries that completed.
    pub delivered: usize,
    /// Deliveries that failed on a store error.
    pub failed: usize,
    /// Connections not due, or gone by the time their turn came.
    pub skipped: usize,
}

/// Drives periodic deliveries.
#[derive(Debug)]
pub struct Scheduler {
    registry: Arc<ClientRegistry>,
    deliverer: Arc<Deliverer>,
    metrics: Arc<EngineMetrics>,
    table: PriorityTable,
    config: SchedulerConfig,
    permits: Arc<Semaphore>,
}

impl Scheduler {
    /// Creates a scheduler from validated settings.
    pub fn new(
        config: SchedulerConfig,
        registry: Arc<ClientRegistry>,
        deliverer: Arc<Deliverer>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            table: PriorityTable::from_config(&config),
            permits: Arc::new(Semaphore::new(config.max_concurrent_deliveries.max(1))),
            registry,
            deliverer,
            metrics,
            config,
        }
    }

    /// The priority → interval table in use.
    pub fn table(&self) -> &PriorityTable {
        &self.table
    }

    /// Deliver to every visible connection.
    pub async fn base_sweep(&self) -> SweepReport {
        let active = self.registry.list_active();
        let considered = active.len();
        let targets = active.iter().map(|r| r.id).collect();

        let mut report = self.run_deliveries(targets).await;
        report.considered = considered;
        delivery_metrics::record_sweep(&self.metrics);
        report
    }

    /// Deliver to every visible connection whose priority interval has
    /// elapsed as of `now`.
    pub async fn priority_sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let active = self.registry.list_active();
        let considered = active.len();
        let targets: Vec<_> = active
            .iter()
            .filter(|r| self.is_due(r, now))
            .map(|r| r.id)
            .collect();
        let not_due = considered - targets.len();

        let mut report = self.run_deliveries(targets).await;
        report.considered = considered;
        report.skipped += not_due;
        delivery_metrics::record_sweep(&self.metrics);
        report
    }

    /// Whether `record`'s priority interval has elapsed as of `now`.
    pub fn is_due(&self, record: &ConnectionRecord, now: DateTime<Utc>) -> bool {
        let interval = to_chrono(self.table.interval_for(record.priority()));
        now.signed_duration_since(record.last_fetch()) >= interval
    }

    /// Interval the deadline loop uses for `priority`: never longer than
    /// the base interval.
    pub fn effective_interval(&self, priority: u8) -> Duration {
        self.table
            .interval_for(priority)
            .min(self.config.base_interval())
    }

    /// Next instant the deadline loop should look at `record`.
    pub fn next_due(&self, record: &ConnectionRecord, now: DateTime<Utc>) -> DateTime<Utc> {
        if record.is_active() {
            add(
                record.last_fetch(),
                self.effective_interval(record.priority()),
            )
        } else {
            add(now, self.config.base_interval())
        }
    }

    /// Run the configured strategy until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            mode = ?self.config.mode,
            base_interval_seconds = self.config.base_interval_seconds,
            priority_tick_seconds = self.config.priority_tick_seconds,
            max_concurrent = self.config.max_concurrent_deliveries,
            "Scheduler started"
        );

        let mode = self.config.mode;
        match mode {
            SchedulerMode::DualSweep => self.run_dual_sweep(cancel).await,
            SchedulerMode::Deadline => self.run_deadline(cancel).await,
        }

        info!("Scheduler stopped");
    }

    async fn run_dual_sweep(self: Arc<Self>, cancel: CancellationToken) {
        let base = {
            let scheduler = Arc::clone(&self);
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.base_loop(cancel).await })
        };

        self.priority_loop(cancel).await;
        if let Err(e) = base.await {
            warn!(error = %e, "Base sweep loop ended abnormally");
        }
    }

    async fn base_loop(&self, cancel: CancellationToken) {
        let mut ticker = time::interval(self.config.base_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.base_sweep().await;
                    debug!(
                        considered = report.considered,
                        delivered = report.delivered,
                        failed = report.failed,
                        "Base sweep complete"
                    );
                }
            }
        }
    }

    async fn priority_loop(&self, cancel: CancellationToken) {
        let mut ticker = time::interval(self.config.priority_tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.priority_sweep_at(Utc::now()).await;
                    if report.delivered + report.failed > 0 {
                        debug!(
                            considered = report.considered,
                            delivered = report.delivered,
                            failed = report.failed,
                            skipped = report.skipped,
                            "Priority sweep complete"
                        );
                    }
                }
            }
        }
    }

    async fn run_deadline(self: Arc<Self>, cancel: CancellationToken) {
        let mut changes = self.registry.subscribe_changes();
        let mut queue = DeadlineQueue::new();
        self.resync(&mut queue, Utc::now());

        let mut ticker = time::interval(self.config.deadline_resolution());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let now = Utc::now();
            loop {
                match changes.try_recv() {
                    Ok(id) => match self.registry.get(&id) {
                        Some(record) => queue.schedule(id, self.next_due(&record, now)),
                        None => queue.cancel(&id),
                    },
                    Err(TryRecvError::Lagged(missed)) => {
                        debug!(missed, "Change feed lagged, rebuilding deadline queue");
                        self.resync(&mut queue, now);
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }

            let mut targets = Vec::new();
            for id in queue.pop_due(now) {
                let Some(record) = self.registry.get(&id) else {
                    continue;
                };
                let due = self.next_due(&record, now);
                if due > now {
                    queue.schedule(id, due);
                } else {
                    targets.push(id);
                }
            }

            if targets.is_empty() {
                continue;
            }

            let report = self.run_deliveries(targets.clone()).await;
            delivery_metrics::record_sweep(&self.metrics);
            debug!(
                due = targets.len(),
                delivered = report.delivered,
                failed = report.failed,
                scheduled = queue.len(),
                "Deadline batch complete"
            );

            let after = Utc::now();
            for id in targets {
                if let Some(record) = self.registry.get(&id) {
                    let floor = add(after, self.effective_interval(record.priority()));
                    queue.schedule(id, self.next_due(&record, after).max(floor));
                }
            }
        }
    }

    fn resync(&self, queue: &mut DeadlineQueue, now: DateTime<Utc>) {
        queue.clear();
        for record in self.registry.list_all() {
            queue.schedule(record.id, self.next_due(&record, now));
        }
    }

    /// Deliver to `targets` concurrently, bounded by the permit pool.
    async fn run_deliveries(&self, targets: Vec<ConnectionId>) -> SweepReport {
        let mut report = SweepReport::default();
        let mut tasks = JoinSet::new();

        for conn_id in targets {
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                break;
            };
            let deliverer = Arc::clone(&self.deliverer);
            tasks.spawn(async move {
                let _permit = permit;
                deliverer.deliver(conn_id).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(DeliveryOutcome::Delivered { .. }) => report.delivered += 1,
                Ok(DeliveryOutcome::Failed) => report.failed += 1,
                Ok(DeliveryOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(error = %e, "Delivery task panicked");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

fn add(at: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    at.checked_add_signed(to_chrono(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
