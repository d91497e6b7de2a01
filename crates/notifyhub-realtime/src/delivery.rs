//! The delivery primitive shared by the scheduler, the handler, and broadcasts.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, trace, warn};

use notifyhub_core::error::AppError;
use notifyhub_core::types::ConnectionId;
use notifyhub_database::NotificationStore;
use notifyhub_entity::Notification;

use crate::connection::record::ConnectionRecord;
use crate::connection::registry::ClientRegistry;
use crate::message::types::OutboundMessage;
use crate::metrics::{EngineMetrics, delivery as delivery_metrics};

/// How far behind the cursor each fetch starts. Covers rows committed
/// shortly after a fetch that were stamped before it.
const CURSOR_OVERLAP_MS: i64 = 2_000;

/// What one `deliver` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The cursor advanced; counts are what was pushed.
    Delivered {
        /// Notifications pushed in `new_notifications`.
        new_items: usize,
        /// Notifications pushed in `priority_notifications`.
        priority_items: usize,
    },
    /// The connection is gone; nothing was fetched.
    Skipped,
    /// The store failed or the batch was dropped; the cursor was kept.
    Failed,
}

/// Pushes notifications created since a connection's cursor.
#[derive(Debug)]
pub struct Deliverer {
    store: Arc<dyn NotificationStore>,
    registry: Arc<ClientRegistry>,
    metrics: Arc<EngineMetrics>,
}

impl Deliverer {
    /// Creates a deliverer over the given store and registry.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        registry: Arc<ClientRegistry>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            store,
            registry,
            metrics,
        }
    }

    /// Deliver to one connection.
    ///
    /// Deliveries to the same connection are serialized. Each fetch starts
    /// a little behind the cursor and ids already pushed are filtered out,
    /// so a late-committed notification is picked up without repeats. The
    /// cursor moves only once the batch is queued.
    pub async fn deliver(&self, conn_id: ConnectionId) -> DeliveryOutcome {
        let Some(record) = self.registry.get(&conn_id) else {
            return DeliveryOutcome::Skipped;
        };
        if !record.is_open() {
            debug!(conn_id = %conn_id, "Transport gone, dropping connection");
            self.registry.remove(&conn_id);
            return DeliveryOutcome::Skipped;
        }

        let _guard = record.delivery_lock().lock().await;
        if self.registry.get(&conn_id).is_none() {
            return DeliveryOutcome::Skipped;
        }

        delivery_metrics::record_attempt(&self.metrics);
        let started = Utc::now();
        let floor = record.last_fetch() - Duration::milliseconds(CURSOR_OVERLAP_MS);

        match self.fetch(&record, floor).await {
            Ok((items, unread_count)) => {
                let items = record.unseen(items, floor);
                let Some((new_items, priority_items)) = push_batch(&record, &items) else {
                    warn!(
                        conn_id = %conn_id,
                        user_id = %record.user_id,
                        batch = items.len(),
                        "Batch not queued, cursor kept"
                    );
                    delivery_metrics::record_failure(&self.metrics);
                    return DeliveryOutcome::Failed;
                };
                record.mark_seen(&items);
                record.send(OutboundMessage::UnreadCount { unread_count });
                let cursor = record.advance_cursor(started);

                delivery_metrics::record_success(&self.metrics, new_items, priority_items);
                trace!(
                    conn_id = %conn_id,
                    user_id = %record.user_id,
                    delivered = new_items,
                    priority = priority_items,
                    unread = unread_count,
                    cursor = %cursor,
                    "Delivery complete"
                );
                DeliveryOutcome::Delivered {
                    new_items,
                    priority_items,
                }
            }
            Err(e) => {
                error!(
                    conn_id = %conn_id,
                    user_id = %record.user_id,
                    error = %e,
                    "Delivery failed, cursor kept"
                );
                record.send(OutboundMessage::from_error(&e));
                delivery_metrics::record_failure(&self.metrics);
                DeliveryOutcome::Failed
            }
        }
    }

    async fn fetch(
        &self,
        record: &ConnectionRecord,
        since: DateTime<Utc>,
    ) -> Result<(Vec<Notification>, i64), AppError> {
        let items = self.store.fetch_since(record.user_id, since).await?;
        let unread = self.store.count_unread(record.user_id).await?;
        Ok((items, unread))
    }
}

/// Push a batch and its priority subset; returns both sizes, or `None`
/// if the outbox refused either message.
fn push_batch(record: &ConnectionRecord, items: &[Notification]) -> Option<(usize, usize)> {
    if items.is_empty() {
        return Some((0, 0));
    }

    let priority: Vec<Notification> = items.iter().filter(|n| n.is_priority()).cloned().collect();
    let counts = (items.len(), priority.len());

    if !record.send(OutboundMessage::NewNotifications {
        notifications: items.to_vec(),
    }) {
        return None;
    }
    if !priority.is_empty()
        && !record.send(OutboundMessage::PriorityNotifications {
            notifications: priority,
        })
    {
        return None;
    }
    Some(counts)
}
