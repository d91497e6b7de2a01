//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use notifyhub_core::config::RealtimeConfig;
use notifyhub_core::types::{ConnectionId, UserId};
use notifyhub_database::NotificationStore;
use notifyhub_service::NotificationBroadcaster;

use crate::connection::handler::ChannelHandler;
use crate::connection::outbox::Outbox;
use crate::connection::registry::ClientRegistry;
use crate::delivery::{Deliverer, DeliveryOutcome};
use crate::message::types::OutboundMessage;
use crate::metrics::{EngineMetrics, MetricsSnapshot, connections as connection_metrics};
use crate::scheduler::Scheduler;

/// Central real-time engine that coordinates the hub's subsystems.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Client registry.
    pub registry: Arc<ClientRegistry>,
    /// Delivery primitive.
    pub deliverer: Arc<Deliverer>,
    /// Adaptive scheduler.
    pub scheduler: Arc<Scheduler>,
    /// Metrics collector.
    pub metrics: Arc<EngineMetrics>,
    /// Notification store.
    store: Arc<dyn NotificationStore>,
    /// Configuration.
    config: Arc<RealtimeConfig>,
    /// Cancels the scheduler on shutdown.
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("connections", &self.registry.connection_count())
            .finish()
    }
}

impl RealtimeEngine {
    /// Creates a new real-time engine over `store`.
    pub fn new(config: RealtimeConfig, store: Arc<dyn NotificationStore>) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let registry = Arc::new(ClientRegistry::new(config.max_connections_per_user));
        let deliverer = Arc::new(Deliverer::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&metrics),
        ));
        let scheduler = Arc::new(Scheduler::new(
            config.scheduler.clone(),
            Arc::clone(&registry),
            Arc::clone(&deliverer),
            Arc::clone(&metrics),
        ));

        info!(
            mode = ?config.scheduler.mode,
            max_connections_per_user = config.max_connections_per_user,
            "Real-time engine initialized"
        );

        Self {
            registry,
            deliverer,
            scheduler,
            metrics,
            store,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Hub configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Notification store.
    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    /// Accept a new transport connection.
    ///
    /// Returns the protocol handler and the queue the transport must
    /// drain into its socket.
    pub fn open_connection(&self) -> (ChannelHandler, mpsc::Receiver<OutboundMessage>) {
        let conn_id = ConnectionId::new();
        let (outbox, receiver) = Outbox::channel(
            conn_id,
            self.config.outbound_buffer_size,
            Arc::clone(&self.metrics),
        );
        connection_metrics::record_connect(&self.metrics);
        debug!(conn_id = %conn_id, "Transport connected");
        (ChannelHandler::new(conn_id, outbox, self.clone()), receiver)
    }

    /// Run the delivery primitive for one connection.
    pub async fn deliver(&self, conn_id: ConnectionId) -> DeliveryOutcome {
        self.deliverer.deliver(conn_id).await
    }

    /// Deliver to every connection of `user_id`, visible or not.
    /// Returns the number of completed deliveries.
    pub async fn broadcast_to_user(&self, user_id: &UserId) -> usize {
        let connections = self.registry.user_connections(user_id);
        let outcomes = futures::future::join_all(
            connections
                .iter()
                .map(|record| self.deliverer.deliver(record.id)),
        )
        .await;

        let delivered = outcomes
            .iter()
            .filter(|o| matches!(o, DeliveryOutcome::Delivered { .. }))
            .count();
        debug!(
            user_id = %user_id,
            connections = connections.len(),
            delivered,
            "Broadcast to user"
        );
        delivered
    }

    /// Queue a message to every connection of `user_id`.
    pub fn send_to_user(&self, user_id: &UserId, message: &OutboundMessage) -> usize {
        self.registry
            .user_connections(user_id)
            .iter()
            .filter(|record| record.send(message.clone()))
            .count()
    }

    /// Spawn the scheduler; it runs until [`shutdown`](Self::shutdown).
    pub fn start_scheduler(&self) -> JoinHandle<()> {
        let scheduler = Arc::clone(&self.scheduler);
        let cancel = self.shutdown.child_token();
        tokio::spawn(scheduler.run(cancel))
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the scheduler and close every connection.
    pub fn shutdown(&self) {
        info!("Shutting down real-time engine");
        self.shutdown.cancel();
        let closed = self.registry.close_all();
        info!(closed, "Real-time engine shut down");
    }

    /// Registry counts plus metric counters.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            connections: self.registry.connection_count(),
            active_connections: self.registry.active_count(),
            users: self.registry.user_count(),
            metrics: self.metrics.snapshot(),
        }
    }
}

#[async_trait]
impl NotificationBroadcaster for RealtimeEngine {
    async fn broadcast_to_user(&self, user_id: UserId) {
        RealtimeEngine::broadcast_to_user(self, &user_id).await;
    }
}

/// Hub statistics (serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    /// Registered connections
    pub connections: usize,
    /// Registered connections with a visible tab
    pub active_connections: usize,
    /// Users with at least one connection
    pub users: usize,
    /// Counters
    pub metrics: MetricsSnapshot,
}
