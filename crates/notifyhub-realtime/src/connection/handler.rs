//! Per-connection protocol state machine.
//!
//! `Connected` → `Registered` → `Closed`. Only `register` is accepted
//! before registration; every failure is reported to this connection as
//! an `error` message and never tears the connection down.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notifyhub_core::error::AppError;
use notifyhub_core::result::AppResult;
use notifyhub_core::types::{ConnectionId, NotificationId, UserId};
use notifyhub_entity::UserRole;

use crate::message::serializer::deserialize_inbound;
use crate::message::types::{InboundMessage, OutboundMessage};
use crate::message::validator::validate_inbound;
use crate::metrics::connections as connection_metrics;
use crate::server::RealtimeEngine;

use super::outbox::Outbox;

/// Protocol state of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerState {
    /// Transport is up; no user bound yet.
    Connected,
    /// Bound to a user; the connection is in the registry.
    Registered {
        /// The registered user.
        user_id: UserId,
        /// Role reported at registration.
        role: Option<UserRole>,
    },
    /// Terminal.
    Closed,
}

/// Translates inbound intents into registry and store operations.
#[derive(Debug)]
pub struct ChannelHandler {
    conn_id: ConnectionId,
    outbox: Outbox,
    state: HandlerState,
    engine: RealtimeEngine,
}

impl ChannelHandler {
    pub(crate) fn new(conn_id: ConnectionId, outbox: Outbox, engine: RealtimeEngine) -> Self {
        Self {
            conn_id,
            outbox,
            state: HandlerState::Connected,
            engine,
        }
    }

    /// This connection's id.
    pub fn id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Current protocol state.
    pub fn state(&self) -> &HandlerState {
        &self.state
    }

    /// Cancelled when the hub wants the transport closed (per-user cap,
    /// shutdown).
    pub fn close_token(&self) -> CancellationToken {
        self.outbox.close_token()
    }

    /// Handle one text frame.
    pub async fn handle_text(&mut self, raw: &str) {
        if self.state == HandlerState::Closed {
            return;
        }
        self.engine.metrics.record_received();

        let max = self.engine.config().max_message_bytes;
        if let Err(e) = validate_inbound(raw, max) {
            self.outbox.send(OutboundMessage::invalid_message(e.message));
            return;
        }

        match deserialize_inbound(raw) {
            Ok(msg) => self.handle(msg).await,
            Err(e) => {
                debug!(conn_id = %self.conn_id, error = %e, "Undecodable frame");
                self.outbox.send(OutboundMessage::invalid_message(format!(
                    "Failed to parse message: {e}"
                )));
            }
        }
    }

    /// Binary frames are not part of the protocol.
    pub fn handle_binary(&mut self) {
        if self.state == HandlerState::Closed {
            return;
        }
        self.engine.metrics.record_received();
        self.outbox.send(OutboundMessage::invalid_message(
            "Binary frames are not supported",
        ));
    }

    /// Handle one decoded intent.
    pub async fn handle(&mut self, msg: InboundMessage) {
        let kind = msg.kind();
        let result = match (self.state.clone(), msg) {
            (HandlerState::Closed, _) => return,
            (HandlerState::Connected, InboundMessage::Register { user_id, role }) => {
                self.register(user_id, role).await
            }
            (HandlerState::Connected, _) => {
                Err(AppError::validation("Connection is not registered"))
            }
            (HandlerState::Registered { .. }, InboundMessage::Register { .. }) => {
                Err(AppError::validation("Connection is already registered"))
            }
            (HandlerState::Registered { user_id, .. }, msg) => self.dispatch(user_id, msg).await,
        };

        if let Err(e) = result {
            warn!(
                conn_id = %self.conn_id,
                intent = kind,
                error = %e,
                "Intent failed"
            );
            self.outbox.send(OutboundMessage::from_error(&e));
        }
    }

    async fn register(&mut self, user_id: Option<String>, role: Option<String>) -> AppResult<()> {
        let user_id = parse_user_id(user_id.as_deref())?;
        let role = match role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => Some(raw.parse::<UserRole>()?),
            None => None,
        };

        // Read the snapshot first: a failed read leaves the connection
        // unregistered and free to retry.
        let now = Utc::now();
        let store = self.engine.store();
        let notifications = store
            .list_recent(user_id, self.engine.config().initial_batch_size)
            .await?;
        let unread_count = store.count_unread(user_id).await?;

        // Queued before the record is visible, so no push can overtake it.
        let snapshot = notifications.clone();
        self.outbox.send(OutboundMessage::InitialNotifications {
            notifications,
            unread_count,
        });

        let registration = self.engine.registry.register_at(
            self.conn_id,
            user_id,
            role,
            self.outbox.clone(),
            now,
        );
        registration.record.mark_seen(&snapshot);
        connection_metrics::record_registration(&self.engine.metrics);
        if !registration.evicted.is_empty() {
            connection_metrics::record_evicted(&self.engine.metrics, registration.evicted.len());
        }
        self.state = HandlerState::Registered { user_id, role };

        info!(
            conn_id = %self.conn_id,
            user_id = %user_id,
            role = role.map(|r| r.as_str()).unwrap_or("-"),
            "Connection registered"
        );
        Ok(())
    }

    async fn dispatch(&self, user_id: UserId, msg: InboundMessage) -> AppResult<()> {
        let registry = &self.engine.registry;
        match msg {
            InboundMessage::VisibilityChange { is_visible } => {
                registry.set_active(&self.conn_id, is_visible);
                let priority = self
                    .engine
                    .config()
                    .visibility
                    .priority_for(is_visible);
                registry.set_priority(&self.conn_id, i64::from(priority));
                debug!(
                    conn_id = %self.conn_id,
                    visible = is_visible,
                    priority,
                    "Visibility changed"
                );
                if is_visible {
                    self.engine.deliver(self.conn_id).await;
                }
                Ok(())
            }
            InboundMessage::SetPriority { priority } => {
                let stored = registry.set_priority(&self.conn_id, priority);
                debug!(conn_id = %self.conn_id, requested = priority, priority = ?stored, "Priority set");
                Ok(())
            }
            InboundMessage::RefreshNotifications => {
                self.engine.deliver(self.conn_id).await;
                Ok(())
            }
            InboundMessage::MarkAsRead { notification_id } => {
                self.mark_as_read(user_id, notification_id).await
            }
            InboundMessage::MarkAllRead => self.mark_all_read(user_id).await,
            InboundMessage::Register { .. } => {
                Err(AppError::validation("Connection is already registered"))
            }
        }
    }

    async fn mark_as_read(&self, user_id: UserId, notification_id: NotificationId) -> AppResult<()> {
        self.engine
            .store()
            .mark_read(notification_id, user_id)
            .await?;
        self.engine.send_to_user(
            &user_id,
            &OutboundMessage::NotificationMarkedRead { notification_id },
        );
        self.push_unread_count(user_id).await
    }

    async fn mark_all_read(&self, user_id: UserId) -> AppResult<()> {
        let changed = self.engine.store().mark_all_read(user_id).await?;
        debug!(conn_id = %self.conn_id, user_id = %user_id, changed, "Marked all read");
        self.engine
            .send_to_user(&user_id, &OutboundMessage::AllNotificationsMarkedRead);
        self.push_unread_count(user_id).await
    }

    async fn push_unread_count(&self, user_id: UserId) -> AppResult<()> {
        let unread_count = self.engine.store().count_unread(user_id).await?;
        self.engine
            .send_to_user(&user_id, &OutboundMessage::UnreadCount { unread_count });
        Ok(())
    }

    /// Leave the registry and enter `Closed`. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == HandlerState::Closed {
            return;
        }
        if let HandlerState::Registered { user_id, .. } = &self.state {
            self.engine.registry.remove(&self.conn_id);
            info!(conn_id = %self.conn_id, user_id = %user_id, "Connection closed");
        } else {
            debug!(conn_id = %self.conn_id, "Unregistered connection closed");
        }
        self.outbox.close();
        self.state = HandlerState::Closed;
        connection_metrics::record_disconnect(&self.engine.metrics);
    }
}

impl Drop for ChannelHandler {
    fn drop(&mut self) {
        self.close();
    }
}

fn parse_user_id(raw: Option<&str>) -> AppResult<UserId> {
    match raw.map(str::trim) {
        None | Some("") => Err(AppError::validation("userId is required")),
        Some(raw) => raw
            .parse::<UserId>()
            .map_err(|_| AppError::validation(format!("Invalid userId: '{raw}'"))),
    }
}
