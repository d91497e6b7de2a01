//! Outbound side of one connection.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use notifyhub_core::types::ConnectionId;

use crate::message::types::OutboundMessage;
use crate::metrics::EngineMetrics;

/// Bounded queue feeding a connection's socket writer, plus the token
/// that asks the transport to close.
#[derive(Debug, Clone)]
pub struct Outbox {
    conn_id: ConnectionId,
    sender: mpsc::Sender<OutboundMessage>,
    close: CancellationToken,
    metrics: Arc<EngineMetrics>,
}

impl Outbox {
    /// Create an outbox and the receiver the transport drains.
    pub fn channel(
        conn_id: ConnectionId,
        capacity: usize,
        metrics: Arc<EngineMetrics>,
    ) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let outbox = Self {
            conn_id,
            sender,
            close: CancellationToken::new(),
            metrics,
        };
        (outbox, receiver)
    }

    /// Queue a message. Returns `false` when the queue is full or the
    /// transport is gone; a full queue drops the message.
    pub fn send(&self, msg: OutboundMessage) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.sender.try_send(msg) {
            Ok(()) => {
                self.metrics.record_sent();
                true
            }
            Err(mpsc::error::TrySendError::Full(msg)) => {
                warn!(
                    conn_id = %self.conn_id,
                    kind = msg.kind(),
                    "Connection send buffer full, dropping message"
                );
                self.metrics.record_dropped();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Whether the transport has gone away or was asked to close.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed() || self.close.is_cancelled()
    }

    /// Ask the transport to close.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Token cancelled when the hub wants this connection closed.
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_queue_drops() {
        let metrics = Arc::new(EngineMetrics::new());
        let (outbox, mut rx) = Outbox::channel(ConnectionId::new(), 1, metrics.clone());

        assert!(outbox.send(OutboundMessage::AllNotificationsMarkedRead));
        assert!(!outbox.send(OutboundMessage::AllNotificationsMarkedRead));
        assert_eq!(metrics.snapshot().messages_dropped, 1);

        assert_eq!(
            rx.recv().await,
            Some(OutboundMessage::AllNotificationsMarkedRead)
        );
    }

    #[test]
    fn test_closed_when_receiver_dropped_or_cancelled() {
        let metrics = Arc::new(EngineMetrics::new());
        let (outbox, rx) = Outbox::channel(ConnectionId::new(), 4, metrics.clone());
        assert!(!outbox.is_closed());
        drop(rx);
        assert!(outbox.is_closed());
        assert!(!outbox.send(OutboundMessage::AllNotificationsMarkedRead));

        let (outbox, _rx) = Outbox::channel(ConnectionId::new(), 4, metrics);
        outbox.close();
        assert!(outbox.is_closed());
    }
}
