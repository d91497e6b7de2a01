//! Shared test helpers for integration tests.
//!
//! Every test gets its own hub bound to an ephemeral port, backed by the
//! in-memory store. The scheduler is not started, so pushes happen only
//! through explicit deliveries and broadcasts.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use notifyhub_api::{AppState, build_app};
use notifyhub_client::ClientEvent;
use notifyhub_core::config::{AppConfig, RealtimeConfig};
use notifyhub_core::types::UserId;
use notifyhub_database::MemoryNotificationStore;
use notifyhub_entity::{NewNotification, Notification, NotificationType};
use notifyhub_realtime::RealtimeEngine;

/// Upper bound on any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// A running hub.
pub struct TestHub {
    /// Listener address
    pub addr: SocketAddr,
    /// Engine behind the router
    pub engine: RealtimeEngine,
    /// Backing store
    pub store: Arc<MemoryNotificationStore>,
    /// Shared handler state
    pub state: AppState,
    server: JoinHandle<()>,
}

impl TestHub {
    /// Start a hub with default real-time settings.
    pub async fn start() -> Self {
        Self::with_realtime(RealtimeConfig::default()).await
    }

    /// Start a hub with custom real-time settings.
    pub async fn with_realtime(realtime: RealtimeConfig) -> Self {
        let config = AppConfig {
            realtime,
            ..AppConfig::default()
        };
        let store = Arc::new(MemoryNotificationStore::new());
        let engine = RealtimeEngine::new(config.realtime.clone(), store.clone());
        let state = AppState::new(config, store.clone(), engine.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        let app = build_app(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        Self {
            addr,
            engine,
            store,
            state,
            server,
        }
    }

    /// WebSocket endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Open a raw protocol connection.
    pub async fn raw_client(&self) -> RawClient {
        let (ws, _) = connect_async(self.ws_url())
            .await
            .expect("Failed to connect to hub");
        RawClient { ws }
    }

    /// Create a notification through the service (persists and pushes).
    pub async fn notify(&self, user: UserId, kind: NotificationType, title: &str) -> Notification {
        self.state
            .notifications
            .create_notification(NewNotification::new(user, title, "body", kind))
            .await
            .expect("Failed to create notification")
    }

    /// Store a notification without pushing it.
    pub fn seed(&self, user: UserId, kind: NotificationType, title: &str) -> Notification {
        self.store.insert(
            NewNotification::new(user, title, "body", kind)
                .into_notification(chrono::Utc::now() - chrono::Duration::seconds(60)),
        )
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.engine.shutdown();
        self.server.abort();
    }
}

/// A bare WebSocket client speaking the JSON protocol.
pub struct RawClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RawClient {
    /// Send one JSON frame.
    pub async fn send(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    /// Send a raw text frame.
    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("Failed to send frame");
    }

    /// Next JSON frame, or `None` if the hub closed the connection.
    pub async fn next(&mut self) -> Option<Value> {
        loop {
            let frame = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("Timed out waiting for a frame");
            match frame {
                Some(Ok(Message::Text(text))) => {
                    return Some(serde_json::from_str(text.as_str()).expect("Invalid JSON from hub"));
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Skip frames until one of type `kind` arrives.
    pub async fn recv_type(&mut self, kind: &str) -> Value {
        loop {
            let msg = self.next().await.expect("Connection closed");
            if msg["type"] == kind {
                return msg;
            }
        }
    }

    /// Register and return the `initial_notifications` snapshot.
    pub async fn register(&mut self, user: UserId) -> Value {
        self.send(serde_json::json!({ "type": "register", "userId": user }))
            .await;
        self.recv_type("initial_notifications").await
    }

    /// Assert nothing arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(frame) = tokio::time::timeout(window, self.ws.next()).await {
            panic!("Expected no frame, got {frame:?}");
        }
    }
}

/// Skip events until `pred` matches.
pub async fn next_event(
    rx: &mut mpsc::Receiver<ClientEvent>,
    pred: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    loop {
        let event = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("Timed out waiting for a client event")
            .expect("Client event stream ended");
        if pred(&event) {
            return event;
        }
    }
}

/// Poll `check` until it holds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
