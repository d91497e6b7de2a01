//! The client agent: one logical hub connection with automatic recovery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_core::types::NotificationId;
use notifyhub_entity::Notification;
use notifyhub_realtime::message::serializer::{deserialize_outbound, serialize_inbound};
use notifyhub_realtime::{InboundMessage, OutboundMessage};

use crate::alert::DesktopAlerter;
use crate::backoff::ReconnectBackoff;
use crate::cache::NotificationCache;
use crate::config::ClientConfig;
use crate::event::ClientEvent;
use crate::visibility::VisibilitySignal;

/// Pending outbound intents while a session is up.
const COMMAND_BUFFER: usize = 64;

type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// State shared between the handle and the supervisor task.
#[derive(Debug)]
struct Shared {
    cache: Mutex<NotificationCache>,
    connected: AtomicBool,
}

impl Shared {
    fn cache(&self) -> MutexGuard<'_, NotificationCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running client agent.
///
/// Dropping the handle stops the agent; [`disconnect`](Self::disconnect)
/// does the same and waits for the socket to close.
#[derive(Debug)]
pub struct ClientAgent {
    shared: Arc<Shared>,
    commands: mpsc::Sender<InboundMessage>,
    events: mpsc::Sender<ClientEvent>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ClientAgent {
    /// Start an agent without desktop alerts.
    pub fn connect(
        config: ClientConfig,
        visibility: VisibilitySignal,
    ) -> AppResult<(Self, mpsc::Receiver<ClientEvent>)> {
        Self::connect_with_alerter(config, visibility, None)
    }

    /// Start an agent that escalates priority notifications to `alerter`.
    pub fn connect_with_alerter(
        config: ClientConfig,
        visibility: VisibilitySignal,
        alerter: Option<Arc<dyn DesktopAlerter>>,
    ) -> AppResult<(Self, mpsc::Receiver<ClientEvent>)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let shared = Arc::new(Shared {
            cache: Mutex::new(NotificationCache::new(config.cache_limit)),
            connected: AtomicBool::new(false),
        });
        let cancel = CancellationToken::new();

        let supervisor = Supervisor {
            config,
            shared: Arc::clone(&shared),
            events: event_tx.clone(),
            commands: command_rx,
            visibility,
            alerter,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(supervisor.run());

        Ok((
            Self {
                shared,
                commands: command_tx,
                events: event_tx,
                cancel,
                task: Mutex::new(Some(task)),
            },
            event_rx,
        ))
    }

    /// Ask the hub to deliver pending notifications now.
    pub async fn refresh(&self) -> AppResult<()> {
        self.send(InboundMessage::RefreshNotifications).await
    }

    /// Mark one notification read.
    pub async fn mark_as_read(&self, notification_id: NotificationId) -> AppResult<()> {
        self.send(InboundMessage::MarkAsRead { notification_id })
            .await
    }

    /// Mark every notification of the user read.
    pub async fn mark_all_read(&self) -> AppResult<()> {
        self.send(InboundMessage::MarkAllRead).await
    }

    /// Report an explicit priority; the hub clamps it into 1..=10.
    pub async fn set_priority(&self, priority: u8) -> AppResult<()> {
        self.send(InboundMessage::SetPriority {
            priority: i64::from(priority),
        })
        .await
    }

    /// A desktop alert was clicked: request focus and mark the item read.
    pub async fn alert_clicked(&self, notification_id: NotificationId) -> AppResult<()> {
        let _ = self
            .events
            .send(ClientEvent::FocusRequested { notification_id })
            .await;
        self.mark_as_read(notification_id).await
    }

    /// Snapshot of the local cache.
    pub fn cache(&self) -> NotificationCache {
        self.shared.cache().clone()
    }

    /// Whether a session with the hub is currently up.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Stop reconnecting, close the socket, and wait for the agent to exit.
    ///
    /// Safe to call more than once and from any state.
    pub async fn disconnect(&self) {
        self.cancel.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    async fn send(&self, msg: InboundMessage) -> AppResult<()> {
        if !self.is_connected() {
            return Err(AppError::transport("Not connected to hub"));
        }
        self.commands
            .send(msg)
            .await
            .map_err(|_| AppError::transport("Client agent stopped"))
    }
}

impl Drop for ClientAgent {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Owns the socket and drives connect, session, and backoff.
struct Supervisor {
    config: ClientConfig,
    shared: Arc<Shared>,
    events: mpsc::Sender<ClientEvent>,
    commands: mpsc::Receiver<InboundMessage>,
    visibility: VisibilitySignal,
    alerter: Option<Arc<dyn DesktopAlerter>>,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(mut self) {
        let mut backoff = ReconnectBackoff::new(
            self.config.base_reconnect_delay(),
            self.config.max_reconnect_delay(),
        );

        loop {
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = connect_async(self.config.url.as_str()) => result,
            };

            match connected {
                Ok((ws, _)) => {
                    backoff.reset();
                    info!(
                        url = %self.config.url,
                        user_id = %self.config.user_id,
                        "Connected to hub"
                    );
                    self.shared.connected.store(true, Ordering::SeqCst);
                    self.emit(ClientEvent::Connected).await;

                    let reason = self.session(ws).await;

                    self.shared.connected.store(false, Ordering::SeqCst);
                    info!(user_id = %self.config.user_id, reason = %reason, "Disconnected from hub");
                    self.emit(ClientEvent::Disconnected { reason }).await;
                }
                Err(e) => {
                    warn!(url = %self.config.url, error = %e, "Failed to connect to hub");
                    if !self.config.auto_reconnect {
                        self.emit(ClientEvent::Disconnected {
                            reason: e.to_string(),
                        })
                        .await;
                    }
                }
            }

            if self.cancel.is_cancelled() || !self.config.auto_reconnect {
                break;
            }

            let delay = backoff.next_delay();
            let attempt = backoff.attempt();
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
            self.emit(ClientEvent::Reconnecting { attempt, delay }).await;

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.shared.connected.store(false, Ordering::SeqCst);
        debug!(user_id = %self.config.user_id, "Client agent stopped");
    }

    /// Run one session; returns why it ended.
    async fn session(&mut self, ws: HubStream) -> String {
        let (mut sink, mut stream) = ws.split();

        let mut visibility = self.visibility.subscribe();
        let visible = *visibility.borrow_and_update();
        let register = InboundMessage::Register {
            user_id: Some(self.config.user_id.to_string()),
            role: self.config.role.map(|r| r.as_str().to_string()),
        };
        let priority = InboundMessage::SetPriority {
            priority: i64::from(self.config.priority_for(visible)),
        };
        for msg in [register, priority] {
            if let Err(e) = send_frame(&mut sink, &msg).await {
                return e.to_string();
            }
        }

        let mut visibility_open = true;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return "client disconnected".to_string();
                }
                changed = visibility.changed(), if visibility_open => {
                    if changed.is_err() {
                        visibility_open = false;
                        continue;
                    }
                    let visible = *visibility.borrow_and_update();
                    debug!(user_id = %self.config.user_id, visible, "Visibility changed");
                    for msg in self.visibility_messages(visible) {
                        if let Err(e) = send_frame(&mut sink, &msg).await {
                            return e.to_string();
                        }
                    }
                }
                command = self.commands.recv() => {
                    let Some(msg) = command else {
                        return "client agent dropped".to_string();
                    };
                    if let Err(e) = send_frame(&mut sink, &msg).await {
                        return e.to_string();
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => match deserialize_outbound(text.as_str()) {
                        Ok(msg) => self.apply(msg).await,
                        Err(e) => warn!(error = %e, "Ignoring undecodable frame from hub"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        return frame
                            .map(|f| f.reason.as_str().to_owned())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by hub".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return e.to_string(),
                    None => return "connection closed".to_string(),
                },
            }
        }
    }

    fn visibility_messages(&self, visible: bool) -> [InboundMessage; 2] {
        [
            InboundMessage::VisibilityChange {
                is_visible: visible,
            },
            InboundMessage::SetPriority {
                priority: i64::from(self.config.priority_for(visible)),
            },
        ]
    }

    /// Fold one hub message into the cache and report it.
    async fn apply(&self, msg: OutboundMessage) {
        let event = match msg {
            OutboundMessage::InitialNotifications {
                notifications,
                unread_count,
            } => {
                self.shared
                    .cache()
                    .replace(notifications.clone(), unread_count);
                ClientEvent::Snapshot {
                    notifications,
                    unread_count,
                }
            }
            OutboundMessage::NewNotifications { notifications } => {
                let fresh = self.shared.cache().merge(notifications);
                if fresh.is_empty() {
                    return;
                }
                ClientEvent::NewNotifications(fresh)
            }
            OutboundMessage::PriorityNotifications { notifications } => {
                let fresh = self.shared.cache().take_unalerted(notifications);
                if fresh.is_empty() {
                    return;
                }
                self.raise_alerts(&fresh);
                ClientEvent::PriorityAlert(fresh)
            }
            OutboundMessage::UnreadCount { unread_count } => {
                self.shared.cache().set_unread_count(unread_count);
                ClientEvent::UnreadCount(unread_count)
            }
            OutboundMessage::NotificationMarkedRead { notification_id } => {
                self.shared.cache().mark_read(&notification_id);
                ClientEvent::MarkedRead(notification_id)
            }
            OutboundMessage::AllNotificationsMarkedRead => {
                self.shared.cache().mark_all_read();
                ClientEvent::AllMarkedRead
            }
            OutboundMessage::Error { code, message } => {
                warn!(code = %code, message = %message, "Hub reported an error");
                ClientEvent::ServerError { code, message }
            }
        };
        self.emit(event).await;
    }

    fn raise_alerts(&self, notifications: &[Notification]) {
        let Some(alerter) = &self.alerter else {
            return;
        };
        if !alerter.is_permitted() {
            debug!("Desktop alerts not permitted");
            return;
        }
        for n in notifications {
            alerter.raise(n);
        }
    }

    async fn emit(&self, event: ClientEvent) {
        tokio::select! {
            biased;
            _ = self.events.send(event) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}

async fn send_frame<S>(sink: &mut S, msg: &InboundMessage) -> AppResult<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = serialize_inbound(msg)?;
    sink.send(Message::Text(text.into())).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Transport,
            format!("Failed to send {}", msg.kind()),
            e,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use chrono::Utc;
    use serde_json::Value;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    use notifyhub_core::types::UserId;
    use notifyhub_entity::{NewNotification, NotificationType};
    use notifyhub_realtime::message::serializer::serialize_outbound;

    #[derive(Default)]
    struct RecordingAlerter {
        permitted: bool,
        raised: Mutex<Vec<NotificationId>>,
    }

    impl DesktopAlerter for RecordingAlerter {
        fn is_permitted(&self) -> bool {
            self.permitted
        }

        fn raise(&self, notification: &Notification) {
            self.raised.lock().unwrap().push(notification.id);
        }
    }

    fn supervisor(
        alerter: Option<Arc<dyn DesktopAlerter>>,
    ) -> (Supervisor, mpsc::Receiver<ClientEvent>) {
        let config = ClientConfig::new("ws://127.0.0.1:1/ws", UserId::new());
        let (events, rx) = mpsc::channel(16);
        let (_command_tx, commands) = mpsc::channel(1);
        let supervisor = Supervisor {
            shared: Arc::new(Shared {
                cache: Mutex::new(NotificationCache::new(config.cache_limit)),
                connected: AtomicBool::new(false),
            }),
            config,
            events,
            commands,
            visibility: VisibilitySignal::new(true),
            alerter,
            cancel: CancellationToken::new(),
        };
        (supervisor, rx)
    }

    fn note(kind: NotificationType) -> Notification {
        NewNotification::new(UserId::new(), "t", "m", kind).into_notification(Utc::now())
    }

    #[tokio::test]
    async fn test_apply_updates_cache_and_emits() {
        let (sup, mut rx) = supervisor(None);
        let a = note(NotificationType::GeneralInfo);

        sup.apply(OutboundMessage::InitialNotifications {
            notifications: vec![a.clone()],
            unread_count: 1,
        })
        .await;
        sup.apply(OutboundMessage::NewNotifications {
            notifications: vec![a.clone()],
        })
        .await;
        sup.apply(OutboundMessage::NotificationMarkedRead {
            notification_id: a.id,
        })
        .await;
        sup.apply(OutboundMessage::UnreadCount { unread_count: 0 })
            .await;

        assert!(matches!(rx.recv().await, Some(ClientEvent::Snapshot { unread_count: 1, .. })));
        // Redelivery of a cached item is not re-announced.
        assert_eq!(rx.recv().await, Some(ClientEvent::MarkedRead(a.id)));
        assert_eq!(rx.recv().await, Some(ClientEvent::UnreadCount(0)));

        let cache = sup.shared.cache().clone();
        assert!(cache.get(&a.id).unwrap().is_read);
        assert_eq!(cache.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_priority_alerts_need_permission() {
        let denied = Arc::new(RecordingAlerter::default());
        let (sup, mut rx) = supervisor(Some(denied.clone()));
        let reminder = note(NotificationType::CalibrationReminder);
        sup.apply(OutboundMessage::PriorityNotifications {
            notifications: vec![reminder.clone()],
        })
        .await;
        assert_eq!(
            rx.recv().await,
            Some(ClientEvent::PriorityAlert(vec![reminder.clone()]))
        );
        assert!(denied.raised.lock().unwrap().is_empty());

        let granted = Arc::new(RecordingAlerter {
            permitted: true,
            ..Default::default()
        });
        let (sup, _rx) = supervisor(Some(granted.clone()));
        sup.apply(OutboundMessage::PriorityNotifications {
            notifications: vec![reminder.clone()],
        })
        .await;
        sup.apply(OutboundMessage::PriorityNotifications {
            notifications: vec![reminder.clone()],
        })
        .await;
        assert_eq!(*granted.raised.lock().unwrap(), vec![reminder.id]);
    }

    async fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{addr}/ws")
    }

    #[tokio::test]
    async fn test_unreachable_hub_backs_off_until_disconnect() {
        let mut config = ClientConfig::new(closed_port_url().await, UserId::new());
        config.base_reconnect_delay_ms = 10;
        config.max_reconnect_delay_ms = 12;
        let (agent, mut rx) = ClientAgent::connect(config, VisibilitySignal::default()).unwrap();

        let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(
            first,
            Some(ClientEvent::Reconnecting {
                attempt: 1,
                delay: Duration::from_millis(10)
            })
        );
        let second = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(
            second,
            Some(ClientEvent::Reconnecting {
                attempt: 2,
                delay: Duration::from_millis(12)
            })
        );

        assert!(!agent.is_connected());
        assert!(agent.refresh().await.is_err());
        agent.disconnect().await;
        agent.disconnect().await;
    }

    #[tokio::test]
    async fn test_no_auto_reconnect_reports_failure_once() {
        let mut config = ClientConfig::new(closed_port_url().await, UserId::new());
        config.auto_reconnect = false;
        let (agent, mut rx) = ClientAgent::connect(config, VisibilitySignal::default()).unwrap();

        let event = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert!(matches!(event, Some(ClientEvent::Disconnected { .. })));
        agent.disconnect().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_session_registers_then_reports_visibility() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let mut seen: Vec<Value> = Vec::new();
            while seen.len() < 4 {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        seen.push(serde_json::from_str(text.as_str()).unwrap());
                    }
                    Some(Ok(_)) => continue,
                    _ => break,
                }
                if seen.len() == 2 {
                    let snapshot = OutboundMessage::InitialNotifications {
                        notifications: Vec::new(),
                        unread_count: 0,
                    };
                    let text = serialize_outbound(&snapshot).unwrap();
                    ws.send(Message::Text(text.into())).await.unwrap();
                }
            }
            seen
        });

        let user = UserId::new();
        let signal = VisibilitySignal::new(true);
        let config = ClientConfig::new(format!("ws://{addr}/ws"), user);
        let (agent, mut rx) = ClientAgent::connect(config, signal.clone()).unwrap();

        let wait = Duration::from_secs(5);
        assert_eq!(timeout(wait, rx.recv()).await.unwrap(), Some(ClientEvent::Connected));
        assert!(matches!(
            timeout(wait, rx.recv()).await.unwrap(),
            Some(ClientEvent::Snapshot { unread_count: 0, .. })
        ));
        assert!(agent.is_connected());

        signal.set_visible(false);
        let seen = timeout(wait, server).await.unwrap().unwrap();
        let types: Vec<_> = seen.iter().map(|v| v["type"].as_str().unwrap()).collect();
        assert_eq!(
            types,
            vec!["register", "set_priority", "visibility_change", "set_priority"]
        );
        assert_eq!(seen[0]["userId"], user.to_string());
        assert_eq!(seen[1]["priority"], 7);
        assert_eq!(seen[2]["isVisible"], false);
        assert_eq!(seen[3]["priority"], 3);

        agent.disconnect().await;
        assert!(!agent.is_connected());
    }
}
