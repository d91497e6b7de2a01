//! Client agent tests against a running hub.

mod helpers;

use std::sync::{Arc, Mutex};

use notifyhub_client::{ClientAgent, ClientConfig, ClientEvent, DesktopAlerter, VisibilitySignal};
use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_entity::{Notification, NotificationType};

use helpers::{TestHub, eventually, next_event};

#[derive(Default)]
struct RecordingAlerter {
    raised: Mutex<Vec<NotificationId>>,
}

impl DesktopAlerter for RecordingAlerter {
    fn is_permitted(&self) -> bool {
        true
    }

    fn raise(&self, notification: &Notification) {
        self.raised.lock().unwrap().push(notification.id);
    }
}

fn config(hub: &TestHub, user: UserId) -> ClientConfig {
    let mut config = ClientConfig::new(hub.ws_url(), user);
    config.base_reconnect_delay_ms = 50;
    config.max_reconnect_delay_ms = 200;
    config
}

async fn connected_agent(
    hub: &TestHub,
    user: UserId,
) -> (ClientAgent, tokio::sync::mpsc::Receiver<ClientEvent>) {
    let (agent, mut events) =
        ClientAgent::connect(config(hub, user), VisibilitySignal::default()).unwrap();
    next_event(&mut events, |e| matches!(e, ClientEvent::Snapshot { .. })).await;
    (agent, events)
}

#[tokio::test]
async fn test_agent_caches_snapshot_and_new_notifications() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    hub.seed(user, NotificationType::VendorInfo, "Vendor updated");

    let (agent, mut events) =
        ClientAgent::connect(config(&hub, user), VisibilitySignal::default()).unwrap();
    next_event(&mut events, |e| matches!(e, ClientEvent::Connected)).await;
    let snapshot = next_event(&mut events, |e| matches!(e, ClientEvent::Snapshot { .. })).await;
    assert!(matches!(snapshot, ClientEvent::Snapshot { unread_count: 1, .. }));
    assert!(agent.is_connected());

    let created = hub
        .notify(user, NotificationType::InventorySchedule, "Count shelf B")
        .await;
    let event = next_event(&mut events, |e| matches!(e, ClientEvent::NewNotifications(_))).await;
    assert_eq!(event, ClientEvent::NewNotifications(vec![created.clone()]));
    next_event(&mut events, |e| *e == ClientEvent::UnreadCount(2)).await;

    let cache = agent.cache();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.notifications()[0].id, created.id);
    assert_eq!(cache.unread_count(), 2);

    agent.disconnect().await;
}

#[tokio::test]
async fn test_mark_all_read_updates_every_agent() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    for i in 0..5 {
        hub.seed(user, NotificationType::GeneralInfo, &format!("Info {i}"));
    }

    let (first, mut first_events) = connected_agent(&hub, user).await;
    let (second, mut second_events) = connected_agent(&hub, user).await;
    assert_eq!(first.cache().unread_count(), 5);

    first.mark_all_read().await.unwrap();

    for events in [&mut first_events, &mut second_events] {
        next_event(events, |e| *e == ClientEvent::AllMarkedRead).await;
        next_event(events, |e| *e == ClientEvent::UnreadCount(0)).await;
    }
    for agent in [&first, &second] {
        let cache = agent.cache();
        assert_eq!(cache.unread_count(), 0);
        assert_eq!(cache.len(), 5);
        assert!(cache.notifications().iter().all(|n| n.is_read));
    }

    first.disconnect().await;
    second.disconnect().await;
}

#[tokio::test]
async fn test_priority_alert_click_focuses_and_marks_read() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    let alerter = Arc::new(RecordingAlerter::default());

    let (agent, mut events) = ClientAgent::connect_with_alerter(
        config(&hub, user),
        VisibilitySignal::default(),
        Some(alerter.clone()),
    )
    .unwrap();
    next_event(&mut events, |e| matches!(e, ClientEvent::Snapshot { .. })).await;

    let reminder = hub
        .notify(user, NotificationType::RentalDueReminder, "Return oscilloscope")
        .await;
    let alert = next_event(&mut events, |e| matches!(e, ClientEvent::PriorityAlert(_))).await;
    assert_eq!(alert, ClientEvent::PriorityAlert(vec![reminder.clone()]));
    assert_eq!(*alerter.raised.lock().unwrap(), vec![reminder.id]);

    agent.alert_clicked(reminder.id).await.unwrap();
    next_event(&mut events, |e| {
        *e == ClientEvent::FocusRequested {
            notification_id: reminder.id,
        }
    })
    .await;
    next_event(&mut events, |e| *e == ClientEvent::MarkedRead(reminder.id)).await;
    next_event(&mut events, |e| *e == ClientEvent::UnreadCount(0)).await;

    assert!(agent.cache().get(&reminder.id).unwrap().is_read);
    agent.disconnect().await;
}

#[tokio::test]
async fn test_visibility_changes_reach_the_registry() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    let visibility = VisibilitySignal::new(true);

    let (agent, mut events) = ClientAgent::connect(config(&hub, user), visibility.clone()).unwrap();
    next_event(&mut events, |e| matches!(e, ClientEvent::Snapshot { .. })).await;
    eventually(|| {
        hub.engine
            .registry
            .list_all()
            .first()
            .is_some_and(|r| r.is_active() && r.priority() == 7)
    })
    .await;

    visibility.set_visible(false);
    eventually(|| {
        hub.engine
            .registry
            .list_all()
            .first()
            .is_some_and(|r| !r.is_active() && r.priority() == 3)
    })
    .await;

    visibility.set_visible(true);
    eventually(|| hub.engine.registry.active_count() == 1).await;

    agent.disconnect().await;
}

#[tokio::test]
async fn test_agent_reconnects_after_hub_closes_connection() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    let (agent, mut events) = connected_agent(&hub, user).await;

    hub.engine.shutdown();

    next_event(&mut events, |e| matches!(e, ClientEvent::Disconnected { .. })).await;
    let event = next_event(&mut events, |e| matches!(e, ClientEvent::Reconnecting { .. })).await;
    assert!(matches!(event, ClientEvent::Reconnecting { attempt: 1, .. }));

    agent.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    let (agent, _events) = connected_agent(&hub, user).await;
    eventually(|| hub.engine.registry.connection_count() == 1).await;

    agent.disconnect().await;
    agent.disconnect().await;

    assert!(!agent.is_connected());
    assert!(agent.refresh().await.is_err());
    eventually(|| hub.engine.registry.connection_count() == 0).await;
}
