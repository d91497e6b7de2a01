//! Protocol and delivery tests against a running hub.

mod helpers;

use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use notifyhub_core::config::RealtimeConfig;
use notifyhub_core::types::UserId;
use notifyhub_database::NotificationStore;
use notifyhub_entity::{NewNotification, NotificationType};

use helpers::{TestHub, eventually};

#[tokio::test]
async fn test_register_returns_snapshot() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    hub.seed(user, NotificationType::VendorInfo, "Vendor updated");
    hub.seed(user, NotificationType::RentalDueReminder, "Rental due");
    hub.seed(UserId::new(), NotificationType::GeneralInfo, "Someone else");

    let mut tab = hub.raw_client().await;
    let snapshot = tab.register(user).await;

    assert_eq!(snapshot["notifications"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot["unreadCount"], 2);
    assert_eq!(hub.engine.stats().users, 1);
}

#[tokio::test]
async fn test_intents_before_register_are_rejected() {
    let hub = TestHub::start().await;
    let mut tab = hub.raw_client().await;

    tab.send(json!({ "type": "register" })).await;
    let err = tab.recv_type("error").await;
    assert_eq!(err["code"], "VALIDATION");

    tab.send(json!({ "type": "refresh_notifications" })).await;
    let err = tab.recv_type("error").await;
    assert_eq!(err["code"], "VALIDATION");

    // Still usable afterwards.
    let snapshot = tab.register(UserId::new()).await;
    assert_eq!(snapshot["unreadCount"], 0);
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let hub = TestHub::start().await;
    let mut tab = hub.raw_client().await;

    tab.send_text("not json at all").await;
    assert_eq!(tab.recv_type("error").await["code"], "INVALID_MESSAGE");

    tab.send(json!({ "type": "launch_rockets" })).await;
    assert_eq!(tab.recv_type("error").await["code"], "INVALID_MESSAGE");

    tab.register(UserId::new()).await;
}

#[tokio::test]
async fn test_created_notification_is_pushed_to_connected_tab() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    let mut tab = hub.raw_client().await;
    tab.register(user).await;

    let created = hub
        .notify(user, NotificationType::CalibrationReminder, "Calibrate scope")
        .await;

    let batch = tab.recv_type("new_notifications").await;
    let items = batch["notifications"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], json!(created.id));
    assert_eq!(items[0]["type"], "calibration_reminder");

    let alert = tab.next().await.unwrap();
    assert_eq!(alert["type"], "priority_notifications");
    assert_eq!(alert["notifications"][0]["id"], json!(created.id));

    let count = tab.next().await.unwrap();
    assert_eq!(count, json!({ "type": "unread_count", "unreadCount": 1 }));
}

#[tokio::test]
async fn test_refresh_delivers_each_notification_once() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    let mut tab = hub.raw_client().await;
    tab.register(user).await;

    hub.store.insert(
        NewNotification::new(user, "Inventory", "Count shelf B", NotificationType::InventorySchedule)
            .into_notification(Utc::now()),
    );

    tab.send(json!({ "type": "refresh_notifications" })).await;
    let first = tab.next().await.unwrap();
    assert_eq!(first["type"], "new_notifications");
    assert_eq!(first["notifications"].as_array().unwrap().len(), 1);
    assert_eq!(tab.next().await.unwrap()["type"], "unread_count");

    // Nothing new: only the count comes back.
    tab.send(json!({ "type": "refresh_notifications" })).await;
    let second = tab.next().await.unwrap();
    assert_eq!(second, json!({ "type": "unread_count", "unreadCount": 1 }));
}

#[tokio::test]
async fn test_mark_all_read_reaches_every_tab() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    for i in 0..5 {
        hub.seed(user, NotificationType::GeneralInfo, &format!("Info {i}"));
    }

    let mut first = hub.raw_client().await;
    let mut second = hub.raw_client().await;
    assert_eq!(first.register(user).await["unreadCount"], 5);
    assert_eq!(second.register(user).await["unreadCount"], 5);

    first.send(json!({ "type": "mark_all_read" })).await;

    for tab in [&mut first, &mut second] {
        tab.recv_type("all_notifications_marked_read").await;
        let count = tab.recv_type("unread_count").await;
        assert_eq!(count["unreadCount"], 0);
    }
    assert_eq!(hub.store.count_unread(user).await.unwrap(), 0);
}

#[tokio::test]
async fn test_mark_as_read_fans_out_to_every_tab() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    let target = hub.seed(user, NotificationType::MaintenanceReminder, "Service pump");
    hub.seed(user, NotificationType::GeneralInfo, "Other");

    let mut first = hub.raw_client().await;
    let mut second = hub.raw_client().await;
    first.register(user).await;
    second.register(user).await;

    second
        .send(json!({ "type": "mark_as_read", "notificationId": target.id }))
        .await;

    for tab in [&mut first, &mut second] {
        let marked = tab.recv_type("notification_marked_read").await;
        assert_eq!(marked["notificationId"], json!(target.id));
        assert_eq!(tab.recv_type("unread_count").await["unreadCount"], 1);
    }
}

#[tokio::test]
async fn test_mark_as_read_is_idempotent_and_scoped_to_user() {
    let hub = TestHub::start().await;
    let owner = UserId::new();
    let foreign = hub.seed(owner, NotificationType::GeneralInfo, "Not yours");
    let user = UserId::new();
    let own = hub.seed(user, NotificationType::GeneralInfo, "Yours");

    let mut tab = hub.raw_client().await;
    tab.register(user).await;

    for _ in 0..2 {
        tab.send(json!({ "type": "mark_as_read", "notificationId": own.id }))
            .await;
        tab.recv_type("notification_marked_read").await;
        assert_eq!(tab.recv_type("unread_count").await["unreadCount"], 0);
    }

    tab.send(json!({ "type": "mark_as_read", "notificationId": foreign.id }))
        .await;
    tab.recv_type("notification_marked_read").await;
    tab.recv_type("unread_count").await;
    assert_eq!(hub.store.count_unread(owner).await.unwrap(), 1);
}

#[tokio::test]
async fn test_base_sweep_skips_hidden_tabs_until_visible_again() {
    let hub = TestHub::start().await;
    let user = UserId::new();
    let mut visible = hub.raw_client().await;
    let mut hidden = hub.raw_client().await;
    visible.register(user).await;
    hidden.register(user).await;

    hidden
        .send(json!({ "type": "visibility_change", "isVisible": false }))
        .await;
    eventually(|| hub.engine.registry.active_count() == 1).await;

    hub.store.insert(
        NewNotification::new(user, "Vendor", "New price list", NotificationType::VendorInfo)
            .into_notification(Utc::now()),
    );
    let report = hub.engine.scheduler.base_sweep().await;
    assert_eq!(report.considered, 1);
    assert_eq!(report.delivered, 1);

    visible.recv_type("new_notifications").await;
    hidden.expect_silence(Duration::from_millis(200)).await;

    // Becoming visible triggers an immediate delivery.
    hidden
        .send(json!({ "type": "visibility_change", "isVisible": true }))
        .await;
    let batch = hidden.recv_type("new_notifications").await;
    assert_eq!(batch["notifications"][0]["title"], "Vendor");
}

#[tokio::test]
async fn test_priority_sweep_waits_for_interval() {
    let hub = TestHub::start().await;
    let mut tab = hub.raw_client().await;
    tab.register(UserId::new()).await;

    let now = Utc::now();
    let early = hub.engine.scheduler.priority_sweep_at(now).await;
    assert_eq!(early.considered, 1);
    assert_eq!(early.delivered, 0);
    assert_eq!(early.skipped, 1);

    let late = hub
        .engine
        .scheduler
        .priority_sweep_at(now + chrono::Duration::hours(1))
        .await;
    assert_eq!(late.delivered, 1);
    assert_eq!(tab.recv_type("unread_count").await["unreadCount"], 0);
}

#[tokio::test]
async fn test_per_user_cap_closes_oldest_connection() {
    let hub = TestHub::with_realtime(RealtimeConfig {
        max_connections_per_user: 1,
        ..RealtimeConfig::default()
    })
    .await;
    let user = UserId::new();

    let mut oldest = hub.raw_client().await;
    oldest.register(user).await;
    let mut newest = hub.raw_client().await;
    newest.register(user).await;

    while oldest.next().await.is_some() {}
    eventually(|| hub.engine.registry.connection_count() == 1).await;

    hub.notify(user, NotificationType::GeneralInfo, "Still here").await;
    newest.recv_type("new_notifications").await;
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let hub = TestHub::start().await;
    let mut tab = hub.raw_client().await;
    tab.register(UserId::new()).await;

    hub.engine.shutdown();

    while tab.next().await.is_some() {}
    eventually(|| hub.engine.registry.connection_count() == 0).await;
}
