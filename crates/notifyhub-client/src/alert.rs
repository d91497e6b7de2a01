//! Desktop alert escalation for priority notifications.

use tracing::info;

use notifyhub_entity::Notification;

/// System-level alert surface provided by the host.
///
/// When an alert is clicked the host calls
/// [`ClientAgent::alert_clicked`](crate::ClientAgent::alert_clicked).
pub trait DesktopAlerter: Send + Sync + 'static {
    /// Whether the host granted permission to raise alerts.
    fn is_permitted(&self) -> bool;

    /// Show an alert for one notification.
    fn raise(&self, notification: &Notification);
}

/// Alerter that writes alerts to the log; used by headless listeners.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlerter;

impl DesktopAlerter for TracingAlerter {
    fn is_permitted(&self) -> bool {
        true
    }

    fn raise(&self, notification: &Notification) {
        info!(
            notification_id = %notification.id,
            kind = %notification.kind,
            title = %notification.title,
            "Priority alert"
        );
    }
}
