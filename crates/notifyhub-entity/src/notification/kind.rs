//! Notification type enumeration.

use std::fmt;
use std::str::FromStr;

use notifyhub_core::AppError;
use serde::{Deserialize, Serialize};

/// What kind of workflow event produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// A new equipment rental was requested.
    RentalRequest,
    /// A rental was approved, rejected, or returned.
    RentalStatusChange,
    /// A rental is about to become due.
    RentalDueReminder,
    /// An instrument is due for calibration.
    CalibrationReminder,
    /// A calibration was completed or changed state.
    CalibrationStatusChange,
    /// Scheduled maintenance is coming up.
    MaintenanceReminder,
    /// An inventory check is scheduled.
    InventorySchedule,
    /// Vendor information changed.
    VendorInfo,
    /// Anything else.
    GeneralInfo,
}

impl NotificationType {
    /// All types, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::RentalRequest,
        Self::RentalStatusChange,
        Self::RentalDueReminder,
        Self::CalibrationReminder,
        Self::CalibrationStatusChange,
        Self::MaintenanceReminder,
        Self::InventorySchedule,
        Self::VendorInfo,
        Self::GeneralInfo,
    ];

    /// Reminder categories that warrant an escalated, system-level alert.
    pub fn is_priority(&self) -> bool {
        matches!(
            self,
            Self::RentalDueReminder | Self::CalibrationReminder | Self::MaintenanceReminder
        )
    }

    /// Return the type as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RentalRequest => "rental_request",
            Self::RentalStatusChange => "rental_status_change",
            Self::RentalDueReminder => "rental_due_reminder",
            Self::CalibrationReminder => "calibration_reminder",
            Self::CalibrationStatusChange => "calibration_status_change",
            Self::MaintenanceReminder => "maintenance_reminder",
            Self::InventorySchedule => "inventory_schedule",
            Self::VendorInfo => "vendor_info",
            Self::GeneralInfo => "general_info",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| AppError::validation(format!("Invalid notification type: '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_reminders_escalate() {
        let escalated: Vec<_> = NotificationType::ALL
            .into_iter()
            .filter(NotificationType::is_priority)
            .collect();
        assert_eq!(
            escalated,
            vec![
                NotificationType::RentalDueReminder,
                NotificationType::CalibrationReminder,
                NotificationType::MaintenanceReminder,
            ]
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "CALIBRATION_REMINDER".parse::<NotificationType>().unwrap(),
            NotificationType::CalibrationReminder
        );
        assert!("birthday".parse::<NotificationType>().is_err());
    }
}
