//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use notifyhub_entity::Notification;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// One notification as a table row.
#[derive(Debug, Serialize, Tabled)]
pub struct NotificationRow {
    /// Notification id
    pub id: String,
    /// Recipient
    pub user: String,
    /// Category
    #[tabled(rename = "type")]
    pub kind: String,
    /// Title
    pub title: String,
    /// Read flag
    pub read: bool,
    /// Creation time
    pub created: String,
}

impl From<&Notification> for NotificationRow {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.to_string(),
            user: n.user_id.to_string(),
            kind: n.kind.to_string(),
            title: n.title.clone(),
            read: n.is_read,
            created: n.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Print notifications in the selected format
pub fn print_notifications(items: &[Notification], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No notifications.");
            } else {
                let rows: Vec<NotificationRow> = items.iter().map(NotificationRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Json => print_json(&items),
    }
}

/// Print a single item in the selected format
pub fn print_item<T: Serialize + std::fmt::Debug>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{item:#?}"),
        OutputFormat::Json => print_json(item),
    }
}

fn print_json<T: Serialize + ?Sized>(item: &T) {
    let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string());
    println!("{json}");
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{key}:"), value);
}
