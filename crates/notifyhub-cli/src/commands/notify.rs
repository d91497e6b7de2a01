//! Notification creation commands.

use clap::Args;

use notifyhub_core::error::AppError;
use notifyhub_core::types::UserId;
use notifyhub_entity::{NewNotification, NotificationType, UserRole};

use super::Cli;
use crate::output;

/// Arguments for `send`
#[derive(Debug, Args)]
pub struct SendArgs {
    /// Recipient user id
    #[arg(short, long)]
    pub user: UserId,
    /// Title
    #[arg(short, long)]
    pub title: String,
    /// Message body
    #[arg(short, long)]
    pub message: String,
    /// Notification type, e.g. rental_request, calibration_reminder
    #[arg(short = 'k', long = "type", default_value = "general_info")]
    pub kind: NotificationType,
    /// Id of the originating entity
    #[arg(short, long)]
    pub related: Option<String>,
}

/// Arguments for `notify-role`
#[derive(Debug, Args)]
pub struct NotifyRoleArgs {
    /// Role: admin, manager, technician, user
    pub role: UserRole,
    /// Title
    #[arg(short, long)]
    pub title: String,
    /// Message body
    #[arg(short, long)]
    pub message: String,
    /// Notification type
    #[arg(short = 'k', long = "type", default_value = "general_info")]
    pub kind: NotificationType,
    /// Id of the originating entity
    #[arg(short, long)]
    pub related: Option<String>,
}

/// Create a notification for one user
pub async fn send(args: &SendArgs, cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let service = super::create_service(&config).await?;

    let mut input = NewNotification::new(args.user, &args.title, &args.message, args.kind);
    if let Some(related) = &args.related {
        input = input.related_to(related);
    }
    let notification = service.create_notification(input).await?;

    output::print_success("Notification stored");
    output::print_notifications(std::slice::from_ref(&notification), cli.format);
    Ok(())
}

/// Create a notification for every user holding a role
pub async fn notify_role(args: &NotifyRoleArgs, cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let service = super::create_service(&config).await?;

    let created = service
        .notify_role(
            args.role,
            &args.title,
            &args.message,
            args.kind,
            args.related.as_deref(),
        )
        .await?;

    output::print_success(&format!(
        "{} notification(s) stored for role '{}'",
        created.len(),
        args.role
    ));
    output::print_notifications(&created, cli.format);
    Ok(())
}
