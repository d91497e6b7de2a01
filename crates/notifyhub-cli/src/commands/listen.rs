//! Run a client agent against a hub and print what it reports.

use std::sync::Arc;

use clap::Args;

use notifyhub_client::{
    ClientAgent, ClientConfig, ClientEvent, DesktopAlerter, TracingAlerter, VisibilitySignal,
};
use notifyhub_core::error::AppError;
use notifyhub_core::types::UserId;
use notifyhub_entity::UserRole;

use crate::output;

/// Arguments for `listen`
#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Hub WebSocket URL
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
    pub url: String,
    /// User id to register as
    #[arg(short, long)]
    pub user: UserId,
    /// Role to register with
    #[arg(short, long)]
    pub role: Option<UserRole>,
    /// Report the client as hidden (lower priority)
    #[arg(long)]
    pub hidden: bool,
    /// Log priority notifications as desktop alerts
    #[arg(long)]
    pub alerts: bool,
    /// Do not reconnect after the connection drops
    #[arg(long)]
    pub no_reconnect: bool,
}

/// Listen until Ctrl+C
pub async fn execute(args: &ListenArgs) -> Result<(), AppError> {
    let mut config = ClientConfig::new(&args.url, args.user);
    config.role = args.role;
    config.auto_reconnect = !args.no_reconnect;

    let alerter: Option<Arc<dyn DesktopAlerter>> = if args.alerts {
        Some(Arc::new(TracingAlerter))
    } else {
        None
    };
    let visibility = VisibilitySignal::new(!args.hidden);
    let (agent, mut events) = ClientAgent::connect_with_alerter(config, visibility, alerter)?;

    println!("Listening on {} as {} (Ctrl+C to stop)", args.url, args.user);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                let stop = args.no_reconnect && matches!(event, ClientEvent::Disconnected { .. });
                print_event(&event);
                if stop {
                    break;
                }
            }
        }
    }

    agent.disconnect().await;
    let cache = agent.cache();
    output::print_success(&format!(
        "Stopped; {} cached notification(s), {} unread",
        cache.len(),
        cache.unread_count()
    ));
    Ok(())
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::Connected => println!("[connected]"),
        ClientEvent::Disconnected { reason } => println!("[disconnected] {reason}"),
        ClientEvent::Reconnecting { attempt, delay } => {
            println!("[reconnecting] attempt {attempt} in {}ms", delay.as_millis());
        }
        ClientEvent::Snapshot {
            notifications,
            unread_count,
        } => {
            println!(
                "[snapshot] {} notification(s), {unread_count} unread",
                notifications.len()
            );
            for n in notifications {
                println!("  {} {} {}", n.created_at.format("%H:%M:%S"), n.kind, n.title);
            }
        }
        ClientEvent::NewNotifications(items) => {
            for n in items {
                println!("[new] {} {}: {}", n.kind, n.title, n.message);
            }
        }
        ClientEvent::PriorityAlert(items) => {
            for n in items {
                println!("[ALERT] {} {}", n.kind, n.title);
            }
        }
        ClientEvent::UnreadCount(count) => println!("[unread] {count}"),
        ClientEvent::MarkedRead(id) => println!("[read] {id}"),
        ClientEvent::AllMarkedRead => println!("[read] all"),
        ClientEvent::FocusRequested { notification_id } => println!("[focus] {notification_id}"),
        ClientEvent::ServerError { code, message } => println!("[error] {code}: {message}"),
    }
}
