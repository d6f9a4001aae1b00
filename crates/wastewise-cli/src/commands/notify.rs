use chrono::{DateTime, Utc};
use clap::Subcommand;
use wastewise_core::{NotificationConfig, NotificationPayload, Recurrence, ScheduledNotification};

use crate::platform::open_engine;

#[derive(Subcommand)]
pub enum NotifyAction {
    /// List scheduled notifications
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Schedule a notification (replaces one with the same id)
    Schedule {
        /// Notification id
        id: String,
        /// Title
        #[arg(long)]
        title: String,
        /// Body text
        #[arg(long)]
        body: String,
        /// When to fire (RFC 3339, e.g. 2026-10-20T09:00:00+02:00)
        #[arg(long)]
        at: String,
        /// Repeat: none, daily or weekly
        #[arg(long, default_value = "none")]
        recurring: String,
        /// Optional tag (defaults to the id)
        #[arg(long)]
        tag: Option<String>,
    },
    /// Cancel a scheduled notification
    Cancel {
        /// Notification id
        id: String,
    },
    /// Fire everything that is due now
    Tick,
    /// Evaluate engagement milestones and fire new ones
    Engage,
    /// Run the scheduler until Ctrl-C
    Run,
}

pub async fn run(action: NotifyAction) -> Result<(), Box<dyn std::error::Error>> {
    let (_db, manager) = open_engine()?;

    match action {
        NotifyAction::List { json } => {
            let entries = manager.scheduled_notifications().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No notifications scheduled.");
            } else {
                for entry in entries {
                    println!(
                        "{:<20} {:<8} {}  {}",
                        entry.config.id,
                        entry.recurring.to_string(),
                        entry.scheduled_for.to_rfc3339(),
                        entry.config.title
                    );
                }
            }
        }
        NotifyAction::Schedule {
            id,
            title,
            body,
            at,
            recurring,
            tag,
        } => {
            let scheduled_for = DateTime::parse_from_rfc3339(&at)
                .map_err(|e| format!("invalid --at '{at}': {e}"))?
                .with_timezone(&Utc);
            let recurring: Recurrence = recurring.parse()?;

            let mut config = NotificationConfig::new(id, title, body)
                .with_data(NotificationPayload::Custom {
                    label: "cli".to_string(),
                });
            if let Some(tag) = tag {
                config = config.with_tag(tag);
            }
            let icon = &manager.config().notifications.icon;
            if !icon.is_empty() {
                config = config.with_icon(icon.clone());
            }

            let entry = ScheduledNotification::new(config, scheduled_for, recurring);
            let id = entry.id().to_string();
            manager.schedule_notification(entry).await?;
            println!("Scheduled: {id} at {}", scheduled_for.to_rfc3339());
        }
        NotifyAction::Cancel { id } => {
            if manager.cancel_notification(&id).await? {
                println!("Cancelled: {id}");
            } else {
                return Err(format!("no scheduled notification with id '{id}'").into());
            }
        }
        NotifyAction::Tick => {
            let outcomes = manager.run_due(Utc::now()).await;
            let delivered = outcomes.iter().filter(|o| o.delivered()).count();
            println!("{} due, {delivered} delivered", outcomes.len());
        }
        NotifyAction::Engage => {
            let fired = manager.schedule_engagement_notifications().await;
            if fired.is_empty() {
                println!("No new milestones.");
            }
            for (milestone, outcome) in fired {
                println!("{milestone}: {outcome:?}");
            }
        }
        NotifyAction::Run => {
            manager.init().await;
            println!(
                "Scheduler running (every {}s). Press Ctrl-C to stop.",
                manager.config().notifications.tick_interval_secs
            );
            tokio::signal::ctrl_c().await?;
            manager.shutdown();
            println!("Stopped.");
        }
    }
    Ok(())
}
