//! Notification data model.
//!
//! `ScheduledNotification` is the persisted record; its wire form is a
//! camelCase JSON object with `scheduledFor` as an RFC 3339 string.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Which seeded daily reminder a notification belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderSlot {
    Morning,
    Evening,
}

/// Typed payload carried alongside a notification, one variant per kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NotificationPayload {
    #[default]
    None,
    Reminder {
        slot: ReminderSlot,
    },
    Milestone {
        milestone: String,
    },
    Streak {
        milestone: String,
        days: u32,
    },
    /// Ad-hoc entry scheduled by the host.
    Custom {
        label: String,
    },
}

/// A notification ready to be shown. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Dedupe key for the platform service. Falls back to `id` when empty.
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub data: NotificationPayload,
    #[serde(default = "default_requires_permission")]
    pub requires_permission: bool,
}

fn default_requires_permission() -> bool {
    true
}

impl NotificationConfig {
    /// New config tagged with its own id and requiring permission.
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            tag: id.clone(),
            id,
            title: title.into(),
            body: body.into(),
            icon: None,
            data: NotificationPayload::None,
            requires_permission: true,
        }
    }

    pub fn with_icon(self, icon: impl Into<String>) -> Self {
        Self {
            icon: Some(icon.into()),
            ..self
        }
    }

    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..self
        }
    }

    pub fn with_data(self, data: NotificationPayload) -> Self {
        Self { data, ..self }
    }

    pub fn with_requires_permission(self, requires_permission: bool) -> Self {
        Self {
            requires_permission,
            ..self
        }
    }

    /// Tag handed to the platform for deduplication.
    pub fn effective_tag(&self) -> &str {
        if self.tag.is_empty() {
            &self.id
        } else {
            &self.tag
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "title".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// How a scheduled notification re-arms after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
}

impl Recurrence {
    /// Re-arm period, `None` for one-shot entries.
    pub fn period(self) -> Option<Duration> {
        match self {
            Recurrence::None => None,
            Recurrence::Daily => Some(Duration::days(1)),
            Recurrence::Weekly => Some(Duration::weeks(1)),
        }
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Recurrence {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "once" => Ok(Recurrence::None),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            other => Err(ValidationError::InvalidValue {
                field: "recurring".into(),
                message: format!("expected none, daily or weekly, got '{other}'"),
            }),
        }
    }
}

/// A notification anchored to an absolute time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNotification {
    #[serde(flatten)]
    pub config: NotificationConfig,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub recurring: Recurrence,
}

impl ScheduledNotification {
    pub fn new(config: NotificationConfig, scheduled_for: DateTime<Utc>, recurring: Recurrence) -> Self {
        Self {
            config,
            scheduled_for,
            recurring,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.scheduled_for
    }
}

/// One row of the external activity log. Only the timestamp matters here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp }
    }
}
