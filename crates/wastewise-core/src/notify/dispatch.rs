//! Notification delivery through the best available channel.
//!
//! Channels are tried in preference order: the background channel (can
//! display while the app is not in the foreground), then the foreground
//! channel. A channel that fails is skipped once; if nothing can show the
//! notification the dispatch is a no-op. Nothing here returns an error.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::permission::PermissionGate;
use super::types::NotificationConfig;
use crate::error::PlatformError;

/// What a delivery channel is asked to display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Only set for the background channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Notice {
    fn from_config(config: &NotificationConfig, badge: Option<&str>) -> Self {
        Self {
            title: config.title.clone(),
            body: config.body.clone(),
            icon: config.icon.clone(),
            badge: badge.map(str::to_string),
            tag: Some(config.effective_tag().to_string()),
            data: serde_json::to_value(&config.data).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// A platform mechanism that can display a notification.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the platform supports this channel right now.
    fn is_available(&self) -> bool {
        true
    }

    async fn show(&self, notice: &Notice) -> Result<(), PlatformError>;
}

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Background,
    Foreground,
    /// Permission was required and not granted.
    PermissionDenied,
    /// No channel could show the notification.
    Unsupported,
}

impl DispatchOutcome {
    pub fn delivered(self) -> bool {
        matches!(self, DispatchOutcome::Background | DispatchOutcome::Foreground)
    }
}

pub struct Dispatcher {
    gate: Arc<PermissionGate>,
    background: Option<Arc<dyn DeliveryChannel>>,
    foreground: Option<Arc<dyn DeliveryChannel>>,
    badge: Option<String>,
}

impl Dispatcher {
    pub fn new(
        gate: Arc<PermissionGate>,
        background: Option<Arc<dyn DeliveryChannel>>,
        foreground: Option<Arc<dyn DeliveryChannel>>,
    ) -> Self {
        Self {
            gate,
            background,
            foreground,
            badge: None,
        }
    }

    /// Badge passed to the background channel.
    pub fn with_badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }

    pub async fn dispatch(&self, config: &NotificationConfig) -> DispatchOutcome {
        if config.requires_permission && !self.gate.has_permission() && !self.gate.request().await {
            tracing::debug!(id = %config.id, "notification skipped, permission not granted");
            return DispatchOutcome::PermissionDenied;
        }

        if let Some(channel) = self.background.as_ref().filter(|c| c.is_available()) {
            let notice = Notice::from_config(config, self.badge.as_deref());
            match channel.show(&notice).await {
                Ok(()) => {
                    tracing::info!(id = %config.id, channel = channel.name(), "notification shown");
                    return DispatchOutcome::Background;
                }
                Err(e) => {
                    tracing::warn!(id = %config.id, channel = channel.name(), "background delivery failed: {e}");
                }
            }
        }

        if let Some(channel) = self.foreground.as_ref().filter(|c| c.is_available()) {
            let notice = Notice::from_config(config, None);
            match channel.show(&notice).await {
                Ok(()) => {
                    tracing::info!(id = %config.id, channel = channel.name(), "notification shown");
                    return DispatchOutcome::Foreground;
                }
                Err(e) => {
                    tracing::warn!(id = %config.id, channel = channel.name(), "foreground delivery failed: {e}");
                }
            }
        }

        tracing::debug!(id = %config.id, "no delivery channel available");
        DispatchOutcome::Unsupported
    }
}
