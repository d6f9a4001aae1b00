//! TOML-based engine configuration.
//!
//! Stores:
//! - Notification delivery settings (tick cadence, icon, badge)
//! - Default reminder times
//! - Engagement thresholds
//!
//! Configuration is stored at `~/.config/wastewise/config.toml`.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::{ConfigError, CoreError, Result};

/// Notification delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between scheduler evaluation passes.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_icon")]
    pub icon: String,
    /// Badge shown by the background channel only.
    #[serde(default = "default_badge")]
    pub badge: String,
}

/// Wall-clock times (local, `HH:MM`) for the seeded daily reminders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_morning_time")]
    pub morning_time: String,
    #[serde(default = "default_evening_time")]
    pub evening_time: String,
}

/// Engagement rule thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Credits equivalent to one tree.
    #[serde(default = "default_tree_credits")]
    pub tree_credits: f64,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/wastewise/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub engagement: EngagementConfig,
}

fn default_true() -> bool {
    true
}
fn default_tick_interval_secs() -> u64 {
    60
}
fn default_icon() -> String {
    "/icons/icon-192x192.png".into()
}
fn default_badge() -> String {
    "/icons/badge-72x72.png".into()
}
fn default_morning_time() -> String {
    "09:00".into()
}
fn default_evening_time() -> String {
    "20:00".into()
}
fn default_tree_credits() -> f64 {
    500.0
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: default_tick_interval_secs(),
            icon: default_icon(),
            badge: default_badge(),
        }
    }
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            morning_time: default_morning_time(),
            evening_time: default_evening_time(),
        }
    }
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            tree_credits: default_tree_credits(),
        }
    }
}

impl RemindersConfig {
    pub fn morning(&self) -> Result<NaiveTime, ConfigError> {
        parse_time("reminders.morning_time", &self.morning_time)
    }

    pub fn evening(&self) -> Result<NaiveTime, ConfigError> {
        parse_time("reminders.evening_time", &self.evening_time)
    }
}

fn parse_time(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected HH:MM, got '{value}': {e}"),
    })
}

impl EngineConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                CoreError::Config(ConfigError::LoadFailed {
                    path,
                    message: e.to_string(),
                })
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("falling back to default config: {e}");
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key and persist it.
    ///
    /// The new value is validated before anything is written.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: EngineConfig = serde_json::from_value(json)?;
        updated.validate()?;
        *self = updated;
        self.save()
    }

    /// Check values that serde alone cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reminders.morning()?;
        self.reminders.evening()?;
        if self.notifications.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "notifications.tick_interval_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        let tree_credits = self.engagement.tree_credits;
        if tree_credits.is_nan() || tree_credits <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "engagement.tree_credits".into(),
                message: "must be positive".into(),
            });
        }
        Ok(())
    }
}
