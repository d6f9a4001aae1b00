//! Durable schedule and fired-milestone storage on top of a key-value store.
//!
//! Loads never fail: a missing or corrupt value reads as "nothing stored
//! yet", and a malformed record inside the schedule list is skipped on its
//! own. Writes replace the whole value.
//!
//! `upsert`/`remove` are load-modify-save with no cross-process lock; two
//! processes sharing one store can lose each other's writes.

use std::sync::Arc;

use super::engagement::FiredMilestoneSet;
use super::types::ScheduledNotification;
use crate::error::Result;
use crate::storage::KeyValueStore;

pub const SCHEDULED_NOTIFICATIONS_KEY: &str = "scheduledNotifications";
pub const FIRED_MILESTONES_KEY: &str = "engagementFiredMilestones";

#[derive(Clone)]
pub struct NotificationStore {
    kv: Arc<dyn KeyValueStore>,
}

impl NotificationStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// All stored entries in stored order, skipping records that fail to decode.
    pub fn load(&self) -> Vec<ScheduledNotification> {
        let raw = match self.kv.get(SCHEDULED_NOTIFICATIONS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("failed to read scheduled notifications: {e}");
                return Vec::new();
            }
        };

        let records: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("scheduled notifications are corrupt, starting empty: {e}");
                return Vec::new();
            }
        };

        let mut entries: Vec<ScheduledNotification> = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<ScheduledNotification>(record) {
                Ok(mut entry) => {
                    if entry.config.id.trim().is_empty() {
                        tracing::warn!(index, "skipping scheduled notification without id");
                        continue;
                    }
                    if entry.config.tag.is_empty() {
                        entry.config.tag = entry.config.id.clone();
                    }
                    // Later duplicates win, keeping ids unique.
                    match entries.iter_mut().find(|e| e.id() == entry.id()) {
                        Some(existing) => *existing = entry,
                        None => entries.push(entry),
                    }
                }
                Err(e) => {
                    tracing::warn!(index, "skipping malformed scheduled notification: {e}");
                }
            }
        }
        entries
    }

    /// Replace the stored schedule with `entries`.
    pub fn save(&self, entries: &[ScheduledNotification]) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        self.kv.set(SCHEDULED_NOTIFICATIONS_KEY, &json)
    }

    /// Insert or overwrite the entry with the same id.
    pub fn upsert(&self, entry: ScheduledNotification) -> Result<()> {
        let mut entries = self.load();
        match entries.iter_mut().find(|e| e.id() == entry.id()) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        self.save(&entries)
    }

    /// Delete the entry with `id`. Returns whether it existed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|e| e.id() != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        self.kv.remove(SCHEDULED_NOTIFICATIONS_KEY)
    }
}

/// Persists the set of milestones that have already been notified.
#[derive(Clone)]
pub struct FiredMilestoneStore {
    kv: Arc<dyn KeyValueStore>,
}

impl FiredMilestoneStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn load(&self) -> FiredMilestoneSet {
        match self.kv.get(FIRED_MILESTONES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("fired milestone set is corrupt, starting empty: {e}");
                FiredMilestoneSet::new()
            }),
            Ok(None) => FiredMilestoneSet::new(),
            Err(e) => {
                tracing::warn!("failed to read fired milestones: {e}");
                FiredMilestoneSet::new()
            }
        }
    }

    pub fn save(&self, fired: &FiredMilestoneSet) -> Result<()> {
        let json = serde_json::to_string(fired)?;
        self.kv.set(FIRED_MILESTONES_KEY, &json)
    }
}
