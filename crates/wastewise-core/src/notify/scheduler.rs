//! Time-anchored notifications and their firing state machine.
//!
//! ```text
//! Pending(t) --tick(now >= t)--> Fired --recurring--> Pending(t')   t' > now
//!                                      \--one-shot--> removed
//! ```
//!
//! Like the rest of the engine this is driven from outside: the caller
//! decides when to `tick`. A recurring entry that missed several periods
//! fires once and is re-anchored to its next future slot.

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};

use super::types::{
    NotificationConfig, NotificationPayload, Recurrence, ReminderSlot, ScheduledNotification,
};
use crate::storage::RemindersConfig;

pub const MORNING_REMINDER_ID: &str = "morning-reminder";
pub const EVENING_REMINDER_ID: &str = "evening-reminder";

/// First slot `scheduled_for + k * period` (k >= 1) strictly after `now`.
pub fn advance_past(scheduled_for: DateTime<Utc>, period: Duration, now: DateTime<Utc>) -> DateTime<Utc> {
    let period_ms = period.num_milliseconds().max(1);
    let next = scheduled_for + Duration::milliseconds(period_ms);
    if next > now {
        return next;
    }

    let behind_ms = (now - scheduled_for).num_milliseconds();
    let periods = behind_ms / period_ms + 1;
    let mut candidate = periods
        .checked_mul(period_ms)
        .map(|ms| scheduled_for + Duration::milliseconds(ms))
        .unwrap_or(now);
    while candidate <= now {
        candidate += Duration::milliseconds(period_ms);
    }
    candidate
}

/// Next instant at or after `now` whose wall-clock time in `tz` is `time`.
fn next_local_occurrence<Tz: TimeZone>(tz: &Tz, now: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    let mut day = now.with_timezone(tz).date_naive();
    for _ in 0..3 {
        let naive = day.and_time(time);
        // Nonexistent local times (DST gap) resolve an hour later.
        let resolved = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest());
        if let Some(at) = resolved {
            let at = at.with_timezone(&Utc);
            if at > now {
                return at;
            }
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    now + Duration::days(1)
}

fn reminder_time(parsed: Result<NaiveTime, crate::error::ConfigError>, fallback_hour: u32) -> NaiveTime {
    parsed.unwrap_or_else(|e| {
        tracing::warn!("invalid reminder time, using {fallback_hour:02}:00: {e}");
        NaiveTime::from_hms_opt(fallback_hour, 0, 0).unwrap_or(NaiveTime::MIN)
    })
}

/// The two canonical daily reminders, anchored to their next local slot.
pub fn default_reminders_in<Tz: TimeZone>(
    tz: &Tz,
    now: DateTime<Utc>,
    reminders: &RemindersConfig,
    icon: Option<&str>,
) -> Vec<ScheduledNotification> {
    let morning = reminder_time(reminders.morning(), 9);
    let evening = reminder_time(reminders.evening(), 20);

    let build = |id: &str, title: &str, body: &str, slot: ReminderSlot, time: NaiveTime| {
        let mut config = NotificationConfig::new(id, title, body)
            .with_data(NotificationPayload::Reminder { slot });
        if let Some(icon) = icon {
            config = config.with_icon(icon);
        }
        ScheduledNotification::new(config, next_local_occurrence(tz, now, time), Recurrence::Daily)
    };

    vec![
        build(
            MORNING_REMINDER_ID,
            "🌱 Good morning!",
            "Start the day green: log what you recycle, compost and reuse today.",
            ReminderSlot::Morning,
            morning,
        ),
        build(
            EVENING_REMINDER_ID,
            "🌙 Evening check-in",
            "Did you log today's waste? A quick entry keeps your streak alive.",
            ReminderSlot::Evening,
            evening,
        ),
    ]
}

/// Owns the set of scheduled notifications. Ids are unique.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    entries: Vec<ScheduledNotification>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from loaded entries; later duplicates replace earlier ones.
    pub fn from_entries(entries: Vec<ScheduledNotification>) -> Self {
        let mut scheduler = Self::new();
        for entry in entries {
            scheduler.upsert(entry);
        }
        scheduler
    }

    pub fn entries(&self) -> &[ScheduledNotification] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ScheduledNotification> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// Insert or replace by id. Returns true if an entry was replaced.
    pub fn upsert(&mut self, entry: ScheduledNotification) -> bool {
        match self.entries.iter_mut().find(|e| e.id() == entry.id()) {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.entries.push(entry);
                false
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id() != id);
        self.entries.len() != before
    }

    /// Earliest pending fire time.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(|e| e.scheduled_for).min()
    }

    /// Fire everything due at `now`.
    ///
    /// One-shot entries are removed; recurring ones move to their next slot
    /// after `now`. Returned configs are ordered by their scheduled time.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<NotificationConfig> {
        let mut fired: Vec<(DateTime<Utc>, NotificationConfig)> = Vec::new();

        self.entries.retain_mut(|entry| {
            if !entry.is_due(now) {
                return true;
            }
            fired.push((entry.scheduled_for, entry.config.clone()));
            match entry.recurring.period() {
                Some(period) => {
                    let next = advance_past(entry.scheduled_for, period, now);
                    tracing::debug!(id = %entry.id(), %next, "recurring notification re-armed");
                    entry.scheduled_for = next;
                    true
                }
                None => {
                    tracing::debug!(id = %entry.id(), "one-shot notification consumed");
                    false
                }
            }
        });

        fired.sort_by_key(|(at, _)| *at);
        fired.into_iter().map(|(_, config)| config).collect()
    }

    /// Insert the default reminders that are not present yet.
    ///
    /// Returns how many entries were inserted.
    pub fn seed_defaults(&mut self, now: DateTime<Utc>, reminders: &RemindersConfig, icon: Option<&str>) -> usize {
        self.seed_defaults_in(&Local, now, reminders, icon)
    }

    pub fn seed_defaults_in<Tz: TimeZone>(
        &mut self,
        tz: &Tz,
        now: DateTime<Utc>,
        reminders: &RemindersConfig,
        icon: Option<&str>,
    ) -> usize {
        let mut inserted = 0;
        for reminder in default_reminders_in(tz, now, reminders, icon) {
            if self.get(reminder.id()).is_none() {
                tracing::info!(id = %reminder.id(), at = %reminder.scheduled_for, "seeding default reminder");
                self.entries.push(reminder);
                inserted += 1;
            }
        }
        inserted
    }
}
