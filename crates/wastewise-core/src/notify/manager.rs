//! The notification engine's composition root.
//!
//! `NotificationManager` is built once by the host and shared through an
//! `Arc`. `init` loads the persisted schedule, seeds the default reminders
//! and starts the periodic evaluation task; `shutdown` stops it.
//!
//! Evaluation passes never overlap: a tick that arrives while a pass is
//! still dispatching is skipped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::dispatch::{DeliveryChannel, DispatchOutcome, Dispatcher};
use super::engagement::{EngagementEvaluator, FiredMilestoneSet};
use super::metrics::MetricsProvider;
use super::permission::{PermissionApi, PermissionGate, PermissionState};
use super::scheduler::Scheduler;
use super::store::{FiredMilestoneStore, NotificationStore};
use super::types::{NotificationConfig, ScheduledNotification};
use crate::error::Result;
use crate::storage::{EngineConfig, KeyValueStore};

/// Everything the host platform supplies to the engine.
pub struct ManagerDeps {
    pub kv: Arc<dyn KeyValueStore>,
    pub permission: Arc<dyn PermissionApi>,
    /// Can display while the app is not in the foreground.
    pub background: Option<Arc<dyn DeliveryChannel>>,
    pub foreground: Option<Arc<dyn DeliveryChannel>>,
    pub metrics: Arc<dyn MetricsProvider>,
    pub config: EngineConfig,
}

pub struct NotificationManager {
    config: EngineConfig,
    store: NotificationStore,
    fired_store: FiredMilestoneStore,
    scheduler: Mutex<Scheduler>,
    /// Set once the scheduler holds the persisted schedule.
    restored: AtomicBool,
    evaluator: EngagementEvaluator,
    gate: Arc<PermissionGate>,
    dispatcher: Dispatcher,
    metrics: Arc<dyn MetricsProvider>,
    /// Held for the duration of one scheduler pass.
    pass: Mutex<()>,
    engagement: Mutex<()>,
    ticker: StdMutex<Option<JoinHandle<()>>>,
}

impl NotificationManager {
    pub fn new(deps: ManagerDeps) -> Arc<Self> {
        let ManagerDeps {
            kv,
            permission,
            background,
            foreground,
            metrics,
            config,
        } = deps;

        let gate = Arc::new(PermissionGate::new(permission));
        let dispatcher = Dispatcher::new(gate.clone(), background, foreground)
            .with_badge(config.notifications.badge.clone());
        let evaluator = EngagementEvaluator::from_config(&config.engagement)
            .with_icon(config.notifications.icon.clone());

        Arc::new(Self {
            store: NotificationStore::new(kv.clone()),
            fired_store: FiredMilestoneStore::new(kv),
            scheduler: Mutex::new(Scheduler::new()),
            restored: AtomicBool::new(false),
            evaluator,
            gate,
            dispatcher,
            metrics,
            pass: Mutex::new(()),
            engagement: Mutex::new(()),
            ticker: StdMutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load the schedule, seed missing default reminders and start ticking.
    ///
    /// Calling `init` again reloads from storage but never starts a second
    /// tick task.
    pub async fn init(self: &Arc<Self>) {
        self.restore().await;

        if self.config.notifications.enabled {
            self.start_ticker();
        } else {
            tracing::info!("notifications disabled, periodic evaluation not started");
        }
    }

    /// Load the persisted schedule and seed missing default reminders,
    /// without starting periodic evaluation.
    ///
    /// Operations that touch the schedule restore on first use, so calling
    /// this is only needed to reload.
    pub async fn restore(&self) {
        let mut scheduler = self.scheduler.lock().await;
        self.restore_into(&mut scheduler);
    }

    /// Lock the scheduler, restoring it first if nothing has been loaded yet.
    async fn loaded_scheduler(&self) -> MutexGuard<'_, Scheduler> {
        let mut scheduler = self.scheduler.lock().await;
        if !self.restored.load(Ordering::Acquire) {
            self.restore_into(&mut scheduler);
        }
        scheduler
    }

    fn restore_into(&self, scheduler: &mut Scheduler) {
        *scheduler = Scheduler::from_entries(self.store.load());
        self.restored.store(true, Ordering::Release);
        let seeded = scheduler.seed_defaults(
            Utc::now(),
            &self.config.reminders,
            Some(self.config.notifications.icon.as_str()),
        );
        if seeded > 0 {
            self.persist(scheduler.entries());
        }
        tracing::info!(
            scheduled = scheduler.len(),
            seeded,
            "notification schedule restored"
        );
    }

    fn start_ticker(self: &Arc<Self>) {
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if ticker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let secs = self.config.notifications.tick_interval_secs.max(1);
        let weak: Weak<Self> = Arc::downgrade(self);
        tracing::info!("notification scheduler started (check every {secs}s)");

        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(secs));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                manager.run_due(Utc::now()).await;
            }
        }));
    }

    /// Stop periodic evaluation. Safe to call more than once.
    pub fn shutdown(&self) {
        let handle = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("notification scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// One evaluation pass: fire everything due at `now`.
    ///
    /// Returns nothing if another pass is still running.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Vec<DispatchOutcome> {
        let Ok(_pass) = self.pass.try_lock() else {
            tracing::debug!("previous scheduler pass still running, skipping tick");
            return Vec::new();
        };

        let due = {
            let mut scheduler = self.loaded_scheduler().await;
            let due = scheduler.tick(now);
            if !due.is_empty() {
                // Persist before delivery so a crash mid-dispatch cannot replay.
                self.persist(scheduler.entries());
            }
            due
        };

        let mut outcomes = Vec::with_capacity(due.len());
        for config in &due {
            outcomes.push(self.dispatcher.dispatch(config).await);
        }
        outcomes
    }

    pub fn permission_state(&self) -> PermissionState {
        self.gate.state()
    }

    pub async fn request_permission(&self) -> bool {
        self.gate.request().await
    }

    pub async fn show_notification(&self, config: &NotificationConfig) -> DispatchOutcome {
        self.dispatcher.dispatch(config).await
    }

    /// Add or replace a scheduled notification.
    ///
    /// # Errors
    /// Returns an error if the entry is invalid or cannot be persisted.
    pub async fn schedule_notification(&self, entry: ScheduledNotification) -> Result<()> {
        entry.config.validate()?;
        let mut scheduler = self.loaded_scheduler().await;
        self.store.upsert(entry.clone())?;
        let replaced = scheduler.upsert(entry.clone());
        tracing::info!(
            id = %entry.id(),
            at = %entry.scheduled_for,
            recurring = ?entry.recurring,
            replaced,
            "notification scheduled"
        );
        Ok(())
    }

    /// Remove a scheduled notification. Returns whether it existed.
    pub async fn cancel_notification(&self, id: &str) -> Result<bool> {
        let mut scheduler = self.loaded_scheduler().await;
        let stored = self.store.remove(id)?;
        let in_memory = scheduler.remove(id);
        Ok(stored || in_memory)
    }

    pub async fn scheduled_notifications(&self) -> Vec<ScheduledNotification> {
        self.loaded_scheduler().await.entries().to_vec()
    }

    /// Evaluate milestone rules against current metrics and notify the new ones.
    ///
    /// A milestone is recorded as fired only once it has been delivered;
    /// refused or undeliverable milestones are offered again next time.
    pub async fn schedule_engagement_notifications(&self) -> Vec<(String, DispatchOutcome)> {
        let _engagement = self.engagement.lock().await;

        let metrics = match self.metrics.snapshot() {
            Ok(metrics) => metrics,
            Err(e) => {
                tracing::warn!("could not read engagement metrics: {e}");
                return Vec::new();
            }
        };

        let mut fired = self.fired_store.load();
        let evaluation = self
            .evaluator
            .evaluate(metrics.total_credits, &metrics.activity_log, &fired);
        if evaluation.notifications.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::with_capacity(evaluation.notifications.len());
        let mut delivered = 0;
        for config in &evaluation.notifications {
            let outcome = self.dispatcher.dispatch(config).await;
            if outcome.delivered() {
                fired.insert(config.id.clone());
                delivered += 1;
            } else {
                tracing::debug!(milestone = %config.id, ?outcome, "milestone not delivered, will retry");
            }
            results.push((config.id.clone(), outcome));
        }

        if delivered > 0 {
            if let Err(e) = self.fired_store.save(&fired) {
                tracing::warn!("failed to persist fired milestones: {e}");
            }
        }
        results
    }

    pub fn fired_milestones(&self) -> FiredMilestoneSet {
        self.fired_store.load()
    }

    fn persist(&self, entries: &[ScheduledNotification]) {
        if let Err(e) = self.store.save(entries) {
            tracing::warn!("failed to persist scheduled notifications: {e}");
        }
    }
}

impl Drop for NotificationManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::engagement::FIRST_TREE;
    use crate::notify::metrics::EngagementMetrics;
    use crate::notify::scheduler::{EVENING_REMINDER_ID, MORNING_REMINDER_ID};
    use crate::notify::store::SCHEDULED_NOTIFICATIONS_KEY;
    use crate::notify::testing::{FakeMetrics, FakePermission, RecordingChannel};
    use crate::notify::types::{ActivityEntry, Recurrence};
    use crate::storage::MemoryKv;
    use chrono::Duration as ChronoDuration;

    struct Harness {
        kv: Arc<MemoryKv>,
        permission: Arc<FakePermission>,
        foreground: Arc<RecordingChannel>,
        metrics: Arc<FakeMetrics>,
        manager: Arc<NotificationManager>,
    }

    fn harness_with(kv: Arc<MemoryKv>, permission: PermissionState, config: EngineConfig) -> Harness {
        let permission = Arc::new(FakePermission::new(permission, PermissionState::Granted));
        let foreground = Arc::new(RecordingChannel::new("window"));
        let metrics = Arc::new(FakeMetrics::default());
        let manager = NotificationManager::new(ManagerDeps {
            kv: kv.clone(),
            permission: permission.clone(),
            background: None,
            foreground: Some(foreground.clone()),
            metrics: metrics.clone(),
            config,
        });
        Harness {
            kv,
            permission,
            foreground,
            metrics,
            manager,
        }
    }

    fn quiet_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.notifications.enabled = false;
        config
    }

    fn harness() -> Harness {
        harness_with(Arc::new(MemoryKv::new()), PermissionState::Granted, quiet_config())
    }

    fn one_shot(id: &str, at: DateTime<Utc>) -> ScheduledNotification {
        ScheduledNotification::new(NotificationConfig::new(id, id, "body"), at, Recurrence::None)
    }

    #[tokio::test]
    async fn init_seeds_defaults_once() {
        let h = harness();
        h.manager.init().await;
        let ids: Vec<String> = h
            .manager
            .scheduled_notifications()
            .await
            .into_iter()
            .map(|e| e.config.id)
            .collect();
        assert_eq!(ids, vec![MORNING_REMINDER_ID, EVENING_REMINDER_ID]);

        let stored = h.kv.get(SCHEDULED_NOTIFICATIONS_KEY).unwrap().unwrap();
        assert!(stored.contains(MORNING_REMINDER_ID));

        let again = harness_with(h.kv.clone(), PermissionState::Granted, quiet_config());
        again.manager.init().await;
        assert_eq!(again.manager.scheduled_notifications().await.len(), 2);
    }

    #[tokio::test]
    async fn init_recovers_from_corrupt_storage() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(SCHEDULED_NOTIFICATIONS_KEY, "garbage").unwrap();
        let h = harness_with(kv, PermissionState::Granted, quiet_config());
        h.manager.init().await;
        assert_eq!(h.manager.scheduled_notifications().await.len(), 2);
    }

    #[tokio::test]
    async fn schedule_then_fire_one_shot() {
        let h = harness();
        h.manager.init().await;
        let now = Utc::now();
        h.manager
            .schedule_notification(one_shot("bin-day", now - ChronoDuration::minutes(1)))
            .await
            .unwrap();

        let outcomes = h.manager.run_due(now).await;
        assert_eq!(outcomes, vec![DispatchOutcome::Foreground]);
        assert_eq!(h.foreground.shown()[0].title, "bin-day");

        let remaining = h.manager.scheduled_notifications().await;
        assert!(remaining.iter().all(|e| e.config.id != "bin-day"));
        let stored = NotificationStore::new(h.kv.clone()).load();
        assert!(stored.iter().all(|e| e.config.id != "bin-day"));

        assert!(h.manager.run_due(now).await.is_empty());
    }

    #[tokio::test]
    async fn schedule_rejects_invalid_entry() {
        let h = harness();
        let result = h
            .manager
            .schedule_notification(one_shot("", Utc::now()))
            .await;
        assert!(result.is_err());
        assert!(h
            .manager
            .scheduled_notifications()
            .await
            .iter()
            .all(|e| !e.config.id.is_empty()));
    }

    #[tokio::test]
    async fn cancel_removes_from_memory_and_store() {
        let h = harness();
        h.manager.init().await;
        assert!(h.manager.cancel_notification(MORNING_REMINDER_ID).await.unwrap());
        assert!(!h.manager.cancel_notification(MORNING_REMINDER_ID).await.unwrap());
        assert_eq!(NotificationStore::new(h.kv.clone()).load().len(), 1);
    }

    #[tokio::test]
    async fn recurring_catch_up_fires_once() {
        let h = harness();
        let now = Utc::now();
        let mut entry = one_shot("weekly-digest", now - ChronoDuration::days(5));
        entry.recurring = Recurrence::Daily;
        h.manager.schedule_notification(entry).await.unwrap();

        assert_eq!(h.manager.run_due(now).await.len(), 1);
        let next = h
            .manager
            .scheduled_notifications()
            .await
            .into_iter()
            .find(|e| e.config.id == "weekly-digest")
            .unwrap()
            .scheduled_for;
        assert!(next > now);
        assert!(next <= now + ChronoDuration::days(1));
        assert!(h.manager.run_due(now).await.is_empty());
    }

    #[tokio::test]
    async fn first_use_without_init_keeps_stored_schedule() {
        let h = harness();
        h.manager.init().await;

        let fresh = harness_with(h.kv.clone(), PermissionState::Granted, quiet_config());
        let now = Utc::now();
        fresh
            .manager
            .schedule_notification(one_shot("bin-day", now - ChronoDuration::seconds(1)))
            .await
            .unwrap();
        assert_eq!(fresh.manager.run_due(now).await, vec![DispatchOutcome::Foreground]);

        let stored: Vec<String> = NotificationStore::new(h.kv.clone())
            .load()
            .into_iter()
            .map(|e| e.config.id)
            .collect();
        assert_eq!(stored, vec![MORNING_REMINDER_ID, EVENING_REMINDER_ID]);
    }

    #[tokio::test]
    async fn denied_permission_consumes_entry_silently() {
        let h = harness_with(Arc::new(MemoryKv::new()), PermissionState::Denied, quiet_config());
        let now = Utc::now();
        h.manager
            .schedule_notification(one_shot("x", now - ChronoDuration::seconds(1)))
            .await
            .unwrap();
        assert_eq!(h.manager.run_due(now).await, vec![DispatchOutcome::PermissionDenied]);
        assert!(h.foreground.shown().is_empty());
        assert_eq!(h.permission.prompts(), 0);
    }

    #[tokio::test]
    async fn overlapping_pass_is_skipped() {
        let h = harness();
        let now = Utc::now();
        h.manager
            .schedule_notification(one_shot("x", now - ChronoDuration::seconds(1)))
            .await
            .unwrap();

        let guard = h.manager.pass.lock().await;
        assert!(h.manager.run_due(now).await.is_empty());
        drop(guard);
        assert_eq!(h.manager.run_due(now).await.len(), 1);
    }

    #[tokio::test]
    async fn engagement_fires_once_across_restarts() {
        let h = harness();
        h.metrics.set(EngagementMetrics {
            total_credits: 520.0,
            activity_log: Vec::new(),
        });

        let fired = h.manager.schedule_engagement_notifications().await;
        assert_eq!(fired, vec![(FIRST_TREE.to_string(), DispatchOutcome::Foreground)]);
        assert!(h.manager.fired_milestones().contains(FIRST_TREE));

        let restarted = harness_with(h.kv.clone(), PermissionState::Granted, quiet_config());
        restarted.metrics.set(EngagementMetrics {
            total_credits: 600.0,
            activity_log: vec![ActivityEntry::at(Utc::now())],
        });
        assert!(restarted.manager.schedule_engagement_notifications().await.is_empty());
        assert!(restarted.foreground.shown().is_empty());
    }

    #[tokio::test]
    async fn undelivered_milestone_is_offered_again() {
        let kv = Arc::new(MemoryKv::new());
        let denied = harness_with(kv.clone(), PermissionState::Denied, quiet_config());
        denied.metrics.set(EngagementMetrics {
            total_credits: 520.0,
            activity_log: Vec::new(),
        });
        let fired = denied.manager.schedule_engagement_notifications().await;
        assert_eq!(fired, vec![(FIRST_TREE.to_string(), DispatchOutcome::PermissionDenied)]);
        assert!(denied.manager.fired_milestones().is_empty());

        let granted = harness_with(kv, PermissionState::Granted, quiet_config());
        granted.metrics.set(EngagementMetrics {
            total_credits: 520.0,
            activity_log: Vec::new(),
        });
        let fired = granted.manager.schedule_engagement_notifications().await;
        assert_eq!(fired, vec![(FIRST_TREE.to_string(), DispatchOutcome::Foreground)]);
        assert!(granted.manager.fired_milestones().contains(FIRST_TREE));
        assert_eq!(granted.foreground.shown().len(), 1);
    }

    #[tokio::test]
    async fn metrics_failure_yields_nothing() {
        let h = harness();
        h.metrics.set(EngagementMetrics {
            total_credits: 10_000.0,
            activity_log: Vec::new(),
        });
        h.metrics.break_provider();
        assert!(h.manager.schedule_engagement_notifications().await.is_empty());
        assert!(h.manager.fired_milestones().is_empty());
    }

    #[tokio::test]
    async fn show_and_request_delegate() {
        let h = harness_with(Arc::new(MemoryKv::new()), PermissionState::Default, quiet_config());
        assert_eq!(h.manager.permission_state(), PermissionState::Default);
        assert!(h.manager.request_permission().await);
        assert_eq!(h.permission.prompts(), 1);

        let outcome = h
            .manager
            .show_notification(&NotificationConfig::new("hi", "Hello", "there"))
            .await;
        assert_eq!(outcome, DispatchOutcome::Foreground);
    }

    #[tokio::test]
    async fn ticker_starts_once_and_stops_on_shutdown() {
        let mut config = EngineConfig::default();
        config.notifications.tick_interval_secs = 3600;
        let h = harness_with(Arc::new(MemoryKv::new()), PermissionState::Granted, config);

        h.manager.init().await;
        assert!(h.manager.is_running());
        h.manager.init().await;
        assert!(h.manager.is_running());

        h.manager.shutdown();
        assert!(!h.manager.is_running());
        h.manager.shutdown();
    }
}
