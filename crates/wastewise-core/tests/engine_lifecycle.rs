//! End-to-end engine tests over an on-disk SQLite store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use wastewise_core::notify::StaticMetrics;
use wastewise_core::{
    ActivityEntry, Database, DeliveryChannel, DispatchOutcome, EngagementMetrics, EngineConfig,
    ManagerDeps, Notice, NotificationConfig, NotificationManager, PermissionApi, PermissionState,
    PlatformError, Recurrence, ScheduledNotification,
};

struct Platform {
    state: Mutex<PermissionState>,
    prompts: AtomicUsize,
}

#[async_trait]
impl PermissionApi for Platform {
    fn current_state(&self) -> PermissionState {
        *self.state.lock().unwrap()
    }

    async fn request(&self) -> Result<PermissionState, PlatformError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = PermissionState::Granted;
        Ok(PermissionState::Granted)
    }
}

#[derive(Default)]
struct Window {
    shown: Mutex<Vec<Notice>>,
}

#[async_trait]
impl DeliveryChannel for Window {
    fn name(&self) -> &str {
        "window"
    }

    async fn show(&self, notice: &Notice) -> Result<(), PlatformError> {
        self.shown.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

fn manager(
    db: Arc<Database>,
    platform: Arc<Platform>,
    window: Arc<Window>,
    metrics: EngagementMetrics,
) -> Arc<NotificationManager> {
    let mut config = EngineConfig::default();
    config.notifications.enabled = false;
    NotificationManager::new(ManagerDeps {
        kv: db,
        permission: platform,
        background: None,
        foreground: Some(window),
        metrics: Arc::new(StaticMetrics(metrics)),
        config,
    })
}

#[tokio::test]
async fn schedule_survives_restart_and_fires_through_fallback() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("wastewise.db");
    let platform = Arc::new(Platform {
        state: Mutex::new(PermissionState::Default),
        prompts: AtomicUsize::new(0),
    });
    let window = Arc::new(Window::default());
    let now = Utc::now();

    {
        let db = Arc::new(Database::open_at(&path).unwrap());
        let first = manager(db, platform.clone(), window.clone(), EngagementMetrics::default());
        first.init().await;
        first
            .schedule_notification(ScheduledNotification::new(
                NotificationConfig::new("compost-day", "Compost pickup", "Put the green bin out"),
                now - Duration::days(3),
                Recurrence::Weekly,
            ))
            .await
            .unwrap();
        first.shutdown();
    }

    let db = Arc::new(Database::open_at(&path).unwrap());
    let second = manager(db, platform.clone(), window.clone(), EngagementMetrics::default());
    second.init().await;
    assert_eq!(second.scheduled_notifications().await.len(), 3);

    let outcomes = second.run_due(now).await;
    assert_eq!(outcomes, vec![DispatchOutcome::Foreground]);
    assert_eq!(platform.prompts.load(Ordering::SeqCst), 1);

    let shown = window.shown.lock().unwrap().clone();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Compost pickup");
    assert_eq!(shown[0].body, "Put the green bin out");
    assert_eq!(shown[0].badge, None);

    let compost = second
        .scheduled_notifications()
        .await
        .into_iter()
        .find(|e| e.config.id == "compost-day")
        .unwrap();
    assert_eq!(compost.scheduled_for, now + Duration::days(4));
}

#[tokio::test]
async fn engagement_milestones_are_remembered_on_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("wastewise.db");
    let platform = Arc::new(Platform {
        state: Mutex::new(PermissionState::Granted),
        prompts: AtomicUsize::new(0),
    });
    let window = Arc::new(Window::default());
    let today = ActivityEntry::at(Utc::now());
    let metrics = EngagementMetrics {
        total_credits: 520.0,
        activity_log: vec![today],
    };

    let db = Arc::new(Database::open_at(&path).unwrap());
    let first = manager(db, platform.clone(), window.clone(), metrics.clone());
    let fired = first.schedule_engagement_notifications().await;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].0, "first-tree");
    drop(first);

    let db = Arc::new(Database::open_at(&path).unwrap());
    let second = manager(db, platform, window.clone(), metrics);
    assert!(second.schedule_engagement_notifications().await.is_empty());
    assert_eq!(window.shown.lock().unwrap().len(), 1);
}
