//! Terminal implementations of the engine's platform seams.
//!
//! - Delivery: prints to stdout (foreground only; a terminal has no
//!   background channel).
//! - Permission: state kept in the kv store, prompt on stdin.
//! - Metrics: activity diary kept in the kv store.

use std::io::{BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wastewise_core::{
    ActivityEntry, CoreError, Database, DeliveryChannel, EngagementMetrics, EngineConfig,
    KeyValueStore, ManagerDeps, MetricsProvider, Notice, NotificationManager, PermissionApi,
    PermissionState, PlatformError,
};

pub const PERMISSION_KEY: &str = "notificationPermission";
pub const ACTIVITY_LOG_KEY: &str = "activityLog";

/// Writes notifications to the terminal.
pub struct ConsoleChannel;

#[async_trait]
impl DeliveryChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn show(&self, notice: &Notice) -> Result<(), PlatformError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "🔔 {}", notice.title).map_err(|e| PlatformError::Failed(e.to_string()))?;
        writeln!(out, "   {}", notice.body).map_err(|e| PlatformError::Failed(e.to_string()))?;
        Ok(())
    }
}

/// Permission state persisted in the kv store, asked for on stdin.
pub struct StoredPermission {
    kv: Arc<dyn KeyValueStore>,
}

impl StoredPermission {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn reset(&self) -> Result<(), CoreError> {
        self.kv.remove(PERMISSION_KEY)
    }

    fn store(&self, state: PermissionState) -> Result<(), PlatformError> {
        let json = serde_json::to_string(&state).map_err(|e| PlatformError::Failed(e.to_string()))?;
        self.kv
            .set(PERMISSION_KEY, &json)
            .map_err(|e| PlatformError::Failed(e.to_string()))
    }
}

#[async_trait]
impl PermissionApi for StoredPermission {
    fn current_state(&self) -> PermissionState {
        self.kv
            .get(PERMISSION_KEY)
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    async fn request(&self) -> Result<PermissionState, PlatformError> {
        let answer = tokio::task::spawn_blocking(|| {
            print!("Allow Wastewise to show notifications? [y/N] ");
            std::io::stdout().flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok::<_, std::io::Error>(line)
        })
        .await
        .map_err(|e| PlatformError::Failed(e.to_string()))?
        .map_err(|e| PlatformError::Failed(e.to_string()))?;

        let state = match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => PermissionState::Granted,
            // Closing the prompt without answering leaves the state undecided.
            "" => PermissionState::Default,
            _ => PermissionState::Denied,
        };
        if state != PermissionState::Default {
            self.store(state)?;
        }
        Ok(state)
    }
}

/// One diary entry as the CLI records it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub timestamp: DateTime<Utc>,
    pub credits: f64,
}

/// Activity diary stored under `activityLog`.
pub struct Diary {
    kv: Arc<dyn KeyValueStore>,
}

impl Diary {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn entries(&self) -> Result<Vec<DiaryEntry>, CoreError> {
        match self.kv.get(ACTIVITY_LOG_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn record(&self, entry: DiaryEntry) -> Result<(), CoreError> {
        let mut entries = self.entries()?;
        entries.push(entry);
        self.kv.set(ACTIVITY_LOG_KEY, &serde_json::to_string(&entries)?)
    }
}

impl MetricsProvider for Diary {
    fn snapshot(&self) -> Result<EngagementMetrics, CoreError> {
        let entries = self.entries()?;
        Ok(EngagementMetrics {
            total_credits: entries.iter().map(|e| e.credits).sum(),
            activity_log: entries.iter().map(|e| ActivityEntry::at(e.timestamp)).collect(),
        })
    }
}

/// Open the database and build an engine wired to the terminal.
pub fn open_engine() -> Result<(Arc<Database>, Arc<NotificationManager>), Box<dyn std::error::Error>> {
    let db = Arc::new(Database::open()?);
    let config = EngineConfig::load_or_default();
    let manager = NotificationManager::new(ManagerDeps {
        kv: db.clone(),
        permission: Arc::new(StoredPermission::new(db.clone())),
        background: None,
        foreground: Some(Arc::new(ConsoleChannel)),
        metrics: Arc::new(Diary::new(db.clone())),
        config,
    });
    Ok((db, manager))
}
