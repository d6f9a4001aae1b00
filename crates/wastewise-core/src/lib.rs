//! # Wastewise Core Library
//!
//! Notification scheduling and engagement-trigger engine for the Wastewise
//! waste-tracking app. The engine has no timer or display of its own: the
//! host supplies a key-value store, a permission API, delivery channels and
//! an activity/credit metrics source, and the engine decides what to show
//! and when.
//!
//! ## Architecture
//!
//! - **Scheduler**: wall-clock state machine over scheduled notifications,
//!   advanced by a periodic tick; recurring entries re-arm without replaying
//!   missed periods
//! - **Engagement**: one-shot milestone and streak notifications, remembered
//!   in a persisted fired set
//! - **Dispatch**: permission-gated delivery, background channel first with
//!   foreground fallback
//! - **Storage**: SQLite key-value table and TOML configuration
//!
//! ## Key Components
//!
//! - [`NotificationManager`]: composition root with `init`/`shutdown`
//! - [`Scheduler`]: due-entry evaluation and recurrence advancement
//! - [`EngagementEvaluator`]: milestone rule table
//! - [`Database`]: durable key-value store
//! - [`EngineConfig`]: engine configuration

pub mod error;
pub mod notify;
pub mod storage;

pub use error::{ConfigError, CoreError, PlatformError, StorageError, ValidationError};
pub use notify::{
    ActivityEntry, DeliveryChannel, DispatchOutcome, EngagementEvaluator, EngagementMetrics,
    ManagerDeps, MetricsProvider, Notice, NotificationConfig, NotificationManager,
    NotificationPayload, PermissionApi, PermissionState, Recurrence, ScheduledNotification,
    Scheduler,
};
pub use storage::{Database, EngineConfig, KeyValueStore, MemoryKv};
