//! Notification scheduling and engagement triggers.
//!
//! Leaf-first: [`permission`] and [`store`] wrap the host platform,
//! [`streak`] and [`engagement`] decide milestone notifications,
//! [`scheduler`] fires time-anchored entries, [`dispatch`] delivers with
//! fallback, and [`manager`] ties them into one lifecycle.

pub mod dispatch;
pub mod engagement;
pub mod manager;
pub mod metrics;
pub mod permission;
pub mod scheduler;
pub mod store;
pub mod streak;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{DeliveryChannel, DispatchOutcome, Dispatcher, Notice};
pub use engagement::{EngagementEvaluator, EngagementRule, Evaluation, FiredMilestoneSet, Trigger};
pub use manager::{ManagerDeps, NotificationManager};
pub use metrics::{EngagementMetrics, MetricsProvider, StaticMetrics};
pub use permission::{PermissionApi, PermissionGate, PermissionState};
pub use scheduler::{advance_past, Scheduler, EVENING_REMINDER_ID, MORNING_REMINDER_ID};
pub use store::{FiredMilestoneStore, NotificationStore};
pub use streak::{calculate_streak, calculate_streak_in, current_streak};
pub use types::{
    ActivityEntry, NotificationConfig, NotificationPayload, Recurrence, ReminderSlot,
    ScheduledNotification,
};
