//! Activity and credit metrics supplied by the host's diary.

use serde::{Deserialize, Serialize};

use super::types::ActivityEntry;
use crate::error::Result;

/// Snapshot of the inputs the engagement rules read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMetrics {
    pub total_credits: f64,
    #[serde(default)]
    pub activity_log: Vec<ActivityEntry>,
}

/// Read-only, polled source of engagement metrics.
pub trait MetricsProvider: Send + Sync {
    fn snapshot(&self) -> Result<EngagementMetrics>;
}

/// Fixed metrics, handy for hosts that compute credits up front.
#[derive(Debug, Clone, Default)]
pub struct StaticMetrics(pub EngagementMetrics);

impl MetricsProvider for StaticMetrics {
    fn snapshot(&self) -> Result<EngagementMetrics> {
        Ok(self.0.clone())
    }
}
