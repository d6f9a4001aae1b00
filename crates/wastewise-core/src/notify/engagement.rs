//! One-shot milestone and streak notifications.
//!
//! Each rule watches a level condition (credits above a threshold, streak at
//! least N days). The fired set turns that level into an edge: a rule whose
//! id is already in the set never fires again.

use std::collections::BTreeSet;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::streak::calculate_streak;
use super::types::{ActivityEntry, NotificationConfig, NotificationPayload};
use crate::storage::EngagementConfig;

pub const FIRST_TREE: &str = "first-tree";
pub const FIVE_TREES: &str = "five-trees";
pub const THREE_DAY_STREAK: &str = "three-day-streak";
pub const SEVEN_DAY_STREAK: &str = "seven-day-streak";
pub const THIRTY_DAY_STREAK: &str = "thirty-day-streak";

/// Milestone ids that have already been notified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiredMilestoneSet(BTreeSet<String>);

impl FiredMilestoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    /// Returns false if the id was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.0.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FiredMilestoneSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Condition a rule watches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// Total credits at or above the threshold.
    Credits(f64),
    /// Current streak at least this many days.
    StreakDays(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngagementRule {
    pub id: String,
    pub title: String,
    pub body: String,
    pub trigger: Trigger,
}

impl EngagementRule {
    pub fn credits(id: &str, threshold: f64, title: &str, body: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            trigger: Trigger::Credits(threshold),
        }
    }

    pub fn streak(id: &str, days: u32, title: &str, body: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            trigger: Trigger::StreakDays(days),
        }
    }

    fn notification(&self, icon: Option<&str>) -> NotificationConfig {
        let data = match self.trigger {
            Trigger::Credits(_) => NotificationPayload::Milestone {
                milestone: self.id.clone(),
            },
            Trigger::StreakDays(days) => NotificationPayload::Streak {
                milestone: self.id.clone(),
                days,
            },
        };
        let config = NotificationConfig::new(self.id.clone(), self.title.clone(), self.body.clone())
            .with_data(data);
        match icon {
            Some(icon) => config.with_icon(icon),
            None => config,
        }
    }
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Notifications to dispatch now, in rule order.
    pub notifications: Vec<NotificationConfig>,
    /// Input set plus every id that fired in this pass.
    pub fired: FiredMilestoneSet,
}

#[derive(Debug, Clone)]
pub struct EngagementEvaluator {
    rules: Vec<EngagementRule>,
    icon: Option<String>,
}

impl Default for EngagementEvaluator {
    fn default() -> Self {
        Self::from_config(&EngagementConfig::default())
    }
}

impl EngagementEvaluator {
    pub fn with_rules(rules: Vec<EngagementRule>) -> Self {
        Self { rules, icon: None }
    }

    /// Built-in rule table scaled by the configured tree-equivalent credits.
    pub fn from_config(config: &EngagementConfig) -> Self {
        let tree = config.tree_credits;
        Self::with_rules(vec![
            EngagementRule::credits(
                FIRST_TREE,
                tree,
                "🌳 You saved your first tree!",
                "Your waste reductions now add up to one tree's worth of carbon credits.",
            ),
            EngagementRule::streak(
                THREE_DAY_STREAK,
                3,
                "🔥 3-day streak!",
                "You've logged waste three days in a row. Keep it going!",
            ),
            EngagementRule::streak(
                SEVEN_DAY_STREAK,
                7,
                "🔥 One full week!",
                "Seven days of logging in a row. That's a real habit.",
            ),
            EngagementRule::credits(
                FIVE_TREES,
                tree * 5.0,
                "🌲 Five trees saved!",
                "Your carbon credits now equal five trees. Amazing work!",
            ),
            EngagementRule::streak(
                THIRTY_DAY_STREAK,
                30,
                "🏆 30-day streak!",
                "A whole month of daily logging. You're a waste-tracking champion.",
            ),
        ])
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn rules(&self) -> &[EngagementRule] {
        &self.rules
    }

    /// Evaluate against the current local date.
    pub fn evaluate(
        &self,
        total_credits: f64,
        activity_log: &[ActivityEntry],
        fired: &FiredMilestoneSet,
    ) -> Evaluation {
        self.evaluate_at(total_credits, activity_log, fired, Local::now().date_naive())
    }

    pub fn evaluate_at(
        &self,
        total_credits: f64,
        activity_log: &[ActivityEntry],
        fired: &FiredMilestoneSet,
        today: NaiveDate,
    ) -> Evaluation {
        let mut fired = fired.clone();
        let mut notifications = Vec::new();
        let mut streak = None;

        for rule in &self.rules {
            if fired.contains(&rule.id) {
                continue;
            }
            let crossed = match rule.trigger {
                Trigger::Credits(threshold) => total_credits >= threshold,
                Trigger::StreakDays(days) => {
                    let current =
                        *streak.get_or_insert_with(|| calculate_streak(activity_log, today));
                    current >= days
                }
            };
            if crossed {
                tracing::info!(milestone = %rule.id, "engagement milestone reached");
                fired.insert(rule.id.clone());
                notifications.push(rule.notification(self.icon.as_deref()));
            }
        }

        Evaluation {
            notifications,
            fired,
        }
    }
}
