use std::sync::Arc;

use chrono::Utc;
use clap::Subcommand;
use wastewise_core::notify::current_streak;
use wastewise_core::{Database, MetricsProvider};

use crate::platform::{Diary, DiaryEntry};

#[derive(Subcommand)]
pub enum ActivityAction {
    /// Record a recycling activity now
    Record {
        /// Credits earned
        #[arg(long)]
        credits: f64,
    },
    /// Show total credits and the current daily streak
    Streak {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: ActivityAction) -> Result<(), Box<dyn std::error::Error>> {
    let diary = Diary::new(Arc::new(Database::open()?));

    match action {
        ActivityAction::Record { credits } => {
            if !credits.is_finite() || credits < 0.0 {
                return Err(format!("credits must be a non-negative number, got {credits}").into());
            }
            diary.record(DiaryEntry {
                timestamp: Utc::now(),
                credits,
            })?;
            println!("Recorded {credits} credits");
        }
        ActivityAction::Streak { json } => {
            let metrics = diary.snapshot()?;
            let streak = current_streak(&metrics.activity_log);
            if json {
                let out = serde_json::json!({
                    "totalCredits": metrics.total_credits,
                    "streakDays": streak,
                    "activities": metrics.activity_log.len(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("Total credits: {}", metrics.total_credits);
                println!("Current streak: {streak} day(s)");
            }
        }
    }
    Ok(())
}
