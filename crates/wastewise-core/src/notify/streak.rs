//! Consecutive-day activity streaks.
//!
//! A streak counts distinct local calendar days with at least one activity
//! entry, walking backward from today. No activity today means no streak.

use std::collections::BTreeSet;

use chrono::{Local, NaiveDate, TimeZone};

use super::types::ActivityEntry;

/// Streak length as of `today`, using the host's local timezone.
pub fn calculate_streak(entries: &[ActivityEntry], today: NaiveDate) -> u32 {
    calculate_streak_in(entries, &Local, today)
}

/// Streak length as of the current local date.
pub fn current_streak(entries: &[ActivityEntry]) -> u32 {
    calculate_streak(entries, Local::now().date_naive())
}

/// Streak length as of `today`, bucketing timestamps into days of `tz`.
pub fn calculate_streak_in<Tz: TimeZone>(entries: &[ActivityEntry], tz: &Tz, today: NaiveDate) -> u32 {
    // Future-dated entries are ignored.
    let days: BTreeSet<NaiveDate> = entries
        .iter()
        .map(|entry| entry.timestamp.with_timezone(tz).date_naive())
        .filter(|day| *day <= today)
        .collect();

    let mut streak = 0;
    let mut expected = today;
    for day in days.iter().rev() {
        if *day != expected {
            break;
        }
        streak += 1;
        match expected.pred_opt() {
            Some(prev) => expected = prev,
            None => break,
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 20).unwrap()
    }

    /// Entry at `hour` UTC on `days_ago` days before `today()`.
    fn entry(days_ago: i64, hour: u32) -> ActivityEntry {
        let day = today() - Duration::days(days_ago);
        let ts = day.and_hms_opt(hour, 0, 0).unwrap().and_utc();
        ActivityEntry::at(ts)
    }

    fn streak(entries: &[ActivityEntry]) -> u32 {
        calculate_streak_in(entries, &Utc, today())
    }

    #[test]
    fn empty_log_is_zero() {
        assert_eq!(streak(&[]), 0);
    }

    #[test]
    fn three_consecutive_days() {
        assert_eq!(streak(&[entry(0, 10), entry(1, 10), entry(2, 10)]), 3);
    }

    #[test]
    fn gap_breaks_the_chain() {
        let log = [entry(0, 10), entry(1, 10), entry(2, 10), entry(4, 10)];
        assert_eq!(streak(&log), 3);
    }

    #[test]
    fn nothing_today_is_zero() {
        assert_eq!(streak(&[entry(2, 10), entry(3, 10), entry(4, 10)]), 0);
        assert_eq!(streak(&[entry(1, 10)]), 0);
    }

    #[test]
    fn multiple_entries_per_day_count_once() {
        let log = [entry(0, 8), entry(0, 12), entry(0, 20), entry(1, 9), entry(1, 23)];
        assert_eq!(streak(&log), 2);
    }

    #[test]
    fn input_order_does_not_matter() {
        assert_eq!(streak(&[entry(2, 10), entry(0, 10), entry(1, 10)]), 3);
    }

    #[test]
    fn future_entries_are_ignored() {
        assert_eq!(streak(&[entry(-1, 10), entry(0, 10), entry(1, 10)]), 2);
    }

    #[test]
    fn days_follow_the_given_timezone() {
        // 23:30 UTC yesterday is already today at UTC+2.
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let log = [entry(1, 23), entry(2, 10)];
        assert_eq!(calculate_streak_in(&log, &Utc, today()), 0);
        assert_eq!(calculate_streak_in(&log, &plus_two, today()), 1);
    }

    #[test]
    fn local_wrapper_matches_local_dates() {
        let now = Local::now();
        let log = [ActivityEntry::at(now.with_timezone(&Utc))];
        assert_eq!(calculate_streak(&log, now.date_naive()), 1);
        assert_eq!(current_streak(&[]), 0);
    }

    proptest! {
        #[test]
        fn streak_never_exceeds_distinct_days(offsets in proptest::collection::vec(0i64..40, 0..60)) {
            let log: Vec<ActivityEntry> = offsets.iter().map(|d| entry(*d, 12)).collect();
            let distinct: BTreeSet<i64> = offsets.iter().copied().collect();
            let s = streak(&log);
            prop_assert!(s as usize <= distinct.len());
            prop_assert_eq!(s > 0, distinct.contains(&0));
            // Every day inside the streak is present in the log.
            for d in 0..s as i64 {
                prop_assert!(distinct.contains(&d));
            }
            prop_assert!(!distinct.contains(&(s as i64)));
        }
    }
}
