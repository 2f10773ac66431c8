//! Injectable time source plus calendar-day helpers.
//!
//! Every "today" comparison in the tracker flows through a [`Clock`] so the
//! day-boundary logic (streaks, misses, alignment) is testable without
//! sleeping across midnight.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use std::sync::Mutex;

/// Start of the morning window (inclusive), hour of day.
pub const MORNING_WINDOW_START: u32 = 5;
/// End of the morning window (exclusive), hour of day.
pub const MORNING_WINDOW_END: u32 = 9;

/// Current-time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date of "now".
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += duration;
        }
    }

    /// Move the clock forward by whole days.
    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|g| *g).unwrap_or_else(|p| *p.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Result of comparing a previous timestamp against "now" at day granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTransition {
    pub is_new_day: bool,
    /// Whole calendar days between the two dates. Negative if `last` is in
    /// the future (clock skew); callers treat that as "not a new day".
    pub days_elapsed: i64,
}

/// Pure day-boundary detection.
pub fn day_transition(last: DateTime<Utc>, now: DateTime<Utc>) -> DayTransition {
    let elapsed = (now.date_naive() - last.date_naive()).num_days();
    DayTransition {
        is_new_day: elapsed > 0,
        days_elapsed: elapsed,
    }
}

/// Whether a timestamp falls inside the fixed morning window.
pub fn in_morning_window(now: DateTime<Utc>) -> bool {
    let hour = now.hour();
    (MORNING_WINDOW_START..MORNING_WINDOW_END).contains(&hour)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn same_day_is_not_a_transition() {
        let t = day_transition(at(2025, 3, 10, 8), at(2025, 3, 10, 23));
        assert!(!t.is_new_day);
        assert_eq!(t.days_elapsed, 0);
    }

    #[test]
    fn midnight_rollover_is_one_day() {
        let t = day_transition(at(2025, 3, 10, 23), at(2025, 3, 11, 0));
        assert!(t.is_new_day);
        assert_eq!(t.days_elapsed, 1);
    }

    #[test]
    fn multi_day_gap_counts_days() {
        let t = day_transition(at(2025, 3, 1, 12), at(2025, 3, 5, 12));
        assert_eq!(t.days_elapsed, 4);
    }

    #[test]
    fn future_last_is_not_new_day() {
        let t = day_transition(at(2025, 3, 11, 1), at(2025, 3, 10, 23));
        assert!(!t.is_new_day);
    }

    #[test]
    fn morning_window_bounds() {
        assert!(!in_morning_window(at(2025, 3, 10, 4)));
        assert!(in_morning_window(at(2025, 3, 10, 5)));
        assert!(in_morning_window(at(2025, 3, 10, 8)));
        assert!(!in_morning_window(at(2025, 3, 10, 9)));
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(at(2025, 3, 10, 8));
        clock.advance_days(2);
        assert_eq!(clock.today(), at(2025, 3, 12, 8).date_naive());
    }
}
