//! Marginal gains: compound-growth statistics over 1% improvements.
//!
//! Logs are append-only; every statistic is derived. The average improvement
//! is taken over logs while the compound multiplier is raised to the unique-
//! day count, so multiple same-day logs weight the average but not the
//! exponent. That asymmetry matches the product's "streak of improvement"
//! framing and is kept as-is.

use crate::clock::Clock;
use crate::error::Result;
use crate::keys;
use crate::store::{self, Store};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainCategory {
    Skill,
    Health,
    Productivity,
    Relationship,
    Mindset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginalGainLog {
    pub id: String,
    pub date: NaiveDate,
    pub category: GainCategory,
    pub description: String,
    pub improvement_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practice_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CategoryBreakdown {
    pub category: GainCategory,
    pub count: u64,
    pub avg_improvement: f64,
}

#[derive(Debug, Clone, Default)]
pub struct GainStats {
    pub total_days: u64,
    pub total_improvements: u64,
    /// Average over logs, not days.
    pub avg_daily_improvement: f64,
    /// `(1 + avg/100) ^ total_days`.
    pub current_multiplier: f64,
    pub category_breakdown: Vec<CategoryBreakdown>,
    pub longest_streak: u32,
    pub current_streak: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub multiplier: f64,
    pub percent_increase: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decline {
    pub multiplier: f64,
    pub percent_decrease: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnePercentComparison {
    pub better: Projection,
    pub worse: Decline,
    /// Ratio between the two multipliers.
    pub difference: f64,
}

pub fn logs(store: &dyn Store) -> Result<Vec<MarginalGainLog>> {
    store::read_or_default(store, keys::MARGINAL_GAINS)
}

pub fn logs_on(store: &dyn Store, date: NaiveDate) -> Result<Vec<MarginalGainLog>> {
    Ok(logs(store)?.into_iter().filter(|l| l.date == date).collect())
}

pub fn logs_by_category(store: &dyn Store, category: GainCategory) -> Result<Vec<MarginalGainLog>> {
    Ok(logs(store)?
        .into_iter()
        .filter(|l| l.category == category)
        .collect())
}

pub fn log(
    store: &dyn Store,
    clock: &dyn Clock,
    category: GainCategory,
    description: &str,
    improvement_percent: f64,
    practice_id: Option<String>,
) -> Result<MarginalGainLog> {
    let entry = MarginalGainLog {
        id: Uuid::new_v4().to_string(),
        date: clock.today(),
        category,
        description: description.to_string(),
        improvement_percent,
        practice_id,
        created_at: clock.now(),
    };
    let mut all = logs(store)?;
    all.push(entry.clone());
    store::write(store, keys::MARGINAL_GAINS, &all)?;
    Ok(entry)
}

pub fn delete(store: &dyn Store, id: &str) -> Result<()> {
    let all: Vec<MarginalGainLog> = logs(store)?.into_iter().filter(|l| l.id != id).collect();
    store::write(store, keys::MARGINAL_GAINS, &all)
}

/// Streaks over sorted unique dates. The current streak is live only when
/// the last logged date is today or yesterday (one grace day), else 0.
fn date_streaks(dates: &[NaiveDate], today: NaiveDate) -> (u32, u32) {
    let Some(&last) = dates.last() else {
        return (0, 0);
    };

    let mut longest = 1u32;
    let mut run = 1u32;
    for window in dates.windows(2) {
        if window[1] == window[0] + Duration::days(1) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 1;
        }
    }

    let current = if last == today || last == today - Duration::days(1) {
        let mut count = 1u32;
        for i in (0..dates.len().saturating_sub(1)).rev() {
            if dates[i] + Duration::days(1) == dates[i + 1] {
                count += 1;
            } else {
                break;
            }
        }
        count
    } else {
        0
    };

    (longest, current)
}

pub fn stats(store: &dyn Store, clock: &dyn Clock) -> Result<GainStats> {
    let all = logs(store)?;
    if all.is_empty() {
        return Ok(GainStats {
            current_multiplier: 1.0,
            ..GainStats::default()
        });
    }

    let unique_days: BTreeSet<NaiveDate> = all.iter().map(|l| l.date).collect();
    let total_days = unique_days.len() as u64;

    let total_improvement: f64 = all.iter().map(|l| l.improvement_percent).sum();
    let avg_daily_improvement = total_improvement / all.len() as f64;
    let current_multiplier = (1.0 + avg_daily_improvement / 100.0).powi(total_days as i32);

    let mut breakdown: Vec<CategoryBreakdown> = Vec::new();
    for log in &all {
        match breakdown.iter_mut().find(|b| b.category == log.category) {
            Some(entry) => {
                entry.count += 1;
                entry.avg_improvement += log.improvement_percent;
            }
            None => breakdown.push(CategoryBreakdown {
                category: log.category,
                count: 1,
                avg_improvement: log.improvement_percent,
            }),
        }
    }
    for entry in breakdown.iter_mut() {
        entry.avg_improvement /= entry.count as f64;
    }

    let dates: Vec<NaiveDate> = unique_days.into_iter().collect();
    let (longest_streak, current_streak) = date_streaks(&dates, clock.today());

    Ok(GainStats {
        total_days,
        total_improvements: all.len() as u64,
        avg_daily_improvement,
        current_multiplier,
        category_breakdown: breakdown,
        longest_streak,
        current_streak,
    })
}

/// Compound-growth projection for a constant daily improvement.
pub fn projection(avg_daily_improvement: f64, days: u32) -> Projection {
    let multiplier = (1.0 + avg_daily_improvement / 100.0).powi(days as i32);
    Projection {
        multiplier,
        percent_increase: (multiplier - 1.0) * 100.0,
    }
}

/// The classic "1% better vs 1% worse" illustration. Pure and deterministic.
pub fn one_percent_comparison(days: u32) -> OnePercentComparison {
    let better = 1.01f64.powi(days as i32);
    let worse = 0.99f64.powi(days as i32);
    OnePercentComparison {
        better: Projection {
            multiplier: better,
            percent_increase: (better - 1.0) * 100.0,
        },
        worse: Decline {
            multiplier: worse,
            percent_decrease: (1.0 - worse) * 100.0,
        },
        difference: better / worse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn setup() -> (MemoryStore, FixedClock) {
        (
            MemoryStore::new(),
            FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()),
        )
    }

    #[test]
    fn seventy_day_one_percent_comparison() {
        let c = one_percent_comparison(70);
        assert!((c.better.multiplier - 2.007).abs() < 0.01);
        assert!((c.worse.multiplier - 0.495).abs() < 0.01);
        assert!((c.difference - 4.06).abs() < 0.01);
    }

    #[test]
    fn empty_stats_are_identity() {
        let (store, clock) = setup();
        let stats = stats(&store, &clock).unwrap();
        assert_eq!(stats.total_days, 0);
        assert_eq!(stats.current_multiplier, 1.0);
        assert_eq!(stats.current_streak, 0);
    }

    #[test]
    fn average_is_per_log_but_exponent_is_per_day() {
        let (store, clock) = setup();
        // Two logs on one day, one on the next: 3 logs, 2 unique days.
        log(&store, &clock, GainCategory::Skill, "read", 1.0, None).unwrap();
        log(&store, &clock, GainCategory::Health, "walk", 2.0, None).unwrap();
        clock.advance_days(1);
        log(&store, &clock, GainCategory::Skill, "practice", 3.0, None).unwrap();

        let stats = stats(&store, &clock).unwrap();
        assert_eq!(stats.total_improvements, 3);
        assert_eq!(stats.total_days, 2);
        assert!((stats.avg_daily_improvement - 2.0).abs() < 1e-9);
        assert!((stats.current_multiplier - 1.02f64.powi(2)).abs() < 1e-9);
    }

    #[test]
    fn category_breakdown_averages_per_category() {
        let (store, clock) = setup();
        log(&store, &clock, GainCategory::Skill, "a", 1.0, None).unwrap();
        log(&store, &clock, GainCategory::Skill, "b", 3.0, None).unwrap();
        log(&store, &clock, GainCategory::Mindset, "c", 5.0, None).unwrap();

        let stats = stats(&store, &clock).unwrap();
        let skill = stats
            .category_breakdown
            .iter()
            .find(|b| b.category == GainCategory::Skill)
            .unwrap();
        assert_eq!(skill.count, 2);
        assert!((skill.avg_improvement - 2.0).abs() < 1e-9);
    }

    #[test]
    fn streak_has_one_grace_day() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let d = |offset: i64| today - Duration::days(offset);

        // Ends yesterday: still live.
        let (longest, current) = date_streaks(&[d(3), d(2), d(1)], today);
        assert_eq!(longest, 3);
        assert_eq!(current, 3);

        // Ends two days ago: dead.
        let (longest, current) = date_streaks(&[d(4), d(3), d(2)], today);
        assert_eq!(longest, 3);
        assert_eq!(current, 0);

        // Broken run: longest spans the best segment only.
        let (longest, current) = date_streaks(&[d(9), d(8), d(7), d(1), d(0)], today);
        assert_eq!(longest, 3);
        assert_eq!(current, 2);
    }

    #[test]
    fn delete_removes_by_id() {
        let (store, clock) = setup();
        let entry = log(&store, &clock, GainCategory::Skill, "a", 1.0, None).unwrap();
        log(&store, &clock, GainCategory::Skill, "b", 1.0, None).unwrap();
        delete(&store, &entry.id).unwrap();
        assert_eq!(logs(&store).unwrap().len(), 1);
    }
}
