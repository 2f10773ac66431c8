//! "Never miss twice" recovery tracking.
//!
//! Per-practice state machine: on_track → (miss) → at_risk → (miss again) →
//! critical. Misses are detected lazily by [`mark_missed`]; completing from
//! any miss state records a [`RecoveryEvent`] and returns to on_track (that
//! transition lives in [`crate::practices::log`], which owns the practice
//! write).

use crate::clock::{day_transition, Clock};
use crate::error::Result;
use crate::keys;
use crate::practices::{self, Practice, PracticeKind};
use crate::store::{self, Store};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryEvent {
    pub id: String,
    pub practice_id: String,
    pub practice_name: String,
    pub missed_date: NaiveDate,
    pub recovered_date: NaiveDate,
    /// Consecutive misses before the bounce-back.
    pub miss_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_strategy: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RecoveryEvent {
    pub fn new(practice: &Practice, missed: NaiveDate, miss_count: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            practice_id: practice.id.clone(),
            practice_name: practice.name.clone(),
            missed_date: missed,
            recovered_date: now.date_naive(),
            miss_count,
            recovery_strategy: None,
            timestamp: now,
        }
    }
}

pub fn events(store: &dyn Store) -> Result<Vec<RecoveryEvent>> {
    store::read_or_default(store, keys::RECOVERY_EVENTS)
}

pub fn events_for_practice(store: &dyn Store, practice_id: &str) -> Result<Vec<RecoveryEvent>> {
    Ok(events(store)?
        .into_iter()
        .filter(|e| e.practice_id == practice_id)
        .collect())
}

pub fn record(store: &dyn Store, event: RecoveryEvent) -> Result<()> {
    let mut all = events(store)?;
    all.push(event);
    store::write(store, keys::RECOVERY_EVENTS, &all)
}

/// Sweep today's scheduled practices for misses.
///
/// A practice is missed when its last log date is not today and at least one
/// day has elapsed. Each unlogged day counts at most one miss: a repeated
/// sweep on the same day is a no-op (`last_miss_date` gate), so the at-risk
/// flag is set only on the first miss transition.
pub fn mark_missed(store: &dyn Store, clock: &dyn Clock) -> Result<Vec<Practice>> {
    let now = clock.now();
    let today = now.date_naive();
    let weekday = now.weekday().num_days_from_sunday();

    let mut all = practices::all(store)?;
    let mut newly_missed = Vec::new();

    for practice in all.iter_mut() {
        if !practice.frequency.scheduled_on(weekday) {
            continue;
        }
        let transition = day_transition(practice.last_logged_at, now);
        if !transition.is_new_day {
            continue;
        }
        if practice.last_miss_date == Some(today) {
            continue; // already counted this day
        }

        practice.consecutive_misses += 1;
        practice.last_miss_date = Some(today);
        practice.at_risk = practice.consecutive_misses == 1;
        if practice.at_risk {
            tracing::debug!(practice = %practice.name, "practice at risk");
        } else {
            tracing::warn!(
                practice = %practice.name,
                misses = practice.consecutive_misses,
                "practice critical"
            );
        }
        newly_missed.push(practice.clone());
    }

    if !newly_missed.is_empty() {
        practices::save_all(store, &all)?;
    }
    Ok(newly_missed)
}

/// Aggregate recovery stats for one practice.
#[derive(Debug, Clone, Default)]
pub struct RecoveryStats {
    pub total_recoveries: u32,
    pub average_miss_count: f64,
    pub last_recovery_date: Option<NaiveDate>,
    /// Longest run of single-miss recoveries (caught it the next day).
    pub longest_recovery_streak: u32,
}

pub fn stats_for_practice(store: &dyn Store, practice_id: &str) -> Result<RecoveryStats> {
    let events = events_for_practice(store, practice_id)?;
    if events.is_empty() {
        return Ok(RecoveryStats::default());
    }

    let total = events.len() as u32;
    let average = events.iter().map(|e| f64::from(e.miss_count)).sum::<f64>() / f64::from(total);
    let last = events.last().map(|e| e.recovered_date);

    let mut run = 0u32;
    let mut longest = 0u32;
    for event in &events {
        if event.miss_count == 1 {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }

    Ok(RecoveryStats {
        total_recoveries: total,
        average_miss_count: average,
        last_recovery_date: last,
        longest_recovery_streak: longest,
    })
}

/// Nudge text for a missed practice. Gentle after one miss, urgent after two;
/// personalized with four-laws hooks when present. Presentation layered on
/// the state machine, not part of it.
pub fn suggestions(practice: &Practice) -> Vec<String> {
    let mut out = Vec::new();
    let misses = practice.consecutive_misses;

    if misses == 1 {
        out.push("You missed once - that's an accident. Let's get back on track today!".to_string());
        out.push("Your streak isn't broken yet. One small action now saves your progress.".to_string());
        out.push(format!(
            "Remember: \"I am a person who {}.\" Prove it today.",
            practice.name.to_lowercase()
        ));

        if let Some(laws) = &practice.four_laws {
            if let Some(gateway) = &laws.gateway {
                out.push(format!("Start with just: \"{gateway}\" (your 2-min version)"));
            }
            if let (Some(time), Some(location)) = (&laws.time, &laws.location) {
                out.push(format!("Do it NOW: {time} at {location}"));
            }
            if let Some(bundle) = &laws.bundle {
                out.push(format!("Reward yourself: {bundle}"));
            }
        }

        if practice.kind == PracticeKind::Positive {
            out.push(format!(
                "Even {} {} is better than 0.",
                (practice.target * 0.5).floor(),
                practice.unit
            ));
            out.push("Lower the bar for today. Just show up.".to_string());
        }

        if practice.leverage_score.is_some_and(|score| score >= 7) {
            out.push("This is high-leverage. Missing it twice compounds negatively.".to_string());
        }
    } else if misses >= 2 {
        out.push("STOP. Missing twice is the start of a new (bad) habit.".to_string());
        out.push("This is the moment. What you do next defines who you become.".to_string());
        out.push("Emergency protocol: Do ANY version of this habit in the next 5 minutes.".to_string());

        match practice.four_laws.as_ref().and_then(|l| l.gateway.as_ref()) {
            Some(gateway) => out.push(format!("RIGHT NOW: \"{gateway}\" - that's all.")),
            None => out.push(format!(
                "RIGHT NOW: Do just 10% of \"{}\" - that's all.",
                practice.name
            )),
        }
    }

    if practice.recovery_count > 0 {
        let times = if practice.recovery_count > 1 { "times" } else { "time" };
        out.push(format!(
            "You've bounced back {} {times} before. You can do it again.",
            practice.recovery_count
        ));
    }

    out
}
