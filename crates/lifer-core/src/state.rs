//! Singleton user state: XP, level, daily streak, derived health stats.
//!
//! The leveling rule is the heart of the progression engine: each level
//! requires `level * 100` XP, and excess XP rolls into level-ups so that
//! `xp < xp_for_next_level` always holds after a grant.

use crate::clock::{day_transition, Clock};
use crate::error::Result;
use crate::history::{self, EntryKind};
use crate::keys;
use crate::practices::{self, Practice, PracticeKind};
use crate::store::{self, Store};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserState {
    pub xp: i64,
    pub level: u32,
    pub xp_for_next_level: i64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub morning_control_count: u32,
    pub lifetime_leverage_ratio: f64,
    pub last7_days_leverage_ratio: f64,
    // Health stats, 0-100, derived from core practice completion.
    pub hydration: u8,
    pub strength: u8,
    pub energy: u8,
    pub focus: u8,
    pub recovery: u8,
    pub last_active: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UserState {
    pub fn first_run(now: DateTime<Utc>) -> Self {
        Self {
            xp: 0,
            level: 1,
            xp_for_next_level: 100,
            current_streak: 0,
            longest_streak: 0,
            morning_control_count: 0,
            lifetime_leverage_ratio: 0.0,
            last7_days_leverage_ratio: 0.0,
            hydration: 0,
            strength: 0,
            energy: 0,
            focus: 0,
            recovery: 0,
            last_active: now,
            created_at: now,
        }
    }
}

/// XP threshold for a given level.
fn threshold_for(level: u32) -> i64 {
    i64::from(level) * 100
}

/// Apply an XP delta and normalize. Positive deltas roll excess XP into
/// level-ups; negative deltas (uncompletion reversal) walk levels back down
/// but never below level 1, and XP is clamped at 0.
pub fn apply_xp(state: &mut UserState, amount: i64) {
    state.xp += amount;

    while state.xp >= state.xp_for_next_level {
        state.xp -= state.xp_for_next_level;
        state.level += 1;
        state.xp_for_next_level = threshold_for(state.level);
        tracing::debug!(level = state.level, "level up");
    }

    while state.xp < 0 && state.level > 1 {
        state.level -= 1;
        state.xp_for_next_level = threshold_for(state.level);
        state.xp += state.xp_for_next_level;
    }
    if state.xp < 0 {
        state.xp = 0;
    }
}

pub fn get(store: &dyn Store) -> Result<Option<UserState>> {
    store::read(store, keys::USER_STATE)
}

/// Load the singleton, creating it on first run.
pub fn get_or_init(store: &dyn Store, clock: &dyn Clock) -> Result<UserState> {
    match get(store)? {
        Some(state) => Ok(state),
        None => {
            let state = UserState::first_run(clock.now());
            store::write(store, keys::USER_STATE, &state)?;
            Ok(state)
        }
    }
}

/// Read-modify-write on the singleton. Refreshes `last_active`. Returns
/// `None` when the state has never been initialized.
pub fn update(
    store: &dyn Store,
    clock: &dyn Clock,
    mutate: impl FnOnce(&mut UserState),
) -> Result<Option<UserState>> {
    let Some(mut state) = get(store)? else {
        return Ok(None);
    };
    mutate(&mut state);
    state.last_active = clock.now();
    store::write(store, keys::USER_STATE, &state)?;
    Ok(Some(state))
}

pub fn grant_xp(store: &dyn Store, clock: &dyn Clock, amount: i64) -> Result<Option<UserState>> {
    update(store, clock, |state| apply_xp(state, amount))
}

/// Advance or reset the user-level daily streak. Gated to once per calendar
/// day via `last_active`: a second call on the same day is a no-op.
pub fn update_streak(
    store: &dyn Store,
    clock: &dyn Clock,
    completed: bool,
) -> Result<Option<UserState>> {
    let Some(state) = get(store)? else {
        return Ok(None);
    };
    if !day_transition(state.last_active, clock.now()).is_new_day {
        return Ok(Some(state));
    }
    update(store, clock, |state| {
        if completed {
            state.current_streak += 1;
        } else {
            state.current_streak = 0;
        }
        state.longest_streak = state.longest_streak.max(state.current_streak);
    })
}

pub fn increment_morning_control(store: &dyn Store, clock: &dyn Clock) -> Result<Option<UserState>> {
    update(store, clock, |state| state.morning_control_count += 1)
}

fn completion_percent(practice: Option<&Practice>) -> f64 {
    match practice {
        Some(p) if p.kind == PracticeKind::Positive && p.target > 0.0 => {
            (p.today_value / p.target * 100.0).min(100.0)
        }
        _ => 0.0,
    }
}

/// Recompute health stats from today's core-practice completion.
pub fn recalc_health(store: &dyn Store, clock: &dyn Clock) -> Result<Option<UserState>> {
    let all = practices::all(store)?;
    let by_name = |name: &str| all.iter().find(|p| p.name == name);

    let water = completion_percent(by_name(practices::WATER_INTAKE));
    let protein = completion_percent(by_name(practices::PROTEIN));
    let sleep = completion_percent(by_name(practices::SLEEP));
    let lifting = completion_percent(by_name(practices::STRENGTH_TRAINING));
    let cardio = completion_percent(by_name(practices::CARDIO));
    let deep_work = completion_percent(by_name(practices::HIGH_LEVERAGE_WORK));
    let power_hour = completion_percent(by_name(practices::MORNING_POWER_HOUR));

    let as_stat = |value: f64| value.round().clamp(0.0, 100.0) as u8;

    update(store, clock, |state| {
        state.hydration = as_stat(water);
        state.strength = as_stat((protein + lifting) / 2.0);
        state.energy = as_stat((sleep + cardio) / 2.0);
        state.focus = as_stat((deep_work + power_hour) / 2.0);
        state.recovery = as_stat(sleep);
    })
}

/// Recompute lifetime and trailing-7-day average leverage from the task
/// ledger.
pub fn recalc_leverage_ratios(store: &dyn Store, clock: &dyn Clock) -> Result<Option<UserState>> {
    let tasks = history::by_kind(store, EntryKind::Task)?;
    let avg = |records: &[&crate::history::HistoryRecord]| -> f64 {
        let scores: Vec<f64> = records
            .iter()
            .filter_map(|r| r.leverage_score.map(f64::from))
            .collect();
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    };

    let cutoff = clock.now() - Duration::days(7);
    let lifetime: Vec<&crate::history::HistoryRecord> = tasks.iter().collect();
    let recent: Vec<&crate::history::HistoryRecord> =
        tasks.iter().filter(|r| r.completed_at >= cutoff).collect();

    let lifetime_ratio = avg(&lifetime);
    let recent_ratio = avg(&recent);

    update(store, clock, |state| {
        state.lifetime_leverage_ratio = lifetime_ratio;
        state.last7_days_leverage_ratio = recent_ratio;
    })
}
