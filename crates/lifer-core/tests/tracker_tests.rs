//! End-to-end tests for the tracker facade.
//!
//! Tests verify:
//! - First-run seeding is idempotent
//! - Task completion flows XP, streaks, history, and votes together
//! - Practice logging drives streaks, recovery, and health stats
//! - Achievement unlocks persist and are never re-emitted
//! - The daily sweep composes every maintenance pass

use lifer_core::clock::FixedClock;
use lifer_core::identity::{self, ActionKind, VoteDirection};
use lifer_core::store::MemoryStore;
use lifer_core::tasks::{self, NewTask};
use lifer_core::{achievements, chores, gains, history, outcomes, practices, recovery, state};
use lifer_core::{LiferError, Tracker};

use chrono::{TimeZone, Utc};
use std::sync::Arc;

/// Tracker over a memory store with a controllable clock. Starts on a Monday
/// afternoon so nothing lands in the morning window by accident.
fn tracker() -> (Tracker, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap(),
    ));
    let tracker = Tracker::new(Box::new(MemoryStore::new()), Box::new(clock.clone()));
    tracker.init().unwrap();
    (tracker, clock)
}

fn task(title: &str, score: u8) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: None,
        leverage_score: score,
        outcome_id: None,
        is_morning_task: false,
    }
}

fn practice_id(tracker: &Tracker, name: &str) -> String {
    practices::all(tracker.store())
        .unwrap()
        .into_iter()
        .find(|p| p.name == name)
        .unwrap()
        .id
}

#[test]
fn first_run_creates_state_and_catalog() {
    let (tracker, _clock) = tracker();

    let state = state::get(tracker.store()).unwrap().unwrap();
    assert_eq!(state.level, 1);
    assert_eq!(state.xp, 0);
    assert_eq!(state.xp_for_next_level, 100);

    let seeded = practices::all(tracker.store()).unwrap();
    assert_eq!(seeded.len(), practices::core_catalog_len());
    assert!(seeded.iter().any(|p| p.name == practices::WATER_INTAKE));

    // Running init again changes nothing.
    tracker.init().unwrap();
    assert_eq!(
        practices::all(tracker.store()).unwrap().len(),
        practices::core_catalog_len()
    );
}

#[test]
fn task_completion_flows_through_every_ledger() {
    let (tracker, clock) = tracker();
    identity::set_statement(tracker.store(), tracker.clock(), "I am a builder").unwrap();

    clock.advance_days(1);
    let t = tasks::add(tracker.store(), tracker.clock(), task("ship feature", 9)).unwrap();
    let completion = tracker.complete_task(&t.id).unwrap().unwrap();
    assert_eq!(completion.xp_earned, 90);

    let state = state::get(tracker.store()).unwrap().unwrap();
    assert_eq!(state.xp, 90);
    assert_eq!(state.current_streak, 1);
    assert!((state.lifetime_leverage_ratio - 9.0).abs() < 1e-9);

    let records = history::all(tracker.store()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].leverage_score, Some(9));
    assert_eq!(records[0].xp_earned, 90);

    let votes = identity::votes(tracker.store()).unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].direction, VoteDirection::For);

    // Reversal claws back the XP but keeps the ledger.
    tracker.uncomplete_task(&t.id).unwrap().unwrap();
    let state = state::get(tracker.store()).unwrap().unwrap();
    assert_eq!(state.xp, 0);
    assert_eq!(history::all(tracker.store()).unwrap().len(), 1);
}

#[test]
fn practice_log_updates_streak_strength_and_health() {
    let (tracker, clock) = tracker();
    let water = practice_id(&tracker, practices::WATER_INTAKE);

    clock.advance_days(1);
    let logged = tracker.log_practice(&water, 2500.0).unwrap().unwrap();
    assert!(logged.completed);
    assert!(logged.new_day);
    assert_eq!(logged.practice.current_streak, 1);
    assert_eq!(logged.practice.habit_strength, 2);

    // Hydration is derived from the water practice, capped at 100.
    let state = state::get(tracker.store()).unwrap().unwrap();
    assert_eq!(state.hydration, 100);
}

#[test]
fn missed_practice_recovers_on_next_completion() {
    let (tracker, clock) = tracker();
    let water = practice_id(&tracker, practices::WATER_INTAKE);

    clock.advance_days(1);
    tracker.daily_sweep().unwrap();
    let at_risk = practices::at_risk(tracker.store()).unwrap();
    assert!(at_risk.iter().any(|p| p.id == water));

    let logged = tracker.log_practice(&water, 2200.0).unwrap().unwrap();
    assert_eq!(logged.practice.consecutive_misses, 0);
    assert_eq!(logged.practice.recovery_count, 1);

    let events = recovery::events_for_practice(tracker.store(), &water).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].miss_count, 1);
}

#[test]
fn achievements_unlock_once_across_tracker_instances() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap(),
    ));

    let tracker = Tracker::new(Box::new(store.clone()), Box::new(clock.clone()));
    tracker.init().unwrap();

    for i in 0..10 {
        let t = tasks::add(tracker.store(), tracker.clock(), task(&format!("t{i}"), 7)).unwrap();
        tracker.complete_task(&t.id).unwrap();
    }
    let ids = achievements::unlocked_ids(tracker.store()).unwrap();
    assert!(ids.contains(&"task_novice".to_string()));
    assert!(ids.contains(&"high_value".to_string()));

    // A fresh tracker over the same store sees the unlocks and re-emits nothing.
    let second = Tracker::new(Box::new(store), Box::new(clock));
    second.init().unwrap();
    assert!(second.check_achievements().unwrap().is_empty());
}

#[test]
fn manual_vote_requires_identity_but_gain_does_not() {
    let (tracker, _clock) = tracker();

    let err = tracker
        .add_vote("read a chapter", ActionKind::Other, VoteDirection::For)
        .unwrap_err();
    assert!(matches!(err, LiferError::NoIdentity));

    tracker
        .log_gain(gains::GainCategory::Skill, "read a chapter", 1.0)
        .unwrap();
    assert_eq!(gains::logs(tracker.store()).unwrap().len(), 1);
}

#[test]
fn sweep_composes_spawns_resets_misses_and_stalls() {
    let (tracker, clock) = tracker();

    tasks::add_template(tracker.store(), tracker.clock(), task("daily review", 6)).unwrap();
    outcomes::add(tracker.store(), tracker.clock(), "launch", "prove demand").unwrap();
    let chore = chores::add(
        tracker.store(),
        tracker.clock(),
        chores::NewChore {
            title: "dishes".to_string(),
            description: None,
            category: None,
            xp_reward: 10,
            recurring: Some(chores::Recurrence::Daily),
        },
    )
    .unwrap();
    tracker.complete_chore(&chore.id).unwrap();

    let report = tracker.daily_sweep().unwrap();
    assert_eq!(report.spawned_tasks.len(), 1);
    assert_eq!(report.reset_chores, 0);
    assert!(report.stalled_outcomes.is_empty());

    clock.advance_days(7);
    let report = tracker.daily_sweep().unwrap();
    assert_eq!(report.spawned_tasks.len(), 1);
    assert_eq!(report.reset_chores, 1);
    assert!(!report.missed_practices.is_empty());
    assert_eq!(report.stalled_outcomes.len(), 1);
}
