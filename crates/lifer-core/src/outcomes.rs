//! Outcomes: the "result + purpose" goals tasks link to.
//!
//! An active outcome with no progress update for 7 days is flagged stalled by
//! the daily sweep. Progress and linked-task counts are derived from the task
//! repository, never edited directly.

use crate::clock::Clock;
use crate::error::Result;
use crate::keys;
use crate::store::{self, Store};
use crate::tasks;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Days without a progress update before an active outcome stalls.
pub const STALL_AFTER_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Active,
    Completed,
    Stalled,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub id: String,
    /// What will exist when this is done.
    pub result: String,
    /// Why it matters.
    pub purpose: String,
    pub status: OutcomeStatus,
    /// 0-100.
    pub progress: u8,
    #[serde(default)]
    pub linked_task_count: u32,
    pub last_progress_update: DateTime<Utc>,
    #[serde(default)]
    pub stalled_days: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

pub fn all(store: &dyn Store) -> Result<Vec<Outcome>> {
    store::read_or_default(store, keys::OUTCOMES)
}

pub fn save_all(store: &dyn Store, outcomes: &[Outcome]) -> Result<()> {
    store::write(store, keys::OUTCOMES, &outcomes)
}

pub fn get(store: &dyn Store, id: &str) -> Result<Option<Outcome>> {
    Ok(all(store)?.into_iter().find(|o| o.id == id))
}

pub fn active(store: &dyn Store) -> Result<Vec<Outcome>> {
    Ok(all(store)?
        .into_iter()
        .filter(|o| o.status == OutcomeStatus::Active)
        .collect())
}

pub fn add(store: &dyn Store, clock: &dyn Clock, result: &str, purpose: &str) -> Result<Outcome> {
    let now = clock.now();
    let outcome = Outcome {
        id: Uuid::new_v4().to_string(),
        result: result.to_string(),
        purpose: purpose.to_string(),
        status: OutcomeStatus::Active,
        progress: 0,
        linked_task_count: 0,
        last_progress_update: now,
        stalled_days: 0,
        created_at: now,
        completed_at: None,
        archived_at: None,
    };
    let mut outcomes = all(store)?;
    outcomes.push(outcome.clone());
    save_all(store, &outcomes)?;
    Ok(outcome)
}

/// Apply a mutation and refresh `last_progress_update`. Any update counts as
/// progress for stall detection. `Ok(None)` for unknown ids.
pub fn update(
    store: &dyn Store,
    clock: &dyn Clock,
    id: &str,
    mutate: impl FnOnce(&mut Outcome),
) -> Result<Option<Outcome>> {
    let mut outcomes = all(store)?;
    let Some(outcome) = outcomes.iter_mut().find(|o| o.id == id) else {
        return Ok(None);
    };
    mutate(outcome);
    outcome.progress = outcome.progress.min(100);
    outcome.last_progress_update = clock.now();
    let updated = outcome.clone();
    save_all(store, &outcomes)?;
    Ok(Some(updated))
}

pub fn delete(store: &dyn Store, id: &str) -> Result<()> {
    let outcomes: Vec<Outcome> = all(store)?.into_iter().filter(|o| o.id != id).collect();
    save_all(store, &outcomes)
}

pub fn complete(store: &dyn Store, clock: &dyn Clock, id: &str) -> Result<Option<Outcome>> {
    let now = clock.now();
    update(store, clock, id, |o| {
        o.status = OutcomeStatus::Completed;
        o.progress = 100;
        o.completed_at = Some(now);
    })
}

pub fn archive(store: &dyn Store, clock: &dyn Clock, id: &str) -> Result<Option<Outcome>> {
    let now = clock.now();
    update(store, clock, id, |o| {
        o.status = OutcomeStatus::Archived;
        o.archived_at = Some(now);
    })
}

/// Recount active tasks linked to this outcome.
pub fn refresh_linked_task_count(
    store: &dyn Store,
    clock: &dyn Clock,
    outcome_id: &str,
) -> Result<Option<Outcome>> {
    let linked = tasks::by_outcome(store, outcome_id)?
        .into_iter()
        .filter(|t| !t.completed)
        .count() as u32;
    update(store, clock, outcome_id, |o| o.linked_task_count = linked)
}

/// Flag active outcomes with no progress update for [`STALL_AFTER_DAYS`].
/// Returns the newly stalled outcomes.
pub fn check_stalled(store: &dyn Store, clock: &dyn Clock) -> Result<Vec<Outcome>> {
    let now = clock.now();
    let mut outcomes = all(store)?;
    let mut stalled = Vec::new();

    for outcome in outcomes.iter_mut() {
        if outcome.status != OutcomeStatus::Active {
            continue;
        }
        let quiet_days = (now - outcome.last_progress_update).num_days();
        if quiet_days >= STALL_AFTER_DAYS {
            outcome.status = OutcomeStatus::Stalled;
            outcome.stalled_days = quiet_days;
            tracing::info!(outcome = %outcome.result, days = quiet_days, "outcome stalled");
            stalled.push(outcome.clone());
        }
    }

    if !stalled.is_empty() {
        save_all(store, &outcomes)?;
    }
    Ok(stalled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use crate::tasks::NewTask;
    use chrono::TimeZone;

    fn setup() -> (MemoryStore, FixedClock) {
        (
            MemoryStore::new(),
            FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()),
        )
    }

    #[test]
    fn complete_pins_progress_to_full() {
        let (store, clock) = setup();
        let o = add(&store, &clock, "ship v1", "prove the idea").unwrap();
        let done = complete(&store, &clock, &o.id).unwrap().unwrap();
        assert_eq!(done.status, OutcomeStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn quiet_week_stalls_an_active_outcome() {
        let (store, clock) = setup();
        let o = add(&store, &clock, "ship v1", "prove the idea").unwrap();

        clock.advance_days(6);
        assert!(check_stalled(&store, &clock).unwrap().is_empty());

        clock.advance_days(1);
        let stalled = check_stalled(&store, &clock).unwrap();
        assert_eq!(stalled.len(), 1);
        assert_eq!(stalled[0].status, OutcomeStatus::Stalled);
        assert_eq!(stalled[0].stalled_days, 7);

        // An update revives the timer.
        update(&store, &clock, &o.id, |o| {
            o.status = OutcomeStatus::Active;
            o.progress = 30;
        })
        .unwrap();
        assert!(check_stalled(&store, &clock).unwrap().is_empty());
    }

    #[test]
    fn linked_task_count_tracks_active_tasks() {
        let (store, clock) = setup();
        let o = add(&store, &clock, "ship v1", "prove the idea").unwrap();

        let task = tasks::add(
            &store,
            &clock,
            NewTask {
                title: "write docs".to_string(),
                description: None,
                leverage_score: 5,
                outcome_id: Some(o.id.clone()),
                is_morning_task: false,
            },
        )
        .unwrap();

        let refreshed = refresh_linked_task_count(&store, &clock, &o.id).unwrap().unwrap();
        assert_eq!(refreshed.linked_task_count, 1);

        tasks::mark_completed(&store, &clock, &task.id, 50).unwrap();
        let refreshed = refresh_linked_task_count(&store, &clock, &o.id).unwrap().unwrap();
        assert_eq!(refreshed.linked_task_count, 0);
    }

    #[test]
    fn unknown_outcome_is_none() {
        let (store, clock) = setup();
        assert!(complete(&store, &clock, "nope").unwrap().is_none());
        assert!(archive(&store, &clock, "nope").unwrap().is_none());
    }
}
