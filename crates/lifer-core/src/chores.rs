//! Household chores: fixed-XP completions outside the leverage system.
//!
//! A recurring chore never stays completed; completing it resets it for the
//! next period and the completion lives only in the history ledger. Chores
//! never earn the morning bonus.

use crate::clock::Clock;
use crate::error::Result;
use crate::keys;
use crate::store::{self, Store};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    /// Weekdays, 0 = Sunday.
    Custom { days: Vec<u32> },
}

impl Recurrence {
    /// Days after which a completed chore becomes due again.
    fn period_days(&self) -> i64 {
        match self {
            Recurrence::Daily | Recurrence::Custom { .. } => 1,
            Recurrence::Weekly => 7,
            Recurrence::Monthly => 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chore {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub xp_reward: i64,
    /// `None` for one-time chores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<Recurrence>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reset: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChore {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub xp_reward: i64,
    pub recurring: Option<Recurrence>,
}

pub fn all(store: &dyn Store) -> Result<Vec<Chore>> {
    store::read_or_default(store, keys::CHORES)
}

pub fn save_all(store: &dyn Store, chores: &[Chore]) -> Result<()> {
    store::write(store, keys::CHORES, &chores)
}

pub fn get(store: &dyn Store, id: &str) -> Result<Option<Chore>> {
    Ok(all(store)?.into_iter().find(|c| c.id == id))
}

pub fn add(store: &dyn Store, clock: &dyn Clock, new: NewChore) -> Result<Chore> {
    let chore = Chore {
        id: Uuid::new_v4().to_string(),
        title: new.title,
        description: new.description,
        category: new.category,
        xp_reward: new.xp_reward,
        recurring: new.recurring,
        completed: false,
        completed_at: None,
        last_reset: None,
        created_at: clock.now(),
    };
    let mut chores = all(store)?;
    chores.push(chore.clone());
    save_all(store, &chores)?;
    Ok(chore)
}

pub fn update(
    store: &dyn Store,
    id: &str,
    mutate: impl FnOnce(&mut Chore),
) -> Result<Option<Chore>> {
    let mut chores = all(store)?;
    let Some(chore) = chores.iter_mut().find(|c| c.id == id) else {
        return Ok(None);
    };
    mutate(chore);
    let updated = chore.clone();
    save_all(store, &chores)?;
    Ok(Some(updated))
}

pub fn delete(store: &dyn Store, id: &str) -> Result<()> {
    let chores: Vec<Chore> = all(store)?.into_iter().filter(|c| c.id != id).collect();
    save_all(store, &chores)
}

fn days_since(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - then).num_days()
}

/// Chores visible today: one-time chores always, daily always, custom on the
/// scheduled weekday, weekly/monthly once their reset period has elapsed.
pub fn todays(store: &dyn Store, clock: &dyn Clock) -> Result<Vec<Chore>> {
    let now = clock.now();
    let weekday = now.weekday().num_days_from_sunday();
    Ok(all(store)?
        .into_iter()
        .filter(|c| match &c.recurring {
            None => true,
            Some(Recurrence::Daily) => true,
            Some(Recurrence::Custom { days }) => days.contains(&weekday),
            Some(freq) => match c.last_reset {
                None => true,
                Some(reset) => days_since(reset, now) >= freq.period_days(),
            },
        })
        .collect())
}

/// Mark a chore done. One-time chores stay completed; recurring chores reset
/// immediately for the next period. Returns the completion snapshot (for the
/// history record), or `None` for unknown ids and already-completed one-time
/// chores.
pub fn mark_completed(store: &dyn Store, clock: &dyn Clock, id: &str) -> Result<Option<Chore>> {
    let now = clock.now();
    let mut chores = all(store)?;
    let Some(chore) = chores.iter_mut().find(|c| c.id == id && !c.completed) else {
        return Ok(None);
    };

    let mut snapshot = chore.clone();
    snapshot.completed = true;
    snapshot.completed_at = Some(now);

    if chore.recurring.is_some() {
        chore.completed = false;
        chore.completed_at = None;
        chore.last_reset = Some(now);
    } else {
        chore.completed = true;
        chore.completed_at = Some(now);
    }
    save_all(store, &chores)?;
    Ok(Some(snapshot))
}

/// Reverse a one-time completion. Returns the chore and the XP to claw back.
pub fn mark_uncompleted(store: &dyn Store, id: &str) -> Result<Option<(Chore, i64)>> {
    let mut chores = all(store)?;
    let Some(chore) = chores.iter_mut().find(|c| c.id == id && c.completed) else {
        return Ok(None);
    };
    chore.completed = false;
    chore.completed_at = None;
    let reverted = chore.clone();
    let reclaimed = reverted.xp_reward;
    save_all(store, &chores)?;
    Ok(Some((reverted, reclaimed)))
}

/// Clear recurring chores whose period has elapsed since the last reset.
pub fn reset_due(store: &dyn Store, clock: &dyn Clock) -> Result<u32> {
    let now = clock.now();
    let mut chores = all(store)?;
    let mut reset = 0u32;

    for chore in chores.iter_mut() {
        let (Some(freq), Some(last)) = (&chore.recurring, chore.last_reset) else {
            continue;
        };
        if days_since(last, now) >= freq.period_days() {
            chore.completed = false;
            chore.last_reset = Some(now);
            reset += 1;
        }
    }

    if reset > 0 {
        save_all(store, &chores)?;
    }
    Ok(reset)
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
            // 2025-06-02 is a Monday.
            FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()),
        )
    }

    fn chore(title: &str, recurring: Option<Recurrence>) -> NewChore {
        NewChore {
            title: title.to_string(),
            description: None,
            category: Some("home".to_string()),
            xp_reward: 25,
            recurring,
        }
    }

    #[test]
    fn one_time_chore_stays_completed() {
        let (store, clock) = setup();
        let c = add(&store, &clock, chore("fix door", None)).unwrap();

        let snapshot = mark_completed(&store, &clock, &c.id).unwrap().unwrap();
        assert!(snapshot.completed);

        let stored = get(&store, &c.id).unwrap().unwrap();
        assert!(stored.completed);
        assert!(stored.completed_at.is_some());

        // Second completion is a no-op.
        assert!(mark_completed(&store, &clock, &c.id).unwrap().is_none());
    }

    #[test]
    fn recurring_chore_resets_on_completion() {
        let (store, clock) = setup();
        let c = add(&store, &clock, chore("dishes", Some(Recurrence::Daily))).unwrap();

        let snapshot = mark_completed(&store, &clock, &c.id).unwrap().unwrap();
        assert!(snapshot.completed);

        let stored = get(&store, &c.id).unwrap().unwrap();
        assert!(!stored.completed);
        assert_eq!(stored.last_reset, Some(clock.now()));
    }

    #[test]
    fn uncomplete_reverses_one_time_chore() {
        let (store, clock) = setup();
        let c = add(&store, &clock, chore("fix door", None)).unwrap();
        mark_completed(&store, &clock, &c.id).unwrap();

        let (reverted, reclaimed) = mark_uncompleted(&store, &c.id).unwrap().unwrap();
        assert!(!reverted.completed);
        assert_eq!(reclaimed, 25);
        assert!(mark_uncompleted(&store, &c.id).unwrap().is_none());
    }

    #[test]
    fn weekly_chore_hidden_until_period_elapses() {
        let (store, clock) = setup();
        let c = add(&store, &clock, chore("laundry", Some(Recurrence::Weekly))).unwrap();

        // Never reset: visible.
        assert_eq!(todays(&store, &clock).unwrap().len(), 1);

        mark_completed(&store, &clock, &c.id).unwrap();
        assert!(todays(&store, &clock).unwrap().is_empty());

        clock.advance_days(7);
        assert_eq!(todays(&store, &clock).unwrap().len(), 1);
    }

    #[test]
    fn custom_chore_visible_on_scheduled_weekday() {
        let (store, clock) = setup();
        // Monday only (2025-06-02 is a Monday).
        add(&store, &clock, chore("bins", Some(Recurrence::Custom { days: vec![1] }))).unwrap();
        assert_eq!(todays(&store, &clock).unwrap().len(), 1);
        clock.advance_days(1);
        assert!(todays(&store, &clock).unwrap().is_empty());
    }

    #[test]
    fn reset_due_clears_elapsed_recurring_chores() {
        let (store, clock) = setup();
        let daily = add(&store, &clock, chore("dishes", Some(Recurrence::Daily))).unwrap();
        mark_completed(&store, &clock, &daily.id).unwrap();

        assert_eq!(reset_due(&store, &clock).unwrap(), 0);
        clock.advance_days(1);
        assert_eq!(reset_due(&store, &clock).unwrap(), 1);
    }
}
