//! Append-only completion ledger.
//!
//! Every completion (task, practice, chore, outcome) lands here as an
//! immutable record. All derived statistics (achievements, totals, leverage
//! ratios) are folds over this log; records are never mutated or deleted.

use crate::clock::Clock;
use crate::error::Result;
use crate::keys;
use crate::practices::PracticeKind;
use crate::store::{self, Store};
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Task,
    Practice,
    Outcome,
    Chore,
}

/// One completion event. The snapshot freezes the entity as it looked when
/// the record was written, so later edits cannot rewrite the past.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub kind: EntryKind,
    pub entity_id: String,
    pub entity_snapshot: serde_json::Value,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub xp_earned: i64,
    pub was_in_morning_window: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habit_strength: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practice_kind: Option<PracticeKind>,
    #[serde(default)]
    pub slip_occurred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chore_category: Option<String>,
    pub day_of_week: u32,
    pub hour_of_day: u32,
}

impl HistoryRecord {
    /// Bare record with day/hour metadata filled from the clock. Callers set
    /// the kind-specific fields before appending.
    pub fn new(kind: EntryKind, entity_id: &str, clock: &dyn Clock) -> Self {
        let now = clock.now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            entity_id: entity_id.to_string(),
            entity_snapshot: serde_json::Value::Null,
            completed_at: now,
            xp_earned: 0,
            was_in_morning_window: false,
            leverage_score: None,
            habit_strength: None,
            practice_kind: None,
            slip_occurred: false,
            chore_category: None,
            day_of_week: now.weekday().num_days_from_sunday(),
            hour_of_day: now.hour(),
        }
    }
}

pub fn all(store: &dyn Store) -> Result<Vec<HistoryRecord>> {
    store::read_or_default(store, keys::HISTORY)
}

pub fn append(store: &dyn Store, record: HistoryRecord) -> Result<()> {
    let mut records = all(store)?;
    records.push(record);
    store::write(store, keys::HISTORY, &records)
}

pub fn by_kind(store: &dyn Store, kind: EntryKind) -> Result<Vec<HistoryRecord>> {
    Ok(all(store)?.into_iter().filter(|r| r.kind == kind).collect())
}

pub fn on_date(store: &dyn Store, date: NaiveDate) -> Result<Vec<HistoryRecord>> {
    Ok(all(store)?
        .into_iter()
        .filter(|r| r.completed_at.date_naive() == date)
        .collect())
}

pub fn in_range(store: &dyn Store, start: NaiveDate, end: NaiveDate) -> Result<Vec<HistoryRecord>> {
    Ok(all(store)?
        .into_iter()
        .filter(|r| {
            let d = r.completed_at.date_naive();
            d >= start && d <= end
        })
        .collect())
}

/// Lifetime XP across the ledger. Distinct from `UserState.xp`, which rolls
/// over at each level-up.
pub fn total_xp(records: &[HistoryRecord]) -> i64 {
    records.iter().map(|r| r.xp_earned).sum()
}
