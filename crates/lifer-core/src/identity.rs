//! Identity-based habits: statement, vote ledger, daily alignment.
//!
//! Every completion casts a vote for (or against) the self-declared identity
//! statement. Votes are an append-only ledger; the per-day alignment record
//! is the only derived row that gets rewritten (upsert by date, never
//! duplicated).

use crate::clock::Clock;
use crate::error::{LiferError, Result};
use crate::keys;
use crate::store::{self, Store};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A day counts toward an alignment streak at or above this percentage.
const STREAK_THRESHOLD: u32 = 80;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    /// "I am a person who..."
    pub statement: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Task,
    Practice,
    Chore,
    Focus,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    For,
    Against,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityVote {
    pub id: String,
    pub identity_id: String,
    pub action: String,
    pub action_kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub direction: VoteDirection,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    Achievement,
    Streak,
    Completion,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityEvidence {
    pub id: String,
    pub identity_id: String,
    pub description: String,
    pub category: EvidenceCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_entity_id: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// One row per calendar day with at least one vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityAlignment {
    pub date: NaiveDate,
    pub votes_for: u32,
    pub votes_against: u32,
    /// 0-100, rounded.
    pub percentage: u32,
    pub total_votes: u32,
}

pub fn get(store: &dyn Store) -> Result<Option<Identity>> {
    // The key may hold JSON null after a `clear`.
    Ok(store::read::<Option<Identity>>(store, keys::IDENTITY)?.flatten())
}

/// Create or reword the identity statement, preserving id and creation time.
pub fn set_statement(store: &dyn Store, clock: &dyn Clock, statement: &str) -> Result<Identity> {
    let now = clock.now();
    let existing = get(store)?;
    let identity = Identity {
        id: existing
            .as_ref()
            .map_or_else(|| Uuid::new_v4().to_string(), |i| i.id.clone()),
        statement: statement.to_string(),
        created_at: existing.map_or(now, |i| i.created_at),
        last_updated: now,
    };
    store::write(store, keys::IDENTITY, &identity)?;
    Ok(identity)
}

/// Remove the identity and every ledger derived from it.
pub fn clear(store: &dyn Store) -> Result<()> {
    store.set(keys::IDENTITY, "null")?;
    store::write(store, keys::IDENTITY_VOTES, &Vec::<IdentityVote>::new())?;
    store::write(store, keys::IDENTITY_EVIDENCE, &Vec::<IdentityEvidence>::new())?;
    store::write(store, keys::IDENTITY_ALIGNMENT, &Vec::<IdentityAlignment>::new())
}

pub fn votes(store: &dyn Store) -> Result<Vec<IdentityVote>> {
    store::read_or_default(store, keys::IDENTITY_VOTES)
}

pub fn votes_on(store: &dyn Store, date: NaiveDate) -> Result<Vec<IdentityVote>> {
    Ok(votes(store)?
        .into_iter()
        .filter(|v| v.timestamp.date_naive() == date)
        .collect())
}

/// Append a vote and upsert today's alignment.
///
/// Fails with [`LiferError::NoIdentity`] when no statement has been set; the
/// caller must create one first.
pub fn add_vote(
    store: &dyn Store,
    clock: &dyn Clock,
    action: &str,
    action_kind: ActionKind,
    direction: VoteDirection,
    entity_id: Option<String>,
    context: Option<String>,
) -> Result<IdentityVote> {
    let Some(identity) = get(store)? else {
        return Err(LiferError::NoIdentity);
    };

    let vote = IdentityVote {
        id: Uuid::new_v4().to_string(),
        identity_id: identity.id,
        action: action.to_string(),
        action_kind,
        entity_id,
        direction,
        timestamp: clock.now(),
        context,
    };

    let mut all = votes(store)?;
    all.push(vote.clone());
    store::write(store, keys::IDENTITY_VOTES, &all)?;

    update_daily_alignment(store, clock)?;
    Ok(vote)
}

pub fn evidence(store: &dyn Store) -> Result<Vec<IdentityEvidence>> {
    store::read_or_default(store, keys::IDENTITY_EVIDENCE)
}

pub fn add_evidence(
    store: &dyn Store,
    clock: &dyn Clock,
    description: &str,
    category: EvidenceCategory,
    linked_entity_id: Option<String>,
) -> Result<IdentityEvidence> {
    let Some(identity) = get(store)? else {
        return Err(LiferError::NoIdentity);
    };

    let entry = IdentityEvidence {
        id: Uuid::new_v4().to_string(),
        identity_id: identity.id,
        description: description.to_string(),
        category,
        linked_entity_id,
        added_at: clock.now(),
    };

    let mut all = evidence(store)?;
    all.push(entry.clone());
    store::write(store, keys::IDENTITY_EVIDENCE, &all)?;
    Ok(entry)
}

pub fn delete_evidence(store: &dyn Store, evidence_id: &str) -> Result<()> {
    let all: Vec<IdentityEvidence> = evidence(store)?
        .into_iter()
        .filter(|e| e.id != evidence_id)
        .collect();
    store::write(store, keys::IDENTITY_EVIDENCE, &all)
}

pub fn alignment(store: &dyn Store) -> Result<Vec<IdentityAlignment>> {
    store::read_or_default(store, keys::IDENTITY_ALIGNMENT)
}

pub fn alignment_on(store: &dyn Store, date: NaiveDate) -> Result<Option<IdentityAlignment>> {
    Ok(alignment(store)?.into_iter().find(|a| a.date == date))
}

/// Recompute today's alignment row from today's votes. Upsert by date:
/// an existing row for today is overwritten, never duplicated.
pub fn update_daily_alignment(store: &dyn Store, clock: &dyn Clock) -> Result<IdentityAlignment> {
    let today = clock.today();
    let todays = votes_on(store, today)?;

    let votes_for = todays
        .iter()
        .filter(|v| v.direction == VoteDirection::For)
        .count() as u32;
    let votes_against = todays
        .iter()
        .filter(|v| v.direction == VoteDirection::Against)
        .count() as u32;
    let total = votes_for + votes_against;
    let percentage = if total > 0 {
        (f64::from(votes_for) / f64::from(total) * 100.0).round() as u32
    } else {
        0
    };

    let row = IdentityAlignment {
        date: today,
        votes_for,
        votes_against,
        percentage,
        total_votes: total,
    };

    let mut rows = alignment(store)?;
    match rows.iter_mut().find(|a| a.date == today) {
        Some(existing) => *existing = row.clone(),
        None => rows.push(row.clone()),
    }
    store::write(store, keys::IDENTITY_ALIGNMENT, &rows)?;
    Ok(row)
}

/// Trailing-7-day alignment average plus the rows it covers.
pub fn weekly_alignment(store: &dyn Store, clock: &dyn Clock) -> Result<(u32, Vec<IdentityAlignment>)> {
    let end = clock.today();
    let start = end - Duration::days(7);
    let rows: Vec<IdentityAlignment> = alignment(store)?
        .into_iter()
        .filter(|a| a.date >= start && a.date <= end)
        .collect();
    let average = if rows.is_empty() {
        0
    } else {
        (rows.iter().map(|a| f64::from(a.percentage)).sum::<f64>() / rows.len() as f64).round()
            as u32
    };
    Ok((average, rows))
}

#[derive(Debug, Clone, Default)]
pub struct IdentityStats {
    pub total_votes: u32,
    pub total_for: u32,
    pub total_against: u32,
    pub lifetime_percentage: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_evidence: u32,
}

/// Lifetime vote totals plus streaks of days at >=80% alignment.
///
/// Only days present in the alignment log are evaluated: a day with no votes
/// neither breaks nor extends a streak. The scan runs in descending date
/// order; the current streak is the run ending at the most recent qualifying
/// day before the first sub-threshold day.
pub fn stats(store: &dyn Store) -> Result<IdentityStats> {
    let votes = votes(store)?;
    let evidence = evidence(store)?;
    let mut rows = alignment(store)?;

    let total_for = votes
        .iter()
        .filter(|v| v.direction == VoteDirection::For)
        .count() as u32;
    let total_against = votes
        .iter()
        .filter(|v| v.direction == VoteDirection::Against)
        .count() as u32;
    let total_votes = votes.len() as u32;
    let lifetime_percentage = if total_votes > 0 {
        (f64::from(total_for) / f64::from(total_votes) * 100.0).round() as u32
    } else {
        0
    };

    rows.sort_by(|a, b| b.date.cmp(&a.date));

    let mut current_streak = 0u32;
    let mut longest_streak = 0u32;
    let mut run = 0u32;
    for row in &rows {
        if row.percentage >= STREAK_THRESHOLD {
            run += 1;
            longest_streak = longest_streak.max(run);
        } else {
            if current_streak == 0 {
                current_streak = run;
            }
            run = 0;
        }
    }
    if current_streak == 0 {
        current_streak = run;
    }

    Ok(IdentityStats {
        total_votes,
        total_for,
        total_against,
        lifetime_percentage,
        current_streak,
        longest_streak,
        total_evidence: evidence.len() as u32,
    })
}
