//! Post-commit effects.
//!
//! Core mutations return an explicit list of downstream reactions instead of
//! performing them inline. The [`crate::tracker::Tracker`] dispatcher applies
//! each effect after the primary write has landed, which keeps the state
//! transitions and their reactions independently testable.

use crate::history::HistoryRecord;
use crate::identity::{ActionKind, EvidenceCategory, VoteDirection};
use crate::recovery::RecoveryEvent;

#[derive(Debug, Clone)]
pub struct VoteRequest {
    pub action: String,
    pub action_kind: ActionKind,
    pub direction: VoteDirection,
    pub entity_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EvidenceRequest {
    pub description: String,
    pub category: EvidenceCategory,
    pub entity_id: Option<String>,
}

/// A reaction to apply after a core mutation commits.
#[derive(Debug, Clone)]
pub enum Effect {
    GrantXp(i64),
    UpdateUserStreak { completed: bool },
    IncrementMorningControl,
    AppendHistory(Box<HistoryRecord>),
    /// Skipped silently when no identity statement exists.
    CastVote(VoteRequest),
    /// Skipped silently when no identity statement exists.
    AddEvidence(EvidenceRequest),
    RecordRecovery(RecoveryEvent),
    RecalcHealth,
    RecalcLeverage,
}
