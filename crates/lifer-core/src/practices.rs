//! Practices: recurring habits with streaks and habit strength.
//!
//! A practice is either positive (hit at least the target: water, sleep) or
//! negative (stay at or under the target: junk food, doomscrolling). Positive
//! practices advance `current_streak`; negative practices advance the
//! mirrored `clean_streak`. Streaks move at most once per calendar day; habit
//! strength moves on every log.

use crate::clock::{day_transition, in_morning_window, Clock};
use crate::effects::{Effect, EvidenceRequest, VoteRequest};
use crate::error::Result;
use crate::history::{EntryKind, HistoryRecord};
use crate::identity::{ActionKind, EvidenceCategory, VoteDirection};
use crate::keys;
use crate::recovery::RecoveryEvent;
use crate::store::{self, Store};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Core catalog names. Health stats and several achievements key off these.
pub const WATER_INTAKE: &str = "Water Intake";
pub const MEDICATIONS: &str = "Medications";
pub const CARDIO: &str = "WRC (Walk/Run/Cardio)";
pub const SLEEP: &str = "Sleep";
pub const PROTEIN: &str = "Protein";
pub const MORNING_SUN: &str = "Morning Sun Exposure";
pub const STRENGTH_TRAINING: &str = "Strength Training";
pub const HIGH_LEVERAGE_WORK: &str = "High-Leverage Work";
pub const MORNING_POWER_HOUR: &str = "Morning Power Hour";

/// Streak lengths that earn an automatic identity-evidence entry.
const EVIDENCE_MILESTONES: [u32; 5] = [7, 30, 50, 100, 365];

const STRENGTH_GAIN: i32 = 2;
const STRENGTH_LOSS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeKind {
    Positive,
    Negative,
}

/// Scheduling: every day, or a fixed weekday set (0 = Sunday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Custom { days: Vec<u32> },
}

impl Frequency {
    pub fn scheduled_on(&self, weekday: u32) -> bool {
        match self {
            Self::Daily => true,
            Self::Custom { days } => days.contains(&weekday),
        }
    }
}

/// Four Laws of Behavior Change metadata. Used by recovery suggestions and
/// the gateway (2-minute rule) reduced-effort variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FourLaws {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default)]
    pub friction_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Practice {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: PracticeKind,
    pub target: f64,
    pub unit: String,
    pub frequency: Frequency,
    pub habit_strength: u8,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default)]
    pub clean_streak: u32,
    #[serde(default)]
    pub longest_clean_streak: u32,
    pub today_value: f64,
    pub today_completed: bool,
    pub last_logged_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_id: Option<String>,
    #[serde(default)]
    pub is_morning_task: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub four_laws: Option<FourLaws>,
    #[serde(default)]
    pub consecutive_misses: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_miss_date: Option<NaiveDate>,
    #[serde(default)]
    pub recovery_count: u32,
    #[serde(default)]
    pub at_risk: bool,
    pub created_at: DateTime<Utc>,
}

impl Practice {
    /// The streak relevant to this practice's kind.
    pub fn active_streak(&self) -> u32 {
        match self.kind {
            PracticeKind::Positive => self.current_streak,
            PracticeKind::Negative => self.clean_streak,
        }
    }

    pub fn meets_target(&self, value: f64) -> bool {
        match self.kind {
            PracticeKind::Positive => value >= self.target,
            PracticeKind::Negative => value <= self.target,
        }
    }
}

struct Seed {
    name: &'static str,
    description: &'static str,
    kind: PracticeKind,
    target: f64,
    unit: &'static str,
    schedule: Option<&'static [u32]>,
}

const CORE_CATALOG: &[Seed] = &[
    Seed {
        name: WATER_INTAKE,
        description: "Drink at least 2 liters of water daily for hydration",
        kind: PracticeKind::Positive,
        target: 2000.0,
        unit: "ml",
        schedule: None,
    },
    Seed {
        name: MEDICATIONS,
        description: "Take daily medications as prescribed",
        kind: PracticeKind::Positive,
        target: 1.0,
        unit: "dose",
        schedule: None,
    },
    Seed {
        name: CARDIO,
        description: "Daily cardiovascular activity for heart health",
        kind: PracticeKind::Positive,
        target: 30.0,
        unit: "minutes",
        schedule: None,
    },
    Seed {
        name: SLEEP,
        description: "7-9 hours optimal for testosterone and recovery",
        kind: PracticeKind::Positive,
        target: 8.0,
        unit: "hours",
        schedule: None,
    },
    Seed {
        name: PROTEIN,
        description: "Muscle maintenance, 0.7-1g per pound bodyweight",
        kind: PracticeKind::Positive,
        target: 180.0,
        unit: "grams",
        schedule: None,
    },
    Seed {
        name: MORNING_SUN,
        description: "Circadian rhythm, testosterone production",
        kind: PracticeKind::Positive,
        target: 15.0,
        unit: "minutes",
        schedule: None,
    },
    Seed {
        name: STRENGTH_TRAINING,
        description: "Compound movements, 3x per week minimum",
        kind: PracticeKind::Positive,
        target: 1.0,
        unit: "session",
        schedule: Some(&[1, 3, 5]),
    },
    Seed {
        name: HIGH_LEVERAGE_WORK,
        description: "Deep focus blocks on leverage 7+ tasks",
        kind: PracticeKind::Positive,
        target: 2.0,
        unit: "hours",
        schedule: None,
    },
    Seed {
        name: MORNING_POWER_HOUR,
        description: "Complete at least one high-leverage task in first 90 min",
        kind: PracticeKind::Positive,
        target: 1.0,
        unit: "completion",
        schedule: None,
    },
];

/// Number of practices in the core catalog.
pub fn core_catalog_len() -> usize {
    CORE_CATALOG.len()
}

fn from_seed(seed: &Seed, now: DateTime<Utc>) -> Practice {
    Practice {
        id: Uuid::new_v4().to_string(),
        name: seed.name.to_string(),
        description: Some(seed.description.to_string()),
        kind: seed.kind,
        target: seed.target,
        unit: seed.unit.to_string(),
        frequency: match seed.schedule {
            Some(days) => Frequency::Custom { days: days.to_vec() },
            None => Frequency::Daily,
        },
        habit_strength: 0,
        current_streak: 0,
        longest_streak: 0,
        clean_streak: 0,
        longest_clean_streak: 0,
        today_value: 0.0,
        today_completed: false,
        last_logged_at: now,
        last_completed_at: None,
        leverage_score: None,
        outcome_id: None,
        is_morning_task: false,
        four_laws: None,
        consecutive_misses: 0,
        last_miss_date: None,
        recovery_count: 0,
        at_risk: false,
        created_at: now,
    }
}

/// Seed any catalog practices missing from the store. Idempotent: first run
/// seeds all of them, later runs back-fill additions only.
pub fn seed_missing(store: &dyn Store, clock: &dyn Clock) -> Result<usize> {
    let mut practices = all(store)?;
    let existing: Vec<String> = practices.iter().map(|p| p.name.clone()).collect();
    let now = clock.now();

    let mut added = 0;
    for seed in CORE_CATALOG {
        if !existing.iter().any(|name| name == seed.name) {
            practices.push(from_seed(seed, now));
            added += 1;
        }
    }
    if added > 0 {
        save_all(store, &practices)?;
    }
    Ok(added)
}

pub fn all(store: &dyn Store) -> Result<Vec<Practice>> {
    store::read_or_default(store, keys::PRACTICES)
}

pub fn save_all(store: &dyn Store, practices: &[Practice]) -> Result<()> {
    store::write(store, keys::PRACTICES, &practices)
}

pub fn get(store: &dyn Store, id: &str) -> Result<Option<Practice>> {
    Ok(all(store)?.into_iter().find(|p| p.id == id))
}

/// Read-modify-write one practice. `None` when the id does not exist.
pub fn update(
    store: &dyn Store,
    id: &str,
    mutate: impl FnOnce(&mut Practice),
) -> Result<Option<Practice>> {
    let mut practices = all(store)?;
    let Some(practice) = practices.iter_mut().find(|p| p.id == id) else {
        return Ok(None);
    };
    mutate(practice);
    let updated = practice.clone();
    save_all(store, &practices)?;
    Ok(Some(updated))
}

/// Practices scheduled for today's weekday.
pub fn scheduled_today(store: &dyn Store, clock: &dyn Clock) -> Result<Vec<Practice>> {
    let weekday = clock.now().weekday().num_days_from_sunday();
    Ok(all(store)?
        .into_iter()
        .filter(|p| p.frequency.scheduled_on(weekday))
        .collect())
}

/// Practices that missed exactly once (warning state).
pub fn at_risk(store: &dyn Store) -> Result<Vec<Practice>> {
    Ok(all(store)?.into_iter().filter(|p| p.at_risk).collect())
}

/// Practices that missed twice or more.
pub fn critical(store: &dyn Store) -> Result<Vec<Practice>> {
    Ok(all(store)?
        .into_iter()
        .filter(|p| p.consecutive_misses >= 2)
        .collect())
}

/// Outcome of a single log call, with the post-commit effect list.
#[derive(Debug, Clone)]
pub struct PracticeLog {
    pub practice: Practice,
    pub completed: bool,
    pub new_day: bool,
    pub effects: Vec<Effect>,
}

/// Log today's value for a practice.
///
/// Streak rule: only the first log after a day rollover moves the relevant
/// streak (advance on target met, reset to 0 otherwise). Same-day re-logs are
/// last-value-wins for `today_value`/`today_completed` and leave the streaks
/// alone. Habit strength moves on every log: +2 capped at 100 on success,
/// -5 floored at 0 on failure.
pub fn log(store: &dyn Store, clock: &dyn Clock, id: &str, value: f64) -> Result<Option<PracticeLog>> {
    let Some(practice) = get(store, id)? else {
        return Ok(None);
    };

    let now = clock.now();
    let transition = day_transition(practice.last_logged_at, now);
    let completed = practice.meets_target(value);

    let mut current_streak = practice.current_streak;
    let mut longest_streak = practice.longest_streak;
    let mut clean_streak = practice.clean_streak;
    let mut longest_clean_streak = practice.longest_clean_streak;

    if transition.is_new_day {
        match practice.kind {
            PracticeKind::Positive => {
                current_streak = if completed { current_streak + 1 } else { 0 };
            }
            PracticeKind::Negative => {
                clean_streak = if completed { clean_streak + 1 } else { 0 };
            }
        }
        longest_streak = longest_streak.max(current_streak);
        longest_clean_streak = longest_clean_streak.max(clean_streak);
    }

    let strength = i32::from(practice.habit_strength);
    let habit_strength = if completed {
        (strength + STRENGTH_GAIN).min(100) as u8
    } else {
        (strength - STRENGTH_LOSS).max(0) as u8
    };

    // Recovery transition: completing from any miss state (at-risk or
    // critical) records the bounce-back.
    let mut recovery: Option<RecoveryEvent> = None;
    if completed && practice.consecutive_misses > 0 {
        if let Some(missed) = practice.last_miss_date {
            recovery = Some(RecoveryEvent::new(
                &practice,
                missed,
                practice.consecutive_misses,
                now,
            ));
        }
    }
    let recovered = recovery.is_some();

    let updated = update(store, id, |p| {
        p.today_value = value;
        p.today_completed = completed;
        p.current_streak = current_streak;
        p.longest_streak = longest_streak;
        p.clean_streak = clean_streak;
        p.longest_clean_streak = longest_clean_streak;
        p.habit_strength = habit_strength;
        p.last_logged_at = now;
        if completed {
            p.last_completed_at = Some(now);
            p.consecutive_misses = 0;
            p.at_risk = false;
            if recovered {
                p.recovery_count += 1;
            }
        }
    })?;
    let Some(updated) = updated else {
        return Ok(None);
    };

    let mut effects = Vec::new();

    let mut record = HistoryRecord::new(EntryKind::Practice, &updated.id, clock);
    record.entity_snapshot = serde_json::to_value(&updated)?;
    record.was_in_morning_window = in_morning_window(now);
    record.leverage_score = updated.leverage_score;
    record.habit_strength = Some(i32::from(updated.habit_strength));
    record.practice_kind = Some(updated.kind);
    record.slip_occurred = !completed;
    effects.push(Effect::AppendHistory(Box::new(record)));

    if let Some(event) = recovery {
        tracing::info!(practice = %updated.name, misses = event.miss_count, "recovered after miss");
        effects.push(Effect::RecordRecovery(event));
    }

    let streak = updated.active_streak();
    if completed {
        let context = match updated.kind {
            PracticeKind::Positive if streak > 0 => Some(format!("{streak}-day streak")),
            PracticeKind::Negative if streak > 0 => Some(format!("{streak}-day clean streak")),
            _ => None,
        };
        effects.push(Effect::CastVote(VoteRequest {
            action: format!("Completed: {}", updated.name),
            action_kind: ActionKind::Practice,
            direction: VoteDirection::For,
            entity_id: Some(updated.id.clone()),
            context,
        }));

        if EVIDENCE_MILESTONES.contains(&streak) {
            let label = match updated.kind {
                PracticeKind::Positive => updated.name.clone(),
                PracticeKind::Negative => format!("{} (clean)", updated.name),
            };
            effects.push(Effect::AddEvidence(EvidenceRequest {
                description: format!("{streak}-day streak: {label}"),
                category: EvidenceCategory::Streak,
                entity_id: Some(updated.id.clone()),
            }));
        }
    } else if updated.kind == PracticeKind::Negative {
        effects.push(Effect::CastVote(VoteRequest {
            action: format!("Slipped: {}", updated.name),
            action_kind: ActionKind::Practice,
            direction: VoteDirection::Against,
            entity_id: Some(updated.id.clone()),
            context: Some(format!("Exceeded target: {} > {}", value, updated.target)),
        }));
    }

    effects.push(Effect::RecalcHealth);

    Ok(Some(PracticeLog {
        practice: updated,
        completed,
        new_day: transition.is_new_day,
        effects,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn setup() -> (MemoryStore, FixedClock) {
        let store = MemoryStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap());
        seed_missing(&store, &clock).unwrap();
        (store, clock)
    }

    fn practice_named(store: &MemoryStore, name: &str) -> Practice {
        all(store)
            .unwrap()
            .into_iter()
            .find(|p| p.name == name)
            .unwrap()
    }

    #[test]
    fn seeding_is_idempotent() {
        let (store, clock) = setup();
        assert_eq!(all(&store).unwrap().len(), core_catalog_len());
        assert_eq!(seed_missing(&store, &clock).unwrap(), 0);
        assert_eq!(all(&store).unwrap().len(), core_catalog_len());
    }

    #[test]
    fn positive_streak_advances_on_new_day() {
        let (store, clock) = setup();
        let mut water = practice_named(&store, WATER_INTAKE);
        water.current_streak = 5;
        water.longest_streak = 5;
        water.last_logged_at = clock.now() - Duration::days(1);
        let id = water.id.clone();
        update(&store, &id, |p| *p = water.clone()).unwrap();

        let logged = log(&store, &clock, &id, 2500.0).unwrap().unwrap();
        assert!(logged.completed);
        assert!(logged.new_day);
        assert_eq!(logged.practice.current_streak, 6);
        assert_eq!(logged.practice.longest_streak, 6);
        assert!(logged.practice.today_completed);
        assert_eq!(logged.practice.habit_strength, 2);
    }

    #[test]
    fn negative_slip_resets_clean_streak() {
        let (store, clock) = setup();
        let now = clock.now();
        let mut practices = all(&store).unwrap();
        practices.push(Practice {
            id: "neg".to_string(),
            name: "Junk Food".to_string(),
            description: None,
            kind: PracticeKind::Negative,
            target: 0.0,
            unit: "servings".to_string(),
            frequency: Frequency::Daily,
            habit_strength: 40,
            current_streak: 0,
            longest_streak: 0,
            clean_streak: 10,
            longest_clean_streak: 10,
            today_value: 0.0,
            today_completed: false,
            last_logged_at: now - Duration::days(1),
            last_completed_at: None,
            leverage_score: None,
            outcome_id: None,
            is_morning_task: false,
            four_laws: None,
            consecutive_misses: 0,
            last_miss_date: None,
            recovery_count: 0,
            at_risk: false,
            created_at: now - Duration::days(30),
        });
        save_all(&store, &practices).unwrap();

        let logged = log(&store, &clock, "neg", 1.0).unwrap().unwrap();
        assert!(!logged.completed);
        assert_eq!(logged.practice.clean_streak, 0);
        assert!(!logged.practice.today_completed);
        assert_eq!(logged.practice.habit_strength, 35);
        // Slipping a negative practice votes against the identity.
        assert!(logged.effects.iter().any(|e| matches!(
            e,
            Effect::CastVote(VoteRequest { direction: VoteDirection::Against, .. })
        )));
    }

    #[test]
    fn same_day_relog_is_last_value_wins_but_streak_stable() {
        let (store, clock) = setup();
        let mut water = practice_named(&store, WATER_INTAKE);
        water.last_logged_at = clock.now() - Duration::days(1);
        water.current_streak = 3;
        let id = water.id.clone();
        update(&store, &id, |p| *p = water.clone()).unwrap();

        let first = log(&store, &clock, &id, 2200.0).unwrap().unwrap();
        assert_eq!(first.practice.current_streak, 4);

        let second = log(&store, &clock, &id, 500.0).unwrap().unwrap();
        assert!(!second.new_day);
        assert_eq!(second.practice.today_value, 500.0);
        assert!(!second.practice.today_completed);
        // Streak untouched by the same-day re-log.
        assert_eq!(second.practice.current_streak, 4);
    }

    #[test]
    fn streak_monotonicity_holds() {
        let (store, clock) = setup();
        let id = practice_named(&store, SLEEP).id;
        for value in [8.0, 9.0, 4.0, 8.0, 8.5] {
            clock.advance_days(1);
            let logged = log(&store, &clock, &id, value).unwrap().unwrap();
            assert!(logged.practice.longest_streak >= logged.practice.current_streak);
            assert!(logged.practice.longest_clean_streak >= logged.practice.clean_streak);
        }
    }

    #[test]
    fn habit_strength_stays_bounded() {
        let (store, clock) = setup();
        let id = practice_named(&store, MEDICATIONS).id;
        for _ in 0..60 {
            clock.advance_days(1);
            let logged = log(&store, &clock, &id, 1.0).unwrap().unwrap();
            assert!(logged.practice.habit_strength <= 100);
        }
        assert_eq!(get(&store, &id).unwrap().unwrap().habit_strength, 100);
        for _ in 0..30 {
            clock.advance_days(1);
            let logged = log(&store, &clock, &id, 0.0).unwrap().unwrap();
            assert!(logged.practice.habit_strength <= 100);
        }
        assert_eq!(get(&store, &id).unwrap().unwrap().habit_strength, 0);
    }

    #[test]
    fn unknown_id_is_none() {
        let (store, clock) = setup();
        assert!(log(&store, &clock, "missing", 1.0).unwrap().is_none());
    }

    #[test]
    fn custom_schedule_filters_today() {
        let (store, clock) = setup();
        // 2025-06-02 is a Monday (weekday 1): strength training is scheduled.
        let today = scheduled_today(&store, &clock).unwrap();
        assert!(today.iter().any(|p| p.name == STRENGTH_TRAINING));

        clock.advance_days(1); // Tuesday
        let today = scheduled_today(&store, &clock).unwrap();
        assert!(!today.iter().any(|p| p.name == STRENGTH_TRAINING));
    }
}
