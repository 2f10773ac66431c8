//! Achievement catalog and unlock engine.
//!
//! Definitions are data-only records: an id, display metadata, and a
//! [`Condition`] value. A single evaluator dispatches on the condition kind,
//! so nothing executable is embedded in (or serialized with) the catalog.
//! The set of unlocked ids is persisted separately; an unlocked id is never
//! re-evaluated.

use crate::clock::Clock;
use crate::error::Result;
use crate::history::{self, EntryKind, HistoryRecord};
use crate::keys;
use crate::practices;
use crate::state::UserState;
use crate::store::{self, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Streak,
    Task,
    Leverage,
    Morning,
    Level,
    Practice,
}

/// Unlock condition, evaluated against (state, history).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    /// User daily streak of at least N days.
    UserStreak(u32),
    /// At least N task completions in history.
    TasksCompleted(u64),
    /// At least `count` task completions with leverage >= `min_score`.
    LeverageTasks { min_score: u8, count: u64 },
    /// Morning-window completion count of at least N.
    MorningCount(u32),
    /// User level of at least N.
    Level(u32),
    /// Lifetime XP (history fold) of at least N.
    TotalXp(i64),
    /// Trailing-7-day average leverage of at least this ratio.
    WeeklyLeverageRatio(f64),
    /// At least `count` non-slip logs of the named practice.
    PracticeLogs { practice: &'static str, count: u64 },
    /// All N distinct practices logged, non-slipped, on one calendar day.
    AllPracticesInOneDay(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct AchievementDef {
    pub id: &'static str,
    pub badge: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub category: Category,
    pub condition: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub current: f64,
    pub total: f64,
}

/// A newly unlocked achievement, stamped at evaluation time.
#[derive(Debug, Clone)]
pub struct Unlock {
    pub def: &'static AchievementDef,
    pub unlocked_at: DateTime<Utc>,
}

const fn def(
    id: &'static str,
    badge: &'static str,
    name: &'static str,
    description: &'static str,
    rarity: Rarity,
    category: Category,
    condition: Condition,
) -> AchievementDef {
    AchievementDef { id, badge, name, description, rarity, category, condition }
}

/// The fixed catalog. Evaluation order across entries does not matter;
/// emitted unlocks preserve this order for deterministic assertions.
pub const CATALOG: &[AchievementDef] = &[
    // Streak tiers
    def("fire_starter", "<3d>", "Fire Starter", "Maintain a 3-day streak",
        Rarity::Common, Category::Streak, Condition::UserStreak(3)),
    def("momentum_master", "<7d>", "Momentum Master", "Achieve a 7-day streak",
        Rarity::Rare, Category::Streak, Condition::UserStreak(7)),
    def("unstoppable", "<30d>", "Unstoppable", "Reach a 30-day streak",
        Rarity::Epic, Category::Streak, Condition::UserStreak(30)),
    def("legend_status", "<100>", "Legend Status", "Achieve a 100-day streak",
        Rarity::Legendary, Category::Streak, Condition::UserStreak(100)),
    // Task tiers
    def("task_novice", "[10]", "Task Novice", "Complete 10 tasks",
        Rarity::Common, Category::Task, Condition::TasksCompleted(10)),
    def("task_warrior", "[50]", "Task Warrior", "Complete 50 tasks",
        Rarity::Rare, Category::Task, Condition::TasksCompleted(50)),
    def("task_master", "[100]", "Task Master", "Complete 100 tasks",
        Rarity::Epic, Category::Task, Condition::TasksCompleted(100)),
    def("task_legend", "[500]", "Task Legend", "Complete 500 tasks",
        Rarity::Legendary, Category::Task, Condition::TasksCompleted(500)),
    // Leverage tiers
    def("high_value", "(7+)", "High Value", "Complete 10 high-leverage tasks (7+)",
        Rarity::Common, Category::Leverage,
        Condition::LeverageTasks { min_score: 7, count: 10 }),
    def("leverage_pro", "(8+)", "Leverage Pro", "Complete 50 ultra-high tasks (8+)",
        Rarity::Rare, Category::Leverage,
        Condition::LeverageTasks { min_score: 8, count: 50 }),
    def("impact_titan", "(9+)", "Impact Titan", "Complete 100 maximum impact tasks (9+)",
        Rarity::Epic, Category::Leverage,
        Condition::LeverageTasks { min_score: 9, count: 100 }),
    // Morning tiers
    def("early_bird", "~06~", "Early Bird", "Complete 10 morning tasks",
        Rarity::Common, Category::Morning, Condition::MorningCount(10)),
    def("dawn_warrior", "~05~", "Dawn Warrior", "Complete 50 morning tasks",
        Rarity::Rare, Category::Morning, Condition::MorningCount(50)),
    def("morning_legend", "~!!~", "Morning Legend", "Complete 100 morning tasks",
        Rarity::Epic, Category::Morning, Condition::MorningCount(100)),
    // Level tiers
    def("bronze_achiever", "|10|", "Bronze Achiever", "Reach level 10",
        Rarity::Common, Category::Level, Condition::Level(10)),
    def("silver_warrior", "|25|", "Silver Warrior", "Reach level 25",
        Rarity::Rare, Category::Level, Condition::Level(25)),
    def("gold_master", "|50|", "Gold Master", "Reach level 50",
        Rarity::Epic, Category::Level, Condition::Level(50)),
    def("diamond_elite", "|100|", "Diamond Elite", "Reach level 100",
        Rarity::Legendary, Category::Level, Condition::Level(100)),
    // Lifetime XP
    def("xp_millionaire", "[$$]", "XP Millionaire", "Earn 10,000 total XP",
        Rarity::Epic, Category::Level, Condition::TotalXp(10_000)),
    // Sustained leverage
    def("leverage_master", "{x7}", "Leverage Master",
        "Maintain 7+ average leverage ratio for 7 days",
        Rarity::Rare, Category::Leverage, Condition::WeeklyLeverageRatio(7.0)),
    // Named practices
    def("hydration_hero", "{ml}", "Hydration Hero", "Hit your water intake target for 30 days",
        Rarity::Rare, Category::Practice,
        Condition::PracticeLogs { practice: practices::WATER_INTAKE, count: 30 }),
    def("iron_will", "{kg}", "Iron Will", "Complete 50 strength training sessions",
        Rarity::Epic, Category::Practice,
        Condition::PracticeLogs { practice: practices::STRENGTH_TRAINING, count: 50 }),
    def("sleep_champion", "{zz}", "Sleep Champion", "Hit your sleep target for 30 days",
        Rarity::Epic, Category::Practice,
        Condition::PracticeLogs { practice: practices::SLEEP, count: 30 }),
    def("protein_powerhouse", "{gr}", "Protein Powerhouse", "Hit your protein target for 60 days",
        Rarity::Rare, Category::Practice,
        Condition::PracticeLogs { practice: practices::PROTEIN, count: 60 }),
    def("sunrise_seeker", "{am}", "Sunrise Seeker", "Get morning sun exposure for 30 days",
        Rarity::Rare, Category::Practice,
        Condition::PracticeLogs { practice: practices::MORNING_SUN, count: 30 }),
    def("cardio_king", "{km}", "Cardio King", "Complete WRC for 100 days",
        Rarity::Epic, Category::Practice,
        Condition::PracticeLogs { practice: practices::CARDIO, count: 100 }),
    def("deep_work_devotee", "{hr}", "Deep Work Devotee", "Complete high-leverage work for 50 days",
        Rarity::Epic, Category::Practice,
        Condition::PracticeLogs { practice: practices::HIGH_LEVERAGE_WORK, count: 50 }),
    def("wellness_warrior", "{*9}", "Wellness Warrior",
        "Complete all 9 core practices in a single day",
        Rarity::Legendary, Category::Practice, Condition::AllPracticesInOneDay(9)),
];

pub fn find(id: &str) -> Option<&'static AchievementDef> {
    CATALOG.iter().find(|d| d.id == id)
}

fn snapshot_name(record: &HistoryRecord) -> Option<&str> {
    record.entity_snapshot.get("name").and_then(|v| v.as_str())
}

fn task_count(history: &[HistoryRecord], min_score: Option<u8>) -> u64 {
    history
        .iter()
        .filter(|r| r.kind == EntryKind::Task)
        .filter(|r| match min_score {
            Some(min) => r.leverage_score.is_some_and(|s| s >= min),
            None => true,
        })
        .count() as u64
}

fn practice_log_count(history: &[HistoryRecord], name: &str) -> u64 {
    history
        .iter()
        .filter(|r| r.kind == EntryKind::Practice && !r.slip_occurred)
        .filter(|r| snapshot_name(r) == Some(name))
        .count() as u64
}

/// Most distinct practices logged (non-slipped) on any single calendar day.
fn best_day_practice_count(history: &[HistoryRecord]) -> usize {
    let mut by_day: HashMap<chrono::NaiveDate, HashSet<String>> = HashMap::new();
    for record in history
        .iter()
        .filter(|r| r.kind == EntryKind::Practice && !r.slip_occurred)
    {
        if let Some(name) = snapshot_name(record) {
            by_day
                .entry(record.completed_at.date_naive())
                .or_default()
                .insert(name.to_string());
        }
    }
    by_day.values().map(HashSet::len).max().unwrap_or(0)
}

/// Pure progress measure for one condition.
pub fn progress(condition: &Condition, state: &UserState, history: &[HistoryRecord]) -> Progress {
    let (current, total) = match *condition {
        Condition::UserStreak(n) => (f64::from(state.current_streak), f64::from(n)),
        Condition::TasksCompleted(n) => (task_count(history, None) as f64, n as f64),
        Condition::LeverageTasks { min_score, count } => {
            (task_count(history, Some(min_score)) as f64, count as f64)
        }
        Condition::MorningCount(n) => (f64::from(state.morning_control_count), f64::from(n)),
        Condition::Level(n) => (f64::from(state.level), f64::from(n)),
        Condition::TotalXp(n) => (history::total_xp(history) as f64, n as f64),
        Condition::WeeklyLeverageRatio(ratio) => (state.last7_days_leverage_ratio, ratio),
        Condition::PracticeLogs { practice, count } => {
            (practice_log_count(history, practice) as f64, count as f64)
        }
        Condition::AllPracticesInOneDay(n) => (best_day_practice_count(history) as f64, n as f64),
    };
    Progress { current: current.min(total), total }
}

/// Whether a condition is met. Pure read-only scan.
pub fn is_met(condition: &Condition, state: &UserState, history: &[HistoryRecord]) -> bool {
    let p = progress(condition, state, history);
    p.current >= p.total
}

/// Evaluate every definition not yet in `unlocked_ids`; emit unlocks in
/// catalog order with fresh timestamps. Persisting the id set is the
/// caller's responsibility.
pub fn check(
    state: &UserState,
    history: &[HistoryRecord],
    unlocked_ids: &[String],
    clock: &dyn Clock,
) -> Vec<Unlock> {
    let now = clock.now();
    CATALOG
        .iter()
        .filter(|def| !unlocked_ids.iter().any(|id| id == def.id))
        .filter(|def| is_met(&def.condition, state, history))
        .map(|def| Unlock { def, unlocked_at: now })
        .collect()
}

pub fn unlocked_ids(store: &dyn Store) -> Result<Vec<String>> {
    store::read_or_default(store, keys::UNLOCKED_ACHIEVEMENTS)
}

pub fn save_unlocked_ids(store: &dyn Store, ids: &[String]) -> Result<()> {
    store::write(store, keys::UNLOCKED_ACHIEVEMENTS, &ids)
}
