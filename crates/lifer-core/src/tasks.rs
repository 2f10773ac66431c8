//! Tasks and recurring task templates.
//!
//! A task carries a leverage score (1-10) that drives its XP value. The
//! completion flow itself lives in [`crate::tracker`]; this module owns the
//! repository and the pure marking functions it dispatches effects from.

use crate::clock::Clock;
use crate::error::Result;
use crate::keys;
use crate::store::{self, Store};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_LEVERAGE: u8 = 1;
pub const MAX_LEVERAGE: u8 = 10;
pub const HIGH_LEVERAGE_THRESHOLD: u8 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 1-10, clamped on creation.
    pub leverage_score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_id: Option<String>,
    #[serde(default)]
    pub is_morning_task: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub xp_earned: i64,
    /// Set when spawned from a recurring template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub leverage_score: u8,
    #[serde(default)]
    pub outcome_id: Option<String>,
    #[serde(default)]
    pub is_morning_task: bool,
}

/// Spawns one task per calendar day while active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTaskTemplate {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub leverage_score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_id: Option<String>,
    #[serde(default)]
    pub is_morning_task: bool,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_spawned: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

pub fn all(store: &dyn Store) -> Result<Vec<Task>> {
    store::read_or_default(store, keys::TASKS)
}

pub fn save_all(store: &dyn Store, tasks: &[Task]) -> Result<()> {
    store::write(store, keys::TASKS, &tasks)
}

pub fn get(store: &dyn Store, id: &str) -> Result<Option<Task>> {
    Ok(all(store)?.into_iter().find(|t| t.id == id))
}

pub fn add(store: &dyn Store, clock: &dyn Clock, new: NewTask) -> Result<Task> {
    let task = Task {
        id: Uuid::new_v4().to_string(),
        title: new.title,
        description: new.description,
        leverage_score: new.leverage_score.clamp(MIN_LEVERAGE, MAX_LEVERAGE),
        outcome_id: new.outcome_id,
        is_morning_task: new.is_morning_task,
        completed: false,
        completed_at: None,
        xp_earned: 0,
        template_id: None,
        created_at: clock.now(),
    };
    let mut tasks = all(store)?;
    tasks.push(task.clone());
    save_all(store, &tasks)?;
    Ok(task)
}

/// Apply a mutation to one task. `Ok(None)` when the id is unknown.
pub fn update(
    store: &dyn Store,
    id: &str,
    mutate: impl FnOnce(&mut Task),
) -> Result<Option<Task>> {
    let mut tasks = all(store)?;
    let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
        return Ok(None);
    };
    mutate(task);
    task.leverage_score = task.leverage_score.clamp(MIN_LEVERAGE, MAX_LEVERAGE);
    let updated = task.clone();
    save_all(store, &tasks)?;
    Ok(Some(updated))
}

pub fn delete(store: &dyn Store, id: &str) -> Result<()> {
    let tasks: Vec<Task> = all(store)?.into_iter().filter(|t| t.id != id).collect();
    save_all(store, &tasks)
}

/// Mark completed with the XP already computed by the caller. A task that is
/// already completed, or an unknown id, returns `Ok(None)`.
pub fn mark_completed(
    store: &dyn Store,
    clock: &dyn Clock,
    id: &str,
    xp: i64,
) -> Result<Option<Task>> {
    let mut tasks = all(store)?;
    let Some(task) = tasks.iter_mut().find(|t| t.id == id && !t.completed) else {
        return Ok(None);
    };
    task.completed = true;
    task.completed_at = Some(clock.now());
    task.xp_earned = xp;
    let completed = task.clone();
    save_all(store, &tasks)?;
    Ok(Some(completed))
}

/// Reverse a completion. Returns the task and the XP to claw back.
pub fn mark_uncompleted(store: &dyn Store, id: &str) -> Result<Option<(Task, i64)>> {
    let mut tasks = all(store)?;
    let Some(task) = tasks.iter_mut().find(|t| t.id == id && t.completed) else {
        return Ok(None);
    };
    let reclaimed = task.xp_earned;
    task.completed = false;
    task.completed_at = None;
    task.xp_earned = 0;
    let reverted = task.clone();
    save_all(store, &tasks)?;
    Ok(Some((reverted, reclaimed)))
}

pub fn active(store: &dyn Store) -> Result<Vec<Task>> {
    Ok(all(store)?.into_iter().filter(|t| !t.completed).collect())
}

pub fn morning(store: &dyn Store) -> Result<Vec<Task>> {
    Ok(active(store)?
        .into_iter()
        .filter(|t| t.is_morning_task)
        .collect())
}

pub fn high_leverage(store: &dyn Store) -> Result<Vec<Task>> {
    Ok(active(store)?
        .into_iter()
        .filter(|t| t.leverage_score >= HIGH_LEVERAGE_THRESHOLD)
        .collect())
}

pub fn by_outcome(store: &dyn Store, outcome_id: &str) -> Result<Vec<Task>> {
    Ok(all(store)?
        .into_iter()
        .filter(|t| t.outcome_id.as_deref() == Some(outcome_id))
        .collect())
}

pub fn templates(store: &dyn Store) -> Result<Vec<RecurringTaskTemplate>> {
    store::read_or_default(store, keys::RECURRING_TASKS)
}

pub fn save_templates(store: &dyn Store, templates: &[RecurringTaskTemplate]) -> Result<()> {
    store::write(store, keys::RECURRING_TASKS, &templates)
}

pub fn add_template(
    store: &dyn Store,
    clock: &dyn Clock,
    new: NewTask,
) -> Result<RecurringTaskTemplate> {
    let template = RecurringTaskTemplate {
        id: Uuid::new_v4().to_string(),
        title: new.title,
        description: new.description,
        leverage_score: new.leverage_score.clamp(MIN_LEVERAGE, MAX_LEVERAGE),
        outcome_id: new.outcome_id,
        is_morning_task: new.is_morning_task,
        active: true,
        last_spawned: None,
        created_at: clock.now(),
    };
    let mut all = templates(store)?;
    all.push(template.clone());
    save_templates(store, &all)?;
    Ok(template)
}

pub fn set_template_active(store: &dyn Store, id: &str, active: bool) -> Result<()> {
    let mut all = templates(store)?;
    if let Some(template) = all.iter_mut().find(|t| t.id == id) {
        template.active = active;
        save_templates(store, &all)?;
    }
    Ok(())
}

pub fn delete_template(store: &dyn Store, id: &str) -> Result<()> {
    let all: Vec<RecurringTaskTemplate> =
        templates(store)?.into_iter().filter(|t| t.id != id).collect();
    save_templates(store, &all)
}

/// Spawn today's tasks from active templates. At most one task per template
/// per calendar day (`last_spawned` gate), so the daily sweep can run any
/// number of times.
pub fn spawn_due(store: &dyn Store, clock: &dyn Clock) -> Result<Vec<Task>> {
    let today = clock.today();
    let mut all_templates = templates(store)?;
    let mut spawned = Vec::new();

    for template in all_templates.iter_mut() {
        if !template.active || template.last_spawned == Some(today) {
            continue;
        }
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: template.title.clone(),
            description: template.description.clone(),
            leverage_score: template.leverage_score,
            outcome_id: template.outcome_id.clone(),
            is_morning_task: template.is_morning_task,
            completed: false,
            completed_at: None,
            xp_earned: 0,
            template_id: Some(template.id.clone()),
            created_at: clock.now(),
        };
        template.last_spawned = Some(today);
        spawned.push(task);
    }

    if !spawned.is_empty() {
        let mut tasks = all(store)?;
        tasks.extend(spawned.iter().cloned());
        save_all(store, &tasks)?;
        save_templates(store, &all_templates)?;
        tracing::debug!(count = spawned.len(), "spawned recurring tasks");
    }
    Ok(spawned)
}
