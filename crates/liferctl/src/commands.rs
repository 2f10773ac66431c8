//! Command handlers. Presentation only; every rule lives in lifer-core.

use crate::output::{self, bar, kv, section};
use anyhow::{anyhow, bail, Result};
use lifer_core::achievements;
use lifer_core::chores::{self, NewChore, Recurrence};
use lifer_core::gains::{self, GainCategory};
use lifer_core::history;
use lifer_core::identity::{self, ActionKind, VoteDirection};
use lifer_core::outcomes;
use lifer_core::powerups::{self, PowerUpKind};
use lifer_core::practices::{self, Practice};
use lifer_core::recovery;
use lifer_core::state;
use lifer_core::tasks::{self, NewTask, Task};
use lifer_core::Tracker;
use owo_colors::OwoColorize;

/// Match an id prefix first, then a case-insensitive name fragment.
fn find_practice(tracker: &Tracker, needle: &str) -> Result<Practice> {
    let all = practices::all(tracker.store())?;
    let lowered = needle.to_lowercase();
    all.iter()
        .find(|p| p.id.starts_with(needle))
        .or_else(|| all.iter().find(|p| p.name.to_lowercase().contains(&lowered)))
        .cloned()
        .ok_or_else(|| anyhow!("no practice matches '{needle}'"))
}

fn find_task(tracker: &Tracker, needle: &str) -> Result<Task> {
    let all = tasks::all(tracker.store())?;
    let lowered = needle.to_lowercase();
    all.iter()
        .find(|t| t.id.starts_with(needle))
        .or_else(|| all.iter().find(|t| t.title.to_lowercase().contains(&lowered)))
        .cloned()
        .ok_or_else(|| anyhow!("no task matches '{needle}'"))
}

fn print_unlocks(unlocks: &[achievements::Unlock]) {
    for unlock in unlocks {
        println!(
            "{} {} {} - {}",
            "[UNLOCKED]".bright_yellow(),
            unlock.def.badge,
            unlock.def.name.bold(),
            unlock.def.description
        );
    }
}

pub fn init(tracker: &Tracker) -> Result<()> {
    let state = tracker.init()?;
    output::ok(&format!(
        "ready: level {}, {} practices tracked",
        state.level,
        practices::all(tracker.store())?.len()
    ));
    Ok(())
}

pub fn status(tracker: &Tracker) -> Result<()> {
    let Some(state) = state::get(tracker.store())? else {
        bail!("not initialized, run 'liferctl init' first");
    };

    section("PROFILE");
    kv("level", &state.level.to_string());
    kv(
        "xp",
        &format!(
            "{}/{} {}",
            state.xp,
            state.xp_for_next_level,
            bar(state.xp as f64, state.xp_for_next_level as f64, 20)
        ),
    );
    kv(
        "streak",
        &format!("{} (best {})", state.current_streak, state.longest_streak),
    );
    kv("morning wins", &state.morning_control_count.to_string());
    kv(
        "leverage",
        &format!(
            "{:.1} lifetime / {:.1} last 7 days",
            state.lifetime_leverage_ratio, state.last7_days_leverage_ratio
        ),
    );

    section("HEALTH");
    for (name, value) in [
        ("hydration", state.hydration),
        ("strength", state.strength),
        ("energy", state.energy),
        ("focus", state.focus),
        ("recovery", state.recovery),
    ] {
        kv(name, &bar(f64::from(value), 100.0, 20));
    }

    let at_risk = practices::at_risk(tracker.store())?;
    let critical = practices::critical(tracker.store())?;
    if !at_risk.is_empty() || !critical.is_empty() {
        section("NEVER MISS TWICE");
        for p in &critical {
            output::warn(&format!("{} missed {} days", p.name.red(), p.consecutive_misses));
            for line in recovery::suggestions(p).iter().take(2) {
                println!("    {line}");
            }
        }
        for p in &at_risk {
            output::warn(&format!("{} missed once", p.name.yellow()));
        }
    }
    Ok(())
}

pub fn list_practices(tracker: &Tracker) -> Result<()> {
    section("PRACTICES");
    for p in practices::scheduled_today(tracker.store(), tracker.clock())? {
        let mark = if p.today_completed { "[x]".green().to_string() } else { "[ ]".to_string() };
        println!(
            "{mark} {:<28} {:>4}-day streak  strength {:>3}  ({} {})",
            p.name,
            p.active_streak(),
            p.habit_strength,
            p.today_value,
            p.unit
        );
    }
    Ok(())
}

pub fn log_practice(tracker: &Tracker, name: &str, value: f64) -> Result<()> {
    let practice = find_practice(tracker, name)?;
    let Some(logged) = tracker.log_practice(&practice.id, value)? else {
        bail!("practice disappeared mid-log");
    };

    if logged.completed {
        output::ok(&format!(
            "{}: {} {} ({}-day streak, strength {})",
            logged.practice.name,
            value,
            logged.practice.unit,
            logged.practice.active_streak(),
            logged.practice.habit_strength
        ));
    } else {
        output::warn(&format!(
            "{}: {} {} is short of the target {}",
            logged.practice.name, value, logged.practice.unit, logged.practice.target
        ));
    }
    print_unlocks(&logged.unlocks);
    Ok(())
}

pub fn list_tasks(tracker: &Tracker) -> Result<()> {
    section("TASKS");
    for t in tasks::active(tracker.store())? {
        let flags = match (t.is_morning_task, t.leverage_score >= tasks::HIGH_LEVERAGE_THRESHOLD) {
            (true, true) => " [am] [hi]",
            (true, false) => " [am]",
            (false, true) => " [hi]",
            (false, false) => "",
        };
        println!("  {}  L{}{} {}", &t.id[..8], t.leverage_score, flags, t.title);
    }
    Ok(())
}

pub fn add_task(
    tracker: &Tracker,
    title: &str,
    leverage: u8,
    morning: bool,
    recurring: bool,
) -> Result<()> {
    let new = NewTask {
        title: title.to_string(),
        description: None,
        leverage_score: leverage,
        outcome_id: None,
        is_morning_task: morning,
    };
    if recurring {
        let template = tasks::add_template(tracker.store(), tracker.clock(), new)?;
        output::ok(&format!("recurring task '{}' added", template.title));
    } else {
        let task = tasks::add(tracker.store(), tracker.clock(), new)?;
        output::ok(&format!("task '{}' added (L{})", task.title, task.leverage_score));
    }
    Ok(())
}

pub fn complete_task(tracker: &Tracker, needle: &str) -> Result<()> {
    let task = find_task(tracker, needle)?;
    let Some(completion) = tracker.complete_task(&task.id)? else {
        bail!("'{}' is already completed", task.title);
    };
    output::ok(&format!("'{}' +{} XP", completion.task.title, completion.xp_earned));
    print_unlocks(&completion.unlocks);
    Ok(())
}

pub fn uncomplete_task(tracker: &Tracker, needle: &str) -> Result<()> {
    let task = find_task(tracker, needle)?;
    match tracker.uncomplete_task(&task.id)? {
        Some(task) => output::ok(&format!("'{}' reopened, XP reversed", task.title)),
        None => bail!("'{}' is not completed", task.title),
    }
    Ok(())
}

pub fn list_chores(tracker: &Tracker) -> Result<()> {
    section("CHORES");
    for c in chores::todays(tracker.store(), tracker.clock())? {
        let mark = if c.completed { "[x]".green().to_string() } else { "[ ]".to_string() };
        println!("  {mark} {}  +{} XP  {}", &c.id[..8], c.xp_reward, c.title);
    }
    Ok(())
}

pub fn add_chore(tracker: &Tracker, title: &str, xp: i64, frequency: Option<&str>) -> Result<()> {
    let recurring = match frequency {
        None => None,
        Some("daily") => Some(Recurrence::Daily),
        Some("weekly") => Some(Recurrence::Weekly),
        Some("monthly") => Some(Recurrence::Monthly),
        Some(other) => bail!("unknown frequency '{other}' (daily|weekly|monthly)"),
    };
    let chore = chores::add(
        tracker.store(),
        tracker.clock(),
        NewChore {
            title: title.to_string(),
            description: None,
            category: None,
            xp_reward: xp,
            recurring,
        },
    )?;
    output::ok(&format!("chore '{}' added", chore.title));
    Ok(())
}

pub fn complete_chore(tracker: &Tracker, needle: &str) -> Result<()> {
    let all = chores::all(tracker.store())?;
    let lowered = needle.to_lowercase();
    let chore = all
        .iter()
        .find(|c| c.id.starts_with(needle))
        .or_else(|| all.iter().find(|c| c.title.to_lowercase().contains(&lowered)))
        .ok_or_else(|| anyhow!("no chore matches '{needle}'"))?;

    let Some(completion) = tracker.complete_chore(&chore.id)? else {
        bail!("'{}' is already completed", chore.title);
    };
    output::ok(&format!("'{}' +{} XP", completion.chore.title, completion.xp_earned));
    print_unlocks(&completion.unlocks);
    Ok(())
}

pub fn list_achievements(tracker: &Tracker) -> Result<()> {
    let unlocked = achievements::unlocked_ids(tracker.store())?;
    let state = state::get(tracker.store())?
        .ok_or_else(|| anyhow!("not initialized, run 'liferctl init' first"))?;
    let records = history::all(tracker.store())?;

    section("ACHIEVEMENTS");
    for def in achievements::CATALOG {
        if unlocked.iter().any(|id| id == def.id) {
            println!("  {} {} {}", def.badge.bright_yellow(), def.name.bold(), "(unlocked)".dimmed());
        } else {
            let p = achievements::progress(&def.condition, &state, &records);
            println!("  {} {}  {}", def.badge.dimmed(), def.name, bar(p.current, p.total, 12).dimmed());
        }
    }
    Ok(())
}

pub fn set_identity(tracker: &Tracker, statement: &str) -> Result<()> {
    let id = identity::set_statement(tracker.store(), tracker.clock(), statement)?;
    output::ok(&format!("identity set: \"{}\"", id.statement));
    Ok(())
}

pub fn show_identity(tracker: &Tracker) -> Result<()> {
    let Some(id) = identity::get(tracker.store())? else {
        bail!("no identity set, use 'liferctl identity set \"I am ...\"'");
    };
    let stats = identity::stats(tracker.store())?;

    section("IDENTITY");
    kv("statement", &id.statement);
    kv(
        "votes",
        &format!(
            "{} for / {} against ({}%)",
            stats.total_for, stats.total_against, stats.lifetime_percentage
        ),
    );
    kv(
        "aligned days",
        &format!("{} current / {} best", stats.current_streak, stats.longest_streak),
    );
    kv("evidence", &stats.total_evidence.to_string());

    let (weekly, _) = identity::weekly_alignment(tracker.store(), tracker.clock())?;
    kv("weekly alignment", &format!("{weekly}%"));
    Ok(())
}

pub fn vote(tracker: &Tracker, action: &str, against: bool) -> Result<()> {
    let direction = if against { VoteDirection::Against } else { VoteDirection::For };
    tracker.add_vote(action, ActionKind::Other, direction)?;
    output::ok(&format!(
        "vote {} recorded: {action}",
        if against { "against" } else { "for" }
    ));
    Ok(())
}

fn parse_gain_category(raw: &str) -> Result<GainCategory> {
    Ok(match raw {
        "skill" => GainCategory::Skill,
        "health" => GainCategory::Health,
        "productivity" => GainCategory::Productivity,
        "relationship" => GainCategory::Relationship,
        "mindset" => GainCategory::Mindset,
        other => bail!("unknown category '{other}' (skill|health|productivity|relationship|mindset)"),
    })
}

pub fn log_gain(tracker: &Tracker, category: &str, description: &str, percent: f64) -> Result<()> {
    let entry = tracker.log_gain(parse_gain_category(category)?, description, percent)?;
    output::ok(&format!("+{}% {}: {}", entry.improvement_percent, category, entry.description));
    Ok(())
}

pub fn gain_stats(tracker: &Tracker, days: u32) -> Result<()> {
    let stats = gains::stats(tracker.store(), tracker.clock())?;

    section("MARGINAL GAINS");
    kv("days improved", &stats.total_days.to_string());
    kv("improvements", &stats.total_improvements.to_string());
    kv("avg per day", &format!("{:.2}%", stats.avg_daily_improvement));
    kv("compound multiplier", &format!("{:.3}x", stats.current_multiplier));
    kv(
        "streak",
        &format!("{} current / {} best", stats.current_streak, stats.longest_streak),
    );
    for entry in &stats.category_breakdown {
        kv(
            &format!("  {:?}", entry.category).to_lowercase(),
            &format!("{} logs, avg {:.2}%", entry.count, entry.avg_improvement),
        );
    }

    let comparison = gains::one_percent_comparison(days);
    section("1% BETTER VS 1% WORSE");
    kv("days", &days.to_string());
    kv("1% better", &format!("{:.3}x", comparison.better.multiplier));
    kv("1% worse", &format!("{:.3}x", comparison.worse.multiplier));
    kv("gap", &format!("{:.1}x", comparison.difference));
    Ok(())
}

fn power_up_slug(kind: PowerUpKind) -> &'static str {
    match kind {
        PowerUpKind::DoubleXp => "double_xp",
        PowerUpKind::StreakShield => "streak_shield",
        PowerUpKind::FocusBoost => "focus_boost",
        PowerUpKind::XpBoost => "xp_boost",
        PowerUpKind::TimeFreeze => "time_freeze",
    }
}

pub fn shop(tracker: &Tracker) -> Result<()> {
    section("POWER-UP SHOP");
    for def in powerups::CATALOG {
        println!("  {:<14} {:>5} XP  {}", power_up_slug(def.kind), def.cost, def.description);
    }
    let unused = powerups::unused(tracker.store())?;
    if !unused.is_empty() {
        section("INVENTORY");
        for p in &unused {
            println!("  {}  {}", &p.id[..8], power_up_slug(p.kind));
        }
    }
    let active = powerups::active(tracker.store(), tracker.clock())?;
    if !active.is_empty() {
        section("ACTIVE");
        for p in &active {
            println!(
                "  {} until {}",
                power_up_slug(p.kind),
                p.expires_at.map(|e| e.to_rfc3339()).unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn parse_power_up(raw: &str) -> Result<PowerUpKind> {
    Ok(match raw {
        "double_xp" => PowerUpKind::DoubleXp,
        "streak_shield" => PowerUpKind::StreakShield,
        "focus_boost" => PowerUpKind::FocusBoost,
        "xp_boost" => PowerUpKind::XpBoost,
        "time_freeze" => PowerUpKind::TimeFreeze,
        other => bail!("unknown power-up '{other}'"),
    })
}

pub fn buy_power_up(tracker: &Tracker, kind: &str) -> Result<()> {
    let purchased = tracker.purchase_power_up(parse_power_up(kind)?)?;
    output::ok(&format!(
        "bought {}, activate with 'liferctl shop activate {}'",
        power_up_slug(purchased.kind),
        &purchased.id[..8]
    ));
    Ok(())
}

pub fn activate_power_up(tracker: &Tracker, needle: &str) -> Result<()> {
    let unused = powerups::unused(tracker.store())?;
    let target = unused
        .iter()
        .find(|p| p.id.starts_with(needle))
        .ok_or_else(|| anyhow!("no unused power-up matches '{needle}'"))?;
    match tracker.activate_power_up(&target.id)? {
        Some(live) => output::ok(&format!("{} active", power_up_slug(live.kind))),
        None => bail!("power-up already used"),
    }
    Ok(())
}

pub fn list_outcomes(tracker: &Tracker) -> Result<()> {
    section("OUTCOMES");
    for o in outcomes::all(tracker.store())? {
        println!(
            "  {}  {:<9} {}  {} ({} tasks)",
            &o.id[..8],
            format!("{:?}", o.status).to_lowercase(),
            bar(f64::from(o.progress), 100.0, 10),
            o.result,
            o.linked_task_count
        );
    }
    Ok(())
}

pub fn add_outcome(tracker: &Tracker, result: &str, purpose: &str) -> Result<()> {
    let outcome = outcomes::add(tracker.store(), tracker.clock(), result, purpose)?;
    output::ok(&format!("outcome '{}' added", outcome.result));
    Ok(())
}

pub fn sweep(tracker: &Tracker) -> Result<()> {
    let report = tracker.daily_sweep()?;
    section("DAILY SWEEP");
    kv("tasks spawned", &report.spawned_tasks.len().to_string());
    kv("chores reset", &report.reset_chores.to_string());
    kv("practices missed", &report.missed_practices.len().to_string());
    kv("outcomes stalled", &report.stalled_outcomes.len().to_string());
    for p in &report.missed_practices {
        output::warn(&format!("{} missed ({} total)", p.name, p.consecutive_misses));
    }
    Ok(())
}
