//! Lifer control - CLI client for the habit tracker core.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lifer_core::{FileStore, SystemClock, Tracker};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "liferctl")]
#[command(about = "Lifer - Atomic habits tracker", long_about = None)]
#[command(version)]
struct Cli {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// First-run setup: user state and core practices
    Init,

    /// Level, XP, streaks, health stats, and at-risk practices
    Status,

    /// List today's practices
    Practices,

    /// Log a value against a practice (by id prefix or name)
    Log {
        practice: String,
        value: f64,
    },

    /// List open tasks
    Tasks,

    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommands),

    /// List today's chores
    Chores,

    /// Manage chores
    #[command(subcommand)]
    Chore(ChoreCommands),

    /// Achievement catalog with unlock progress
    Achievements,

    /// Identity statement, votes, and alignment
    #[command(subcommand)]
    Identity(IdentityCommands),

    /// Marginal gains (1% improvements)
    #[command(subcommand)]
    Gains(GainCommands),

    /// Power-up shop and inventory
    #[command(subcommand)]
    Shop(ShopCommands),

    /// List outcomes
    Outcomes,

    /// Manage outcomes
    #[command(subcommand)]
    Outcome(OutcomeCommands),

    /// Daily housekeeping: spawn, reset, mark misses, stall checks
    Sweep,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task
    Add {
        title: String,
        /// Leverage score 1-10
        #[arg(long, default_value_t = 5)]
        leverage: u8,
        /// Morning task (double XP inside the morning window)
        #[arg(long)]
        morning: bool,
        /// Spawn daily from a recurring template
        #[arg(long)]
        recurring: bool,
    },
    /// Complete a task
    Done { task: String },
    /// Reopen a completed task and reverse its XP
    Undo { task: String },
}

#[derive(Subcommand)]
enum ChoreCommands {
    /// Add a chore
    Add {
        title: String,
        /// XP reward
        #[arg(long, default_value_t = 25)]
        xp: i64,
        /// daily, weekly, or monthly; omit for one-time
        #[arg(long)]
        frequency: Option<String>,
    },
    /// Complete a chore
    Done { chore: String },
}

#[derive(Subcommand)]
enum IdentityCommands {
    /// Set or reword the identity statement
    Set { statement: String },
    /// Show the statement, vote totals, and alignment streaks
    Show,
    /// Cast a manual vote
    Vote {
        action: String,
        #[arg(long)]
        against: bool,
    },
}

#[derive(Subcommand)]
enum GainCommands {
    /// Log a 1% improvement
    Log {
        /// skill, health, productivity, relationship, or mindset
        category: String,
        description: String,
        #[arg(long, default_value_t = 1.0)]
        percent: f64,
    },
    /// Compound statistics and the 1% comparison
    Stats {
        /// Projection horizon in days
        #[arg(long, default_value_t = 365)]
        days: u32,
    },
}

#[derive(Subcommand)]
enum ShopCommands {
    /// Catalog, inventory, and active power-ups
    List,
    /// Buy a power-up with banked XP
    Buy { kind: String },
    /// Activate a purchased power-up
    Activate { id: String },
}

#[derive(Subcommand)]
enum OutcomeCommands {
    /// Add an outcome (what + why)
    Add { result: String, purpose: String },
}

fn data_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(dir) = &cli.data_dir {
        return Ok(dir.clone());
    }
    Ok(dirs::data_dir()
        .context("no platform data directory")?
        .join("lifer"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = FileStore::new(data_dir(&cli)?)?;
    let tracker = Tracker::new(Box::new(store), Box::new(SystemClock));

    match &cli.command {
        Commands::Init => commands::init(&tracker),
        Commands::Status => commands::status(&tracker),
        Commands::Practices => commands::list_practices(&tracker),
        Commands::Log { practice, value } => commands::log_practice(&tracker, practice, *value),
        Commands::Tasks => commands::list_tasks(&tracker),
        Commands::Task(cmd) => match cmd {
            TaskCommands::Add { title, leverage, morning, recurring } => {
                commands::add_task(&tracker, title, *leverage, *morning, *recurring)
            }
            TaskCommands::Done { task } => commands::complete_task(&tracker, task),
            TaskCommands::Undo { task } => commands::uncomplete_task(&tracker, task),
        },
        Commands::Chores => commands::list_chores(&tracker),
        Commands::Chore(cmd) => match cmd {
            ChoreCommands::Add { title, xp, frequency } => {
                commands::add_chore(&tracker, title, *xp, frequency.as_deref())
            }
            ChoreCommands::Done { chore } => commands::complete_chore(&tracker, chore),
        },
        Commands::Achievements => commands::list_achievements(&tracker),
        Commands::Identity(cmd) => match cmd {
            IdentityCommands::Set { statement } => commands::set_identity(&tracker, statement),
            IdentityCommands::Show => commands::show_identity(&tracker),
            IdentityCommands::Vote { action, against } => {
                commands::vote(&tracker, action, *against)
            }
        },
        Commands::Gains(cmd) => match cmd {
            GainCommands::Log { category, description, percent } => {
                commands::log_gain(&tracker, category, description, *percent)
            }
            GainCommands::Stats { days } => commands::gain_stats(&tracker, *days),
        },
        Commands::Shop(cmd) => match cmd {
            ShopCommands::List => commands::shop(&tracker),
            ShopCommands::Buy { kind } => commands::buy_power_up(&tracker, kind),
            ShopCommands::Activate { id } => commands::activate_power_up(&tracker, id),
        },
        Commands::Outcomes => commands::list_outcomes(&tracker),
        Commands::Outcome(cmd) => match cmd {
            OutcomeCommands::Add { result, purpose } => {
                commands::add_outcome(&tracker, result, purpose)
            }
        },
        Commands::Sweep => commands::sweep(&tracker),
    }
}
