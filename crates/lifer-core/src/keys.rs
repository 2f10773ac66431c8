//! Storage keys. One key per entity collection.

pub const USER_STATE: &str = "user_state";
pub const TASKS: &str = "tasks";
pub const RECURRING_TASKS: &str = "recurring_tasks";
pub const PRACTICES: &str = "practices";
pub const CHORES: &str = "chores";
pub const OUTCOMES: &str = "outcomes";
pub const HISTORY: &str = "history";
pub const UNLOCKED_ACHIEVEMENTS: &str = "unlocked_achievements";
pub const IDENTITY: &str = "identity";
pub const IDENTITY_VOTES: &str = "identity_votes";
pub const IDENTITY_EVIDENCE: &str = "identity_evidence";
pub const IDENTITY_ALIGNMENT: &str = "identity_alignment";
pub const RECOVERY_EVENTS: &str = "recovery_events";
pub const MARGINAL_GAINS: &str = "marginal_gains";
pub const POWER_UPS: &str = "power_ups";
