//! Power-up shop: spend banked XP on temporary boosts.
//!
//! The catalog is fixed. Purchases go into a ledger; activation stamps an
//! expiry and the aggregate XP multiplier is the product of every live
//! multiplier. Expiry is applied lazily on read, like the miss sweep.

use crate::clock::Clock;
use crate::error::{LiferError, Result};
use crate::keys;
use crate::store::{self, Store};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    DoubleXp,
    StreakShield,
    FocusBoost,
    XpBoost,
    TimeFreeze,
}

/// Catalog entry. `multiplier` is `None` for non-XP effects.
#[derive(Debug, Clone, Copy)]
pub struct PowerUpDef {
    pub kind: PowerUpKind,
    pub name: &'static str,
    pub description: &'static str,
    pub cost: i64,
    pub duration_minutes: i64,
    pub multiplier: Option<f64>,
}

pub const CATALOG: &[PowerUpDef] = &[
    PowerUpDef {
        kind: PowerUpKind::DoubleXp,
        name: "Double XP",
        description: "2x XP for all tasks for 1 hour",
        cost: 500,
        duration_minutes: 60,
        multiplier: Some(2.0),
    },
    PowerUpDef {
        kind: PowerUpKind::StreakShield,
        name: "Streak Shield",
        description: "Protect your streak for 1 day even if you miss tasks",
        cost: 1000,
        duration_minutes: 1440,
        multiplier: None,
    },
    PowerUpDef {
        kind: PowerUpKind::FocusBoost,
        name: "Focus Boost",
        description: "30% more XP for high-leverage tasks (7+) for 2 hours",
        cost: 300,
        duration_minutes: 120,
        multiplier: Some(1.3),
    },
    PowerUpDef {
        kind: PowerUpKind::XpBoost,
        name: "XP Boost",
        description: "50% more XP for all tasks for 30 minutes",
        cost: 250,
        duration_minutes: 30,
        multiplier: Some(1.5),
    },
    PowerUpDef {
        kind: PowerUpKind::TimeFreeze,
        name: "Time Freeze",
        description: "Extend the morning window by 2 hours",
        cost: 400,
        duration_minutes: 120,
        multiplier: None,
    },
];

pub fn find(kind: PowerUpKind) -> &'static PowerUpDef {
    // The catalog covers every variant.
    CATALOG
        .iter()
        .find(|d| d.kind == kind)
        .unwrap_or(&CATALOG[0])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasedPowerUp {
    pub id: String,
    pub kind: PowerUpKind,
    pub purchased_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: bool,
}

pub fn purchased(store: &dyn Store) -> Result<Vec<PurchasedPowerUp>> {
    store::read_or_default(store, keys::POWER_UPS)
}

fn save(store: &dyn Store, power_ups: &[PurchasedPowerUp]) -> Result<()> {
    store::write(store, keys::POWER_UPS, &power_ups)
}

/// Buy a power-up against the caller's XP balance. Fails with a precondition
/// error when the balance does not cover the cost; the caller deducts the XP.
pub fn purchase(
    store: &dyn Store,
    clock: &dyn Clock,
    kind: PowerUpKind,
    current_xp: i64,
) -> Result<PurchasedPowerUp> {
    let def = find(kind);
    if current_xp < def.cost {
        return Err(LiferError::Precondition(format!(
            "{} costs {} XP, balance is {}",
            def.name, def.cost, current_xp
        )));
    }

    let power_up = PurchasedPowerUp {
        id: Uuid::new_v4().to_string(),
        kind,
        purchased_at: clock.now(),
        used_at: None,
        expires_at: None,
        is_active: false,
    };
    let mut all = purchased(store)?;
    all.push(power_up.clone());
    save(store, &all)?;
    Ok(power_up)
}

/// Activate an unused purchase. Each purchase activates once.
pub fn activate(store: &dyn Store, clock: &dyn Clock, id: &str) -> Result<Option<PurchasedPowerUp>> {
    let now = clock.now();
    let mut all = purchased(store)?;
    let Some(power_up) = all.iter_mut().find(|p| p.id == id && p.used_at.is_none()) else {
        return Ok(None);
    };

    let def = find(power_up.kind);
    power_up.used_at = Some(now);
    power_up.expires_at = Some(now + Duration::minutes(def.duration_minutes));
    power_up.is_active = true;
    let activated = power_up.clone();
    save(store, &all)?;
    tracing::debug!(power_up = def.name, "power-up activated");
    Ok(Some(activated))
}

/// Live power-ups. Expired ones are deactivated and written back.
pub fn active(store: &dyn Store, clock: &dyn Clock) -> Result<Vec<PurchasedPowerUp>> {
    let now = clock.now();
    let mut all = purchased(store)?;
    let mut expired = false;

    for power_up in all.iter_mut() {
        if power_up.is_active && power_up.expires_at.is_some_and(|e| e < now) {
            power_up.is_active = false;
            expired = true;
        }
    }
    if expired {
        save(store, &all)?;
    }
    Ok(all.into_iter().filter(|p| p.is_active).collect())
}

pub fn has_active(store: &dyn Store, clock: &dyn Clock, kind: PowerUpKind) -> Result<bool> {
    Ok(active(store, clock)?.iter().any(|p| p.kind == kind))
}

pub fn unused(store: &dyn Store) -> Result<Vec<PurchasedPowerUp>> {
    Ok(purchased(store)?
        .into_iter()
        .filter(|p| p.used_at.is_none())
        .collect())
}

/// Product of every live XP multiplier. 1.0 when nothing is active.
pub fn xp_multiplier(store: &dyn Store, clock: &dyn Clock) -> Result<f64> {
    Ok(active(store, clock)?
        .iter()
        .filter_map(|p| find(p.kind).multiplier)
        .product())
}
