//! Core engine for Lifer, an atomic-habits tracker.
//!
//! Everything is local-first: entities persist as JSON blobs behind the
//! [`store::Store`] trait, time flows through the injectable [`clock::Clock`],
//! and cross-entity reactions run as explicit [`effects::Effect`] lists
//! dispatched by the [`tracker::Tracker`] facade.

pub mod achievements;
pub mod chores;
pub mod clock;
pub mod effects;
pub mod error;
pub mod gains;
pub mod history;
pub mod identity;
pub mod keys;
pub mod outcomes;
pub mod powerups;
pub mod practices;
pub mod recovery;
pub mod state;
pub mod store;
pub mod tasks;
pub mod tracker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{LiferError, Result};
pub use store::{FileStore, MemoryStore, Store};
pub use tracker::Tracker;
