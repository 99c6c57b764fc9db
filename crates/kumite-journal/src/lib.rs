//! Kumite journal -- a tick-stamped record of everything the combat core did.
//!
//! # Modules
//!
//! - [`journal`]: Combat journal that records state changes, skill phases,
//!   hit resolutions, rejected triggers and motion-buffer activity, each with
//!   the tick and combatant it belongs to.

#![deny(unsafe_code)]

pub mod journal;

pub use journal::{CombatEvent, CombatEventKind, CombatJournal};
