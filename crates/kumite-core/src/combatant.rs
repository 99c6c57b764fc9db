//! Combatant identity.
//!
//! Every combatant that enters a fight is enlisted on a [`Roster`] and gets
//! the next [`CombatantId`]. Ids are handed out in increasing order and are
//! never reused within one roster, so:
//!
//! - ordering ids orders combatants by entry, which is the order the arena
//!   resumes them in each tick;
//! - a hit record or journal entry naming a retired combatant can never be
//!   mistaken for one that entered later.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one combatant for the lifetime of a roster.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombatantId(u32);

impl CombatantId {
    pub fn new(entry: u32) -> Self {
        Self(entry)
    }

    /// Position in entry order, starting at 0.
    pub fn entry(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CombatantId(#{})", self.0)
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who is currently in the fight.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    next: u32,
    active: BTreeSet<CombatantId>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new combatant.
    pub fn enlist(&mut self) -> CombatantId {
        let id = CombatantId(self.next);
        self.next += 1;
        self.active.insert(id);
        id
    }

    /// Take a combatant out of the fight. Its id stays spent.
    pub fn retire(&mut self, id: CombatantId) -> bool {
        self.active.remove(&id)
    }

    pub fn contains(&self, id: CombatantId) -> bool {
        self.active.contains(&id)
    }

    /// Active combatants in entry order.
    pub fn iter(&self) -> impl Iterator<Item = CombatantId> + '_ {
        self.active.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Ids handed out so far, retired ones included.
    pub fn enlisted(&self) -> u32 {
        self.next
    }
}
