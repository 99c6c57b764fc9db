//! Combat journal for reconstructing what happened on which tick.
//!
//! The [`CombatJournal`] accumulates [`CombatEvent`]s as the arena runs. Each
//! event names the tick it happened on, the combatant it concerns and a
//! [`CombatEventKind`] payload. Events are kept in insertion order, which is
//! also tick order because the arena only ever records for the current tick.
//!
//! An optional capacity turns the journal into a ring: once full, the oldest
//! events are discarded.
//!
//! # Query API
//!
//! - **Combatant**: [`CombatJournal::events_for`]
//! - **Tick**: [`CombatJournal::events_at`]
//! - **State path**: [`CombatJournal::state_sequence`]
//! - **Hits**: [`CombatJournal::hits_by`]
//!
//! # Example
//!
//! ```
//! use kumite_core::combatant::CombatantId;
//! use kumite_core::state::CombatState;
//! use kumite_journal::{CombatEvent, CombatEventKind, CombatJournal};
//!
//! let mut journal = CombatJournal::new();
//! let fighter = CombatantId::new(0);
//! journal.record(CombatEvent {
//!     tick: 3,
//!     combatant: fighter,
//!     kind: CombatEventKind::StateChanged {
//!         from: CombatState::Idle,
//!         to: CombatState::Startup,
//!     },
//! });
//!
//! assert_eq!(journal.len(), 1);
//! assert_eq!(
//!     journal.state_sequence(fighter),
//!     vec![CombatState::Idle, CombatState::Startup]
//! );
//! ```

use std::collections::VecDeque;

use kumite_core::combatant::CombatantId;
use kumite_core::skill::{HitOutcome, Phase, SkillId};
use kumite_core::state::CombatState;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// CombatEvent
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatEventKind {
    /// The combatant joined the arena.
    Spawned,
    /// The combatant left the arena.
    Despawned,
    /// An accepted state transition.
    StateChanged { from: CombatState, to: CombatState },
    /// A trigger was accepted and an execution began.
    SkillStarted { skill: SkillId, sequence: u64 },
    PhaseEntered { skill: SkillId, phase: Phase },
    /// The attacker's hitbox resolved against `target`.
    HitResolved {
        skill: SkillId,
        target: CombatantId,
        outcome: HitOutcome,
    },
    /// The execution ran to completion.
    SkillFinished { skill: SkillId, outcome: HitOutcome },
    /// The execution was cut short (stun, cancel or despawn).
    SkillInterrupted { skill: SkillId },
    /// A trigger request was refused. `reason` is the rejection's display text.
    TriggerRejected { skill: Option<SkillId>, reason: String },
    HitStopApplied { ticks: u32 },
    MotionMatched { skill: SkillId },
    MotionAmbiguous { candidates: Vec<SkillId> },
    /// The motion buffer timed out and dropped tokens.
    BufferPurged { dropped: usize },
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEvent {
    pub tick: u64,
    pub combatant: CombatantId,
    pub kind: CombatEventKind,
}

// ---------------------------------------------------------------------------
// CombatJournal
// ---------------------------------------------------------------------------

/// Ordered log of [`CombatEvent`]s.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatJournal {
    events: VecDeque<CombatEvent>,
    capacity: Option<usize>,
    #[serde(default)]
    dropped: u64,
}

impl CombatJournal {
    /// Create an unbounded journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a journal that keeps at most `capacity` events.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
            dropped: 0,
        }
    }

    /// Append an event, evicting the oldest one if the journal is full.
    pub fn record(&mut self, event: CombatEvent) {
        if let Some(cap) = self.capacity {
            if cap == 0 {
                self.dropped += 1;
                return;
            }
            if self.events.len() == cap {
                if self.dropped == 0 {
                    warn!(capacity = cap, "combat journal full, evicting oldest events");
                }
                self.events.pop_front();
                self.dropped += 1;
            }
        }
        self.events.push_back(event);
    }

    /// Drop every event.
    pub fn clear(&mut self) {
        self.events.clear();
        self.dropped = 0;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events evicted since the last [`clear`](Self::clear).
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Every retained event, oldest first.
    pub fn all_events(&self) -> impl Iterator<Item = &CombatEvent> {
        self.events.iter()
    }

    /// Events concerning `combatant`.
    pub fn events_for(&self, combatant: CombatantId) -> impl Iterator<Item = &CombatEvent> {
        self.events.iter().filter(move |e| e.combatant == combatant)
    }

    /// Events recorded on `tick`.
    pub fn events_at(&self, tick: u64) -> impl Iterator<Item = &CombatEvent> {
        self.events.iter().filter(move |e| e.tick == tick)
    }

    /// Hit resolutions produced by `attacker`.
    pub fn hits_by(
        &self,
        attacker: CombatantId,
    ) -> impl Iterator<Item = (u64, CombatantId, HitOutcome)> + '_ {
        self.events_for(attacker).filter_map(|e| match e.kind {
            CombatEventKind::HitResolved { target, outcome, .. } => Some((e.tick, target, outcome)),
            _ => None,
        })
    }

    /// The path of states `combatant` walked through.
    ///
    /// Starts with the `from` state of the first recorded transition, then
    /// lists each `to` state in order. Empty if no transition was recorded.
    pub fn state_sequence(&self, combatant: CombatantId) -> Vec<CombatState> {
        let mut path = Vec::new();
        for event in self.events_for(combatant) {
            if let CombatEventKind::StateChanged { from, to } = event.kind {
                if path.is_empty() {
                    path.push(from);
                }
                path.push(to);
            }
        }
        path
    }

    /// Ticks on which `combatant` entered `state`.
    pub fn ticks_entering(&self, combatant: CombatantId, state: CombatState) -> Vec<u64> {
        self.events_for(combatant)
            .filter(|e| matches!(e.kind, CombatEventKind::StateChanged { to, .. } if to == state))
            .map(|e| e.tick)
            .collect()
    }

    /// Serialize the retained events as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.events)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
