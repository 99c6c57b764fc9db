//! Per-combatant attribute store with typed change subscriptions.
//!
//! The [`AttributeStore`] is the single source of truth for the fields that
//! external observers (HUD, presentation, replays) read: the combat state and
//! a fixed set of scalar counters. Every field is a variant of the closed
//! [`Attribute`] enum, and observers subscribe to one field at a time.
//! Fan-out is synchronous and happens in subscription order.
//!
//! The `State` field is written only by the
//! [`StateMachine`](crate::state::StateMachine); scalars may be written by
//! anyone holding a mutable store.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use kumite_core::attribute::{Attribute, AttributeStore, Scalar};
//! use kumite_core::combatant::CombatantId;
//! use kumite_core::state::CombatState;
//!
//! let mut store = AttributeStore::new(CombatantId::new(0), CombatState::Idle);
//! let seen = Rc::new(Cell::new(0));
//! let sink = Rc::clone(&seen);
//! store.subscribe(Attribute::Scalar(Scalar::Health), move |change| {
//!     sink.set(change.new.as_scalar().unwrap_or_default());
//! });
//!
//! store.set_scalar(Scalar::Health, 750);
//! assert_eq!(seen.get(), 750);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::combatant::CombatantId;
use crate::state::CombatState;

// ---------------------------------------------------------------------------
// Attribute
// ---------------------------------------------------------------------------

/// Scalar counters tracked for every combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scalar {
    /// Remaining health.
    Health,
    /// Stamina pool.
    Stamina,
    /// Super/meter gauge spent by skills with a gauge cost.
    Gauge,
    /// Remaining hit-stop (freeze-frame) ticks.
    HitStop,
    /// Remaining contact-stun ticks.
    HitStun,
    /// Remaining block-stun ticks.
    BlockStun,
}

impl Scalar {
    /// Every scalar, in storage order.
    pub const ALL: [Scalar; 6] = [
        Scalar::Health,
        Scalar::Stamina,
        Scalar::Gauge,
        Scalar::HitStop,
        Scalar::HitStun,
        Scalar::BlockStun,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// A watchable field of the attribute store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Attribute {
    /// The combatant's current [`CombatState`].
    State,
    /// One of the scalar counters.
    Scalar(Scalar),
}

/// The value carried by an [`AttributeChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    State(CombatState),
    Scalar(i64),
}

impl AttributeValue {
    /// The state, if this is a state value.
    pub fn as_state(self) -> Option<CombatState> {
        match self {
            AttributeValue::State(s) => Some(s),
            AttributeValue::Scalar(_) => None,
        }
    }

    /// The scalar, if this is a scalar value.
    pub fn as_scalar(self) -> Option<i64> {
        match self {
            AttributeValue::Scalar(v) => Some(v),
            AttributeValue::State(_) => None,
        }
    }
}

/// A single published change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub combatant: CombatantId,
    pub attribute: Attribute,
    pub old: AttributeValue,
    pub new: AttributeValue,
}

/// Handle returned by [`AttributeStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&AttributeChange)>;

// ---------------------------------------------------------------------------
// AttributeStore
// ---------------------------------------------------------------------------

/// Observable per-combatant fields.
pub struct AttributeStore {
    combatant: CombatantId,
    state: CombatState,
    scalars: [i64; Scalar::ALL.len()],
    observers: BTreeMap<Attribute, Vec<(SubscriptionId, Observer)>>,
    next_subscription: u64,
}

impl AttributeStore {
    /// Create a store with every scalar at zero.
    pub fn new(combatant: CombatantId, initial: CombatState) -> Self {
        Self {
            combatant,
            state: initial,
            scalars: [0; Scalar::ALL.len()],
            observers: BTreeMap::new(),
            next_subscription: 0,
        }
    }

    /// The combatant this store belongs to.
    pub fn combatant(&self) -> CombatantId {
        self.combatant
    }

    /// Current combat state.
    pub fn state(&self) -> CombatState {
        self.state
    }

    /// Current value of a scalar.
    pub fn scalar(&self, scalar: Scalar) -> i64 {
        self.scalars[scalar.index()]
    }

    /// Current value of any attribute.
    pub fn get(&self, attribute: Attribute) -> AttributeValue {
        match attribute {
            Attribute::State => AttributeValue::State(self.state),
            Attribute::Scalar(s) => AttributeValue::Scalar(self.scalar(s)),
        }
    }

    /// Write a scalar and notify its observers.
    ///
    /// Returns `false` (and notifies nobody) if the value is unchanged.
    pub fn set_scalar(&mut self, scalar: Scalar, value: i64) -> bool {
        let old = self.scalars[scalar.index()];
        if old == value {
            return false;
        }
        self.scalars[scalar.index()] = value;
        self.publish(
            Attribute::Scalar(scalar),
            AttributeValue::Scalar(old),
            AttributeValue::Scalar(value),
        );
        true
    }

    /// Add `delta` to a scalar, clamping at zero.
    pub fn adjust_scalar(&mut self, scalar: Scalar, delta: i64) -> i64 {
        let value = self.scalar(scalar).saturating_add(delta).max(0);
        self.set_scalar(scalar, value);
        value
    }

    /// Commit a new state. Only the state machine calls this.
    pub(crate) fn commit_state(&mut self, state: CombatState) {
        let old = self.state;
        self.state = state;
        self.publish(
            Attribute::State,
            AttributeValue::State(old),
            AttributeValue::State(state),
        );
    }

    /// Register an observer for one attribute.
    pub fn subscribe(
        &mut self,
        attribute: Attribute,
        observer: impl FnMut(&AttributeChange) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers
            .entry(attribute)
            .or_default()
            .push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for list in self.observers.values_mut() {
            let before = list.len();
            list.retain(|(sid, _)| *sid != id);
            if list.len() != before {
                return true;
            }
        }
        false
    }

    /// Number of observers watching `attribute`.
    pub fn observer_count(&self, attribute: Attribute) -> usize {
        self.observers.get(&attribute).map_or(0, Vec::len)
    }

    /// Serializable copy of every field.
    pub fn snapshot(&self) -> AttributeSnapshot {
        AttributeSnapshot {
            state: self.state,
            scalars: Scalar::ALL
                .iter()
                .map(|&s| (s, self.scalar(s)))
                .collect(),
        }
    }

    fn publish(&mut self, attribute: Attribute, old: AttributeValue, new: AttributeValue) {
        let change = AttributeChange {
            combatant: self.combatant,
            attribute,
            old,
            new,
        };
        if let Some(list) = self.observers.get_mut(&attribute) {
            for (_, observer) in list.iter_mut() {
                observer(&change);
            }
        }
    }
}

impl fmt::Debug for AttributeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeStore")
            .field("combatant", &self.combatant)
            .field("state", &self.state)
            .field("scalars", &self.scalars)
            .field("observers", &self.observers.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

/// Plain-data copy of an [`AttributeStore`], used for hashing and replays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSnapshot {
    pub state: CombatState,
    pub scalars: Vec<(Scalar, i64)>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
