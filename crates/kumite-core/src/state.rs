//! Guarded per-combatant state machine.
//!
//! [`StateMachine::set_state`] is the only path that changes a combatant's
//! [`CombatState`]. A transition runs in a fixed order:
//!
//! 1. Same-state requests are a no-op and return `false`.
//! 2. The guard registered for the target (if any) is evaluated against the
//!    current attribute store; a falsy guard rejects the transition.
//! 3. State-change listeners fire with `(old, new)`.
//! 4. The effect registered for the target (if any) runs with the old state.
//! 5. The target is committed to the [`AttributeStore`], which publishes the
//!    change to its `State` observers.
//!
//! Guards and effects are singular per state: registering a second one
//! replaces the first and logs a warning.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::attribute::AttributeStore;
use crate::combatant::CombatantId;

// ---------------------------------------------------------------------------
// CombatState
// ---------------------------------------------------------------------------

/// What a combatant is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CombatState {
    Idle,
    Walk,
    Crouch,
    Midair,
    /// Skill wind-up before the hitbox appears.
    Startup,
    /// Skill active window (hitbox live).
    Attack,
    /// Skill wind-down after the active window.
    Recovery,
    Hitstun,
    HitstunCrouching,
    Knockdown,
    KnockdownAirborne,
    Block,
    BlockCrouching,
}

impl CombatState {
    /// Whether the combatant cannot freely act in this state.
    pub fn is_negative(self) -> bool {
        matches!(
            self,
            CombatState::Startup
                | CombatState::Attack
                | CombatState::Recovery
                | CombatState::Hitstun
                | CombatState::HitstunCrouching
                | CombatState::Knockdown
                | CombatState::KnockdownAirborne
        )
    }

    /// Whether the combatant is low to the ground in this state.
    pub fn is_crouching(self) -> bool {
        matches!(
            self,
            CombatState::Crouch | CombatState::HitstunCrouching | CombatState::BlockCrouching
        )
    }

    /// Whether the combatant is reeling from a hit or a block.
    pub fn is_stunned(self) -> bool {
        matches!(
            self,
            CombatState::Hitstun
                | CombatState::HitstunCrouching
                | CombatState::Knockdown
                | CombatState::KnockdownAirborne
                | CombatState::Block
                | CombatState::BlockCrouching
        )
    }

    /// Whether the combatant is off the ground.
    pub fn is_airborne(self) -> bool {
        matches!(self, CombatState::Midair | CombatState::KnockdownAirborne)
    }
}

impl fmt::Display for CombatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

/// Predicate consulted before entering a state.
pub type StateGuard = Box<dyn Fn(&AttributeStore) -> bool>;

/// Side effect run when a state is entered. Receives the old state.
pub type StateEffect = Box<dyn FnMut(CombatState)>;

/// Observer of every accepted transition, called with `(old, new)`.
pub type StateListener = Box<dyn FnMut(CombatState, CombatState)>;

/// Guarded state storage for one combatant.
///
/// The machine owns the combatant's [`AttributeStore`]; the store's `State`
/// field cannot be written from outside this module.
pub struct StateMachine {
    attributes: AttributeStore,
    guards: HashMap<CombatState, StateGuard>,
    effects: HashMap<CombatState, StateEffect>,
    listeners: Vec<StateListener>,
    default_state: Option<CombatState>,
}

impl StateMachine {
    /// Create a machine for `combatant` starting in `initial`.
    pub fn new(combatant: CombatantId, initial: CombatState) -> Self {
        Self {
            attributes: AttributeStore::new(combatant, initial),
            guards: HashMap::new(),
            effects: HashMap::new(),
            listeners: Vec::new(),
            default_state: None,
        }
    }

    /// Attempt to transition to `target`.
    ///
    /// Returns `true` if the state changed.
    pub fn set_state(&mut self, target: CombatState) -> bool {
        let current = self.attributes.state();
        if target == current {
            return false;
        }
        if let Some(guard) = self.guards.get(&target) {
            if !guard(&self.attributes) {
                trace!(
                    combatant = %self.attributes.combatant(),
                    from = %current,
                    to = %target,
                    "transition rejected by guard"
                );
                return false;
            }
        }

        for listener in &mut self.listeners {
            listener(current, target);
        }
        if let Some(effect) = self.effects.get_mut(&target) {
            effect(current);
        }
        self.attributes.commit_state(target);
        true
    }

    /// The current state.
    pub fn get_state(&self) -> CombatState {
        self.attributes.state()
    }

    /// Whether the current state is any of `states`.
    pub fn is_state(&self, states: &[CombatState]) -> bool {
        states.contains(&self.attributes.state())
    }

    /// Register the guard for `state`, replacing any previous one.
    pub fn set_state_guard(
        &mut self,
        state: CombatState,
        guard: impl Fn(&AttributeStore) -> bool + 'static,
    ) {
        if self.guards.insert(state, Box::new(guard)).is_some() {
            warn!(
                combatant = %self.attributes.combatant(),
                %state,
                "overwriting existing state guard"
            );
        }
    }

    /// Remove the guard for `state`. Returns `true` if one was registered.
    pub fn clear_state_guard(&mut self, state: CombatState) -> bool {
        self.guards.remove(&state).is_some()
    }

    /// Register the entry effect for `state`, replacing any previous one.
    pub fn set_state_effect(&mut self, state: CombatState, effect: impl FnMut(CombatState) + 'static) {
        if self.effects.insert(state, Box::new(effect)).is_some() {
            warn!(
                combatant = %self.attributes.combatant(),
                %state,
                "overwriting existing state effect"
            );
        }
    }

    /// Observe every accepted transition.
    pub fn on_state_changed(&mut self, listener: impl FnMut(CombatState, CombatState) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Configure the state [`reset_state`](Self::reset_state) returns to.
    pub fn set_default_state(&mut self, state: CombatState) {
        self.default_state = Some(state);
    }

    /// The configured default state, if any.
    pub fn default_state(&self) -> Option<CombatState> {
        self.default_state
    }

    /// Transition to the default state. No-op without one.
    pub fn reset_state(&mut self) -> bool {
        match self.default_state {
            Some(state) => self.set_state(state),
            None => false,
        }
    }

    /// Read access to the combatant's attributes.
    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Write access to the combatant's scalar attributes and subscriptions.
    pub fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("attributes", &self.attributes)
            .field("guards", &self.guards.keys().collect::<Vec<_>>())
            .field("effects", &self.effects.keys().collect::<Vec<_>>())
            .field("default_state", &self.default_state)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
