//! Frame-exact skill execution.
//!
//! An [`Execution`] drives one skill invocation through
//! `Startup -> Active -> Recovery -> Idle`. It is an externally stepped
//! state machine: the arena calls [`Execution::advance`] exactly once per
//! scheduler tick, and each phase ends after as many calls as it has ticks.
//! Nothing in here reads a clock or polls.
//!
//! - Entering Startup sets the combatant's state to `Startup` and starts the
//!   animation (fire-and-forget).
//! - Entering Active sets `Attack` and spawns the [`HitboxResolver`].
//!   Leaving Active always stops it.
//! - A negative recovery plus a clean hit skips Recovery entirely (landing
//!   cancel). Otherwise `Recovery` lasts `|recovery|` ticks, then `Idle`.
//! - Phases of zero ticks chain within the same call.
//!
//! If the combatant's state is changed from outside while a phase is
//! waiting (a stun, a despawn, a cancel), the next `advance` reports
//! [`ExecStatus::Interrupted`] and the resolver is stopped.

use kumite_core::combatant::CombatantId;
use kumite_core::skill::{FrameData, HitOutcome, Phase, Skill, SkillId};
use kumite_core::state::{CombatState, StateMachine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::hitbox::{Facing, HitboxResolver};
use crate::presenter::{AnimationHandle, Presenter};
use crate::spatial::SpatialQuery;
use crate::tick::TickWait;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// When a skill started. Orders every accepted trigger in an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SkillStamp {
    pub tick: u64,
    /// Arena-wide acceptance counter; breaks ties within a tick.
    pub sequence: u64,
}

/// The Startup transition was refused by a state guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("state guard refused transition to {0}")]
pub struct GuardRefused(pub CombatState);

/// Where an execution stands after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Running,
    /// Completed normally with this outcome.
    Finished(HitOutcome),
    /// Cut short. The resolver has been stopped.
    Interrupted,
}

/// Result of one [`Execution::advance`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub status: ExecStatus,
    /// Phases entered during this call, in order.
    pub entered: Vec<Phase>,
}

/// Borrowed collaborators for one step.
pub struct ExecContext<'a> {
    pub combatant: CombatantId,
    pub machine: &'a mut StateMachine,
    pub spatial: &'a mut dyn SpatialQuery,
    pub facing: Facing,
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// One live skill invocation.
#[derive(Debug)]
pub struct Execution {
    skill: SkillId,
    stamp: SkillStamp,
    frame: FrameData,
    counter_eligible: bool,
    phase: Phase,
    wait: TickWait,
    resolver: Option<HitboxResolver>,
    outcome: HitOutcome,
    animation: AnimationHandle,
    suspensions: u32,
    failed: bool,
}

impl Execution {
    /// Enter Startup and start the animation.
    ///
    /// Fails, leaving the state untouched, if the Startup guard refuses.
    pub fn begin(
        skill_id: SkillId,
        skill: &Skill,
        stamp: SkillStamp,
        ctx: &mut ExecContext<'_>,
        presenter: &mut dyn Presenter,
    ) -> Result<(Self, Vec<Phase>), GuardRefused> {
        if !ctx.machine.set_state(CombatState::Startup) {
            return Err(GuardRefused(CombatState::Startup));
        }
        let frame = skill.frame_data().clone();
        let animation = presenter.play_animation(ctx.combatant, frame.animation());

        let mut exec = Self {
            skill: skill_id,
            stamp,
            wait: TickWait::new(frame.startup()),
            frame,
            counter_eligible: skill.counter_eligible(),
            phase: Phase::Startup,
            resolver: None,
            outcome: HitOutcome::Whiffed,
            animation,
            suspensions: 0,
            failed: false,
        };
        let mut entered = vec![Phase::Startup];
        if exec.wait.is_done() {
            exec.settle(ctx, &mut entered);
        }
        Ok((exec, entered))
    }

    /// Resume after one scheduler tick.
    pub fn advance(&mut self, ctx: &mut ExecContext<'_>) -> Advance {
        let mut entered = Vec::new();
        if self.failed {
            return Advance {
                status: ExecStatus::Interrupted,
                entered,
            };
        }
        if !self.owns(ctx.machine.get_state()) {
            trace!(
                combatant = %ctx.combatant,
                skill = %self.skill,
                phase = %self.phase,
                state = %ctx.machine.get_state(),
                "execution interrupted by external state change"
            );
            self.interrupt(ctx.spatial);
            return Advance {
                status: ExecStatus::Interrupted,
                entered,
            };
        }

        self.suspensions += 1;
        if !self.wait.tick() {
            return Advance {
                status: ExecStatus::Running,
                entered,
            };
        }
        let status = self.settle(ctx, &mut entered);
        Advance { status, entered }
    }

    /// Move through every phase whose wait is over.
    fn settle(&mut self, ctx: &mut ExecContext<'_>, entered: &mut Vec<Phase>) -> ExecStatus {
        loop {
            match self.phase {
                Phase::Startup => {
                    if !self.enter(ctx, CombatState::Attack) {
                        return ExecStatus::Interrupted;
                    }
                    self.phase = Phase::Active;
                    self.wait = TickWait::new(self.frame.active());
                    self.resolver = Some(HitboxResolver::spawn(
                        ctx.combatant,
                        self.skill,
                        self.frame.hitbox(),
                        self.counter_eligible,
                        ctx.facing,
                        self.frame.active(),
                        ctx.spatial,
                    ));
                    entered.push(Phase::Active);
                }
                Phase::Active => {
                    self.stop_resolver(ctx.spatial);
                    if self.frame.landing_cancel() && self.outcome.is_contact() {
                        ctx.machine.set_state(CombatState::Idle);
                        return ExecStatus::Finished(self.outcome);
                    }
                    if !self.enter(ctx, CombatState::Recovery) {
                        return ExecStatus::Interrupted;
                    }
                    self.phase = Phase::Recovery;
                    self.wait = TickWait::new(self.frame.recovery_ticks());
                    entered.push(Phase::Recovery);
                }
                Phase::Recovery => {
                    ctx.machine.set_state(CombatState::Idle);
                    return ExecStatus::Finished(self.outcome);
                }
            }
            if !self.wait.is_done() {
                return ExecStatus::Running;
            }
        }
    }

    fn enter(&mut self, ctx: &mut ExecContext<'_>, state: CombatState) -> bool {
        if ctx.machine.set_state(state) {
            return true;
        }
        trace!(combatant = %ctx.combatant, %state, "phase transition refused");
        self.interrupt(ctx.spatial);
        false
    }

    fn stop_resolver(&mut self, spatial: &mut dyn SpatialQuery) {
        if let Some(resolver) = self.resolver.as_mut() {
            resolver.stop(spatial);
        }
        self.resolver = None;
    }

    /// The combatant state the current phase holds.
    pub fn phase_state(&self) -> CombatState {
        match self.phase {
            Phase::Startup => CombatState::Startup,
            Phase::Active => CombatState::Attack,
            Phase::Recovery => CombatState::Recovery,
        }
    }

    /// Whether `state` still belongs to this execution. False once anything
    /// outside the execution has moved the combatant, or after an interrupt.
    pub fn owns(&self, state: CombatState) -> bool {
        !self.failed && state == self.phase_state()
    }

    /// Fold a resolved hit into the execution's outcome.
    pub fn record_outcome(&mut self, outcome: HitOutcome) {
        self.outcome = self.outcome.max(outcome);
    }

    /// Abandon the execution, stopping its resolver. Safe to call twice.
    pub fn interrupt(&mut self, spatial: &mut dyn SpatialQuery) {
        self.stop_resolver(spatial);
        self.failed = true;
    }

    // -- accessors ----------------------------------------------------------

    pub fn skill(&self) -> SkillId {
        self.skill
    }

    pub fn stamp(&self) -> SkillStamp {
        self.stamp
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Strongest outcome so far.
    pub fn outcome(&self) -> HitOutcome {
        self.outcome
    }

    /// Ticks left in the current phase.
    pub fn remaining_in_phase(&self) -> u32 {
        self.wait.remaining()
    }

    /// Ticks this execution has been resumed for.
    pub fn suspensions(&self) -> u32 {
        self.suspensions
    }

    pub fn animation(&self) -> AnimationHandle {
        self.animation
    }

    /// The live resolver, during Active.
    pub fn resolver_mut(&mut self) -> Option<&mut HitboxResolver> {
        self.resolver.as_mut()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
