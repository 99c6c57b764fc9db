//! Combat orchestration.
//!
//! The [`Arena`] owns every combatant and wires the pieces together: the
//! [`Scheduler`] clock, the rapier-backed [`SpatialWorld`], one
//! [`StateMachine`] and [`MotionRecognizer`] per combatant, the live
//! [`Execution`]s and the [`CombatJournal`].
//!
//! # Triggers
//!
//! [`Arena::trigger`] is the only way a skill starts. A request is accepted
//! when the combatant is not in a negative state, or when it is in Recovery
//! after a skill that connected and the requested skill is in that skill's
//! gatling set. Accepting abandons whatever execution was in flight. A
//! rejected request changes nothing except the journal.
//!
//! # Per-tick order
//!
//! Combatants are resumed in spawn order, once per tick. For each one:
//!
//! 1. hit-stop and stun countdowns tick (a countdown never ticks on the tick
//!    it was armed);
//! 2. the motion buffer ages and may purge;
//! 3. an execution whose state was forced away since the last tick is
//!    interrupted;
//! 4. otherwise a live hitbox sweeps and every hit is applied to both parties;
//! 5. the execution advances one tick.
//!
//! Once [`Arena::await_ack`] has requests outstanding, each tick also expires
//! the ones past their deadline into [`Arena::take_expired_acks`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use kumite_core::attribute::{AttributeSnapshot, Scalar};
use kumite_core::combatant::{CombatantId, Roster};
use kumite_core::motion::{
    Button, ButtonMode, Direction, InputEvent, MatchOutcome, MotionRecognizer, MotionToken,
};
use kumite_core::skill::{GroundedType, HitOutcome, Phase, SkillId, SkillLibrary};
use kumite_core::state::{CombatState, StateMachine};
use kumite_journal::{CombatEvent, CombatEventKind, CombatJournal};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::ack::{AckError, AckResponse, AckTracker, RequestId};
use crate::config::{CombatConfig, ConfigError};
use crate::executor::{ExecContext, ExecStatus, Execution, SkillStamp};
use crate::hitbox::{Facing, Hit, Posture};
use crate::presenter::{NullPresenter, Presenter};
use crate::spatial::{SpatialQuery, SpatialWorld};
use crate::tick::{ListenerId, Scheduler, TickBroadcast, TickDiagnostics};

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// Why a trigger request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerRejected {
    #[error("no combatant {0}")]
    UnknownCombatant(CombatantId),

    #[error("no skill {0} in the library")]
    UnknownSkill(SkillId),

    #[error("combatant is busy ({0})")]
    NegativeState(CombatState),

    #[error("cannot cancel {from:?} into {to} after a {outcome:?} outcome")]
    GatlingUnavailable {
        from: Option<SkillId>,
        to: SkillId,
        outcome: HitOutcome,
    },

    #[error("skill costs {cost} gauge, {available} available")]
    InsufficientGauge { cost: i64, available: i64 },

    #[error("{grounded:?} skill cannot start from {state}")]
    GroundedMismatch {
        grounded: GroundedType,
        state: CombatState,
    },

    #[error("startup refused by state guard")]
    StartupRefused,
}

/// What an [`Arena::input`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// The combatant does not exist.
    Ignored,
    /// A direction was classified (already mirrored for facing).
    Direction {
        direction: Direction,
        /// A new token entered the motion buffer.
        appended: bool,
        /// Locomotion changed the combatant's state.
        moved: bool,
    },
    Released,
    NoMatch,
    Ambiguous(Vec<SkillId>),
    Triggered { skill: SkillId, stamp: SkillStamp },
    Rejected { skill: SkillId, reason: TriggerRejected },
}

// ---------------------------------------------------------------------------
// Bookkeeping
// ---------------------------------------------------------------------------

/// The last skill a combatant started and how it went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookkeeping {
    pub last_skill: Option<SkillId>,
    pub last_outcome: HitOutcome,
    pub last_started: Option<SkillStamp>,
}

/// One attacker's contribution against a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub hits: u32,
    pub damage: i64,
    pub last_tick: u64,
}

/// Who has landed clean hits on a combatant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContributorRecord {
    by_attacker: BTreeMap<CombatantId, Contribution>,
}

impl ContributorRecord {
    pub fn credit(&mut self, attacker: CombatantId, damage: i64, tick: u64) {
        let entry = self.by_attacker.entry(attacker).or_default();
        entry.hits += 1;
        entry.damage += damage;
        entry.last_tick = tick;
    }

    pub fn get(&self, attacker: CombatantId) -> Option<&Contribution> {
        self.by_attacker.get(&attacker)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CombatantId, &Contribution)> {
        self.by_attacker.iter().map(|(id, c)| (*id, c))
    }

    /// The attacker that landed the most recent hit.
    pub fn last_attacker(&self) -> Option<CombatantId> {
        self.by_attacker
            .iter()
            .max_by_key(|(id, c)| (c.last_tick, **id))
            .map(|(id, _)| *id)
    }

    pub fn total_damage(&self) -> i64 {
        self.by_attacker.values().map(|c| c.damage).sum()
    }

    pub fn len(&self) -> usize {
        self.by_attacker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_attacker.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// Tick countdown that ignores the tick it was armed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Countdown {
    remaining: u32,
    armed_on: u64,
}

impl Countdown {
    fn arm(&mut self, ticks: u32, now: u64) {
        self.remaining = ticks;
        self.armed_on = now;
    }

    /// Returns `true` if the countdown moved.
    fn tick(&mut self, now: u64) -> bool {
        if self.remaining == 0 || self.armed_on == now {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

// ---------------------------------------------------------------------------
// Combatant
// ---------------------------------------------------------------------------

struct Combatant {
    listener: ListenerId,
    machine: StateMachine,
    motion: MotionRecognizer,
    execution: Option<Execution>,
    bookkeeping: Bookkeeping,
    contributors: ContributorRecord,
    facing: Facing,
    guarding: bool,
    hit_stop: Countdown,
    stun: Countdown,
    /// Which scalar mirrors `stun`.
    stun_scalar: Scalar,
}

impl Combatant {
    fn posture(&self) -> Posture {
        Posture {
            state: self.machine.get_state(),
            guarding: self.guarding,
        }
    }

    fn arm_hit_stop(&mut self, ticks: u32, now: u64) {
        if ticks == 0 {
            return;
        }
        self.hit_stop.arm(ticks, now);
        self.machine
            .attributes_mut()
            .set_scalar(Scalar::HitStop, i64::from(ticks));
    }

    fn arm_stun(&mut self, scalar: Scalar, ticks: u32, now: u64) {
        let ticks = ticks.max(1);
        if self.stun_scalar != scalar {
            self.machine.attributes_mut().set_scalar(self.stun_scalar, 0);
            self.stun_scalar = scalar;
        }
        self.stun.arm(ticks, now);
        self.machine
            .attributes_mut()
            .set_scalar(scalar, i64::from(ticks));
    }
}

/// Locomotion state for a (facing-relative) direction.
fn locomotion(direction: Direction) -> CombatState {
    match direction {
        Direction::Neutral | Direction::Up => CombatState::Idle,
        d if d.is_down() => CombatState::Crouch,
        _ => CombatState::Walk,
    }
}

type PendingTransitions = Rc<RefCell<Vec<(CombatantId, CombatState, CombatState)>>>;

struct Started {
    stamp: SkillStamp,
    entered: Vec<Phase>,
    abandoned: Option<SkillId>,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Plain-data view of one combatant, used for state hashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantSnapshot {
    pub id: CombatantId,
    pub attributes: AttributeSnapshot,
    pub position: Option<(f32, f32)>,
    pub facing: Facing,
    pub guarding: bool,
    pub bookkeeping: Bookkeeping,
    pub contributors: Vec<(CombatantId, Contribution)>,
    pub motion: Vec<MotionToken>,
    /// Skill, phase, ticks left in phase and outcome so far.
    pub execution: Option<(SkillId, Phase, u32, HitOutcome)>,
}

/// Plain-data view of the whole arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    pub tick: u64,
    pub sequence: u64,
    pub combatants: Vec<CombatantSnapshot>,
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// The combat orchestrator.
pub struct Arena {
    config: CombatConfig,
    library: SkillLibrary,
    scheduler: Scheduler,
    spatial: SpatialWorld,
    presenter: Box<dyn Presenter>,
    roster: Roster,
    combatants: BTreeMap<CombatantId, Combatant>,
    listeners: BTreeMap<ListenerId, CombatantId>,
    journal: CombatJournal,
    transitions: PendingTransitions,
    acks: AckTracker,
    /// Timed-out acknowledgements not yet collected by the host.
    expired_acks: Vec<AckError>,
    /// Accepted triggers so far.
    sequence: u64,
    diagnostics: TickDiagnostics,
}

impl Arena {
    /// Create an arena that discards animation requests.
    pub fn new(config: CombatConfig, library: SkillLibrary) -> Result<Self, ConfigError> {
        Self::with_presenter(config, library, Box::new(NullPresenter::default()))
    }

    /// Create an arena that sends animation requests to `presenter`.
    pub fn with_presenter(
        config: CombatConfig,
        library: SkillLibrary,
        presenter: Box<dyn Presenter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let journal = match config.journal_capacity {
            Some(capacity) => CombatJournal::with_capacity_limit(capacity),
            None => CombatJournal::new(),
        };
        let acks = AckTracker::new(config.ack_timeout_ticks);
        Ok(Self {
            scheduler: Scheduler::new(config.tick.clone()),
            config,
            library,
            spatial: SpatialWorld::new(),
            presenter,
            roster: Roster::new(),
            combatants: BTreeMap::new(),
            listeners: BTreeMap::new(),
            journal,
            transitions: PendingTransitions::default(),
            acks,
            expired_acks: Vec::new(),
            sequence: 0,
            diagnostics: TickDiagnostics::default(),
        })
    }

    // -- lifecycle ----------------------------------------------------------

    /// Add a combatant with the configured profile.
    pub fn spawn(&mut self, position: (f32, f32), facing: Facing) -> CombatantId {
        let id = self.roster.enlist();
        let profile = &self.config.profile;

        let mut machine = StateMachine::new(id, CombatState::Idle);
        machine.set_default_state(CombatState::Idle);
        let sink = Rc::clone(&self.transitions);
        machine.on_state_changed(move |from, to| sink.borrow_mut().push((id, from, to)));
        let attributes = machine.attributes_mut();
        attributes.set_scalar(Scalar::Health, profile.health);
        attributes.set_scalar(Scalar::Stamina, profile.stamina);
        attributes.set_scalar(Scalar::Gauge, profile.gauge);

        self.spatial.insert_body(id, position, profile.hurtbox);
        let listener = self.scheduler.register(&format!("combatant {id}"));
        self.listeners.insert(listener, id);
        self.combatants.insert(
            id,
            Combatant {
                listener,
                machine,
                motion: MotionRecognizer::new(self.config.motion.clone()),
                execution: None,
                bookkeeping: Bookkeeping::default(),
                contributors: ContributorRecord::default(),
                facing,
                guarding: false,
                hit_stop: Countdown::default(),
                stun: Countdown::default(),
                stun_scalar: Scalar::HitStun,
            },
        );
        debug!(combatant = %id, ?position, ?facing, "spawned");
        self.record(id, CombatEventKind::Spawned);
        id
    }

    /// Remove a combatant, stopping any live hitbox. Returns `false` if it
    /// did not exist.
    pub fn despawn(&mut self, id: CombatantId) -> bool {
        let Some(mut combatant) = self.combatants.remove(&id) else {
            return false;
        };
        let abandoned = combatant.execution.take().map(|mut execution| {
            execution.interrupt(&mut self.spatial);
            execution.skill()
        });
        self.spatial.remove_body(id);
        self.scheduler.unregister(combatant.listener);
        self.listeners.remove(&combatant.listener);
        self.roster.retire(id);

        if let Some(skill) = abandoned {
            self.record(id, CombatEventKind::SkillInterrupted { skill });
        }
        self.record(id, CombatEventKind::Despawned);
        debug!(combatant = %id, "despawned");
        true
    }

    // -- triggers -----------------------------------------------------------

    /// Request that `id` start `skill`.
    pub fn trigger(
        &mut self,
        id: CombatantId,
        skill: SkillId,
    ) -> Result<SkillStamp, TriggerRejected> {
        let result = self.try_trigger(id, skill);
        match &result {
            Ok(started) => {
                if let Some(old) = started.abandoned {
                    self.record(id, CombatEventKind::SkillInterrupted { skill: old });
                }
                self.record(
                    id,
                    CombatEventKind::SkillStarted {
                        skill,
                        sequence: started.stamp.sequence,
                    },
                );
                for &phase in &started.entered {
                    self.record(id, CombatEventKind::PhaseEntered { skill, phase });
                }
            }
            Err(reason) => {
                debug!(combatant = %id, %skill, %reason, "trigger rejected");
                if self.combatants.contains_key(&id) {
                    self.record(
                        id,
                        CombatEventKind::TriggerRejected {
                            skill: Some(skill),
                            reason: reason.to_string(),
                        },
                    );
                }
            }
        }
        self.flush_transitions();
        result.map(|started| started.stamp)
    }

    fn try_trigger(&mut self, id: CombatantId, skill: SkillId) -> Result<Started, TriggerRejected> {
        let tick = self.scheduler.tick_count();
        let definition = self
            .library
            .get(skill)
            .ok_or(TriggerRejected::UnknownSkill(skill))?;
        let combatant = self
            .combatants
            .get_mut(&id)
            .ok_or(TriggerRejected::UnknownCombatant(id))?;

        let state = combatant.machine.get_state();
        if state.is_negative() {
            if state != CombatState::Recovery {
                return Err(TriggerRejected::NegativeState(state));
            }
            let book = combatant.bookkeeping;
            let cancellable = book.last_outcome.connected()
                && book
                    .last_skill
                    .is_some_and(|last| self.library.can_cancel_into(last, skill));
            if !cancellable {
                return Err(TriggerRejected::GatlingUnavailable {
                    from: book.last_skill,
                    to: skill,
                    outcome: book.last_outcome,
                });
            }
        }

        if self.config.enforce_grounded_type {
            let airborne = state.is_airborne();
            let allowed = match definition.grounded() {
                GroundedType::Ground => !airborne,
                GroundedType::AirOk => true,
                GroundedType::AirOnly => airborne,
            };
            if !allowed {
                return Err(TriggerRejected::GroundedMismatch {
                    grounded: definition.grounded(),
                    state,
                });
            }
        }

        let cost = definition.gauge_cost();
        let available = combatant.machine.attributes().scalar(Scalar::Gauge);
        if cost > available {
            return Err(TriggerRejected::InsufficientGauge { cost, available });
        }

        let stamp = SkillStamp {
            tick,
            sequence: self.sequence + 1,
        };
        let previous = combatant.execution.take();
        let mut ctx = ExecContext {
            combatant: id,
            machine: &mut combatant.machine,
            spatial: &mut self.spatial,
            facing: combatant.facing,
        };
        let (execution, entered) =
            match Execution::begin(skill, definition, stamp, &mut ctx, self.presenter.as_mut()) {
                Ok(started) => started,
                Err(_) => {
                    combatant.execution = previous;
                    return Err(TriggerRejected::StartupRefused);
                }
            };

        let abandoned = previous.map(|mut old| {
            old.interrupt(&mut self.spatial);
            old.skill()
        });
        combatant.bookkeeping = Bookkeeping {
            last_skill: Some(skill),
            last_outcome: HitOutcome::Whiffed,
            last_started: Some(stamp),
        };
        if cost > 0 {
            combatant
                .machine
                .attributes_mut()
                .adjust_scalar(Scalar::Gauge, -cost);
        }
        combatant.execution = Some(execution);
        self.sequence = stamp.sequence;

        debug!(
            combatant = %id,
            skill = definition.name(),
            tick,
            sequence = stamp.sequence,
            cancelled = abandoned.is_some(),
            "skill started"
        );
        Ok(Started {
            stamp,
            entered,
            abandoned,
        })
    }

    // -- input --------------------------------------------------------------

    /// Deliver one input event to a combatant.
    ///
    /// Directions are mirrored when the combatant faces left, buffered, and
    /// mapped to locomotion while the combatant is idle, walking or
    /// crouching. A button press that completes a motion triggers the
    /// matched skill.
    pub fn input(&mut self, id: CombatantId, event: InputEvent) -> InputOutcome {
        let outcome = match event {
            InputEvent::Direction(direction) => self.direction_input(id, direction),
            InputEvent::Stick { x, y } => self.direction_input(id, Direction::classify(x, y)),
            InputEvent::Button {
                button,
                mode: ButtonMode::Press,
            } => self.press(id, button),
            InputEvent::Button {
                button,
                mode: ButtonMode::Release,
            } => {
                // Releases never reach the motion buffer.
                if self.combatants.contains_key(&id) {
                    trace!(combatant = %id, ?button, "button released");
                    InputOutcome::Released
                } else {
                    InputOutcome::Ignored
                }
            }
        };
        self.flush_transitions();
        outcome
    }

    fn direction_input(&mut self, id: CombatantId, raw: Direction) -> InputOutcome {
        let Some(combatant) = self.combatants.get_mut(&id) else {
            return InputOutcome::Ignored;
        };
        let direction = match combatant.facing {
            Facing::Right => raw,
            Facing::Left => raw.mirrored(),
        };
        let appended = combatant.motion.push_direction(direction);

        let state = combatant.machine.get_state();
        let target = locomotion(direction);
        let moved = matches!(
            state,
            CombatState::Idle | CombatState::Walk | CombatState::Crouch
        ) && target != state
            && combatant.machine.set_state(target);

        InputOutcome::Direction {
            direction,
            appended,
            moved,
        }
    }

    fn press(&mut self, id: CombatantId, button: Button) -> InputOutcome {
        let Some(combatant) = self.combatants.get_mut(&id) else {
            return InputOutcome::Ignored;
        };
        match combatant.motion.press(button, &self.library) {
            MatchOutcome::Matched(skill) => {
                self.record(id, CombatEventKind::MotionMatched { skill });
                match self.trigger(id, skill) {
                    Ok(stamp) => InputOutcome::Triggered { skill, stamp },
                    Err(reason) => InputOutcome::Rejected { skill, reason },
                }
            }
            MatchOutcome::NoMatch => InputOutcome::NoMatch,
            MatchOutcome::Ambiguous(candidates) => {
                debug!(combatant = %id, ?candidates, "ambiguous motion");
                self.record(
                    id,
                    CombatEventKind::MotionAmbiguous {
                        candidates: candidates.clone(),
                    },
                );
                InputOutcome::Ambiguous(candidates)
            }
        }
    }

    // -- clock --------------------------------------------------------------

    /// Feed a frame of wall-clock time. Returns the tick fired, if any.
    pub fn advance(&mut self, dt: f64) -> Option<u64> {
        let broadcast = self.scheduler.advance(dt)?;
        let tick = broadcast.tick;
        self.deliver(broadcast);
        Some(tick)
    }

    /// Fire one tick immediately.
    pub fn step_tick(&mut self) -> u64 {
        let broadcast = self.scheduler.force_tick();
        let tick = broadcast.tick;
        self.deliver(broadcast);
        tick
    }

    pub fn run_ticks(&mut self, n: u64) {
        for _ in 0..n {
            self.step_tick();
        }
    }

    fn deliver(&mut self, broadcast: TickBroadcast) {
        let start = Instant::now();
        let mut resumed = 0;
        for listener in broadcast.listeners() {
            if !self.scheduler.is_registered(*listener) {
                continue;
            }
            let Some(&id) = self.listeners.get(listener) else {
                continue;
            };
            self.resume(id, broadcast.tick);
            resumed += 1;
        }
        self.flush_transitions();
        self.expired_acks.extend(self.acks.poll_expired(broadcast.tick));
        self.diagnostics = TickDiagnostics {
            tick: broadcast.tick,
            resumed,
            total_time: start.elapsed(),
        };
    }

    fn resume(&mut self, id: CombatantId, tick: u64) {
        self.run_timers(id, tick);

        let Some(combatant) = self.combatants.get_mut(&id) else {
            return;
        };
        let dropped = combatant.motion.on_tick();
        let state = combatant.machine.get_state();
        let execution = combatant.execution.take();
        if dropped > 0 {
            self.record(id, CombatEventKind::BufferPurged { dropped });
        }
        let Some(mut execution) = execution else {
            return;
        };

        // A state forced from outside since the last tick (a host stun, a
        // direct `machine_mut` transition) ends the execution before its
        // hitbox can sweep again.
        if !execution.owns(state) {
            execution.interrupt(&mut self.spatial);
            let skill = execution.skill();
            debug!(combatant = %id, %skill, %state, tick, "skill interrupted before sweep");
            self.record(id, CombatEventKind::SkillInterrupted { skill });
            return;
        }

        let hits = match execution.resolver_mut() {
            Some(resolver) => {
                let combatants = &self.combatants;
                resolver.sweep(&mut self.spatial, |target| {
                    combatants.get(&target).map(Combatant::posture)
                })
            }
            None => Vec::new(),
        };
        for hit in hits {
            self.apply_hit(&mut execution, hit, tick);
        }

        let Some(combatant) = self.combatants.get_mut(&id) else {
            execution.interrupt(&mut self.spatial);
            return;
        };
        let advance = {
            let mut ctx = ExecContext {
                combatant: id,
                machine: &mut combatant.machine,
                spatial: &mut self.spatial,
                facing: combatant.facing,
            };
            execution.advance(&mut ctx)
        };
        let skill = execution.skill();
        match advance.status {
            ExecStatus::Running => combatant.execution = Some(execution),
            ExecStatus::Finished(outcome) => {
                if combatant.bookkeeping.last_started == Some(execution.stamp()) {
                    combatant.bookkeeping.last_outcome = outcome;
                    combatant.machine.reset_state();
                }
            }
            ExecStatus::Interrupted => {}
        }

        for phase in advance.entered {
            trace!(combatant = %id, %skill, %phase, tick, "phase entered");
            self.record(id, CombatEventKind::PhaseEntered { skill, phase });
        }
        match advance.status {
            ExecStatus::Running => {}
            ExecStatus::Finished(outcome) => {
                debug!(combatant = %id, %skill, ?outcome, tick, "skill finished");
                self.record(id, CombatEventKind::SkillFinished { skill, outcome });
            }
            ExecStatus::Interrupted => {
                debug!(combatant = %id, %skill, tick, "skill interrupted");
                self.record(id, CombatEventKind::SkillInterrupted { skill });
            }
        }
    }

    fn run_timers(&mut self, id: CombatantId, tick: u64) {
        let Some(combatant) = self.combatants.get_mut(&id) else {
            return;
        };
        if combatant.hit_stop.tick(tick) {
            let remaining = i64::from(combatant.hit_stop.remaining);
            combatant
                .machine
                .attributes_mut()
                .set_scalar(Scalar::HitStop, remaining);
        }
        if combatant.stun.tick(tick) {
            let remaining = combatant.stun.remaining;
            combatant
                .machine
                .attributes_mut()
                .set_scalar(combatant.stun_scalar, i64::from(remaining));
            if remaining == 0 && combatant.machine.get_state().is_stunned() {
                trace!(combatant = %id, tick, "stun expired");
                combatant.machine.reset_state();
            }
        }
    }

    /// Apply one hit to both parties.
    fn apply_hit(&mut self, execution: &mut Execution, hit: Hit, tick: u64) {
        let Some(definition) = self.library.get(hit.skill) else {
            return;
        };
        let damage = definition.damage();
        let knockdown = definition.knockdown();
        let contact_stun = definition.frame_data().contact_stun();
        let block_stun = definition.frame_data().block_stun();
        let hit_stop = self.config.hit_stop_ticks;

        let Some(target) = self.combatants.get_mut(&hit.target) else {
            return;
        };
        let prior = target.machine.get_state();
        let mut interrupted = None;
        match hit.outcome {
            HitOutcome::Contact | HitOutcome::Counter => {
                if let Some(mut own) = target.execution.take() {
                    own.interrupt(&mut self.spatial);
                    interrupted = Some(own.skill());
                }
                let health = target
                    .machine
                    .attributes_mut()
                    .adjust_scalar(Scalar::Health, -damage);
                let next = if knockdown || health == 0 {
                    if prior.is_airborne() {
                        CombatState::KnockdownAirborne
                    } else {
                        CombatState::Knockdown
                    }
                } else if prior.is_crouching() {
                    CombatState::HitstunCrouching
                } else {
                    CombatState::Hitstun
                };
                target.machine.set_state(next);
                target.arm_stun(Scalar::HitStun, contact_stun, tick);
                target.contributors.credit(hit.attacker, damage, tick);
            }
            HitOutcome::Blocked => {
                let next = if prior.is_crouching() {
                    CombatState::BlockCrouching
                } else {
                    CombatState::Block
                };
                target.machine.set_state(next);
                target.arm_stun(Scalar::BlockStun, block_stun, tick);
            }
            HitOutcome::Whiffed => return,
        }
        target.arm_hit_stop(hit_stop, tick);

        if let Some(attacker) = self.combatants.get_mut(&hit.attacker) {
            attacker.arm_hit_stop(hit_stop, tick);
            if attacker.bookkeeping.last_started == Some(execution.stamp()) {
                attacker.bookkeeping.last_outcome = attacker.bookkeeping.last_outcome.max(hit.outcome);
            }
        }
        execution.record_outcome(hit.outcome);

        debug!(
            attacker = %hit.attacker,
            target = %hit.target,
            skill = %hit.skill,
            outcome = ?hit.outcome,
            tick,
            "hit resolved"
        );
        self.record(
            hit.attacker,
            CombatEventKind::HitResolved {
                skill: hit.skill,
                target: hit.target,
                outcome: hit.outcome,
            },
        );
        if let Some(skill) = interrupted {
            self.record(hit.target, CombatEventKind::SkillInterrupted { skill });
        }
        if hit_stop > 0 {
            self.record(hit.attacker, CombatEventKind::HitStopApplied { ticks: hit_stop });
            self.record(hit.target, CombatEventKind::HitStopApplied { ticks: hit_stop });
        }
    }

    // -- journal ------------------------------------------------------------

    fn record(&mut self, combatant: CombatantId, kind: CombatEventKind) {
        self.flush_transitions();
        self.journal.record(CombatEvent {
            tick: self.scheduler.tick_count(),
            combatant,
            kind,
        });
    }

    /// Move buffered state transitions into the journal.
    fn flush_transitions(&mut self) {
        let pending = std::mem::take(&mut *self.transitions.borrow_mut());
        let tick = self.scheduler.tick_count();
        for (combatant, from, to) in pending {
            self.journal.record(CombatEvent {
                tick,
                combatant,
                kind: CombatEventKind::StateChanged { from, to },
            });
        }
    }

    // -- acknowledgements ---------------------------------------------------

    /// Start waiting on a peer. The deadline counts from the current tick.
    pub fn await_ack(&mut self, label: impl Into<String>) -> RequestId {
        self.acks.issue(self.scheduler.tick_count(), label)
    }

    /// Settle an outstanding request with the peer's answer.
    pub fn resolve_ack(&mut self, id: RequestId, response: AckResponse) -> Result<(), AckError> {
        self.acks.resolve(id, response, self.scheduler.tick_count())
    }

    /// Requests whose deadline passed since the last call.
    pub fn take_expired_acks(&mut self) -> Vec<AckError> {
        std::mem::take(&mut self.expired_acks)
    }

    pub fn acks(&self) -> &AckTracker {
        &self.acks
    }

    // -- posture ------------------------------------------------------------

    pub fn set_guard(&mut self, id: CombatantId, guarding: bool) -> bool {
        match self.combatants.get_mut(&id) {
            Some(combatant) => {
                combatant.guarding = guarding;
                true
            }
            None => false,
        }
    }

    /// Change facing. Takes effect for the next hitbox and the next input.
    pub fn set_facing(&mut self, id: CombatantId, facing: Facing) -> bool {
        match self.combatants.get_mut(&id) {
            Some(combatant) => {
                combatant.facing = facing;
                true
            }
            None => false,
        }
    }

    pub fn set_position(&mut self, id: CombatantId, position: (f32, f32)) -> bool {
        if !self.combatants.contains_key(&id) {
            return false;
        }
        self.spatial.set_body_position(id, position)
    }

    pub fn position(&self, id: CombatantId) -> Option<(f32, f32)> {
        self.spatial.body_position(id)
    }

    // -- accessors ----------------------------------------------------------

    pub fn state(&self, id: CombatantId) -> Option<CombatState> {
        self.combatants.get(&id).map(|c| c.machine.get_state())
    }

    pub fn machine(&self, id: CombatantId) -> Option<&StateMachine> {
        self.combatants.get(&id).map(|c| &c.machine)
    }

    /// Direct access to a combatant's state machine, for guards, effects and
    /// forced transitions. Forced transitions reach the journal on the next
    /// arena call.
    pub fn machine_mut(&mut self, id: CombatantId) -> Option<&mut StateMachine> {
        self.combatants.get_mut(&id).map(|c| &mut c.machine)
    }

    pub fn scalar(&self, id: CombatantId, scalar: Scalar) -> Option<i64> {
        self.machine(id).map(|m| m.attributes().scalar(scalar))
    }

    pub fn bookkeeping(&self, id: CombatantId) -> Option<&Bookkeeping> {
        self.combatants.get(&id).map(|c| &c.bookkeeping)
    }

    pub fn contributors(&self, id: CombatantId) -> Option<&ContributorRecord> {
        self.combatants.get(&id).map(|c| &c.contributors)
    }

    pub fn facing(&self, id: CombatantId) -> Option<Facing> {
        self.combatants.get(&id).map(|c| c.facing)
    }

    pub fn is_guarding(&self, id: CombatantId) -> bool {
        self.combatants.get(&id).is_some_and(|c| c.guarding)
    }

    pub fn motion_buffer(&self, id: CombatantId) -> Option<&[MotionToken]> {
        self.combatants.get(&id).map(|c| c.motion.buffer())
    }

    /// Whether a skill is in flight for `id`.
    pub fn is_executing(&self, id: CombatantId) -> bool {
        self.combatants
            .get(&id)
            .is_some_and(|c| c.execution.is_some())
    }

    pub fn current_phase(&self, id: CombatantId) -> Option<Phase> {
        self.combatants
            .get(&id)?
            .execution
            .as_ref()
            .map(Execution::phase)
    }

    /// Live combatants in spawn order.
    pub fn combatant_ids(&self) -> Vec<CombatantId> {
        self.roster.iter().collect()
    }

    pub fn journal(&self) -> &CombatJournal {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut CombatJournal {
        &mut self.journal
    }

    pub fn library(&self) -> &SkillLibrary {
        &self.library
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn spatial(&self) -> &SpatialWorld {
        &self.spatial
    }

    /// Ticks fired so far.
    pub fn tick(&self) -> u64 {
        self.scheduler.tick_count()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.diagnostics
    }

    // -- hashing ------------------------------------------------------------

    /// Capture every field that affects future ticks.
    pub fn snapshot(&self) -> ArenaSnapshot {
        let combatants = self
            .combatants
            .iter()
            .map(|(&id, c)| CombatantSnapshot {
                id,
                attributes: c.machine.attributes().snapshot(),
                position: self.spatial.body_position(id),
                facing: c.facing,
                guarding: c.guarding,
                bookkeeping: c.bookkeeping,
                contributors: c.contributors.iter().map(|(a, c)| (a, *c)).collect(),
                motion: c.motion.buffer().to_vec(),
                execution: c.execution.as_ref().map(|e| {
                    (e.skill(), e.phase(), e.remaining_in_phase(), e.outcome())
                }),
            })
            .collect();
        ArenaSnapshot {
            tick: self.scheduler.tick_count(),
            sequence: self.sequence,
            combatants,
        }
    }

    /// BLAKE3 hex digest of [`snapshot`](Self::snapshot).
    pub fn state_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        if let Err(error) = serde_json::to_writer(&mut hasher, &self.snapshot()) {
            warn!(%error, "arena snapshot failed to serialize");
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("tick", &self.scheduler.tick_count())
            .field("combatants", &self.combatants.len())
            .field("skills", &self.library.len())
            .field("journal", &self.journal.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
