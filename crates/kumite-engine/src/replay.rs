//! Deterministic replay with input recording and checkpoint verification.
//!
//! A [`ReplayRecorder`] wraps every input applied to an [`Arena`] (spawns
//! included) and stamps it with the tick it was applied on. Every
//! `checkpoint_interval` ticks it also stores the arena's BLAKE3 state hash.
//! [`replay`] feeds the log into a freshly built arena with the same config
//! and skill library and reports the first checkpoint whose hash differs.
//!
//! ```
//! use kumite_engine::prelude::*;
//! use kumite_engine::replay::{replay, ArenaInput, ReplayRecorder};
//!
//! let library = SkillLibrary::new(Vec::new()).unwrap();
//! let mut arena = Arena::new(CombatConfig::default(), library.clone()).unwrap();
//! let mut recorder = ReplayRecorder::new(5);
//! recorder.apply(&mut arena, ArenaInput::Spawn { position: (0.0, 0.0), facing: Facing::Right });
//! for _ in 0..20 {
//!     recorder.step(&mut arena);
//! }
//! let log = recorder.finish(&arena);
//!
//! let mut fresh = Arena::new(CombatConfig::default(), library).unwrap();
//! let result = replay(&mut fresh, &log).unwrap();
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! ```

use std::collections::BTreeMap;

use kumite_core::combatant::CombatantId;
use kumite_core::motion::InputEvent;
use kumite_core::skill::SkillId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::combat::Arena;
use crate::hitbox::Facing;

// ---------------------------------------------------------------------------
// ArenaInput
// ---------------------------------------------------------------------------

/// Everything a host can do to an arena between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArenaInput {
    Spawn {
        position: (f32, f32),
        facing: Facing,
    },
    Despawn {
        combatant: CombatantId,
    },
    Trigger {
        combatant: CombatantId,
        skill: SkillId,
    },
    Input {
        combatant: CombatantId,
        event: InputEvent,
    },
    SetGuard {
        combatant: CombatantId,
        guarding: bool,
    },
    SetPosition {
        combatant: CombatantId,
        position: (f32, f32),
    },
    SetFacing {
        combatant: CombatantId,
        facing: Facing,
    },
}

/// Apply one input. Returns the spawned id for [`ArenaInput::Spawn`].
pub fn apply_input(arena: &mut Arena, input: &ArenaInput) -> Option<CombatantId> {
    match *input {
        ArenaInput::Spawn { position, facing } => return Some(arena.spawn(position, facing)),
        ArenaInput::Despawn { combatant } => {
            arena.despawn(combatant);
        }
        ArenaInput::Trigger { combatant, skill } => {
            // Rejections are journaled by the arena and replay identically.
            let _ = arena.trigger(combatant, skill);
        }
        ArenaInput::Input { combatant, event } => {
            arena.input(combatant, event);
        }
        ArenaInput::SetGuard {
            combatant,
            guarding,
        } => {
            arena.set_guard(combatant, guarding);
        }
        ArenaInput::SetPosition {
            combatant,
            position,
        } => {
            arena.set_position(combatant, position);
        }
        ArenaInput::SetFacing { combatant, facing } => {
            arena.set_facing(combatant, facing);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// One entry of a [`ReplayLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayEntry {
    /// Applied while the arena's tick counter read `tick`.
    Input { tick: u64, input: ArenaInput },
    /// State hash taken at `tick`, after that tick's inputs.
    Checkpoint { tick: u64, state_hash: String },
}

/// A recorded session. Replays start from a fresh arena at tick 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    pub total_ticks: u64,
    pub entries: Vec<ReplayEntry>,
    /// Hash after the last tick and any trailing inputs.
    pub final_hash: Option<String>,
}

impl ReplayLog {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Outcome of [`replay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Every tick ran and every hash matched.
    pub completed: bool,
    pub ticks_replayed: u64,
    pub first_divergence: Option<ReplayDivergence>,
}

/// The first hash mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub tick: u64,
    pub expected_hash: String,
    pub actual_hash: String,
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Records inputs and checkpoints while driving an arena.
#[derive(Debug)]
pub struct ReplayRecorder {
    entries: Vec<ReplayEntry>,
    /// 0 disables periodic checkpoints.
    checkpoint_interval: u64,
    ticks_recorded: u64,
    last_checkpoint: Option<u64>,
}

impl ReplayRecorder {
    pub fn new(checkpoint_interval: u64) -> Self {
        Self {
            entries: Vec::new(),
            checkpoint_interval,
            ticks_recorded: 0,
            last_checkpoint: None,
        }
    }

    /// Apply `input` to `arena` and record it at the current tick.
    pub fn apply(&mut self, arena: &mut Arena, input: ArenaInput) -> Option<CombatantId> {
        let spawned = apply_input(arena, &input);
        self.entries.push(ReplayEntry::Input {
            tick: arena.tick(),
            input,
        });
        spawned
    }

    /// Checkpoint if due, then fire one tick.
    pub fn step(&mut self, arena: &mut Arena) -> u64 {
        let tick = arena.tick();
        if self.checkpoint_interval > 0
            && tick % self.checkpoint_interval == 0
            && self.last_checkpoint != Some(tick)
        {
            self.entries.push(ReplayEntry::Checkpoint {
                tick,
                state_hash: arena.state_hash(),
            });
            self.last_checkpoint = Some(tick);
        }
        self.ticks_recorded += 1;
        arena.step_tick()
    }

    pub fn ticks_recorded(&self) -> u64 {
        self.ticks_recorded
    }

    /// Produce the log, hashing the arena's final state.
    pub fn finish(self, arena: &Arena) -> ReplayLog {
        ReplayLog {
            total_ticks: self.ticks_recorded,
            entries: self.entries,
            final_hash: Some(arena.state_hash()),
        }
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Re-run `log` on `arena`, which must be freshly built (tick 0, no
/// combatants) with the recording's config and skill library.
///
/// The log is validated before the arena is touched: a malformed log leaves
/// the arena unmodified.
pub fn replay(arena: &mut Arena, log: &ReplayLog) -> anyhow::Result<ReplayResult> {
    if arena.tick() != 0 || !arena.combatant_ids().is_empty() {
        anyhow::bail!(
            "replay needs a fresh arena, got tick {} with {} combatants",
            arena.tick(),
            arena.combatant_ids().len()
        );
    }

    let mut inputs: BTreeMap<u64, Vec<&ArenaInput>> = BTreeMap::new();
    let mut checkpoints: BTreeMap<u64, &str> = BTreeMap::new();
    let mut last_input_tick = 0;
    for entry in &log.entries {
        match entry {
            ReplayEntry::Input { tick, input } => {
                if *tick < last_input_tick {
                    anyhow::bail!("replay log input at tick {tick} is out of order");
                }
                last_input_tick = *tick;
                inputs.entry(*tick).or_default().push(input);
            }
            ReplayEntry::Checkpoint { tick, state_hash } => {
                if checkpoints.insert(*tick, state_hash.as_str()).is_some() {
                    anyhow::bail!("replay log contains duplicate checkpoint at tick {tick}");
                }
            }
        }
    }
    let end = log.total_ticks;
    if let Some((&tick, _)) = inputs.range(end.saturating_add(1)..).next() {
        anyhow::bail!("replay log input at tick {tick} is past the recorded end {end}");
    }
    if let Some((&tick, _)) = checkpoints.range(end..).next() {
        anyhow::bail!("replay log checkpoint at tick {tick} is past the recorded end {end}");
    }

    let diverged = |tick: u64, expected: &str, actual: String, replayed: u64| ReplayResult {
        completed: false,
        ticks_replayed: replayed,
        first_divergence: Some(ReplayDivergence {
            tick,
            expected_hash: expected.to_owned(),
            actual_hash: actual,
        }),
    };

    let mut ticks_replayed = 0;
    for tick in 0..end {
        for input in inputs.get(&tick).into_iter().flatten() {
            apply_input(arena, input);
        }
        if let Some(&expected) = checkpoints.get(&tick) {
            let actual = arena.state_hash();
            if actual != expected {
                warn!(tick, "replay diverged");
                return Ok(diverged(tick, expected, actual, ticks_replayed));
            }
        }
        arena.step_tick();
        ticks_replayed += 1;
    }
    for input in inputs.get(&end).into_iter().flatten() {
        apply_input(arena, input);
    }
    if let Some(expected) = &log.final_hash {
        let actual = arena.state_hash();
        if &actual != expected {
            warn!(tick = end, "replay diverged at final state");
            return Ok(diverged(end, expected, actual, ticks_replayed));
        }
    }

    debug!(ticks_replayed, "replay completed");
    Ok(ReplayResult {
        completed: true,
        ticks_replayed,
        first_divergence: None,
    })
}
