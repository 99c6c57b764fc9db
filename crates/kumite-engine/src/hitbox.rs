//! Per-activation hit detection.
//!
//! A [`HitboxResolver`] exists for exactly one Active window of one skill
//! execution. It owns a query region in the [`SpatialQuery`] world anchored
//! to the attacker, and once per tick it [`sweep`](HitboxResolver::sweep)s
//! that region:
//!
//! 1. The region is moved to the attacker's current position plus the
//!    hitbox offset (mirrored when the attacker faces left).
//! 2. Overlapping bodies, minus the attacker, are filtered to combatants the
//!    caller can describe a [`Posture`] for and that were not already hit
//!    during this activation.
//! 3. Each remaining target is classified as [`HitOutcome::Blocked`],
//!    [`HitOutcome::Contact`] or [`HitOutcome::Counter`].
//!
//! The resolver lives for `min(declared duration, active ticks)` sweeps and
//! then stops itself. [`stop`](HitboxResolver::stop) releases the region and
//! forgets every hit; calling it again does nothing.

use std::collections::BTreeSet;

use kumite_core::combatant::CombatantId;
use kumite_core::skill::{HitOutcome, HitRegion, Hitbox, SkillId};
use kumite_core::state::CombatState;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::spatial::{RegionId, SpatialQuery};

// ---------------------------------------------------------------------------
// Facing / Posture
// ---------------------------------------------------------------------------

/// Which way a combatant faces. Offsets and directional input are authored
/// for `Right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    #[default]
    Right,
    Left,
}

impl Facing {
    /// Horizontal sign: `1.0` for right, `-1.0` for left.
    pub fn sign(self) -> f32 {
        match self {
            Facing::Right => 1.0,
            Facing::Left => -1.0,
        }
    }

    pub fn flipped(self) -> Facing {
        match self {
            Facing::Right => Facing::Left,
            Facing::Left => Facing::Right,
        }
    }
}

/// What a target looks like to an incoming hitbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posture {
    pub state: CombatState,
    /// The guard input is held.
    pub guarding: bool,
}

impl Posture {
    /// Guard only counts while the target is free to act.
    pub fn effective_guard(self) -> bool {
        self.guarding && !self.state.is_negative()
    }
}

/// Blocked or Contact for one region against one posture.
///
/// `Low` always connects. `Overhead` is stopped only by a standing guard.
/// `High` is stopped by any guard.
pub fn classify(region: HitRegion, posture: Posture) -> HitOutcome {
    let guard = posture.effective_guard();
    let blocked = match region {
        HitRegion::Low => false,
        HitRegion::Overhead => guard && !posture.state.is_crouching(),
        HitRegion::High => guard,
    };
    if blocked {
        HitOutcome::Blocked
    } else {
        HitOutcome::Contact
    }
}

// ---------------------------------------------------------------------------
// HitboxResolver
// ---------------------------------------------------------------------------

/// One resolved hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    pub attacker: CombatantId,
    pub target: CombatantId,
    pub skill: SkillId,
    pub outcome: HitOutcome,
}

/// Hit detection for one active window.
#[derive(Debug)]
pub struct HitboxResolver {
    attacker: CombatantId,
    skill: SkillId,
    hitbox: Hitbox,
    facing: Facing,
    counter_eligible: bool,
    region: Option<RegionId>,
    remaining: u32,
    already_hit: BTreeSet<CombatantId>,
}

impl HitboxResolver {
    /// Spawn the query region for an active window of `active` ticks.
    ///
    /// If the attacker has no body the resolver starts out stopped.
    pub fn spawn(
        attacker: CombatantId,
        skill: SkillId,
        hitbox: &Hitbox,
        counter_eligible: bool,
        facing: Facing,
        active: u32,
        spatial: &mut dyn SpatialQuery,
    ) -> Self {
        let mut resolver = Self {
            attacker,
            skill,
            hitbox: hitbox.clone(),
            facing,
            counter_eligible,
            region: None,
            remaining: hitbox.lifetime(active),
            already_hit: BTreeSet::new(),
        };
        if resolver.remaining > 0 {
            if let Some(center) = resolver.anchor(spatial) {
                let (w, h) = hitbox.size();
                resolver.region = Some(spatial.insert_region(attacker, center, (w / 2.0, h / 2.0)));
            }
        }
        resolver
    }

    fn anchor(&self, spatial: &dyn SpatialQuery) -> Option<(f32, f32)> {
        let (x, y) = spatial.body_position(self.attacker)?;
        let (ox, oy) = self.hitbox.offset();
        Some((x + ox * self.facing.sign(), y + oy))
    }

    /// Run one tick of detection.
    ///
    /// `posture_of` returns `None` for bodies that cannot be hit; those are
    /// skipped without being recorded, so they do not consume the target's
    /// single hit for this activation.
    pub fn sweep(
        &mut self,
        spatial: &mut dyn SpatialQuery,
        mut posture_of: impl FnMut(CombatantId) -> Option<Posture>,
    ) -> Vec<Hit> {
        let Some(region) = self.region else {
            return Vec::new();
        };
        let Some(center) = self.anchor(spatial) else {
            self.stop(spatial);
            return Vec::new();
        };
        spatial.move_region(region, center);

        let mut hits = Vec::new();
        for target in spatial.overlapping(region, self.attacker) {
            if target == self.attacker || self.already_hit.contains(&target) {
                continue;
            }
            let Some(posture) = posture_of(target) else {
                continue;
            };
            let mut outcome = classify(self.hitbox.region(), posture);
            if outcome == HitOutcome::Contact
                && self.counter_eligible
                && matches!(posture.state, CombatState::Startup | CombatState::Attack)
            {
                outcome = HitOutcome::Counter;
            }
            self.already_hit.insert(target);
            trace!(
                attacker = %self.attacker,
                target = %target,
                ?outcome,
                "hitbox contact"
            );
            hits.push(Hit {
                attacker: self.attacker,
                target,
                skill: self.skill,
                outcome,
            });
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.stop(spatial);
        }
        hits
    }

    /// Release the region and forget every hit. Idempotent.
    pub fn stop(&mut self, spatial: &mut dyn SpatialQuery) {
        if let Some(region) = self.region.take() {
            spatial.remove_region(region);
        }
        self.already_hit.clear();
        self.remaining = 0;
    }

    pub fn is_alive(&self) -> bool {
        self.region.is_some()
    }

    /// Sweeps left before natural expiry.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn hit_count(&self) -> usize {
        self.already_hit.len()
    }

    pub fn attacker(&self) -> CombatantId {
        self.attacker
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
