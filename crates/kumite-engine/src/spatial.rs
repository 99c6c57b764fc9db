//! Spatial queries backed by rapier2d.
//!
//! Combat needs overlap tests, not a physics solver. Each combatant owns one
//! solid cuboid collider (its hurtbox) and each live hitbox owns one sensor
//! cuboid. Colliders are parentless; positions are written directly by the
//! arena. Overlap queries go through rapier's [`QueryPipeline`], which is
//! rebuilt lazily after any collider moved.
//!
//! The hitbox resolver talks to the world only through the [`SpatialQuery`]
//! trait, so hosts that already own a physics scene can plug their own in.
//!
//! # Determinism
//!
//! rapier2d is compiled with `enhanced-determinism`, and query results are
//! sorted by [`CombatantId`] before they leave this module, so rapier's
//! internal iteration order never leaks into combat resolution.

use std::collections::{BTreeMap, HashMap};

use kumite_core::combatant::CombatantId;
use rapier2d::parry::shape::Cuboid;
use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SpatialQuery
// ---------------------------------------------------------------------------

/// Handle for a query region owned by a hitbox resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId(u64);

/// What the hitbox resolver needs from the spatial world.
pub trait SpatialQuery {
    /// Reference point of a combatant's body, if it has one.
    fn body_position(&self, combatant: CombatantId) -> Option<(f32, f32)>;

    /// Create a query region centred at `center`.
    fn insert_region(
        &mut self,
        owner: CombatantId,
        center: (f32, f32),
        half_extents: (f32, f32),
    ) -> RegionId;

    /// Move a region. Returns `false` if it does not exist.
    fn move_region(&mut self, region: RegionId, center: (f32, f32)) -> bool;

    /// Release a region. Returns `false` if it was already released.
    fn remove_region(&mut self, region: RegionId) -> bool;

    /// Bodies overlapping `region`, excluding `exclude`, sorted by id.
    fn overlapping(&mut self, region: RegionId, exclude: CombatantId) -> Vec<CombatantId>;
}

// ---------------------------------------------------------------------------
// SpatialWorld
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Region {
    owner: CombatantId,
    collider: ColliderHandle,
    half_extents: (f32, f32),
}

/// rapier2d-backed [`SpatialQuery`].
pub struct SpatialWorld {
    island_manager: IslandManager,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    query_pipeline: QueryPipeline,
    /// Query pipeline is stale.
    dirty: bool,
    bodies: BTreeMap<CombatantId, ColliderHandle>,
    collider_to_combatant: HashMap<ColliderHandle, CombatantId>,
    regions: BTreeMap<RegionId, Region>,
    next_region: u64,
}

impl Default for SpatialWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialWorld {
    pub fn new() -> Self {
        Self {
            island_manager: IslandManager::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            query_pipeline: QueryPipeline::new(),
            dirty: false,
            bodies: BTreeMap::new(),
            collider_to_combatant: HashMap::new(),
            regions: BTreeMap::new(),
            next_region: 0,
        }
    }

    /// Give `combatant` a hurtbox. Replaces any previous one.
    pub fn insert_body(&mut self, combatant: CombatantId, center: (f32, f32), half_extents: (f32, f32)) {
        self.remove_body(combatant);
        let collider = ColliderBuilder::cuboid(half_extents.0 as Real, half_extents.1 as Real)
            .translation(vector![center.0 as Real, center.1 as Real])
            .build();
        let handle = self.collider_set.insert(collider);
        self.bodies.insert(combatant, handle);
        self.collider_to_combatant.insert(handle, combatant);
        self.dirty = true;
    }

    /// Remove a combatant's hurtbox. Returns `false` if it had none.
    pub fn remove_body(&mut self, combatant: CombatantId) -> bool {
        match self.bodies.remove(&combatant) {
            Some(handle) => {
                self.remove_collider(handle);
                true
            }
            None => false,
        }
    }

    /// Move a combatant's hurtbox.
    pub fn set_body_position(&mut self, combatant: CombatantId, center: (f32, f32)) -> bool {
        let Some(&handle) = self.bodies.get(&combatant) else {
            return false;
        };
        match self.collider_set.get_mut(handle) {
            Some(collider) => {
                collider.set_translation(vector![center.0 as Real, center.1 as Real]);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn has_body(&self, combatant: CombatantId) -> bool {
        self.bodies.contains_key(&combatant)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Live query regions.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Owner of a live region.
    pub fn region_owner(&self, region: RegionId) -> Option<CombatantId> {
        self.regions.get(&region).map(|r| r.owner)
    }

    fn remove_collider(&mut self, handle: ColliderHandle) {
        self.collider_to_combatant.remove(&handle);
        self.collider_set
            .remove(handle, &mut self.island_manager, &mut self.rigid_body_set, false);
        self.dirty = true;
    }

    fn refresh(&mut self) {
        if self.dirty {
            self.query_pipeline.update(&self.collider_set);
            self.dirty = false;
        }
    }
}

impl SpatialQuery for SpatialWorld {
    fn body_position(&self, combatant: CombatantId) -> Option<(f32, f32)> {
        let handle = self.bodies.get(&combatant)?;
        let t = self.collider_set.get(*handle)?.translation();
        Some((t.x as f32, t.y as f32))
    }

    fn insert_region(
        &mut self,
        owner: CombatantId,
        center: (f32, f32),
        half_extents: (f32, f32),
    ) -> RegionId {
        let collider = ColliderBuilder::cuboid(half_extents.0 as Real, half_extents.1 as Real)
            .translation(vector![center.0 as Real, center.1 as Real])
            .sensor(true)
            .build();
        let handle = self.collider_set.insert(collider);
        let id = RegionId(self.next_region);
        self.next_region += 1;
        self.regions.insert(
            id,
            Region {
                owner,
                collider: handle,
                half_extents,
            },
        );
        self.dirty = true;
        id
    }

    fn move_region(&mut self, region: RegionId, center: (f32, f32)) -> bool {
        let Some(r) = self.regions.get(&region) else {
            return false;
        };
        match self.collider_set.get_mut(r.collider) {
            Some(collider) => {
                collider.set_translation(vector![center.0 as Real, center.1 as Real]);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    fn remove_region(&mut self, region: RegionId) -> bool {
        match self.regions.remove(&region) {
            Some(r) => {
                self.remove_collider(r.collider);
                true
            }
            None => false,
        }
    }

    fn overlapping(&mut self, region: RegionId, exclude: CombatantId) -> Vec<CombatantId> {
        self.refresh();
        let Some(r) = self.regions.get(&region).copied() else {
            return Vec::new();
        };
        let Some(sensor) = self.collider_set.get(r.collider) else {
            return Vec::new();
        };
        let pose = *sensor.position();
        let shape = Cuboid::new(vector![r.half_extents.0 as Real, r.half_extents.1 as Real]);

        let mut filter = QueryFilter::default().exclude_sensors();
        if let Some(&own) = self.bodies.get(&exclude) {
            filter = filter.exclude_collider(own);
        }

        let mut hits = Vec::new();
        self.query_pipeline.intersections_with_shape(
            &self.rigid_body_set,
            &self.collider_set,
            &pose,
            &shape,
            filter,
            |handle| {
                if let Some(&id) = self.collider_to_combatant.get(&handle) {
                    hits.push(id);
                }
                true
            },
        );
        hits.sort();
        hits.dedup();
        hits
    }
}

impl std::fmt::Debug for SpatialWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialWorld")
            .field("bodies", &self.bodies.len())
            .field("regions", &self.regions.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
