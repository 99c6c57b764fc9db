//! Skills, frame data and the skill library.
//!
//! Every value in this module is immutable once built. [`Animation`],
//! [`Hitbox`], [`FrameData`] and [`Skill`] are constructed through fluent
//! builders whose `build()` checks that every required field is present and
//! sane; an incomplete definition fails at load time with a [`BuildError`],
//! never at use.
//!
//! A [`SkillLibrary`] owns the frozen skills, assigns each a [`SkillId`],
//! resolves gatling references by name once, and indexes skills by the
//! button that completes their motion.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::motion::{Button, MotionToken};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Load-time failure while building skill content.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{builder} is missing required field `{field}`")]
    MissingField {
        builder: &'static str,
        field: &'static str,
    },

    #[error("{builder} field `{field}` {reason}")]
    InvalidField {
        builder: &'static str,
        field: &'static str,
        reason: &'static str,
    },

    #[error("skill `{0}` declares an empty motion sequence")]
    EmptyMotion(String),

    #[error("skill `{0}` motion must end with a button")]
    MotionMustEndWithButton(String),

    #[error("duplicate skill name `{0}`")]
    DuplicateSkill(String),

    #[error("skill `{skill}` lists unknown gatling target `{target}`")]
    UnknownGatling { skill: String, target: String },

    #[error("malformed skill content: {0}")]
    Json(#[from] serde_json::Error),
}

fn missing(builder: &'static str, field: &'static str) -> BuildError {
    BuildError::MissingField { builder, field }
}

// ---------------------------------------------------------------------------
// Small enums
// ---------------------------------------------------------------------------

/// Where a skill may be performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GroundedType {
    #[default]
    Ground,
    AirOk,
    AirOnly,
}

/// Which guard postures a hitbox beats.
///
/// `Low` always connects, `Overhead` beats a crouching guard, `High` is
/// stopped by any guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitRegion {
    Low,
    High,
    Overhead,
}

/// The strongest result a skill execution produced.
///
/// Variants are ordered weakest first so outcomes merge with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum HitOutcome {
    #[default]
    Whiffed,
    Blocked,
    Contact,
    /// Contact against a target caught in its own Startup or Attack.
    Counter,
}

impl HitOutcome {
    /// Whether the skill touched anyone, blocked or not.
    pub fn connected(self) -> bool {
        self != HitOutcome::Whiffed
    }

    /// Whether the skill landed cleanly.
    pub fn is_contact(self) -> bool {
        matches!(self, HitOutcome::Contact | HitOutcome::Counter)
    }
}

/// Phases of one skill execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Startup,
    Active,
    Recovery,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Animation
// ---------------------------------------------------------------------------

/// Opaque animation descriptor. The core hands it to the presentation layer
/// and never plays it itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Animation {
    id: String,
    looping: bool,
}

impl Animation {
    pub fn builder() -> AnimationBuilder {
        AnimationBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn looping(&self) -> bool {
        self.looping
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnimationBuilder {
    id: Option<String>,
    looping: bool,
}

impl AnimationBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn build(self) -> Result<Animation, BuildError> {
        let id = self.id.ok_or_else(|| missing("Animation", "id"))?;
        if id.is_empty() {
            return Err(BuildError::InvalidField {
                builder: "Animation",
                field: "id",
                reason: "must not be empty",
            });
        }
        Ok(Animation {
            id,
            looping: self.looping,
        })
    }
}

// ---------------------------------------------------------------------------
// Hitbox
// ---------------------------------------------------------------------------

/// Spatial descriptor of a skill's attack region.
///
/// `size` is the full width and height; `offset` is measured from the
/// attacker's reference point for a combatant facing right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hitbox {
    size: (f32, f32),
    offset: (f32, f32),
    region: HitRegion,
    duration: Option<u32>,
}

impl Hitbox {
    pub fn builder() -> HitboxBuilder {
        HitboxBuilder::default()
    }

    pub fn size(&self) -> (f32, f32) {
        self.size
    }

    pub fn offset(&self) -> (f32, f32) {
        self.offset
    }

    pub fn region(&self) -> HitRegion {
        self.region
    }

    /// Explicit lifetime in ticks, if declared.
    pub fn duration(&self) -> Option<u32> {
        self.duration
    }

    /// Ticks the region stays alive inside an active window of `active` ticks.
    pub fn lifetime(&self, active: u32) -> u32 {
        self.duration.map_or(active, |d| d.min(active))
    }
}

#[derive(Debug, Clone, Default)]
pub struct HitboxBuilder {
    size: Option<(f32, f32)>,
    offset: (f32, f32),
    region: Option<HitRegion>,
    duration: Option<u32>,
}

impl HitboxBuilder {
    pub fn size(mut self, width: f32, height: f32) -> Self {
        self.size = Some((width, height));
        self
    }

    pub fn offset(mut self, x: f32, y: f32) -> Self {
        self.offset = (x, y);
        self
    }

    pub fn region(mut self, region: HitRegion) -> Self {
        self.region = Some(region);
        self
    }

    pub fn duration(mut self, ticks: u32) -> Self {
        self.duration = Some(ticks);
        self
    }

    pub fn build(self) -> Result<Hitbox, BuildError> {
        let size = self.size.ok_or_else(|| missing("Hitbox", "size"))?;
        let region = self.region.ok_or_else(|| missing("Hitbox", "region"))?;
        if !(size.0.is_finite() && size.1.is_finite() && size.0 > 0.0 && size.1 > 0.0) {
            return Err(BuildError::InvalidField {
                builder: "Hitbox",
                field: "size",
                reason: "must be finite and positive",
            });
        }
        if !(self.offset.0.is_finite() && self.offset.1.is_finite()) {
            return Err(BuildError::InvalidField {
                builder: "Hitbox",
                field: "offset",
                reason: "must be finite",
            });
        }
        Ok(Hitbox {
            size,
            offset: self.offset,
            region,
            duration: self.duration,
        })
    }
}

// ---------------------------------------------------------------------------
// FrameData
// ---------------------------------------------------------------------------

/// Tick timing for one skill.
///
/// A negative `recovery` waives recovery entirely when the skill makes
/// contact (landing cancel); on a whiff or block the absolute value is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameData {
    startup: u32,
    active: u32,
    recovery: i32,
    contact_stun: u32,
    block_stun: u32,
    animation: Animation,
    hitbox: Hitbox,
}

impl FrameData {
    pub fn builder() -> FrameDataBuilder {
        FrameDataBuilder::default()
    }

    pub fn startup(&self) -> u32 {
        self.startup
    }

    pub fn active(&self) -> u32 {
        self.active
    }

    /// Declared recovery, possibly negative.
    pub fn recovery(&self) -> i32 {
        self.recovery
    }

    /// Recovery ticks to wait when the phase is entered.
    pub fn recovery_ticks(&self) -> u32 {
        self.recovery.unsigned_abs()
    }

    /// Whether contact skips the recovery phase.
    pub fn landing_cancel(&self) -> bool {
        self.recovery < 0
    }

    pub fn contact_stun(&self) -> u32 {
        self.contact_stun
    }

    pub fn block_stun(&self) -> u32 {
        self.block_stun
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    pub fn hitbox(&self) -> &Hitbox {
        &self.hitbox
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameDataBuilder {
    startup: Option<u32>,
    active: Option<u32>,
    recovery: Option<i32>,
    contact_stun: u32,
    block_stun: u32,
    animation: Option<Animation>,
    hitbox: Option<Hitbox>,
}

impl FrameDataBuilder {
    pub fn startup(mut self, ticks: u32) -> Self {
        self.startup = Some(ticks);
        self
    }

    pub fn active(mut self, ticks: u32) -> Self {
        self.active = Some(ticks);
        self
    }

    pub fn recovery(mut self, ticks: i32) -> Self {
        self.recovery = Some(ticks);
        self
    }

    pub fn contact_stun(mut self, ticks: u32) -> Self {
        self.contact_stun = ticks;
        self
    }

    pub fn block_stun(mut self, ticks: u32) -> Self {
        self.block_stun = ticks;
        self
    }

    pub fn animation(mut self, animation: Animation) -> Self {
        self.animation = Some(animation);
        self
    }

    pub fn hitbox(mut self, hitbox: Hitbox) -> Self {
        self.hitbox = Some(hitbox);
        self
    }

    pub fn build(self) -> Result<FrameData, BuildError> {
        let startup = self.startup.ok_or_else(|| missing("FrameData", "startup"))?;
        let active = self.active.ok_or_else(|| missing("FrameData", "active"))?;
        let recovery = self.recovery.ok_or_else(|| missing("FrameData", "recovery"))?;
        let animation = self.animation.ok_or_else(|| missing("FrameData", "animation"))?;
        let hitbox = self.hitbox.ok_or_else(|| missing("FrameData", "hitbox"))?;
        if active == 0 {
            return Err(BuildError::InvalidField {
                builder: "FrameData",
                field: "active",
                reason: "must be at least one tick",
            });
        }
        Ok(FrameData {
            startup,
            active,
            recovery,
            contact_stun: self.contact_stun,
            block_stun: self.block_stun,
            animation,
            hitbox,
        })
    }
}

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// Index of a skill inside its [`SkillLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SkillId(u32);

impl SkillId {
    /// Construct from a raw library index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skill#{}", self.0)
    }
}

/// A frozen skill definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Skill {
    name: String,
    description: String,
    frame_data: FrameData,
    motion: Vec<MotionToken>,
    grounded: GroundedType,
    reversal: bool,
    counter_eligible: bool,
    gauge_cost: i64,
    damage: i64,
    knockdown: bool,
    gatling: Vec<String>,
}

impl Skill {
    /// Start building a skill called `name`.
    pub fn builder(name: impl Into<String>) -> SkillBuilder {
        SkillBuilder {
            name: name.into(),
            ..SkillBuilder::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn frame_data(&self) -> &FrameData {
        &self.frame_data
    }

    /// Declared input sequence; always ends with a button.
    pub fn motion(&self) -> &[MotionToken] {
        &self.motion
    }

    /// The button that completes the motion.
    pub fn trigger(&self) -> Option<Button> {
        match self.motion.last() {
            Some(MotionToken::Button(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn grounded(&self) -> GroundedType {
        self.grounded
    }

    pub fn reversal(&self) -> bool {
        self.reversal
    }

    pub fn counter_eligible(&self) -> bool {
        self.counter_eligible
    }

    pub fn gauge_cost(&self) -> i64 {
        self.gauge_cost
    }

    pub fn damage(&self) -> i64 {
        self.damage
    }

    pub fn knockdown(&self) -> bool {
        self.knockdown
    }

    /// Names of skills this one may cancel into, as declared.
    pub fn gatling_names(&self) -> &[String] {
        &self.gatling
    }
}

#[derive(Debug, Clone, Default)]
pub struct SkillBuilder {
    name: String,
    description: String,
    frame_data: Option<FrameData>,
    motion: Option<Vec<MotionToken>>,
    grounded: GroundedType,
    reversal: bool,
    counter_eligible: bool,
    gauge_cost: i64,
    damage: i64,
    knockdown: bool,
    gatling: Vec<String>,
}

impl SkillBuilder {
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn frame_data(mut self, frame_data: FrameData) -> Self {
        self.frame_data = Some(frame_data);
        self
    }

    pub fn motion(mut self, tokens: impl IntoIterator<Item = MotionToken>) -> Self {
        self.motion = Some(tokens.into_iter().collect());
        self
    }

    pub fn grounded(mut self, grounded: GroundedType) -> Self {
        self.grounded = grounded;
        self
    }

    pub fn reversal(mut self, reversal: bool) -> Self {
        self.reversal = reversal;
        self
    }

    pub fn counter_eligible(mut self, eligible: bool) -> Self {
        self.counter_eligible = eligible;
        self
    }

    pub fn gauge_cost(mut self, cost: i64) -> Self {
        self.gauge_cost = cost;
        self
    }

    pub fn damage(mut self, damage: i64) -> Self {
        self.damage = damage;
        self
    }

    pub fn knockdown(mut self, knockdown: bool) -> Self {
        self.knockdown = knockdown;
        self
    }

    /// Allow cancelling into `target` during Recovery after a connected hit.
    pub fn gatling(mut self, target: impl Into<String>) -> Self {
        self.gatling.push(target.into());
        self
    }

    pub fn build(self) -> Result<Skill, BuildError> {
        if self.name.is_empty() {
            return Err(missing("Skill", "name"));
        }
        let frame_data = self.frame_data.ok_or_else(|| missing("Skill", "frame_data"))?;
        let motion = self.motion.ok_or_else(|| missing("Skill", "motion"))?;
        if motion.is_empty() {
            return Err(BuildError::EmptyMotion(self.name));
        }
        if !matches!(motion.last(), Some(MotionToken::Button(_))) {
            return Err(BuildError::MotionMustEndWithButton(self.name));
        }
        if self.gauge_cost < 0 || self.damage < 0 {
            return Err(BuildError::InvalidField {
                builder: "Skill",
                field: if self.gauge_cost < 0 { "gauge_cost" } else { "damage" },
                reason: "must not be negative",
            });
        }
        Ok(Skill {
            name: self.name,
            description: self.description,
            frame_data,
            motion,
            grounded: self.grounded,
            reversal: self.reversal,
            counter_eligible: self.counter_eligible,
            gauge_cost: self.gauge_cost,
            damage: self.damage,
            knockdown: self.knockdown,
            gatling: self.gatling,
        })
    }
}

// ---------------------------------------------------------------------------
// JSON content
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HitboxDef {
    size: Option<(f32, f32)>,
    #[serde(default)]
    offset: (f32, f32),
    region: Option<HitRegion>,
    duration: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FrameDataDef {
    startup: Option<u32>,
    active: Option<u32>,
    recovery: Option<i32>,
    #[serde(default)]
    contact_stun: u32,
    #[serde(default)]
    block_stun: u32,
    animation: Option<String>,
    hitbox: Option<HitboxDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SkillDef {
    name: String,
    #[serde(default)]
    description: String,
    frame_data: Option<FrameDataDef>,
    motion: Option<Vec<MotionToken>>,
    #[serde(default)]
    grounded: GroundedType,
    #[serde(default)]
    reversal: bool,
    #[serde(default)]
    counter_eligible: bool,
    #[serde(default)]
    gauge_cost: i64,
    #[serde(default)]
    damage: i64,
    #[serde(default)]
    knockdown: bool,
    #[serde(default)]
    gatling: Vec<String>,
}

impl HitboxDef {
    fn build(self) -> Result<Hitbox, BuildError> {
        let mut b = Hitbox::builder().offset(self.offset.0, self.offset.1);
        if let Some((w, h)) = self.size {
            b = b.size(w, h);
        }
        if let Some(region) = self.region {
            b = b.region(region);
        }
        if let Some(ticks) = self.duration {
            b = b.duration(ticks);
        }
        b.build()
    }
}

impl FrameDataDef {
    fn build(self) -> Result<FrameData, BuildError> {
        let mut b = FrameData::builder()
            .contact_stun(self.contact_stun)
            .block_stun(self.block_stun);
        if let Some(t) = self.startup {
            b = b.startup(t);
        }
        if let Some(t) = self.active {
            b = b.active(t);
        }
        if let Some(t) = self.recovery {
            b = b.recovery(t);
        }
        if let Some(id) = self.animation {
            b = b.animation(Animation::builder().id(id).build()?);
        }
        if let Some(hitbox) = self.hitbox {
            b = b.hitbox(hitbox.build()?);
        }
        b.build()
    }
}

impl SkillDef {
    fn build(self) -> Result<Skill, BuildError> {
        let mut b = Skill::builder(self.name)
            .description(self.description)
            .grounded(self.grounded)
            .reversal(self.reversal)
            .counter_eligible(self.counter_eligible)
            .gauge_cost(self.gauge_cost)
            .damage(self.damage)
            .knockdown(self.knockdown);
        if let Some(fd) = self.frame_data {
            b = b.frame_data(fd.build()?);
        }
        if let Some(motion) = self.motion {
            b = b.motion(motion);
        }
        for target in self.gatling {
            b = b.gatling(target);
        }
        b.build()
    }
}

// ---------------------------------------------------------------------------
// SkillLibrary
// ---------------------------------------------------------------------------

/// Frozen, indexed set of skills.
#[derive(Debug, Clone, Default)]
pub struct SkillLibrary {
    skills: Vec<Skill>,
    by_name: HashMap<String, SkillId>,
    gatlings: Vec<BTreeSet<SkillId>>,
    by_button: BTreeMap<Button, Vec<SkillId>>,
}

impl SkillLibrary {
    /// Freeze `skills`, resolving gatling names and building the button index.
    pub fn new(skills: Vec<Skill>) -> Result<Self, BuildError> {
        let mut by_name = HashMap::with_capacity(skills.len());
        for (i, skill) in skills.iter().enumerate() {
            if by_name.insert(skill.name.clone(), SkillId(i as u32)).is_some() {
                return Err(BuildError::DuplicateSkill(skill.name.clone()));
            }
        }

        let mut gatlings = Vec::with_capacity(skills.len());
        let mut by_button: BTreeMap<Button, Vec<SkillId>> = BTreeMap::new();
        for (i, skill) in skills.iter().enumerate() {
            let mut set = BTreeSet::new();
            for target in &skill.gatling {
                let id = by_name.get(target).ok_or_else(|| BuildError::UnknownGatling {
                    skill: skill.name.clone(),
                    target: target.clone(),
                })?;
                set.insert(*id);
            }
            gatlings.push(set);
            if let Some(button) = skill.trigger() {
                by_button.entry(button).or_default().push(SkillId(i as u32));
            }
        }

        Ok(Self {
            skills,
            by_name,
            gatlings,
            by_button,
        })
    }

    /// Load a JSON array of skill definitions.
    ///
    /// Every definition goes through the same builders as hand-written
    /// content, so a missing field surfaces as [`BuildError::MissingField`].
    pub fn from_json_str(json: &str) -> Result<Self, BuildError> {
        let defs: Vec<SkillDef> = serde_json::from_str(json)?;
        let skills = defs
            .into_iter()
            .map(SkillDef::build)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(skills)
    }

    pub fn get(&self, id: SkillId) -> Option<&Skill> {
        self.skills.get(id.index())
    }

    pub fn id_of(&self, name: &str) -> Option<SkillId> {
        self.by_name.get(name).copied()
    }

    /// Skills whose motion ends on `button`, in library order.
    pub fn candidates_for(&self, button: Button) -> &[SkillId] {
        self.by_button.get(&button).map_or(&[], Vec::as_slice)
    }

    /// Resolved gatling set of `id`.
    pub fn gatling_set(&self, id: SkillId) -> Option<&BTreeSet<SkillId>> {
        self.gatlings.get(id.index())
    }

    /// Whether `from` declares `to` as a gatling follow-up.
    pub fn can_cancel_into(&self, from: SkillId, to: SkillId) -> bool {
        self.gatling_set(from).is_some_and(|set| set.contains(&to))
    }

    pub fn iter(&self) -> impl Iterator<Item = (SkillId, &Skill)> {
        self.skills
            .iter()
            .enumerate()
            .map(|(i, s)| (SkillId(i as u32), s))
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
