//! Kumite core -- value types for a fixed-tick fighting-game combat core.
//!
//! This crate holds everything that does not need a clock or a spatial
//! world: entry-ordered combatant ids, the observable per-combatant attribute
//! store, the guarded state machine that writes through it, validated skill
//! and frame-data values, and the motion-input recognizer.
//!
//! # Quick Start
//!
//! ```
//! use kumite_core::prelude::*;
//!
//! let jab = Skill::builder("jab")
//!     .frame_data(
//!         FrameData::builder()
//!             .startup(4)
//!             .active(6)
//!             .recovery(10)
//!             .animation(Animation::builder().id("jab").build().unwrap())
//!             .hitbox(Hitbox::builder().size(1.0, 1.0).region(HitRegion::High).build().unwrap())
//!             .build()
//!             .unwrap(),
//!     )
//!     .motion([MotionToken::Button(Button::Light)])
//!     .build()
//!     .unwrap();
//! let library = SkillLibrary::new(vec![jab]).unwrap();
//!
//! let mut recognizer = MotionRecognizer::new(MotionConfig::default());
//! let outcome = recognizer.press(Button::Light, &library);
//! assert_eq!(outcome, MatchOutcome::Matched(library.id_of("jab").unwrap()));
//! ```

#![deny(unsafe_code)]

pub mod attribute;
pub mod combatant;
pub mod motion;
pub mod skill;
pub mod state;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::attribute::{
        Attribute, AttributeChange, AttributeSnapshot, AttributeStore, AttributeValue, Scalar,
        SubscriptionId,
    };
    pub use crate::combatant::{CombatantId, Roster};
    pub use crate::motion::{
        match_sequence, Button, ButtonMode, Direction, InputEvent, MatchOutcome, MotionConfig,
        MotionRecognizer, MotionToken, PurgePolicy,
    };
    pub use crate::skill::{
        Animation, BuildError, FrameData, GroundedType, HitOutcome, HitRegion, Hitbox, Phase,
        Skill, SkillId, SkillLibrary,
    };
    pub use crate::state::{CombatState, StateMachine};
}
