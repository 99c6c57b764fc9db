//! Kumite engine -- fixed-tick combat orchestration.
//!
//! This crate builds on [`kumite_core`] to run fights: a fixed-rate
//! [`Scheduler`](tick::Scheduler) drives every combatant once per tick, skills
//! run as externally stepped [`Execution`](executor::Execution)s, and hitboxes
//! resolve through a rapier2d-backed [`SpatialWorld`](spatial::SpatialWorld).
//! Everything that happens is written to a
//! [`CombatJournal`](kumite_journal::CombatJournal).
//!
//! # Quick Start
//!
//! ```
//! use kumite_engine::prelude::*;
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
//! let mut arena = Arena::new(CombatConfig::default(), library).unwrap();
//!
//! let fighter = arena.spawn((0.0, 0.0), Facing::Right);
//! arena.input(fighter, InputEvent::Button { button: Button::Light, mode: ButtonMode::Press });
//! assert_eq!(arena.state(fighter), Some(CombatState::Startup));
//!
//! arena.run_ticks(20);
//! assert_eq!(arena.state(fighter), Some(CombatState::Idle));
//! assert_eq!(arena.bookkeeping(fighter).unwrap().last_outcome, HitOutcome::Whiffed);
//! ```

#![deny(unsafe_code)]

pub mod ack;
pub mod combat;
pub mod config;
pub mod executor;
pub mod hitbox;
pub mod presenter;
pub mod replay;
pub mod spatial;
pub mod tick;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the core crate for convenience.
pub use kumite_core;

/// Re-export the journal crate for convenience.
pub use kumite_journal;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use kumite_core::prelude::*;

    pub use crate::ack::{AckError, AckResponse, AckTracker, RequestId};
    pub use crate::combat::{
        Arena, ArenaSnapshot, Bookkeeping, Contribution, ContributorRecord, InputOutcome,
        TriggerRejected,
    };
    pub use crate::config::{CombatConfig, CombatantProfile, ConfigError};
    pub use crate::executor::{ExecStatus, Execution, SkillStamp};
    pub use crate::hitbox::{Facing, Hit, HitboxResolver, Posture};
    pub use crate::presenter::{AnimationHandle, NullPresenter, Presenter, RecordingPresenter};
    pub use crate::replay::{
        replay, ArenaInput, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult,
    };
    pub use crate::spatial::{SpatialQuery, SpatialWorld};
    pub use crate::tick::{Scheduler, TickConfig, TickDiagnostics};

    pub use kumite_journal::{CombatEvent, CombatEventKind, CombatJournal};
}
