//! Presentation seam.
//!
//! Skills hand their [`Animation`] descriptor to a [`Presenter`] when they
//! enter Startup. Playback is fire-and-forget: the returned handle may be
//! polled for bookkeeping, but animation length never affects frame timing.

use std::cell::RefCell;
use std::rc::Rc;

use kumite_core::combatant::CombatantId;
use kumite_core::skill::Animation;
use serde::{Deserialize, Serialize};

/// Opaque handle to a started animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnimationHandle(pub u64);

/// Host-side animation playback.
pub trait Presenter {
    fn play_animation(&mut self, combatant: CombatantId, animation: &Animation) -> AnimationHandle;

    /// Whether a started animation has finished. Hosts that do not track
    /// playback report `false`.
    fn animation_ended(&self, _handle: AnimationHandle) -> bool {
        false
    }
}

/// Discards every request.
#[derive(Debug, Default)]
pub struct NullPresenter {
    next: u64,
}

impl Presenter for NullPresenter {
    fn play_animation(&mut self, _combatant: CombatantId, _animation: &Animation) -> AnimationHandle {
        self.next += 1;
        AnimationHandle(self.next)
    }
}

/// Shared list of `(combatant, animation id)` pairs played so far.
pub type PlayLog = Rc<RefCell<Vec<(CombatantId, String)>>>;

/// Records every request into a [`PlayLog`] the caller keeps a clone of.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    log: PlayLog,
}

impl RecordingPresenter {
    /// Create a presenter and the log it writes to.
    pub fn new() -> (Self, PlayLog) {
        let log = PlayLog::default();
        (
            Self {
                log: Rc::clone(&log),
            },
            log,
        )
    }
}

impl Presenter for RecordingPresenter {
    fn play_animation(&mut self, combatant: CombatantId, animation: &Animation) -> AnimationHandle {
        let mut log = self.log.borrow_mut();
        log.push((combatant, animation.id().to_owned()));
        AnimationHandle(log.len() as u64)
    }
}
