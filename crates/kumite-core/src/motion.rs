//! Motion-input recognition.
//!
//! Raw stick vectors are classified into one of eight compass
//! [`Direction`]s (or `Neutral`) and appended, together with button presses,
//! to a per-combatant token buffer. Every button press attempts a match
//! against the skill library:
//!
//! - A skill matches when its full declared sequence equals the tail of the
//!   buffer, token for token, right-aligned.
//! - A declared sequence that starts with `Neutral` is compared against a
//!   candidate that is prefixed with an explicit `Neutral` if the buffer
//!   did not start with one.
//! - The longest matching sequence wins. Two or more matches of the longest
//!   length are reported as [`MatchOutcome::Ambiguous`].
//!
//! A buffer that stops receiving tokens is purged after
//! [`MotionConfig::timeout_ticks`] idle ticks, but only while it holds more
//! than [`MotionConfig::min_retained`] tokens.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::skill::{SkillId, SkillLibrary};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// A classified stick direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Neutral,
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

const DIAGONAL: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// The eight compass unit vectors, in classification priority order.
const COMPASS: [(Direction, f64, f64); 8] = [
    (Direction::Up, 0.0, 1.0),
    (Direction::UpRight, DIAGONAL, DIAGONAL),
    (Direction::Right, 1.0, 0.0),
    (Direction::DownRight, DIAGONAL, -DIAGONAL),
    (Direction::Down, 0.0, -1.0),
    (Direction::DownLeft, -DIAGONAL, -DIAGONAL),
    (Direction::Left, -1.0, 0.0),
    (Direction::UpLeft, -DIAGONAL, DIAGONAL),
];

impl Direction {
    /// Classify a movement vector.
    ///
    /// Picks the compass direction with the highest positive dot product
    /// against `(x, y)`; ties go to the earlier entry in compass order.
    /// Returns `Neutral` when no dot product is positive (the zero vector,
    /// or a non-finite input). Only the direction of the vector matters.
    pub fn classify(x: f64, y: f64) -> Direction {
        let mut best = Direction::Neutral;
        let mut best_dot = 0.0;
        for (dir, ux, uy) in COMPASS {
            let dot = x * ux + y * uy;
            if dot > best_dot {
                best = dir;
                best_dot = dot;
            }
        }
        best
    }

    /// The unit vector for this direction (zero for `Neutral`).
    pub fn unit(self) -> (f64, f64) {
        COMPASS
            .iter()
            .find(|(d, _, _)| *d == self)
            .map_or((0.0, 0.0), |&(_, x, y)| (x, y))
    }

    /// Mirror across the vertical axis (used when a combatant faces left).
    pub fn mirrored(self) -> Direction {
        match self {
            Direction::UpRight => Direction::UpLeft,
            Direction::Right => Direction::Left,
            Direction::DownRight => Direction::DownLeft,
            Direction::DownLeft => Direction::DownRight,
            Direction::Left => Direction::Right,
            Direction::UpLeft => Direction::UpRight,
            other => other,
        }
    }

    /// Whether this direction points downward.
    pub fn is_down(self) -> bool {
        matches!(self, Direction::Down | Direction::DownLeft | Direction::DownRight)
    }
}

// ---------------------------------------------------------------------------
// Buttons and tokens
// ---------------------------------------------------------------------------

/// Attack buttons that can complete a motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Button {
    Light,
    Medium,
    Heavy,
    Unique,
}

/// Whether a button event is a press or a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonMode {
    Press,
    Release,
}

/// One entry of a motion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MotionToken {
    Direction(Direction),
    Button(Button),
}

impl fmt::Display for MotionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionToken::Direction(d) => write!(f, "{d:?}"),
            MotionToken::Button(b) => write!(f, "+{b:?}"),
        }
    }
}

/// A discrete event delivered by the input boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// An already classified stick direction.
    Direction(Direction),
    /// A raw stick vector, classified on arrival.
    Stick { x: f64, y: f64 },
    /// A button press or release.
    Button { button: Button, mode: ButtonMode },
}

// ---------------------------------------------------------------------------
// MotionConfig
// ---------------------------------------------------------------------------

/// What to drop when a stale buffer times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PurgePolicy {
    /// Clear the whole buffer.
    DropAll,
    /// Drop the oldest token only.
    #[default]
    DropOldest,
}

/// Buffer timing and retention settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Idle ticks tolerated before a purge.
    pub timeout_ticks: u32,
    /// Buffers this short or shorter are never purged.
    pub min_retained: usize,
    pub purge_policy: PurgePolicy,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            timeout_ticks: 6,
            min_retained: 2,
            purge_policy: PurgePolicy::DropOldest,
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Result of matching a candidate sequence against the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Matched(SkillId),
    NoMatch,
    /// Several skills of the same, longest length matched.
    Ambiguous(Vec<SkillId>),
}

/// Whether `pattern` equals the right-aligned tail of `candidate`.
///
/// A pattern anchored on `Neutral` sees the candidate with an explicit
/// leading `Neutral` when the candidate does not already start with one.
pub fn suffix_matches(pattern: &[MotionToken], candidate: &[MotionToken]) -> bool {
    const NEUTRAL: MotionToken = MotionToken::Direction(Direction::Neutral);

    if pattern.is_empty() {
        return false;
    }
    let anchored = pattern[0] == NEUTRAL && candidate.first() != Some(&NEUTRAL);
    let available = candidate.len() + usize::from(anchored);
    if pattern.len() > available {
        return false;
    }
    if anchored && pattern.len() == available {
        // The implicit Neutral lines up with pattern[0].
        return &pattern[1..] == candidate;
    }
    pattern == &candidate[candidate.len() - pattern.len()..]
}

/// Match a completed candidate against every skill that ends on its final
/// button.
pub fn match_sequence(candidate: &[MotionToken], library: &SkillLibrary) -> MatchOutcome {
    let Some(MotionToken::Button(button)) = candidate.last() else {
        return MatchOutcome::NoMatch;
    };

    let mut best_len = 0;
    let mut best: Vec<SkillId> = Vec::new();
    for &id in library.candidates_for(*button) {
        let Some(skill) = library.get(id) else {
            continue;
        };
        let pattern = skill.motion();
        if !suffix_matches(pattern, candidate) {
            continue;
        }
        if pattern.len() > best_len {
            best_len = pattern.len();
            best.clear();
            best.push(id);
        } else if pattern.len() == best_len {
            best.push(id);
        }
    }

    match best.len() {
        0 => MatchOutcome::NoMatch,
        1 => MatchOutcome::Matched(best[0]),
        _ => MatchOutcome::Ambiguous(best),
    }
}

// ---------------------------------------------------------------------------
// MotionRecognizer
// ---------------------------------------------------------------------------

/// Per-combatant token buffer.
#[derive(Debug, Clone, Default)]
pub struct MotionRecognizer {
    config: MotionConfig,
    buffer: Vec<MotionToken>,
    idle_ticks: u32,
    appended_this_tick: bool,
}

impl MotionRecognizer {
    /// Create an empty recognizer.
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Buffer a classified direction.
    ///
    /// Directions arrive only while the stick is deflected, so every change
    /// is buffered whether or not a button is down. Returns `true` if a token
    /// was appended, which only happens when the direction differs from the
    /// last buffered token.
    pub fn push_direction(&mut self, direction: Direction) -> bool {
        let token = MotionToken::Direction(direction);
        if self.buffer.last() == Some(&token) {
            return false;
        }
        self.append(token);
        true
    }

    /// Buffer a button press and attempt a match.
    ///
    /// A successful match consumes the buffer; a miss or an ambiguous match
    /// keeps it so the player can keep building input.
    pub fn press(&mut self, button: Button, library: &SkillLibrary) -> MatchOutcome {
        self.append(MotionToken::Button(button));
        let outcome = match_sequence(&self.buffer, library);
        if matches!(outcome, MatchOutcome::Matched(_)) {
            self.buffer.clear();
            self.idle_ticks = 0;
        }
        outcome
    }

    /// Advance the idle timer by one tick and purge if it has expired.
    ///
    /// Returns the number of tokens dropped.
    pub fn on_tick(&mut self) -> usize {
        let appended = std::mem::take(&mut self.appended_this_tick);
        if self.buffer.is_empty() || appended {
            self.idle_ticks = 0;
            return 0;
        }

        self.idle_ticks = self.idle_ticks.saturating_add(1);
        if self.idle_ticks <= self.config.timeout_ticks
            || self.buffer.len() <= self.config.min_retained
        {
            return 0;
        }

        let dropped = match self.config.purge_policy {
            PurgePolicy::DropAll => std::mem::take(&mut self.buffer).len(),
            PurgePolicy::DropOldest => {
                self.buffer.remove(0);
                1
            }
        };
        self.idle_ticks = 0;
        trace!(dropped, remaining = self.buffer.len(), "motion buffer purged");
        dropped
    }

    /// Buffered tokens, oldest first.
    pub fn buffer(&self) -> &[MotionToken] {
        &self.buffer
    }

    /// Consecutive idle ticks since the last append or purge.
    pub fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }

    /// Drop every buffered token.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.idle_ticks = 0;
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    fn append(&mut self, token: MotionToken) {
        self.buffer.push(token);
        self.appended_this_tick = true;
        self.idle_ticks = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::tests::{library_of, simple_skill};
    use Direction::*;

    fn d(dir: Direction) -> MotionToken {
        MotionToken::Direction(dir)
    }

    fn b(button: Button) -> MotionToken {
        MotionToken::Button(button)
    }

    // -- 1. Classification ------------------------------------------------

    #[test]
    fn classify_axes_and_diagonals() {
        assert_eq!(Direction::classify(0.0, 1.0), Up);
        assert_eq!(Direction::classify(3.0, 0.1), Right);
        assert_eq!(Direction::classify(-2.0, -2.0), DownLeft);
        assert_eq!(Direction::classify(0.5, -0.4), DownRight);
    }

    #[test]
    fn classify_zero_and_nan_is_neutral() {
        assert_eq!(Direction::classify(0.0, 0.0), Neutral);
        assert_eq!(Direction::classify(f64::NAN, 1.0), Neutral);
    }

    #[test]
    fn classify_ignores_magnitude() {
        for (x, y) in [(0.3, 0.9), (-1.0, 0.2), (0.7, -0.7)] {
            let base = Direction::classify(x, y);
            assert_eq!(Direction::classify(x * 1e-6, y * 1e-6), base);
            assert_eq!(Direction::classify(x * 1e6, y * 1e6), base);
        }
    }

    #[test]
    fn mirrored_swaps_horizontal_component() {
        assert_eq!(DownRight.mirrored(), DownLeft);
        assert_eq!(Up.mirrored(), Up);
        assert_eq!(Neutral.mirrored(), Neutral);
    }

    // -- 2. Suffix alignment ----------------------------------------------

    #[test]
    fn suffix_requires_right_alignment() {
        let pattern = [d(Down), d(DownRight), d(Right), b(Button::Light)];
        let candidate = [d(Left), d(Down), d(DownRight), d(Right), b(Button::Light)];
        assert!(suffix_matches(&pattern, &candidate));

        let shifted = [d(Down), d(DownRight), d(Right), b(Button::Light), b(Button::Light)];
        assert!(!suffix_matches(&pattern, &shifted));
    }

    #[test]
    fn neutral_anchor_is_implied() {
        let pattern = [d(Neutral), d(Down), b(Button::Heavy)];
        assert!(suffix_matches(&pattern, &[d(Down), b(Button::Heavy)]));
        assert!(suffix_matches(&pattern, &[d(Neutral), d(Down), b(Button::Heavy)]));
        assert!(!suffix_matches(&pattern, &[d(Right), d(Down), b(Button::Heavy)]));
    }

    // -- 3. Library matching ----------------------------------------------

    #[test]
    fn longest_match_wins() {
        let library = library_of(vec![
            simple_skill("jab", vec![b(Button::Light)]),
            simple_skill("fireball", vec![d(Down), d(DownRight), d(Right), b(Button::Light)]),
        ]);
        let fireball = library.id_of("fireball").unwrap();
        let outcome = match_sequence(
            &[d(Down), d(DownRight), d(Right), b(Button::Light)],
            &library,
        );
        assert_eq!(outcome, MatchOutcome::Matched(fireball));
    }

    #[test]
    fn equal_length_matches_are_ambiguous() {
        let library = library_of(vec![
            simple_skill("a", vec![d(Down), b(Button::Medium)]),
            simple_skill("b", vec![d(Down), b(Button::Medium)]),
        ]);
        match match_sequence(&[d(Down), b(Button::Medium)], &library) {
            MatchOutcome::Ambiguous(ids) => assert_eq!(ids.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn candidate_must_end_on_button() {
        let library = library_of(vec![simple_skill("jab", vec![b(Button::Light)])]);
        assert_eq!(match_sequence(&[d(Down)], &library), MatchOutcome::NoMatch);
        assert_eq!(match_sequence(&[], &library), MatchOutcome::NoMatch);
    }

    // -- 4. Buffering -----------------------------------------------------

    #[test]
    fn adjacent_duplicate_directions_collapse() {
        let mut rec = MotionRecognizer::new(MotionConfig::default());
        assert!(rec.push_direction(Down));
        assert!(!rec.push_direction(Down));
        assert!(rec.push_direction(DownRight));
        assert!(rec.push_direction(Down));
        assert_eq!(rec.buffer(), &[d(Down), d(DownRight), d(Down)]);
    }

    #[test]
    fn match_consumes_buffer_and_miss_keeps_it() {
        let library = library_of(vec![simple_skill("low", vec![d(Down), b(Button::Heavy)])]);
        let mut rec = MotionRecognizer::new(MotionConfig::default());

        rec.push_direction(Down);
        assert_eq!(rec.press(Button::Light, &library), MatchOutcome::NoMatch);
        assert_eq!(rec.buffer(), &[d(Down), b(Button::Light)]);

        rec.push_direction(Down);
        let low = library.id_of("low").unwrap();
        assert_eq!(rec.press(Button::Heavy, &library), MatchOutcome::Matched(low));
        assert!(rec.buffer().is_empty());
    }

    #[test]
    fn directions_buffer_with_no_button_down() {
        let library = library_of(vec![simple_skill(
            "fireball",
            vec![d(Down), d(DownRight), d(Right), b(Button::Light)],
        )]);
        let mut rec = MotionRecognizer::new(MotionConfig::default());

        // The whole quarter circle is entered before any button goes down.
        assert!(rec.push_direction(Down));
        assert!(rec.push_direction(DownRight));
        assert!(rec.push_direction(Right));
        assert_eq!(rec.buffer(), &[d(Down), d(DownRight), d(Right)]);

        let fireball = library.id_of("fireball").unwrap();
        assert_eq!(rec.press(Button::Light, &library), MatchOutcome::Matched(fireball));
    }

    // -- 5. Timeout purge -------------------------------------------------

    #[test]
    fn short_buffer_is_never_purged() {
        let mut rec = MotionRecognizer::new(MotionConfig {
            timeout_ticks: 2,
            min_retained: 2,
            purge_policy: PurgePolicy::DropAll,
        });
        rec.push_direction(Down);
        rec.push_direction(DownRight);
        for _ in 0..20 {
            assert_eq!(rec.on_tick(), 0);
        }
        assert_eq!(rec.buffer().len(), 2);
    }

    #[test]
    fn drop_all_after_timeout() {
        let mut rec = MotionRecognizer::new(MotionConfig {
            timeout_ticks: 2,
            min_retained: 2,
            purge_policy: PurgePolicy::DropAll,
        });
        rec.push_direction(Down);
        rec.push_direction(DownRight);
        rec.push_direction(Right);

        // Tick of the appends does not count as idle.
        assert_eq!(rec.on_tick(), 0);
        assert_eq!(rec.on_tick(), 0);
        assert_eq!(rec.on_tick(), 0);
        assert_eq!(rec.on_tick(), 3);
        assert!(rec.buffer().is_empty());
        assert_eq!(rec.idle_ticks(), 0);
    }

    #[test]
    fn drop_oldest_trims_down_to_min_retained() {
        let mut rec = MotionRecognizer::new(MotionConfig {
            timeout_ticks: 1,
            min_retained: 2,
            purge_policy: PurgePolicy::DropOldest,
        });
        for dir in [Down, DownRight, Right, UpRight] {
            rec.push_direction(dir);
        }
        rec.on_tick(); // append tick
        let mut dropped = 0;
        for _ in 0..10 {
            dropped += rec.on_tick();
        }
        assert_eq!(dropped, 2);
        assert_eq!(rec.buffer(), &[d(Right), d(UpRight)]);
    }

    #[test]
    fn append_resets_idle_counter() {
        let mut rec = MotionRecognizer::new(MotionConfig {
            timeout_ticks: 3,
            min_retained: 0,
            purge_policy: PurgePolicy::DropAll,
        });
        rec.push_direction(Down);
        rec.on_tick();
        rec.on_tick();
        rec.on_tick();
        assert_eq!(rec.idle_ticks(), 2);
        rec.push_direction(Right);
        rec.on_tick();
        assert_eq!(rec.idle_ticks(), 0);
        assert_eq!(rec.buffer().len(), 2);
    }
}
