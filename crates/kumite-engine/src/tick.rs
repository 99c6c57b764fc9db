//! Fixed-rate logical clock.
//!
//! The [`Scheduler`] is the only time source for combat. The host feeds it
//! variable wall-clock frame deltas through [`Scheduler::advance`]; the
//! scheduler accumulates them and fires one logical tick whenever the
//! accumulated time reaches the tick interval, then resets the accumulator
//! to zero. There is no catch-up: a long stall fires a single tick, never a
//! burst. Every combat duration is counted in ticks, never in seconds.
//!
//! Listeners register in a fixed order and are resumed in that order once
//! per tick. A fired tick is returned as a [`TickBroadcast`] that carries a
//! snapshot of the listener list taken when the tick fired, so a listener
//! registered while the broadcast is being delivered waits for the next tick
//! and one unregistered mid-delivery is skipped (check
//! [`Scheduler::is_registered`] before resuming).
//!
//! # Example
//!
//! ```
//! use kumite_engine::tick::{Scheduler, TickConfig};
//!
//! let mut scheduler = Scheduler::new(TickConfig { tick_rate: 10.0 });
//! let fighter = scheduler.register("fighter");
//!
//! assert!(scheduler.advance(0.05).is_none());
//! let broadcast = scheduler.advance(0.06).unwrap();
//! assert_eq!(broadcast.tick, 1);
//! assert_eq!(broadcast.listeners(), &[fighter]);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Logical ticks per second. Must be positive and finite.
    pub tick_rate: f64,
}

impl Default for TickConfig {
    /// Defaults to 24 Hz.
    fn default() -> Self {
        Self { tick_rate: 24.0 }
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickDiagnostics {
    /// The tick these numbers describe.
    pub tick: u64,
    /// Listeners actually resumed (registered ones from the snapshot).
    pub resumed: usize,
    /// Wall-clock time spent delivering the tick.
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Handle for a registered tick listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListenerId(u64);

#[derive(Debug)]
struct RegisteredListener {
    id: ListenerId,
    /// Used only for tracing.
    name: String,
}

/// One fired tick and the listeners due for it, in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickBroadcast {
    pub tick: u64,
    listeners: Vec<ListenerId>,
}

impl TickBroadcast {
    pub fn listeners(&self) -> &[ListenerId] {
        &self.listeners
    }
}

// ---------------------------------------------------------------------------
// TickWait
// ---------------------------------------------------------------------------

/// A wait of a fixed number of ticks.
///
/// Each call to [`tick`](Self::tick) stands for one resumption by the
/// scheduler. The wait never polls and never looks at wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickWait {
    remaining: u32,
}

impl TickWait {
    pub fn new(ticks: u32) -> Self {
        Self { remaining: ticks }
    }

    /// Consume one tick. Returns `true` once the wait is over.
    pub fn tick(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Accumulator-driven fixed-rate tick source.
pub struct Scheduler {
    listeners: Vec<RegisteredListener>,
    next_listener: u64,
    tick_counter: u64,
    /// Seconds per tick.
    interval: f64,
    accumulator: f64,
    config: TickConfig,
}

impl Scheduler {
    /// Create a scheduler. The tick counter starts at 0.
    ///
    /// # Panics
    ///
    /// Panics if `tick_rate` is not positive and finite.
    pub fn new(config: TickConfig) -> Self {
        assert!(
            config.tick_rate > 0.0 && config.tick_rate.is_finite(),
            "tick_rate must be positive and finite, got {}",
            config.tick_rate
        );
        Self {
            listeners: Vec::new(),
            next_listener: 0,
            tick_counter: 0,
            interval: 1.0 / config.tick_rate,
            accumulator: 0.0,
            config,
        }
    }

    /// Register a listener at the end of the resumption order.
    pub fn register(&mut self, name: &str) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push(RegisteredListener {
            id,
            name: name.to_owned(),
        });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        match self.listeners.iter().position(|l| l.id == id) {
            Some(pos) => {
                self.listeners.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|l| l.id == id)
    }

    /// Feed one frame of elapsed wall-clock time.
    ///
    /// Returns the fired tick, if the accumulated time reached the interval.
    /// Negative or non-finite deltas are ignored.
    pub fn advance(&mut self, dt: f64) -> Option<TickBroadcast> {
        if !dt.is_finite() || dt < 0.0 {
            warn!(dt, "ignoring invalid frame delta");
            return None;
        }
        self.accumulator += dt;
        if self.accumulator < self.interval {
            return None;
        }
        self.accumulator = 0.0;
        Some(self.fire())
    }

    /// Fire a tick immediately, leaving the accumulator untouched.
    ///
    /// Used by tests and replays, which step the clock directly.
    pub fn force_tick(&mut self) -> TickBroadcast {
        self.fire()
    }

    fn fire(&mut self) -> TickBroadcast {
        self.tick_counter += 1;
        trace!(
            tick = self.tick_counter,
            listeners = ?self.listeners.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(),
            "tick"
        );
        TickBroadcast {
            tick: self.tick_counter,
            listeners: self.listeners.iter().map(|l| l.id).collect(),
        }
    }

    // -- accessors ----------------------------------------------------------

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Logical ticks per second.
    pub fn tick_rate(&self) -> f64 {
        self.config.tick_rate
    }

    /// Seconds per tick.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Simulation time in seconds.
    ///
    /// Computed as `tick_count * interval` so it never drifts.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.interval
    }

    /// Accumulated time not yet converted into a tick.
    pub fn pending_time(&self) -> f64 {
        self.accumulator
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Listener names in resumption order.
    pub fn listener_names(&self) -> Vec<&str> {
        self.listeners.iter().map(|l| l.name.as_str()).collect()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tick_counter", &self.tick_counter)
            .field("tick_rate", &self.config.tick_rate)
            .field("accumulator", &self.accumulator)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
