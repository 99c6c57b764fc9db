//! Combat configuration.
//!
//! Every tunable the arena reads lives in [`CombatConfig`]. All types are
//! serde (de)serializable with field defaults, so a JSON document only needs
//! the fields it overrides:
//!
//! ```
//! use kumite_engine::config::CombatConfig;
//!
//! let config = CombatConfig::from_json_str(r#"{ "hit_stop_ticks": 8 }"#).unwrap();
//! assert_eq!(config.hit_stop_ticks, 8);
//! assert_eq!(config.tick.tick_rate, 24.0);
//! ```

use kumite_core::motion::MotionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tick::TickConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Configuration failed to parse or validate.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed combat config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid combat config: `{field}` {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

// ---------------------------------------------------------------------------
// CombatantProfile
// ---------------------------------------------------------------------------

/// Starting resources and body size for a newly spawned combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatantProfile {
    pub health: i64,
    pub stamina: i64,
    pub gauge: i64,
    /// Half width and half height of the hurtbox.
    pub hurtbox: (f32, f32),
}

impl Default for CombatantProfile {
    fn default() -> Self {
        Self {
            health: 1000,
            stamina: 100,
            gauge: 0,
            hurtbox: (0.5, 1.0),
        }
    }
}

// ---------------------------------------------------------------------------
// CombatConfig
// ---------------------------------------------------------------------------

/// Arena-wide combat settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub tick: TickConfig,
    /// Freeze ticks applied to attacker and defender on every connected hit.
    pub hit_stop_ticks: u32,
    pub motion: MotionConfig,
    pub profile: CombatantProfile,
    /// Require a skill's grounded type to match the combatant's posture.
    pub enforce_grounded_type: bool,
    /// Deadline for peer acknowledgements, in ticks.
    pub ack_timeout_ticks: u64,
    /// Most combat journal events kept; older ones are evicted first.
    /// `None` keeps the whole fight.
    pub journal_capacity: Option<usize>,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::default(),
            hit_stop_ticks: 12,
            motion: MotionConfig::default(),
            profile: CombatantProfile::default(),
            enforce_grounded_type: false,
            ack_timeout_ticks: 48,
            journal_capacity: None,
        }
    }
}

impl CombatConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field for values the arena cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick.tick_rate.is_finite() && self.tick.tick_rate > 0.0) {
            return Err(ConfigError::Invalid {
                field: "tick.tick_rate",
                reason: "must be positive and finite",
            });
        }
        if self.profile.health <= 0 {
            return Err(ConfigError::Invalid {
                field: "profile.health",
                reason: "must be positive",
            });
        }
        if self.profile.stamina < 0 || self.profile.gauge < 0 {
            return Err(ConfigError::Invalid {
                field: "profile",
                reason: "stamina and gauge must not be negative",
            });
        }
        let (hw, hh) = self.profile.hurtbox;
        if !(hw.is_finite() && hh.is_finite() && hw > 0.0 && hh > 0.0) {
            return Err(ConfigError::Invalid {
                field: "profile.hurtbox",
                reason: "must be finite and positive",
            });
        }
        if self.ack_timeout_ticks == 0 {
            return Err(ConfigError::Invalid {
                field: "ack_timeout_ticks",
                reason: "must be at least one tick",
            });
        }
        if self.journal_capacity == Some(0) {
            return Err(ConfigError::Invalid {
                field: "journal_capacity",
                reason: "must keep at least one event",
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
