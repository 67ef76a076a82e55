//! Motion policy: maps a parsed voice command and the latest perception
//! snapshot to a single per-wheel motor directive.
//!
//! The policy is stateless. Timing, mode switching and transport live in the
//! caller; see [`MovementPolicy::decide`].

mod types;
pub use types::{DriveMode, Maneuver, MotorDirective};

mod profiles;
pub use profiles::{
    Steer, VisionProfile, AUTONOMOUS_PROFILE, AVOID_PROFILE, FIND_PROFILE, FOLLOW_PROFILE,
};

mod policy;
pub use policy::MovementPolicy;

use serde::{Deserialize, Serialize};

/// Speed and timing defaults for voice-driven motion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// PWM magnitude for an unqualified command
    pub base_speed: i32,
    /// Upper bound on any scaled PWM value
    pub max_power: i32,
    pub turn_duration_s: f32,
    pub move_duration_s: f32,
    /// Multiplier for "slow" / "slowly"
    pub slow_factor: f64,
    /// Multiplier for "fast" / "quick" / "quickly"
    pub fast_factor: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            base_speed: 150,
            max_power: 255,
            turn_duration_s: 0.5,
            move_duration_s: 1.0,
            slow_factor: 0.6,
            fast_factor: 1.4,
        }
    }
}

/// Initialize the motion policy system
pub fn init() {
    tracing::info!("Initializing motion policy");
}
