//! Per-behaviour steering constants

/// Which way to turn relative to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steer {
    /// Turn to face the target
    Toward,
    /// Turn so the target leaves the path
    Away,
}

/// Steering constants for one vision-driven behaviour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionProfile {
    pub name: &'static str,
    pub steer: Steer,
    /// Turn length when the target is off-center
    pub turn_s: f32,
    /// Turn-right length when the target is not in view
    pub search_s: f32,
    /// Forward length when centered and far; `None` means hold position
    pub approach_s: Option<f32>,
    /// Area (px) at or above which a centered target counts as near
    pub proximity_area: u64,
}

/// "find X": face the target, do not approach it
pub const FIND_PROFILE: VisionProfile = VisionProfile {
    name: "find",
    steer: Steer::Toward,
    turn_s: 0.5,
    search_s: 1.0,
    approach_s: None,
    proximity_area: 0,
};

/// "follow X": face the target and close in until it looks near
pub const FOLLOW_PROFILE: VisionProfile = VisionProfile {
    name: "follow",
    steer: Steer::Toward,
    turn_s: 0.3,
    search_s: 0.5,
    approach_s: Some(0.5),
    proximity_area: 8_000,
};

/// "avoid X": steer away, keep driving while the obstacle is still far
pub const AVOID_PROFILE: VisionProfile = VisionProfile {
    name: "avoid",
    steer: Steer::Away,
    turn_s: 0.3,
    search_s: 0.5,
    approach_s: Some(0.5),
    proximity_area: 8_000,
};

/// Unattended wandering toward the largest thing in view
pub const AUTONOMOUS_PROFILE: VisionProfile = VisionProfile {
    name: "autonomous",
    steer: Steer::Toward,
    turn_s: 0.2,
    search_s: 0.3,
    approach_s: Some(0.5),
    proximity_area: 10_000,
};
