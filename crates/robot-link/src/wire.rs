//! Messages exchanged with the drive controller: one JSON object per line.

use crate::Result;
use motion_policy::MotorDirective;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const EMERGENCY_STOP: &str = "emergency_stop";
pub const GET_STATUS: &str = "get_status";
pub const CALIBRATE: &str = "calibrate";

/// Fractional Unix seconds
pub fn unix_seconds(at: OffsetDateTime) -> f64 {
    at.unix_timestamp_nanos() as f64 / 1e9
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveMessage {
    pub action: String,
    pub speed: i32,
    pub left_motor: i32,
    pub right_motor: i32,
    /// Seconds
    pub duration: f32,
    pub timestamp: f64,
}

impl DriveMessage {
    pub fn from_directive(directive: &MotorDirective) -> Self {
        Self {
            action: directive.source_action.clone(),
            speed: directive.speed,
            left_motor: directive.left_power,
            right_motor: directive.right_power,
            duration: directive.duration_s,
            timestamp: unix_seconds(directive.timestamp),
        }
    }

    pub fn emergency_stop(at: OffsetDateTime) -> Self {
        Self {
            action: EMERGENCY_STOP.to_string(),
            speed: 0,
            left_motor: 0,
            right_motor: 0,
            duration: 0.0,
            timestamp: unix_seconds(at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRequest {
    pub action: String,
    pub timestamp: f64,
}

impl StatusRequest {
    pub fn new(at: OffsetDateTime) -> Self {
        Self {
            action: GET_STATUS.to_string(),
            timestamp: unix_seconds(at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrateMotor {
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrateMessage {
    pub action: String,
    pub motor: CalibrateMotor,
    pub speed: i32,
}

/// Left then right at `speed`, then both at rest.
pub fn calibration_sequence(speed: i32) -> [CalibrateMessage; 3] {
    let step = |motor, speed| CalibrateMessage {
        action: CALIBRATE.to_string(),
        motor,
        speed,
    };
    [
        step(CalibrateMotor::Left, speed),
        step(CalibrateMotor::Right, speed),
        step(CalibrateMotor::Both, 0),
    ]
}

/// Serialize `msg` as a newline-terminated JSON line
pub fn encode_line<T: Serialize>(msg: &T) -> Result<String> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}

/// Parse one reply line from the robot
pub fn decode_reply(line: &str) -> Result<serde_json::Value> {
    Ok(serde_json::from_str(line.trim())?)
}
