use intent_parser::Action;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Who is steering: the operator's voice, or the vision loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    Manual,
    Autonomous,
}

impl DriveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveMode::Manual => "manual",
            DriveMode::Autonomous => "autonomous",
        }
    }
}

/// Elementary differential-drive motions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maneuver {
    MoveForward,
    MoveBackward,
    TurnLeft,
    TurnRight,
    Stop,
}

impl Maneuver {
    /// Locomotion actions map one to one; everything else has no direct maneuver
    pub fn from_action(action: Action) -> Option<Self> {
        match action {
            Action::MoveForward => Some(Maneuver::MoveForward),
            Action::MoveBackward => Some(Maneuver::MoveBackward),
            Action::TurnLeft => Some(Maneuver::TurnLeft),
            Action::TurnRight => Some(Maneuver::TurnRight),
            Action::Stop => Some(Maneuver::Stop),
            _ => None,
        }
    }

    /// (left, right) wheel sign
    pub fn wheel_signs(&self) -> (i32, i32) {
        match self {
            Maneuver::MoveForward => (1, 1),
            Maneuver::MoveBackward => (-1, -1),
            Maneuver::TurnLeft => (-1, 1),
            Maneuver::TurnRight => (1, -1),
            Maneuver::Stop => (0, 0),
        }
    }

    /// Wire name understood by the rover firmware
    pub fn as_str(&self) -> &'static str {
        match self {
            Maneuver::MoveForward => "move_forward",
            Maneuver::MoveBackward => "move_backward",
            Maneuver::TurnLeft => "turn_left",
            Maneuver::TurnRight => "turn_right",
            Maneuver::Stop => "stop",
        }
    }
}

/// One per-wheel power/duration instruction for the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorDirective {
    /// Signed PWM for the left wheel
    pub left_power: i32,
    /// Signed PWM for the right wheel
    pub right_power: i32,
    /// Unsigned PWM magnitude the powers were derived from
    pub speed: i32,
    pub duration_s: f32,
    /// Wire name of the motion, e.g. "turn_left"
    pub source_action: String,
    pub timestamp: OffsetDateTime,
}

impl MotorDirective {
    pub fn new(maneuver: Maneuver, speed: i32, duration_s: f32, at: OffsetDateTime) -> Self {
        let (left, right) = maneuver.wheel_signs();
        Self {
            left_power: left * speed,
            right_power: right * speed,
            speed,
            duration_s,
            source_action: maneuver.as_str().to_string(),
            timestamp: at,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.left_power == 0 && self.right_power == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wheel_table() {
        let at = OffsetDateTime::UNIX_EPOCH;
        let d = |m| {
            let d = MotorDirective::new(m, 150, 1.0, at);
            (d.left_power, d.right_power)
        };
        assert_eq!(d(Maneuver::MoveForward), (150, 150));
        assert_eq!(d(Maneuver::MoveBackward), (-150, -150));
        assert_eq!(d(Maneuver::TurnLeft), (-150, 150));
        assert_eq!(d(Maneuver::TurnRight), (150, -150));
        assert_eq!(d(Maneuver::Stop), (0, 0));
    }

    #[test]
    fn test_from_action() {
        assert_eq!(Maneuver::from_action(Action::Stop), Some(Maneuver::Stop));
        assert_eq!(Maneuver::from_action(Action::FindObject), None);
        assert_eq!(Maneuver::from_action(Action::Unknown), None);
        for action in Action::MATCH_ORDER {
            if let Some(m) = Maneuver::from_action(action) {
                assert_eq!(m.as_str(), action.as_str());
            }
        }
    }
}
