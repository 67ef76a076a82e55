//! Robot action definitions

use crate::entities::{DurationUnit, SpeedQualifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Parameter key for the target object of object-bearing actions
pub const PARAM_OBJECT: &str = "object";
/// Parameter key for the speed qualifier ("slow", "fast", ...)
pub const PARAM_SPEED: &str = "speed";
/// Parameter key for the numeric duration/distance
pub const PARAM_DURATION: &str = "duration";
/// Parameter key for the singular unit of `duration`
pub const PARAM_UNIT: &str = "unit";
/// Parameter key carrying the utterance of an unrecognised command
pub const PARAM_ORIGINAL_TEXT: &str = "original_text";

/// Discrete robot behaviours selected by the parser.
///
/// Declaration order is the matching order: when several actions could match
/// an utterance, the one declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    MoveForward,
    MoveBackward,
    TurnLeft,
    TurnRight,
    Stop,
    FindObject,
    FollowObject,
    AvoidObstacle,
    Unknown,
}

impl Action {
    /// All matchable actions in precedence order (`Unknown` excluded).
    pub const MATCH_ORDER: [Action; 8] = [
        Action::MoveForward,
        Action::MoveBackward,
        Action::TurnLeft,
        Action::TurnRight,
        Action::Stop,
        Action::FindObject,
        Action::FollowObject,
        Action::AvoidObstacle,
    ];

    /// Wire name, as sent to the rover
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::MoveForward => "move_forward",
            Action::MoveBackward => "move_backward",
            Action::TurnLeft => "turn_left",
            Action::TurnRight => "turn_right",
            Action::Stop => "stop",
            Action::FindObject => "find_object",
            Action::FollowObject => "follow_object",
            Action::AvoidObstacle => "avoid_obstacle",
            Action::Unknown => "unknown",
        }
    }

    /// Plain wheel motion that needs no vision input
    pub fn is_locomotion(&self) -> bool {
        matches!(
            self,
            Action::MoveForward
                | Action::MoveBackward
                | Action::TurnLeft
                | Action::TurnRight
                | Action::Stop
        )
    }

    /// Actions that refer to a target object in the scene
    pub fn is_object_bearing(&self) -> bool {
        matches!(
            self,
            Action::FindObject | Action::FollowObject | Action::AvoidObstacle
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed voice command. Built once per parse and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Selected action
    pub action: Action,
    /// Extracted parameters, keyed by the `PARAM_*` constants
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,
}

impl Command {
    pub(crate) fn new(
        action: Action,
        parameters: BTreeMap<String, serde_json::Value>,
        confidence: f32,
    ) -> Self {
        let confidence = if action == Action::Unknown {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            action,
            parameters,
            confidence,
        }
    }

    /// Unknown command; carries the original text when there was any
    pub fn unknown(original_text: Option<&str>) -> Self {
        let mut parameters = BTreeMap::new();
        if let Some(text) = original_text {
            parameters.insert(
                PARAM_ORIGINAL_TEXT.to_string(),
                serde_json::Value::String(text.to_string()),
            );
        }
        Self::new(Action::Unknown, parameters, 0.0)
    }

    /// Target object named in the utterance, if one was recognised
    pub fn object(&self) -> Option<&str> {
        self.text_param(PARAM_OBJECT)
    }

    pub fn speed(&self) -> Option<SpeedQualifier> {
        self.text_param(PARAM_SPEED).and_then(SpeedQualifier::parse)
    }

    /// Duration amount and unit, present only as a pair
    pub fn duration(&self) -> Option<(u64, DurationUnit)> {
        let amount = self.parameters.get(PARAM_DURATION)?.as_u64()?;
        let unit = self.text_param(PARAM_UNIT).and_then(DurationUnit::parse)?;
        Some((amount, unit))
    }

    pub fn original_text(&self) -> Option<&str> {
        self.text_param(PARAM_ORIGINAL_TEXT)
    }

    /// Whether the command is confident enough to be executed
    pub fn is_actionable(&self, threshold: f32) -> bool {
        self.action != Action::Unknown && self.confidence > threshold
    }

    /// Human-readable description, e.g. "Find ball (slowly) for 5 seconds"
    pub fn describe(&self) -> String {
        let mut description = match self.action {
            Action::MoveForward => "Move forward".to_string(),
            Action::MoveBackward => "Move backward".to_string(),
            Action::TurnLeft => "Turn left".to_string(),
            Action::TurnRight => "Turn right".to_string(),
            Action::Stop => "Stop".to_string(),
            Action::FindObject => format!("Find {}", self.object().unwrap_or("object")),
            Action::FollowObject => format!("Follow {}", self.object().unwrap_or("object")),
            Action::AvoidObstacle => format!("Avoid {}", self.object().unwrap_or("obstacle")),
            Action::Unknown => "Unknown command".to_string(),
        };

        if let Some(speed) = self.text_param(PARAM_SPEED) {
            description.push_str(&format!(" ({speed})"));
        }
        if let Some(amount) = self.parameters.get(PARAM_DURATION) {
            let unit = self.text_param(PARAM_UNIT).unwrap_or("unit");
            description.push_str(&format!(" for {amount} {unit}s"));
        }
        description
    }

    fn text_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }
}
