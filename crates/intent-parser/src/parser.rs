//! Command parser for spoken robot instructions

use crate::actions::{PARAM_DURATION, PARAM_OBJECT, PARAM_SPEED, PARAM_UNIT};
use crate::entities::EntityExtractor;
use crate::{Action, Command, IntentConfig, IntentError, Result};
use regex::{Captures, Regex, RegexBuilder};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Confidence of any pattern match
const BASE_CONFIDENCE: f32 = 0.8;
/// Captured object is in the known vocabulary
const KNOWN_OBJECT_CONFIDENCE: f32 = 0.9;
/// Object recovered by scanning the words, not from the pattern
const SCANNED_OBJECT_CONFIDENCE: f32 = 0.7;

/// Optional article in front of a captured object noun
const ARTICLE: &str = r"(?:(?:the|a|an|my|that|this)\s+)?";

fn builtin_patterns(action: Action) -> Vec<String> {
    let object = |prefix: &str| format!(r"\b{prefix}\s+{ARTICLE}(\w+)\b");
    match action {
        Action::MoveForward => vec![
            r"\b(move|go|walk|drive)\s+(forward|ahead|straight)\b".to_string(),
            r"\b(forward|ahead)\b".to_string(),
            r"\bmove\s+forward\b".to_string(),
        ],
        Action::MoveBackward => vec![
            r"\b(move|go|walk|drive)\s+(backward|back|reverse)\b".to_string(),
            r"\b(backward|back|reverse)\b".to_string(),
            r"\bmove\s+back\b".to_string(),
        ],
        Action::TurnLeft => vec![
            r"\b(turn|rotate|spin)\s+(left|counterclockwise)\b".to_string(),
            r"\b(left|turn\s+left)\b".to_string(),
            r"\bgo\s+left\b".to_string(),
        ],
        Action::TurnRight => vec![
            r"\b(turn|rotate|spin)\s+(right|clockwise)\b".to_string(),
            r"\b(right|turn\s+right)\b".to_string(),
            r"\bgo\s+right\b".to_string(),
        ],
        Action::Stop => vec![
            r"\b(stop|halt|pause|brake)\b".to_string(),
            r"\bstop\s+(moving|now)\b".to_string(),
            r"\bfreeze\b".to_string(),
        ],
        Action::FindObject => vec![
            object(r"(find|look\s+for|search\s+for|search|locate)"),
            object(r"where\s+is"),
            object(r"search\s+for"),
        ],
        Action::FollowObject => vec![
            object(r"(follow|chase|track)"),
            object(r"go\s+to"),
            object(r"move\s+towards"),
        ],
        Action::AvoidObstacle => vec![
            object(r"(avoid|dodge|go\s+around)"),
            object(r"stay\s+away\s+from"),
        ],
        Action::Unknown => Vec::new(),
    }
}

fn compile(action: Action, pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| IntentError::Pattern { action, source })
}

/// Main intent parser.
///
/// Holds an ordered table of (action, patterns). Parsing walks the table in
/// order and the first matching pattern decides the action.
#[derive(Debug, Clone)]
pub struct IntentParser {
    config: IntentConfig,
    table: Vec<(Action, Vec<Regex>)>,
    entities: EntityExtractor,
}

impl IntentParser {
    /// Create a new intent parser
    pub fn new(config: IntentConfig) -> Result<Self> {
        let mut table = Vec::with_capacity(Action::MATCH_ORDER.len());
        for action in Action::MATCH_ORDER {
            let mut regexes = builtin_patterns(action)
                .iter()
                .map(|p| compile(action, p))
                .collect::<Result<Vec<_>>>()?;
            for extra in config.extra_patterns.iter().filter(|e| e.action == action) {
                regexes.push(compile(action, &extra.pattern)?);
            }
            table.push((action, regexes));
        }

        if let Some(extra) = config
            .extra_patterns
            .iter()
            .find(|e| e.action == Action::Unknown)
        {
            return Err(IntentError::UnmatchableAction(extra.action));
        }

        let entities = EntityExtractor::new(config.known_objects.clone())
            .map_err(|source| IntentError::Pattern {
                action: Action::Unknown,
                source,
            })?;

        info!(
            "Command parser initialized with {} patterns",
            table.iter().map(|(_, r)| r.len()).sum::<usize>()
        );
        Ok(Self {
            config,
            table,
            entities,
        })
    }

    pub fn config(&self) -> &IntentConfig {
        &self.config
    }

    /// Parse a text command. Never fails: unrecognised text yields `Action::Unknown`.
    pub fn parse(&self, text: &str) -> Command {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Command::unknown(None);
        }

        debug!("Parsing command: '{}'", text);

        for (action, regexes) in &self.table {
            for regex in regexes {
                if let Some(captures) = regex.captures(&text) {
                    let command = self.build_command(*action, &captures, &text);
                    info!(
                        "Parsed command: {} {:?} (confidence: {:.2})",
                        command.action, command.parameters, command.confidence
                    );
                    return command;
                }
            }
        }

        warn!("Unknown command: '{}'", text);
        Command::unknown(Some(&text))
    }

    fn build_command(&self, action: Action, captures: &Captures, text: &str) -> Command {
        let mut parameters = BTreeMap::new();
        let mut confidence = BASE_CONFIDENCE;

        if action.is_object_bearing() {
            // Last non-empty capture group holds the trailing noun
            let captured = captures
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .last();

            match captured {
                Some(object) => {
                    if self.entities.is_known_object(object) {
                        confidence = KNOWN_OBJECT_CONFIDENCE;
                    }
                    parameters.insert(PARAM_OBJECT.to_string(), object.into());
                }
                None => {
                    if let Some(object) = self.entities.scan_known_object(text) {
                        confidence = SCANNED_OBJECT_CONFIDENCE;
                        parameters.insert(PARAM_OBJECT.to_string(), object.into());
                    }
                }
            }
        }

        if let Some(speed) = self.entities.extract_speed(text) {
            parameters.insert(PARAM_SPEED.to_string(), speed.into());
        }

        if let Some((amount, unit)) = self.entities.extract_duration(text) {
            parameters.insert(PARAM_DURATION.to_string(), amount.into());
            parameters.insert(PARAM_UNIT.to_string(), unit.as_str().into());
        }

        Command::new(action, parameters, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DurationUnit, SpeedQualifier};
    use crate::ExtraPattern;

    fn parser() -> IntentParser {
        IntentParser::new(IntentConfig::default()).unwrap()
    }

    #[test]
    fn test_locomotion_phrasings_agree() {
        let parser = parser();
        let cases = [
            (Action::MoveForward, vec!["move forward", "go ahead", "walk forward", "drive straight", "forward"]),
            (Action::MoveBackward, vec!["move back", "go backward", "reverse", "drive back"]),
            (Action::TurnLeft, vec!["turn left", "rotate counterclockwise", "go left", "left"]),
            (Action::TurnRight, vec!["turn right", "spin clockwise", "go right", "right"]),
            (Action::Stop, vec!["stop", "halt", "stop now", "freeze", "pause"]),
        ];
        for (expected, phrases) in cases {
            for phrase in phrases {
                let cmd = parser.parse(phrase);
                assert_eq!(cmd.action, expected, "phrase: {phrase}");
                assert!(cmd.confidence >= 0.8, "phrase: {phrase}");
            }
        }
    }

    #[test]
    fn test_empty_and_gibberish_are_unknown() {
        let parser = parser();

        let empty = parser.parse("");
        assert_eq!(empty.action, Action::Unknown);
        assert_eq!(empty.confidence, 0.0);
        assert!(empty.parameters.is_empty());

        let blank = parser.parse("   \t ");
        assert_eq!(blank.action, Action::Unknown);

        let gibberish = parser.parse("xyz abc");
        assert_eq!(gibberish.action, Action::Unknown);
        assert_eq!(gibberish.confidence, 0.0);
        assert_eq!(gibberish.original_text(), Some("xyz abc"));
    }

    #[test]
    fn test_find_known_object() {
        let cmd = parser().parse("find the ball");
        assert_eq!(cmd.action, Action::FindObject);
        assert_eq!(cmd.object(), Some("ball"));
        assert_eq!(cmd.confidence, 0.9);
    }

    #[test]
    fn test_find_unknown_object_keeps_base_confidence() {
        let cmd = parser().parse("locate the spaceship");
        assert_eq!(cmd.action, Action::FindObject);
        assert_eq!(cmd.object(), Some("spaceship"));
        assert_eq!(cmd.confidence, 0.8);
    }

    #[test]
    fn test_search_for_captures_noun() {
        let parser = parser();
        let cmd = parser.parse("search for the cup");
        assert_eq!(cmd.action, Action::FindObject);
        assert_eq!(cmd.object(), Some("cup"));

        let cmd = parser.parse("where is my phone");
        assert_eq!(cmd.action, Action::FindObject);
        assert_eq!(cmd.object(), Some("phone"));
    }

    #[test]
    fn test_follow_and_avoid() {
        let parser = parser();
        let cmd = parser.parse("Follow the person");
        assert_eq!(cmd.action, Action::FollowObject);
        assert_eq!(cmd.object(), Some("person"));
        assert_eq!(cmd.confidence, 0.9);

        let cmd = parser.parse("go to the ball");
        assert_eq!(cmd.action, Action::FollowObject);
        assert_eq!(cmd.object(), Some("ball"));

        let cmd = parser.parse("stay away from the wall");
        assert_eq!(cmd.action, Action::AvoidObstacle);
        assert_eq!(cmd.object(), Some("wall"));

        let cmd = parser.parse("avoid the chair");
        assert_eq!(cmd.action, Action::AvoidObstacle);
        assert_eq!(cmd.describe(), "Avoid chair");
    }

    #[test]
    fn test_action_order_decides_overlaps() {
        let parser = parser();
        // Direction words outrank object-bearing phrasings
        assert_eq!(parser.parse("follow the person to the left").action, Action::TurnLeft);
        // Forward is checked before backward
        assert_eq!(parser.parse("go back and forward").action, Action::MoveForward);
        // Movement outranks stop
        assert_eq!(parser.parse("stop and turn right").action, Action::TurnRight);
    }

    #[test]
    fn test_duration_and_unit() {
        let cmd = parser().parse("move forward for 5 seconds");
        assert_eq!(cmd.action, Action::MoveForward);
        assert_eq!(cmd.parameters.get(PARAM_DURATION), Some(&serde_json::json!(5)));
        assert_eq!(cmd.parameters.get(PARAM_UNIT), Some(&serde_json::json!("second")));
        assert_eq!(cmd.duration(), Some((5, DurationUnit::Second)));
        assert_eq!(cmd.describe(), "Move forward for 5 seconds");
    }

    #[test]
    fn test_speed_qualifier() {
        let cmd = parser().parse("turn left slowly");
        assert_eq!(cmd.action, Action::TurnLeft);
        assert_eq!(cmd.parameters.get(PARAM_SPEED), Some(&serde_json::json!("slowly")));
        assert_eq!(cmd.speed(), Some(SpeedQualifier::Slow));
        assert_eq!(cmd.describe(), "Turn left (slowly)");
    }

    #[test]
    fn test_malformed_modifiers_are_absent() {
        let cmd = parser().parse("go backward for five seconds faster");
        assert_eq!(cmd.action, Action::MoveBackward);
        assert!(cmd.duration().is_none());
        assert!(cmd.speed().is_none());
        assert!(!cmd.parameters.contains_key(PARAM_UNIT));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = parser();
        for text in ["find the ball quickly", "xyz abc", "go backward for 5 seconds", ""] {
            assert_eq!(parser.parse(text), parser.parse(text));
        }
    }

    #[test]
    fn test_extra_pattern_without_capture_scans_vocabulary() {
        let config = IntentConfig {
            extra_patterns: vec![ExtraPattern {
                action: Action::FollowObject,
                pattern: r"\bcome\s+with\b".to_string(),
            }],
            ..IntentConfig::default()
        };
        let parser = IntentParser::new(config).unwrap();

        let cmd = parser.parse("come with the dog");
        assert_eq!(cmd.action, Action::FollowObject);
        assert_eq!(cmd.object(), Some("dog"));
        assert_eq!(cmd.confidence, 0.7);

        let cmd = parser.parse("come with me");
        assert_eq!(cmd.action, Action::FollowObject);
        assert_eq!(cmd.object(), None);
        assert_eq!(cmd.confidence, 0.8);
    }

    #[test]
    fn test_invalid_extra_pattern_is_rejected() {
        let config = IntentConfig {
            extra_patterns: vec![ExtraPattern {
                action: Action::Stop,
                pattern: "(unclosed".to_string(),
            }],
            ..IntentConfig::default()
        };
        assert!(matches!(
            IntentParser::new(config),
            Err(IntentError::Pattern { action: Action::Stop, .. })
        ));
    }

    #[test]
    fn test_unknown_action_pattern_is_rejected() {
        let config = IntentConfig {
            extra_patterns: vec![ExtraPattern {
                action: Action::Unknown,
                pattern: "anything".to_string(),
            }],
            ..IntentConfig::default()
        };
        assert!(matches!(
            IntentParser::new(config),
            Err(IntentError::UnmatchableAction(Action::Unknown))
        ));
    }
}
