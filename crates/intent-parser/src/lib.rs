//! Intent Parser for Voice Commands
//!
//! Turns transcribed utterances into a discrete rover [`Action`] plus optional
//! parameters (target object, speed qualifier, duration). Matching is driven by
//! an ordered pattern table; the first matching pattern wins.

mod actions;
mod entities;
mod error;
mod parser;

pub use actions::{
    Action, Command, PARAM_DURATION, PARAM_OBJECT, PARAM_ORIGINAL_TEXT, PARAM_SPEED, PARAM_UNIT,
};
pub use entities::{DurationUnit, EntityExtractor, SpeedQualifier, KNOWN_OBJECTS};
pub use error::{IntentError, Result};
pub use parser::IntentParser;

use serde::{Deserialize, Serialize};

/// Configuration for intent parsing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Commands at or below this confidence are not executed
    pub confidence_threshold: f32,
    /// Object vocabulary used for confidence boosts and word scanning
    pub known_objects: Vec<String>,
    /// Additional patterns, tried after the built-in ones of the same action
    pub extra_patterns: Vec<ExtraPattern>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            known_objects: KNOWN_OBJECTS.iter().map(|s| s.to_string()).collect(),
            extra_patterns: Vec::new(),
        }
    }
}

/// An operator-supplied trigger pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraPattern {
    pub action: Action,
    pub pattern: String,
}

/// Initialize the intent parser system
pub fn init() -> Result<()> {
    tracing::info!("Initializing Intent Parser system");
    Ok(())
}

/// Create a new intent parser with default configuration
pub fn create_parser() -> Result<IntentParser> {
    IntentParser::new(IntentConfig::default())
}

/// Parse a voice command with a default parser
pub fn parse_command(text: &str) -> Result<Command> {
    Ok(create_parser()?.parse(text))
}

/// Render a command as a short human-readable phrase
pub fn describe(command: &Command) -> String {
    command.describe()
}
