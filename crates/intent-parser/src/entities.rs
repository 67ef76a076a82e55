//! Modifier and object extraction for commands

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Object names the detector side is expected to report
pub const KNOWN_OBJECTS: [&str; 20] = [
    "ball", "person", "chair", "table", "bottle", "cup", "book", "phone", "laptop", "mouse",
    "keyboard", "car", "bicycle", "dog", "cat", "bird", "flower", "tree", "wall", "door",
];

/// Speed qualifier spoken alongside a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedQualifier {
    Slow,
    Fast,
}

impl SpeedQualifier {
    /// Map a spoken word ("slowly", "quick", ...) to a qualifier
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "slow" | "slowly" => Some(SpeedQualifier::Slow),
            "fast" | "quick" | "quickly" => Some(SpeedQualifier::Fast),
            _ => None,
        }
    }
}

/// Units accepted after a spoken number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Second,
    Minute,
    Meter,
    Step,
}

impl DurationUnit {
    /// Parse the singular or plural form
    pub fn parse(word: &str) -> Option<Self> {
        match word.strip_suffix('s').unwrap_or(word) {
            "second" => Some(DurationUnit::Second),
            "minute" => Some(DurationUnit::Minute),
            "meter" => Some(DurationUnit::Meter),
            "step" => Some(DurationUnit::Step),
            _ => None,
        }
    }

    /// Singular name
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Second => "second",
            DurationUnit::Minute => "minute",
            DurationUnit::Meter => "meter",
            DurationUnit::Step => "step",
        }
    }
}

/// Extracts speed/duration modifiers and known objects from normalised text
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    speed: Regex,
    duration: Regex,
    known_objects: Vec<String>,
}

impl EntityExtractor {
    /// Create an extractor using the given object vocabulary
    pub fn new(known_objects: Vec<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            speed: Regex::new(r"\b(slow|fast|quick|slowly|quickly)\b")?,
            duration: Regex::new(r"\b(\d+)\s*(second|minute|meter|step)s?\b")?,
            known_objects,
        })
    }

    pub fn is_known_object(&self, word: &str) -> bool {
        self.known_objects.iter().any(|o| o == word)
    }

    /// First whitespace-separated token that is a known object
    pub fn scan_known_object<'t>(&self, text: &'t str) -> Option<&'t str> {
        text.split_whitespace().find(|w| self.is_known_object(w))
    }

    /// The speed word as spoken, if any
    pub fn extract_speed<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.speed
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// `<integer> <unit>` expression; numbers that overflow are treated as absent
    pub fn extract_duration(&self, text: &str) -> Option<(u64, DurationUnit)> {
        let captures = self.duration.captures(text)?;
        let amount = captures.get(1)?.as_str().parse::<u64>().ok()?;
        let unit = DurationUnit::parse(captures.get(2)?.as_str())?;
        Some((amount, unit))
    }
}
