use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Named behavioral profile the LLM is instructed to adopt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    #[default]
    Yui,
    Friday,
    Jarvis,
}

impl Personality {
    pub const ALL: [Personality; 3] = [Personality::Yui, Personality::Friday, Personality::Jarvis];

    /// Wire label, as carried on `assistant` envelopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Yui => "yui",
            Personality::Friday => "friday",
            Personality::Jarvis => "jarvis",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Personality::Yui => "Yui",
            Personality::Friday => "Friday",
            Personality::Jarvis => "Jarvis",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Personality::Yui => {
                "Moon-inspired AI companion who is warm, intelligent, and emotionally aware"
            }
            Personality::Friday => "Efficient, professional AI assistant with personality",
            Personality::Jarvis => "Sophisticated British AI with dry wit",
        }
    }

    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|p| p.as_str().to_string()).collect()
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Personality {
    type Err = ValidationError;

    /// Case-insensitive: `/switch Friday` and `/switch friday` are the same.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yui" => Ok(Personality::Yui),
            "friday" => Ok(Personality::Friday),
            "jarvis" => Ok(Personality::Jarvis),
            _ => Err(ValidationError::UnknownPersonality {
                given: s.to_string(),
                valid: Self::names(),
            }),
        }
    }
}
