//! Envelope wire format
//!
//! One JSON object per text frame:
//!
//! ```json
//! {"type": "assistant", "content": "hi", "personality": "yui", "timestamp": "2025-01-01T10:00:00Z"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::personality::Personality;

/// Envelope variant, serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    System,
    #[default]
    User,
    Assistant,
    Tool,
    Typing,
    Error,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::System => "system",
            EnvelopeKind::User => "user",
            EnvelopeKind::Assistant => "assistant",
            EnvelopeKind::Tool => "tool",
            EnvelopeKind::Typing => "typing",
            EnvelopeKind::Error => "error",
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tagged message unit exchanged over the real-time channel.
///
/// `personality` is only ever set on `assistant` envelopes; the constructors
/// and [`Envelope::decode`] both uphold that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub kind: EnvelopeKind,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Envelope {
    fn stamped(kind: EnvelopeKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            personality: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::stamped(EnvelopeKind::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::stamped(EnvelopeKind::User, content)
    }

    pub fn assistant(content: impl Into<String>, personality: Personality) -> Self {
        Self {
            personality: Some(personality.as_str().to_string()),
            ..Self::stamped(EnvelopeKind::Assistant, content)
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::stamped(EnvelopeKind::Tool, content)
    }

    pub fn typing(content: impl Into<String>) -> Self {
        Self::stamped(EnvelopeKind::Typing, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::stamped(EnvelopeKind::Error, content)
    }

    /// Parse one inbound text frame.
    ///
    /// Missing `type` defaults to `user` and missing `content` to empty text.
    /// A `personality` on anything but an `assistant` envelope is dropped.
    pub fn decode(frame: &str) -> Result<Self, ValidationError> {
        let mut envelope: Envelope = serde_json::from_str(frame)
            .map_err(|e| ValidationError::MalformedFrame(e.to_string()))?;
        if envelope.kind != EnvelopeKind::Assistant {
            envelope.personality = None;
        }
        Ok(envelope)
    }

    /// Serialize for a text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_command(&self) -> bool {
        self.kind == EnvelopeKind::User && self.content.starts_with('/')
    }
}
