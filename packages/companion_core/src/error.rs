use std::time::Duration;

use crate::envelope::EnvelopeKind;

/// The real-time channel could not be established, or was lost.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Nothing is listening, or the connection was reset while opening.
    #[error("connection refused: {0}")]
    Refused(String),
    /// TCP connected but the TLS or WebSocket handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// An established channel went away.
    #[error("connection lost")]
    Lost,
}

/// A write was attempted on a channel that cannot accept it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("session for '{user_id}' is not open")]
    NotOpen { user_id: String },
    #[error("outbound queue for '{user_id}' is full")]
    Backpressure { user_id: String },
    #[error("outbound queue for '{user_id}' has no reader")]
    Disconnected { user_id: String },
}

/// An LLM or tool collaborator failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("quota exceeded: {0}")]
    Quota(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Text suitable for an `error` envelope shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::Timeout(_) => {
                "The assistant took too long to answer. Please try again.".to_string()
            }
            ProviderError::Quota(_) => {
                "The assistant is over its usage quota right now. Try again in a moment."
                    .to_string()
            }
            ProviderError::Http { status, message } => {
                format!("The assistant service returned an error ({status}): {message}")
            }
            ProviderError::Malformed(_) => {
                "The assistant sent a reply I could not understand.".to_string()
            }
            ProviderError::Network(_) => {
                "Could not reach the assistant service. Check the network connection.".to_string()
            }
            ProviderError::NotConfigured(what) => format!("Not configured: {what}"),
        }
    }
}

/// User input that cannot be acted on; reported back, state untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown personality '{given}'. Available: {}", .valid.join(", "))]
    UnknownPersonality { given: String, valid: Vec<String> },
    #[error("usage: {usage}")]
    MissingArgument { usage: String },
    #[error("cannot handle '{0}' envelopes from a client")]
    UnsupportedEnvelope(EnvelopeKind),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}
