//! Collaborator seams: LLM provider, memory store, helper tools.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::personality::Personality;

/// One user message plus the assistant reply it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
    pub personality: Personality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>, personality: Personality) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
            personality,
            emotion: None,
            timestamp: Utc::now(),
        }
    }
}

/// Everything the LLM needs to answer the next message.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub user_name: String,
    /// Oldest first.
    pub history: Vec<Turn>,
    pub message: String,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        context: &ConversationContext,
        personality: Personality,
    ) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn append_turn(&self, user_id: &str, turn: &Turn) -> anyhow::Result<()>;

    async fn clear_history(&self, user_id: &str) -> anyhow::Result<()>;

    /// Stored turns for `user_id`, oldest first.
    async fn fetch_context(&self, user_id: &str) -> anyhow::Result<Vec<Turn>>;
}

/// A helper-API call matched from natural-language intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    pub name: String,
    pub argument: Option<String>,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, argument: Option<String>) -> Self {
        Self {
            name: name.into(),
            argument,
        }
    }
}

#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Intent detection; `None` means no tool applies to this message.
    fn detect(&self, message: &str) -> Option<ToolRequest>;

    async fn invoke(&self, request: &ToolRequest) -> Result<String, ProviderError>;
}

/// Memory store that keeps nothing.
pub struct NoMemory;

#[async_trait]
impl MemoryStore for NoMemory {
    async fn append_turn(&self, _user_id: &str, _turn: &Turn) -> anyhow::Result<()> {
        Ok(())
    }

    async fn clear_history(&self, _user_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn fetch_context(&self, _user_id: &str) -> anyhow::Result<Vec<Turn>> {
        Ok(Vec::new())
    }
}
