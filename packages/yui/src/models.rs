use chrono::{DateTime, Utc};
use companion_core::{Personality, Turn};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of `conversation_turns`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StoredTurn {
    pub id: i64,
    pub user_name: String,
    pub personality: String,
    pub user_message: String,
    pub assistant_message: String,
    pub emotion: Option<String>,
    pub created_at: i64,
}

impl StoredTurn {
    /// Unknown personality labels (from older rows or hand edits) read back as the default.
    pub fn into_turn(self) -> Turn {
        Turn {
            user: self.user_message,
            assistant: self.assistant_message,
            personality: self.personality.parse().unwrap_or_default(),
            emotion: self.emotion,
            timestamp: DateTime::<Utc>::from_timestamp(self.created_at, 0).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub user_name: String,
    pub preferences_json: String,
    pub created_at: i64,
    pub last_seen: i64,
}

impl UserProfile {
    pub fn preferences(&self) -> serde_json::Value {
        serde_json::from_str(&self.preferences_json)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatSessionRecord {
    pub id: i64,
    pub session_id: String,
    pub user_name: String,
    pub personality: String,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub message_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub total_turns: i64,
    pub total_sessions: i64,
    pub favorite_personality: Option<Personality>,
    pub first_seen: Option<i64>,
    pub last_seen: Option<i64>,
}
