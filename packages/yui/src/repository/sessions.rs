use anyhow::{Context, Result};
use chrono::Utc;

use crate::models::ChatSessionRecord;

use super::MemoryRepository;

impl MemoryRepository {
    pub async fn start_session(
        &self,
        session_id: &str,
        user_name: &str,
        personality: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_sessions (session_id, user_name, personality, started_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(user_name)
        .bind(personality)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to record chat session start")?;
        Ok(())
    }

    /// Close a session with its final counters. Ending twice keeps the first end time.
    pub async fn end_session(
        &self,
        session_id: &str,
        personality: &str,
        message_count: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE chat_sessions
            SET ended_at = ?, personality = ?, message_count = ?
            WHERE session_id = ? AND ended_at IS NULL
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(personality)
        .bind(message_count)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .context("Failed to record chat session end")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<ChatSessionRecord>> {
        let record = sqlx::query_as(
            r#"
            SELECT id, session_id, user_name, personality, started_at, ended_at, message_count
            FROM chat_sessions WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}
