use anyhow::Result;
use sqlx::Row;

use crate::models::{StoredTurn, UserStats};

use super::MemoryRepository;

impl MemoryRepository {
    /// Case-insensitive keyword match over both sides of a user's turns, newest first.
    pub async fn search_turns(
        &self,
        user_name: &str,
        query: &str,
        limit: i64,
    ) -> Result<Vec<StoredTurn>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }
        let pattern = format!("%{}%", Self::escape_like(query));

        let rows = sqlx::query_as(
            r#"
            SELECT id, user_name, personality, user_message, assistant_message, emotion, created_at
            FROM conversation_turns
            WHERE user_name = ?
              AND (user_message LIKE ? ESCAPE '\' OR assistant_message LIKE ? ESCAPE '\')
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_name)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn user_stats(&self, user_name: &str) -> Result<UserStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM conversation_turns WHERE user_name = ?1) as total_turns,
                (SELECT COUNT(*) FROM chat_sessions WHERE user_name = ?1) as total_sessions,
                (SELECT personality FROM conversation_turns WHERE user_name = ?1
                    GROUP BY personality ORDER BY COUNT(*) DESC, MAX(id) DESC LIMIT 1) as favorite,
                (SELECT created_at FROM user_profiles WHERE user_name = ?1) as first_seen,
                (SELECT last_seen FROM user_profiles WHERE user_name = ?1) as last_seen
            "#,
        )
        .bind(user_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserStats {
            total_turns: row.try_get::<i64, _>("total_turns").unwrap_or(0),
            total_sessions: row.try_get::<i64, _>("total_sessions").unwrap_or(0),
            favorite_personality: row
                .try_get::<Option<String>, _>("favorite")
                .ok()
                .flatten()
                .and_then(|p| p.parse().ok()),
            first_seen: row.try_get::<Option<i64>, _>("first_seen").ok().flatten(),
            last_seen: row.try_get::<Option<i64>, _>("last_seen").ok().flatten(),
        })
    }

    fn escape_like(query: &str) -> String {
        let mut escaped = String::with_capacity(query.len());
        for c in query.chars() {
            if matches!(c, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }
}
