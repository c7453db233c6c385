use anyhow::{Context, Result};
use companion_core::Turn;

use crate::models::StoredTurn;

use super::MemoryRepository;

impl MemoryRepository {
    pub async fn insert_turn(&self, user_name: &str, turn: &Turn) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO conversation_turns
                (user_name, personality, user_message, assistant_message, emotion, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_name)
        .bind(turn.personality.as_str())
        .bind(&turn.user)
        .bind(&turn.assistant)
        .bind(&turn.emotion)
        .bind(turn.timestamp.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert conversation turn")?;

        Ok(result.last_insert_rowid())
    }

    /// The `limit` most recent turns for a user, returned oldest first.
    pub async fn recent_turns(&self, user_name: &str, limit: i64) -> Result<Vec<StoredTurn>> {
        let mut rows: Vec<StoredTurn> = sqlx::query_as(
            r#"
            SELECT id, user_name, personality, user_message, assistant_message, emotion, created_at
            FROM conversation_turns
            WHERE user_name = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load conversation turns")?;

        rows.reverse();
        Ok(rows)
    }

    /// Permanently delete a user's turns. Returns how many were removed.
    pub async fn clear_turns(&self, user_name: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM conversation_turns WHERE user_name = ?")
            .bind(user_name)
            .execute(&self.pool)
            .await
            .context("Failed to clear conversation turns")?;

        Ok(result.rows_affected())
    }

    #[cfg(test)]
    pub async fn count_turns(&self, user_name: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM conversation_turns WHERE user_name = ?")
                .bind(user_name)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers;
    use companion_core::{Personality, Turn};

    fn turn(user: &str, assistant: &str) -> Turn {
        Turn::new(user, assistant, Personality::Yui)
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let repo = test_helpers::test_repository().await;
        let mut t = Turn::new("hello", "hi there", Personality::Jarvis);
        t.emotion = Some("joy".into());

        let id = repo.insert_turn("alice", &t).await.unwrap();
        assert!(id > 0);

        let rows = repo.recent_turns("alice", 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        let back = rows[0].clone().into_turn();
        assert_eq!(back.user, "hello");
        assert_eq!(back.assistant, "hi there");
        assert_eq!(back.personality, Personality::Jarvis);
        assert_eq!(back.emotion.as_deref(), Some("joy"));
        assert_eq!(back.timestamp.timestamp(), t.timestamp.timestamp());
    }

    #[tokio::test]
    async fn recent_turns_are_limited_and_oldest_first() {
        let repo = test_helpers::test_repository().await;
        for i in 0..5 {
            repo.insert_turn("alice", &turn(&format!("q{i}"), &format!("a{i}")))
                .await
                .unwrap();
        }

        let rows = repo.recent_turns("alice", 3).await.unwrap();
        let users: Vec<&str> = rows.iter().map(|r| r.user_message.as_str()).collect();
        assert_eq!(users, vec!["q2", "q3", "q4"]);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let repo = test_helpers::test_repository().await;
        repo.insert_turn("alice", &turn("a", "1")).await.unwrap();
        repo.insert_turn("bob", &turn("b", "2")).await.unwrap();

        assert_eq!(repo.count_turns("alice").await.unwrap(), 1);
        assert_eq!(repo.recent_turns("bob", 10).await.unwrap()[0].user_message, "b");
    }

    #[tokio::test]
    async fn clear_removes_only_that_user() {
        let repo = test_helpers::test_repository().await;
        repo.insert_turn("alice", &turn("a", "1")).await.unwrap();
        repo.insert_turn("alice", &turn("a2", "2")).await.unwrap();
        repo.insert_turn("bob", &turn("b", "3")).await.unwrap();

        assert_eq!(repo.clear_turns("alice").await.unwrap(), 2);
        assert_eq!(repo.count_turns("alice").await.unwrap(), 0);
        assert_eq!(repo.count_turns("bob").await.unwrap(), 1);
        assert_eq!(repo.clear_turns("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_personality_reads_as_default() {
        let repo = test_helpers::test_repository().await;
        sqlx::query(
            "INSERT INTO conversation_turns (user_name, personality, user_message, assistant_message) VALUES ('alice', 'hal', 'q', 'a')",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let rows = repo.recent_turns("alice", 1).await.unwrap();
        assert_eq!(rows[0].clone().into_turn().personality, Personality::Yui);
    }
}
