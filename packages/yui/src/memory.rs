//! SQLite-backed [`MemoryStore`].

use async_trait::async_trait;
use companion_core::{MemoryStore, Turn};
use tracing::debug;

use crate::emotion;
use crate::repository::MemoryRepository;

pub struct SqliteMemory {
    repository: MemoryRepository,
    /// Turns handed back by `fetch_context`.
    history_limit: i64,
}

impl SqliteMemory {
    pub fn new(repository: MemoryRepository, history_limit: usize) -> Self {
        Self {
            repository,
            history_limit: history_limit.max(1) as i64,
        }
    }
}

#[async_trait]
impl MemoryStore for SqliteMemory {
    async fn append_turn(&self, user_id: &str, turn: &Turn) -> anyhow::Result<()> {
        let mut turn = turn.clone();
        if turn.emotion.is_none() {
            turn.emotion = Some(emotion::analyze(&turn.user).emotion.to_string());
        }
        let id = self.repository.insert_turn(user_id, &turn).await?;
        debug!(user = user_id, turn_id = id, emotion = ?turn.emotion, "stored turn");
        Ok(())
    }

    async fn clear_history(&self, user_id: &str) -> anyhow::Result<()> {
        let removed = self.repository.clear_turns(user_id).await?;
        debug!(user = user_id, removed, "cleared history");
        Ok(())
    }

    async fn fetch_context(&self, user_id: &str) -> anyhow::Result<Vec<Turn>> {
        let rows = self
            .repository
            .recent_turns(user_id, self.history_limit)
            .await?;
        Ok(rows.into_iter().map(|row| row.into_turn()).collect())
    }
}
