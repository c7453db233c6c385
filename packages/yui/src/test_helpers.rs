use async_trait::async_trait;
use companion_core::{
    ConversationContext, ConversationRouter, LlmProvider, Personality, ProviderError,
    RouterConfig, SessionRegistry,
};
use std::sync::Arc;

use crate::AppState;
use crate::config::ChatFileConfig;
use crate::db::Database;
use crate::memory::SqliteMemory;
use crate::metrics::ServerMetrics;
use crate::repository::MemoryRepository;

/// Replies with "<personality>: <message>".
pub struct EchoLlm;

#[async_trait]
impl LlmProvider for EchoLlm {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(
        &self,
        context: &ConversationContext,
        personality: Personality,
    ) -> Result<String, ProviderError> {
        Ok(format!("{personality}: {}", context.message))
    }
}

/// Echoes like [`EchoLlm`], but holds any message equal to `"hold"` until
/// [`GatedLlm::open`] is called.
pub struct GatedLlm {
    gate: tokio::sync::Notify,
}

impl GatedLlm {
    pub fn new() -> Self {
        Self {
            gate: tokio::sync::Notify::new(),
        }
    }

    pub fn open(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl LlmProvider for GatedLlm {
    fn name(&self) -> &str {
        "gated"
    }

    async fn complete(
        &self,
        context: &ConversationContext,
        personality: Personality,
    ) -> Result<String, ProviderError> {
        if context.message == "hold" {
            self.gate.notified().await;
        }
        Ok(format!("{personality}: {}", context.message))
    }
}

/// Build a fully-wired `AppState` backed by an in-memory SQLite database.
pub async fn test_app_state(llm: Arc<dyn LlmProvider>) -> AppState {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    crate::db::run_migrations(&pool).await.expect("migrations");

    let db = Arc::new(Database { pool: pool.clone() });
    let repository = Arc::new(MemoryRepository::new(pool));
    let chat = ChatFileConfig::default();
    let memory = Arc::new(SqliteMemory::new(
        repository.as_ref().clone(),
        chat.max_history_turns,
    ));
    let router = ConversationRouter::new(llm, memory, RouterConfig::default());

    AppState {
        chat: Arc::new(chat),
        db,
        repository,
        registry: Arc::new(SessionRegistry::new()),
        router: Arc::new(router),
        metrics: Arc::new(ServerMetrics::new()),
    }
}
