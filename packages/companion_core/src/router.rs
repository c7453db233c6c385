//! Conversation Router
//!
//! Turns one inbound `user` envelope into zero or more outbound envelopes.
//! Callers must route a session's envelopes one at a time; the router itself
//! holds no per-session state beyond what lives on [`Session`].

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::collab::{ConversationContext, LlmProvider, MemoryStore, ToolProvider, Turn};
use crate::command::{Command, HELP_TEXT};
use crate::envelope::{Envelope, EnvelopeKind};
use crate::error::{ProviderError, TransportError, ValidationError};
use crate::personality::Personality;
use crate::session::Session;

pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

pub struct ConversationRouter {
    llm: Arc<dyn LlmProvider>,
    memory: Arc<dyn MemoryStore>,
    tools: Option<Arc<dyn ToolProvider>>,
    config: RouterConfig,
}

impl ConversationRouter {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        memory: Arc<dyn MemoryStore>,
        config: RouterConfig,
    ) -> Self {
        Self {
            llm,
            memory,
            tools: None,
            config,
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolProvider>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.llm.name()
    }

    /// Handle one inbound envelope.
    ///
    /// Every recoverable failure becomes exactly one `error` envelope. The
    /// only error returned is a [`TransportError`], meaning the session can
    /// no longer be written to.
    pub async fn route(&self, session: &Session, envelope: Envelope) -> Result<(), TransportError> {
        if envelope.kind != EnvelopeKind::User {
            let err = ValidationError::UnsupportedEnvelope(envelope.kind);
            warn!(user = %session.user_id(), "{}", err);
            return session.send(Envelope::error(err.to_string()));
        }

        let content = envelope.content.trim();
        if content.is_empty() {
            return Ok(());
        }

        match Command::parse(content) {
            Command::Chat => self.chat(session, content).await,
            Command::Switch(target) => self.switch(session, &target).await,
            Command::Clear => self.clear(session).await,
            Command::Info => self.info(session).await,
            Command::Help => session.send(Envelope::system(HELP_TEXT)),
            Command::Quit => {
                session.send(Envelope::system("Goodbye! 👋"))?;
                info!(user = %session.user_id(), "session quit by user");
                session.close();
                Ok(())
            }
        }
    }

    async fn chat(&self, session: &Session, message: &str) -> Result<(), TransportError> {
        session.record_message();
        let personality = session.personality().await;
        session.send(Envelope::typing(format!(
            "{} is thinking...",
            personality.display_name()
        )))?;

        let request = self.tools.as_ref().and_then(|tools| {
            tools.detect(message).map(|request| (tools.clone(), request))
        });
        if let Some((tools, request)) = request {
            debug!(user = %session.user_id(), tool = %request.name, "tool intent detected");
            let outcome = tokio::select! {
                result = tokio::time::timeout(self.config.tool_timeout, tools.invoke(&request)) => {
                    result.unwrap_or(Err(ProviderError::Timeout(self.config.tool_timeout)))
                }
                _ = session.closed() => return Ok(()),
            };
            match outcome {
                Ok(text) => session.send(Envelope::tool(text))?,
                // The LLM still answers the message, so the user is not left without a reply.
                Err(e) => warn!(user = %session.user_id(), tool = %request.name, error = %e, "tool invocation failed"),
            }
        }

        let fetched = tokio::select! {
            result = self.memory.fetch_context(session.user_id()) => result,
            _ = session.closed() => return Ok(()),
        };
        let history = match fetched {
            Ok(turns) => turns,
            Err(e) => {
                warn!(user = %session.user_id(), error = %e, "failed to load conversation context");
                Vec::new()
            }
        };
        let context = ConversationContext {
            user_name: session.user_id().to_string(),
            history,
            message: message.to_string(),
        };

        let outcome = tokio::select! {
            result = tokio::time::timeout(self.config.llm_timeout, self.llm.complete(&context, personality)) => {
                result.unwrap_or(Err(ProviderError::Timeout(self.config.llm_timeout)))
            }
            _ = session.closed() => {
                debug!(user = %session.user_id(), "session closed during completion, reply discarded");
                return Ok(());
            }
        };

        match outcome {
            Ok(reply) => {
                session.send(Envelope::assistant(reply.clone(), personality))?;
                session.record_message();
                let turn = Turn::new(message, reply, personality);
                if let Err(e) = self.memory.append_turn(session.user_id(), &turn).await {
                    warn!(user = %session.user_id(), error = %e, "failed to store turn");
                }
                Ok(())
            }
            Err(e) => {
                warn!(user = %session.user_id(), provider = %self.llm.name(), error = %e, "completion failed");
                session.send(Envelope::error(e.user_message()))
            }
        }
    }

    async fn switch(&self, session: &Session, target: &str) -> Result<(), TransportError> {
        if target.is_empty() {
            let err = ValidationError::MissingArgument {
                usage: format!(
                    "/switch <personality> (available: {})",
                    Personality::names().join(", ")
                ),
            };
            return session.send(Envelope::error(err.to_string()));
        }

        match target.parse::<Personality>() {
            Ok(personality) => {
                session.set_personality(personality).await;
                info!(user = %session.user_id(), personality = %personality, "personality switched");
                session.send(Envelope::system(format!(
                    "✨ Switched to {} personality ({})",
                    personality.display_name(),
                    personality.as_str()
                )))
            }
            Err(err) => session.send(Envelope::error(err.to_string())),
        }
    }

    async fn clear(&self, session: &Session) -> Result<(), TransportError> {
        session.reset_messages();
        match self.memory.clear_history(session.user_id()).await {
            Ok(()) => {
                info!(user = %session.user_id(), "conversation history cleared");
                session.send(Envelope::system("🗑️ Conversation history cleared"))
            }
            Err(e) => {
                warn!(user = %session.user_id(), error = %e, "failed to clear stored history");
                session.send(Envelope::error(
                    "Message count was reset, but stored history could not be cleared.",
                ))
            }
        }
    }

    async fn info(&self, session: &Session) -> Result<(), TransportError> {
        let personality = session.personality().await;
        let summary = format!(
            "Conversation with {}\nPersonality: {} - {}\nTotal messages: {}\nUser: {}\nStarted: {}",
            personality.display_name(),
            personality.as_str(),
            personality.description(),
            session.message_count(),
            session.user_id(),
            session.opened_at().format("%Y-%m-%d %H:%M:%S UTC"),
        );
        session.send(Envelope::system(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ConnectionState, Outbox};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubLlm {
        reply: Result<String, ProviderError>,
        delay: Option<Duration>,
        seen: Mutex<Vec<ConversationContext>>,
    }

    impl StubLlm {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: ProviderError) -> Self {
            Self {
                reply: Err(err),
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn slow(text: &str, delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::replying(text)
            }
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            context: &ConversationContext,
            _personality: Personality,
        ) -> Result<String, ProviderError> {
            self.seen.lock().unwrap().push(context.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone()
        }
    }

    /// Echoes the message back so ordering is observable.
    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            context: &ConversationContext,
            _personality: Personality,
        ) -> Result<String, ProviderError> {
            if context.message.contains("fail") {
                return Err(ProviderError::Quota("limit".into()));
            }
            Ok(format!("echo: {}", context.message))
        }
    }

    #[derive(Default)]
    struct RecordingMemory {
        turns: Mutex<HashMap<String, Vec<Turn>>>,
        fail_clear: AtomicBool,
    }

    #[async_trait]
    impl MemoryStore for RecordingMemory {
        async fn append_turn(&self, user_id: &str, turn: &Turn) -> anyhow::Result<()> {
            self.turns
                .lock()
                .unwrap()
                .entry(user_id.to_string())
                .or_default()
                .push(turn.clone());
            Ok(())
        }

        async fn clear_history(&self, user_id: &str) -> anyhow::Result<()> {
            if self.fail_clear.load(Ordering::Relaxed) {
                anyhow::bail!("disk on fire");
            }
            self.turns.lock().unwrap().remove(user_id);
            Ok(())
        }

        async fn fetch_context(&self, user_id: &str) -> anyhow::Result<Vec<Turn>> {
            Ok(self
                .turns
                .lock()
                .unwrap()
                .get(user_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    struct StubTools {
        result: Result<String, ProviderError>,
    }

    #[async_trait]
    impl ToolProvider for StubTools {
        fn detect(&self, message: &str) -> Option<crate::collab::ToolRequest> {
            message
                .contains("joke")
                .then(|| crate::collab::ToolRequest::new("joke", None))
        }

        async fn invoke(
            &self,
            _request: &crate::collab::ToolRequest,
        ) -> Result<String, ProviderError> {
            self.result.clone()
        }
    }

    fn router_with(llm: Arc<dyn LlmProvider>) -> (ConversationRouter, Arc<RecordingMemory>) {
        let memory = Arc::new(RecordingMemory::default());
        let router = ConversationRouter::new(llm, memory.clone(), RouterConfig::default());
        (router, memory)
    }

    fn open_session() -> (Arc<Session>, Outbox) {
        Session::open("alice", Personality::Yui, 64)
    }

    /// Close the session and collect everything it emitted.
    async fn drain(session: &Session, outbox: &mut Outbox) -> Vec<Envelope> {
        session.close();
        let mut out = Vec::new();
        while let Some(env) = outbox.next().await {
            out.push(env);
        }
        out
    }

    fn kinds(envelopes: &[Envelope]) -> Vec<EnvelopeKind> {
        envelopes.iter().map(|e| e.kind).collect()
    }

    #[tokio::test]
    async fn chat_emits_typing_then_assistant() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("hi there")));
        let (session, mut outbox) = open_session();

        router.route(&session, Envelope::user("hello")).await.unwrap();

        let out = drain(&session, &mut outbox).await;
        assert_eq!(kinds(&out), vec![EnvelopeKind::Typing, EnvelopeKind::Assistant]);
        assert_eq!(out[1].content, "hi there");
        assert_eq!(out[1].personality.as_deref(), Some("yui"));
        assert_eq!(session.message_count(), 2);
    }

    #[tokio::test]
    async fn switch_to_valid_personality() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("unused")));
        let (session, mut outbox) = open_session();

        router
            .route(&session, Envelope::user("/switch friday"))
            .await
            .unwrap();

        assert_eq!(session.personality().await, Personality::Friday);
        let out = drain(&session, &mut outbox).await;
        assert_eq!(kinds(&out), vec![EnvelopeKind::System]);
        assert!(out[0].content.contains("friday"));
    }

    #[tokio::test]
    async fn switch_is_idempotent() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("unused")));
        let (session, mut outbox) = open_session();

        router.route(&session, Envelope::user("/switch yui")).await.unwrap();
        router.route(&session, Envelope::user("/switch YUI")).await.unwrap();

        assert_eq!(session.personality().await, Personality::Yui);
        let out = drain(&session, &mut outbox).await;
        assert_eq!(kinds(&out), vec![EnvelopeKind::System, EnvelopeKind::System]);
    }

    #[tokio::test]
    async fn switch_to_unknown_personality_is_rejected() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("unused")));
        let (session, mut outbox) = open_session();
        session.set_personality(Personality::Jarvis).await;

        router
            .route(&session, Envelope::user("/switch ultron"))
            .await
            .unwrap();
        router.route(&session, Envelope::user("/switch")).await.unwrap();

        assert_eq!(session.personality().await, Personality::Jarvis);
        let out = drain(&session, &mut outbox).await;
        assert_eq!(kinds(&out), vec![EnvelopeKind::Error, EnvelopeKind::Error]);
        assert!(out[0].content.contains("yui, friday, jarvis"));
        assert!(out[1].content.contains("/switch <personality>"));
    }

    #[tokio::test]
    async fn assistant_carries_switched_personality() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("Indeed.")));
        let (session, mut outbox) = open_session();

        router
            .route(&session, Envelope::user("/switch jarvis"))
            .await
            .unwrap();
        router.route(&session, Envelope::user("tea?")).await.unwrap();

        let out = drain(&session, &mut outbox).await;
        assert_eq!(out[1].content, "Jarvis is thinking...");
        assert_eq!(out[2].personality.as_deref(), Some("jarvis"));
    }

    #[tokio::test]
    async fn clear_resets_count_and_memory() {
        let (router, memory) = router_with(Arc::new(StubLlm::replying("ok")));
        let (session, mut outbox) = open_session();

        router.route(&session, Envelope::user("remember me")).await.unwrap();
        assert_eq!(memory.fetch_context("alice").await.unwrap().len(), 1);

        router.route(&session, Envelope::user("/clear")).await.unwrap();

        assert_eq!(session.message_count(), 0);
        assert!(memory.fetch_context("alice").await.unwrap().is_empty());
        let out = drain(&session, &mut outbox).await;
        assert_eq!(out.last().unwrap().kind, EnvelopeKind::System);
        assert!(!out.iter().any(|e| e.kind == EnvelopeKind::Error));
    }

    #[tokio::test]
    async fn clear_reports_memory_failure_once() {
        let (router, memory) = router_with(Arc::new(StubLlm::replying("ok")));
        memory.fail_clear.store(true, Ordering::Relaxed);
        let (session, mut outbox) = open_session();
        session.record_message();

        router.route(&session, Envelope::user("/clear")).await.unwrap();

        assert_eq!(session.message_count(), 0);
        let out = drain(&session, &mut outbox).await;
        assert_eq!(kinds(&out), vec![EnvelopeKind::Error]);
    }

    #[tokio::test]
    async fn info_summarizes_without_mutating() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("ok")));
        let (session, mut outbox) = open_session();
        router.route(&session, Envelope::user("hi")).await.unwrap();

        router.route(&session, Envelope::user("/info")).await.unwrap();

        assert_eq!(session.message_count(), 2);
        assert_eq!(session.personality().await, Personality::Yui);
        let out = drain(&session, &mut outbox).await;
        let info = out.last().unwrap();
        assert_eq!(info.kind, EnvelopeKind::System);
        assert!(info.content.contains("Total messages: 2"));
        assert!(info.content.contains("Personality: yui"));
        assert!(info.content.contains("User: alice"));
    }

    #[tokio::test]
    async fn help_lists_commands() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("ok")));
        let (session, mut outbox) = open_session();

        router.route(&session, Envelope::user("/help")).await.unwrap();

        let out = drain(&session, &mut outbox).await;
        assert_eq!(out.len(), 1);
        for cmd in ["/clear", "/switch", "/info", "/help", "/quit"] {
            assert!(out[0].content.contains(cmd), "help missing {cmd}");
        }
    }

    #[tokio::test]
    async fn quit_says_goodbye_then_closes() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("ok")));
        let (session, mut outbox) = open_session();

        router.route(&session, Envelope::user("/quit")).await.unwrap();

        assert_eq!(session.state(), ConnectionState::Closed);
        let out = drain(&session, &mut outbox).await;
        assert_eq!(kinds(&out), vec![EnvelopeKind::System]);
        assert!(out[0].content.contains("Goodbye"));

        // Nothing more can be routed to a closed session.
        assert!(router.route(&session, Envelope::user("/help")).await.is_err());
    }

    #[tokio::test]
    async fn unknown_command_is_routed_as_chat() {
        let llm = Arc::new(StubLlm::replying("what's that?"));
        let (router, _) = router_with(llm.clone());
        let (session, mut outbox) = open_session();

        router
            .route(&session, Envelope::user("/unknowncmd"))
            .await
            .unwrap();

        let out = drain(&session, &mut outbox).await;
        assert_eq!(kinds(&out), vec![EnvelopeKind::Typing, EnvelopeKind::Assistant]);
        assert_eq!(llm.seen.lock().unwrap()[0].message, "/unknowncmd");
    }

    #[tokio::test(start_paused = true)]
    async fn provider_timeout_yields_single_error() {
        let (router, memory) = router_with(Arc::new(StubLlm::slow("too late", Duration::from_secs(60))));
        let (session, mut outbox) = open_session();

        router.route(&session, Envelope::user("hello")).await.unwrap();

        let out = drain(&session, &mut outbox).await;
        assert_eq!(kinds(&out), vec![EnvelopeKind::Typing, EnvelopeKind::Error]);
        assert!(out[1].content.contains("too long"));
        assert!(memory.fetch_context("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_yields_single_error_and_session_stays_usable() {
        let (router, _) = router_with(Arc::new(StubLlm::failing(ProviderError::Http {
            status: 500,
            message: "boom".into(),
        })));
        let (session, mut outbox) = open_session();

        router.route(&session, Envelope::user("hello")).await.unwrap();
        assert!(session.is_open());
        router.route(&session, Envelope::user("/help")).await.unwrap();

        let out = drain(&session, &mut outbox).await;
        assert_eq!(
            kinds(&out),
            vec![EnvelopeKind::Typing, EnvelopeKind::Error, EnvelopeKind::System]
        );
        assert!(out[1].content.contains("500"));
    }

    #[tokio::test]
    async fn replies_follow_input_order() {
        let (router, _) = router_with(Arc::new(EchoLlm));
        let (session, mut outbox) = open_session();

        for msg in ["one", "two fail", "three"] {
            router.route(&session, Envelope::user(msg)).await.unwrap();
        }

        let out: Vec<Envelope> = drain(&session, &mut outbox)
            .await
            .into_iter()
            .filter(|e| matches!(e.kind, EnvelopeKind::Assistant | EnvelopeKind::Error))
            .collect();
        assert_eq!(kinds(&out), vec![
            EnvelopeKind::Assistant,
            EnvelopeKind::Error,
            EnvelopeKind::Assistant
        ]);
        assert_eq!(out[0].content, "echo: one");
        assert_eq!(out[2].content, "echo: three");
    }

    #[tokio::test]
    async fn previous_turns_reach_the_provider() {
        let llm = Arc::new(StubLlm::replying("noted"));
        let (router, _) = router_with(llm.clone());
        let (session, _outbox) = open_session();

        router.route(&session, Envelope::user("my cat is Miso")).await.unwrap();
        router.route(&session, Envelope::user("what's her name?")).await.unwrap();

        let seen = llm.seen.lock().unwrap();
        assert!(seen[0].history.is_empty());
        assert_eq!(seen[1].history.len(), 1);
        assert_eq!(seen[1].history[0].user, "my cat is Miso");
        assert_eq!(seen[1].user_name, "alice");
    }

    #[tokio::test]
    async fn matched_tool_result_precedes_reply() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("ha!")));
        let router = router.with_tools(Arc::new(StubTools {
            result: Ok("😄 Why did the crab never share?".into()),
        }));
        let (session, mut outbox) = open_session();

        router
            .route(&session, Envelope::user("tell me a joke"))
            .await
            .unwrap();

        let out = drain(&session, &mut outbox).await;
        assert_eq!(kinds(&out), vec![
            EnvelopeKind::Typing,
            EnvelopeKind::Tool,
            EnvelopeKind::Assistant
        ]);
    }

    #[tokio::test]
    async fn failed_tool_still_gets_a_reply() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("no jokes today")));
        let router = router.with_tools(Arc::new(StubTools {
            result: Err(ProviderError::Network("offline".into())),
        }));
        let (session, mut outbox) = open_session();

        router
            .route(&session, Envelope::user("tell me a joke"))
            .await
            .unwrap();

        let out = drain(&session, &mut outbox).await;
        assert_eq!(kinds(&out), vec![EnvelopeKind::Typing, EnvelopeKind::Assistant]);
    }

    #[tokio::test]
    async fn non_user_envelope_is_rejected() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("ok")));
        let (session, mut outbox) = open_session();

        router
            .route(&session, Envelope::assistant("spoof", Personality::Yui))
            .await
            .unwrap();

        let out = drain(&session, &mut outbox).await;
        assert_eq!(kinds(&out), vec![EnvelopeKind::Error]);
    }

    #[tokio::test]
    async fn blank_message_is_ignored() {
        let (router, _) = router_with(Arc::new(StubLlm::replying("ok")));
        let (session, mut outbox) = open_session();

        router.route(&session, Envelope::user("   ")).await.unwrap();

        assert!(drain(&session, &mut outbox).await.is_empty());
        assert_eq!(session.message_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_mid_completion_discards_reply() {
        let (router, memory) = router_with(Arc::new(StubLlm::slow("late", Duration::from_secs(10))));
        let router = Arc::new(router);
        let (session, mut outbox) = open_session();

        let task = {
            let router = router.clone();
            let session = session.clone();
            tokio::spawn(async move { router.route(&session, Envelope::user("hello")).await })
        };

        // Typing goes out before the provider is awaited.
        assert_eq!(outbox.next().await.unwrap().kind, EnvelopeKind::Typing);
        session.close();
        task.await.unwrap().unwrap();

        assert!(outbox.next().await.is_none());
        assert!(memory.fetch_context("alice").await.unwrap().is_empty());
    }

    /// Memory that never answers `fetch_context`.
    struct StalledMemory;

    #[async_trait]
    impl MemoryStore for StalledMemory {
        async fn append_turn(&self, _user_id: &str, _turn: &Turn) -> anyhow::Result<()> {
            Ok(())
        }

        async fn clear_history(&self, _user_id: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn fetch_context(&self, _user_id: &str) -> anyhow::Result<Vec<Turn>> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn closing_while_loading_context_skips_the_provider() {
        let llm = Arc::new(StubLlm::replying("never"));
        let router = Arc::new(ConversationRouter::new(
            llm.clone(),
            Arc::new(StalledMemory),
            RouterConfig::default(),
        ));
        let (session, mut outbox) = open_session();

        let task = {
            let router = router.clone();
            let session = session.clone();
            tokio::spawn(async move { router.route(&session, Envelope::user("hello")).await })
        };

        assert_eq!(outbox.next().await.unwrap().kind, EnvelopeKind::Typing);
        session.close();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("route should return once the session closes")
            .unwrap()
            .unwrap();

        assert!(outbox.next().await.is_none());
        assert!(llm.seen.lock().unwrap().is_empty());
    }
}
