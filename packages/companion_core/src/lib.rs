//! # Companion Core
//!
//! Session protocol and conversation routing for the Yui companion.
//!
//! This crate has no HTTP or database dependencies. It provides:
//! - The JSON [`Envelope`] exchanged over the real-time channel
//! - [`Session`] state with a bounded, non-blocking outbox
//! - The [`ConversationRouter`] that turns user envelopes into replies
//! - A [`SessionRegistry`] mapping user identifiers to live sessions
//! - Collaborator traits for the LLM, memory and helper tools
//! - A cancellable fixed-delay [`Reconnector`] for clients
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use companion_core::{
//!     ConversationRouter, Envelope, NoMemory, Personality, RouterConfig, Session,
//! };
//! # use companion_core::{ConversationContext, LlmProvider, ProviderError};
//! # struct Echo;
//! # #[async_trait::async_trait]
//! # impl LlmProvider for Echo {
//! #     fn name(&self) -> &str { "echo" }
//! #     async fn complete(&self, c: &ConversationContext, _: Personality) -> Result<String, ProviderError> {
//! #         Ok(c.message.clone())
//! #     }
//! # }
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = ConversationRouter::new(Arc::new(Echo), Arc::new(NoMemory), RouterConfig::default());
//!     let (session, mut outbox) = Session::open("alice", Personality::Yui, 64);
//!
//!     router.route(&session, Envelope::user("hello")).await.unwrap();
//!     session.close();
//!     while let Some(envelope) = outbox.next().await {
//!         println!("{}", envelope.encode().unwrap());
//!     }
//! }
//! ```

pub mod collab;
pub mod command;
pub mod envelope;
pub mod error;
pub mod personality;
pub mod reconnect;
pub mod registry;
pub mod router;
pub mod session;

pub use collab::{
    ConversationContext, LlmProvider, MemoryStore, NoMemory, ToolProvider, ToolRequest, Turn,
};
pub use command::{Command, HELP_TEXT};
pub use envelope::{Envelope, EnvelopeKind};
pub use error::{ConnectionError, ProviderError, TransportError, ValidationError};
pub use personality::Personality;
pub use reconnect::{ReconnectOutcome, Reconnector};
pub use registry::SessionRegistry;
pub use router::{ConversationRouter, RouterConfig};
pub use session::{ConnectionState, DEFAULT_OUTBOX_CAPACITY, Outbox, Session};
