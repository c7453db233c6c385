//! Transport Session
//!
//! Server-side state for one connected user plus the outbound half of its
//! channel. The socket writer owns the matching [`Outbox`] and drains it;
//! everything else talks to the session through [`Session::send`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::TransportError;
use crate::personality::Personality;

/// Default outbox capacity; one inbound message produces at most a handful of envelopes.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

pub struct Session {
    id: String,
    user_id: String,
    opened_at: DateTime<Utc>,
    state: watch::Sender<ConnectionState>,
    personality: RwLock<Personality>,
    message_count: AtomicU64,
    outbox: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Receiving half of a session's outbound queue.
///
/// Yields queued envelopes in send order. Once the session is closed it
/// hands out whatever was already queued and then ends.
pub struct Outbox {
    rx: mpsc::Receiver<Envelope>,
    cancel: CancellationToken,
}

impl Outbox {
    pub async fn next(&mut self) -> Option<Envelope> {
        tokio::select! {
            biased;
            Some(envelope) = self.rx.recv() => Some(envelope),
            _ = self.cancel.cancelled() => self.rx.try_recv().ok(),
        }
    }
}

impl Session {
    /// Create a session in the `connecting` state.
    pub fn connecting(
        user_id: impl Into<String>,
        personality: Personality,
        capacity: usize,
    ) -> (Arc<Session>, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();
        let session = Arc::new(Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            opened_at: Utc::now(),
            state,
            personality: RwLock::new(personality),
            message_count: AtomicU64::new(0),
            outbox: tx,
            cancel: cancel.clone(),
        });
        (session, Outbox { rx, cancel })
    }

    /// Create a session whose channel is already established.
    pub fn open(
        user_id: impl Into<String>,
        personality: Personality,
        capacity: usize,
    ) -> (Arc<Session>, Outbox) {
        let (session, outbox) = Self::connecting(user_id, personality, capacity);
        session.mark_open();
        (session, outbox)
    }

    /// `connecting` → `open`. A closed session stays closed.
    pub fn mark_open(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Open;
                true
            } else {
                false
            }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Queue an envelope for the writer. Never waits.
    pub fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen {
                user_id: self.user_id.clone(),
            });
        }
        self.outbox.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backpressure {
                user_id: self.user_id.clone(),
            },
            mpsc::error::TrySendError::Closed(_) => TransportError::Disconnected {
                user_id: self.user_id.clone(),
            },
        })
    }

    /// Transition to `closed` and release the writer. Returns `false` if the
    /// session was already closed.
    pub fn close(&self) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state != ConnectionState::Closed {
                *state = ConnectionState::Closed;
                true
            } else {
                false
            }
        });
        self.cancel.cancel();
        if changed {
            debug!(user = %self.user_id, session = %self.id, "session closed");
        }
        changed
    }

    /// Resolves once [`Session::close`] has been called.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    pub async fn personality(&self) -> Personality {
        *self.personality.read().await
    }

    pub async fn set_personality(&self, personality: Personality) {
        *self.personality.write().await = personality;
    }

    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::Relaxed)
    }

    /// Count one exchanged chat envelope; returns the new total.
    pub fn record_message(&self) -> u64 {
        self.message_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn reset_messages(&self) {
        self.message_count.store(0, Ordering::Relaxed);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
