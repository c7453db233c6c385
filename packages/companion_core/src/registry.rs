//! Session Registry
//!
//! Process-wide map from user identifier to the currently active session.
//! One user identifier never has two live sessions: registering a new one
//! closes whatever it replaces.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::envelope::Envelope;
use crate::session::Session;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the session for `user_id`. A replaced session is
    /// closed and returned.
    pub async fn register(&self, user_id: &str, session: Arc<Session>) -> Option<Arc<Session>> {
        let previous = self
            .sessions
            .lock()
            .await
            .insert(user_id.to_string(), session.clone());

        match previous {
            Some(old) if old.id() != session.id() => {
                info!(user = %user_id, old = %old.id(), new = %session.id(), "replacing stale session");
                old.close();
                Some(old)
            }
            _ => {
                debug!(user = %user_id, session = %session.id(), "session registered");
                None
            }
        }
    }

    pub async fn lookup(&self, user_id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(user_id).cloned()
    }

    /// Remove whatever entry exists for `user_id`.
    pub async fn unregister(&self, user_id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().await.remove(user_id)
    }

    /// Remove the entry only if it still refers to `session`, so a closing
    /// session never evicts the one that replaced it.
    pub async fn release(&self, session: &Session) -> bool {
        let mut sessions = self.sessions.lock().await;
        let is_current = sessions
            .get(session.user_id())
            .is_some_and(|current| current.id() == session.id());
        if is_current {
            sessions.remove(session.user_id());
        }
        is_current
    }

    /// Send `envelope` to every open session; returns how many accepted it.
    pub async fn broadcast(&self, envelope: Envelope) -> usize {
        let sessions: Vec<Arc<Session>> = self.sessions.lock().await.values().cloned().collect();
        sessions
            .iter()
            .filter(|s| s.send(envelope.clone()).is_ok())
            .count()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    pub async fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personality::Personality;
    use crate::session::ConnectionState;

    #[tokio::test]
    async fn register_and_lookup() {
        let registry = SessionRegistry::new();
        let (session, _outbox) = Session::open("alice", Personality::Yui, 4);

        assert!(registry.register("alice", session.clone()).await.is_none());
        let found = registry.lookup("alice").await.unwrap();
        assert_eq!(found.id(), session.id());
        assert!(registry.lookup("bob").await.is_none());
    }

    #[tokio::test]
    async fn reconnect_replaces_and_closes_old_session() {
        let registry = SessionRegistry::new();
        let (old, _old_outbox) = Session::open("alice", Personality::Yui, 4);
        let (new, _new_outbox) = Session::open("alice", Personality::Yui, 4);

        registry.register("alice", old.clone()).await;
        let replaced = registry.register("alice", new.clone()).await.unwrap();

        assert_eq!(replaced.id(), old.id());
        assert_eq!(old.state(), ConnectionState::Closed);
        assert!(new.is_open());
        assert_eq!(registry.lookup("alice").await.unwrap().id(), new.id());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn registering_same_session_twice_keeps_it_open() {
        let registry = SessionRegistry::new();
        let (session, _outbox) = Session::open("alice", Personality::Yui, 4);
        registry.register("alice", session.clone()).await;
        assert!(registry.register("alice", session.clone()).await.is_none());
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn stale_release_does_not_evict_replacement() {
        let registry = SessionRegistry::new();
        let (old, _a) = Session::open("alice", Personality::Yui, 4);
        let (new, _b) = Session::open("alice", Personality::Yui, 4);
        registry.register("alice", old.clone()).await;
        registry.register("alice", new.clone()).await;

        assert!(!registry.release(&old).await);
        assert_eq!(registry.lookup("alice").await.unwrap().id(), new.id());

        assert!(registry.release(&new).await);
        assert!(registry.lookup("alice").await.is_none());
    }

    #[tokio::test]
    async fn unregister_removes_entry() {
        let registry = SessionRegistry::new();
        let (session, _outbox) = Session::open("alice", Personality::Yui, 4);
        registry.register("alice", session).await;
        assert!(registry.unregister("alice").await.is_some());
        assert!(registry.unregister("alice").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn broadcast_reaches_only_open_sessions() {
        let registry = SessionRegistry::new();
        let (a, mut a_out) = Session::open("a", Personality::Yui, 4);
        let (b, _b_out) = Session::open("b", Personality::Yui, 4);
        registry.register("a", a).await;
        registry.register("b", b.clone()).await;
        b.close();

        let delivered = registry.broadcast(Envelope::system("maintenance soon")).await;
        assert_eq!(delivered, 1);
        assert_eq!(a_out.next().await.unwrap().content, "maintenance soon");
        assert_eq!(registry.user_ids().await, vec!["a".to_string(), "b".to_string()]);
    }
}
