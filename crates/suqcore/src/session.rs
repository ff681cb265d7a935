//! Per-chat ordering-flow state.
//!
//! Sessions are ephemeral by design: they live in process memory and a
//! restart dropping in-flight conversations is acceptable. The store is a
//! keyed abstraction so it could be backed by a distributed cache without
//! touching callers; writes are last-write-wins overwrites, never merges.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// The current step of a chat's ordering flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Browsing,
    ViewingProduct,
    AwaitingPhone,
}

/// Ephemeral record of where one chat is in the ordering flow.
///
/// `created_at` doubles as a generation token: handlers that captured a
/// session re-read the store and compare `created_at` before acting, so a
/// session replaced mid-flight is never acted on.
#[derive(Debug, Clone)]
pub struct Session {
    pub chat_id: i64,
    pub product_id: Option<i64>,
    pub phase: Phase,
    /// Messages created during this phase, deleted on the next transition.
    pub tracked_message_ids: Vec<i32>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(chat_id: i64, phase: Phase, product_id: Option<i64>) -> Self {
        Self {
            chat_id,
            product_id,
            phase,
            tracked_message_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach the message ids emitted while entering this phase.
    pub fn with_messages(mut self, message_ids: Vec<i32>) -> Self {
        self.tracked_message_ids = message_ids;
        self
    }

    /// Whether this session is older than `max_age`. Stale sessions are
    /// not evicted anywhere; handlers just refuse to act on them.
    pub fn is_stale(&self, max_age: chrono::Duration) -> bool {
        Utc::now() - self.created_at > max_age
    }
}

/// Keyed session storage: at most one session per chat identity.
pub trait SessionStore: Send + Sync {
    fn get(&self, chat_id: i64) -> Option<Session>;
    /// Overwrite whatever was stored for this chat (last write wins).
    fn set(&self, session: Session);
    fn clear(&self, chat_id: i64);
}

/// Process-local session store over a concurrent map.
#[derive(Default)]
pub struct InMemorySessionStore {
    map: DashMap<i64, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, chat_id: i64) -> Option<Session> {
        self.map.get(&chat_id).map(|s| s.value().clone())
    }

    fn set(&self, session: Session) {
        self.map.insert(session.chat_id, session);
    }

    fn clear(&self, chat_id: i64) {
        self.map.remove(&chat_id);
    }
}
