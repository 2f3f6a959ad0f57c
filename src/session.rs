//! Session state
//!
//! Explicit session-keyed store for per-browser chat state.
//! Everything lives in memory and is lost on restart.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::conversation::Conversation;
use crate::memory::{ChatMessage, ConversationBuffer};

/// One browser's chat state
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Displayed transcript
    pub messages: Vec<ChatMessage>,
    /// History replayed to the model
    pub memory: ConversationBuffer,
    /// Built lazily on the first message after start or reset
    pub conversation: Option<Conversation>,
    /// Shown once on the next page render
    pub notice: Option<String>,
}

impl Session {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            messages: Vec::new(),
            memory: ConversationBuffer::new(),
            conversation: None,
            notice: None,
        }
    }

    /// Drop transcript, memory and conversation together
    pub fn reset(&mut self) {
        self.messages.clear();
        self.memory = ConversationBuffer::new();
        self.conversation = None;
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// In-memory session store
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(&id).cloned()
    }

    /// Look up `id`, or start a fresh session when it is absent or unknown.
    ///
    /// Returns the handle and whether a new session was created.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, SessionHandle, bool) {
        if let Some(id) = id {
            if let Some(handle) = self.get(id).await {
                return (id, handle, false);
            }
        }

        let id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(Session::new(id)));
        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(id, handle.clone());
        }

        info!(session_id = %id, "Session created");
        (id, handle, true)
    }

    /// Look up `id`, creating the session under that same id when absent
    pub async fn get_or_insert(&self, id: Uuid) -> SessionHandle {
        if let Some(handle) = self.get(id).await {
            return handle;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id)
            .or_insert_with(|| {
                info!(session_id = %id, "Session created");
                Arc::new(Mutex::new(Session::new(id)))
            })
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
