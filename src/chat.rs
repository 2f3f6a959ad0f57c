//! Chat service
//!
//! Handles the two user events (submit a message, reset the chat) against
//! a session, and builds what the page needs to render.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::conversation::Conversation;
use crate::error::ChatError;
use crate::gemini::ModelProvider;
use crate::memory::ChatMessage;
use crate::session::{Session, SessionStore};
use crate::Result;

pub const RESET_NOTICE: &str = "Chat history cleared! Starting fresh conversation.";

/// Outcome of one submitted message
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub user: ChatMessage,
    pub assistant: ChatMessage,
    /// The assistant entry carries an upstream error instead of a reply
    pub failed: bool,
}

/// Everything the page shows for a session
#[derive(Debug, Serialize)]
pub struct PageView {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
    pub notice: Option<String>,
    /// Set when the page must stop before the chat input
    pub halt: Option<String>,
    pub missing_credential: bool,
}

pub struct ChatService {
    config: ChatConfig,
    provider: Arc<dyn ModelProvider>,
    sessions: SessionStore,
}

impl ChatService {
    pub fn new(config: ChatConfig, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            config,
            provider,
            sessions: SessionStore::new(),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Resolve a session id from the client, creating a session if needed
    pub async fn open_session(&self, id: Option<Uuid>) -> (Uuid, bool) {
        let (id, _, created) = self.sessions.get_or_create(id).await;
        (id, created)
    }

    /// Build the conversation if the session has none yet
    fn ensure_conversation(&self, session: &mut Session) -> Result<()> {
        let api_key = self.config.api_key.as_deref().ok_or(ChatError::MissingCredential)?;

        if session.conversation.is_none() {
            let model = self.provider.build(api_key).map_err(|e| match e {
                ChatError::MissingCredential => ChatError::MissingCredential,
                ChatError::Initialization(msg) => ChatError::Initialization(msg),
                other => ChatError::Initialization(other.to_string()),
            })?;
            session.conversation = Some(Conversation::new(model));
            info!(session_id = %session.id, "Conversation initialized");
        }

        Ok(())
    }

    /// Submit one message.
    ///
    /// Returns `Ok(None)` for a blank prompt. Upstream failures become an
    /// `Error: ...` assistant entry; only missing credentials and failed
    /// initialization are returned as errors.
    pub async fn submit(&self, session_id: Uuid, prompt: &str) -> Result<Option<Turn>> {
        let handle = self.sessions.get_or_insert(session_id).await;
        let mut session = handle.lock().await;

        self.ensure_conversation(&mut session)?;

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Ok(None);
        }

        let user = ChatMessage::user(prompt);
        session.messages.push(user.clone());

        let conversation = match session.conversation.clone() {
            Some(conversation) => conversation,
            None => return Err(ChatError::Initialization("conversation missing".to_string())),
        };

        let (content, failed) = match conversation.predict(&mut session.memory, prompt).await {
            Ok(reply) => (reply, false),
            Err(e) => {
                warn!(session_id = %session.id, "Model call failed: {}", e);
                (format!("Error: {}", e), true)
            }
        };

        let assistant = ChatMessage::assistant(content);
        session.messages.push(assistant.clone());

        Ok(Some(Turn {
            user,
            assistant,
            failed,
        }))
    }

    /// Clear the transcript and start a fresh memory
    pub async fn reset(&self, session_id: Uuid) {
        let handle = self.sessions.get_or_insert(session_id).await;
        let mut session = handle.lock().await;
        session.reset();
        session.notice = Some(RESET_NOTICE.to_string());
        info!(session_id = %session.id, "Chat history cleared");
    }

    /// Snapshot of the displayed messages
    pub async fn transcript(&self, session_id: Uuid) -> Vec<ChatMessage> {
        match self.sessions.get(session_id).await {
            Some(handle) => handle.lock().await.messages.clone(),
            None => Vec::new(),
        }
    }

    /// Return and clear the one-shot notice
    pub async fn take_notice(&self, session_id: Uuid) -> Option<String> {
        let handle = self.sessions.get(session_id).await?;
        let mut session = handle.lock().await;
        session.notice.take()
    }

    /// Gather the page state, initializing the conversation like a page load does
    pub async fn page(&self, session_id: Uuid) -> PageView {
        let handle = self.sessions.get_or_insert(session_id).await;
        let mut session = handle.lock().await;

        let halt = self.ensure_conversation(&mut session).err();

        PageView {
            session_id,
            messages: session.messages.clone(),
            notice: session.notice.take(),
            missing_credential: matches!(halt, Some(ChatError::MissingCredential)),
            halt: halt.map(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::ChatModel;
    use crate::memory::MessageRole;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("echo: {}", last))
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn generate(&self, _messages: &[ChatMessage]) -> Result<String> {
            Err(ChatError::Upstream("503 Service Unavailable".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingProvider {
        builds: AtomicUsize,
        failing_model: bool,
        broken: bool,
    }

    impl ModelProvider for CountingProvider {
        fn build(&self, _api_key: &str) -> Result<Arc<dyn ChatModel>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(ChatError::Config("invalid model".to_string()));
            }
            if self.failing_model {
                Ok(Arc::new(FailingModel))
            } else {
                Ok(Arc::new(EchoModel))
            }
        }
    }

    fn service(api_key: Option<&str>, provider: Arc<CountingProvider>) -> ChatService {
        let config = ChatConfig {
            api_key: api_key.map(str::to_string),
            ..ChatConfig::default()
        };
        ChatService::new(config, provider)
    }

    #[tokio::test]
    async fn test_missing_credential_never_builds_client() {
        let provider = Arc::new(CountingProvider::default());
        let chat = service(None, provider.clone());
        let (id, _) = chat.open_session(None).await;

        let err = chat.submit(id, "hello").await.unwrap_err();
        assert!(matches!(err, ChatError::MissingCredential));
        assert_eq!(provider.builds.load(Ordering::SeqCst), 0);
        assert!(chat.transcript(id).await.is_empty());

        let page = chat.page(id).await;
        assert!(page.missing_credential);
        assert!(page.halt.is_some());
    }

    #[tokio::test]
    async fn test_transcript_alternates_in_order() {
        let provider = Arc::new(CountingProvider::default());
        let chat = service(Some("key"), provider.clone());
        let (id, _) = chat.open_session(None).await;

        for i in 0..3 {
            let turn = chat.submit(id, &format!("message {}", i)).await.unwrap().unwrap();
            assert!(!turn.failed);
        }

        let transcript = chat.transcript(id).await;
        assert_eq!(transcript.len(), 6);
        for (i, pair) in transcript.chunks(2).enumerate() {
            assert_eq!(pair[0].role, MessageRole::User);
            assert_eq!(pair[0].content, format!("message {}", i));
            assert_eq!(pair[1].role, MessageRole::Assistant);
            assert_eq!(pair[1].content, format!("echo: message {}", i));
        }
        assert_eq!(provider.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_to_new_id_keeps_that_id() {
        let chat = service(Some("key"), Arc::new(CountingProvider::default()));
        let id = Uuid::new_v4();

        for _ in 0..3 {
            assert!(chat.submit(id, "ping").await.unwrap().is_some());
        }

        assert_eq!(chat.transcript(id).await.len(), 6);
        assert_eq!(chat.sessions().len().await, 1);

        let other = Uuid::new_v4();
        chat.reset(other).await;
        assert_eq!(chat.page(other).await.session_id, other);
        assert_eq!(chat.sessions().len().await, 2);
    }

    #[tokio::test]
    async fn test_blank_prompt_is_ignored() {
        let chat = service(Some("key"), Arc::new(CountingProvider::default()));
        let (id, _) = chat.open_session(None).await;

        assert!(chat.submit(id, "   ").await.unwrap().is_none());
        assert!(chat.transcript(id).await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_discards_memory_and_conversation() {
        let provider = Arc::new(CountingProvider::default());
        let chat = service(Some("key"), provider.clone());
        let (id, _) = chat.open_session(None).await;

        chat.submit(id, "remember me").await.unwrap();
        chat.reset(id).await;

        assert!(chat.transcript(id).await.is_empty());
        {
            let handle = chat.sessions().get(id).await.unwrap();
            let session = handle.lock().await;
            assert!(session.memory.is_empty());
            assert!(session.conversation.is_none());
        }
        assert_eq!(chat.take_notice(id).await.as_deref(), Some(RESET_NOTICE));
        assert!(chat.take_notice(id).await.is_none());

        chat.submit(id, "fresh").await.unwrap();
        assert_eq!(provider.builds.load(Ordering::SeqCst), 2);
        assert_eq!(chat.transcript(id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_becomes_error_entry() {
        let provider = Arc::new(CountingProvider {
            failing_model: true,
            ..CountingProvider::default()
        });
        let chat = service(Some("key"), provider);
        let (id, _) = chat.open_session(None).await;

        let turn = chat.submit(id, "hello").await.unwrap().unwrap();
        assert!(turn.failed);

        let transcript = chat.transcript(id).await;
        assert_eq!(transcript.len(), 2);
        let errors: Vec<_> = transcript
            .iter()
            .filter(|m| m.role == MessageRole::Assistant && m.content.starts_with("Error:"))
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].content, "Error: 503 Service Unavailable");

        // Session keeps working
        chat.submit(id, "still there?").await.unwrap();
        assert_eq!(chat.transcript(id).await.len(), 4);
    }

    #[tokio::test]
    async fn test_initialization_failure_halts_page() {
        let provider = Arc::new(CountingProvider {
            broken: true,
            ..CountingProvider::default()
        });
        let chat = service(Some("key"), provider);
        let (id, _) = chat.open_session(None).await;

        let err = chat.submit(id, "hello").await.unwrap_err();
        assert!(err.halts_page());
        assert!(err.to_string().starts_with("Error initializing conversation:"));
        assert!(chat.transcript(id).await.is_empty());

        let page = chat.page(id).await;
        assert!(!page.missing_credential);
        assert!(page.halt.unwrap().contains("invalid model"));
    }
}
