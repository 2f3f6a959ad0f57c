//! Conversation buffer storage
//!
//! Stores exchanged messages in order, with timestamps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

/// A single message, used both for the transcript and for memory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

/// Append-only log of prior turns, replayed on every model request.
///
/// Nothing is ever summarized, trimmed or evicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationBuffer {
    created_at: DateTime<Utc>,
    messages: Vec<ChatMessage>,
}

impl ConversationBuffer {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    /// Record one completed exchange
    pub fn save_context(&mut self, input: &str, output: &str) {
        self.messages.push(ChatMessage::user(input));
        self.messages.push(ChatMessage::assistant(output));
    }

    /// Iterate over all messages in insertion order
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Render the buffer as `Human:` / `AI:` lines
    pub fn buffer_string(&self) -> String {
        self.messages
            .iter()
            .map(|msg| {
                let prefix = match msg.role {
                    MessageRole::User => "Human",
                    MessageRole::Assistant => "AI",
                    MessageRole::System => "System",
                };
                format!("{}: {}", prefix, msg.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ConversationBuffer {
    fn default() -> Self {
        Self::new()
    }
}
