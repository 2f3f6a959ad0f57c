//! Conversation chain
//!
//! Couples a model client with a session's conversation buffer. Every
//! prediction replays the whole buffer and, on success, records the new
//! exchange in it.

use std::sync::Arc;
use tracing::debug;

use crate::gemini::ChatModel;
use crate::memory::{ChatMessage, ConversationBuffer};

/// System preamble sent ahead of the history on every request
pub const CONVERSATION_PREAMBLE: &str = "The following is a friendly conversation \
between a human and an AI. The AI is talkative and provides lots of specific details \
from its context. If the AI does not know the answer to a question, it truthfully says \
it does not know.";

#[derive(Clone)]
pub struct Conversation {
    model: Arc<dyn ChatModel>,
}

impl Conversation {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Messages sent to the model for `input`
    pub fn prompt_messages(memory: &ConversationBuffer, input: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(memory.len() + 2);
        messages.push(ChatMessage::system(CONVERSATION_PREAMBLE));
        messages.extend(memory.messages().cloned());
        messages.push(ChatMessage::user(input));
        messages
    }

    /// Ask the model for a reply. `memory` only changes on success.
    pub async fn predict(
        &self,
        memory: &mut ConversationBuffer,
        input: &str,
    ) -> crate::Result<String> {
        let messages = Self::prompt_messages(memory, input);
        debug!(history = memory.len(), "Predicting with conversation memory");

        let reply = self.model.generate(&messages).await?;
        memory.save_context(input, &reply);

        Ok(reply)
    }
}
