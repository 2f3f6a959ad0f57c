//! Conversation memory
//!
//! A plain running log of prior turns, supplied as context to each new
//! model request

pub mod store;

pub use store::{ChatMessage, ConversationBuffer, MessageRole};
