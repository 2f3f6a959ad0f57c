//! Gemini Chatbot
//!
//! A minimal web chat that:
//! - Forwards each message, with the running history, to Google Gemini
//! - Keeps a per-session transcript and conversation memory in memory
//! - Shows upstream failures in the transcript instead of failing the session
//! - Resets transcript and memory together on request
//!
//! FLOW:
//! INPUT → TRANSCRIPT → PREDICT (preamble + memory + input) → TRANSCRIPT

pub mod api;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gemini;
pub mod memory;
pub mod page;
pub mod session;

pub use error::Result;

// Re-export common types
pub use chat::{ChatService, PageView, Turn};
pub use config::{ChatConfig, ModelSettings};
pub use error::ChatError;
pub use gemini::{ChatModel, GeminiClient, GeminiProvider, ModelProvider};
pub use memory::{ChatMessage, ConversationBuffer, MessageRole};
