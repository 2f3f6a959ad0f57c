//! Error types for the chatbot

use thiserror::Error;

/// Result type alias for chatbot operations
pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {

    // =============================
    // Session Errors
    // =============================

    #[error("Please set GOOGLE_API_KEY in your .env file to start chatting.")]
    MissingCredential,

    #[error("Error initializing conversation: {0}")]
    Initialization(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ChatError {
    /// Whether this error stops the page instead of ending up in the transcript
    pub fn halts_page(&self) -> bool {
        matches!(self, Self::MissingCredential | Self::Initialization(_))
    }
}
