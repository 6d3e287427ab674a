//! Error types for rag-console

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Transport failure talking to the backend
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Well-formed reply that reports `status: "error"` (or carries an `error` field)
    #[error("{message}")]
    Server { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Push channel error: {0}")]
    Push(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("No reindex confirmation is pending")]
    NoPendingConfirmation,
}

impl ConsoleError {
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
