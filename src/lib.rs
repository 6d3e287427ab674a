//! rag-console - terminal console for a RAG assistant backend
//!
//! Chat, model and prompt management, document upload and a live view of the
//! backend's indexing job relayed from its push channel.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod files;
pub mod models;
pub mod notice;
pub mod panels;
pub mod prompts;
pub mod push;
pub mod relay;
pub mod tokens;
pub mod transcript;
pub mod tui;

pub use api::{IndexApi, RagClient};
pub use config::Config;
pub use error::{ConsoleError, Result};
pub use relay::{IndexingRelay, JobState, Outcome, ProgressEvent};
