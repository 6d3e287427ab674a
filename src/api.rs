//! REST client for the RAG assistant backend

use crate::config::Config;
use crate::error::{ConsoleError, Result};
use crate::files::IndexedFile;
use crate::models::ModelsReply;
use crate::prompts::PromptsReply;
use crate::tokens::TokenStats;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tracing::{debug, info};

/// `status` field carried by most backend replies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Success,
    Error,
    Confirm,
    Info,
    NoFiles,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Generic `{status, message}` reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusReply {
    pub status: ReplyStatus,
    pub message: String,
    pub error: Option<String>,
    pub indexed_files: Option<Vec<String>>,
    pub files: Option<Vec<IndexedFile>>,
}

impl StatusReply {
    /// Turn an error-shaped reply into `ConsoleError::Server`
    pub fn into_result(self) -> Result<Self> {
        let failed = self.status == ReplyStatus::Error
            || (self.status == ReplyStatus::Unknown && self.error.is_some());

        if failed {
            let message = self
                .error
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| self.message.clone());
            Err(ConsoleError::server(message))
        } else {
            Ok(self)
        }
    }
}

/// Reply of `GET /api/rag/files`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesReply {
    pub status: ReplyStatus,
    pub files: Vec<IndexedFile>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Reply of `POST /api/chat`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatReply {
    pub answer: Option<String>,
    pub response: Option<String>,
    pub text: Option<String>,
    pub source: Option<String>,
    pub model: Option<String>,
    pub found_in_docs: bool,
    pub error: Option<String>,
}

impl ChatReply {
    /// Answer text, whichever field the backend used for it
    pub fn content(&self) -> Option<&str> {
        [&self.answer, &self.response, &self.text]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
    }
}

/// Backend operations the indexing relay depends on
#[async_trait]
pub trait IndexApi: Send + Sync {
    /// `GET /api/rag/files`
    async fn list_files(&self) -> Result<FilesReply>;

    /// `POST /api/rag/reindex {confirmed}`
    async fn reindex(&self, confirmed: bool) -> Result<StatusReply>;

    /// `POST /api/rag/update_index`
    async fn update_index(&self) -> Result<StatusReply>;

    /// `POST /api/rag/cancel`
    async fn cancel(&self) -> Result<StatusReply>;
}

/// RAG backend API client
pub struct RagClient {
    client: Client,
    base_url: String,
}

impl RagClient {
    /// Create a new API client
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.server.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.server.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode a JSON body. Error statuses still carry JSON on this backend,
    /// so only bodies that fail to parse fall back to the HTTP status.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<T>(&body) {
            Ok(value) => Ok(value),
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => Err(ConsoleError::server(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            ))),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T> {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self.client.post(&url).json(&body).send().await?;
        Self::decode(response).await
    }

    /// Upload a document for indexing (`POST /api/rag/upload`, multipart field `file`)
    pub async fn upload(&self, path: &Path) -> Result<StatusReply> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ConsoleError::Config(format!("Not a file: {}", path.display())))?;
        let bytes = tokio::fs::read(path).await?;
        info!(file = %filename, size = bytes.len(), "Uploading document");

        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename));
        let response = self
            .client
            .post(self.url("/api/rag/upload"))
            .multipart(form)
            .send()
            .await?;

        Self::decode::<StatusReply>(response).await?.into_result()
    }

    /// Remove a document from the index
    pub async fn delete(&self, filename: &str) -> Result<StatusReply> {
        self.post::<StatusReply>("/api/rag/delete", json!({ "filename": filename }))
            .await?
            .into_result()
    }

    /// Send a chat message. `rag_mode` answers from indexed documents.
    pub async fn chat(&self, message: &str, rag_mode: bool) -> Result<ChatReply> {
        self.post("/api/chat", json!({ "message": message, "mode": !rag_mode }))
            .await
    }

    /// Available models and the current one
    pub async fn models(&self) -> Result<ModelsReply> {
        self.get("/api/models").await
    }

    /// Switch the backend model
    pub async fn select_model(&self, model: &str) -> Result<StatusReply> {
        self.post::<StatusReply>("/api/models/select", json!({ "model": model }))
            .await?
            .into_result()
    }

    /// Token usage statistics
    pub async fn token_stats(&self) -> Result<TokenStats> {
        self.get("/api/tokens/stats").await
    }

    /// Active and available prompt templates
    pub async fn prompts(&self) -> Result<PromptsReply> {
        self.get("/api/prompts").await
    }

    /// Save a prompt template
    pub async fn update_prompt(&self, kind: &str, name: &str, content: &str) -> Result<StatusReply> {
        self.post::<StatusReply>(
            "/api/prompts/update",
            json!({ "type": kind, "name": name, "content": content }),
        )
        .await?
        .into_result()
    }

    /// Set the preferred response length in words
    pub async fn set_response_length(&self, words: u32) -> Result<StatusReply> {
        self.post::<StatusReply>("/api/prompts/length", json!({ "response_length": words }))
            .await?
            .into_result()
    }
}

#[async_trait]
impl IndexApi for RagClient {
    async fn list_files(&self) -> Result<FilesReply> {
        self.get("/api/rag/files").await
    }

    async fn reindex(&self, confirmed: bool) -> Result<StatusReply> {
        self.post::<StatusReply>("/api/rag/reindex", json!({ "confirmed": confirmed }))
            .await?
            .into_result()
    }

    async fn update_index(&self) -> Result<StatusReply> {
        self.post::<StatusReply>("/api/rag/update_index", json!({}))
            .await?
            .into_result()
    }

    async fn cancel(&self) -> Result<StatusReply> {
        self.post::<StatusReply>("/api/rag/cancel", json!({}))
            .await?
            .into_result()
    }
}
