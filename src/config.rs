//! Configuration management for rag-console

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend connection
    pub server: ServerConfig,
    /// Indexing progress relay timings
    pub relay: RelayConfig,
    /// Prompt editor behaviour
    pub prompts: PromptsConfig,
    /// TUI configuration
    pub tui: TuiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// REST base URL
    pub base_url: String,
    /// Push channel URL (derived from base_url when unset)
    pub push_url: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Delay before the progress indicator hides after completion
    pub hide_delay_ms: u64,
    /// Lifetime of a transient notice
    pub notice_ttl_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Quiet period after the last edit before a prompt is saved
    pub save_debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuiConfig {
    /// Refresh interval for the token usage panel
    pub token_refresh_secs: u64,
    /// Model assumed current when the backend does not report one
    pub default_model: String,
    /// Start chats in RAG mode instead of plain LLM mode
    pub rag_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            push_url: None,
            timeout_secs: 300,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            hide_delay_ms: 2000,
            notice_ttl_ms: 5000,
        }
    }
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 800,
        }
    }
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            token_refresh_secs: 5,
            default_model: "gpt-4o-mini".to_string(),
            rag_mode: false,
        }
    }
}

impl ServerConfig {
    /// Push channel URL, derived from the REST base when not configured.
    ///
    /// `http://host:5000` becomes `ws://host:5000/socket.io/?EIO=4&transport=websocket`.
    pub fn push_url(&self) -> String {
        if let Some(url) = &self.push_url {
            return url.clone();
        }

        let base = self.base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            format!("ws://{}", base)
        };

        format!("{}/socket.io/?EIO=4&transport=websocket", ws_base)
    }
}

impl Config {
    /// Get default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rag-console")
            .join("config.toml")
    }

    /// Directory for log files written while the TUI owns the terminal
    pub fn log_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rag-console")
    }

    /// Load configuration from file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(PathBuf::from).unwrap_or_else(Self::default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = path.map(PathBuf::from).unwrap_or_else(Self::default_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }
}
