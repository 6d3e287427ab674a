//! Model selector state

use serde::{Deserialize, Serialize};

/// A model offered by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub button_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            button_name: None,
            display_name: None,
        }
    }

    /// Short label for the selector
    pub fn label(&self) -> &str {
        self.button_name
            .as_deref()
            .or(self.display_name.as_deref())
            .unwrap_or(&self.name)
    }
}

/// Reply of `GET /api/models`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsReply {
    pub models: Vec<ModelInfo>,
    pub current: Option<ModelInfo>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    models: Vec<ModelInfo>,
    current: Option<String>,
    default_model: String,
}

impl ModelSelector {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            models: Vec::new(),
            current: None,
            default_model: default_model.into(),
        }
    }

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.iter().any(|m| m.name == name)
    }

    /// Apply a models fetch. Without a reported current model the configured
    /// default is used when the backend offers it.
    pub fn apply(&mut self, reply: ModelsReply) {
        self.models = reply.models;
        self.current = match reply.current {
            Some(current) => Some(current.name),
            None if self.contains(&self.default_model) => Some(self.default_model.clone()),
            None => self.current.take().filter(|c| self.contains(c)),
        };
    }

    /// Record a successful switch
    pub fn select(&mut self, name: &str) {
        self.current = Some(name.to_string());
    }

    /// Rendered rows, the current model marked
    pub fn render(&self) -> Vec<String> {
        self.models
            .iter()
            .map(|m| {
                let marker = if self.current.as_deref() == Some(m.name.as_str()) {
                    "●"
                } else {
                    "○"
                };
                format!("{} {} ({})", marker, m.label(), m.name)
            })
            .collect()
    }
}
