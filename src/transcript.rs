//! Chat transcript
//!
//! Messages are kept in arrival order. A single in-place "progress" message can be
//! updated repeatedly (upload / indexing status) until it is finished.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single message in the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Error,
}

/// A piece of rendered message text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Plain(String),
    Bold(String),
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Split the content into lines of spans. Assistant replies get `**bold**`
    /// markup; other roles render verbatim.
    pub fn render_lines(&self) -> Vec<Vec<Span>> {
        self.content
            .lines()
            .map(|line| {
                if self.role == MessageRole::Assistant {
                    bold_spans(line)
                } else {
                    vec![Span::Plain(line.to_string())]
                }
            })
            .collect()
    }
}

/// Parse `**bold**` markers. An unmatched marker is kept as text.
fn bold_spans(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = line;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if start > 0 {
            spans.push(Span::Plain(rest[..start].to_string()));
        }
        spans.push(Span::Bold(after[..end].to_string()));
        rest = &after[end + 2..];
    }

    if !rest.is_empty() || spans.is_empty() {
        spans.push(Span::Plain(rest.to_string()));
    }
    spans
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    /// Message currently reused for progress updates
    progress: Option<Uuid>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn append(&mut self, role: MessageRole, content: impl Into<String>) -> Uuid {
        let message = ChatMessage::new(role, content);
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Update the in-place progress message, creating it on first use
    pub fn set_progress(&mut self, text: impl Into<String>) {
        let text = text.into();
        if let Some(id) = self.progress {
            if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
                message.content = text;
                message.timestamp = Utc::now();
                return;
            }
        }
        self.progress = Some(self.append(MessageRole::System, text));
    }

    /// Detach the progress message; the next update starts a new one
    pub fn finish_progress(&mut self) {
        self.progress = None;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.progress = None;
    }
}
