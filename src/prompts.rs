//! Prompt editor with debounced saves

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Accepted response length in words
pub const RESPONSE_LENGTH_RANGE: RangeInclusive<u32> = 10..=250;
pub const DEFAULT_RESPONSE_LENGTH: u32 = 50;

/// Reply of `GET /api/prompts`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsReply {
    /// category -> name -> content
    pub prompts: BTreeMap<String, BTreeMap<String, String>>,
    /// prompt type -> active content
    pub active: BTreeMap<String, String>,
    pub response_length: Option<u32>,
}

/// Edited prompt waiting to be saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptDraft {
    pub kind: String,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone)]
struct Pending {
    draft: PromptDraft,
    due_at: Instant,
}

#[derive(Debug, Clone)]
pub struct PromptEditor {
    prompts: BTreeMap<String, BTreeMap<String, String>>,
    active: BTreeMap<String, String>,
    response_length: u32,
    pending: Vec<Pending>,
    debounce: Duration,
}

impl PromptEditor {
    pub fn new(debounce: Duration) -> Self {
        Self {
            prompts: BTreeMap::new(),
            active: BTreeMap::new(),
            response_length: DEFAULT_RESPONSE_LENGTH,
            pending: Vec::new(),
            debounce,
        }
    }

    pub fn apply(&mut self, reply: PromptsReply) {
        self.prompts = reply.prompts;
        self.active = reply.active;
        self.response_length = reply
            .response_length
            .map(clamp_length)
            .unwrap_or(DEFAULT_RESPONSE_LENGTH);
    }

    pub fn active(&self, kind: &str) -> Option<&str> {
        self.active.get(kind).map(String::as_str)
    }

    pub fn response_length(&self) -> u32 {
        self.response_length
    }

    /// Store a draft and push its save out to `debounce` after this edit
    pub fn edit(&mut self, kind: &str, name: &str, content: &str) {
        let due_at = Instant::now() + self.debounce;
        self.active.insert(kind.to_string(), content.to_string());

        match self
            .pending
            .iter_mut()
            .find(|p| p.draft.kind == kind && p.draft.name == name)
        {
            Some(pending) => {
                pending.draft.content = content.to_string();
                pending.due_at = due_at;
            }
            None => self.pending.push(Pending {
                draft: PromptDraft {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    content: content.to_string(),
                },
                due_at,
            }),
        }
        debug!(kind = %kind, name = %name, "Prompt save scheduled");
    }

    /// Take the drafts whose quiet period has passed
    pub fn due(&mut self, now: Instant) -> Vec<PromptDraft> {
        let (ready, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| now >= p.due_at);
        self.pending = waiting;
        ready.into_iter().map(|p| p.draft).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Store a new response length, clamped to the accepted range
    pub fn set_response_length(&mut self, words: u32) -> u32 {
        self.response_length = clamp_length(words);
        self.response_length
    }

    /// Lines for the prompts panel
    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![format!("Response length: {} words", self.response_length)];

        for (kind, content) in &self.active {
            let preview: String = content.chars().take(60).collect();
            lines.push(format!("[{}] {}", kind, preview));
        }

        for (category, names) in &self.prompts {
            let names: Vec<_> = names.keys().map(String::as_str).collect();
            lines.push(format!("{}: {}", category, names.join(", ")));
        }
        lines
    }
}

fn clamp_length(words: u32) -> u32 {
    words.clamp(*RESPONSE_LENGTH_RANGE.start(), *RESPONSE_LENGTH_RANGE.end())
}
