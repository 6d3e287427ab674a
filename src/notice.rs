//! Shared transient message slot
//!
//! Every component reports failures and confirmations through one slot that
//! clears itself after a fixed lifetime.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub level: NoticeLevel,
    pub expires_at: Instant,
}

/// Cloneable handle to the single notice slot
#[derive(Debug, Clone)]
pub struct NoticeSlot {
    inner: Arc<Mutex<Option<Notice>>>,
    ttl: Duration,
}

impl NoticeSlot {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            ttl,
        }
    }

    /// Replace the current notice
    pub fn show(&self, text: impl Into<String>, level: NoticeLevel) {
        let notice = Notice {
            text: text.into(),
            level,
            expires_at: Instant::now() + self.ttl,
        };
        *self.lock() = Some(notice);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.show(text, NoticeLevel::Info);
    }

    pub fn success(&self, text: impl Into<String>) {
        self.show(text, NoticeLevel::Success);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.show(text, NoticeLevel::Error);
    }

    /// Drop the notice once its lifetime has passed
    pub fn expire(&self, now: Instant) {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|n| now >= n.expires_at) {
            *slot = None;
        }
    }

    pub fn current(&self) -> Option<Notice> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Notice>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
