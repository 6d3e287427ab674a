//! Indexing progress relay
//!
//! Translates push-channel progress events for the backend's indexing job into
//! the visible progress indicator and per-file status feed, and issues the
//! reindex / update / cancel requests that drive the job.
//!
//! State machine:
//!
//! ```text
//! Idle --(event, fraction < 1)--> Running --(fraction >= 1)--> Completed --(hide delay)--> Idle
//! Running --(cancel accepted)--> Cancelled --(dismiss / new request)--> Idle
//! Running --(reindex_error)--> Failed --(dismiss / new request)--> Idle
//! ```
//!
//! REST failures never move the state machine; they only reach the notice slot.

use crate::api::{FilesReply, IndexApi, ReplyStatus, StatusReply};
use crate::error::{ConsoleError, Result};
use crate::files::FileList;
use crate::notice::NoticeSlot;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Progress of the in-flight indexing job
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Completion in [0, 1]; 1 means done
    pub fraction: f64,
    pub message: String,
    /// Whether the job still accepts a cancel request
    pub cancellable: bool,
    /// Identifies the job run the event belongs to, when the backend sends one
    pub job_id: Option<String>,
}

impl ProgressEvent {
    pub fn new(fraction: f64, message: impl Into<String>, cancellable: bool) -> Self {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };

        Self {
            fraction,
            message: message.into(),
            cancellable,
            job_id: None,
        }
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.fraction >= 1.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Idle,
    Running {
        fraction: f64,
        message: String,
        cancellable: bool,
    },
    Completed,
    Cancelled,
    Failed(String),
}

impl JobState {
    /// A job is in flight (possibly winding down after a cancel)
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Running { .. } | JobState::Cancelled)
    }
}

/// What the progress indicator shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressView {
    pub visible: bool,
    pub width_percent: f64,
    pub text: String,
    pub cancel_visible: bool,
}

/// One line of the per-file status feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLine {
    pub filename: String,
    pub text: String,
}

/// Result of a relay request
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The backend accepted the request
    Done(StatusReply),
    /// The backend wants interactive confirmation before reindexing
    NeedsConfirmation(String),
    /// The request failed; the message has been posted to the notice slot
    Failed(String),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Derive a feed line from a backend progress message, if it names a file
fn feed_line(message: &str) -> Option<FeedLine> {
    if message.contains(": Already indexed") || message.contains(": Not indexed") {
        let (filename, _) = message.rsplit_once(": ")?;
        return Some(FeedLine {
            filename: filename.to_string(),
            text: message.to_string(),
        });
    }

    if let Some((_, rest)) = message.split_once("Completed indexing: ") {
        let (filename, elapsed) = match rest.rsplit_once(" (") {
            Some((name, time)) => (name, time.trim_end_matches(')')),
            None => (rest, ""),
        };
        let text = if elapsed.is_empty() {
            format!("✅ {}", filename)
        } else {
            format!("✅ {} - {}", filename, elapsed)
        };
        return Some(FeedLine {
            filename: filename.to_string(),
            text,
        });
    }

    if let Some(rest) = message.strip_prefix("Indexing ") {
        let filename = rest.trim_end_matches("...").trim();
        if !filename.is_empty() {
            return Some(FeedLine {
                filename: filename.to_string(),
                text: format!("⏳ {}", filename),
            });
        }
    }

    None
}

pub struct IndexingRelay {
    api: Arc<dyn IndexApi>,
    notices: NoticeSlot,
    hide_delay: Duration,
    state: JobState,
    view: ProgressView,
    feed: Vec<FeedLine>,
    job_id: Option<String>,
    hide_at: Option<Instant>,
    pending_confirmation: Option<String>,
}

impl IndexingRelay {
    pub fn new(api: Arc<dyn IndexApi>, notices: NoticeSlot, hide_delay: Duration) -> Self {
        Self {
            api,
            notices,
            hide_delay,
            state: JobState::Idle,
            view: ProgressView::default(),
            feed: Vec::new(),
            job_id: None,
            hide_at: None,
            pending_confirmation: None,
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn view(&self) -> &ProgressView {
        &self.view
    }

    pub fn feed(&self) -> &[FeedLine] {
        &self.feed
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Message of the unconfirmed reindex awaiting the user's answer
    pub fn pending_confirmation(&self) -> Option<&str> {
        self.pending_confirmation.as_deref()
    }

    /// Apply a progress event. Returns false when the event was dropped as
    /// belonging to another (or an already finished) job.
    pub fn on_progress_event(&mut self, event: ProgressEvent) -> bool {
        if let (Some(incoming), Some(current)) = (&event.job_id, &self.job_id) {
            let same = incoming == current;
            let dropped = match self.state {
                _ if self.state.is_active() => !same,
                JobState::Completed => same && !event.is_complete(),
                JobState::Idle => same,
                _ => false,
            };
            if dropped {
                warn!(
                    incoming = %incoming,
                    current = %current,
                    state = ?self.state,
                    "Dropping progress event for another job"
                );
                return false;
            }
        }

        let same_job = event.job_id.is_none() || event.job_id == self.job_id;
        let starts_run = match self.state {
            JobState::Idle | JobState::Failed(_) => true,
            JobState::Completed => !(same_job && event.is_complete()),
            _ => false,
        };

        if starts_run {
            debug!(job = ?event.job_id, "Indexing run started");
            self.feed.clear();
            self.hide_at = None;
            self.job_id = event.job_id.clone();
        } else if self.job_id.is_none() && event.job_id.is_some() {
            self.job_id = event.job_id.clone();
        }

        self.view = ProgressView {
            visible: true,
            width_percent: event.fraction * 100.0,
            text: event.message.clone(),
            cancel_visible: event.cancellable,
        };

        if let Some(line) = feed_line(&event.message) {
            match self.feed.iter_mut().find(|l| l.filename == line.filename) {
                Some(existing) => *existing = line,
                None => self.feed.push(line),
            }
        }

        if event.is_complete() {
            if self.hide_at.is_none() {
                self.hide_at = Some(Instant::now() + self.hide_delay);
            }
            if self.state != JobState::Completed {
                info!(message = %event.message, "Indexing completed");
            }
            self.state = JobState::Completed;
        } else if self.state != JobState::Cancelled {
            self.state = JobState::Running {
                fraction: event.fraction,
                message: event.message,
                cancellable: event.cancellable,
            };
        }

        true
    }

    /// Backend reported that the indexing job failed
    pub fn on_index_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "Indexing job failed");
        self.view = ProgressView {
            visible: true,
            width_percent: self.view.width_percent,
            text: message.clone(),
            cancel_visible: false,
        };
        self.hide_at = None;
        self.state = JobState::Failed(message);
    }

    /// Backend's summary once a reindex has finished
    pub fn on_job_summary(&self, status: ReplyStatus, message: &str) {
        match status {
            ReplyStatus::Error => self.notices.error(message),
            _ => self.notices.success(message),
        }
    }

    /// Drive timers: hide the indicator once the completion delay has passed
    pub fn tick(&mut self, now: Instant) {
        self.notices.expire(now);

        if let Some(at) = self.hide_at {
            if now >= at {
                self.hide_at = None;
                self.view.visible = false;
                self.view.cancel_visible = false;
                if self.state == JobState::Completed {
                    self.state = JobState::Idle;
                }
            }
        }
    }

    /// Leave Failed / Cancelled / Completed and hide the indicator
    pub fn dismiss(&mut self) {
        if !matches!(self.state, JobState::Running { .. }) {
            self.state = JobState::Idle;
            self.view.visible = false;
            self.view.cancel_visible = false;
            self.hide_at = None;
        }
    }

    fn reset_if_settled(&mut self) {
        if matches!(
            self.state,
            JobState::Completed | JobState::Cancelled | JobState::Failed(_)
        ) {
            self.dismiss();
        }
    }

    fn fail(&self, action: &str, err: ConsoleError) -> Outcome {
        warn!(action = %action, error = %err, "Indexing request failed");
        let message = format!("{} failed: {}", action, err);
        self.notices.error(message.clone());
        Outcome::Failed(message)
    }

    fn report(&self, reply: &StatusReply) {
        if reply.message.is_empty() {
            return;
        }
        match reply.status {
            ReplyStatus::Info | ReplyStatus::Unknown => self.notices.info(reply.message.clone()),
            _ => self.notices.success(reply.message.clone()),
        }
    }

    /// Shared handle to the backend, for issuing requests off the UI loop
    pub fn api(&self) -> Arc<dyn IndexApi> {
        self.api.clone()
    }

    /// Prepare for an unconfirmed reindex: settle any finished job and forget an
    /// unanswered confirmation
    pub fn begin_reindex(&mut self) {
        self.reset_if_settled();
        self.pending_confirmation = None;
    }

    /// Apply the reply of an unconfirmed reindex request
    pub fn apply_reindex_reply(&mut self, result: Result<StatusReply>) -> Outcome {
        match result {
            Ok(reply) if reply.status == ReplyStatus::Confirm => {
                info!(message = %reply.message, "Reindex requires confirmation");
                self.pending_confirmation = Some(reply.message.clone());
                Outcome::NeedsConfirmation(reply.message)
            }
            Ok(reply) => {
                self.report(&reply);
                Outcome::Done(reply)
            }
            Err(e) => self.fail("Reindex", e),
        }
    }

    /// Take the pending confirmation so the confirmed request can be sent.
    /// Without one nothing may be sent.
    pub fn take_confirmation(&mut self) -> std::result::Result<String, Outcome> {
        self.pending_confirmation
            .take()
            .ok_or_else(|| self.fail("Reindex", ConsoleError::NoPendingConfirmation))
    }

    /// Apply the reply of a confirmed reindex request. `prompt` is the
    /// confirmation taken before sending it.
    pub fn apply_confirmed_reply(&mut self, prompt: String, result: Result<StatusReply>) -> Outcome {
        match result {
            Ok(reply) => {
                self.report(&reply);
                Outcome::Done(reply)
            }
            Err(e) => {
                // still confirmed by the user; allow a retry
                self.pending_confirmation = Some(prompt);
                self.fail("Reindex", e)
            }
        }
    }

    /// Prepare for an index update
    pub fn begin_update(&mut self) {
        self.reset_if_settled();
    }

    pub fn apply_update_reply(&mut self, result: Result<StatusReply>) -> Outcome {
        match result {
            Ok(reply) => {
                self.report(&reply);
                Outcome::Done(reply)
            }
            Err(e) => self.fail("Index update", e),
        }
    }

    /// Apply the reply of a cancel request. Only an accepted cancel moves a
    /// running job to Cancelled.
    pub fn apply_cancel_reply(&mut self, result: Result<StatusReply>) -> Outcome {
        match result {
            Ok(reply) => {
                if matches!(self.state, JobState::Running { .. }) {
                    self.state = JobState::Cancelled;
                }
                self.report(&reply);
                Outcome::Done(reply)
            }
            Err(e) => self.fail("Cancel", e),
        }
    }

    /// Apply a file list fetch. Returns false on failure.
    pub fn apply_files_reply(&self, files: &mut FileList, result: Result<FilesReply>) -> bool {
        match result {
            Ok(reply) => match files.apply_fetch(reply) {
                Ok(()) => true,
                Err(message) => {
                    self.notices.error(message);
                    false
                }
            },
            Err(e) => {
                self.fail("Loading files", e);
                false
            }
        }
    }

    /// Ask for a full reindex without confirming it. A `confirm` reply must be followed by
    /// [`confirm_reindex_all`](Self::confirm_reindex_all) before anything destructive happens.
    pub async fn request_reindex_all(&mut self) -> Outcome {
        self.begin_reindex();
        let result = self.api.reindex(false).await;
        self.apply_reindex_reply(result)
    }

    /// Re-issue the reindex with `confirmed: true`. Only valid after a `confirm` reply.
    pub async fn confirm_reindex_all(&mut self) -> Outcome {
        let prompt = match self.take_confirmation() {
            Ok(prompt) => prompt,
            Err(outcome) => return outcome,
        };
        let result = self.api.reindex(true).await;
        self.apply_confirmed_reply(prompt, result)
    }

    /// The user declined the destructive reindex
    pub fn decline_reindex(&mut self) {
        if self.pending_confirmation.take().is_some() {
            self.notices.info("Reindex cancelled");
        }
    }

    /// Index only the files missing from the index
    pub async fn request_update_index(&mut self) -> Outcome {
        self.begin_update();
        let result = self.api.update_index().await;
        self.apply_update_reply(result)
    }

    /// Ask the backend to stop the running job. The cancel control stays
    /// visible until a later event reports the job is no longer cancellable.
    pub async fn request_cancel(&mut self) -> Outcome {
        let result = self.api.cancel().await;
        self.apply_cancel_reply(result)
    }

    /// Reload the file list from the backend. Returns false on failure.
    pub async fn refresh_files(&self, files: &mut FileList) -> bool {
        let result = self.api.list_files().await;
        self.apply_files_reply(files, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted backend: pops one reply per call and records what was sent
    #[derive(Default)]
    struct FakeApi {
        replies: Mutex<VecDeque<Result<StatusReply>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn push(&self, reply: Result<StatusReply>) {
            self.replies.lock().unwrap().push_back(reply);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn next(&self, call: String) -> Result<StatusReply> {
            self.calls.lock().unwrap().push(call);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(StatusReply::default()))
        }
    }

    #[async_trait]
    impl IndexApi for FakeApi {
        async fn list_files(&self) -> Result<FilesReply> {
            self.calls.lock().unwrap().push("files".to_string());
            Ok(FilesReply::default())
        }

        async fn reindex(&self, confirmed: bool) -> Result<StatusReply> {
            self.next(format!("reindex confirmed={}", confirmed))
        }

        async fn update_index(&self) -> Result<StatusReply> {
            self.next("update_index".to_string())
        }

        async fn cancel(&self) -> Result<StatusReply> {
            self.next("cancel".to_string())
        }
    }

    fn reply(status: ReplyStatus, message: &str) -> StatusReply {
        StatusReply {
            status,
            message: message.to_string(),
            ..Default::default()
        }
    }

    fn relay() -> (IndexingRelay, Arc<FakeApi>, NoticeSlot) {
        let api = Arc::new(FakeApi::default());
        let notices = NoticeSlot::new(Duration::from_millis(5000));
        let relay = IndexingRelay::new(api.clone(), notices.clone(), Duration::from_millis(2000));
        (relay, api, notices)
    }

    #[tokio::test]
    async fn width_and_text_follow_event() {
        let (mut relay, _, _) = relay();
        for fraction in [0.0, 0.25, 0.5, 0.999] {
            relay.on_progress_event(ProgressEvent::new(fraction, format!("at {}", fraction), true));
            assert_eq!(relay.view().width_percent, fraction * 100.0);
            assert_eq!(relay.view().text, format!("at {}", fraction));
        }
    }

    #[tokio::test]
    async fn half_way_event_shows_cancel() {
        let (mut relay, _, _) = relay();
        relay.on_progress_event(ProgressEvent::new(0.5, "Indexing a.pdf...", true));

        assert_eq!(relay.view().width_percent, 50.0);
        assert!(relay.view().visible);
        assert!(relay.view().cancel_visible);
        assert_eq!(
            relay.state(),
            &JobState::Running {
                fraction: 0.5,
                message: "Indexing a.pdf...".to_string(),
                cancellable: true
            }
        );
        assert_eq!(relay.feed()[0].text, "⏳ a.pdf");
    }

    #[tokio::test]
    async fn same_event_twice_is_idempotent() {
        let (mut relay, _, _) = relay();
        let event = ProgressEvent::new(0.4, "Indexing a.pdf...", true);

        relay.on_progress_event(event.clone());
        let view = relay.view().clone();
        let feed = relay.feed().to_vec();
        let state = relay.state().clone();

        relay.on_progress_event(event);
        assert_eq!(relay.view(), &view);
        assert_eq!(relay.feed(), feed.as_slice());
        assert_eq!(relay.state(), &state);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_hides_after_delay_not_before() {
        let (mut relay, _, _) = relay();
        relay.on_progress_event(ProgressEvent::new(0.5, "Indexing a.pdf...", true));
        relay.on_progress_event(ProgressEvent::new(
            1.0,
            "Completed indexing: a.pdf (1.2s)",
            false,
        ));

        assert_eq!(relay.view().text, "Completed indexing: a.pdf (1.2s)");
        assert!(!relay.view().cancel_visible);
        assert_eq!(relay.feed()[0].text, "✅ a.pdf - 1.2s");
        assert_eq!(relay.state(), &JobState::Completed);

        tokio::time::advance(Duration::from_millis(1999)).await;
        relay.tick(Instant::now());
        assert!(relay.view().visible);

        tokio::time::advance(Duration::from_millis(1)).await;
        relay.tick(Instant::now());
        assert!(!relay.view().visible);
        assert_eq!(relay.state(), &JobState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_completion_does_not_extend_hide_deadline() {
        let (mut relay, _, _) = relay();
        let done = ProgressEvent::new(1.0, "Completed indexing: a.pdf (1.2s)", false);

        relay.on_progress_event(done.clone());
        tokio::time::advance(Duration::from_millis(1500)).await;
        relay.on_progress_event(done);

        tokio::time::advance(Duration::from_millis(500)).await;
        relay.tick(Instant::now());
        assert!(!relay.view().visible);
    }

    #[tokio::test]
    async fn feed_tracks_files_by_name() {
        let (mut relay, _, _) = relay();
        relay.on_progress_event(ProgressEvent::new(0.0, "notes.txt: Already indexed", false));
        relay.on_progress_event(ProgressEvent::new(0.1, "Indexing a.pdf...", true));
        relay.on_progress_event(ProgressEvent::new(0.6, "Completed indexing: a.pdf (0.8s)", true));
        relay.on_progress_event(ProgressEvent::new(0.7, "Working...", true));

        let lines: Vec<_> = relay.feed().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(lines, ["notes.txt: Already indexed", "✅ a.pdf - 0.8s"]);
    }

    #[tokio::test]
    async fn foreign_job_events_are_dropped_while_running() {
        let (mut relay, _, _) = relay();
        assert!(relay.on_progress_event(ProgressEvent::new(0.2, "Indexing a.pdf...", true).with_job("job-1")));
        assert!(!relay.on_progress_event(ProgressEvent::new(0.9, "Indexing z.pdf...", true).with_job("job-2")));

        assert_eq!(relay.view().width_percent, 20.0);
        assert_eq!(relay.job_id(), Some("job-1"));

        // events without an id are still accepted
        assert!(relay.on_progress_event(ProgressEvent::new(0.3, "Indexing b.pdf...", true)));
        assert_eq!(relay.view().width_percent, 30.0);
    }

    #[tokio::test]
    async fn stale_event_after_completion_is_dropped() {
        let (mut relay, _, _) = relay();
        relay.on_progress_event(ProgressEvent::new(1.0, "done", false).with_job("job-1"));
        assert!(!relay.on_progress_event(ProgressEvent::new(0.5, "late", true).with_job("job-1")));
        assert_eq!(relay.view().text, "done");

        // a new job starts a fresh run
        assert!(relay.on_progress_event(ProgressEvent::new(0.1, "Indexing c.pdf...", true).with_job("job-2")));
        assert_eq!(relay.job_id(), Some("job-2"));
        assert_eq!(relay.feed().len(), 1);
    }

    #[tokio::test]
    async fn confirm_reply_blocks_destructive_reindex() {
        let (mut relay, api, _) = relay();
        api.push(Ok(reply(ReplyStatus::Confirm, "Reindex all 3 files?")));

        let outcome = relay.request_reindex_all().await;
        assert!(matches!(outcome, Outcome::NeedsConfirmation(ref m) if m == "Reindex all 3 files?"));
        assert_eq!(api.calls(), ["reindex confirmed=false"]);

        relay.decline_reindex();
        let outcome = relay.confirm_reindex_all().await;
        assert!(outcome.is_failed());
        assert_eq!(api.calls(), ["reindex confirmed=false"]);
    }

    #[tokio::test]
    async fn confirmed_reindex_sends_flag() {
        let (mut relay, api, notices) = relay();
        api.push(Ok(reply(ReplyStatus::Confirm, "Sure?")));
        api.push(Ok(reply(ReplyStatus::Success, "Reindexing started")));

        relay.request_reindex_all().await;
        let outcome = relay.confirm_reindex_all().await;

        assert!(matches!(outcome, Outcome::Done(_)));
        assert_eq!(api.calls(), ["reindex confirmed=false", "reindex confirmed=true"]);
        assert_eq!(notices.current().unwrap().text, "Reindexing started");
        assert!(relay.pending_confirmation().is_none());
    }

    #[tokio::test]
    async fn direct_success_needs_no_confirmation() {
        let (mut relay, api, _) = relay();
        api.push(Ok(reply(ReplyStatus::Success, "Nothing to confirm")));

        assert!(matches!(relay.request_reindex_all().await, Outcome::Done(_)));
        assert!(relay.pending_confirmation().is_none());
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_cancel_leaves_job_untouched() {
        let (mut relay, api, notices) = relay();
        relay.on_progress_event(ProgressEvent::new(0.5, "Indexing a.pdf...", true));
        let before = relay.state().clone();
        api.push(Err(ConsoleError::server("connection reset")));

        let outcome = relay.request_cancel().await;

        assert!(outcome.is_failed());
        assert_eq!(relay.state(), &before);
        assert!(relay.view().cancel_visible);
        assert_eq!(relay.view().width_percent, 50.0);
        assert!(notices.current().unwrap().text.contains("connection reset"));
    }

    #[tokio::test]
    async fn accepted_cancel_keeps_control_until_event_says_otherwise() {
        let (mut relay, api, _) = relay();
        relay.on_progress_event(ProgressEvent::new(0.5, "Indexing a.pdf...", true));
        api.push(Ok(reply(ReplyStatus::Success, "Indexing cancellation started")));

        relay.request_cancel().await;
        assert_eq!(relay.state(), &JobState::Cancelled);
        assert!(relay.view().cancel_visible);

        relay.on_progress_event(ProgressEvent::new(0.6, "Stopping...", false));
        assert_eq!(relay.state(), &JobState::Cancelled);
        assert!(!relay.view().cancel_visible);

        relay.dismiss();
        assert_eq!(relay.state(), &JobState::Idle);
    }

    #[tokio::test]
    async fn index_error_fails_job_until_dismissed() {
        let (mut relay, _, _) = relay();
        relay.on_progress_event(ProgressEvent::new(0.3, "Indexing a.pdf...", true));
        relay.on_index_error("Virhe: disk full");

        assert_eq!(relay.state(), &JobState::Failed("Virhe: disk full".to_string()));
        assert!(!relay.view().cancel_visible);
        assert_eq!(relay.view().text, "Virhe: disk full");

        relay.dismiss();
        assert_eq!(relay.state(), &JobState::Idle);
        assert!(!relay.view().visible);
    }

    #[tokio::test]
    async fn new_request_resets_settled_job() {
        let (mut relay, api, _) = relay();
        relay.on_index_error("boom");
        api.push(Ok(reply(ReplyStatus::Info, "All files already indexed")));

        relay.request_update_index().await;
        assert_eq!(relay.state(), &JobState::Idle);
        assert_eq!(api.calls(), ["update_index"]);
    }

    #[tokio::test]
    async fn failed_update_keeps_running_state() {
        let (mut relay, api, _) = relay();
        relay.on_progress_event(ProgressEvent::new(0.2, "Indexing a.pdf...", true));
        api.push(Err(ConsoleError::server("busy")));

        assert!(relay.request_update_index().await.is_failed());
        assert!(matches!(relay.state(), JobState::Running { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn completion_after_cancel_completes_and_hides() {
        let (mut relay, api, _) = relay();
        relay.on_progress_event(ProgressEvent::new(0.5, "Indexing a.pdf...", true));
        api.push(Ok(reply(ReplyStatus::Success, "Indexing cancellation started")));
        relay.request_cancel().await;
        assert_eq!(relay.state(), &JobState::Cancelled);

        relay.on_progress_event(ProgressEvent::new(1.0, "Indexing stopped", false));
        assert_eq!(relay.state(), &JobState::Completed);
        assert!(!relay.view().cancel_visible);

        tokio::time::advance(Duration::from_millis(2000)).await;
        relay.tick(Instant::now());
        assert_eq!(relay.state(), &JobState::Idle);
        assert!(!relay.view().visible);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_from_idle_shows_then_hides() {
        let (mut relay, _, _) = relay();
        assert!(relay.on_progress_event(ProgressEvent::new(
            1.0,
            "Completed indexing: a.pdf (0.4s)",
            false
        )));

        assert_eq!(relay.state(), &JobState::Completed);
        assert!(relay.view().visible);
        assert_eq!(relay.view().width_percent, 100.0);

        tokio::time::advance(Duration::from_millis(1999)).await;
        relay.tick(Instant::now());
        assert!(relay.view().visible);

        tokio::time::advance(Duration::from_millis(1)).await;
        relay.tick(Instant::now());
        assert!(!relay.view().visible);
        assert_eq!(relay.state(), &JobState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_job_event_is_dropped_once_idle() {
        let (mut relay, _, _) = relay();
        relay.on_progress_event(ProgressEvent::new(1.0, "done", false).with_job("job-1"));
        tokio::time::advance(Duration::from_millis(2000)).await;
        relay.tick(Instant::now());
        assert_eq!(relay.state(), &JobState::Idle);

        assert!(!relay.on_progress_event(ProgressEvent::new(0.7, "late", true).with_job("job-1")));
        assert_eq!(relay.state(), &JobState::Idle);
        assert!(!relay.view().visible);
    }

    #[tokio::test]
    async fn reindex_request_resets_completed_job_first() {
        let (mut relay, api, _) = relay();
        relay.on_progress_event(ProgressEvent::new(1.0, "done", false));
        assert_eq!(relay.state(), &JobState::Completed);
        api.push(Ok(reply(ReplyStatus::Confirm, "Reindex all 3 files?")));

        let outcome = relay.request_reindex_all().await;

        assert!(matches!(outcome, Outcome::NeedsConfirmation(_)));
        assert_eq!(relay.state(), &JobState::Idle);
        assert!(!relay.view().visible);
    }

    #[test]
    fn event_fraction_is_clamped() {
        assert_eq!(ProgressEvent::new(1.7, "", false).fraction, 1.0);
        assert_eq!(ProgressEvent::new(-0.5, "", false).fraction, 0.0);
        assert_eq!(ProgressEvent::new(f64::NAN, "", false).fraction, 0.0);
    }
}
