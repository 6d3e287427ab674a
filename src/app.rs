//! Application state for rag-console

use crate::api::{FilesReply, IndexApi, RagClient, ReplyStatus, StatusReply};
use crate::config::Config;
use crate::error::Result;
use crate::files::FileList;
use crate::models::ModelSelector;
use crate::notice::NoticeSlot;
use crate::panels::{Panel, PanelSwitcher};
use crate::prompts::PromptEditor;
use crate::push::PushEvent;
use crate::relay::{IndexingRelay, JobState, Outcome};
use crate::tokens::TokenStats;
use crate::transcript::{MessageRole, Transcript};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Application mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    /// Normal navigation mode
    Normal,
    /// Typing a chat message
    Insert,
    /// Command mode (: prefix)
    Command,
    /// Waiting for y/n on a destructive reindex
    Confirm,
}

/// Reply of a request that ran off the UI loop
#[derive(Debug)]
pub enum TaskResult {
    Reindex(Result<StatusReply>),
    ConfirmedReindex {
        prompt: String,
        result: Result<StatusReply>,
    },
    Update(Result<StatusReply>),
    Cancel(Result<StatusReply>),
    Upload {
        name: String,
        result: Result<StatusReply>,
    },
    Files(Result<FilesReply>),
}

/// Application state
pub struct App {
    client: Arc<RagClient>,
    relay: IndexingRelay,
    notices: NoticeSlot,
    transcript: Transcript,
    files: FileList,
    models: ModelSelector,
    panels: PanelSwitcher,
    prompts: PromptEditor,
    tokens: Option<TokenStats>,
    /// Answer from indexed documents instead of the bare model
    rag_mode: bool,
    mode: Mode,
    input: String,
    command: String,
    scroll_offset: usize,
    /// A chat request is in flight
    sending: bool,
    /// Push channel state
    connected: bool,
    should_quit: bool,
    task_tx: mpsc::UnboundedSender<TaskResult>,
    task_rx: mpsc::UnboundedReceiver<TaskResult>,
    /// Spawned requests whose reply has not been applied yet
    pending_tasks: usize,
}

impl App {
    /// Create a new application
    pub fn new(client: RagClient, config: &Config) -> Self {
        let client = Arc::new(client);
        Self::with_index_api(client.clone(), client, config)
    }

    /// Create an application whose indexing requests go through `index`
    pub fn with_index_api(
        client: Arc<RagClient>,
        index: Arc<dyn IndexApi>,
        config: &Config,
    ) -> Self {
        let notices = NoticeSlot::new(Duration::from_millis(config.relay.notice_ttl_ms));
        let relay = IndexingRelay::new(
            index,
            notices.clone(),
            Duration::from_millis(config.relay.hide_delay_ms),
        );
        let (task_tx, task_rx) = mpsc::unbounded_channel();

        Self {
            client,
            relay,
            notices,
            transcript: Transcript::new(),
            files: FileList::new(),
            models: ModelSelector::new(config.tui.default_model.clone()),
            panels: PanelSwitcher::new(Duration::from_secs(config.tui.token_refresh_secs)),
            prompts: PromptEditor::new(Duration::from_millis(config.prompts.save_debounce_ms)),
            tokens: None,
            rag_mode: config.tui.rag_mode,
            mode: Mode::Normal,
            input: String::new(),
            command: String::new(),
            scroll_offset: 0,
            sending: false,
            connected: false,
            should_quit: false,
            task_tx,
            task_rx,
            pending_tasks: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn command_mut(&mut self) -> &mut String {
        &mut self.command
    }

    pub fn relay(&self) -> &IndexingRelay {
        &self.relay
    }

    pub fn notices(&self) -> &NoticeSlot {
        &self.notices
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn files(&self) -> &FileList {
        &self.files
    }

    pub fn models(&self) -> &ModelSelector {
        &self.models
    }

    pub fn panels(&self) -> &PanelSwitcher {
        &self.panels
    }

    pub fn prompts(&self) -> &PromptEditor {
        &self.prompts
    }

    pub fn tokens(&self) -> Option<&TokenStats> {
        self.tokens.as_ref()
    }

    pub fn rag_mode(&self) -> bool {
        self.rag_mode
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn set_scroll_offset(&mut self, offset: usize) {
        self.scroll_offset = offset;
    }

    pub fn pending_tasks(&self) -> usize {
        self.pending_tasks
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Load the file list and models shown at startup
    pub async fn load_initial(&mut self) {
        self.refresh_files();
        self.refresh_models().await;
    }

    /// Submit the current input as a chat message
    pub async fn submit(&mut self) -> Result<()> {
        if self.input.trim().is_empty() || self.sending {
            return Ok(());
        }

        let message = std::mem::take(&mut self.input);
        info!(rag = self.rag_mode, "Sending chat message");
        self.transcript.append(MessageRole::User, message.clone());

        self.sending = true;
        let result = self.client.chat(&message, self.rag_mode).await;
        self.sending = false;

        match result {
            Ok(reply) => {
                if let Some(error) = reply.error.as_deref().filter(|e| !e.is_empty()) {
                    self.transcript.append(MessageRole::Error, error);
                } else if let Some(content) = reply.content() {
                    self.transcript.append(MessageRole::Assistant, content);
                } else {
                    self.transcript
                        .append(MessageRole::Error, "Received empty response from server");
                }
            }
            Err(e) => {
                warn!(error = %e, "Chat request failed");
                self.transcript
                    .append(MessageRole::Error, format!("Error: {}", e));
            }
        }

        if self.panels.is_open(Panel::Tokens) {
            self.refresh_tokens().await;
        }
        Ok(())
    }

    /// Execute a `:` command
    pub async fn execute_command(&mut self) -> Result<()> {
        let cmd = std::mem::take(&mut self.command);
        let parts: Vec<&str> = cmd.split_whitespace().collect();
        self.mode = Mode::Normal;

        if parts.is_empty() {
            return Ok(());
        }

        match parts[0] {
            "q" | "quit" | "exit" => self.quit(),
            "reindex" => self.reindex_all(),
            "update" => self.update_index(),
            "cancel" => self.request_cancel(),
            "dismiss" => self.dismiss(),
            "upload" => match parts.get(1) {
                Some(_) => {
                    let path = cmd.trim()["upload".len()..].trim().to_string();
                    self.upload(Path::new(&path));
                }
                None => self.notices.error("Usage: upload <path>"),
            },
            "delete" | "rm" => match parts.get(1) {
                Some(name) => self.delete(name).await,
                None => self.notices.error("Usage: delete <filename>"),
            },
            "model" => match parts.get(1) {
                Some(name) => self.select_model(name).await,
                None => {
                    self.toggle_panel(Panel::Models).await;
                }
            },
            "mode" => match parts.get(1).copied() {
                Some("rag") => self.set_rag_mode(true),
                Some("llm") => self.set_rag_mode(false),
                _ => self.notices.error("Usage: mode rag|llm"),
            },
            "prompt" => match (parts.get(1), parts.len() > 2) {
                (Some(kind), true) => {
                    let content = parts[2..].join(" ");
                    self.prompts.edit(kind, "custom", &content);
                    self.notices.info(format!("Saving {} prompt...", kind));
                }
                _ => self.notices.error("Usage: prompt <type> <content>"),
            },
            "length" => match parts.get(1).and_then(|n| n.parse::<u32>().ok()) {
                Some(words) => self.set_response_length(words).await,
                None => self.notices.error("Usage: length <words>"),
            },
            "clear" => {
                self.transcript.clear();
                self.scroll_offset = 0;
            }
            other => match Panel::parse(other) {
                Some(panel) => {
                    self.toggle_panel(panel).await;
                }
                None => self.notices.error(format!("Unknown command: {}", other)),
            },
        }

        Ok(())
    }

    fn set_rag_mode(&mut self, rag: bool) {
        self.rag_mode = rag;
        let label = if rag { "RAG" } else { "LLM" };
        self.notices.info(format!("Chat mode: {}", label));
    }

    /// Open or close a panel, loading its content when opened
    pub async fn toggle_panel(&mut self, panel: Panel) -> bool {
        let opened = self.panels.toggle(panel);
        if opened {
            debug!(%panel, "Panel opened");
            match panel {
                Panel::Files => self.refresh_files(),
                Panel::Models => self.refresh_models().await,
                Panel::Tokens => self.refresh_tokens().await,
                Panel::Prompts => self.refresh_prompts().await,
                Panel::Upload | Panel::System => {}
            }
        }
        opened
    }

    async fn refresh_models(&mut self) {
        match self.client.models().await {
            Ok(reply) => self.models.apply(reply),
            Err(e) => self.notices.error(format!("Loading models failed: {}", e)),
        }
    }

    async fn refresh_tokens(&mut self) {
        match self.client.token_stats().await {
            Ok(stats) => self.tokens = Some(stats),
            Err(e) => self.notices.error(format!("Loading token stats failed: {}", e)),
        }
    }

    async fn refresh_prompts(&mut self) {
        match self.client.prompts().await {
            Ok(reply) => self.prompts.apply(reply),
            Err(e) => self.notices.error(format!("Loading prompts failed: {}", e)),
        }
    }

    /// Switch the backend model
    pub async fn select_model(&mut self, name: &str) {
        match self.client.select_model(name).await {
            Ok(reply) if reply.status == ReplyStatus::Success => {
                self.models.select(name);
                self.transcript
                    .append(MessageRole::System, format!("Model changed to {}", name));
            }
            Ok(_) => {
                self.transcript
                    .append(MessageRole::Error, "Failed to change model");
            }
            Err(e) => {
                self.transcript.append(MessageRole::Error, e.to_string());
            }
        }
    }

    async fn set_response_length(&mut self, words: u32) {
        let words = self.prompts.set_response_length(words);
        match self.client.set_response_length(words).await {
            Ok(_) => self
                .notices
                .success(format!("Response length set to {} words", words)),
            Err(e) => self
                .notices
                .error(format!("Updating response length failed: {}", e)),
        }
    }

    /// Upload and index a document. The reply arrives as [`TaskResult::Upload`].
    pub fn upload(&mut self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        self.transcript.set_progress(format!("Uploading {}...", name));
        let client = self.client.clone();
        let path = path.to_path_buf();
        self.spawn_task(async move {
            let result = client.upload(&path).await;
            TaskResult::Upload { name, result }
        });
    }

    fn finish_upload(&mut self, name: String, result: Result<StatusReply>) {
        self.transcript.finish_progress();

        match result {
            Ok(reply) => {
                self.files.apply_change(&reply, Some(&name));
                let message = if reply.message.is_empty() {
                    format!("Uploaded {}", name)
                } else {
                    reply.message
                };
                self.notices.success(message);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Upload failed");
                self.notices.error(format!("Upload failed: {}", e));
            }
        }
    }

    async fn delete(&mut self, filename: &str) {
        match self.client.delete(filename).await {
            Ok(reply) => {
                self.files.apply_change(&reply, None);
                self.notices.success(reply.message);
            }
            Err(e) => self.notices.error(format!("Delete failed: {}", e)),
        }
    }

    /// Run a request on its own task so the UI loop keeps drawing and
    /// reading keys. The reply is applied by [`drain_tasks`](Self::drain_tasks).
    fn spawn_task<F>(&mut self, request: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let tx = self.task_tx.clone();
        self.pending_tasks += 1;
        tokio::spawn(async move {
            if tx.send(request.await).is_err() {
                debug!("Task finished after the app was dropped");
            }
        });
    }

    /// Apply the replies of finished background requests
    pub fn drain_tasks(&mut self) {
        while let Ok(result) = self.task_rx.try_recv() {
            self.handle_task(result);
        }
    }

    fn handle_task(&mut self, result: TaskResult) {
        self.pending_tasks = self.pending_tasks.saturating_sub(1);

        match result {
            TaskResult::Reindex(result) => match self.relay.apply_reindex_reply(result) {
                Outcome::NeedsConfirmation(_) => self.mode = Mode::Confirm,
                Outcome::Done(reply) => self.after_index_change(&reply),
                Outcome::Failed(_) => {}
            },
            TaskResult::ConfirmedReindex { prompt, result } => {
                if let Outcome::Done(reply) = self.relay.apply_confirmed_reply(prompt, result) {
                    self.after_index_change(&reply);
                }
            }
            TaskResult::Update(result) => {
                if let Outcome::Done(reply) = self.relay.apply_update_reply(result) {
                    self.after_index_change(&reply);
                }
            }
            TaskResult::Cancel(result) => {
                self.relay.apply_cancel_reply(result);
            }
            TaskResult::Upload { name, result } => self.finish_upload(name, result),
            TaskResult::Files(result) => {
                self.relay.apply_files_reply(&mut self.files, result);
            }
        }
    }

    /// Start a full reindex; a confirmation request switches to [`Mode::Confirm`]
    pub fn reindex_all(&mut self) {
        self.relay.begin_reindex();
        let api = self.relay.api();
        self.spawn_task(async move { TaskResult::Reindex(api.reindex(false).await) });
    }

    /// Answer the pending reindex confirmation
    pub fn confirm(&mut self, yes: bool) {
        self.mode = Mode::Normal;
        if !yes {
            self.relay.decline_reindex();
            return;
        }
        if let Ok(prompt) = self.relay.take_confirmation() {
            let api = self.relay.api();
            self.spawn_task(async move {
                let result = api.reindex(true).await;
                TaskResult::ConfirmedReindex { prompt, result }
            });
        }
    }

    pub fn update_index(&mut self) {
        self.relay.begin_update();
        let api = self.relay.api();
        self.spawn_task(async move { TaskResult::Update(api.update_index().await) });
    }

    /// Ask the backend to stop the running job
    pub fn request_cancel(&mut self) {
        let api = self.relay.api();
        self.spawn_task(async move { TaskResult::Cancel(api.cancel().await) });
    }

    /// Hide a settled progress indicator and the current notice
    pub fn dismiss(&mut self) {
        self.relay.dismiss();
        self.notices.clear();
    }

    fn refresh_files(&mut self) {
        let api = self.relay.api();
        self.spawn_task(async move { TaskResult::Files(api.list_files().await) });
    }

    fn after_index_change(&mut self, reply: &StatusReply) {
        if reply.files.is_some() || reply.indexed_files.is_some() {
            self.files.apply_change(reply, None);
        } else {
            self.refresh_files();
        }
    }

    /// Apply an event from the push channel
    pub fn handle_push(&mut self, event: PushEvent) {
        match event {
            PushEvent::Progress(progress) => {
                let was_completed = *self.relay.state() == JobState::Completed;
                self.relay.on_progress_event(progress);
                if !was_completed && *self.relay.state() == JobState::Completed {
                    self.refresh_files();
                }
            }
            PushEvent::IndexError(message) => {
                self.transcript.append(MessageRole::Error, message.clone());
                self.relay.on_index_error(message);
            }
            PushEvent::IndexComplete { status, message } => {
                self.relay.on_job_summary(status, &message);
                self.refresh_files();
            }
            PushEvent::UploadProgress { fraction, message } => {
                self.transcript
                    .set_progress(format!("{} ({:.0}%)", message, fraction * 100.0));
                if fraction >= 1.0 {
                    self.transcript.finish_progress();
                }
            }
            PushEvent::Connected => self.connected = true,
            PushEvent::Disconnected => {
                self.connected = false;
                self.notices.info("Push channel disconnected, reconnecting...");
            }
        }
    }

    /// Drive timers: relay hide delay, notice expiry, debounced prompt
    /// saves and the tokens panel refresh
    pub async fn tick(&mut self, now: Instant) {
        self.relay.tick(now);

        for draft in self.prompts.due(now) {
            match self
                .client
                .update_prompt(&draft.kind, &draft.name, &draft.content)
                .await
            {
                Ok(_) => {
                    self.transcript
                        .append(MessageRole::System, "Prompt updated successfully");
                }
                Err(e) => {
                    self.transcript
                        .append(MessageRole::Error, format!("Error updating prompt: {}", e));
                }
            }
        }

        if self.panels.refresh_due(now) {
            self.refresh_tokens().await;
        }
    }
}
