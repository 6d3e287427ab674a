//! rag-console - terminal console for a RAG assistant backend

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rag_console::api::{IndexApi, RagClient};
use rag_console::app::App;
use rag_console::config::Config;
use rag_console::files::FileList;
use rag_console::models::ModelSelector;
use rag_console::notice::NoticeSlot;
use rag_console::push::{self, PushEvent};
use rag_console::relay::{IndexingRelay, JobState, Outcome};
use rag_console::tui;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;

#[derive(Parser)]
#[command(name = "rag-console")]
#[command(version, about = "Terminal console for a RAG assistant backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides the config file)
    #[arg(long)]
    server: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive TUI (default)
    Tui,

    /// List indexed files
    Files,

    /// Rebuild the whole index
    Reindex {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Index files missing from the index
    Update,

    /// Cancel the running indexing job
    Cancel,

    /// Upload and index a document
    Upload {
        /// File to upload
        path: PathBuf,
    },

    /// Follow indexing progress until the job finishes
    Watch,

    /// List available models
    Models,

    /// Show configuration
    Config {
        /// Edit configuration
        #[arg(long)]
        edit: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, None | Some(Commands::Tui));

    // Setup logging; the TUI owns the terminal, so it logs to a file
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    let _log_guard = if interactive {
        let appender = tracing_appender::rolling::never(Config::log_dir(), "rag-console.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .compact()
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
        None
    };

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }

    match cli.command {
        Some(Commands::Tui) | None => cmd_tui(config).await,
        Some(Commands::Files) => cmd_files(config).await,
        Some(Commands::Reindex { yes }) => cmd_reindex(config, yes).await,
        Some(Commands::Update) => cmd_update(config).await,
        Some(Commands::Cancel) => cmd_cancel(config).await,
        Some(Commands::Upload { path }) => cmd_upload(config, path).await,
        Some(Commands::Watch) => cmd_watch(config).await,
        Some(Commands::Models) => cmd_models(config).await,
        Some(Commands::Config { edit }) => cmd_config(config, cli.config, edit).await,
    }
}

/// Relay over a fresh client, for the one-shot commands
fn relay(config: &Config) -> Result<(IndexingRelay, NoticeSlot)> {
    let client: Arc<dyn IndexApi> = Arc::new(RagClient::new(config)?);
    let notices = NoticeSlot::new(Duration::from_millis(config.relay.notice_ttl_ms));
    let relay = IndexingRelay::new(
        client,
        notices.clone(),
        Duration::from_millis(config.relay.hide_delay_ms),
    );
    Ok((relay, notices))
}

/// Print the relay's outcome; failures become the process error
fn finish(outcome: Outcome, notices: &NoticeSlot) -> Result<()> {
    match outcome {
        Outcome::Failed(message) => bail!(message),
        _ => {
            if let Some(notice) = notices.current() {
                println!("{}", notice.text);
            }
            Ok(())
        }
    }
}

/// Start the interactive TUI
async fn cmd_tui(config: Config) -> Result<()> {
    let client = RagClient::new(&config)?;
    info!(server = %client.base_url(), "Starting rag-console TUI");

    let (events_tx, events_rx) = mpsc::channel(256);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let push_task = push::spawn(config.server.push_url(), events_tx, shutdown_rx);

    let app = App::new(client, &config);
    let result = tui::run(app, events_rx).await;

    let _ = shutdown_tx.send(true);
    let _ = push_task.await;
    result
}

async fn cmd_files(config: Config) -> Result<()> {
    let (relay, notices) = relay(&config)?;
    let mut files = FileList::new();

    if !relay.refresh_files(&mut files).await {
        let message = notices
            .current()
            .map(|n| n.text)
            .unwrap_or_else(|| "Loading files failed".to_string());
        bail!(message);
    }

    if files.files().is_empty() {
        println!("{}", files.hint().unwrap_or("No files"));
    }
    for row in files.render() {
        println!("  {}", row);
    }
    Ok(())
}

async fn cmd_reindex(config: Config, yes: bool) -> Result<()> {
    let (mut relay, notices) = relay(&config)?;

    let outcome = match relay.request_reindex_all().await {
        Outcome::NeedsConfirmation(question) => {
            if yes || ask(&question)? {
                relay.confirm_reindex_all().await
            } else {
                relay.decline_reindex();
                println!("Reindex cancelled");
                return Ok(());
            }
        }
        other => other,
    };

    finish(outcome, &notices)
}

/// Ask a yes/no question on stdin
fn ask(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn cmd_update(config: Config) -> Result<()> {
    let (mut relay, notices) = relay(&config)?;
    let outcome = relay.request_update_index().await;
    finish(outcome, &notices)
}

async fn cmd_cancel(config: Config) -> Result<()> {
    let (mut relay, notices) = relay(&config)?;
    let outcome = relay.request_cancel().await;
    finish(outcome, &notices)
}

async fn cmd_upload(config: Config, path: PathBuf) -> Result<()> {
    let client = RagClient::new(&config)?;
    let reply = client.upload(&path).await?;
    println!("{}", reply.message);
    Ok(())
}

/// Stream progress to stdout until the job completes, fails or Ctrl-C
async fn cmd_watch(config: Config) -> Result<()> {
    let (mut relay, _notices) = relay(&config)?;
    let (events_tx, mut events_rx) = mpsc::channel(256);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let push_task = push::spawn(config.server.push_url(), events_tx, shutdown_rx);

    println!("Watching {} (Ctrl-C to stop)", config.server.push_url());
    let mut printed_feed = 0;

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            PushEvent::Progress(progress) => {
                if !relay.on_progress_event(progress) {
                    continue;
                }
                let view = relay.view();
                println!("[{:>5.1}%] {}", view.width_percent, view.text);

                let feed = relay.feed();
                if feed.len() < printed_feed {
                    printed_feed = 0;
                }
                for line in &feed[printed_feed..] {
                    println!("         {}", line.text);
                }
                printed_feed = feed.len();

                if *relay.state() == JobState::Completed {
                    break;
                }
            }
            PushEvent::IndexError(message) => {
                relay.on_index_error(message.clone());
                eprintln!("Indexing failed: {}", message);
                break;
            }
            PushEvent::IndexComplete { message, .. } => {
                println!("{}", message);
                break;
            }
            PushEvent::UploadProgress { fraction, message } => {
                println!("[upload {:>5.1}%] {}", fraction * 100.0, message);
            }
            PushEvent::Connected => info!("Connected"),
            PushEvent::Disconnected => info!("Disconnected, reconnecting"),
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = push_task.await;

    if let JobState::Failed(message) = relay.state() {
        bail!(message.clone());
    }
    Ok(())
}

async fn cmd_models(config: Config) -> Result<()> {
    let client = RagClient::new(&config)?;
    let mut selector = ModelSelector::new(config.tui.default_model.clone());
    selector.apply(client.models().await?);

    println!("Available Models ({}):\n", selector.models().len());
    for row in selector.render() {
        println!("  {}", row);
    }
    Ok(())
}

/// Show/edit configuration
async fn cmd_config(config: Config, path: Option<PathBuf>, edit: bool) -> Result<()> {
    let path = path.unwrap_or_else(Config::default_path);

    if edit {
        if !path.exists() {
            config.save(Some(&path))?;
        }
        let editor = std::env::var("EDITOR").unwrap_or_else(|_| "nano".to_string());
        std::process::Command::new(&editor).arg(&path).status()?;
    } else {
        println!("Configuration file: {}", path.display());
        println!();
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            println!("{}", content);
        } else {
            println!("# Default configuration (not yet saved)");
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
