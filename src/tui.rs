//! Terminal user interface for rag-console

use crate::app::{App, Mode};
use crate::notice::NoticeLevel;
use crate::panels::Panel;
use crate::push::PushEvent;
use crate::transcript::{self, MessageRole};
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::info;

/// Feed lines shown under the progress gauge
const FEED_ROWS: usize = 4;

/// Run the TUI
pub async fn run(mut app: App, mut events: mpsc::Receiver<PushEvent>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.load_initial().await;

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    info!("TUI closed");
    result
}

/// Main event loop
async fn run_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: &mut mpsc::Receiver<PushEvent>,
) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        while let Ok(event) = events.try_recv() {
            app.handle_push(event);
        }
        app.drain_tasks();
        app.tick(Instant::now()).await;

        // Handle keys with timeout so push events and timers keep flowing
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                match app.mode() {
                    Mode::Normal => handle_normal_mode(app, key).await?,
                    Mode::Insert => handle_insert_mode(app, key).await?,
                    Mode::Command => handle_command_mode(app, key).await?,
                    Mode::Confirm => handle_confirm_mode(app, key),
                }
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

/// Draw the UI
fn draw(f: &mut Frame, app: &App) {
    let size = f.size();
    let view = app.relay().view();
    let progress_height = if view.visible {
        3 + app.relay().feed().len().min(FEED_ROWS) as u16
    } else {
        0
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),               // Header
            Constraint::Min(5),                  // Content
            Constraint::Length(progress_height), // Indexing progress
            Constraint::Length(3),               // Input
            Constraint::Length(1),               // Status
        ])
        .split(size);

    draw_header(f, app, chunks[0]);

    if app.panels().open().is_some() {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(chunks[1]);
        draw_panel(f, app, content_chunks[0]);
        draw_conversation(f, app, content_chunks[1]);
    } else {
        draw_conversation(f, app, chunks[1]);
    }

    if view.visible {
        draw_progress(f, app, chunks[2]);
    }
    draw_input(f, app, chunks[3]);
    draw_status(f, app, chunks[4]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let model = app.models().current().unwrap_or("--");
    let chat_mode = if app.rag_mode() { "RAG" } else { "LLM" };
    let (push, push_style) = if app.is_connected() {
        ("● live", Style::default().fg(Color::Green))
    } else {
        ("○ offline", Style::default().fg(Color::DarkGray))
    };

    let mut header = Line::from(vec![
        Span::styled(
            " rag-console ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("│ Model: "),
        Span::styled(model, Style::default().fg(Color::Yellow)),
        Span::raw(" │ Mode: "),
        Span::styled(chat_mode, Style::default().fg(Color::White)),
        Span::raw(" │ "),
        Span::styled(push, push_style),
    ]);
    if app.pending_tasks() > 0 {
        header.spans.push(Span::styled(
            format!(" │ ⟳ {} pending", app.pending_tasks()),
            Style::default().fg(Color::Yellow),
        ));
    }

    f.render_widget(Paragraph::new(header), area);
}

fn draw_panel(f: &mut Frame, app: &App, area: Rect) {
    let Some(panel) = app.panels().open() else {
        return;
    };

    let rows: Vec<String> = match panel {
        Panel::Files => {
            let mut rows = app.files().render();
            if rows.is_empty() {
                rows.push(app.files().hint().unwrap_or("No files").to_string());
            }
            rows
        }
        Panel::Upload => vec![
            ":upload <path>  upload and index a document".to_string(),
            ":delete <name>  remove a document".to_string(),
        ],
        Panel::Models => app.models().render(),
        Panel::Tokens => app
            .tokens()
            .map(|t| t.render())
            .unwrap_or_else(|| vec!["Loading...".to_string()]),
        Panel::Prompts => {
            let mut rows = app.prompts().render();
            if app.prompts().has_pending() {
                rows.push("Saving...".to_string());
            }
            rows
        }
        Panel::System => vec![
            ":reindex  rebuild the whole index".to_string(),
            ":update   index new files".to_string(),
            ":cancel   stop indexing".to_string(),
            ":mode rag|llm".to_string(),
        ],
    };

    let items: Vec<ListItem> = rows.into_iter().map(ListItem::new).collect();
    let list = List::new(items).block(
        Block::default()
            .title(format!(" {} ", panel))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(list, area);
}

fn draw_conversation(f: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    for msg in app.transcript().messages() {
        let (prefix, style) = match msg.role {
            MessageRole::User => ("You: ", Style::default().fg(Color::Cyan)),
            MessageRole::Assistant => ("Assistant: ", Style::default().fg(Color::Green)),
            MessageRole::System => ("System: ", Style::default().fg(Color::Yellow)),
            MessageRole::Error => ("Error: ", Style::default().fg(Color::Red)),
        };

        lines.push(Line::from(vec![Span::styled(
            prefix,
            style.add_modifier(Modifier::BOLD),
        )]));

        for spans in msg.render_lines() {
            let mut line = vec![Span::raw("  ")];
            line.extend(spans.into_iter().map(|span| match span {
                transcript::Span::Plain(text) => Span::raw(text),
                transcript::Span::Bold(text) => {
                    Span::styled(text, Style::default().add_modifier(Modifier::BOLD))
                }
            }));
            lines.push(Line::from(line));
        }

        lines.push(Line::from(""));
    }

    if app.is_sending() {
        lines.push(Line::from(Span::styled(
            "▌",
            Style::default().fg(Color::Green),
        )));
    }

    let conversation = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Conversation ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.scroll_offset() as u16, 0));

    f.render_widget(conversation, area);
}

fn draw_progress(f: &mut Frame, app: &App, area: Rect) {
    let view = app.relay().view();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let title = if view.cancel_visible {
        " Indexing  [x] cancel "
    } else {
        " Indexing "
    };
    let gauge = Gauge::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio((view.width_percent / 100.0).clamp(0.0, 1.0))
        .label(view.text.clone());
    f.render_widget(gauge, chunks[0]);

    let feed = app.relay().feed();
    let skip = feed.len().saturating_sub(FEED_ROWS);
    let items: Vec<ListItem> = feed[skip..]
        .iter()
        .map(|line| ListItem::new(format!(" {}", line.text)))
        .collect();
    f.render_widget(List::new(items), chunks[1]);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let (content, title) = match app.mode() {
        Mode::Command => (format!(":{}", app.command()), " Command "),
        Mode::Confirm => (
            app.relay()
                .pending_confirmation()
                .unwrap_or("Reindex all files?")
                .to_string(),
            " Confirm [y/n] ",
        ),
        _ => (app.input().to_string(), " Message "),
    };

    let style = match app.mode() {
        Mode::Insert => Style::default().fg(Color::Yellow),
        Mode::Command => Style::default().fg(Color::Cyan),
        Mode::Confirm => Style::default().fg(Color::Red),
        _ => Style::default().fg(Color::White),
    };

    let input = Paragraph::new(content).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(style),
    );

    f.render_widget(input, area);

    if matches!(app.mode(), Mode::Insert | Mode::Command) {
        let cursor_pos = match app.mode() {
            Mode::Command => app.command().chars().count() + 1, // +1 for :
            _ => app.input().chars().count(),
        };
        f.set_cursor(cursor_x(area, cursor_pos), area.y.saturating_add(1));
    }
}

/// Column of the input cursor, kept inside the block's borders
fn cursor_x(area: Rect, cursor_pos: usize) -> u16 {
    let inner = area.width.saturating_sub(2);
    let offset = u16::try_from(cursor_pos).unwrap_or(u16::MAX).min(inner);
    area.x.saturating_add(1).saturating_add(offset)
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let mode_str = match app.mode() {
        Mode::Normal => "NORMAL",
        Mode::Insert => "INSERT",
        Mode::Command => "COMMAND",
        Mode::Confirm => "CONFIRM",
    };

    let mode_style = match app.mode() {
        Mode::Insert => Style::default().fg(Color::Black).bg(Color::Yellow),
        Mode::Command => Style::default().fg(Color::Black).bg(Color::Cyan),
        Mode::Confirm => Style::default().fg(Color::Black).bg(Color::Red),
        _ => Style::default().fg(Color::Black).bg(Color::Blue),
    };

    let mut spans = vec![
        Span::styled(format!(" {} ", mode_str), mode_style),
        Span::raw(" "),
    ];

    match app.notices().current() {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Info => Color::White,
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Error => Color::Red,
            };
            spans.push(Span::styled(notice.text, Style::default().fg(color)));
        }
        None => spans.push(Span::styled(
            "[i]nput [:]command [1-6]panels [r]eindex [u]pdate [x]cancel [q]uit",
            Style::default().fg(Color::DarkGray),
        )),
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

async fn handle_normal_mode(app: &mut App, key: event::KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('i') => app.set_mode(Mode::Insert),
        KeyCode::Char(':') => app.set_mode(Mode::Command),
        KeyCode::Char('r') => app.reindex_all(),
        KeyCode::Char('u') => app.update_index(),
        KeyCode::Char('x') => {
            if app.relay().view().cancel_visible {
                app.request_cancel();
            }
        }
        KeyCode::Char('d') => app.dismiss(),
        KeyCode::Char(c @ '1'..='6') => {
            let index = c as usize - '1' as usize;
            app.toggle_panel(Panel::ALL[index]).await;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.set_scroll_offset(app.scroll_offset().saturating_add(1));
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.set_scroll_offset(app.scroll_offset().saturating_sub(1));
        }
        KeyCode::Char('g') => app.set_scroll_offset(0),
        _ => {}
    }
    Ok(())
}

async fn handle_insert_mode(app: &mut App, key: event::KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => app.set_mode(Mode::Normal),
        KeyCode::Enter => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.input_mut().push('\n');
            } else {
                app.submit().await?;
            }
        }
        KeyCode::Char(c) => {
            app.input_mut().push(c);
        }
        KeyCode::Backspace => {
            app.input_mut().pop();
        }
        _ => {}
    }
    Ok(())
}

async fn handle_command_mode(app: &mut App, key: event::KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => {
            app.command_mut().clear();
            app.set_mode(Mode::Normal);
        }
        KeyCode::Enter => {
            app.execute_command().await?;
        }
        KeyCode::Char(c) => {
            app.command_mut().push(c);
        }
        KeyCode::Backspace => {
            if app.command().is_empty() {
                app.set_mode(Mode::Normal);
            } else {
                app.command_mut().pop();
            }
        }
        _ => {}
    }
    Ok(())
}

fn handle_confirm_mode(app: &mut App, key: event::KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.confirm(true),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.confirm(false),
        _ => {}
    }
}
