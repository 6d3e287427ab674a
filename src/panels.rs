//! Tool info panel switcher

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Files,
    Upload,
    Models,
    Tokens,
    Prompts,
    System,
}

impl Panel {
    pub const ALL: [Panel; 6] = [
        Panel::Files,
        Panel::Upload,
        Panel::Models,
        Panel::Tokens,
        Panel::Prompts,
        Panel::System,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "files" => Some(Panel::Files),
            "upload" => Some(Panel::Upload),
            "models" | "model" => Some(Panel::Models),
            "tokens" => Some(Panel::Tokens),
            "prompts" | "prompt" => Some(Panel::Prompts),
            "system" => Some(Panel::System),
            _ => None,
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Panel::Files => "Files",
            Panel::Upload => "Upload",
            Panel::Models => "Models",
            Panel::Tokens => "Tokens",
            Panel::Prompts => "Prompts",
            Panel::System => "System",
        };
        write!(f, "{}", name)
    }
}

/// At most one panel is open. The tokens panel refreshes on an interval while open.
#[derive(Debug, Clone)]
pub struct PanelSwitcher {
    open: Option<Panel>,
    token_refresh: Duration,
    next_refresh: Option<Instant>,
}

impl PanelSwitcher {
    pub fn new(token_refresh: Duration) -> Self {
        Self {
            open: None,
            token_refresh,
            next_refresh: None,
        }
    }

    pub fn open(&self) -> Option<Panel> {
        self.open
    }

    pub fn is_open(&self, panel: Panel) -> bool {
        self.open == Some(panel)
    }

    /// Open `panel`, or close it when it is already open.
    /// Returns true when the panel was opened and its content should be loaded.
    pub fn toggle(&mut self, panel: Panel) -> bool {
        if self.open == Some(panel) {
            self.close();
            return false;
        }

        self.open = Some(panel);
        self.next_refresh = (panel == Panel::Tokens).then(|| Instant::now() + self.token_refresh);
        true
    }

    pub fn close(&mut self) {
        self.open = None;
        self.next_refresh = None;
    }

    /// Whether the tokens panel is due for a refresh. Re-arms the interval.
    pub fn refresh_due(&mut self, now: Instant) -> bool {
        match self.next_refresh {
            Some(at) if now >= at => {
                self.next_refresh = Some(now + self.token_refresh);
                true
            }
            _ => false,
        }
    }
}
