use crate::chat::{ChatRequest, DataContext};
use crate::config::ReplayConfig;
use crate::replay::ReplayController;
use crate::series::Series;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Chart,
    Chat,
}

impl Tab {
    pub fn index(&self) -> usize {
        match self {
            Tab::Chart => 0,
            Tab::Chat => 1,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Tab::Chart => Tab::Chat,
            Tab::Chat => Tab::Chart,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerLevel {
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub level: BannerLevel,
    pub text: String,
}

impl Banner {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: BannerLevel::Error,
            text: text.into(),
        }
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Self {
            level: BannerLevel::Warn,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    Error,
    Notice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub text: String,
    pub id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatAvailability {
    Ready,
    Disabled { reason: String },
}

#[derive(Debug, Clone)]
pub struct ChatPanel {
    pub availability: ChatAvailability,
    pub input: String,
    pub history: Vec<ChatEntry>,
    /// Id of the most recent question sent. Answers to anything older are
    /// kept in history but marked superseded.
    pub latest_id: u64,
    pub pending: Option<u64>,
    /// Requests the reducer wants sent; drained by the runtime.
    pub outbox: Vec<ChatRequest>,
    /// Lines scrolled up from the bottom of the history.
    pub scroll_back: u16,
    pub row_limit: Option<usize>,
}

impl ChatPanel {
    pub fn new(availability: ChatAvailability, row_limit: Option<usize>) -> Self {
        Self {
            availability,
            input: String::new(),
            history: Vec::new(),
            latest_id: 0,
            pending: None,
            outbox: Vec::new(),
            scroll_back: 0,
            row_limit,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.availability == ChatAvailability::Ready
    }

    pub fn push(&mut self, role: ChatRole, text: impl Into<String>, id: Option<u64>) {
        self.history.push(ChatEntry {
            role,
            text: text.into(),
            id,
        });
        self.scroll_back = 0;
    }
}

/// Everything one dashboard session knows. Owned by the event loop, changed
/// only by the reducer.
#[derive(Debug, Clone)]
pub struct AppState {
    pub tab: Tab,
    pub source_label: String,
    pub series: Series,
    pub context: Option<Arc<DataContext>>,
    pub replay: ReplayController,
    pub replay_cfg: ReplayConfig,
    pub data_banner: Option<Banner>,
    pub status_message: String,
    pub chat: ChatPanel,
    /// Set once the user changes the step; only then is it saved on exit.
    pub step_changed: bool,
    pub reload_requested: bool,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(replay_cfg: ReplayConfig, chat: ChatPanel) -> Self {
        Self {
            tab: Tab::Chart,
            source_label: String::new(),
            series: Series::default(),
            context: None,
            replay: ReplayController::new(0, replay_cfg.step),
            replay_cfg,
            data_banner: None,
            status_message: "Loading data...".to_string(),
            chat,
            step_changed: false,
            reload_requested: false,
            should_quit: false,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.series.is_empty()
    }

    /// Banner shown above the tabs, if any. Data problems win over chat ones.
    pub fn banner(&self) -> Option<Banner> {
        if let Some(b) = &self.data_banner {
            return Some(b.clone());
        }
        match &self.chat.availability {
            ChatAvailability::Disabled { reason } => Some(Banner::warn(reason.clone())),
            ChatAvailability::Ready => None,
        }
    }
}
