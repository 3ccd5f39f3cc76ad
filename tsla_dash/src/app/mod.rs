pub mod commands;
pub mod event;
pub mod reducer;
pub mod render;
pub mod state;

pub use event::*;
pub use state::*;

use crate::chat::ChatBridge;
use crate::data::{DataSource, LoadError};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

pub struct AppRuntime {
    pub state: AppState,
    source: Box<dyn DataSource>,
    events: Receiver<AppEvent>,
    chat: Option<ChatBridge>,
    tick_interval: Duration,
    next_tick: Instant,
    dirty: bool,
}

impl AppRuntime {
    pub fn new(
        state: AppState,
        source: Box<dyn DataSource>,
        events: Receiver<AppEvent>,
        chat: Option<ChatBridge>,
    ) -> Self {
        let tick_interval = Duration::from_millis(state.replay_cfg.tick_interval_ms.max(1));
        Self {
            state,
            source,
            events,
            chat,
            tick_interval,
            next_tick: Instant::now() + tick_interval,
            dirty: true,
        }
    }

    /// First load. An unreadable file is the caller's problem; a malformed
    /// one becomes a banner.
    pub fn load_initial(&mut self) -> Result<(), LoadError> {
        match self.source.load_series() {
            Ok(series) => self.handle_event(AppEvent::Data(DataEvent::Loaded {
                source: self.source.describe(),
                series,
            })),
            Err(err @ LoadError::Io { .. }) => return Err(err),
            Err(err) => self.handle_event(AppEvent::Data(DataEvent::Failed {
                source: self.source.describe(),
                message: err.to_string(),
            })),
        }
        Ok(())
    }

    fn reload(&mut self) {
        let ev = match self.source.load_series() {
            Ok(series) => DataEvent::Loaded {
                source: self.source.describe(),
                series,
            },
            Err(err) => DataEvent::Failed {
                source: self.source.describe(),
                message: err.to_string(),
            },
        };
        self.handle_event(AppEvent::Data(ev));
    }

    pub fn handle_event(&mut self, ev: AppEvent) {
        let changed = reducer::reduce(&mut self.state, ev);
        if changed {
            self.dirty = true;
        }
        if self.state.reload_requested {
            self.reload();
        }
        if !self.state.chat.outbox.is_empty() {
            self.flush_outbox();
        }
    }

    fn flush_outbox(&mut self) {
        let outbox = std::mem::take(&mut self.state.chat.outbox);
        for req in outbox {
            let id = req.id;
            let sent = match &self.chat {
                Some(bridge) => bridge.submit(req).map_err(|e| e.to_string()),
                None => Err("chat worker is not running".to_string()),
            };
            if let Err(message) = sent {
                tracing::warn!(id, "chat submit failed: {message}");
                self.handle_event(AppEvent::Chat(ChatEvent::Failed { id, message }));
            }
        }
    }

    pub fn tick_if_needed(&mut self) {
        let now = Instant::now();
        if now >= self.next_tick {
            self.next_tick = now + self.tick_interval;
            self.handle_event(AppEvent::Timer(TimerEvent::ReplayTick));
        }
    }

    /// How long the input poll may block before the next tick is due.
    pub fn time_until_tick(&self) -> Duration {
        self.next_tick.saturating_duration_since(Instant::now())
    }

    /// Pulls everything the chat worker has posted without waiting.
    pub fn drain_background(&mut self) {
        while let Ok(ev) = self.events.try_recv() {
            self.handle_event(ev);
        }
    }

    /// Step size to write back to the config, if the user changed it. A step
    /// that came from the environment is left out of the file.
    pub fn step_to_persist(&self) -> Option<usize> {
        self.state.step_changed.then(|| self.state.replay.step())
    }

    pub fn should_quit(&self) -> bool {
        self.state.should_quit
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn render(&mut self, f: &mut ratatui::Frame) {
        render::render(f, &self.state);
        self.dirty = false;
    }
}
