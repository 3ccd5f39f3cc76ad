use std::io;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use tsla_dash::app::{commands, AppEvent, AppRuntime, AppState, ChatAvailability, ChatPanel};
use tsla_dash::chat::{gemini::GeminiClient, ChatBridge};
use tsla_dash::config::{self, ConfigStore};
use tsla_dash::data::CsvSource;
use tsla_dash::debug_hooks;

/// Upper bound on how long input polling may block, so chat answers show up
/// promptly even while the replay is paused.
const MAX_POLL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let log_path = debug_hooks::init_logging(&config::data_dir()).context("init logging")?;

    let mut store = ConfigStore::open_default().context("locate config")?;
    if let Err(err) = store.ensure_written() {
        tracing::warn!("could not write default config: {err:#}");
    }
    let cfg = store.effective();
    tracing::info!(
        config = %store.config_path().display(),
        log = %log_path.display(),
        data = %cfg.data_file.display(),
        "tsla_dash starting"
    );

    let (tx, rx) = mpsc::channel::<AppEvent>();

    let (availability, bridge) = match cfg.chat.credential() {
        Ok(key) => match GeminiClient::new(&cfg.chat, key) {
            Ok(client) => {
                tracing::info!(url = client.url(), "chat enabled");
                let bridge = ChatBridge::spawn(
                    client,
                    Duration::from_millis(cfg.chat.min_interval_ms),
                    tx.clone(),
                );
                (ChatAvailability::Ready, Some(bridge))
            }
            Err(err) => {
                tracing::error!("chat client init failed: {err}");
                (
                    ChatAvailability::Disabled {
                        reason: format!("chat disabled: {err}"),
                    },
                    None,
                )
            }
        },
        Err(err) => {
            tracing::warn!("{err}");
            (
                ChatAvailability::Disabled {
                    reason: err.to_string(),
                },
                None,
            )
        }
    };
    drop(tx);

    let state = AppState::new(
        cfg.replay.clone(),
        ChatPanel::new(availability, cfg.chat.context_rows),
    );
    let source = CsvSource::new(&cfg.data_file, cfg.columns.clone());
    let mut runtime = AppRuntime::new(state, Box::new(source), rx, bridge);
    runtime
        .load_initial()
        .with_context(|| format!("load {}", cfg.data_file.display()))?;

    run_ui(&mut runtime)?;

    if let Some(step) = runtime.step_to_persist() {
        if let Err(err) = store.remember_step(step) {
            tracing::warn!("could not save step size: {err:#}");
        }
    }
    tracing::info!("tsla_dash exiting");
    Ok(())
}

fn run_ui(runtime: &mut AppRuntime) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));

    let res = ui_loop(&mut terminal, runtime);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn ui_loop<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, runtime: &mut AppRuntime) -> Result<()> {
    loop {
        if runtime.is_dirty() {
            terminal.draw(|f| runtime.render(f))?;
        }

        let timeout = runtime.time_until_tick().min(MAX_POLL);
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    if let Some(ui) = commands::key_to_event(runtime.state.tab, key) {
                        runtime.handle_event(AppEvent::Ui(ui));
                    }
                }
                Event::Resize(_, _) => runtime.mark_dirty(),
                _ => {}
            }
        }

        runtime.drain_background();
        runtime.tick_if_needed();

        if runtime.should_quit() {
            break;
        }
    }
    Ok(())
}
