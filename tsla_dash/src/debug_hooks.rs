use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "tsla_dash.log";
const HOOKS_ENV: &str = "TSLA_DASH_DEBUG_HOOKS";

static ENABLED: OnceLock<bool> = OnceLock::new();

/// Logs go to a file: the terminal belongs to the dashboard.
pub fn init_logging(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create log dir {:?}", dir))?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {:?}", path))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("init tracing: {e}"))?;

    Ok(path)
}

fn hooks_enabled() -> bool {
    *ENABLED.get_or_init(|| {
        std::env::var(HOOKS_ENV)
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(false)
    })
}

fn log_line(topic: &str, msg: impl AsRef<str>) {
    if !hooks_enabled() {
        return;
    }
    tracing::debug!(target: "tsla_dash::hooks", topic, "{}", msg.as_ref());
}

pub fn log_data_load_start(path: &Path) {
    log_line(
        "data.load",
        format!(
            "loading {:?}; env={}={}",
            path,
            HOOKS_ENV,
            std::env::var(HOOKS_ENV).unwrap_or_else(|_| "(unset)".into())
        ),
    );
}

pub fn log_series_adapted(rows: usize, bands: usize, markers: usize) {
    log_line(
        "data.adapt",
        format!("rows={rows} bands_with_levels={bands} markers={markers}"),
    );
}

pub fn log_replay_transition(action: &str, from: &str, to: &str, cursor: usize) {
    log_line(
        "replay.state",
        format!("{action}: {from} -> {to} cursor={cursor}"),
    );
}

pub fn log_replay_tick(cursor: usize, len: usize) {
    static COUNT: AtomicU64 = AtomicU64::new(0);
    let n = COUNT.fetch_add(1, Ordering::Relaxed) + 1;
    if n <= 10 || n % 50 == 0 {
        log_line("replay.tick", format!("tick #{n} cursor={cursor}/{len}"));
    }
}

pub fn log_chat_request(id: u64, question: &str, context_bytes: usize) {
    log_line(
        "chat.request",
        format!(
            "id={id} question_chars={} context_bytes={context_bytes}",
            question.chars().count()
        ),
    );
}

pub fn log_chat_superseded(id: u64, latest: u64) {
    log_line(
        "chat.superseded",
        format!("answer id={id} arrived after newer request id={latest}"),
    );
}
