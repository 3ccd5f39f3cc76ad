// tsla_dash/src/config.rs

use crate::error::CredentialMissingError;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

/// Bump when you change config schema.
const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_DATA_FILE: &str = "TSLA_data - Sheet1.csv";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashConfig {
    pub version: u32,
    pub data_file: PathBuf,
    pub columns: ColumnMap,
    pub replay: ReplayConfig,
    pub chat: ChatConfig,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            columns: ColumnMap::default(),
            replay: ReplayConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

/// Header names in the data file. Matched case-insensitively after trimming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColumnMap {
    pub timestamp: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub support: String,
    pub resistance: String,
    pub direction: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            open: "open".to_string(),
            high: "high".to_string(),
            low: "low".to_string(),
            close: "close".to_string(),
            volume: "volume".to_string(),
            support: "Support".to_string(),
            resistance: "Resistance".to_string(),
            direction: "direction".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    pub tick_interval_ms: u64,
    pub step: usize,
    /// Candles revealed right after a load, before the first tick.
    pub lead_in: usize,
    pub autoplay: bool,
    pub max_visible_candles: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 200,
            step: 1,
            lead_in: 10,
            autoplay: false,
            max_visible_candles: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub api_base: String,
    pub model: String,
    /// Name of the environment variable holding the key. The key itself is
    /// never written to this file.
    pub api_key_env: String,
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
    /// Only the last N rows go into the prompt. `None` sends the whole dataset.
    pub context_rows: Option<usize>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            min_interval_ms: 1_000,
            timeout_secs: 60,
            context_rows: None,
        }
    }
}

impl ChatConfig {
    pub fn credential(&self) -> Result<String, CredentialMissingError> {
        env::var(&self.api_key_env)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CredentialMissingError {
                var: self.api_key_env.clone(),
            })
    }
}

fn env_str(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_str(name).and_then(|s| s.parse().ok())
}

impl DashConfig {
    /// Environment wins over the file. Never persisted.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = env_str("TSLA_DASH_DATA") {
            self.data_file = PathBuf::from(path);
        }
        if let Some(ms) = env_parse::<u64>("TSLA_DASH_TICK_MS") {
            self.replay.tick_interval_ms = ms;
        }
        if let Some(step) = env_parse::<usize>("TSLA_DASH_STEP") {
            self.replay.step = step;
        }
        if let Some(model) = env_str("GEMINI_MODEL") {
            self.chat.model = model;
        }
        self.sanitize()
    }

    fn sanitize(mut self) -> Self {
        self.replay.tick_interval_ms = self.replay.tick_interval_ms.clamp(10, 60_000);
        self.replay.step = self.replay.step.max(1);
        self.replay.max_visible_candles = self.replay.max_visible_candles.max(5);
        self
    }
}

pub struct ConfigStore {
    path: PathBuf,
    file_cfg: DashConfig,
    last_saved_json: String,
}

impl ConfigStore {
    pub fn open_default() -> Result<Self> {
        let path = default_config_path()?;
        Ok(Self::at(path))
    }

    pub fn at(path: PathBuf) -> Self {
        let file_cfg = load_or_default(&path);
        let last_saved_json = serde_json::to_string_pretty(&file_cfg).unwrap_or_default();
        Self {
            path,
            file_cfg,
            last_saved_json,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.path
    }

    /// File contents (defaults filled in), without env overrides.
    pub fn file_config(&self) -> &DashConfig {
        &self.file_cfg
    }

    /// What the session runs with.
    pub fn effective(&self) -> DashConfig {
        self.file_cfg.clone().with_env_overrides()
    }

    /// Writes the file if it is missing, so there is something to edit.
    pub fn ensure_written(&mut self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.last_saved_json.clear();
        let cfg = self.file_cfg.clone();
        self.save_now(&cfg)
    }

    /// The step size is the one runtime setting that outlives the session.
    pub fn remember_step(&mut self, step: usize) -> Result<()> {
        let mut cfg = self.file_cfg.clone();
        cfg.replay.step = step.max(1);
        self.save_now(&cfg)
    }

    /// Save if content changed (prevents hammering disk)
    pub fn save_now(&mut self, cfg: &DashConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(cfg)?;
        if self.last_saved_json == json {
            return Ok(());
        }

        let parent = self.path.parent().context("config path has no parent")?;
        fs::create_dir_all(parent).with_context(|| format!("create config dir {:?}", parent))?;

        // backup previous
        if self.path.exists() {
            let backup = self.path.with_extension("json.bak");
            let _ = fs::copy(&self.path, backup);
        }

        atomic_write(&self.path, json.as_bytes())?;
        self.last_saved_json = json;
        self.file_cfg = cfg.clone();
        Ok(())
    }
}

fn load_or_default(path: &Path) -> DashConfig {
    if !path.exists() {
        return DashConfig::default();
    }
    match read_json::<DashConfig>(path) {
        Ok(mut cfg) => {
            // simple migration hook
            if cfg.version == 0 {
                cfg.version = CONFIG_VERSION;
            }
            cfg
        }
        Err(err) => {
            archive_corrupt(path, &err);
            DashConfig::default()
        }
    }
}

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "tsla_dash", "tsla_dash").context("ProjectDirs::from returned None")
}

fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.json"))
}

/// Where the log file goes. Falls back to `./data` when the platform has no
/// data dir.
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {:?}", path))?;
    let value = serde_json::from_slice::<T>(&bytes).with_context(|| "parse json")?;
    Ok(value)
}

fn archive_corrupt(path: &Path, err: &anyhow::Error) {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let archived = path.with_extension(format!("corrupt.{ts}.json"));
    let _ = fs::rename(path, &archived);
    tracing::warn!(?archived, "config corrupt; archived. error: {err:?}");
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().context("no parent dir for config path")?;
    let tmp = dir.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    {
        let mut f = fs::File::create(&tmp).with_context(|| format!("create tmp {:?}", tmp))?;
        f.write_all(bytes).with_context(|| "write tmp")?;
        let _ = f.sync_all();
    }

    fs::rename(&tmp, path).with_context(|| format!("rename {:?} -> {:?}", tmp, path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path().join("config.json"));
        assert_eq!(store.file_config(), &DashConfig::default());
        assert_eq!(store.file_config().replay.tick_interval_ms, 200);
        assert_eq!(store.file_config().replay.step, 1);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "replay": { "step": 5 }, "chat": { "model": "gemini-pro" } }"#)
            .unwrap();

        let store = ConfigStore::at(path);
        let cfg = store.file_config();
        assert_eq!(cfg.replay.step, 5);
        assert_eq!(cfg.replay.tick_interval_ms, 200);
        assert_eq!(cfg.chat.model, "gemini-pro");
        assert_eq!(cfg.chat.api_key_env, DEFAULT_API_KEY_ENV);
        assert_eq!(cfg.columns.support, "Support");
    }

    #[test]
    fn corrupt_file_is_archived() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::at(path.clone());
        assert_eq!(store.file_config(), &DashConfig::default());
        assert!(!path.exists());
        let archived = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().contains("corrupt"));
        assert!(archived);
    }

    #[test]
    fn remember_step_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut store = ConfigStore::at(path.clone());
        store.ensure_written().unwrap();
        assert!(path.exists());

        store.remember_step(4).unwrap();
        let reopened = ConfigStore::at(path);
        assert_eq!(reopened.file_config().replay.step, 4);
    }

    #[test]
    fn sanitize_clamps_nonsense() {
        let mut cfg = DashConfig::default();
        cfg.replay.step = 0;
        cfg.replay.tick_interval_ms = 0;
        let cfg = cfg.sanitize();
        assert_eq!(cfg.replay.step, 1);
        assert_eq!(cfg.replay.tick_interval_ms, 10);
    }
}
