use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// Browser engine to launch: "chrome" or "edge".
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Explicit browser binary. If None, well-known install locations are searched.
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Profile directory. If None, `~/.pagelens/profile` is used.
    #[serde(default)]
    pub user_data_dir: Option<String>,
    #[serde(default = "default_launch_timeout_secs")]
    pub launch_timeout_secs: u64,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

fn default_engine() -> String {
    "chrome".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_launch_timeout_secs() -> u64 {
    15
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            executable: None,
            headless: default_headless(),
            user_data_dir: None,
            launch_timeout_secs: default_launch_timeout_secs(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotConfig {
    /// Accessible names longer than this many characters are truncated.
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    #[serde(default = "default_uid_prefix")]
    pub uid_prefix: String,
    /// Delay before reading a tab that is still loading.
    #[serde(default = "default_load_settle_ms")]
    pub load_settle_ms: u64,
}

fn default_max_name_length() -> usize {
    100
}

fn default_uid_prefix() -> String {
    "e".to_string()
}

fn default_load_settle_ms() -> u64 {
    1000
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_name_length: default_max_name_length(),
            uid_prefix: default_uid_prefix(),
            load_settle_ms: default_load_settle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpConfig {
    /// Upper bound for a single command round trip.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Pause after click/fill so the page can react before the next call.
    #[serde(default = "default_action_settle_ms")]
    pub action_settle_ms: u64,
}

fn default_command_timeout_ms() -> u64 {
    30_000
}

fn default_action_settle_ms() -> u64 {
    300
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            action_settle_ms: default_action_settle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    #[serde(default = "default_context_levels")]
    pub default_context_levels: usize,
}

fn default_context_levels() -> usize {
    1
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_context_levels: default_context_levels(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub cdp: CdpConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.snapshot.uid_prefix.is_empty()
            || !self.snapshot.uid_prefix.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(Error::Config(format!(
                "snapshot.uidPrefix must be non-empty ASCII letters, got '{}'",
                self.snapshot.uid_prefix
            )));
        }
        if self.snapshot.max_name_length < 8 {
            return Err(Error::Config("snapshot.maxNameLength must be at least 8".into()));
        }
        if self.cdp.command_timeout_ms == 0 {
            return Err(Error::Config("cdp.commandTimeoutMs must be positive".into()));
        }
        Ok(())
    }
}
