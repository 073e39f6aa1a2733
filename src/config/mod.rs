use crate::session::transfer::MAX_IMPORT_BYTES;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,

    /// Seconds a deleted session can be brought back. Default: 4.
    pub undo_window_secs: u64,

    /// Largest import file accepted, in bytes. Default: 10 MiB.
    pub max_import_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("tabhaiku"))
            .unwrap_or_else(|| PathBuf::from(".tabhaiku"));

        Self {
            data_dir,
            undo_window_secs: 4,
            max_import_bytes: MAX_IMPORT_BYTES,
        }
    }
}

impl Config {
    /// Path to the key/value storage database.
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join("storage.db")
    }

    pub fn undo_window(&self) -> TimeDelta {
        i64::try_from(self.undo_window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or_else(TimeDelta::max_value)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("tabhaiku").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".tabhaiku/config.toml"))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}
