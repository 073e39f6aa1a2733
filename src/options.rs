//! User restore preferences, persisted in the key/value store.

use crate::storage::{KeyValueStore, StorageError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DELAY_KEY: &str = "restoreDelay";
pub const TARGET_KEY: &str = "restoreTarget";

/// Where restored tabs are opened.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreTarget {
    NewWindow,
    #[default]
    CurrentWindow,
}

impl fmt::Display for RestoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NewWindow => "new-window",
            Self::CurrentWindow => "current-window",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Seconds to wait between creating consecutive tabs.
    pub delay_secs: u32,
    pub target: RestoreTarget,
}

impl RestoreOptions {
    /// Read both options; missing or malformed values fall back to defaults.
    pub async fn load(kv: &dyn KeyValueStore) -> Result<Self, StorageError> {
        let defaults = Self::default();
        Ok(Self {
            delay_secs: read_or(kv, DELAY_KEY, defaults.delay_secs).await?,
            target: read_or(kv, TARGET_KEY, defaults.target).await?,
        })
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.delay_secs))
    }

    /// Change the delay and persist it.
    ///
    /// The new value is kept even when the write fails.
    pub async fn set_delay(
        &mut self,
        kv: &dyn KeyValueStore,
        delay_secs: u32,
    ) -> Result<(), StorageError> {
        self.delay_secs = delay_secs;
        kv.set(DELAY_KEY, &serde_json::to_value(delay_secs)?).await
    }

    /// Change the restore target and persist it.
    ///
    /// The new value is kept even when the write fails.
    pub async fn set_target(
        &mut self,
        kv: &dyn KeyValueStore,
        target: RestoreTarget,
    ) -> Result<(), StorageError> {
        self.target = target;
        kv.set(TARGET_KEY, &serde_json::to_value(target)?).await
    }
}

async fn read_or<T: DeserializeOwned>(
    kv: &dyn KeyValueStore,
    key: &str,
    default: T,
) -> Result<T, StorageError> {
    let Some(value) = kv.get(key).await? else {
        return Ok(default);
    };
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            tracing::warn!(key, "Ignoring malformed option: {e}");
            Ok(default)
        }
    }
}
