//! Saved tab sessions.
//!
//! A session is a named, ordered snapshot of browser tabs (with their group
//! membership) captured at one point in time. This module holds the data model
//! plus validation, naming, persistence and import/export of sessions.

mod naming;
mod reconcile;
mod store;
pub mod transfer;
mod validate;

pub use naming::{default_session_name, generate_id_avoiding, generate_unique_id, resolve_unique_name};
pub use reconcile::{MergeOutcome, merge};
pub use store::{DeletedSession, ImportSummary, SESSIONS_KEY, SessionError, SessionStore};
pub use validate::{is_valid_session, is_valid_tab, is_valid_url};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Maximum length of a session name, in characters.
pub const SESSION_NAME_MAX_LENGTH: usize = 200;

/// `groupId` of a tab that does not belong to any tab group.
pub const TAB_GROUP_ID_NONE: i64 = -1;

/// Session identifier of the form `"<creationEpochMillis>-<suffix>"`.
///
/// The leading component is the creation time and is what sessions are
/// sorted by. Imported files may carry plain numeric ids; those are kept as
/// their decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creation time in epoch milliseconds, parsed from the leading component.
    #[must_use]
    pub fn timestamp_millis(&self) -> Option<i64> {
        let head = self.0.split('-').next()?;
        head.parse().ok()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Number(number) => Self(number.to_string()),
        })
    }
}

/// Tab group metadata captured at save time.
///
/// The live group may be gone by the time the session is restored, so a new
/// group is created from this snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_group_color")]
    pub color: String,
    #[serde(default)]
    pub collapsed: bool,
}

fn default_group_color() -> String {
    "grey".to_string()
}

/// Captured state of one browser tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSnapshot {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default = "ungrouped", deserialize_with = "group_id_from_number")]
    pub group_id: i64,
    /// Present only when `group_id` named a real group at capture time.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "group_info_or_none"
    )]
    pub group_info: Option<GroupInfo>,
}

fn ungrouped() -> i64 {
    TAB_GROUP_ID_NONE
}

/// Any JSON number is accepted as a group id. Integral floats are converted;
/// anything that is not a whole number in `i64` range counts as ungrouped.
fn group_id_from_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    Ok(number
        .as_i64()
        .or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        })
        .unwrap_or(TAB_GROUP_ID_NONE))
}

/// Group metadata that does not have the expected shape is dropped, not the tab.
fn group_info_or_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<GroupInfo>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

/// Only a literal `true` pins; `null` or any other value reads as unpinned.
fn pinned_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(
        serde_json::Value::deserialize(deserializer)?,
        serde_json::Value::Bool(true)
    ))
}

impl TabSnapshot {
    /// An ungrouped, unpinned tab.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            pinned: false,
            group_id: TAB_GROUP_ID_NONE,
            group_info: None,
        }
    }

    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.group_id > TAB_GROUP_ID_NONE
    }
}

/// A named, timestamped bundle of tabs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub tabs: Vec<TabSnapshot>,
    #[serde(default, deserialize_with = "pinned_flag")]
    pub is_pinned: bool,
}

impl Session {
    /// Creation time, recovered from the id.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.id.timestamp_millis()?)
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.tabs.iter().map(|tab| tab.url.as_str())
    }

    /// Number of distinct tab groups among the saved tabs.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.tabs
            .iter()
            .filter(|tab| tab.is_grouped())
            .map(|tab| tab.group_id)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Case-insensitive match against the name and every tab's URL and title.
    /// `term` must already be lowercase.
    pub(crate) fn matches(&self, term: &str) -> bool {
        self.name.to_lowercase().contains(term)
            || self.tabs.iter().any(|tab| {
                tab.url.to_lowercase().contains(term)
                    || tab
                        .title
                        .as_ref()
                        .is_some_and(|title| title.to_lowercase().contains(term))
            })
    }
}
