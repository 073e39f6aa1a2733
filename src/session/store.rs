//! Session persistence over the durable key/value store.
//!
//! [`SessionStore`] owns the authoritative in-memory collection. Every
//! mutation runs as one synchronous update of that collection followed by a
//! single write of the whole collection; if the write fails the collection is
//! rolled back to its state before the operation.

use super::{
    MergeOutcome, SESSION_NAME_MAX_LENGTH, Session, SessionId, TabSnapshot, default_session_name,
    generate_id_avoiding, is_valid_tab, is_valid_url, merge, resolve_unique_name,
};
use crate::storage::{KeyValueStore, StorageError};
use chrono::{DateTime, Local, TimeDelta, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Storage key holding the session collection.
pub const SESSIONS_KEY: &str = "sessions";

/// Default time a deleted session can be brought back.
const DEFAULT_UNDO_WINDOW_SECS: i64 = 4;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session name cannot be empty")]
    EmptyName,

    #[error("Session name cannot exceed {max} characters")]
    NameTooLong { max: usize },

    #[error("A session named '{0}' already exists")]
    DuplicateName(String),

    #[error("No valid tabs to save")]
    NoValidTabs,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid import file: {0}")]
    InvalidImportFormat(String),

    #[error("Import file too large: {size} bytes (max {max})")]
    ImportTooLarge { size: u64, max: u64 },

    #[error("No sessions to export")]
    NothingToExport,

    #[error("Undo window has expired")]
    UndoExpired,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A session removed by [`SessionStore::delete`].
///
/// The removal is already persisted. Until `expires_at` the caller may put the
/// record back with [`SessionStore::insert_at`]; the timer is the caller's.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedSession {
    pub session: Session,
    pub index: usize,
    pub expires_at: DateTime<Utc>,
}

impl DeletedSession {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Counts reported by [`SessionStore::import`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub dropped: usize,
}

pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    sessions: Vec<Session>,
    undo_window: TimeDelta,
}

impl SessionStore {
    /// Load the collection from `kv`.
    ///
    /// Stored records go through the same validation and id/name
    /// reconciliation as imports; anything invalid is dropped.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Result<Self, SessionError> {
        let stored = kv.get(SESSIONS_KEY).await?;
        Ok(Self {
            kv,
            sessions: sessions_from_storage(stored),
            undo_window: TimeDelta::seconds(DEFAULT_UNDO_WINDOW_SECS),
        })
    }

    #[must_use]
    pub fn with_undo_window(mut self, undo_window: TimeDelta) -> Self {
        self.undo_window = undo_window;
        self
    }

    /// Adopt a collection written to storage by someone else.
    pub fn replace_from_storage(&mut self, stored: Option<Value>) {
        self.sessions = sessions_from_storage(stored);
    }

    /// Sessions in storage order.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == *id)
    }

    /// Sessions for display: pinned first, then newest first.
    ///
    /// A non-blank `search` keeps only sessions whose name, or any tab URL or
    /// title, contains it (case-insensitive).
    pub fn list(&self, search: Option<&str>) -> Vec<&Session> {
        let term = search
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());

        let mut listed: Vec<&Session> = self
            .sessions
            .iter()
            .filter(|s| term.as_deref().is_none_or(|t| s.matches(t)))
            .collect();

        listed.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then_with(|| b.id.timestamp_millis().cmp(&a.id.timestamp_millis()))
        });
        listed
    }

    /// Save `tabs` as a new session.
    ///
    /// Unsafe tabs are dropped; nothing left is [`SessionError::NoValidTabs`].
    /// A blank name becomes a timestamped placeholder, and a taken name is
    /// made unique.
    pub async fn save(
        &mut self,
        tabs: Vec<TabSnapshot>,
        name: Option<&str>,
    ) -> Result<Session, SessionError> {
        let tabs = safe_tabs(tabs)?;
        let requested = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => check_length(name)?.to_string(),
            None => default_session_name(Local::now()),
        };

        let session = self
            .commit(|sessions| {
                let session = Session {
                    id: generate_id_avoiding(&id_set(sessions)),
                    name: resolve_unique_name(&requested, &name_set(sessions, None)),
                    tabs,
                    is_pinned: false,
                };
                sessions.push(session.clone());
                Ok(session)
            })
            .await?;

        tracing::debug!(id = %session.id, name = %session.name, tabs = session.tabs.len(), "Saved session");
        Ok(session)
    }

    /// Replace the tabs of an existing session and set its name.
    ///
    /// The pin state is kept.
    pub async fn overwrite(
        &mut self,
        id: &SessionId,
        tabs: Vec<TabSnapshot>,
        name: &str,
    ) -> Result<Session, SessionError> {
        let tabs = safe_tabs(tabs)?;
        let name = check_name(name)?.to_string();

        self.commit(|sessions| {
            let index = position(sessions, id)?;
            if name_set(sessions, Some(id)).contains(&name) {
                return Err(SessionError::DuplicateName(name));
            }
            let session = &mut sessions[index];
            session.tabs = tabs;
            session.name = name;
            Ok(session.clone())
        })
        .await
    }

    /// Rename a session. Renaming to the current name writes nothing.
    pub async fn rename(&mut self, id: &SessionId, new_name: &str) -> Result<Session, SessionError> {
        let current = self
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let name = check_name(new_name)?;
        if name == current.name {
            return Ok(current.clone());
        }
        let name = name.to_string();

        self.commit(|sessions| {
            let index = position(sessions, id)?;
            if name_set(sessions, Some(id)).contains(&name) {
                return Err(SessionError::DuplicateName(name));
            }
            sessions[index].name = name;
            Ok(sessions[index].clone())
        })
        .await
    }

    /// Flip the pin flag, returning the new state.
    pub async fn toggle_pin(&mut self, id: &SessionId) -> Result<bool, SessionError> {
        self.commit(|sessions| {
            let index = position(sessions, id)?;
            let session = &mut sessions[index];
            session.is_pinned = !session.is_pinned;
            Ok(session.is_pinned)
        })
        .await
    }

    /// Remove a session and persist the removal immediately.
    pub async fn delete(&mut self, id: &SessionId) -> Result<DeletedSession, SessionError> {
        let expires_at = Utc::now()
            .checked_add_signed(self.undo_window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let deleted = self
            .commit(|sessions| {
                let index = position(sessions, id)?;
                Ok(DeletedSession {
                    session: sessions.remove(index),
                    index,
                    expires_at,
                })
            })
            .await?;

        tracing::debug!(id = %deleted.session.id, index = deleted.index, "Deleted session");
        Ok(deleted)
    }

    /// Put a session back at `index` (clamped to the collection length).
    ///
    /// The record is kept as-is unless its id or name has been taken since it
    /// was removed, in which case they are made unique like an import.
    pub async fn insert_at(&mut self, index: usize, session: Session) -> Result<Session, SessionError> {
        self.commit(|sessions| {
            let mut session = session;
            let ids = id_set(sessions);
            if ids.contains(&session.id) {
                session.id = generate_id_avoiding(&ids);
            }
            session.name = resolve_unique_name(&session.name, &name_set(sessions, None));
            sessions.insert(index.min(sessions.len()), session.clone());
            Ok(session)
        })
        .await
    }

    /// Merge raw records from an import file.
    ///
    /// Fails with [`SessionError::InvalidImportFormat`], writing nothing, when
    /// no record is valid.
    pub async fn import(&mut self, records: Vec<Value>) -> Result<ImportSummary, SessionError> {
        self.commit(|sessions| {
            let MergeOutcome {
                sessions: merged,
                imported,
                dropped,
            } = merge(sessions, records);
            if imported == 0 {
                return Err(SessionError::InvalidImportFormat(
                    "no valid sessions".to_string(),
                ));
            }
            *sessions = merged;
            Ok(ImportSummary { imported, dropped })
        })
        .await
    }

    /// Apply `update` and persist the whole collection, rolling back on any error.
    async fn commit<T>(
        &mut self,
        update: impl FnOnce(&mut Vec<Session>) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let snapshot = self.sessions.clone();

        let result = match update(&mut self.sessions) {
            Ok(result) => result,
            Err(e) => {
                self.sessions = snapshot;
                return Err(e);
            }
        };

        if let Err(e) = self.persist().await {
            tracing::warn!("Failed to write sessions, rolling back: {e}");
            self.sessions = snapshot;
            return Err(e.into());
        }

        Ok(result)
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let value = serde_json::to_value(&self.sessions)?;
        self.kv.set(SESSIONS_KEY, &value).await
    }
}

fn sessions_from_storage(stored: Option<Value>) -> Vec<Session> {
    let mut records = match stored {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(records)) => records,
        Some(_) => {
            tracing::warn!("Stored sessions are not a list, ignoring them");
            return Vec::new();
        }
    };

    let stripped: usize = records.iter_mut().map(keep_valid_tabs).sum();
    if stripped > 0 {
        tracing::warn!(stripped, "Ignored invalid tabs in stored sessions");
    }

    let outcome = merge(&[], records);
    if outcome.dropped > 0 {
        tracing::warn!(dropped = outcome.dropped, "Ignored invalid stored sessions");
    }
    outcome.sessions
}

/// Remove invalid tabs from a stored record so the rest of the session
/// survives. Returns how many were removed.
fn keep_valid_tabs(record: &mut Value) -> usize {
    let Some(tabs) = record.get_mut("tabs").and_then(Value::as_array_mut) else {
        return 0;
    };
    let before = tabs.len();
    tabs.retain(is_valid_tab);
    before - tabs.len()
}

fn safe_tabs(tabs: Vec<TabSnapshot>) -> Result<Vec<TabSnapshot>, SessionError> {
    let tabs: Vec<TabSnapshot> = tabs.into_iter().filter(|t| is_valid_url(&t.url)).collect();
    if tabs.is_empty() {
        return Err(SessionError::NoValidTabs);
    }
    Ok(tabs)
}

/// Trim and check a user-supplied name.
fn check_name(name: &str) -> Result<&str, SessionError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SessionError::EmptyName);
    }
    check_length(name)
}

fn check_length(name: &str) -> Result<&str, SessionError> {
    if name.chars().count() > SESSION_NAME_MAX_LENGTH {
        return Err(SessionError::NameTooLong {
            max: SESSION_NAME_MAX_LENGTH,
        });
    }
    Ok(name)
}

fn position(sessions: &[Session], id: &SessionId) -> Result<usize, SessionError> {
    sessions
        .iter()
        .position(|s| s.id == *id)
        .ok_or_else(|| SessionError::NotFound(id.to_string()))
}

fn id_set(sessions: &[Session]) -> HashSet<SessionId> {
    sessions.iter().map(|s| s.id.clone()).collect()
}

/// Names in use, optionally ignoring one session.
fn name_set(sessions: &[Session], except: Option<&SessionId>) -> HashSet<String> {
    sessions
        .iter()
        .filter(|s| Some(&s.id) != except)
        .map(|s| s.name.clone())
        .collect()
}
