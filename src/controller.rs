//! Front-end glue: the single owner of the session collection.
//!
//! Each user action runs against the store, host and clipboard and comes back
//! as a [`Notice`] to show the user. Failures are reported the same way and
//! never leave the controller unusable.

use crate::capture::capture_open_tabs;
use crate::config::Config;
use crate::host::{BrowserHost, Clipboard};
use crate::options::{RestoreOptions, RestoreTarget};
use crate::restore::{RestoreOutcome, Restorer};
use crate::session::transfer::{read_import_file, write_export};
use crate::session::{
    DeletedSession, SESSIONS_KEY, Session, SessionError, SessionId, SessionStore, TabSnapshot,
};
use crate::storage::KeyValueStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Message for the user describing how an action went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// The action can be undone with [`Controller::undo_delete`].
    pub undo_available: bool,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            undo_available: false,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    #[must_use]
    fn with_undo(mut self) -> Self {
        self.undo_available = true;
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<SessionError> for Notice {
    fn from(e: SessionError) -> Self {
        Self::error(e.to_string())
    }
}

pub struct Controller {
    store: SessionStore,
    options: RestoreOptions,
    kv: Arc<dyn KeyValueStore>,
    host: Arc<dyn BrowserHost>,
    clipboard: Arc<dyn Clipboard>,
    pending_undo: Option<DeletedSession>,
    max_import_bytes: u64,
}

impl Controller {
    /// Load sessions and restore options from `kv`.
    pub async fn open(
        config: &Config,
        kv: Arc<dyn KeyValueStore>,
        host: Arc<dyn BrowserHost>,
        clipboard: Arc<dyn Clipboard>,
    ) -> crate::Result<Self> {
        let store = SessionStore::load(kv.clone())
            .await?
            .with_undo_window(config.undo_window());
        let options = RestoreOptions::load(kv.as_ref()).await?;

        Ok(Self {
            store,
            options,
            kv,
            host,
            clipboard,
            pending_undo: None,
            max_import_bytes: config.max_import_bytes,
        })
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn options(&self) -> RestoreOptions {
        self.options
    }

    pub fn pending_undo(&self) -> Option<&DeletedSession> {
        self.pending_undo.as_ref()
    }

    /// Sessions for display, pinned first then newest first.
    pub fn list(&self, search: Option<&str>) -> Vec<&Session> {
        self.store.list(search)
    }

    /// Save the browser's open tabs as a new session.
    pub async fn save_current(&mut self, name: Option<&str>) -> Notice {
        let (tabs, warning) = match self.capture().await {
            Ok(captured) => captured,
            Err(notice) => return notice,
        };

        let requested = name.map(str::trim).filter(|n| !n.is_empty());
        match self.store.save(tabs, requested).await {
            Ok(session) => {
                let notice = if requested.is_some_and(|r| r != session.name) {
                    Notice::warning(format!(
                        "A session with that name already exists; saved as '{}'",
                        session.name
                    ))
                } else {
                    Notice::info(format!("Saved session '{}'", session.name))
                };
                with_warning(notice, warning)
            }
            Err(e) => e.into(),
        }
    }

    /// Replace a session's tabs with the browser's open tabs, keeping its name.
    pub async fn overwrite_with_current(&mut self, id: &SessionId) -> Notice {
        let Some(name) = self.store.get(id).map(|s| s.name.clone()) else {
            return SessionError::NotFound(id.to_string()).into();
        };
        let (tabs, warning) = match self.capture().await {
            Ok(captured) => captured,
            Err(notice) => return notice,
        };

        match self.store.overwrite(id, tabs, &name).await {
            Ok(session) => with_warning(
                Notice::info(format!("Updated session '{}'", session.name)),
                warning,
            ),
            Err(e) => e.into(),
        }
    }

    pub async fn rename(&mut self, id: &SessionId, name: &str) -> Notice {
        match self.store.rename(id, name).await {
            Ok(session) => Notice::info(format!("Renamed to '{}'", session.name)),
            Err(e) => e.into(),
        }
    }

    pub async fn toggle_pin(&mut self, id: &SessionId) -> Notice {
        match self.store.toggle_pin(id).await {
            Ok(true) => Notice::info("Session pinned"),
            Ok(false) => Notice::info("Session unpinned"),
            Err(e) => e.into(),
        }
    }

    /// Delete a session. It can be brought back until its undo window ends.
    ///
    /// Any earlier pending undo is dropped.
    pub async fn delete(&mut self, id: &SessionId) -> Notice {
        match self.store.delete(id).await {
            Ok(deleted) => {
                let notice = Notice::info(format!("Deleted '{}'", deleted.session.name)).with_undo();
                self.pending_undo = Some(deleted);
                notice
            }
            Err(e) => e.into(),
        }
    }

    /// Put the last deleted session back where it was.
    pub async fn undo_delete(&mut self, now: DateTime<Utc>) -> Notice {
        let Some(deleted) = self.pending_undo.take() else {
            return Notice::warning("Nothing to undo");
        };
        if deleted.is_expired(now) {
            return SessionError::UndoExpired.into();
        }

        match self
            .store
            .insert_at(deleted.index, deleted.session.clone())
            .await
        {
            Ok(session) => Notice::info(format!("Restored '{}'", session.name)),
            Err(e) => {
                // Still within the window; allow another try.
                self.pending_undo = Some(deleted);
                e.into()
            }
        }
    }

    /// Drop the pending undo once its window has passed. Returns whether it was dropped.
    pub fn expire_undo(&mut self, now: DateTime<Utc>) -> bool {
        if self.pending_undo.as_ref().is_some_and(|d| d.is_expired(now)) {
            self.pending_undo = None;
            return true;
        }
        false
    }

    /// Reopen a session's tabs using the current restore options.
    pub async fn restore(&self, id: &SessionId) -> Notice {
        let Some(session) = self.store.get(id) else {
            return SessionError::NotFound(id.to_string()).into();
        };

        let restorer = Restorer::new(self.host.as_ref(), self.options);
        match restorer.restore(session).await {
            Ok(report) if report.outcome == RestoreOutcome::PartialFailure => Notice::warning(
                format!("Could not open any tab from '{}'", session.name),
            ),
            Ok(report) if report.failed() > 0 || !report.grouping_errors.is_empty() => {
                Notice::warning(format!(
                    "Restored '{}' ({} of {} tabs, {} group errors)",
                    session.name,
                    report.restored(),
                    report.created.len(),
                    report.grouping_errors.len()
                ))
            }
            Ok(_) => Notice::info(format!("Restored '{}'", session.name)),
            Err(e) => Notice::error(format!("Failed to restore '{}': {e}", session.name)),
        }
    }

    /// Copy a session's URLs to the clipboard, one per line.
    pub async fn copy_urls(&self, id: &SessionId) -> Notice {
        let Some(session) = self.store.get(id) else {
            return SessionError::NotFound(id.to_string()).into();
        };

        let urls: Vec<&str> = session.urls().collect();
        if urls.is_empty() {
            return Notice::warning("No URLs to copy");
        }

        match self.clipboard.write_text(&urls.join("\n")).await {
            Ok(()) => Notice::info(format!("Copied {} URLs", urls.len())),
            Err(e) => Notice::error(e.to_string()),
        }
    }

    /// Write a backup file of all sessions into `dir`.
    pub async fn export(&self, dir: &Path, date: NaiveDate) -> Notice {
        match write_export(dir, self.store.sessions(), date).await {
            Ok(path) => Notice::info(format!(
                "Exported {} sessions to {}",
                self.store.len(),
                path.display()
            )),
            Err(e) => e.into(),
        }
    }

    /// Merge sessions from a backup file.
    pub async fn import(&mut self, path: &Path) -> Notice {
        let records = match read_import_file(path, self.max_import_bytes).await {
            Ok(records) => records,
            Err(e) => return e.into(),
        };

        match self.store.import(records).await {
            Ok(summary) if summary.dropped > 0 => Notice::warning(format!(
                "Imported {} sessions, skipped {} invalid",
                summary.imported, summary.dropped
            )),
            Ok(summary) => Notice::info(format!("Imported {} sessions", summary.imported)),
            Err(e) => e.into(),
        }
    }

    pub async fn set_restore_delay(&mut self, delay_secs: u32) -> Notice {
        match self.options.set_delay(self.kv.as_ref(), delay_secs).await {
            Ok(()) => Notice::info(format!("Restore delay set to {delay_secs}s")),
            Err(e) => Notice::error(format!("Failed to save option: {e}")),
        }
    }

    pub async fn set_restore_target(&mut self, target: RestoreTarget) -> Notice {
        match self.options.set_target(self.kv.as_ref(), target).await {
            Ok(()) => Notice::info(format!("Restore target set to {target}")),
            Err(e) => Notice::error(format!("Failed to save option: {e}")),
        }
    }

    /// Another writer replaced a storage key.
    pub fn on_storage_changed(&mut self, key: &str, value: Option<Value>) {
        if key == SESSIONS_KEY {
            tracing::debug!("Sessions changed in storage, reloading");
            self.store.replace_from_storage(value);
        }
    }

    async fn capture(&self) -> Result<(Vec<TabSnapshot>, Option<String>), Notice> {
        let capture = capture_open_tabs(self.host.as_ref())
            .await
            .map_err(|e| Notice::error(format!("Failed to read open tabs: {e}")))?;

        let warning = capture
            .warnings
            .iter()
            .map(ToString::to_string)
            .reduce(|a, b| format!("{a}; {b}"));
        Ok((capture.tabs, warning))
    }
}

/// Attach a capture warning to a successful notice.
fn with_warning(notice: Notice, warning: Option<String>) -> Notice {
    match warning {
        Some(warning) => Notice::warning(format!("{} ({warning})", notice.message)),
        None => notice,
    }
}
