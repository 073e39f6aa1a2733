//! Collaborators provided by the embedding browser.
//!
//! Session logic never talks to a browser directly: tab enumeration, window
//! and tab management, grouping and the clipboard all go through the traits
//! here so they can be backed by a real extension bridge or a test double.

#[cfg(test)]
pub(crate) mod mock;

use crate::session::GroupInfo;
use async_trait::async_trait;
use thiserror::Error;

pub type TabId = i64;
pub type WindowId = i64;
pub type GroupId = i64;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("Browser host unavailable: {0}")]
    Unavailable(String),

    #[error("Browser call failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Clipboard error: {0}")]
pub struct ClipboardError(pub String);

/// A tab currently open in the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTab {
    pub id: TabId,
    pub window_id: WindowId,
    /// Missing when the extension has no access to the tab's URL.
    pub url: Option<String>,
    pub title: Option<String>,
    pub pinned: bool,
    pub group_id: GroupId,
}

/// A live tab group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabGroup {
    pub id: GroupId,
    pub window_id: WindowId,
    pub title: Option<String>,
    pub color: String,
    pub collapsed: bool,
}

impl TabGroup {
    /// Snapshot of this group's presentation for saving.
    pub fn info(&self) -> GroupInfo {
        GroupInfo {
            title: self.title.clone().unwrap_or_default(),
            color: self.color.clone(),
            collapsed: self.collapsed,
        }
    }
}

/// A freshly opened window and the placeholder tab the browser put in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewWindow {
    pub id: WindowId,
    pub initial_tab: Option<TabId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTab {
    pub window_id: WindowId,
    pub url: String,
    pub pinned: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedTab {
    pub id: TabId,
    pub pinned: bool,
}

/// Window, tab and tab-group management of the host browser.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// All open tabs across all windows.
    async fn query_tabs(&self) -> Result<Vec<OpenTab>, HostError>;

    async fn list_windows(&self) -> Result<Vec<WindowId>, HostError>;

    async fn query_tab_groups(&self, window_id: WindowId) -> Result<Vec<TabGroup>, HostError>;

    /// The window the user is currently looking at.
    async fn current_window(&self) -> Result<WindowId, HostError>;

    /// Open a new focused window. Browsers put one placeholder tab in it.
    async fn create_window(&self) -> Result<NewWindow, HostError>;

    async fn focus_window(&self, window_id: WindowId) -> Result<(), HostError>;

    async fn remove_window(&self, window_id: WindowId) -> Result<(), HostError>;

    async fn create_tab(&self, tab: CreateTab) -> Result<CreatedTab, HostError>;

    async fn activate_tab(&self, tab_id: TabId) -> Result<(), HostError>;

    async fn remove_tab(&self, tab_id: TabId) -> Result<(), HostError>;

    /// Put `tab_ids` into a new group in `window_id`, returning the group id.
    async fn group_tabs(&self, window_id: WindowId, tab_ids: &[TabId]) -> Result<GroupId, HostError>;

    async fn update_group(&self, group_id: GroupId, info: &GroupInfo) -> Result<(), HostError>;
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Host used when no browser is attached. Every call fails with
/// [`HostError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedHost;

impl DetachedHost {
    fn unavailable<T>() -> Result<T, HostError> {
        Err(HostError::Unavailable("no browser attached".to_string()))
    }
}

#[async_trait]
impl BrowserHost for DetachedHost {
    async fn query_tabs(&self) -> Result<Vec<OpenTab>, HostError> {
        Self::unavailable()
    }

    async fn list_windows(&self) -> Result<Vec<WindowId>, HostError> {
        Self::unavailable()
    }

    async fn query_tab_groups(&self, _window_id: WindowId) -> Result<Vec<TabGroup>, HostError> {
        Self::unavailable()
    }

    async fn current_window(&self) -> Result<WindowId, HostError> {
        Self::unavailable()
    }

    async fn create_window(&self) -> Result<NewWindow, HostError> {
        Self::unavailable()
    }

    async fn focus_window(&self, _window_id: WindowId) -> Result<(), HostError> {
        Self::unavailable()
    }

    async fn remove_window(&self, _window_id: WindowId) -> Result<(), HostError> {
        Self::unavailable()
    }

    async fn create_tab(&self, _tab: CreateTab) -> Result<CreatedTab, HostError> {
        Self::unavailable()
    }

    async fn activate_tab(&self, _tab_id: TabId) -> Result<(), HostError> {
        Self::unavailable()
    }

    async fn remove_tab(&self, _tab_id: TabId) -> Result<(), HostError> {
        Self::unavailable()
    }

    async fn group_tabs(&self, _window_id: WindowId, _tab_ids: &[TabId]) -> Result<GroupId, HostError> {
        Self::unavailable()
    }

    async fn update_group(&self, _group_id: GroupId, _info: &GroupInfo) -> Result<(), HostError> {
        Self::unavailable()
    }
}
