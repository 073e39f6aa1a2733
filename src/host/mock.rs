//! Scripted browser and clipboard for tests.

use super::{
    BrowserHost, Clipboard, ClipboardError, CreateTab, CreatedTab, GroupId, HostError, NewWindow,
    OpenTab, TabGroup, TabId, WindowId,
};
use crate::session::GroupInfo;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) const CURRENT_WINDOW: WindowId = 1;
pub(crate) const NEW_WINDOW: WindowId = 100;
pub(crate) const PLACEHOLDER_TAB: TabId = 1000;
const FIRST_CREATED_TAB: TabId = 2000;
const FIRST_GROUP: GroupId = 500;

/// Mutating calls received by [`MockHost`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HostCall {
    CreateWindow,
    FocusWindow(WindowId),
    RemoveWindow(WindowId),
    CreateTab(CreateTab),
    ActivateTab(TabId),
    RemoveTab(TabId),
    GroupTabs(WindowId, Vec<TabId>),
    UpdateGroup(GroupId, GroupInfo),
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<HostCall>,
    open_tabs: Vec<OpenTab>,
    groups: Vec<TabGroup>,
    failing_urls: HashSet<String>,
    fail_tab_query: bool,
    fail_group_query: bool,
    fail_grouping: bool,
    next_tab: TabId,
    next_group: GroupId,
}

#[derive(Debug)]
pub(crate) struct MockHost {
    state: Mutex<State>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                next_tab: FIRST_CREATED_TAB,
                next_group: FIRST_GROUP,
                ..State::default()
            }),
        }
    }
}

impl MockHost {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn with_open_tabs(self, tabs: Vec<OpenTab>, groups: Vec<TabGroup>) -> Self {
        {
            let mut state = self.state();
            state.open_tabs = tabs;
            state.groups = groups;
        }
        self
    }

    /// Make `create_tab` fail for this URL.
    pub(crate) fn fail_url(self, url: &str) -> Self {
        self.state().failing_urls.insert(url.to_string());
        self
    }

    pub(crate) fn fail_tab_query(self) -> Self {
        self.state().fail_tab_query = true;
        self
    }

    pub(crate) fn fail_group_query(self) -> Self {
        self.state().fail_group_query = true;
        self
    }

    pub(crate) fn fail_grouping(self) -> Self {
        self.state().fail_grouping = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<HostCall> {
        self.state().calls.clone()
    }

    /// URLs of every tab creation attempted so far, failed ones included.
    pub(crate) fn requested_urls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::CreateTab(tab) => Some(tab.url),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: HostCall) {
        self.state().calls.push(call);
    }
}

pub(crate) fn open_tab(id: TabId, url: &str, group_id: GroupId) -> OpenTab {
    OpenTab {
        id,
        window_id: CURRENT_WINDOW,
        url: Some(url.to_string()),
        title: Some(format!("Title {id}")),
        pinned: false,
        group_id,
    }
}

#[async_trait]
impl BrowserHost for MockHost {
    async fn query_tabs(&self) -> Result<Vec<OpenTab>, HostError> {
        let state = self.state();
        if state.fail_tab_query {
            return Err(HostError::Failed("tabs.query".into()));
        }
        Ok(state.open_tabs.clone())
    }

    async fn list_windows(&self) -> Result<Vec<WindowId>, HostError> {
        let state = self.state();
        let mut windows: Vec<WindowId> = state.open_tabs.iter().map(|t| t.window_id).collect();
        windows.sort_unstable();
        windows.dedup();
        Ok(windows)
    }

    async fn query_tab_groups(&self, window_id: WindowId) -> Result<Vec<TabGroup>, HostError> {
        let state = self.state();
        if state.fail_group_query {
            return Err(HostError::Failed("tabGroups.query".into()));
        }
        Ok(state
            .groups
            .iter()
            .filter(|g| g.window_id == window_id)
            .cloned()
            .collect())
    }

    async fn current_window(&self) -> Result<WindowId, HostError> {
        Ok(CURRENT_WINDOW)
    }

    async fn create_window(&self) -> Result<NewWindow, HostError> {
        self.record(HostCall::CreateWindow);
        Ok(NewWindow {
            id: NEW_WINDOW,
            initial_tab: Some(PLACEHOLDER_TAB),
        })
    }

    async fn focus_window(&self, window_id: WindowId) -> Result<(), HostError> {
        self.record(HostCall::FocusWindow(window_id));
        Ok(())
    }

    async fn remove_window(&self, window_id: WindowId) -> Result<(), HostError> {
        self.record(HostCall::RemoveWindow(window_id));
        Ok(())
    }

    async fn create_tab(&self, tab: CreateTab) -> Result<CreatedTab, HostError> {
        let mut state = self.state();
        state.calls.push(HostCall::CreateTab(tab.clone()));
        if state.failing_urls.contains(&tab.url) {
            return Err(HostError::Failed(format!("cannot open {}", tab.url)));
        }
        let created = CreatedTab {
            id: state.next_tab,
            pinned: tab.pinned,
        };
        state.next_tab += 1;
        Ok(created)
    }

    async fn activate_tab(&self, tab_id: TabId) -> Result<(), HostError> {
        self.record(HostCall::ActivateTab(tab_id));
        Ok(())
    }

    async fn remove_tab(&self, tab_id: TabId) -> Result<(), HostError> {
        self.record(HostCall::RemoveTab(tab_id));
        Ok(())
    }

    async fn group_tabs(&self, window_id: WindowId, tab_ids: &[TabId]) -> Result<GroupId, HostError> {
        let mut state = self.state();
        state.calls.push(HostCall::GroupTabs(window_id, tab_ids.to_vec()));
        if state.fail_grouping {
            return Err(HostError::Failed("tabs.group".into()));
        }
        let id = state.next_group;
        state.next_group += 1;
        Ok(id)
    }

    async fn update_group(&self, group_id: GroupId, info: &GroupInfo) -> Result<(), HostError> {
        self.record(HostCall::UpdateGroup(group_id, info.clone()));
        Ok(())
    }
}

/// Clipboard that keeps the last text written, or always fails.
#[derive(Debug, Default)]
pub(crate) struct MockClipboard {
    text: Mutex<Option<String>>,
    fail: bool,
}

impl MockClipboard {
    pub(crate) fn failing() -> Self {
        Self {
            text: Mutex::default(),
            fail: true,
        }
    }

    pub(crate) fn text(&self) -> Option<String> {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Clipboard for MockClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if self.fail {
            return Err(ClipboardError("permission denied".into()));
        }
        *self.text.lock().unwrap_or_else(PoisonError::into_inner) = Some(text.to_string());
        Ok(())
    }
}
