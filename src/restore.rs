//! Replaying a saved session into the browser.
//!
//! A restore resolves its target window, creates the saved tabs one at a time
//! in their recorded order, recreates tab groups, then activates a tab and
//! focuses the window. Individual tab or group failures are logged and
//! skipped; only a restore that creates no tab at all is reported as a
//! [`RestoreOutcome::PartialFailure`].

use crate::host::{BrowserHost, CreateTab, CreatedTab, GroupId, HostError, TabId, WindowId};
use crate::options::{RestoreOptions, RestoreTarget};
use crate::session::{GroupInfo, Session};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("Could not open a window to restore into: {0}")]
    Host(#[from] HostError),
}

/// A saved tab group that could not be recreated. Never aborts a restore.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to recreate tab group {group_id}: {reason}")]
pub struct GroupingError {
    /// Group id recorded in the saved session.
    pub group_id: GroupId,
    pub reason: HostError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// At least one tab was created.
    Done,
    /// No tab could be created.
    PartialFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub outcome: RestoreOutcome,
    pub window_id: WindowId,
    /// One entry per saved tab, `None` where creation failed.
    pub created: Vec<Option<CreatedTab>>,
    pub grouping_errors: Vec<GroupingError>,
}

impl RestoreReport {
    pub fn restored(&self) -> usize {
        self.created.iter().flatten().count()
    }

    pub fn failed(&self) -> usize {
        self.created.len() - self.restored()
    }
}

struct TargetWindow {
    id: WindowId,
    /// Placeholder tab of a window we opened; removed once real tabs exist.
    initial_tab: Option<TabId>,
    fresh: bool,
}

/// Restores sessions against a browser host.
pub struct Restorer<'a> {
    host: &'a dyn BrowserHost,
    options: RestoreOptions,
}

impl<'a> Restorer<'a> {
    pub fn new(host: &'a dyn BrowserHost, options: RestoreOptions) -> Self {
        Self { host, options }
    }

    /// Restore `session`. Errors only when the target window cannot be resolved.
    pub async fn restore(&self, session: &Session) -> Result<RestoreReport, RestoreError> {
        let window = self.resolve_target().await?;
        info!(
            session = %session.id,
            tabs = session.tabs.len(),
            window = window.id,
            "Restoring session"
        );

        let created = self.create_tabs(session, window.id).await;
        let report = if created.iter().any(Option::is_some) {
            let grouping_errors = self.recreate_groups(session, &created, window.id).await;
            self.activate_and_focus(&created, &window).await;
            RestoreReport {
                outcome: RestoreOutcome::Done,
                window_id: window.id,
                created,
                grouping_errors,
            }
        } else {
            if window.fresh
                && let Err(e) = self.host.remove_window(window.id).await
            {
                warn!(window = window.id, "Failed to close empty restore window: {e}");
            }
            RestoreReport {
                outcome: RestoreOutcome::PartialFailure,
                window_id: window.id,
                created,
                grouping_errors: Vec::new(),
            }
        };

        info!(
            session = %session.id,
            restored = report.restored(),
            failed = report.failed(),
            group_errors = report.grouping_errors.len(),
            "Restore finished"
        );
        Ok(report)
    }

    async fn resolve_target(&self) -> Result<TargetWindow, HostError> {
        match self.options.target {
            RestoreTarget::NewWindow => {
                let window = self.host.create_window().await?;
                Ok(TargetWindow {
                    id: window.id,
                    initial_tab: window.initial_tab,
                    fresh: true,
                })
            }
            RestoreTarget::CurrentWindow => Ok(TargetWindow {
                id: self.host.current_window().await?,
                initial_tab: None,
                fresh: false,
            }),
        }
    }

    /// Create the tabs strictly one after another, pausing between them.
    async fn create_tabs(&self, session: &Session, window_id: WindowId) -> Vec<Option<CreatedTab>> {
        let delay = self.options.delay();
        let mut created = Vec::with_capacity(session.tabs.len());

        for (index, tab) in session.tabs.iter().enumerate() {
            if index > 0 && delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }

            let request = CreateTab {
                window_id,
                url: tab.url.clone(),
                pinned: tab.pinned,
                active: false,
            };
            match self.host.create_tab(request).await {
                Ok(tab) => {
                    debug!(index, tab = tab.id, "Created tab");
                    created.push(Some(tab));
                }
                Err(e) => {
                    warn!(index, url = %tab.url, "Failed to create tab: {e}");
                    created.push(None);
                }
            }
        }

        created
    }

    async fn recreate_groups(
        &self,
        session: &Session,
        created: &[Option<CreatedTab>],
        window_id: WindowId,
    ) -> Vec<GroupingError> {
        let mut errors = Vec::new();

        for group in planned_groups(session, created) {
            let result = async {
                let new_id = self.host.group_tabs(window_id, &group.tab_ids).await?;
                self.host.update_group(new_id, group.info).await
            }
            .await;

            if let Err(reason) = result {
                warn!(group = group.saved_id, "Failed to recreate tab group: {reason}");
                errors.push(GroupingError {
                    group_id: group.saved_id,
                    reason,
                });
            }
        }

        errors
    }

    async fn activate_and_focus(&self, created: &[Option<CreatedTab>], window: &TargetWindow) {
        let created_tabs = || created.iter().flatten();
        let active = created_tabs()
            .find(|tab| !tab.pinned)
            .or_else(|| created_tabs().next());

        if let Some(tab) = active
            && let Err(e) = self.host.activate_tab(tab.id).await
        {
            warn!(tab = tab.id, "Failed to activate tab: {e}");
        }
        if let Err(e) = self.host.focus_window(window.id).await {
            warn!(window = window.id, "Failed to focus window: {e}");
        }
        if let Some(initial) = window.initial_tab
            && let Err(e) = self.host.remove_tab(initial).await
        {
            debug!(tab = initial, "Failed to remove placeholder tab: {e}");
        }
    }
}

struct PlannedGroup<'s> {
    saved_id: GroupId,
    info: &'s GroupInfo,
    tab_ids: Vec<TabId>,
}

/// Groups to recreate, in order of first appearance, holding only tabs that
/// were actually created. Tabs without saved group metadata stay ungrouped.
fn planned_groups<'s>(session: &'s Session, created: &[Option<CreatedTab>]) -> Vec<PlannedGroup<'s>> {
    let mut groups: Vec<PlannedGroup<'s>> = Vec::new();

    for (tab, created) in session.tabs.iter().zip(created) {
        let (Some(info), Some(created)) = (&tab.group_info, created) else {
            continue;
        };
        if !tab.is_grouped() {
            continue;
        }
        match groups.iter_mut().find(|g| g.saved_id == tab.group_id) {
            Some(group) => group.tab_ids.push(created.id),
            None => groups.push(PlannedGroup {
                saved_id: tab.group_id,
                info,
                tab_ids: vec![created.id],
            }),
        }
    }

    groups
}
