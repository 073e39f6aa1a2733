//! Snapshot of the browser's open tabs, ready to be saved as a session.

use crate::host::{BrowserHost, HostError, TabGroup};
use crate::session::{TAB_GROUP_ID_NONE, TabSnapshot, is_valid_url};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureWarning {
    /// Tab groups could not be read; tabs were captured without group metadata.
    GroupMetadataUnavailable(String),
}

impl fmt::Display for CaptureWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GroupMetadataUnavailable(reason) => {
                write!(f, "Could not read tab groups ({reason}); saving without them")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capture {
    pub tabs: Vec<TabSnapshot>,
    pub warnings: Vec<CaptureWarning>,
}

/// Capture every open tab with a safe URL, across all windows.
///
/// Failing to list tabs is an error. Failing to read tab groups is not: the
/// tabs are captured without `groupInfo` and a warning is recorded.
pub async fn capture_open_tabs(host: &dyn BrowserHost) -> Result<Capture, HostError> {
    let open = host.query_tabs().await?;
    if open.is_empty() {
        return Ok(Capture::default());
    }

    let mut warnings = Vec::new();
    let groups = match query_all_groups(host).await {
        Ok(groups) => groups,
        Err(e) => {
            tracing::warn!("Failed to read tab groups: {e}");
            warnings.push(CaptureWarning::GroupMetadataUnavailable(e.to_string()));
            Vec::new()
        }
    };

    let tabs = open
        .into_iter()
        .filter_map(|tab| {
            let url = tab.url.filter(|url| is_valid_url(url))?;
            let group_info = groups
                .iter()
                .find(|g| tab.group_id > TAB_GROUP_ID_NONE && g.id == tab.group_id)
                .map(TabGroup::info);
            Some(TabSnapshot {
                url,
                title: tab.title,
                pinned: tab.pinned,
                group_id: tab.group_id,
                group_info,
            })
        })
        .collect();

    Ok(Capture { tabs, warnings })
}

async fn query_all_groups(host: &dyn BrowserHost) -> Result<Vec<TabGroup>, HostError> {
    let mut groups = Vec::new();
    for window in host.list_windows().await? {
        groups.extend(host.query_tab_groups(window).await?);
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{CURRENT_WINDOW, MockHost, open_tab};
    use crate::session::GroupInfo;

    fn work_group() -> TabGroup {
        TabGroup {
            id: 7,
            window_id: CURRENT_WINDOW,
            title: Some("Work".into()),
            color: "blue".into(),
            collapsed: false,
        }
    }

    #[tokio::test]
    async fn test_captures_safe_tabs_with_groups() {
        let mut no_url = open_tab(4, "https://hidden.com", -1);
        no_url.url = None;
        let host = MockHost::default().with_open_tabs(
            vec![
                open_tab(1, "https://a.com", 7),
                open_tab(2, "chrome://settings", -1),
                open_tab(3, "https://b.com", -1),
                no_url,
            ],
            vec![work_group()],
        );

        let capture = capture_open_tabs(&host).await.unwrap();
        assert!(capture.warnings.is_empty());
        assert_eq!(capture.tabs.len(), 2);
        assert_eq!(capture.tabs[0].url, "https://a.com");
        assert_eq!(capture.tabs[0].title.as_deref(), Some("Title 1"));
        assert_eq!(
            capture.tabs[0].group_info,
            Some(GroupInfo {
                title: "Work".into(),
                color: "blue".into(),
                collapsed: false,
            })
        );
        assert_eq!(capture.tabs[1].group_id, -1);
        assert!(capture.tabs[1].group_info.is_none());
    }

    #[tokio::test]
    async fn test_group_query_failure_degrades() {
        let host = MockHost::default()
            .with_open_tabs(vec![open_tab(1, "https://a.com", 7)], vec![work_group()])
            .fail_group_query();

        let capture = capture_open_tabs(&host).await.unwrap();
        assert_eq!(capture.tabs.len(), 1);
        assert_eq!(capture.tabs[0].group_id, 7);
        assert!(capture.tabs[0].group_info.is_none());
        assert!(matches!(
            capture.warnings.as_slice(),
            [CaptureWarning::GroupMetadataUnavailable(_)]
        ));
    }

    #[tokio::test]
    async fn test_tab_query_failure_is_error() {
        let host = MockHost::default().fail_tab_query();
        assert!(capture_open_tabs(&host).await.is_err());
    }

    #[tokio::test]
    async fn test_no_tabs() {
        let capture = capture_open_tabs(&MockHost::default()).await.unwrap();
        assert!(capture.tabs.is_empty());
    }
}
