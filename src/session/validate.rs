//! Structural checks for session records read from import files or storage.

use super::SESSION_NAME_MAX_LENGTH;
use serde_json::{Map, Value};
use url::Url;

/// URL schemes a tab may be captured or restored with.
const SAFE_SCHEMES: &[&str] = &["http", "https"];

/// Whether `url` parses and uses an allow-listed scheme.
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| SAFE_SCHEMES.contains(&parsed.scheme()))
}

/// Whether a raw tab record is well formed.
///
/// `url` is required. `title`, `pinned` and `groupId` may be absent, but must
/// have the right type when present. `groupInfo` is not checked: metadata of
/// the wrong shape is dropped when the tab is read.
#[must_use]
pub fn is_valid_tab(tab: &Value) -> bool {
    let Some(tab) = tab.as_object() else {
        return false;
    };

    tab.get("url").and_then(Value::as_str).is_some_and(is_valid_url)
        && optional(tab, "title", Value::is_string)
        && optional(tab, "pinned", Value::is_boolean)
        && optional(tab, "groupId", Value::is_number)
}

/// Whether a raw session record is well formed.
///
/// `isPinned` is not checked; anything but `true` reads as unpinned.
#[must_use]
pub fn is_valid_session(record: &Value) -> bool {
    let Some(record) = record.as_object() else {
        return false;
    };

    let id_ok = record
        .get("id")
        .is_some_and(|id| id.is_string() || id.is_number());
    let name_ok = record
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| (1..=SESSION_NAME_MAX_LENGTH).contains(&name.chars().count()));
    let tabs_ok = record
        .get("tabs")
        .and_then(Value::as_array)
        .is_some_and(|tabs| !tabs.is_empty() && tabs.iter().all(is_valid_tab));

    id_ok && name_ok && tabs_ok
}

fn optional(object: &Map<String, Value>, key: &str, check: impl Fn(&Value) -> bool) -> bool {
    object.get(key).is_none_or(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(tabs: Value) -> Value {
        json!({ "id": "1700000000000-abc", "name": "Work", "tabs": tabs })
    }

    #[test]
    fn test_url_allow_list() {
        assert!(is_valid_url("https://example.com"));
        assert!(is_valid_url("http://localhost:8080/path?q=1"));
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("chrome://extensions"));
        assert!(!is_valid_url("ftp://example.com/file"));
        assert!(!is_valid_url("file:///etc/passwd"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_valid_session() {
        assert!(is_valid_session(&record(json!([
            { "url": "https://example.com", "title": "Example", "pinned": true, "groupId": 3 }
        ]))));
    }

    #[test]
    fn test_numeric_id_accepted() {
        let value = json!({ "id": 17, "name": "A", "tabs": [{ "url": "https://a.com" }] });
        assert!(is_valid_session(&value));
    }

    #[test]
    fn test_missing_optional_fields_tolerated() {
        assert!(is_valid_session(&record(json!([{ "url": "https://example.com" }]))));
    }

    #[test]
    fn test_rejects_bad_name() {
        let mut value = record(json!([{ "url": "https://a.com" }]));
        value["name"] = json!("");
        assert!(!is_valid_session(&value));

        value["name"] = json!("x".repeat(SESSION_NAME_MAX_LENGTH + 1));
        assert!(!is_valid_session(&value));

        value["name"] = json!("x".repeat(SESSION_NAME_MAX_LENGTH));
        assert!(is_valid_session(&value));

        value["name"] = json!(5);
        assert!(!is_valid_session(&value));
    }

    #[test]
    fn test_rejects_empty_or_unsafe_tabs() {
        assert!(!is_valid_session(&record(json!([]))));
        assert!(!is_valid_session(&record(json!([
            { "url": "https://a.com" },
            { "url": "javascript:void(0)" }
        ]))));
    }

    #[test]
    fn test_rejects_mistyped_optional_fields() {
        assert!(!is_valid_tab(&json!({ "url": "https://a.com", "title": 1 })));
        assert!(!is_valid_tab(&json!({ "url": "https://a.com", "pinned": "yes" })));
        assert!(!is_valid_tab(&json!({ "url": "https://a.com", "groupId": "2" })));
        assert!(is_valid_tab(&json!({ "url": "https://a.com", "groupId": 2.0 })));
        assert!(is_valid_tab(&json!({ "url": "https://a.com", "groupInfo": null })));
    }

    #[test]
    fn test_rejects_missing_id_or_non_object() {
        assert!(!is_valid_session(&json!({ "name": "A", "tabs": [{ "url": "https://a.com" }] })));
        assert!(!is_valid_session(&json!({ "id": null, "name": "A", "tabs": [{ "url": "https://a.com" }] })));
        assert!(!is_valid_session(&json!("session")));
    }

    #[test]
    fn test_pin_flag_not_validated() {
        for pinned in [json!(null), json!("no"), json!(true)] {
            let mut value = record(json!([{ "url": "https://a.com" }]));
            value["isPinned"] = pinned;
            assert!(is_valid_session(&value));
        }
    }
}
