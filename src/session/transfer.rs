//! Backup files: export of the stored collection and parsing of imports.

use super::{Session, SessionError};
use chrono::NaiveDate;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Largest import file accepted by default (10 MiB).
pub const MAX_IMPORT_BYTES: u64 = 10 * 1024 * 1024;

/// Pretty-printed JSON of `sessions`, in storage order.
pub fn export_json(sessions: &[Session]) -> Result<String, SessionError> {
    if sessions.is_empty() {
        return Err(SessionError::NothingToExport);
    }
    Ok(serde_json::to_string_pretty(sessions)?)
}

/// `YYMMDD_TabHaiku_Backup.json` for the given day.
#[must_use]
pub fn export_filename(date: NaiveDate) -> String {
    format!("{}_TabHaiku_Backup.json", date.format("%y%m%d"))
}

/// Write an export of `sessions` into `dir`, returning the file path.
pub async fn write_export(
    dir: &Path,
    sessions: &[Session],
    date: NaiveDate,
) -> Result<PathBuf, SessionError> {
    let json = export_json(sessions)?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(export_filename(date));
    tokio::fs::write(&path, json).await?;
    tracing::debug!(path = %path.display(), sessions = sessions.len(), "Exported sessions");
    Ok(path)
}

/// Parse import file contents into raw records.
///
/// Records are not validated here; that happens when they are merged.
pub fn parse_import(bytes: &[u8], max_bytes: u64) -> Result<Vec<Value>, SessionError> {
    let size = bytes.len() as u64;
    if size > max_bytes {
        return Err(SessionError::ImportTooLarge {
            size,
            max: max_bytes,
        });
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| SessionError::InvalidImportFormat(format!("not valid JSON: {e}")))?;
    match value {
        Value::Array(records) => Ok(records),
        _ => Err(SessionError::InvalidImportFormat(
            "expected a list of sessions".to_string(),
        )),
    }
}

/// Read and parse an import file, refusing oversized files before reading them.
pub async fn read_import_file(path: &Path, max_bytes: u64) -> Result<Vec<Value>, SessionError> {
    let size = tokio::fs::metadata(path).await?.len();
    if size > max_bytes {
        return Err(SessionError::ImportTooLarge {
            size,
            max: max_bytes,
        });
    }
    let bytes = tokio::fs::read(path).await?;
    parse_import(&bytes, max_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionId, TabSnapshot};
    use tempfile::tempdir;

    fn sample() -> Vec<Session> {
        vec![
            Session {
                id: SessionId::new("1700000000000-abc"),
                name: "Work".into(),
                tabs: vec![TabSnapshot::new("https://a.com")],
                is_pinned: true,
            },
            Session {
                id: SessionId::new("1700000000001-def"),
                name: "Home".into(),
                tabs: vec![TabSnapshot::new("https://b.com")],
                is_pinned: false,
            },
        ]
    }

    #[test]
    fn test_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_filename(date), "240309_TabHaiku_Backup.json");
    }

    #[test]
    fn test_export_is_pretty_and_ordered() {
        let json = export_json(&sample()).unwrap();
        assert!(json.contains("\n  {"));
        let parsed: Vec<Session> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_export_empty() {
        assert!(matches!(export_json(&[]), Err(SessionError::NothingToExport)));
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(matches!(
            parse_import(br#"{"id": "1"}"#, MAX_IMPORT_BYTES),
            Err(SessionError::InvalidImportFormat(_))
        ));
        assert!(matches!(
            parse_import(b"not json", MAX_IMPORT_BYTES),
            Err(SessionError::InvalidImportFormat(_))
        ));
    }

    #[test]
    fn test_parse_size_limit() {
        let bytes = b"[]";
        assert!(parse_import(bytes, 2).unwrap().is_empty());
        assert!(matches!(
            parse_import(bytes, 1),
            Err(SessionError::ImportTooLarge { size: 2, max: 1 })
        ));
    }

    #[tokio::test]
    async fn test_write_then_read_file() {
        let dir = tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let path = write_export(dir.path(), &sample(), date).await.unwrap();
        assert!(path.ends_with("251231_TabHaiku_Backup.json"));

        let records = read_import_file(&path, MAX_IMPORT_BYTES).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "Work");
        assert_eq!(records[0]["isPinned"], true);
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.json");
        std::fs::write(&path, "[".to_string() + &" ".repeat(64) + "]").unwrap();

        let err = read_import_file(&path, 16).await.unwrap_err();
        assert!(matches!(err, SessionError::ImportTooLarge { size: 66, max: 16 }));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = read_import_file(&dir.path().join("nope.json"), MAX_IMPORT_BYTES)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Io(_)));
    }
}
