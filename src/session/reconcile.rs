//! Merging an external batch of session records into an existing collection.

use super::{Session, SessionId, generate_id_avoiding, is_valid_session, resolve_unique_name};
use serde_json::Value;
use std::collections::HashSet;

/// Result of [`merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Existing sessions, untouched and in order, followed by the accepted
    /// incoming ones.
    pub sessions: Vec<Session>,
    /// Incoming records that were appended.
    pub imported: usize,
    /// Incoming records that failed validation.
    pub dropped: usize,
}

/// Merge raw `incoming` records after `existing`.
///
/// Records failing validation are dropped and counted. Each accepted record
/// gets a fresh id if its id is already taken and a unique name via
/// [`resolve_unique_name`]; ids and names are registered as they are accepted,
/// so duplicates inside `incoming` are resolved too.
#[must_use]
pub fn merge(existing: &[Session], incoming: Vec<Value>) -> MergeOutcome {
    let mut ids: HashSet<SessionId> = existing.iter().map(|s| s.id.clone()).collect();
    let mut names: HashSet<String> = existing.iter().map(|s| s.name.clone()).collect();
    let mut sessions = existing.to_vec();
    let mut imported = 0;
    let mut dropped = 0;

    for record in incoming {
        let Some(mut session) = parse_record(record) else {
            dropped += 1;
            continue;
        };

        if ids.contains(&session.id) {
            session.id = generate_id_avoiding(&ids);
        }
        session.name = resolve_unique_name(&session.name, &names);

        ids.insert(session.id.clone());
        names.insert(session.name.clone());
        sessions.push(session);
        imported += 1;
    }

    if dropped > 0 {
        tracing::warn!(dropped, imported, "Dropped invalid session records");
    }

    MergeOutcome {
        sessions,
        imported,
        dropped,
    }
}

fn parse_record(record: Value) -> Option<Session> {
    if !is_valid_session(&record) {
        return None;
    }
    serde_json::from_value(record)
        .map_err(|e| tracing::warn!("Malformed session record: {e}"))
        .ok()
}
