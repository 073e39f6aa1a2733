//! Session ids and collision-free display names.

use super::{SESSION_NAME_MAX_LENGTH, SessionId};
use chrono::{DateTime, Local, Utc};
use rand::Rng;
use std::collections::HashSet;

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// New id of the form `"<nowMillis>-<base36 suffix>"`.
#[must_use]
pub fn generate_unique_id() -> SessionId {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    SessionId::new(format!("{}-{suffix}", Utc::now().timestamp_millis()))
}

/// New id guaranteed not to be in `taken`.
#[must_use]
pub fn generate_id_avoiding(taken: &HashSet<SessionId>) -> SessionId {
    loop {
        let id = generate_unique_id();
        if !taken.contains(&id) {
            return id;
        }
    }
}

/// Make `candidate` unique against `existing`.
///
/// An unused candidate comes back unchanged. Otherwise `" (N)"` is appended
/// starting at 2; a candidate already ending in `" (N)"` has its counter
/// bumped instead, so repeated collisions give `"X (3)"` rather than
/// `"X (2) (2)"`. The result never exceeds [`SESSION_NAME_MAX_LENGTH`].
#[must_use]
pub fn resolve_unique_name(candidate: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(candidate) {
        return candidate.to_string();
    }

    let (base, mut counter) = match split_counter(candidate) {
        Some((base, n)) => (base, n.saturating_add(1)),
        None => (candidate, 2),
    };

    loop {
        let name = with_counter(base, counter);
        if !existing.contains(&name) {
            return name;
        }
        counter += 1;
    }
}

/// Placeholder name for a session saved without one.
#[must_use]
pub fn default_session_name(now: DateTime<Local>) -> String {
    format!("Session {}", now.format("%Y-%m-%d %H:%M"))
}

/// Split `"base (N)"` into `("base", N)`.
fn split_counter(name: &str) -> Option<(&str, u64)> {
    let (base, digits) = name.strip_suffix(')')?.rsplit_once(" (")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((base, digits.parse().ok()?))
}

fn with_counter(base: &str, counter: u64) -> String {
    let suffix = format!(" ({counter})");
    let room = SESSION_NAME_MAX_LENGTH.saturating_sub(suffix.len());
    if base.chars().count() > room {
        let truncated: String = base.chars().take(room).collect();
        format!("{truncated}{suffix}")
    } else {
        format!("{base}{suffix}")
    }
}
