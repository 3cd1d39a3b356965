//! Session state persistence
//!
//! A maintenance report is a pair of group messages: a start-trigger and a
//! matching end-trigger from the same user. Between the two, the user's
//! session is kept in a flat JSON file mapping user id to [`SessionRecord`].
//! The file is reloaded on every handler invocation and rewritten in full
//! when the mapping changes; it is the sole source of truth.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or saving session state
#[derive(Error, Debug)]
pub enum StateError {
    /// Error serializing or deserializing the state file
    #[error("State JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error
    #[error("State IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An unmatched start-trigger awaiting its end-trigger
///
/// Written once when the start-trigger arrives, removed when the matching
/// end-trigger is processed. Never partially updated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Normalized text of the start-trigger message
    pub start_text: String,
    /// Telegram file id of the attached photo, if any
    #[serde(default)]
    pub photo_file_id: Option<String>,
    /// Telegram file id of the attached video, if any
    #[serde(default)]
    pub video_file_id: Option<String>,
}

/// Mapping from user id to that user's open session
pub type SessionMap = HashMap<i64, SessionRecord>;

/// Explicit view of a user's position in the report lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No unmatched start-trigger for this user
    NoSession,
    /// A start-trigger was recorded and its end-trigger is pending
    AwaitingEnd(SessionRecord),
}

/// Returns the lifecycle state of `user_id` in `sessions`
#[must_use]
pub fn session_state(sessions: &SessionMap, user_id: i64) -> SessionState {
    sessions
        .get(&user_id)
        .map_or(SessionState::NoSession, |record| {
            SessionState::AwaitingEnd(record.clone())
        })
}

/// Opens a session for `user_id`, overwriting any unmatched one
pub fn begin_session(sessions: &mut SessionMap, user_id: i64, record: SessionRecord) {
    sessions.insert(user_id, record);
}

/// Closes the session for `user_id`, returning it; `None` when no session
pub fn end_session(sessions: &mut SessionMap, user_id: i64) -> Option<SessionRecord> {
    sessions.remove(&user_id)
}

/// File-backed store for the session mapping
///
/// `load` and `save` are plain reads and overwrites; a crash mid-write can
/// leave a corrupt file behind.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Create a store backed by the file at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the full session mapping
    ///
    /// A missing file yields an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or holds corrupt JSON.
    pub fn load(&self) -> Result<SessionMap, StateError> {
        if !self.path.exists() {
            return Ok(SessionMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Serialize the full mapping and overwrite the state file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, sessions: &SessionMap) -> Result<(), StateError> {
        let body = serde_json::to_string_pretty(sessions)?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(start_text: &str) -> SessionRecord {
        SessionRecord {
            start_text: start_text.to_string(),
            photo_file_id: None,
            video_file_id: None,
        }
    }

    #[test]
    fn missing_file_loads_empty_mapping() -> Result<(), StateError> {
        let dir = TempDir::new()?;
        let store = FileSessionStore::new(dir.path().join("state.json"));
        assert!(store.load()?.is_empty());
        Ok(())
    }

    #[test]
    fn roundtrip_preserves_sessions() -> Result<(), StateError> {
        let dir = TempDir::new()?;
        let store = FileSessionStore::new(dir.path().join("state.json"));

        let mut sessions = SessionMap::new();
        sessions.insert(
            42,
            SessionRecord {
                start_text: "bat dau ca 1".to_string(),
                photo_file_id: Some("AgACAgUAAx0".to_string()),
                video_file_id: None,
            },
        );
        sessions.insert(7, record("bắt đầu kiểm tra"));
        store.save(&sessions)?;

        let loaded = store.load()?;
        assert_eq!(loaded, sessions);
        Ok(())
    }

    #[test]
    fn corrupt_file_is_an_error() -> Result<(), std::io::Error> {
        let dir = TempDir::new()?;
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json")?;

        let store = FileSessionStore::new(path);
        assert!(matches!(store.load(), Err(StateError::Json(_))));
        Ok(())
    }

    #[test]
    fn begin_session_overwrites_existing_record() {
        let mut sessions = SessionMap::new();
        begin_session(&mut sessions, 42, record("bat dau ca 1"));
        begin_session(&mut sessions, 42, record("bat dau ca 2"));

        assert_eq!(sessions.len(), 1);
        assert_eq!(
            session_state(&sessions, 42),
            SessionState::AwaitingEnd(record("bat dau ca 2"))
        );
    }

    #[test]
    fn end_session_without_start_is_none() {
        let mut sessions = SessionMap::new();
        assert_eq!(end_session(&mut sessions, 42), None);
        assert!(sessions.is_empty());
    }

    #[test]
    fn end_session_removes_the_record() {
        let mut sessions = SessionMap::new();
        begin_session(&mut sessions, 42, record("bat dau ca 1"));

        let closed = end_session(&mut sessions, 42);
        assert_eq!(closed, Some(record("bat dau ca 1")));
        assert_eq!(session_state(&sessions, 42), SessionState::NoSession);
    }
}
