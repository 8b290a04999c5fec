//! Recording session entity, as owned by the remote service

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::timestamp;

/// Opaque session identifier assigned by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session status as exchanged with the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Active,
    Paused,
    Ended,
}

impl SessionStatus {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }

    /// Whether `next` is a legal successor of this status.
    ///
    /// created -> active -> {paused <-> active}* -> ended
    pub const fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Active)
                | (Self::Active, Self::Paused)
                | (Self::Paused, Self::Active)
                | (Self::Active, Self::Ended)
                | (Self::Paused, Self::Ended)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when a session status change breaks the lifecycle path
#[derive(Debug, Clone, Error)]
#[error("Invalid session status change: {from} -> {to}")]
pub struct InvalidStatusTransition {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

/// One continuous (possibly paused) recording.
///
/// `id` and `created_at` are fixed at creation; `status` only moves along
/// the lifecycle path enforced by [`Session::transition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    status: SessionStatus,
    #[serde(with = "timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transcription_text: Option<String>,
}

impl Session {
    /// Create a freshly created session
    pub fn new(id: SessionId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: SessionStatus::Created,
            created_at,
            updated_at: None,
            audio_file_path: None,
            transcription_text: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn audio_file_path(&self) -> Option<&str> {
        self.audio_file_path.as_deref()
    }

    /// Transcription text, if the service produced a non-empty one
    pub fn transcription(&self) -> Option<&str> {
        self.transcription_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    /// Move to `next`, rejecting anything off the lifecycle path
    pub fn transition(&mut self, next: SessionStatus) -> Result<(), InvalidStatusTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Take the service-computed fields from a fetched copy of this session.
    ///
    /// Identity and creation time never change; status only follows the
    /// remote copy along a legal transition. Returns false when `remote`
    /// describes a different session.
    pub fn absorb_remote(&mut self, remote: Session) -> bool {
        if remote.id != self.id {
            return false;
        }
        if remote.status != self.status && self.status.can_transition_to(remote.status) {
            self.status = remote.status;
        }
        self.updated_at = remote.updated_at.or(self.updated_at);
        self.audio_file_path = remote.audio_file_path.or(self.audio_file_path.take());
        self.transcription_text = remote
            .transcription_text
            .or(self.transcription_text.take());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(status: SessionStatus) -> Session {
        let mut session = Session::new(SessionId::new("rec-1"), Utc::now());
        session.status = status;
        session
    }

    #[test]
    fn status_path_is_enforced() {
        let mut s = session(SessionStatus::Created);
        s.transition(SessionStatus::Active).unwrap();
        s.transition(SessionStatus::Paused).unwrap();
        s.transition(SessionStatus::Active).unwrap();
        s.transition(SessionStatus::Ended).unwrap();

        let err = s.transition(SessionStatus::Active).unwrap_err();
        assert_eq!(err.from, SessionStatus::Ended);
        assert_eq!(err.to, SessionStatus::Active);
    }

    #[test]
    fn created_cannot_pause_or_end() {
        let mut s = session(SessionStatus::Created);
        assert!(s.transition(SessionStatus::Paused).is_err());
        assert!(s.transition(SessionStatus::Ended).is_err());
        assert_eq!(s.status(), SessionStatus::Created);
    }

    #[test]
    fn deserializes_create_response() {
        let json = r#"{"id":"abc","status":"active","created_at":"2024-05-01T10:15:30.5"}"#;
        let s: Session = serde_json::from_str(json).unwrap();
        assert_eq!(s.id().as_str(), "abc");
        assert_eq!(s.status(), SessionStatus::Active);
        assert!(s.transcription().is_none());
        assert!(s.updated_at().is_none());
    }

    #[test]
    fn deserializes_full_response() {
        let json = r#"{
            "id": "abc",
            "status": "ended",
            "created_at": "2024-05-01T10:15:30",
            "updated_at": "2024-05-01T10:20:00",
            "audio_file_path": "audio_files/abc.webm",
            "transcription_text": "hello there"
        }"#;
        let s: Session = serde_json::from_str(json).unwrap();
        assert!(s.is_ended());
        assert_eq!(s.transcription(), Some("hello there"));
        assert_eq!(s.audio_file_path(), Some("audio_files/abc.webm"));
        assert!(s.updated_at().is_some());
    }

    #[test]
    fn blank_transcription_is_absent() {
        let mut s = session(SessionStatus::Ended);
        s.transcription_text = Some("   ".to_string());
        assert!(s.transcription().is_none());
    }

    #[test]
    fn absorb_remote_keeps_identity_and_takes_transcription() {
        let mut local = session(SessionStatus::Ended);
        let created = local.created_at();

        let mut remote = session(SessionStatus::Ended);
        remote.created_at = created + chrono::Duration::seconds(5);
        remote.transcription_text = Some("final text".to_string());

        assert!(local.absorb_remote(remote));
        assert_eq!(local.created_at(), created);
        assert_eq!(local.transcription(), Some("final text"));
        assert!(local.is_ended());
    }

    #[test]
    fn absorb_remote_never_moves_status_backwards() {
        let mut local = session(SessionStatus::Ended);
        let remote = session(SessionStatus::Active);
        assert!(local.absorb_remote(remote));
        assert!(local.is_ended());
    }

    #[test]
    fn absorb_remote_rejects_other_session() {
        let mut local = session(SessionStatus::Ended);
        let other = Session::new(SessionId::new("rec-2"), Utc::now());
        assert!(!local.absorb_remote(other));
    }
}
