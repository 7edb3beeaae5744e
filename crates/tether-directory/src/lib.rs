//! # Tether Directory
//!
//! Session directory abstraction for the Tether connection broker.
//!
//! A hosting peer advertises its game session in a directory service so
//! other players can discover and join it. The broker treats the directory
//! as strictly best-effort: a failed create leaves the session unlisted, a
//! failed remove leaves a stale record behind, and neither is retried.
//!
//! This crate defines the create-request/record data model and the
//! [`SessionDirectory`] capability trait. The directory transport itself is
//! a collaborator concern.

#![warn(missing_docs)]
#![warn(clippy::all)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Kinds of sessions the directory can list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// Peer-to-peer session, joined by brokering a direct connection to
    /// the hosting player.
    P2p,
    /// Dedicated-server session. Not produced by this workspace; present
    /// so records from the shared directory deserialize cleanly.
    Dedicated,
}

/// Request to advertise a hosted session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionCreateRequest {
    /// Display name of the hosting player.
    pub username: String,
    /// Game build version; clients filter on it to avoid joining an
    /// incompatible host.
    pub game_version: String,
    /// Session kind.
    pub session_type: SessionType,
    /// Backend namespace the record lives in.
    pub namespace: String,
    /// Free-form game settings (map, mode, player limits, ...). Opaque to
    /// the broker; the directory stores and returns it verbatim.
    pub settings: serde_json::Value,
}

impl SessionCreateRequest {
    /// Compose a p2p session advertisement.
    #[must_use]
    pub fn p2p(
        username: impl Into<String>,
        game_version: impl Into<String>,
        namespace: impl Into<String>,
        settings: serde_json::Value,
    ) -> Self {
        Self {
            username: username.into(),
            game_version: game_version.into(),
            session_type: SessionType::P2p,
            namespace: namespace.into(),
            settings,
        }
    }
}

/// A session record as stored by the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    /// Directory-assigned identifier, used for later removal.
    pub session_id: String,
    /// The request this record was created from.
    pub request: SessionCreateRequest,
}

/// Session directory errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    /// The directory request failed (transport or service error).
    #[error("session directory request failed: {0}")]
    Request(String),

    /// No record with the given id exists.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The directory's response could not be interpreted.
    #[error("malformed directory response: {0}")]
    Response(String),
}

/// Capability trait for the session directory service.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// Create a discoverable record for a hosted session.
    async fn create_session(
        &self,
        request: &SessionCreateRequest,
    ) -> Result<SessionRecord, DirectoryError>;

    /// Remove a previously created record.
    async fn remove_session(&self, session_id: &str) -> Result<(), DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_p2p_request_composition() {
        let request = SessionCreateRequest::p2p(
            "host-player",
            "1.4.0",
            "game-ns",
            json!({"map": "canyon", "max_players": 8}),
        );
        assert_eq!(request.session_type, SessionType::P2p);
        assert_eq!(request.username, "host-player");
        assert_eq!(request.settings["map"], "canyon");
    }

    #[test]
    fn test_session_type_wire_names() {
        assert_eq!(serde_json::to_string(&SessionType::P2p).unwrap(), "\"p2p\"");
        assert_eq!(
            serde_json::to_string(&SessionType::Dedicated).unwrap(),
            "\"dedicated\""
        );
    }

    #[test]
    fn test_record_roundtrip() {
        let record = SessionRecord {
            session_id: "sess-123".to_string(),
            request: SessionCreateRequest::p2p("h", "1.0.0", "ns", json!({})),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_error_display() {
        let err = DirectoryError::NotFound("sess-123".to_string());
        assert!(err.to_string().contains("sess-123"));
    }
}
