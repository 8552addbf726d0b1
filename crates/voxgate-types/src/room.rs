//! Room-level types: credentials, participants and transcript events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The room and identity a credential was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomGrant {
    pub room: String,
    pub identity: String,
}

impl RoomGrant {
    pub fn new(room: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            identity: identity.into(),
        }
    }
}

/// A short-lived room credential.
///
/// Immutable once obtained. Every fetch produces a new `fetch_id`, so two
/// credentials can be told apart even if the issuer returned identical tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    fetch_id: Uuid,
    access_token: String,
    media_server_url: String,
    issued_for: RoomGrant,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        media_server_url: impl Into<String>,
        issued_for: RoomGrant,
    ) -> Self {
        Self {
            fetch_id: Uuid::new_v4(),
            access_token: access_token.into(),
            media_server_url: media_server_url.into(),
            issued_for,
        }
    }

    pub fn fetch_id(&self) -> Uuid {
        self.fetch_id
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn media_server_url(&self) -> &str {
        &self.media_server_url
    }

    pub fn issued_for(&self) -> &RoomGrant {
        &self.issued_for
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("fetch_id", &self.fetch_id)
            .field("access_token", &"[REDACTED]")
            .field("media_server_url", &self.media_server_url)
            .field("issued_for", &self.issued_for)
            .finish()
    }
}

/// Link quality as reported by the media SDK. Treated as opaque by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Poor,
    Lost,
    #[default]
    Unknown,
}

/// A participant observed in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub identity: String,
    pub is_local: bool,
    pub is_speaking: bool,
    pub connection_quality: ConnectionQuality,
}

impl Participant {
    pub fn remote(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            is_local: false,
            is_speaking: false,
            connection_quality: ConnectionQuality::Unknown,
        }
    }

    pub fn local(identity: impl Into<String>) -> Self {
        Self {
            is_local: true,
            ..Self::remote(identity)
        }
    }
}

/// A line of agent transcript received over the data channel.
///
/// `sequence` is the arrival order within one connection attempt. Gaps are
/// possible; the channel is best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub sequence: u64,
    pub text: String,
    pub received_at: DateTime<Utc>,
}
