//! Shared types for the voxgate workspace.
//!
//! This crate holds the data model every other crate speaks: the session
//! lifecycle states, media connection states, credentials issued for a room,
//! participants observed in a room, transcript events, and the write-only
//! secrets a user hands over to provision an agent.
//!
//! It depends on nothing inside the workspace, so the session core, the edge
//! server and the agent runner can all share it without cycles.

use serde::{Deserialize, Serialize};

mod room;
mod secrets;

pub use room::{ConnectionQuality, Credential, Participant, RoomGrant, TranscriptEvent};
pub use secrets::{MissingSecret, Secrets};

/// Lifecycle of a single agent session as seen by the orchestrator.
///
/// Exactly one state is active at a time. `Failed` and `Disconnected` are
/// terminal for an attempt but recoverable by starting again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing has been started yet.
    #[default]
    Idle,
    /// The agent control service is being asked to start the agent.
    Provisioning,
    /// The agent started; a room credential is being fetched.
    AwaitingCredential,
    /// The media connector is establishing the room session.
    Connecting,
    /// The media connector confirmed the room is connected.
    Connected,
    /// The room connection ended after being established.
    Disconnected,
    /// An attempt failed before or while connecting.
    Failed,
}

impl SessionState {
    /// Returns the string label for this state.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Provisioning => "PROVISIONING",
            Self::AwaitingCredential => "AWAITING_CREDENTIAL",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether a new attempt may be started from this state.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Failed | Self::Disconnected)
    }

    /// Whether an attempt is in flight or live.
    pub fn is_active(self) -> bool {
        !self.can_start()
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Connection state reported by the media SDK for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Transport dropped and the SDK is trying to resume on its own.
    Reconnecting,
}
