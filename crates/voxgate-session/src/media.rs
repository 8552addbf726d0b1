//! Seam to the real-time media SDK.
//!
//! The orchestrator is generic over a [`MediaConnector`]. A connector dials
//! the media server and hands back a [`MediaRoom`], whose event stream carries
//! connection-state changes, roster changes, speaking activity and data
//! channel messages. The room handle is owned by the orchestrator for its
//! whole life; nothing else mutates it.

use crate::error::{ConnectError, MediaError};
use std::future::Future;
use voxgate_types::{ConnectionQuality, ConnectionState, Participant};

/// Push events emitted by a connected room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    ConnectionStateChanged(ConnectionState),
    ParticipantJoined(Participant),
    ParticipantLeft {
        identity: String,
    },
    SpeakingChanged {
        identity: String,
        speaking: bool,
    },
    ConnectionQualityChanged {
        identity: String,
        quality: ConnectionQuality,
    },
    DataReceived {
        topic: Option<String>,
        payload: Vec<u8>,
        sender: Option<String>,
    },
}

/// A live room session.
pub trait MediaRoom: Send + 'static {
    /// Next event from the room, or `None` once the SDK closed the stream.
    fn next_event(&mut self) -> impl Future<Output = Option<RoomEvent>> + Send;

    fn set_camera_enabled(
        &mut self,
        enabled: bool,
    ) -> impl Future<Output = Result<(), MediaError>> + Send;

    fn set_microphone_enabled(
        &mut self,
        enabled: bool,
    ) -> impl Future<Output = Result<(), MediaError>> + Send;

    /// Leaves the room. Idempotent.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}

/// Dials a media server with a join token.
pub trait MediaConnector: Send + Sync + 'static {
    type Room: MediaRoom;

    fn connect(
        &self,
        url: &str,
        token: &str,
    ) -> impl Future<Output = Result<Self::Room, ConnectError>> + Send;
}
