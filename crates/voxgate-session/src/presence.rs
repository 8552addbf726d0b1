//! Participant roster and the views derived from it.
//!
//! The roster is a plain value rebuilt from room events and published with
//! every snapshot. Which participant is "the agent" is never stored; it is
//! recomputed from the latest roster on demand.

use crate::media::RoomEvent;
use serde::Serialize;
use voxgate_types::{ConnectionState, Participant};

/// Participants currently in the room, in the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RosterSnapshot {
    participants: Vec<Participant>,
}

impl RosterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn get(&self, identity: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.identity == identity)
    }

    pub fn remote(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| !p.is_local)
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    fn get_mut(&mut self, identity: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.identity == identity)
    }

    /// Folds a roster-related room event into the snapshot.
    ///
    /// Returns `true` if the roster changed. Events about unknown identities
    /// and non-roster events are ignored.
    pub fn apply(&mut self, event: &RoomEvent) -> bool {
        match event {
            RoomEvent::ParticipantJoined(participant) => {
                let slot = self
                    .participants
                    .iter()
                    .position(|p| p.identity == participant.identity);
                match slot {
                    Some(i) if self.participants[i] == *participant => false,
                    Some(i) => {
                        // Rejoin under the same identity keeps the original slot.
                        self.participants[i] = participant.clone();
                        true
                    }
                    None => {
                        self.participants.push(participant.clone());
                        true
                    }
                }
            }
            RoomEvent::ParticipantLeft { identity } => {
                let before = self.participants.len();
                self.participants.retain(|p| &p.identity != identity);
                self.participants.len() != before
            }
            RoomEvent::SpeakingChanged { identity, speaking } => match self.get_mut(identity) {
                Some(p) if p.is_speaking != *speaking => {
                    p.is_speaking = *speaking;
                    true
                }
                _ => false,
            },
            RoomEvent::ConnectionQualityChanged { identity, quality } => {
                match self.get_mut(identity) {
                    Some(p) if p.connection_quality != *quality => {
                        p.connection_quality = *quality;
                        true
                    }
                    _ => false,
                }
            }
            RoomEvent::ConnectionStateChanged(_) | RoomEvent::DataReceived { .. } => false,
        }
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }
}

/// Read-only queries over a roster snapshot.
pub struct PresenceTracker;

impl PresenceTracker {
    /// The agent is the first remote participant, but only while connected.
    pub fn primary_agent_participant(
        roster: &RosterSnapshot,
        connection: ConnectionState,
    ) -> Option<Participant> {
        if connection != ConnectionState::Connected {
            return None;
        }
        roster.remote().next().cloned()
    }

    /// Instantaneous speaking flag. Smoothing is left to the presentation layer.
    pub fn is_speaking(participant: &Participant) -> bool {
        participant.is_speaking
    }
}
