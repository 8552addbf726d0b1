//! Client-side session lifecycle for a voice/video AI agent.
//!
//! An attempt runs in a fixed order: the agent is provisioned through the
//! edge, a room credential is fetched, and the media SDK joins the room. The
//! [`Orchestrator`] publishes a [`SessionSnapshot`] after every change and
//! fans agent transcript lines out to subscribers.

pub mod config;
pub mod credential;
pub mod error;
pub mod machine;
pub mod media;
pub mod orchestrator;
pub mod presence;
pub mod provision;
pub mod transcript;

pub use config::{SessionConfig, TRANSCRIPT_TOPIC};
pub use credential::{CredentialSource, HttpCredentialClient};
pub use error::{
    ConnectError, CredentialError, DecodeError, Diagnostic, FailureKind, InvalidTransition,
    MediaError, ProvisionError, SessionError,
};
pub use machine::{next_state, SessionEvent};
pub use media::{MediaConnector, MediaRoom, RoomEvent};
pub use orchestrator::{Orchestrator, SessionSnapshot};
pub use presence::{PresenceTracker, RosterSnapshot};
pub use provision::{AgentProvisioner, HttpProvisioner, Started};
pub use transcript::TranscriptListener;
