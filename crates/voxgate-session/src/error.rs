//! Error taxonomy for a session attempt.

use serde::Serialize;
use thiserror::Error;
use voxgate_types::{MissingSecret, SessionState};

/// The agent control service could not start the agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("agent control service unreachable: {0}")]
    Unreachable(String),

    /// Non-2xx response. Raw status and body are kept for diagnostics.
    #[error("agent control service rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// No usable room credential could be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("invalid credential request: {0}")]
    InvalidInput(&'static str),

    #[error("credential service unreachable: {0}")]
    Unreachable(String),

    #[error("credential service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed credential response: {0}")]
    Malformed(String),
}

/// The media connector did not establish the room session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("media connection failed: {0}")]
    Sdk(String),

    #[error("media connection not confirmed within {0} ms")]
    Timeout(u64),

    #[error("media connection dropped before it was established")]
    Dropped,
}

/// A transcript payload was not valid UTF-8. Never surfaced to subscribers.
#[derive(Debug, Error)]
#[error("transcript payload is not valid UTF-8: {0}")]
pub struct DecodeError(#[from] pub std::str::Utf8Error);

/// A local media toggle (camera, microphone) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("media device error: {0}")]
pub struct MediaError(pub String);

/// An event that the current state has no transition for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no transition from {from} on {event}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub event: &'static str,
}

/// Errors returned by orchestrator intents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a session is already {0}")]
    AlreadyActive(SessionState),

    #[error(transparent)]
    MissingSecret(#[from] MissingSecret),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The attempt was superseded or the orchestrator was torn down while
    /// the call was in flight; its result was discarded.
    #[error("result arrived after the attempt was abandoned")]
    Stale,

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Which step of the attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Provision,
    Credential,
    Connect,
}

/// Failure details attached to the `Failed` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ProvisionError> for Diagnostic {
    fn from(err: &ProvisionError) -> Self {
        Self {
            kind: FailureKind::Provision,
            message: err.to_string(),
        }
    }
}

impl From<&CredentialError> for Diagnostic {
    fn from(err: &CredentialError) -> Self {
        Self {
            kind: FailureKind::Credential,
            message: err.to_string(),
        }
    }
}

impl From<&ConnectError> for Diagnostic {
    fn from(err: &ConnectError) -> Self {
        Self {
            kind: FailureKind::Connect,
            message: err.to_string(),
        }
    }
}
