//! The session lifecycle orchestrator.
//!
//! Drives one attempt at a time through provisioning, credential exchange and
//! room connection, strictly in that order, then keeps the room's event
//! stream flowing into the published [`SessionSnapshot`] and the transcript
//! broadcast until the user leaves or the connection drops.
//!
//! State is published on a `watch` channel. Subscribers only read it; they
//! act through [`Orchestrator::start`] and [`Orchestrator::leave`].

use crate::config::SessionConfig;
use crate::credential::{CredentialSource, HttpCredentialClient};
use crate::error::{ConnectError, Diagnostic, SessionError};
use crate::machine::{next_state, SessionEvent};
use crate::media::{MediaConnector, MediaRoom, RoomEvent};
use crate::presence::{PresenceTracker, RosterSnapshot};
use crate::provision::{AgentProvisioner, HttpProvisioner};
use crate::transcript::TranscriptListener;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;
use voxgate_types::{ConnectionState, Participant, RoomGrant, Secrets, SessionState, TranscriptEvent};

/// Capacity of the transcript broadcast. Slow subscribers lose the oldest lines.
const TRANSCRIPT_BROADCAST_CAPACITY: usize = 64;

/// Everything a subscriber can observe about the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Attempt counter; bumped by every accepted start.
    pub attempt: u64,
    pub state: SessionState,
    pub connection: ConnectionState,
    pub roster: RosterSnapshot,
    /// Room and identity of the credential in use, while one is held.
    pub issued_for: Option<RoomGrant>,
    /// Fetch id of the credential in use, while one is held.
    pub credential_id: Option<Uuid>,
    /// Why the last attempt failed. Only set in `Failed`.
    pub diagnostic: Option<Diagnostic>,
}

impl SessionSnapshot {
    pub fn primary_agent_participant(&self) -> Option<Participant> {
        PresenceTracker::primary_agent_participant(&self.roster, self.connection)
    }

    pub fn is_agent_speaking(&self) -> bool {
        self.primary_agent_participant()
            .is_some_and(|agent| PresenceTracker::is_speaking(&agent))
    }
}

struct RoomHandle {
    attempt: u64,
    leave_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

struct Shared {
    state_tx: watch::Sender<SessionSnapshot>,
    transcript_tx: broadcast::Sender<TranscriptEvent>,
    torn_down: AtomicBool,
    room: Mutex<Option<RoomHandle>>,
}

impl Shared {
    fn current(&self) -> SessionSnapshot {
        self.state_tx.borrow().clone()
    }

    fn is_current(&self, attempt: u64) -> bool {
        !self.torn_down.load(Ordering::SeqCst) && self.state_tx.borrow().attempt == attempt
    }

    /// Accepts a start intent and opens a new attempt.
    fn begin(&self) -> Result<u64, SessionError> {
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(SessionError::Stale);
        }
        let mut outcome = Err(SessionError::Stale);
        self.state_tx.send_if_modified(|snap| {
            if !snap.state.can_start() {
                outcome = Err(SessionError::AlreadyActive(snap.state));
                return false;
            }
            match next_state(snap.state, SessionEvent::StartRequested) {
                Ok(next) => {
                    let attempt = snap.attempt + 1;
                    tracing::info!(attempt, from = %snap.state, to = %next, "session start accepted");
                    *snap = SessionSnapshot {
                        attempt,
                        state: next,
                        ..SessionSnapshot::default()
                    };
                    outcome = Ok(attempt);
                    true
                }
                Err(e) => {
                    outcome = Err(e.into());
                    false
                }
            }
        });
        outcome
    }

    /// Applies a lifecycle event for `attempt`, publishing the result.
    ///
    /// Stale attempts and torn-down orchestrators are left untouched.
    fn transition(
        &self,
        attempt: u64,
        event: SessionEvent,
        update: impl FnOnce(&mut SessionSnapshot),
    ) -> Result<SessionState, SessionError> {
        let mut outcome = Err(SessionError::Stale);
        self.state_tx.send_if_modified(|snap| {
            if self.torn_down.load(Ordering::SeqCst) || snap.attempt != attempt {
                return false;
            }
            match next_state(snap.state, event) {
                Ok(next) => {
                    tracing::info!(
                        attempt,
                        from = %snap.state,
                        to = %next,
                        event = event.name(),
                        "session transition"
                    );
                    snap.state = next;
                    update(snap);
                    outcome = Ok(next);
                    true
                }
                Err(e) => {
                    outcome = Err(e.into());
                    false
                }
            }
        });
        outcome
    }

    /// Moves the attempt to `Failed` and drops everything tied to it.
    fn fail(
        &self,
        attempt: u64,
        event: SessionEvent,
        diagnostic: Diagnostic,
    ) -> Result<SessionState, SessionError> {
        tracing::warn!(attempt, kind = ?diagnostic.kind, "session attempt failed: {}", diagnostic.message);
        self.transition(attempt, event, |snap| {
            discard_room_state(snap);
            snap.diagnostic = Some(diagnostic);
        })
    }

    /// Publishes a non-lifecycle change (roster, connection sub-state).
    fn update(&self, attempt: u64, update: impl FnOnce(&mut SessionSnapshot) -> bool) {
        self.state_tx.send_if_modified(|snap| {
            if self.torn_down.load(Ordering::SeqCst) || snap.attempt != attempt {
                return false;
            }
            update(snap)
        });
    }

    /// The room went away, either on request or on its own.
    fn room_closed(
        &self,
        attempt: u64,
        confirm: &mut Option<oneshot::Sender<Result<(), ConnectError>>>,
    ) {
        let result = match confirm.take() {
            Some(tx) => {
                let failed = self.fail(
                    attempt,
                    SessionEvent::SdkConnectFailed,
                    Diagnostic::from(&ConnectError::Dropped),
                );
                // A closed channel tells the waiting start the attempt is stale.
                if failed.is_ok() {
                    let _ = tx.send(Err(ConnectError::Dropped));
                }
                failed
            }
            None => self.transition(attempt, SessionEvent::SdkDisconnected, discard_room_state),
        };
        if let Err(e) = result {
            tracing::debug!(attempt, "room close not applied: {}", e);
        }
    }

    /// Registers the room task unless the orchestrator was torn down meanwhile.
    fn install_room(&self, handle: RoomHandle) -> Result<(), RoomHandle> {
        let mut slot = self.room.lock().unwrap_or_else(|e| e.into_inner());
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(handle);
        }
        if let Some(previous) = slot.replace(handle) {
            // Dropping the sender makes the old task leave its room.
            drop(previous.leave_tx);
        }
        Ok(())
    }

    fn take_room(&self) -> Option<RoomHandle> {
        self.room.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn release_room(&self, attempt: u64) {
        let mut slot = self.room.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|h| h.attempt == attempt) {
            slot.take();
        }
    }
}

fn discard_room_state(snap: &mut SessionSnapshot) {
    snap.connection = ConnectionState::Disconnected;
    snap.roster.clear();
    snap.issued_for = None;
    snap.credential_id = None;
}

/// Owns the session lifecycle and the room connection.
pub struct Orchestrator<P, C, M> {
    config: SessionConfig,
    provisioner: P,
    credentials: C,
    connector: M,
    shared: Arc<Shared>,
}

impl<M: MediaConnector> Orchestrator<HttpProvisioner, HttpCredentialClient, M> {
    /// Builds an orchestrator that talks to the edge over HTTP.
    pub fn with_http(config: SessionConfig, connector: M) -> Result<Self, SessionError> {
        let provisioner =
            HttpProvisioner::new(config.agent_control_url.clone(), config.request_timeout())?;
        let credentials = HttpCredentialClient::new(
            config.credential_service_url.clone(),
            config.request_timeout(),
        )?;
        Ok(Self::new(config, provisioner, credentials, connector))
    }
}

impl<P, C, M> Orchestrator<P, C, M>
where
    P: AgentProvisioner,
    C: CredentialSource,
    M: MediaConnector,
{
    pub fn new(config: SessionConfig, provisioner: P, credentials: C, connector: M) -> Self {
        let (state_tx, _) = watch::channel(SessionSnapshot::default());
        let (transcript_tx, _) = broadcast::channel(TRANSCRIPT_BROADCAST_CAPACITY);
        Self {
            config,
            provisioner,
            credentials,
            connector,
            shared: Arc::new(Shared {
                state_tx,
                transcript_tx,
                torn_down: AtomicBool::new(false),
                room: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Read-only view of the session, updated on every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.state_tx.subscribe()
    }

    /// Transcript lines from the agent, as they arrive.
    pub fn subscribe_transcript(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.shared.transcript_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.current()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state_tx.borrow().state
    }

    /// Runs a full attempt: provision, fetch a credential, connect.
    ///
    /// Resolves once the media connector confirms the room (`Connected`) or
    /// the attempt fails. Failures leave the session in `Failed` with a
    /// diagnostic and are returned; nothing is retried.
    pub async fn start(&self, secrets: &Secrets) -> Result<SessionState, SessionError> {
        secrets.require_non_empty(self.config.required_secrets.as_slice())?;
        let attempt = self.shared.begin()?;
        let span = tracing::info_span!(
            "session_attempt",
            attempt,
            room = %self.config.room,
            identity = %self.config.identity
        );
        self.run_attempt(attempt, secrets).instrument(span).await
    }

    async fn run_attempt(&self, attempt: u64, secrets: &Secrets) -> Result<SessionState, SessionError> {
        let shared = &self.shared;

        if let Err(e) = self.provisioner.start(secrets).await {
            shared.fail(attempt, SessionEvent::ProvisionFailed, Diagnostic::from(&e))?;
            return Err(e.into());
        }
        shared.transition(attempt, SessionEvent::ProvisionOk, |_| {})?;

        let credential = match self
            .credentials
            .fetch_credential(&self.config.room, &self.config.identity)
            .await
        {
            Ok(credential) => credential,
            Err(e) => {
                shared.fail(attempt, SessionEvent::CredentialFailed, Diagnostic::from(&e))?;
                return Err(e.into());
            }
        };
        shared.transition(attempt, SessionEvent::CredentialOk, |snap| {
            snap.connection = ConnectionState::Connecting;
            snap.issued_for = Some(credential.issued_for().clone());
            snap.credential_id = Some(credential.fetch_id());
        })?;

        let url = match credential.media_server_url() {
            "" => self.config.fallback_media_url.as_str(),
            url => url,
        };
        tracing::info!(%url, "connecting to media server");
        let connected = self.connector.connect(url, credential.access_token()).await;
        // One credential, one connection attempt.
        drop(credential);

        let mut room = match connected {
            Ok(room) => room,
            Err(e) => {
                shared.fail(attempt, SessionEvent::SdkConnectFailed, Diagnostic::from(&e))?;
                return Err(e.into());
            }
        };
        if !shared.is_current(attempt) {
            room.disconnect().await;
            return Err(SessionError::Stale);
        }

        let (confirm_tx, confirm_rx) = oneshot::channel();
        let (leave_tx, leave_rx) = mpsc::channel(1);
        let task = tokio::spawn(
            drive_room(
                Arc::clone(shared),
                attempt,
                room,
                TranscriptListener::new(self.config.transcript_topic.clone()),
                leave_rx,
                confirm_tx,
            )
            .in_current_span(),
        );
        if let Err(handle) = shared.install_room(RoomHandle {
            attempt,
            leave_tx,
            task,
        }) {
            drop(handle.leave_tx);
            let _ = handle.task.await;
            return Err(SessionError::Stale);
        }

        match tokio::time::timeout(self.config.connect_timeout(), confirm_rx).await {
            Ok(Ok(Ok(()))) => Ok(SessionState::Connected),
            Ok(Ok(Err(e))) => Err(e.into()),
            Ok(Err(_)) => Err(SessionError::Stale),
            Err(_) => {
                let err = ConnectError::Timeout(self.config.connect_timeout_ms);
                match shared.fail(attempt, SessionEvent::SdkConnectFailed, Diagnostic::from(&err)) {
                    Ok(_) => {
                        if let Some(handle) = shared.take_room() {
                            drop(handle.leave_tx);
                        }
                        Err(err.into())
                    }
                    // Confirmation raced the timer and won.
                    Err(SessionError::Transition(_)) => Ok(shared.current().state),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Leaves the room, if any. The session ends in `Disconnected` (or
    /// `Failed` if the room was still being confirmed).
    pub async fn leave(&self) {
        match self.shared.take_room() {
            Some(handle) => {
                let _ = handle.leave_tx.try_send(());
                if let Err(e) = handle.task.await {
                    tracing::warn!("room task ended abnormally: {}", e);
                }
            }
            None => tracing::debug!("leave requested with no room"),
        }
    }

    /// Stops publishing and closes the room. Results of calls still in
    /// flight are discarded when they arrive.
    pub async fn teardown(&self) {
        self.shared.torn_down.store(true, Ordering::SeqCst);
        let handle = self.shared.take_room();
        if let Some(handle) = handle {
            let _ = handle.leave_tx.try_send(());
            if let Err(e) = handle.task.await {
                tracing::warn!("room task ended abnormally: {}", e);
            }
        }
        tracing::info!("session orchestrator torn down");
    }
}

impl<P, C, M> Drop for Orchestrator<P, C, M> {
    fn drop(&mut self) {
        self.shared.torn_down.store(true, Ordering::SeqCst);
        if let Some(handle) = self.shared.take_room() {
            let _ = handle.leave_tx.try_send(());
        }
    }
}

/// Owns the room for one attempt and folds its events into the session.
async fn drive_room<R: MediaRoom>(
    shared: Arc<Shared>,
    attempt: u64,
    mut room: R,
    mut transcript: TranscriptListener,
    mut leave_rx: mpsc::Receiver<()>,
    confirm_tx: oneshot::Sender<Result<(), ConnectError>>,
) {
    let mut confirm = Some(confirm_tx);

    loop {
        tokio::select! {
            _ = leave_rx.recv() => {
                tracing::info!(attempt, "leaving room");
                room.disconnect().await;
                shared.room_closed(attempt, &mut confirm);
                break;
            }
            event = room.next_event() => {
                let Some(event) = event else {
                    tracing::info!(attempt, "room event stream ended");
                    shared.room_closed(attempt, &mut confirm);
                    break;
                };
                match event {
                    RoomEvent::ConnectionStateChanged(ConnectionState::Connected) => {
                        match confirm.take() {
                            Some(tx) => {
                                let confirmed = shared.transition(
                                    attempt,
                                    SessionEvent::SdkConnected,
                                    |snap| snap.connection = ConnectionState::Connected,
                                );
                                match confirmed {
                                    Ok(_) => {
                                        let _ = tx.send(Ok(()));
                                        enable_local_media(&mut room).await;
                                    }
                                    Err(e) => {
                                        tracing::debug!(attempt, "connect confirmation not applied: {}", e);
                                        room.disconnect().await;
                                        break;
                                    }
                                }
                            }
                            None => {
                                tracing::info!(attempt, "room connection resumed");
                                shared.update(attempt, |snap| {
                                    snap.connection = ConnectionState::Connected;
                                    true
                                });
                            }
                        }
                    }
                    RoomEvent::ConnectionStateChanged(ConnectionState::Disconnected) => {
                        tracing::info!(attempt, "room disconnected");
                        shared.room_closed(attempt, &mut confirm);
                        break;
                    }
                    RoomEvent::ConnectionStateChanged(state) => {
                        shared.update(attempt, |snap| {
                            let changed = snap.connection != state;
                            snap.connection = state;
                            changed
                        });
                    }
                    RoomEvent::DataReceived { topic, payload, .. } => {
                        if let Some(line) = transcript.on_message(topic.as_deref(), &payload) {
                            if shared.is_current(attempt) {
                                // No subscribers is fine; the line is simply dropped.
                                let _ = shared.transcript_tx.send(line);
                            }
                        }
                    }
                    roster_event => {
                        shared.update(attempt, |snap| snap.roster.apply(&roster_event));
                    }
                }
            }
        }

        if !shared.is_current(attempt) {
            tracing::debug!(attempt, "attempt abandoned, closing room");
            room.disconnect().await;
            break;
        }
    }

    shared.release_room(attempt);
}

async fn enable_local_media<R: MediaRoom>(room: &mut R) {
    if let Err(e) = room.set_camera_enabled(true).await {
        tracing::warn!("could not enable camera: {}", e);
    }
    if let Err(e) = room.set_microphone_enabled(true).await {
        tracing::warn!("could not enable microphone: {}", e);
    }
}
