use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use voxgate_session::{
    AgentProvisioner, ConnectError, CredentialError, CredentialSource, FailureKind, MediaConnector,
    MediaError, MediaRoom, Orchestrator, ProvisionError, RoomEvent, SessionConfig, SessionError,
    SessionSnapshot, Started,
};
use voxgate_types::{
    ConnectionState, Credential, MissingSecret, Participant, RoomGrant, Secrets, SessionState,
};

type CallLog = Arc<Mutex<Vec<String>>>;

struct StubProvisioner {
    log: CallLog,
    received: Arc<Mutex<Vec<Secrets>>>,
    outcome: Result<Started, ProvisionError>,
    gate: Option<Arc<Notify>>,
}

impl AgentProvisioner for StubProvisioner {
    async fn start(&self, secrets: &Secrets) -> Result<Started, ProvisionError> {
        self.log.lock().unwrap().push("provision".into());
        self.received.lock().unwrap().push(secrets.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.outcome.clone()
    }
}

struct StubCredentials {
    log: CallLog,
    url: String,
    failure: Option<CredentialError>,
}

impl CredentialSource for StubCredentials {
    async fn fetch_credential(
        &self,
        room: &str,
        identity: &str,
    ) -> Result<Credential, CredentialError> {
        let n = {
            let mut log = self.log.lock().unwrap();
            log.push("credential".into());
            log.iter().filter(|c| *c == "credential").count()
        };
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        Ok(Credential::new(
            format!("token-{}", n),
            self.url.clone(),
            RoomGrant::new(room, identity),
        ))
    }
}

struct ScriptedRoom {
    events: mpsc::UnboundedReceiver<RoomEvent>,
    probe: RoomProbe,
}

/// Test-side view of a scripted room.
#[derive(Clone, Default)]
struct RoomProbe {
    disconnected: Arc<AtomicBool>,
    camera: Arc<AtomicBool>,
}

impl MediaRoom for ScriptedRoom {
    async fn next_event(&mut self) -> Option<RoomEvent> {
        self.events.recv().await
    }

    async fn set_camera_enabled(&mut self, enabled: bool) -> Result<(), MediaError> {
        self.probe.camera.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    async fn set_microphone_enabled(&mut self, _enabled: bool) -> Result<(), MediaError> {
        // Permission denied must not affect the session.
        Err(MediaError("microphone permission denied".into()))
    }

    async fn disconnect(&mut self) {
        self.probe.disconnected.store(true, Ordering::SeqCst);
    }
}

struct ScriptedConnector {
    log: CallLog,
    dialed: Arc<Mutex<Vec<(String, String)>>>,
    rooms: Mutex<VecDeque<Result<ScriptedRoom, ConnectError>>>,
}

impl MediaConnector for ScriptedConnector {
    type Room = ScriptedRoom;

    async fn connect(&self, url: &str, token: &str) -> Result<ScriptedRoom, ConnectError> {
        self.log.lock().unwrap().push("connect".into());
        self.dialed
            .lock()
            .unwrap()
            .push((url.to_string(), token.to_string()));
        self.rooms
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ConnectError::Sdk("no room scripted".into())))
    }
}

fn scripted_room() -> (ScriptedRoom, mpsc::UnboundedSender<RoomEvent>, RoomProbe) {
    let (tx, rx) = mpsc::unbounded_channel();
    let probe = RoomProbe::default();
    (
        ScriptedRoom {
            events: rx,
            probe: probe.clone(),
        },
        tx,
        probe,
    )
}

fn connected_room() -> (ScriptedRoom, mpsc::UnboundedSender<RoomEvent>, RoomProbe) {
    let (room, tx, probe) = scripted_room();
    tx.send(RoomEvent::ConnectionStateChanged(ConnectionState::Connected))
        .unwrap();
    (room, tx, probe)
}

fn demo_secrets() -> Secrets {
    Secrets::new()
        .with("cerebrasKey", "csk-x")
        .with("cartesiaKey", "sk_car_y")
}

type TestOrchestrator = Orchestrator<StubProvisioner, StubCredentials, ScriptedConnector>;

struct Harness {
    orchestrator: TestOrchestrator,
    log: CallLog,
    received: Arc<Mutex<Vec<Secrets>>>,
    dialed: Arc<Mutex<Vec<(String, String)>>>,
}

struct HarnessBuilder {
    provision: Result<Started, ProvisionError>,
    gate: Option<Arc<Notify>>,
    credential_url: String,
    credential_failure: Option<CredentialError>,
    rooms: Vec<Result<ScriptedRoom, ConnectError>>,
}

impl HarnessBuilder {
    fn new() -> Self {
        Self {
            provision: Ok(Started {
                running: true,
                started: true,
            }),
            gate: None,
            credential_url: "wss://example".into(),
            credential_failure: None,
            rooms: Vec::new(),
        }
    }

    fn provision(mut self, outcome: Result<Started, ProvisionError>) -> Self {
        self.provision = outcome;
        self
    }

    fn gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn credential_url(mut self, url: &str) -> Self {
        self.credential_url = url.into();
        self
    }

    fn credential_failure(mut self, e: CredentialError) -> Self {
        self.credential_failure = Some(e);
        self
    }

    fn room(mut self, room: Result<ScriptedRoom, ConnectError>) -> Self {
        self.rooms.push(room);
        self
    }

    fn build(self) -> Harness {
        let log = CallLog::default();
        let received = Arc::new(Mutex::new(Vec::new()));
        let dialed = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Orchestrator::new(
            SessionConfig::default(),
            StubProvisioner {
                log: log.clone(),
                received: received.clone(),
                outcome: self.provision,
                gate: self.gate,
            },
            StubCredentials {
                log: log.clone(),
                url: self.credential_url,
                failure: self.credential_failure,
            },
            ScriptedConnector {
                log: log.clone(),
                dialed: dialed.clone(),
                rooms: Mutex::new(self.rooms.into()),
            },
        );
        Harness {
            orchestrator,
            log,
            received,
            dialed,
        }
    }
}

impl Harness {
    fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn dialed(&self) -> Vec<(String, String)> {
        self.dialed.lock().unwrap().clone()
    }
}

async fn wait_for(
    rx: &mut watch::Receiver<SessionSnapshot>,
    f: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(f))
        .await
        .expect("condition not reached in time")
        .expect("orchestrator dropped")
        .clone()
}

async fn wait_until(flag: &AtomicBool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !flag.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("flag not set in time");
}

#[tokio::test]
async fn happy_path_reaches_connected_in_order() {
    let (room, _events, probe) = connected_room();
    let h = HarnessBuilder::new().room(Ok(room)).build();
    assert_eq!(h.orchestrator.state(), SessionState::Idle);

    let state = h.orchestrator.start(&demo_secrets()).await.unwrap();
    assert_eq!(state, SessionState::Connected);

    assert_eq!(h.calls(), ["provision", "credential", "connect"]);
    assert_eq!(h.received.lock().unwrap()[0], demo_secrets());
    assert_eq!(
        h.dialed(),
        [("wss://example".to_string(), "token-1".to_string())]
    );

    let snap = h.orchestrator.snapshot();
    assert_eq!(snap.state, SessionState::Connected);
    assert_eq!(snap.connection, ConnectionState::Connected);
    assert_eq!(snap.issued_for, Some(RoomGrant::new("test-room", "demo-user")));
    assert!(snap.credential_id.is_some());
    assert_eq!(snap.diagnostic, None);

    // Camera is enabled even though the microphone toggle fails.
    wait_until(&probe.camera).await;
    assert_eq!(h.orchestrator.state(), SessionState::Connected);
}

#[tokio::test]
async fn provision_failure_stops_before_credentials() {
    let h = HarnessBuilder::new()
        .provision(Err(ProvisionError::Rejected {
            status: 500,
            body: "agent crashed".into(),
        }))
        .build();

    let err = h.orchestrator.start(&demo_secrets()).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Provision(ProvisionError::Rejected {
            status: 500,
            body: "agent crashed".into()
        })
    );

    let snap = h.orchestrator.snapshot();
    assert_eq!(snap.state, SessionState::Failed);
    let diagnostic = snap.diagnostic.unwrap();
    assert_eq!(diagnostic.kind, FailureKind::Provision);
    assert!(diagnostic.message.contains("500"));
    assert_eq!(h.calls(), ["provision"]);
}

#[tokio::test]
async fn credential_failure_never_dials() {
    let h = HarnessBuilder::new()
        .credential_failure(CredentialError::Status {
            status: 503,
            body: String::new(),
        })
        .build();

    let err = h.orchestrator.start(&demo_secrets()).await.unwrap_err();
    assert!(matches!(err, SessionError::Credential(CredentialError::Status { status: 503, .. })));
    let snap = h.orchestrator.snapshot();
    assert_eq!(snap.state, SessionState::Failed);
    assert_eq!(snap.diagnostic.unwrap().kind, FailureKind::Credential);
    assert_eq!(h.calls(), ["provision", "credential"]);
}

#[tokio::test]
async fn missing_secret_is_rejected_before_provisioning() {
    let h = HarnessBuilder::new().build();
    let secrets = Secrets::new().with("cerebrasKey", "csk-x");

    let err = h.orchestrator.start(&secrets).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::MissingSecret(MissingSecret("cartesiaKey".into()))
    );
    assert_eq!(h.orchestrator.state(), SessionState::Idle);
    assert!(h.calls().is_empty());
}

#[tokio::test]
async fn retry_after_failure_uses_a_fresh_credential() {
    let (room, _events, _probe) = connected_room();
    let h = HarnessBuilder::new()
        .room(Err(ConnectError::Sdk("ice negotiation failed".into())))
        .room(Ok(room))
        .build();

    let err = h.orchestrator.start(&demo_secrets()).await.unwrap_err();
    assert!(matches!(err, SessionError::Connect(ConnectError::Sdk(_))));
    let failed = h.orchestrator.snapshot();
    assert_eq!(failed.state, SessionState::Failed);
    assert_eq!(failed.credential_id, None);
    assert_eq!(failed.diagnostic.unwrap().kind, FailureKind::Connect);

    let state = h.orchestrator.start(&demo_secrets()).await.unwrap();
    assert_eq!(state, SessionState::Connected);
    let snap = h.orchestrator.snapshot();
    assert_eq!(snap.attempt, 2);
    assert_eq!(snap.diagnostic, None);

    let tokens: Vec<_> = h.dialed().into_iter().map(|(_, token)| token).collect();
    assert_eq!(tokens, ["token-1", "token-2"]);
    assert_eq!(
        h.calls(),
        ["provision", "credential", "connect", "provision", "credential", "connect"]
    );
}

#[tokio::test]
async fn start_while_active_is_rejected() {
    let (room, _events, _probe) = connected_room();
    let h = HarnessBuilder::new().room(Ok(room)).build();
    h.orchestrator.start(&demo_secrets()).await.unwrap();

    let err = h.orchestrator.start(&demo_secrets()).await.unwrap_err();
    assert_eq!(err, SessionError::AlreadyActive(SessionState::Connected));
    assert_eq!(h.calls(), ["provision", "credential", "connect"]);
}

#[tokio::test]
async fn start_while_provisioning_is_rejected() {
    let gate = Arc::new(Notify::new());
    let (room, _events, _probe) = connected_room();
    let h = HarnessBuilder::new().gate(gate.clone()).room(Ok(room)).build();
    let log = h.log.clone();
    let orchestrator = Arc::new(h.orchestrator);
    let mut rx = orchestrator.subscribe();

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start(&demo_secrets()).await })
    };
    wait_for(&mut rx, |s| s.state == SessionState::Provisioning).await;

    assert_eq!(
        orchestrator.start(&demo_secrets()).await,
        Err(SessionError::AlreadyActive(SessionState::Provisioning))
    );
    assert_eq!(orchestrator.snapshot().attempt, 1);

    gate.notify_one();
    assert_eq!(first.await.unwrap(), Ok(SessionState::Connected));
    assert_eq!(*log.lock().unwrap(), ["provision", "credential", "connect"]);
}

#[tokio::test]
async fn start_while_connecting_is_rejected() {
    let (room, events, _probe) = scripted_room();
    let h = HarnessBuilder::new().room(Ok(room)).build();
    let log = h.log.clone();
    let orchestrator = Arc::new(h.orchestrator);
    let mut rx = orchestrator.subscribe();

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start(&demo_secrets()).await })
    };
    wait_for(&mut rx, |s| s.state == SessionState::Connecting).await;

    assert_eq!(
        orchestrator.start(&demo_secrets()).await,
        Err(SessionError::AlreadyActive(SessionState::Connecting))
    );

    events
        .send(RoomEvent::ConnectionStateChanged(ConnectionState::Connected))
        .unwrap();
    assert_eq!(first.await.unwrap(), Ok(SessionState::Connected));
    assert_eq!(orchestrator.snapshot().attempt, 1);
    assert_eq!(*log.lock().unwrap(), ["provision", "credential", "connect"]);
}

#[tokio::test]
async fn empty_media_url_falls_back_to_configured_server() {
    let (room, _events, _probe) = connected_room();
    let h = HarnessBuilder::new()
        .credential_url("")
        .room(Ok(room))
        .build();

    h.orchestrator.start(&demo_secrets()).await.unwrap();
    assert_eq!(h.dialed()[0].0, SessionConfig::default().fallback_media_url);
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_connection_times_out() {
    let (room, _events, probe) = scripted_room();
    let h = HarnessBuilder::new().room(Ok(room)).build();

    let err = h.orchestrator.start(&demo_secrets()).await.unwrap_err();
    assert_eq!(err, SessionError::Connect(ConnectError::Timeout(15_000)));
    assert_eq!(h.orchestrator.state(), SessionState::Failed);
    wait_until(&probe.disconnected).await;
}

#[tokio::test]
async fn room_dropping_before_confirmation_fails_the_attempt() {
    let (room, events, _probe) = scripted_room();
    events
        .send(RoomEvent::ConnectionStateChanged(ConnectionState::Disconnected))
        .unwrap();
    let h = HarnessBuilder::new().room(Ok(room)).build();

    let err = h.orchestrator.start(&demo_secrets()).await.unwrap_err();
    assert_eq!(err, SessionError::Connect(ConnectError::Dropped));
    assert_eq!(h.orchestrator.state(), SessionState::Failed);
}

#[tokio::test]
async fn leave_ends_in_disconnected_and_allows_restart() {
    let (first, _events, probe) = connected_room();
    let (second, _events2, _probe2) = connected_room();
    let h = HarnessBuilder::new().room(Ok(first)).room(Ok(second)).build();
    h.orchestrator.start(&demo_secrets()).await.unwrap();

    h.orchestrator.leave().await;
    assert!(probe.disconnected.load(Ordering::SeqCst));
    let snap = h.orchestrator.snapshot();
    assert_eq!(snap.state, SessionState::Disconnected);
    assert_eq!(snap.connection, ConnectionState::Disconnected);
    assert_eq!(snap.issued_for, None);
    assert_eq!(snap.credential_id, None);

    assert_eq!(
        h.orchestrator.start(&demo_secrets()).await.unwrap(),
        SessionState::Connected
    );
}

#[tokio::test]
async fn remote_disconnect_is_observed() {
    let (room, events, _probe) = connected_room();
    let h = HarnessBuilder::new().room(Ok(room)).build();
    let mut rx = h.orchestrator.subscribe();
    h.orchestrator.start(&demo_secrets()).await.unwrap();

    events
        .send(RoomEvent::ConnectionStateChanged(ConnectionState::Reconnecting))
        .unwrap();
    let snap = wait_for(&mut rx, |s| s.connection == ConnectionState::Reconnecting).await;
    assert_eq!(snap.state, SessionState::Connected);

    events
        .send(RoomEvent::ConnectionStateChanged(ConnectionState::Disconnected))
        .unwrap();
    let snap = wait_for(&mut rx, |s| s.state == SessionState::Disconnected).await;
    assert!(snap.roster.is_empty());
}

#[tokio::test]
async fn transcript_lines_are_fanned_out_in_order() {
    let (room, events, _probe) = connected_room();
    let h = HarnessBuilder::new().room(Ok(room)).build();
    let mut transcript = h.orchestrator.subscribe_transcript();
    h.orchestrator.start(&demo_secrets()).await.unwrap();

    let data = |topic: &str, payload: &[u8]| RoomEvent::DataReceived {
        topic: Some(topic.into()),
        payload: payload.to_vec(),
        sender: Some("agent-1".into()),
    };
    events.send(data("agent_transcript", &[0xff, 0xfe])).unwrap();
    events.send(data("chat", b"ignored")).unwrap();
    events.send(data("agent_transcript", b"hello")).unwrap();
    events.send(data("agent_transcript", b"world")).unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), transcript.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), transcript.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.text, "hello");
    assert_eq!(second.text, "world");
    assert_eq!(first.sequence, 0);
    assert_eq!(second.sequence, 1);
}

#[tokio::test]
async fn agent_presence_tracks_the_roster() {
    let (room, events, _probe) = connected_room();
    let h = HarnessBuilder::new().room(Ok(room)).build();
    let mut rx = h.orchestrator.subscribe();
    h.orchestrator.start(&demo_secrets()).await.unwrap();

    assert_eq!(h.orchestrator.snapshot().primary_agent_participant(), None);

    events
        .send(RoomEvent::ParticipantJoined(Participant::local("demo-user")))
        .unwrap();
    events
        .send(RoomEvent::ParticipantJoined(Participant::remote("agent-1")))
        .unwrap();
    let snap = wait_for(&mut rx, |s| s.primary_agent_participant().is_some()).await;
    assert_eq!(snap.primary_agent_participant().unwrap().identity, "agent-1");
    assert!(!snap.is_agent_speaking());

    events
        .send(RoomEvent::SpeakingChanged {
            identity: "agent-1".into(),
            speaking: true,
        })
        .unwrap();
    wait_for(&mut rx, |s| s.is_agent_speaking()).await;

    events
        .send(RoomEvent::ParticipantLeft {
            identity: "agent-1".into(),
        })
        .unwrap();
    let snap = wait_for(&mut rx, |s| s.primary_agent_participant().is_none()).await;
    assert_eq!(snap.state, SessionState::Connected);
}

#[tokio::test]
async fn results_after_teardown_are_discarded() {
    let gate = Arc::new(Notify::new());
    let h = HarnessBuilder::new().gate(gate.clone()).build();
    let log = h.log.clone();
    let orchestrator = Arc::new(h.orchestrator);
    let mut rx = orchestrator.subscribe();

    let pending = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start(&demo_secrets()).await })
    };
    wait_for(&mut rx, |s| s.state == SessionState::Provisioning).await;

    orchestrator.teardown().await;
    gate.notify_one();

    assert_eq!(pending.await.unwrap(), Err(SessionError::Stale));
    assert_eq!(orchestrator.state(), SessionState::Provisioning);
    assert_eq!(*log.lock().unwrap(), ["provision"]);
    assert_eq!(
        orchestrator.start(&demo_secrets()).await,
        Err(SessionError::Stale)
    );
}

#[tokio::test]
async fn teardown_while_connecting_resolves_as_stale() {
    let (room, _events, probe) = scripted_room();
    let h = HarnessBuilder::new().room(Ok(room)).build();
    let orchestrator = Arc::new(h.orchestrator);
    let mut rx = orchestrator.subscribe();

    let pending = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start(&demo_secrets()).await })
    };
    wait_for(&mut rx, |s| s.state == SessionState::Connecting).await;

    orchestrator.teardown().await;

    assert_eq!(pending.await.unwrap(), Err(SessionError::Stale));
    wait_until(&probe.disconnected).await;
    let snap = orchestrator.snapshot();
    assert_eq!(snap.state, SessionState::Connecting);
    assert_eq!(snap.diagnostic, None);
}
