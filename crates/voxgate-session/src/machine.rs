//! The session lifecycle transition table.
//!
//! ```text
//! Idle --StartRequested--> Provisioning
//! Provisioning --ProvisionOk--> AwaitingCredential
//! Provisioning --ProvisionFailed--> Failed
//! AwaitingCredential --CredentialOk--> Connecting
//! AwaitingCredential --CredentialFailed--> Failed
//! Connecting --SdkConnected--> Connected
//! Connecting --SdkConnectFailed--> Failed
//! Connected --SdkDisconnected--> Disconnected
//! Failed, Disconnected --StartRequested--> Provisioning
//! ```

use crate::error::InvalidTransition;
use voxgate_types::SessionState;

/// Inputs that drive the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    StartRequested,
    ProvisionOk,
    ProvisionFailed,
    CredentialOk,
    CredentialFailed,
    SdkConnected,
    SdkConnectFailed,
    SdkDisconnected,
}

impl SessionEvent {
    pub fn name(self) -> &'static str {
        match self {
            Self::StartRequested => "start_requested",
            Self::ProvisionOk => "provision_ok",
            Self::ProvisionFailed => "provision_failed",
            Self::CredentialOk => "credential_ok",
            Self::CredentialFailed => "credential_failed",
            Self::SdkConnected => "sdk_connected",
            Self::SdkConnectFailed => "sdk_connect_failed",
            Self::SdkDisconnected => "sdk_disconnected",
        }
    }
}

/// Applies `event` to `from`, returning the next state.
pub fn next_state(from: SessionState, event: SessionEvent) -> Result<SessionState, InvalidTransition> {
    use SessionEvent as E;
    use SessionState as S;

    let next = match (from, event) {
        (S::Idle | S::Failed | S::Disconnected, E::StartRequested) => S::Provisioning,
        (S::Provisioning, E::ProvisionOk) => S::AwaitingCredential,
        (S::Provisioning, E::ProvisionFailed) => S::Failed,
        (S::AwaitingCredential, E::CredentialOk) => S::Connecting,
        (S::AwaitingCredential, E::CredentialFailed) => S::Failed,
        (S::Connecting, E::SdkConnected) => S::Connected,
        (S::Connecting, E::SdkConnectFailed) => S::Failed,
        (S::Connected, E::SdkDisconnected) => S::Disconnected,
        _ => {
            return Err(InvalidTransition {
                from,
                event: event.name(),
            })
        }
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionEvent as E;
    use SessionState as S;

    const ALL_STATES: [SessionState; 7] = [
        S::Idle,
        S::Provisioning,
        S::AwaitingCredential,
        S::Connecting,
        S::Connected,
        S::Disconnected,
        S::Failed,
    ];

    fn run(events: &[SessionEvent]) -> Result<Vec<SessionState>, InvalidTransition> {
        let mut state = S::Idle;
        let mut path = vec![state];
        for event in events {
            state = next_state(state, *event)?;
            path.push(state);
        }
        Ok(path)
    }

    #[test]
    fn happy_path_visits_every_step_in_order() {
        let path = run(&[
            E::StartRequested,
            E::ProvisionOk,
            E::CredentialOk,
            E::SdkConnected,
            E::SdkDisconnected,
        ])
        .unwrap();
        assert_eq!(
            path,
            vec![
                S::Idle,
                S::Provisioning,
                S::AwaitingCredential,
                S::Connecting,
                S::Connected,
                S::Disconnected
            ]
        );
    }

    #[test]
    fn connected_is_only_reachable_from_connecting() {
        for from in ALL_STATES {
            let result = next_state(from, E::SdkConnected);
            if from == S::Connecting {
                assert_eq!(result, Ok(S::Connected));
            } else {
                assert!(result.is_err(), "{from} must not jump to Connected");
            }
        }
    }

    #[test]
    fn each_failure_lands_in_failed() {
        assert_eq!(run(&[E::StartRequested, E::ProvisionFailed]).unwrap().last(), Some(&S::Failed));
        assert_eq!(
            run(&[E::StartRequested, E::ProvisionOk, E::CredentialFailed])
                .unwrap()
                .last(),
            Some(&S::Failed)
        );
        assert_eq!(
            run(&[
                E::StartRequested,
                E::ProvisionOk,
                E::CredentialOk,
                E::SdkConnectFailed
            ])
            .unwrap()
            .last(),
            Some(&S::Failed)
        );
    }

    #[test]
    fn terminal_states_restart_from_scratch() {
        assert_eq!(next_state(S::Failed, E::StartRequested), Ok(S::Provisioning));
        assert_eq!(next_state(S::Disconnected, E::StartRequested), Ok(S::Provisioning));
    }

    #[test]
    fn start_is_rejected_while_active() {
        for from in [S::Provisioning, S::AwaitingCredential, S::Connecting, S::Connected] {
            let err = next_state(from, E::StartRequested).unwrap_err();
            assert_eq!(err.from, from);
            assert_eq!(err.event, "start_requested");
        }
    }

    #[test]
    fn credential_cannot_skip_provisioning() {
        assert!(run(&[E::StartRequested, E::CredentialOk]).is_err());
        assert!(run(&[E::CredentialOk]).is_err());
    }
}
