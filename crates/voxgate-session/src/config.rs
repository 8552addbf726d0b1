//! Orchestrator configuration.
//!
//! Passed explicitly at construction; nothing here is read from the process
//! environment. Every field has a deterministic default so a partial TOML or
//! JSON document is enough.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Data channel topic the agent publishes transcript lines on.
pub const TRANSCRIPT_TOPIC: &str = "agent_transcript";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Edge endpoint that starts the agent (`POST`).
    #[serde(default = "default_agent_control_url")]
    pub agent_control_url: String,

    /// Edge endpoint that issues room credentials (`GET ?room=&name=`).
    #[serde(default = "default_credential_service_url")]
    pub credential_service_url: String,

    /// Room to join.
    #[serde(default = "default_room")]
    pub room: String,

    /// Identity of the local participant.
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Media server URL used when the credential service returns none.
    #[serde(default = "default_fallback_media_url")]
    pub fallback_media_url: String,

    /// Data channel topic carrying transcript lines.
    #[serde(default = "default_transcript_topic")]
    pub transcript_topic: String,

    /// Secrets that must be present and non-blank before provisioning.
    #[serde(default = "default_required_secrets")]
    pub required_secrets: Vec<String>,

    /// Timeout for each HTTP call to the edge.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// How long to wait for the media connector to confirm the room.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_agent_control_url() -> String {
    "http://127.0.0.1:3000/api/agent/start".to_string()
}

fn default_credential_service_url() -> String {
    "http://127.0.0.1:3000/api/token".to_string()
}

fn default_room() -> String {
    "test-room".to_string()
}

fn default_identity() -> String {
    "demo-user".to_string()
}

fn default_fallback_media_url() -> String {
    "ws://127.0.0.1:7880".to_string()
}

fn default_transcript_topic() -> String {
    TRANSCRIPT_TOPIC.to_string()
}

fn default_required_secrets() -> Vec<String> {
    vec!["cerebrasKey".to_string(), "cartesiaKey".to_string()]
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    15_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            agent_control_url: default_agent_control_url(),
            credential_service_url: default_credential_service_url(),
            room: default_room(),
            identity: default_identity(),
            fallback_media_url: default_fallback_media_url(),
            transcript_topic: default_transcript_topic(),
            required_secrets: default_required_secrets(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl SessionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: SessionConfig = toml::from_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.room, "test-room");
        assert_eq!(config.transcript_topic, "agent_transcript");
        assert_eq!(config.required_secrets, ["cerebrasKey", "cartesiaKey"]);
    }

    #[test]
    fn overrides_are_applied() {
        let config: SessionConfig = toml::from_str(
            r#"
            agent_control_url = "https://edge.example/api/agent/start"
            identity = "alice"
            connect_timeout_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.agent_control_url, "https://edge.example/api/agent/start");
        assert_eq!(config.identity, "alice");
        assert_eq!(config.connect_timeout(), Duration::from_millis(500));
        assert_eq!(config.credential_service_url, default_credential_service_url());
    }
}
