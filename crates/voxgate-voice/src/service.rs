use crate::config::LiveKitConfig;
use crate::error::VoiceError;
use livekit_api::access_token::{AccessToken, VideoGrants};
use std::time::Duration;

/// Mints LiveKit join tokens on behalf of browser clients.
#[derive(Debug, Clone)]
pub struct TokenService {
    config: LiveKitConfig,
}

impl TokenService {
    pub fn new(config: LiveKitConfig) -> Self {
        Self { config }
    }

    /// Whether tokens can be issued at all.
    pub fn is_enabled(&self) -> bool {
        self.config.can_sign()
    }

    /// The media server URL clients should connect to.
    pub fn media_url(&self) -> &str {
        &self.config.url
    }

    /// Issues a join token for `identity` in `room_name`.
    ///
    /// The token allows joining that one room, publishing and subscribing
    /// tracks, and publishing data messages.
    pub fn issue_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
    ) -> Result<String, VoiceError> {
        if !self.is_enabled() {
            return Err(VoiceError::Config(
                "LiveKit API key and secret must both be set".to_string(),
            ));
        }
        if room_name.is_empty() || participant_identity.is_empty() {
            return Err(VoiceError::InvalidRequest(
                "room and identity must be non-empty".to_string(),
            ));
        }

        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(participant_identity)
            .with_name(participant_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        let jwt = token.to_jwt()?;
        tracing::debug!(
            room = room_name,
            identity = participant_identity,
            token_len = jwt.len(),
            "issued join token"
        );
        Ok(jwt)
    }
}
