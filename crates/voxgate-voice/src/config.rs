use serde::{Deserialize, Serialize};
use std::fmt;

/// URL of a `livekit-server --dev` instance on the local machine.
pub const DEV_LIVEKIT_URL: &str = "ws://127.0.0.1:7880";
/// API key baked into `livekit-server --dev`.
pub const DEV_LIVEKIT_API_KEY: &str = "devkey";
/// API secret baked into `livekit-server --dev`.
pub const DEV_LIVEKIT_API_SECRET: &str = "secret";

fn default_token_ttl_seconds() -> u64 {
    3600
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LiveKitConfig {
    /// Media server URL returned to clients alongside their token.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// JWT token TTL in seconds for LiveKit join tokens. Default: 3600 (1 hour).
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }

    /// Configuration matching `livekit-server --dev`.
    pub fn dev() -> Self {
        Self::new(DEV_LIVEKIT_URL, DEV_LIVEKIT_API_KEY, DEV_LIVEKIT_API_SECRET)
    }

    /// Both signing halves are present.
    pub fn can_sign(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}
