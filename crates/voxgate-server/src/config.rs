//! Edge configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;
use voxgate_runner::AgentCommandConfig;
use voxgate_voice::LiveKitConfig;

/// Top-level edge configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Agent control proxy settings.
    #[serde(default)]
    pub edge: EdgeConfig,

    /// LiveKit signing credentials for `/api/token`.
    #[serde(default)]
    pub livekit: LiveKitConfig,

    /// Local agent process. When set, `/agent/*` routes are served too.
    #[serde(default)]
    pub agent: Option<AgentCommandConfig>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "voxgate_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    /// Base URL of the agent backend. `/agent/start` is appended.
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Timeout for proxied backend calls.
    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backend_timeout_ms() -> u64 {
    30_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            backend_timeout_ms: default_backend_timeout_ms(),
        }
    }
}

impl EdgeConfig {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides (see [`apply_env_overrides`]).
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies overrides looked up through `var`:
/// - `VOXGATE_HOST`, `VOXGATE_PORT` override `server.*`
/// - `VOXGATE_LOG_LEVEL`, `VOXGATE_LOG_JSON` ("true" or "1") override `logging.*`
/// - `VOXGATE_BACKEND_URL` overrides `edge.backend_url`
/// - `VOXGATE_LIVEKIT_URL`, `VOXGATE_LIVEKIT_API_KEY`, `VOXGATE_LIVEKIT_API_SECRET`
///   override `livekit.*`
/// - `VOXGATE_AGENT_COMMAND` replaces `agent` with a whitespace-split command line
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("VOXGATE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("VOXGATE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = var("VOXGATE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("VOXGATE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(url) = var("VOXGATE_BACKEND_URL") {
        config.edge.backend_url = Some(url).filter(|u| !u.trim().is_empty());
    }
    if let Some(url) = var("VOXGATE_LIVEKIT_URL") {
        config.livekit.url = url;
    }
    if let Some(key) = var("VOXGATE_LIVEKIT_API_KEY") {
        config.livekit.api_key = key;
    }
    if let Some(secret) = var("VOXGATE_LIVEKIT_API_SECRET") {
        config.livekit.api_secret = secret;
    }
    if let Some(command) = var("VOXGATE_AGENT_COMMAND") {
        let mut parts = command.split_whitespace();
        if let Some(program) = parts.next() {
            let stop_timeout_secs = config
                .agent
                .as_ref()
                .map(|a| a.stop_timeout_secs)
                .unwrap_or(10);
            let mut agent = AgentCommandConfig::new(program).with_args(parts);
            agent.stop_timeout_secs = stop_timeout_secs;
            config.agent = Some(agent);
        }
    }
}
