//! Voxgate edge: the browser-facing HTTP surface.
//!
//! Proxies agent start requests to the agent backend, mints LiveKit room
//! credentials, and optionally runs the agent backend in-process.

pub mod api;
pub mod api_agent;
pub mod api_token;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use config::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use voxgate_runner::AgentRunner;
use voxgate_voice::TokenService;

/// Maximum request body size (64 KiB). Only small JSON documents are accepted.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Base URL of the agent backend, if configured.
    pub backend_url: Option<String>,
    /// HTTP client for proxied backend calls.
    pub http: reqwest::Client,
    /// LiveKit token minting.
    pub token_service: Arc<TokenService>,
    /// In-process agent runner, if configured.
    pub runner: Option<Arc<AgentRunner>>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.edge.backend_timeout())
            .build()?;
        Ok(Self {
            backend_url: config
                .edge
                .backend_url
                .clone()
                .filter(|u| !u.trim().is_empty()),
            http,
            token_service: Arc::new(TokenService::new(config.livekit.clone())),
            runner: config
                .agent
                .clone()
                .map(|agent| Arc::new(AgentRunner::new(agent))),
        })
    }
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(api::health))
        .route("/api/agent/start", post(api_agent::start_agent_handler))
        .route("/api/token", get(api_token::token_handler));

    if let Some(runner) = &state.runner {
        tracing::info!(program = %runner.config().program, "serving agent runner routes");
        router = router.merge(voxgate_runner::routes().layer(Extension(runner.clone())));
    }

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
