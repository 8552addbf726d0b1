//! HTTP surface of the agent runner.

use crate::{AgentRunner, RunnerError};
use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use voxgate_types::Secrets;

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub running: bool,
    pub started: bool,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub running: bool,
    pub stopped: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
}

impl IntoResponse for RunnerError {
    fn into_response(self) -> Response {
        tracing::error!("agent runner error: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Routes under `/agent`. Expects an `Extension<Arc<AgentRunner>>` layer.
pub fn routes() -> Router {
    Router::new()
        .route("/agent/start", post(start_agent_handler))
        .route("/agent/stop", post(stop_agent_handler))
        .route("/agent/status", get(status_handler))
}

/// Handler for `POST /agent/start`.
///
/// The body is optional. String fields of a JSON object are taken as
/// provider keys; anything else is ignored.
pub async fn start_agent_handler(
    Extension(runner): Extension<Arc<AgentRunner>>,
    body: Bytes,
) -> Result<Json<StartResponse>, RunnerError> {
    let secrets = secrets_from_body(&body);
    let started = runner.start(&secrets).await?;
    Ok(Json(StartResponse {
        running: runner.running().await,
        started,
    }))
}

/// Handler for `POST /agent/stop`.
pub async fn stop_agent_handler(
    Extension(runner): Extension<Arc<AgentRunner>>,
) -> Result<Json<StopResponse>, RunnerError> {
    let stopped = runner.stop().await?;
    Ok(Json(StopResponse {
        running: runner.running().await,
        stopped,
    }))
}

/// Handler for `GET /agent/status`.
pub async fn status_handler(Extension(runner): Extension<Arc<AgentRunner>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: runner.running().await,
    })
}

fn secrets_from_body(body: &[u8]) -> Secrets {
    let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
        if !body.is_empty() {
            tracing::warn!(len = body.len(), "ignoring non-object agent start body");
        }
        return Secrets::new();
    };
    fields
        .into_iter()
        .filter_map(|(provider, key)| match key {
            Value::String(key) => Some((provider, key)),
            _ => None,
        })
        .fold(Secrets::new(), |secrets, (provider, key)| secrets.with(provider, key))
}
