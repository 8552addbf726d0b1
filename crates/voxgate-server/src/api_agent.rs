//! Agent control proxy.
//!
//! Forwards the browser's provider keys to the agent backend. The request
//! body is never logged.

use crate::AppState;
use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Handler for `POST /api/agent/start`.
///
/// The backend's status and JSON body are passed through unchanged; a
/// non-JSON backend body becomes `{}`. A request body that is not JSON is
/// forwarded as `{}`.
pub async fn start_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Response {
    let payload: Value = serde_json::from_slice(&body).unwrap_or_else(|_| json!({}));

    let Some(backend_url) = state.backend_url.as_deref() else {
        tracing::warn!("agent start requested but no backend is configured");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "BACKEND_URL not configured" })),
        )
            .into_response();
    };

    match forward_start(&state.http, backend_url, &payload).await {
        Ok((status, data)) => {
            tracing::info!(status = status.as_u16(), "agent backend responded");
            (status, Json(data)).into_response()
        }
        Err(e) => {
            tracing::warn!("agent backend proxy failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Proxy error", "details": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn forward_start(
    client: &reqwest::Client,
    backend_url: &str,
    payload: &Value,
) -> Result<(StatusCode, Value), reqwest::Error> {
    let url = format!("{}/agent/start", backend_url.trim_end_matches('/'));
    let res = client.post(&url).json(payload).send().await?;

    let status =
        StatusCode::from_u16(res.status().as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = res.bytes().await?;
    let data = serde_json::from_slice(&bytes).unwrap_or_else(|_| json!({}));
    Ok((status, data))
}
