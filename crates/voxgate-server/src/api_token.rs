//! Room credential issuance.

use crate::{api::ApiError, AppState};
use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_ROOM: &str = "test-room";
pub const DEFAULT_PARTICIPANT_NAME: &str = "guest";

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub room: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub url: String,
}

/// Handler for `GET /api/token?room=&name=`.
///
/// Absent parameters fall back to `test-room` and `guest`; a parameter that
/// is present but empty is rejected with 400. The participant name doubles as
/// its identity.
pub async fn token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    let room = query.room.unwrap_or_else(|| DEFAULT_ROOM.to_string());
    let name = query
        .name
        .unwrap_or_else(|| DEFAULT_PARTICIPANT_NAME.to_string());

    let token = state.token_service.issue_join_token(&room, &name, &name)?;
    tracing::info!(room = %room, identity = %name, "issued room credential");

    Ok(Json(TokenResponse {
        token,
        url: state.token_service.media_url().to_string(),
    }))
}
