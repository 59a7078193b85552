// steam id resolution

use crate::error::ApiError;
use app_core::{SteamError, SteamResolverPort};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use shared::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolvePayload {
    pub input: String,
}

pub async fn resolve(
    State(state): State<AppState>,
    Json(payload): Json<ResolvePayload>,
) -> Result<impl IntoResponse, ApiError> {
    match state.core.steam.resolve(&payload.input).await {
        Ok(player) => Ok(Json(json!({"player": player})).into_response()),
        Err(e @ SteamError::NotConfigured) => Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": e.to_string()})),
        )
            .into_response()),
        Err(e @ SteamError::NotFound) => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({"error": e.to_string()})),
        )
            .into_response()),
        Err(e) => Ok((
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": e.to_string()})),
        )
            .into_response()),
    }
}
