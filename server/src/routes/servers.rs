// game server CRUD

use crate::{
    error::{ApiError, ApiResult},
    routes::{STALE_RETRIES, teams::UpsertQuery},
};
use app_core::{CoreError, GameServer, utils::normalize::slugify};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use shared::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPayload {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub rcon_password: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

fn apply_payload(server: &mut GameServer, payload: &ServerPayload) {
    server.set_name(payload.name.as_str());
    server.set_host(payload.host.as_str());
    server.set_port(payload.port);
    if let Some(password) = &payload.rcon_password {
        server.set_rcon_password(password.as_str());
    }
    if let Some(enabled) = payload.enabled {
        server.set_enabled(enabled);
    }
}

fn payload_id(payload: &ServerPayload) -> String {
    payload
        .id
        .clone()
        .unwrap_or_else(|| slugify(&payload.name))
}

async fn upsert_from_payload(
    state: &AppState,
    payload: &ServerPayload,
) -> Result<GameServer, CoreError> {
    let id = payload_id(payload);
    for _ in 0..STALE_RETRIES {
        let mut server = match state.core.get_server(&id).await? {
            Some(existing) => existing,
            None => GameServer::with_id(id.as_str()),
        };
        apply_payload(&mut server, payload);
        match state.core.upsert_server(&server).await {
            Ok(saved) => return Ok(saved),
            Err(e) if e.is_stale() => continue,
            Err(e) => return Err(e),
        }
    }
    Err(CoreError::Db(app_core::DbError::Stale))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<GameServer>>> {
    Ok(Json(state.core.list_servers().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<UpsertQuery>,
    Json(payload): Json<ServerPayload>,
) -> ApiResult<(StatusCode, Json<GameServer>)> {
    let id = payload_id(&payload);
    if !query.upsert && state.core.get_server(&id).await?.is_some() {
        return Err(ApiError(CoreError::Conflict(format!(
            "server {id} already exists"
        ))));
    }
    let saved = upsert_from_payload(&state, &payload).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn batch(
    State(state): State<AppState>,
    Json(payloads): Json<Vec<ServerPayload>>,
) -> ApiResult<(StatusCode, Json<Vec<GameServer>>)> {
    let mut saved = Vec::with_capacity(payloads.len());
    for payload in &payloads {
        saved.push(upsert_from_payload(&state, payload).await?);
    }
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ServerPayload>,
) -> ApiResult<Json<GameServer>> {
    for _ in 0..STALE_RETRIES {
        let mut server = state
            .core
            .get_server(&id)
            .await?
            .ok_or_else(|| ApiError(CoreError::NotFound(format!("server {id}"))))?;
        apply_payload(&mut server, &payload);
        match state.core.upsert_server(&server).await {
            Ok(saved) => return Ok(Json(saved)),
            Err(e) if e.is_stale() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(ApiError(CoreError::Db(app_core::DbError::Stale)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.core.delete_server(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
