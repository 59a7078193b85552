// team CRUD

use crate::{
    error::{ApiError, ApiResult},
    routes::STALE_RETRIES,
};
use app_core::{CoreError, Team, normalize_players, utils::normalize::slugify};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use shared::AppState;
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPayload {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub discord_role_id: Option<String>,
    /// accepts every roster shape the UI has ever produced
    #[serde(default)]
    pub players: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpsertQuery {
    #[serde(default)]
    pub upsert: bool,
}

fn apply_payload(team: &mut Team, payload: &TeamPayload) {
    team.set_name(payload.name.as_str());
    if let Some(tag) = &payload.tag {
        team.set_tag(tag.as_str());
    }
    team.set_discord_role_id(payload.discord_role_id.clone());
    if let Some(raw) = &payload.players {
        let (players, warnings) = normalize_players(raw);
        for warning in warnings {
            warn!(team = %team.get_id(), %warning, "player_shape_degraded");
        }
        team.set_players(players);
    }
}

fn payload_id(payload: &TeamPayload) -> String {
    payload
        .id
        .clone()
        .unwrap_or_else(|| slugify(&payload.name))
}

async fn upsert_from_payload(state: &AppState, payload: &TeamPayload) -> Result<Team, CoreError> {
    let id = payload_id(payload);
    for _ in 0..STALE_RETRIES {
        let mut team = match state.core.get_team(&id).await? {
            Some(existing) => existing,
            None => Team::with_id(id.as_str()),
        };
        apply_payload(&mut team, payload);
        match state.core.upsert_team(&team).await {
            Ok(saved) => return Ok(saved),
            Err(e) if e.is_stale() => continue,
            Err(e) => return Err(e),
        }
    }
    Err(CoreError::Db(app_core::DbError::Stale))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Team>>> {
    Ok(Json(state.core.list_teams().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<UpsertQuery>,
    Json(payload): Json<TeamPayload>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    let id = payload_id(&payload);
    if !query.upsert && state.core.get_team(&id).await?.is_some() {
        return Err(ApiError(CoreError::Conflict(format!(
            "team {id} already exists"
        ))));
    }
    let saved = upsert_from_payload(&state, &payload).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn batch(
    State(state): State<AppState>,
    Json(payloads): Json<Vec<TeamPayload>>,
) -> ApiResult<(StatusCode, Json<Vec<Team>>)> {
    let mut saved = Vec::with_capacity(payloads.len());
    for payload in &payloads {
        saved.push(upsert_from_payload(&state, payload).await?);
    }
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<TeamPayload>,
) -> ApiResult<Json<Team>> {
    for _ in 0..STALE_RETRIES {
        let mut team = state
            .core
            .get_team(&id)
            .await?
            .ok_or_else(|| ApiError(CoreError::NotFound(format!("team {id}"))))?;
        apply_payload(&mut team, &payload);
        match state.core.upsert_team(&team).await {
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
    state.core.delete_team(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
