// match listing, plugin config document, manual load

use crate::{
    auth::bearer_ok,
    error::{ApiError, ApiResult},
};
use app_core::{
    CoreError, Match, MatchFilter, MatchStatus, MatchZyConfig, SchedulerConfig, build_document,
    load_match_onto_server,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use shared::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<MatchStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Match>>> {
    let filter = MatchFilter {
        status: query.status,
        ..Default::default()
    };
    Ok(Json(state.core.list_matches(&filter).await?))
}

/// `/api/matches/{slug}` serves two audiences from one path: the
/// `.json`-suffixed variant is the unauthenticated plugin config document,
/// everything else is the operator's match detail and requires the bearer.
pub async fn get_or_config(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    if let Some(stripped) = slug.strip_suffix(".json") {
        let doc = config_document(&state, stripped).await?;
        return Ok(Json(doc).into_response());
    }
    if !bearer_ok(&state, &headers) {
        return Err(ApiError(CoreError::Unauthenticated));
    }
    let m = state
        .core
        .get_match(&slug)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("match {slug}"))))?;
    Ok(Json(m).into_response())
}

async fn config_document(state: &AppState, slug: &str) -> Result<MatchZyConfig, ApiError> {
    let mut m = state
        .core
        .get_match(slug)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("match {slug}"))))?;
    if !m.is_veto_completed() {
        return Err(ApiError(CoreError::Conflict(format!(
            "match {slug} has no frozen map list yet"
        ))));
    }
    let team1 = lookup(state, m.get_team1_id()).await?;
    let team2 = lookup(state, m.get_team2_id()).await?;
    // the allocator freezes the config at load time; a plugin fetching
    // early still gets the completed veto's view
    if m.get_config().maplist.is_empty() {
        let config = app_core::build_config(&m, &team1, &team2);
        m.set_config(config);
    }
    Ok(build_document(&m, &team1, &team2))
}

async fn lookup(state: &AppState, id: Option<&str>) -> Result<app_core::Team, ApiError> {
    let id = id.ok_or_else(|| ApiError(CoreError::Conflict("match slot unresolved".into())))?;
    state
        .core
        .get_team(id)
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("team {id}"))))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadQuery {
    #[serde(default)]
    pub skip_webhook: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadPayload {
    #[serde(default)]
    pub server_id: Option<String>,
}

/// Manual (re-)push of a match onto a server.
pub async fn load(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<LoadQuery>,
    payload: Option<Json<LoadPayload>>,
) -> ApiResult<Json<Match>> {
    let wanted_server = payload.and_then(|Json(p)| p.server_id);
    let server = match wanted_server {
        Some(id) => state
            .core
            .get_server(&id)
            .await?
            .ok_or_else(|| ApiError(CoreError::NotFound(format!("server {id}"))))?,
        None => first_free_server(&state).await?,
    };
    let cfg: SchedulerConfig = (*state.scheduler_cfg).clone();
    let loaded =
        load_match_onto_server(&state.core, &cfg, &slug, &server, query.skip_webhook).await?;
    Ok(Json(loaded))
}

async fn first_free_server(state: &AppState) -> Result<app_core::GameServer, ApiError> {
    let matches = state.core.list_matches(&MatchFilter::default()).await?;
    let bound: std::collections::HashSet<&str> = matches
        .iter()
        .filter(|m| m.get_status() != MatchStatus::Completed)
        .filter_map(|m| m.get_server_id())
        .collect();
    let mut servers = state.core.list_servers().await?;
    servers.sort_by(|a, b| a.get_id().cmp(b.get_id()));
    servers
        .into_iter()
        .find(|s| s.is_enabled() && !bound.contains(s.get_id()))
        .ok_or_else(|| ApiError(CoreError::Conflict("no server available".into())))
}
