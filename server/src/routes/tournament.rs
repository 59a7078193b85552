// tournament lifecycle endpoints

use crate::{
    error::{ApiError, ApiResult},
    routes::STALE_RETRIES,
};
use app_core::{
    CoreError, DbpTournament, SchedulerConfig, SchedulerSignal, SeriesFormat, Tournament,
    TournamentStatus, TournamentType, WipeTable, bracket::BracketView, run_cycle,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::json;
use shared::AppState;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub t_type: TournamentType,
    pub format: SeriesFormat,
    pub map_pool: Vec<String>,
    pub team_ids: Vec<String>,
    #[serde(default)]
    pub status: Option<TournamentStatus>,
}

pub async fn get(State(state): State<AppState>) -> ApiResult<Json<Option<Tournament>>> {
    Ok(Json(state.core.get_tournament().await?))
}

pub async fn update(
    State(state): State<AppState>,
    Json(payload): Json<TournamentPayload>,
) -> ApiResult<Json<Tournament>> {
    for _ in 0..STALE_RETRIES {
        let mut tournament = state
            .core
            .get_tournament()
            .await?
            .unwrap_or_else(|| Tournament::new(payload.name.as_str()));
        tournament
            .set_name(payload.name.as_str())
            .set_type(payload.t_type)
            .set_format(payload.format)
            .set_map_pool(payload.map_pool.clone())
            .set_team_ids(payload.team_ids.clone());
        if let Some(status) = payload.status {
            match status {
                TournamentStatus::Setup | TournamentStatus::Ready => {
                    tournament.set_status(status);
                }
                other => {
                    return Err(ApiError(CoreError::Conflict(format!(
                        "status {other} can only be reached through start/reset"
                    ))));
                }
            }
        }
        match state.core.update_tournament(&tournament).await {
            Ok(saved) => return Ok(Json(saved)),
            Err(e) if e.is_stale() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(ApiError(CoreError::Db(app_core::DbError::Stale)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Generate the bracket and run one synchronous scheduler pass so
/// walkovers complete and free servers are bound before the response.
pub async fn start(
    State(state): State<AppState>,
    payload: Option<Json<StartPayload>>,
) -> ApiResult<Json<serde_json::Value>> {
    let created = state.core.start_tournament().await?;

    let mut cfg: SchedulerConfig = (*state.scheduler_cfg).clone();
    if let Some(Json(StartPayload {
        base_url: Some(base_url),
    })) = payload
    {
        cfg.base_url = base_url.trim_end_matches('/').to_string();
    }
    let outcome = run_cycle(&state.core, &cfg).await?;
    state.scheduler.notify(SchedulerSignal::TournamentStarted);

    info!(created, allocated = outcome.allocated, "tournament_start_ok");
    Ok(Json(json!({
        "success": true,
        "allocated": outcome.allocated,
    })))
}

pub async fn reset(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.core.reset_tournament().await?;
    Ok(Json(json!({"success": true})))
}

pub async fn wipe_database(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.core.database.wipe_all().await?;
    Ok(Json(json!({"success": true})))
}

pub async fn wipe_table(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let table = match table.as_str() {
        "teams" => WipeTable::Teams,
        "servers" => WipeTable::Servers,
        "tournament" => WipeTable::Tournament,
        "matches" => WipeTable::Matches,
        other => {
            return Err(ApiError(CoreError::NotFound(format!("table {other}"))));
        }
    };
    state.core.database.wipe_table(table).await?;
    Ok(Json(json!({"success": true})))
}

pub async fn bracket(State(state): State<AppState>) -> ApiResult<Json<BracketView>> {
    let tournament = state
        .core
        .get_tournament()
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound("tournament".into())))?;
    let matches = state
        .core
        .list_matches(&app_core::MatchFilter::default())
        .await?;
    let total_rounds = matches.iter().map(|m| m.get_round()).max().unwrap_or(0);
    Ok(Json(BracketView {
        tournament,
        matches,
        total_rounds,
    }))
}
