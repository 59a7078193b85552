// admin RCON surface
//
// These endpoints dispatch raw commands to the server a match is bound to;
// they never mutate persisted match state directly. Commands ride the
// match's interpreter queue, so an admin action and a webhook racing on
// the same match are serialized.

use crate::error::{ApiError, ApiResult};
use app_core::{CoreError, MatchFilter, MatchStatus, RconReply, send_with_retry};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use shared::AppState;
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerScopedPayload {
    pub server_id: String,
}

fn command_for(action: &str) -> Option<&'static str> {
    match action {
        "pause" => Some("css_pause"),
        "unpause" => Some("css_unpause"),
        "start-match" => Some("css_start"),
        "end-warmup" => Some("css_endwarmup"),
        _ => None,
    }
}

async fn slug_bound_to_server(state: &AppState, server_id: &str) -> Result<String, ApiError> {
    let matches = state.core.list_matches(&MatchFilter::default()).await?;
    matches
        .iter()
        .find(|m| {
            m.get_server_id() == Some(server_id) && m.get_status() != MatchStatus::Completed
        })
        .map(|m| m.get_slug().to_string())
        .ok_or_else(|| {
            ApiError(CoreError::Conflict(format!(
                "no active match bound to server {server_id}"
            )))
        })
}

pub async fn action(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Json(payload): Json<ServerScopedPayload>,
) -> ApiResult<Json<RconReply>> {
    let command = command_for(&action)
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("rcon action {action}"))))?;
    let slug = slug_bound_to_server(&state, &payload.server_id).await?;
    let reply = state.interpreter.admin(&slug, command.to_string()).await?;
    Ok(Json(reply))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPlayerPayload {
    pub server_id: String,
    pub steam_id: String,
    /// `team1`, `team2` or `spec`
    pub team: String,
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn add_player(
    State(state): State<AppState>,
    Json(payload): Json<AddPlayerPayload>,
) -> ApiResult<Json<RconReply>> {
    let slug = slug_bound_to_server(&state, &payload.server_id).await?;
    let mut command = format!("matchzy_addplayer {} {}", payload.steam_id, payload.team);
    if let Some(name) = &payload.name {
        command.push_str(&format!(" \"{name}\""));
    }
    let reply = state.interpreter.admin(&slug, command).await?;
    Ok(Json(reply))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastPayload {
    pub message: String,
    pub server_ids: Vec<String>,
}

/// Fire-and-count announcement across many servers; no match guard, the
/// message goes wherever a server listens.
pub async fn broadcast(
    State(state): State<AppState>,
    Json(payload): Json<BroadcastPayload>,
) -> ApiResult<Json<Value>> {
    let command = format!("say \"{}\"", payload.message);
    let total = payload.server_ids.len();
    let mut successful = 0;
    for server_id in &payload.server_ids {
        let Some(server) = state.core.get_server(server_id).await? else {
            warn!(server = %server_id, "broadcast_unknown_server");
            continue;
        };
        match send_with_retry(
            &state.core,
            &state.scheduler_cfg,
            &server.rcon_target(),
            &command,
        )
        .await
        {
            Ok(_) => successful += 1,
            Err(e) => warn!(server = %server_id, error = %e, "broadcast_failed"),
        }
    }
    let failed = total - successful;
    Ok(Json(json!({
        "success": failed == 0,
        "message": format!("Broadcast delivered to {successful}/{total} servers"),
        "stats": {"total": total, "successful": successful, "failed": failed},
    })))
}
