// webhook ingest and event log queries

use crate::{
    auth::constant_time_eq,
    error::{ApiError, ApiResult},
};
use app_core::{ConnectedPlayer, CoreError, DbpEvent, LiveStats, StoredMatchEvent};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::{Value, json};
use shared::AppState;
use tracing::instrument;

pub const SERVER_TOKEN_HEADER: &str = "X-MatchZy-Token";

/// Plugin webhook ingest. Success is acknowledged once the event is
/// durably appended; interpretation runs behind the per-slug queue and its
/// failures never surface here.
#[instrument(name = "events.ingest", skip(state, headers, payload))]
pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<Json<Value>> {
    let presented = headers
        .get(SERVER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !constant_time_eq(presented.as_bytes(), state.auth.server_token.as_bytes()) {
        return Err(ApiError(CoreError::Unauthenticated));
    }

    state.interpreter.ingest(payload).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Event received",
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventListQuery {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn list(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<EventListQuery>,
) -> ApiResult<Json<Vec<StoredMatchEvent>>> {
    let fetch_limit = query.kind.is_none().then_some(query.limit).flatten();
    let mut events = state
        .core
        .database
        .list_events(&slug, None, fetch_limit)
        .await?;
    if let Some(kind) = &query.kind {
        events.retain(|e| &e.event_kind == kind);
        if let Some(limit) = query.limit {
            events.truncate(limit);
        }
    }
    Ok(Json(events))
}

pub async fn live(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Option<LiveStats>>> {
    Ok(Json(state.interpreter.live_stats(&slug).await?))
}

pub async fn connections(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<ConnectedPlayer>>> {
    Ok(Json(state.interpreter.connected_players(&slug).await?))
}

/// Event slugs with no match row; these are stored-but-uninterpreted
/// webhooks operators may want to inspect.
pub async fn orphans(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.core.database.orphan_event_slugs().await?))
}
