// HTTP server assembly; the binary in main.rs wires configuration, the
// database and the background tasks around `build_router`.

pub mod auth;
pub mod config;
pub mod error;
pub mod rcon_client;
pub mod routes;
pub mod steam_resolver;
pub mod ws_service;

use app_core::DbpTournament;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_extra::routing::RouterExt;
use serde::Serialize;
use shared::AppState;
use tracing::instrument;

// --- /health (service liveness) ---
#[instrument(name = "health")]
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// --- /health/db (database readiness) ---
#[derive(Serialize)]
struct DbStatus {
    db: &'static str,
}

#[instrument(name = "health_db", skip(app_state))]
async fn health_db(State(app_state): State<AppState>) -> impl IntoResponse {
    match app_state.core.database.ping_db().await {
        Ok(_) => (StatusCode::OK, Json(DbStatus { db: "ok" })),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(DbStatus { db: "down" }),
        ),
    }
}

/// The full HTTP surface: a public slice (plugin webhook, plugin config
/// document, team views, push channel, health) merged with the
/// bearer-guarded operator surface.
pub fn build_router(state: AppState) -> Router {
    let operator = Router::new()
        .route(
            "/api/teams",
            get(routes::teams::list).post(routes::teams::create),
        )
        .route("/api/teams/batch", post(routes::teams::batch))
        .route(
            "/api/teams/{id}",
            put(routes::teams::update).delete(routes::teams::delete),
        )
        .route("/api/steam/resolve", post(routes::steam::resolve))
        .route(
            "/api/servers",
            get(routes::servers::list).post(routes::servers::create),
        )
        .route("/api/servers/batch", post(routes::servers::batch))
        .route(
            "/api/servers/{id}",
            put(routes::servers::update).delete(routes::servers::delete),
        )
        .route(
            "/api/tournament",
            get(routes::tournament::get).put(routes::tournament::update),
        )
        .route("/api/tournament/start", post(routes::tournament::start))
        .route("/api/tournament/reset", post(routes::tournament::reset))
        .route(
            "/api/tournament/wipe-database",
            post(routes::tournament::wipe_database),
        )
        .route(
            "/api/tournament/wipe-table/{table}",
            post(routes::tournament::wipe_table),
        )
        .route("/api/tournament/bracket", get(routes::tournament::bracket))
        .route("/api/matches", get(routes::matches::list))
        .route("/api/matches/{slug}/load", post(routes::matches::load))
        .route("/api/events/orphans", get(routes::events::orphans))
        .route("/api/events/live/{slug}", get(routes::events::live))
        .route(
            "/api/events/connections/{slug}",
            get(routes::events::connections),
        )
        .route("/api/events/{slug}", get(routes::events::list))
        .route("/api/rcon/broadcast", post(routes::rcon_admin::broadcast))
        .route("/api/rcon/add-player", post(routes::rcon_admin::add_player))
        .route("/api/rcon/{action}", post(routes::rcon_admin::action))
        .typed_get(routes::demos::download_latest)
        .typed_get(routes::demos::download_map)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .route("/health/db", get(health_db))
        .route("/api/events", post(routes::events::ingest))
        .route("/api/matches/{slug}", get(routes::matches::get_or_config))
        .route(
            "/api/team/{team_id}/match",
            get(routes::team_view::current_match),
        )
        .route(
            "/api/team/{team_id}/history",
            get(routes::team_view::history),
        )
        .route("/api/team/{team_id}/stats", get(routes::team_view::stats))
        .route("/api/ws", get(ws_service::ws_handler));

    public
        .merge(operator)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
