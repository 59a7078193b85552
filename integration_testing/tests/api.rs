//! Router-level tests: authentication boundaries and response shapes.

use app_core::{MatchStatus, SeriesFormat, TournamentType};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use integration_testing::test_env::TestEnv;
use serde_json::{Value, json};
use shared::{AppState, AuthTokens};
use std::sync::Arc;
use tower::ServiceExt;

const API_TOKEN: &str = "test-api-token";
const SERVER_TOKEN: &str = "test-server-token";

fn router_for(env: &TestEnv) -> Router {
    let state = AppState {
        core: env.core.clone(),
        interpreter: env.interpreter.clone(),
        scheduler: env.scheduler.clone(),
        scheduler_cfg: Arc::new(env.cfg.clone()),
        auth: Arc::new(AuthTokens {
            api_token: API_TOKEN.to_string(),
            server_token: SERVER_TOKEN.to_string(),
        }),
        demo_dir: Arc::new(std::env::temp_dir()),
    };
    server::build_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

fn authed(request: axum::http::request::Builder) -> axum::http::request::Builder {
    request.header(header::AUTHORIZATION, format!("Bearer {API_TOKEN}"))
}

#[tokio::test(flavor = "multi_thread")]
async fn operator_routes_reject_missing_or_wrong_bearer() {
    let env = TestEnv::new();
    let app = router_for(&env);

    let response = app
        .clone()
        .oneshot(Request::get("/api/teams").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::get("/api/teams")
                .header(header::AUTHORIZATION, "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn team_crud_round_trips_through_the_api() {
    let env = TestEnv::new();
    let app = router_for(&env);

    let create = authed(Request::post("/api/teams"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "name": "Alpha Squad",
                "tag": "ALF",
                "players": [
                    {"steamid": "76561198000000001", "name": "one"},
                    "76561198000000002"
                ]
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["id"], "alpha_squad");
    assert_eq!(body["players"].as_array().unwrap().len(), 2);

    // duplicate without upsert conflicts
    let duplicate = authed(Request::post("/api/teams"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"name": "Alpha Squad"}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(duplicate).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "conflict");

    let list = authed(Request::get("/api/teams")).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(list).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let delete = authed(Request::delete("/api/teams/alpha_squad"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test(flavor = "multi_thread")]
async fn webhook_ingest_requires_the_server_token() {
    let env = TestEnv::new();
    let app = router_for(&env);

    let no_token = Request::post("/api/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"event": "round_end", "matchid": "ghost"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(no_token).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let good = Request::post("/api/events")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-MatchZy-Token", SERVER_TOKEN)
        .body(Body::from(
            json!({"event": "round_end", "matchid": "ghost"}).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(good).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Event received");
}

#[tokio::test(flavor = "multi_thread")]
async fn the_plugin_config_document_is_public_and_the_detail_is_not() {
    let env = TestEnv::new();
    env.seed_team("a", 1).await;
    env.seed_team("b", 2).await;
    env.seed_server("s1", "10.0.0.1").await;
    env.seed_tournament(
        TournamentType::SingleElim,
        SeriesFormat::Bo1,
        &["de_mirage", "de_inferno", "de_ancient"],
        &["a", "b"],
    )
    .await;
    env.core.start_tournament().await.unwrap();
    env.cycle().await;
    assert_eq!(
        env.core.get_match("a_vs_b").await.unwrap().unwrap().get_status(),
        MatchStatus::Loaded
    );

    let app = router_for(&env);

    let doc = Request::get("/api/matches/a_vs_b.json")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(doc).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["matchid"], "a_vs_b");
    assert_eq!(body["skip_veto"], true);
    assert_eq!(body["maplist"], json!(["de_ancient"]));
    assert_eq!(body["map_sides"], json!(["knife"]));

    let detail = Request::get("/api/matches/a_vs_b")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(detail).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let detail = authed(Request::get("/api/matches/a_vs_b"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(detail).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["slug"], "a_vs_b");
    assert_eq!(body["status"], "loaded");
}

#[tokio::test(flavor = "multi_thread")]
async fn steam_resolver_reports_missing_configuration() {
    let env = TestEnv::new();
    let app = router_for(&env);

    let request = authed(Request::post("/api/steam/resolve"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"input": "somecoolguy"}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Steam API is not configured");
}

#[tokio::test(flavor = "multi_thread")]
async fn public_team_view_exposes_the_current_match_without_auth() {
    let env = TestEnv::new();
    env.seed_team("a", 1).await;
    env.seed_team("b", 2).await;
    env.seed_server("s1", "10.0.0.1").await;
    env.seed_tournament(
        TournamentType::SingleElim,
        SeriesFormat::Bo1,
        &["de_mirage", "de_inferno", "de_ancient"],
        &["a", "b"],
    )
    .await;
    env.core.start_tournament().await.unwrap();
    env.cycle().await;

    let app = router_for(&env);
    let request = Request::get("/api/team/b/match").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["match"]["slug"], "a_vs_b");
    assert_eq!(body["isTeam1"], false);
    assert_eq!(body["tournamentStatus"], "in_progress");
    // connect info appears because the match is loaded
    assert_eq!(body["server"]["host"], "10.0.0.1");
}
