//! Webhook ingest contracts: forward compatibility, orphans, ordering,
//! idempotence, and the per-slug serialization of events vs. admin
//! commands.

use app_core::{DbpEvent, MatchStatus, SeriesFormat, TournamentType};
use integration_testing::test_env::TestEnv;
use serde_json::json;

async fn live_match(env: &TestEnv) {
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
    env.post_event(json!({"event": "series_start", "matchid": "a_vs_b", "num_maps": 1}))
        .await;
    assert_eq!(
        env.core.get_match("a_vs_b").await.unwrap().unwrap().get_status(),
        MatchStatus::Live
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_event_kinds_are_stored_but_not_interpreted() {
    let env = TestEnv::new();
    live_match(&env).await;
    let before = env.core.get_match("a_vs_b").await.unwrap().unwrap();

    env.post_event(json!({"event": "grenade_thrown", "matchid": "a_vs_b", "x": 1}))
        .await;

    let events = env
        .core
        .database
        .list_events("a_vs_b", None, None)
        .await
        .unwrap();
    assert!(events.iter().any(|e| e.event_kind == "grenade_thrown"));

    let after = env.core.get_match("a_vs_b").await.unwrap().unwrap();
    assert_eq!(before.get_status(), after.get_status());
    assert_eq!(before.get_team1_score(), after.get_team1_score());
}

#[tokio::test(flavor = "multi_thread")]
async fn events_for_unknown_matches_are_accepted_and_listed_as_orphans() {
    let env = TestEnv::new();
    live_match(&env).await;

    let id = env
        .post_event(json!({"event": "round_end", "matchid": "ghost", "round_number": 1}))
        .await;
    assert!(id > 0, "orphan events are still appended");

    assert!(env.core.get_match("ghost").await.unwrap().is_none());
    let orphans = env.core.database.orphan_event_slugs().await.unwrap();
    assert_eq!(orphans, vec!["ghost".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn round_events_apply_in_append_order() {
    let env = TestEnv::new();
    live_match(&env).await;

    for (round, s1, s2) in [(1u32, 1u32, 0u32), (2, 1, 1), (3, 2, 1)] {
        env.post_event(json!({
            "event": "round_end",
            "matchid": "a_vs_b",
            "round_number": round,
            "team1_score": s1,
            "team2_score": s2
        }))
        .await;
    }

    let m = env.core.get_match("a_vs_b").await.unwrap().unwrap();
    assert_eq!((m.get_team1_score(), m.get_team2_score()), (2, 1));
}

#[tokio::test(flavor = "multi_thread")]
async fn reposted_map_results_do_not_double_count() {
    let env = TestEnv::new();
    live_match(&env).await;

    let payload = json!({
        "event": "map_result",
        "matchid": "a_vs_b",
        "map_number": 0,
        "map_name": "de_ancient",
        "team1_score": 13,
        "team2_score": 7
    });
    env.post_event(payload.clone()).await;
    env.post_event(payload).await;

    let m = env.core.get_match("a_vs_b").await.unwrap().unwrap();
    // both posts are in the log, the state counted one map
    assert_eq!(m.get_team1_series_score(), 1);
    assert_eq!(m.get_map_results().len(), 1);
    let events = env
        .core
        .database
        .list_events("a_vs_b", None, None)
        .await
        .unwrap();
    assert_eq!(
        events
            .iter()
            .filter(|e| e.event_kind == "map_result")
            .count(),
        2
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn a_series_end_and_an_admin_command_on_the_same_match_serialize() {
    let env = TestEnv::new();
    live_match(&env).await;

    // enqueue the webhook first, then the admin action; they share the
    // match's serial queue, so the admin command sees the completed match
    env.interpreter
        .ingest(json!({"event": "series_end", "matchid": "a_vs_b", "winner": "team1"}))
        .await
        .unwrap();
    let admin_result = env
        .interpreter
        .admin("a_vs_b", "css_start".to_string())
        .await;

    let err = admin_result.expect_err("force start after series end must conflict");
    assert!(err.to_string().contains("not live"), "got: {err}");

    let m = env.core.get_match("a_vs_b").await.unwrap().unwrap();
    assert_eq!(m.get_status(), MatchStatus::Completed);
    assert_eq!(m.get_winner_id(), Some("a"));
}

#[tokio::test(flavor = "multi_thread")]
async fn admin_commands_reach_the_bound_server_while_live() {
    let env = TestEnv::new();
    live_match(&env).await;
    env.rcon.clear();

    let reply = env
        .interpreter
        .admin("a_vs_b", "css_pause".to_string())
        .await
        .unwrap();
    assert!(reply.ok);

    let commands = env.rcon.sent_commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].0, "10.0.0.1:27015");
    assert_eq!(commands[0].1, "css_pause");
}

#[tokio::test(flavor = "multi_thread")]
async fn live_stats_rebuild_from_the_event_log() {
    let env = TestEnv::new();
    live_match(&env).await;

    env.post_event(json!({
        "event": "player_connect",
        "matchid": "a_vs_b",
        "steamid": "76561198000000001",
        "name": "alpha one",
        "team": "team1"
    }))
    .await;
    env.post_event(json!({
        "event": "player_death",
        "matchid": "a_vs_b",
        "attacker": {"steamid": "76561198000000001", "name": "alpha one"},
        "victim": {"steamid": "76561198000000002", "name": "bravo one"},
        "weapon": "awp",
        "headshot": true
    }))
    .await;

    let connected = env
        .interpreter
        .connected_players("a_vs_b")
        .await
        .unwrap();
    assert_eq!(connected.len(), 1);
    assert_eq!(connected[0].steam_id, "76561198000000001");

    let stats = env
        .interpreter
        .live_stats("a_vs_b")
        .await
        .unwrap()
        .expect("live stats exist");
    assert_eq!(stats.status, MatchStatus::Live);
    let attacker = stats
        .player_stats
        .team1
        .iter()
        .find(|p| p.steam_id == "76561198000000001")
        .expect("attacker tracked");
    assert_eq!(attacker.kills, 1);
    assert_eq!(attacker.headshots, 1);
}
