//! End-to-end scenarios over the full fake-backed stack: bracket
//! generation, allocation, webhook interpretation, advancement.

use app_core::{ClientRegistryPort, CrPushNotice, CrTopic, MatchStatus, SeriesFormat,
    TournamentStatus, TournamentType};
use futures_util::StreamExt;
use integration_testing::test_env::TestEnv;
use serde_json::json;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
async fn given_two_teams_bo1_when_series_runs_then_match_and_tournament_complete() {
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

    let created = env.core.start_tournament().await.unwrap();
    assert_eq!(created, 1);
    let m = env.core.get_match("a_vs_b").await.unwrap().unwrap();
    assert_eq!(m.get_round(), 1);
    assert_eq!(m.get_status(), MatchStatus::Ready);

    // one cycle: the abandoned veto resolves left-to-right, the server is
    // bound and the config is pushed
    let outcome = env.cycle().await;
    assert_eq!(outcome.allocated, 1);

    let m = env.core.get_match("a_vs_b").await.unwrap().unwrap();
    assert_eq!(m.get_status(), MatchStatus::Loaded);
    assert_eq!(m.get_server_id(), Some("s1"));
    assert_eq!(m.get_veto().maplist(), vec!["de_ancient"]);
    assert_eq!(
        m.get_veto().get_steps()[0].map_key.as_deref(),
        Some("de_mirage")
    );
    assert_eq!(
        m.get_veto().get_steps()[1].map_key.as_deref(),
        Some("de_inferno")
    );

    let commands = env.rcon.sent_commands();
    assert_eq!(commands.len(), 4);
    assert!(commands[0].1.contains("matchzy_remote_log_url \"http://core.test/api/events\""));
    assert!(commands[3]
        .1
        .contains("matchzy_loadmatch_url \"http://core.test/api/matches/a_vs_b.json\""));

    env.post_event(json!({"event": "series_start", "matchid": "a_vs_b", "num_maps": 1}))
        .await;
    assert_eq!(
        env.core.get_match("a_vs_b").await.unwrap().unwrap().get_status(),
        MatchStatus::Live
    );

    env.post_event(json!({
        "event": "map_result",
        "matchid": "a_vs_b",
        "map_number": 0,
        "map_name": "de_ancient",
        "team1_score": 13,
        "team2_score": 7
    }))
    .await;
    env.post_event(json!({
        "event": "series_end",
        "matchid": "a_vs_b",
        "winner": "team1",
        "team1_series_score": 1,
        "team2_series_score": 0
    }))
    .await;

    let m = env.core.get_match("a_vs_b").await.unwrap().unwrap();
    assert_eq!(m.get_status(), MatchStatus::Completed);
    assert_eq!(m.get_winner_id(), Some("a"));
    assert_eq!(m.get_team1_series_score(), 1);
    assert_eq!(m.get_team2_series_score(), 0);
    // completed matches never hold a server
    assert_eq!(m.get_server_id(), None);

    env.cycle().await;
    let t = env.core.get_tournament().await.unwrap().unwrap();
    assert_eq!(t.get_status(), TournamentStatus::Completed);
}

#[tokio::test(flavor = "multi_thread")]
async fn given_three_teams_then_the_bye_completes_as_walkover_within_one_cycle() {
    let env = TestEnv::new();
    for (name, base) in [("a", 1), ("b", 2), ("c", 3)] {
        env.seed_team(name, base).await;
    }
    env.seed_tournament(
        TournamentType::SingleElim,
        SeriesFormat::Bo1,
        &["de_mirage", "de_inferno", "de_ancient"],
        &["a", "b", "c"],
    )
    .await;

    env.core.start_tournament().await.unwrap();
    let outcome = env.cycle().await;
    assert_eq!(outcome.walkovers, 1);

    let bye = env.core.get_match("a_vs_null").await.unwrap().unwrap();
    assert_eq!(bye.get_status(), MatchStatus::Completed);
    assert_eq!(bye.get_winner_id(), Some("a"));
    assert!(bye.get_demo_file_paths().is_empty());
    assert_eq!(bye.get_server_id(), None);

    // the normal pairing proceeds, and the walkover winner is already in
    // the final
    let real = env.core.get_match("b_vs_c").await.unwrap().unwrap();
    assert_ne!(real.get_status(), MatchStatus::Completed);
    let final_match = env.core.get_match("wb-r2-m1").await.unwrap().unwrap();
    assert_eq!(final_match.get_team1_id(), Some("a"));
    assert_eq!(final_match.get_team2_id(), None);
    assert_eq!(final_match.get_status(), MatchStatus::Pending);
}

async fn finish_series(env: &TestEnv, slug: &str, winner: &str) {
    env.post_event(json!({"event": "series_start", "matchid": slug, "num_maps": 1}))
        .await;
    env.post_event(json!({
        "event": "map_result",
        "matchid": slug,
        "map_number": 0,
        "map_name": "de_ancient",
        "team1_score": if winner == "team1" { 13 } else { 7 },
        "team2_score": if winner == "team1" { 7 } else { 13 }
    }))
    .await;
    env.post_event(json!({"event": "series_end", "matchid": slug, "winner": winner}))
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn given_four_teams_when_round_one_finishes_then_the_final_becomes_ready_and_is_announced()
{
    let env = TestEnv::new();
    for (name, base) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
        env.seed_team(name, base).await;
    }
    env.seed_server("s1", "10.0.0.1").await;
    env.seed_tournament(
        TournamentType::SingleElim,
        SeriesFormat::Bo1,
        &["de_mirage", "de_inferno", "de_ancient"],
        &["a", "b", "c", "d"],
    )
    .await;

    let mut bracket_stream = env
        .registry
        .subscribe(CrTopic::Bracket)
        .await
        .expect("subscribe bracket");

    env.core.start_tournament().await.unwrap();
    env.cycle().await;

    // one server: a_vs_b runs first
    assert_eq!(
        env.core.get_match("a_vs_b").await.unwrap().unwrap().get_status(),
        MatchStatus::Loaded
    );
    finish_series(&env, "a_vs_b", "team1").await;
    env.cycle().await;

    let final_match = env.core.get_match("wb-r2-m1").await.unwrap().unwrap();
    assert_eq!(final_match.get_team1_id(), Some("a"));

    // freed server immediately hosts the second pairing
    assert_eq!(
        env.core.get_match("c_vs_d").await.unwrap().unwrap().get_status(),
        MatchStatus::Loaded
    );
    finish_series(&env, "c_vs_d", "team1").await;
    env.cycle().await;

    let final_match = env.core.get_match("wb-r2-m1").await.unwrap().unwrap();
    assert_eq!(final_match.get_team2_id(), Some("c"));
    assert!(matches!(
        final_match.get_status(),
        MatchStatus::Ready | MatchStatus::Loaded
    ));

    // the hub announced the final becoming ready
    let mut saw_match_ready = false;
    for _ in 0..64 {
        match tokio::time::timeout(Duration::from_millis(200), bracket_stream.next()).await {
            Ok(Some(CrPushNotice::BracketUpdate(payload))) => {
                if payload.action == app_core::BracketAction::MatchReady
                    && payload.match_slug.as_deref() == Some("wb-r2-m1")
                {
                    saw_match_ready = true;
                    break;
                }
            }
            Ok(Some(_)) => {}
            _ => break,
        }
    }
    assert!(saw_match_ready, "expected a match_ready bracket update");

    // next cycle resolves the final's veto and loads it onto the freed
    // server
    env.cycle().await;
    assert_eq!(
        env.core.get_match("wb-r2-m1").await.unwrap().unwrap().get_status(),
        MatchStatus::Loaded
    );

    // play the final to the end: the bracket has n-1 matches, all complete
    finish_series(&env, "wb-r2-m1", "team2").await;
    env.cycle().await;
    let matches = env
        .core
        .list_matches(&app_core::MatchFilter::default())
        .await
        .unwrap();
    assert_eq!(matches.len(), 3);
    assert!(matches
        .iter()
        .all(|m| m.get_status() == MatchStatus::Completed));
    assert_eq!(
        env.core.get_tournament().await.unwrap().unwrap().get_status(),
        TournamentStatus::Completed
    );
    let final_match = env.core.get_match("wb-r2-m1").await.unwrap().unwrap();
    assert_eq!(final_match.get_winner_id(), Some("c"));
}

#[tokio::test(flavor = "multi_thread")]
async fn start_reset_start_regenerates_an_equivalent_bracket() {
    let env = TestEnv::new();
    for (name, base) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
        env.seed_team(name, base).await;
    }
    env.seed_tournament(
        TournamentType::SingleElim,
        SeriesFormat::Bo1,
        &["de_mirage", "de_inferno", "de_ancient"],
        &["a", "b", "c", "d"],
    )
    .await;

    env.core.start_tournament().await.unwrap();
    let first: Vec<_> = env
        .core
        .list_matches(&app_core::MatchFilter::default())
        .await
        .unwrap()
        .iter()
        .map(|m| {
            (
                m.get_slug().to_string(),
                m.get_round(),
                m.get_match_number(),
                m.get_team1_id().map(str::to_string),
                m.get_team2_id().map(str::to_string),
            )
        })
        .collect();

    env.core.reset_tournament().await.unwrap();
    assert!(env
        .core
        .list_matches(&app_core::MatchFilter::default())
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        env.core.get_tournament().await.unwrap().unwrap().get_status(),
        TournamentStatus::Setup
    );

    env.core.start_tournament().await.unwrap();
    let second: Vec<_> = env
        .core
        .list_matches(&app_core::MatchFilter::default())
        .await
        .unwrap()
        .iter()
        .map(|m| {
            (
                m.get_slug().to_string(),
                m.get_round(),
                m.get_match_number(),
                m.get_team1_id().map(str::to_string),
                m.get_team2_id().map(str::to_string),
            )
        })
        .collect();

    assert_eq!(first, second);
}
