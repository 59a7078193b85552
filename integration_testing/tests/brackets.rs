//! Full double-elimination and swiss runs driven through webhooks and
//! scheduler cycles.

use app_core::{MatchFilter, MatchStatus, SeriesFormat, TournamentStatus, TournamentType};
use integration_testing::test_env::TestEnv;
use serde_json::json;

async fn finish_series(env: &TestEnv, slug: &str, winner: &str) {
    let m = env.core.get_match(slug).await.unwrap().unwrap();
    assert_eq!(
        m.get_status(),
        MatchStatus::Loaded,
        "{slug} must be loaded before playing"
    );
    env.post_event(json!({"event": "series_start", "matchid": slug, "num_maps": 1}))
        .await;
    env.post_event(json!({
        "event": "map_result",
        "matchid": slug,
        "map_number": 0,
        "map_name": "de_ancient",
        "team1_score": if winner == "team1" { 13 } else { 9 },
        "team2_score": if winner == "team1" { 9 } else { 13 }
    }))
    .await;
    env.post_event(json!({"event": "series_end", "matchid": slug, "winner": winner}))
        .await;
    // one cycle advances the bracket, the next resolves fresh vetos and
    // re-allocates the freed server
    env.cycle().await;
    env.cycle().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn double_elimination_with_bracket_reset_plays_out_to_seven_matches() {
    let env = TestEnv::new();
    for (name, base) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
        env.seed_team(name, base).await;
    }
    env.seed_server("s1", "10.0.0.1").await;
    env.seed_tournament(
        TournamentType::DoubleElim,
        SeriesFormat::Bo1,
        &["de_mirage", "de_inferno", "de_ancient"],
        &["a", "b", "c", "d"],
    )
    .await;

    let created = env.core.start_tournament().await.unwrap();
    assert_eq!(created, 6, "2·(n−1) matches before any reset");
    env.cycle().await;

    finish_series(&env, "a_vs_b", "team1").await; // a advances, b drops
    finish_series(&env, "c_vs_d", "team1").await; // c advances, d drops

    // losers round first (allocation orders by round)
    let lb1 = env.core.get_match("lb-r1-m1").await.unwrap().unwrap();
    assert_eq!(lb1.get_team1_id(), Some("b"));
    assert_eq!(lb1.get_team2_id(), Some("d"));
    finish_series(&env, "lb-r1-m1", "team2").await; // d survives

    finish_series(&env, "wb-r2-m1", "team1").await; // a wins winners final, c drops

    let lb_final = env.core.get_match("lb-r2-m1").await.unwrap().unwrap();
    assert_eq!(lb_final.get_bracket_tag(), "lb-final");
    assert_eq!(lb_final.get_team1_id(), Some("d"));
    assert_eq!(lb_final.get_team2_id(), Some("c"));
    finish_series(&env, "lb-r2-m1", "team2").await; // c reaches the grand final

    let gf = env.core.get_match("grand-finals").await.unwrap().unwrap();
    assert_eq!(gf.get_team1_id(), Some("a"));
    assert_eq!(gf.get_team2_id(), Some("c"));
    // the losers-bracket champion wins: a second grand final appears with
    // sides reversed
    finish_series(&env, "grand-finals", "team2").await;

    let reset = env
        .core
        .get_match("grand-finals-reset")
        .await
        .unwrap()
        .expect("bracket reset generated");
    assert_eq!(reset.get_team1_id(), Some("c"));
    assert_eq!(reset.get_team2_id(), Some("a"));

    finish_series(&env, "grand-finals-reset", "team1").await;

    let matches = env.core.list_matches(&MatchFilter::default()).await.unwrap();
    assert_eq!(matches.len(), 7, "2·(n−1) + 1 with the bracket reset");
    assert!(matches
        .iter()
        .all(|m| m.get_status() == MatchStatus::Completed));
    assert_eq!(
        env.core.get_tournament().await.unwrap().unwrap().get_status(),
        TournamentStatus::Completed
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn swiss_generates_rounds_lazily_and_never_repeats_a_pairing() {
    let env = TestEnv::new();
    for (name, base) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
        env.seed_team(name, base).await;
    }
    env.seed_server("s1", "10.0.0.1").await;
    env.seed_tournament(
        TournamentType::Swiss,
        SeriesFormat::Bo1,
        &["de_mirage", "de_inferno", "de_ancient"],
        &["a", "b", "c", "d"],
    )
    .await;

    let created = env.core.start_tournament().await.unwrap();
    assert_eq!(created, 2, "swiss starts with round one only");
    env.cycle().await;

    finish_series(&env, "a_vs_b", "team1").await;
    finish_series(&env, "c_vs_d", "team1").await;

    // round two exists now: winners meet winners, losers meet losers
    let matches = env.core.list_matches(&MatchFilter::default()).await.unwrap();
    assert_eq!(matches.len(), 4);
    let round2: Vec<&str> = matches
        .iter()
        .filter(|m| m.get_round() == 2)
        .map(|m| m.get_slug())
        .collect();
    assert!(round2.contains(&"a_vs_c"));
    assert!(round2.contains(&"b_vs_d"));

    finish_series(&env, "a_vs_c", "team1").await;
    finish_series(&env, "b_vs_d", "team1").await;

    // ceil(log2(4)) = 2 rounds: done
    let matches = env.core.list_matches(&MatchFilter::default()).await.unwrap();
    assert_eq!(matches.len(), 4);
    assert!(matches
        .iter()
        .all(|m| m.get_status() == MatchStatus::Completed));
    assert_eq!(
        env.core.get_tournament().await.unwrap().unwrap().get_status(),
        TournamentStatus::Completed
    );

    // no pairing occurred twice
    let mut pairs: Vec<(String, String)> = matches
        .iter()
        .map(|m| {
            let mut pair = [
                m.get_team1_id().unwrap().to_string(),
                m.get_team2_id().unwrap().to_string(),
            ];
            pair.sort();
            (pair[0].clone(), pair[1].clone())
        })
        .collect();
    pairs.sort();
    pairs.dedup();
    assert_eq!(pairs.len(), 4);
}
