//! Adapter tests against a real SQLite file in a temp directory.

use app_core::{
    DbError, DbpEvent, DbpGameServer, DbpMatch, DbpTeam, DbpTournament, GameServer, Match,
    MatchFilter, MatchStatus, NewMatchEvent, Player, SeriesFormat, Team,
    utils::revision::ObjectRevision,
};
use chrono::Utc;
use db_sqlite::SqliteDb;
use std::sync::Arc;
use tokio::sync::Barrier;

struct TestDb {
    db: Arc<SqliteDb>,
    path: std::path::PathBuf,
}

impl TestDb {
    async fn new() -> anyhow::Result<Self> {
        let path = std::env::temp_dir().join(format!("mzat-test-{}.db", uuid::Uuid::new_v4()));
        let db = Arc::new(SqliteDb::new(&path)?);
        db.run_migration().await?;
        Ok(TestDb { db, path })
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn make_team(name: &str) -> Team {
    let mut t = Team::new(name);
    t.set_tag(&name[..name.len().min(3)]).set_players(vec![
        Player::new("76561198000000001", "one"),
        Player::new("76561198000000002", "two"),
    ]);
    t
}

fn ready_match(team1: &str, team2: &str) -> Match {
    let now = Utc::now();
    let mut m = Match::new(
        1,
        1,
        "wb-r1-m1",
        Some(team1.to_string()),
        Some(team2.to_string()),
        now,
    );
    // single-map pool: the veto completes at ready time
    m.make_ready(SeriesFormat::Bo1, &["de_ancient".to_string()], now)
        .unwrap();
    m
}

fn make_server(id_name: &str, host: &str) -> GameServer {
    let mut s = GameServer::new(id_name);
    s.set_host(host).set_port(27015).set_rcon_password("secret");
    s
}

#[tokio::test(flavor = "multi_thread")]
async fn team_round_trip_preserves_roster_and_version() -> anyhow::Result<()> {
    let tdb = TestDb::new().await?;
    let saved = tdb.db.save_team(&make_team("Alpha Squad")).await?;
    assert_eq!(saved.revision().version(), Some(0));

    let fetched = tdb.db.get_team("alpha_squad").await?.expect("team exists");
    assert_eq!(fetched.get_name(), "Alpha Squad");
    assert_eq!(fetched.get_players().len(), 2);
    assert_eq!(fetched.get_players()[0].steam_id, "76561198000000001");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn given_two_parallel_updates_from_v0_then_only_one_succeeds() -> anyhow::Result<()> {
    let tdb = TestDb::new().await?;
    let v0 = tdb.db.save_team(&make_team("Concurrency")).await?;

    let mut candidate_a = v0.clone();
    candidate_a.set_tag("AAA");
    let mut candidate_b = v0.clone();
    candidate_b.set_tag("BBB");

    let barrier = Arc::new(Barrier::new(2));
    let (b1, b2) = (barrier.clone(), barrier.clone());
    let (db1, db2) = (tdb.db.clone(), tdb.db.clone());

    let h1 = tokio::spawn(async move {
        b1.wait().await;
        db1.save_team(&candidate_a).await
    });
    let h2 = tokio::spawn(async move {
        b2.wait().await;
        db2.save_team(&candidate_b).await
    });

    let r1 = h1.await.expect("task1 panicked");
    let r2 = h2.await.expect("task2 panicked");

    let ok_count = (r1.is_ok() as u8) + (r2.is_ok() as u8);
    assert_eq!(ok_count, 1, "exactly one concurrent update must succeed");

    let loser_err = r1.err().or(r2.err()).expect("one loser error expected");
    assert!(matches!(loser_err, DbError::Stale));

    let fetched = tdb.db.get_team(v0.get_id()).await?.expect("row exists");
    assert_eq!(fetched.revision().version(), Some(1));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn enabled_servers_must_have_unique_endpoints() -> anyhow::Result<()> {
    let tdb = TestDb::new().await?;
    tdb.db.save_server(&make_server("lan 1", "10.0.0.1")).await?;

    let clash = make_server("lan 2", "10.0.0.1");
    let err = tdb.db.save_server(&clash).await.unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation(_)));

    // a disabled server may share the endpoint
    let mut disabled = make_server("lan 2", "10.0.0.1");
    disabled.set_enabled(false);
    tdb.db.save_server(&disabled).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_team_referenced_by_an_open_match_fails() -> anyhow::Result<()> {
    let tdb = TestDb::new().await?;
    tdb.db.save_team(&make_team("Alpha")).await?;
    tdb.db.save_team(&make_team("Bravo")).await?;
    tdb.db
        .create_matches(&[ready_match("alpha", "bravo")])
        .await?;

    let err = tdb.db.delete_team("alpha").await.unwrap_err();
    assert!(matches!(err, DbError::InvariantViolation(_)));
    assert!(tdb.db.get_team("alpha").await?.is_some());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_insert_is_all_or_nothing() -> anyhow::Result<()> {
    let tdb = TestDb::new().await?;
    let first = ready_match("a", "b");
    let duplicate = ready_match("a", "b");
    let err = tdb
        .db
        .create_matches(&[first, duplicate])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation(_)));

    let all = tdb.db.list_matches(&MatchFilter::default()).await?;
    assert!(all.is_empty(), "failed batch must leave nothing behind");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn a_server_binds_to_at_most_one_open_match() -> anyhow::Result<()> {
    let tdb = TestDb::new().await?;
    tdb.db.save_server(&make_server("s1", "10.0.0.1")).await?;
    tdb.db
        .create_matches(&[ready_match("a", "b"), ready_match("c", "d")])
        .await?;

    let bound = tdb.db.bind_server("a_vs_b", "s1").await?;
    assert_eq!(bound.get_status(), MatchStatus::Loaded);
    assert_eq!(bound.get_server_id(), Some("s1"));

    let err = tdb.db.bind_server("c_vs_d", "s1").await.unwrap_err();
    assert!(matches!(err, DbError::InvariantViolation(_)));

    // release puts the match back to ready and frees the endpoint
    let released = tdb.db.release_server("a_vs_b", MatchStatus::Ready).await?;
    assert_eq!(released.get_status(), MatchStatus::Ready);
    assert_eq!(released.get_server_id(), None);
    tdb.db.bind_server("c_vs_d", "s1").await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn event_log_ids_are_monotonic_and_filterable() -> anyhow::Result<()> {
    let tdb = TestDb::new().await?;
    let mut last = 0;
    for n in 0..5 {
        let id = tdb
            .db
            .append_event(&NewMatchEvent {
                match_slug: "a_vs_b".into(),
                event_kind: "round_end".into(),
                payload: serde_json::json!({"round_number": n}),
                received_at: Utc::now(),
            })
            .await?;
        assert!(id > last, "ids must increase");
        last = id;
    }

    let tail = tdb.db.list_events("a_vs_b", Some(last - 2), None).await?;
    assert_eq!(tail.len(), 2);
    assert!(tail.windows(2).all(|w| w[0].id < w[1].id));

    assert!(tdb.db.last_event_time("a_vs_b").await?.is_some());
    assert!(tdb.db.last_event_time("ghost").await?.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn events_without_a_match_are_reported_as_orphans() -> anyhow::Result<()> {
    let tdb = TestDb::new().await?;
    tdb.db
        .create_matches(&[ready_match("a", "b")])
        .await?;
    for slug in ["a_vs_b", "ghost"] {
        tdb.db
            .append_event(&NewMatchEvent {
                match_slug: slug.into(),
                event_kind: "round_end".into(),
                payload: serde_json::json!({}),
                received_at: Utc::now(),
            })
            .await?;
    }

    let orphans = tdb.db.orphan_event_slugs().await?;
    assert_eq!(orphans, vec!["ghost".to_string()]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn reset_clears_matches_and_events_and_returns_to_setup() -> anyhow::Result<()> {
    let tdb = TestDb::new().await?;
    let mut tournament = app_core::Tournament::new("Cup");
    tournament
        .set_map_pool(vec!["de_ancient".into()])
        .set_team_ids(vec!["a".into(), "b".into()])
        .set_status(app_core::TournamentStatus::InProgress);
    tdb.db.save_tournament(&tournament).await?;
    tdb.db.create_matches(&[ready_match("a", "b")]).await?;

    tdb.db.reset_tournament_data().await?;

    assert!(tdb.db.list_matches(&MatchFilter::default()).await?.is_empty());
    let t = tdb.db.get_tournament().await?.expect("tournament kept");
    assert_eq!(t.get_status(), app_core::TournamentStatus::Setup);
    Ok(())
}
