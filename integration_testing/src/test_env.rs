//! One-call harness: a `Core` over fakes plus the interpreter and a
//! scheduler configuration tuned for fast tests.

use crate::port_fakes::{FakeDatabasePort, FakeRcon};
use app_core::{
    Core, CoreBuilder, EventInterpreter, GameServer, Player, Scheduler, SchedulerConfig,
    SchedulerHandle, SeriesFormat, SteamError, SteamResolverPort, Team, Tournament,
    TournamentType,
};
use cr_single_instance::CrSingleInstance;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

pub struct TestEnv {
    pub core: Arc<Core>,
    pub db: Arc<FakeDatabasePort>,
    pub rcon: Arc<FakeRcon>,
    pub registry: Arc<CrSingleInstance>,
    pub interpreter: Arc<EventInterpreter>,
    pub scheduler: SchedulerHandle,
    pub cfg: SchedulerConfig,
    pub shutdown: watch::Sender<bool>,
}

struct NoSteam;

#[async_trait::async_trait]
impl SteamResolverPort for NoSteam {
    async fn resolve(
        &self,
        _input: &str,
    ) -> Result<app_core::ResolvedPlayer, SteamError> {
        Err(SteamError::NotConfigured)
    }
}

impl TestEnv {
    /// Fakes all around; veto timeout zero so the scheduler resolves
    /// abandoned vetos within one cycle, tiny RCON backoff.
    pub fn new() -> TestEnv {
        crate::init_tracing();
        let db = Arc::new(FakeDatabasePort::new());
        let rcon = Arc::new(FakeRcon::new());
        let registry = Arc::new(CrSingleInstance::new());
        let core = Arc::new(
            CoreBuilder::new()
                .set_db(db.clone())
                .set_cr(registry.clone())
                .set_rcon(rcon.clone())
                .set_steam(Arc::new(NoSteam))
                .build(),
        );

        let mut cfg = SchedulerConfig::new("http://core.test", "test-server-token");
        cfg.veto_step_timeout = Duration::ZERO;
        cfg.rcon_timeout = Duration::from_millis(200);
        cfg.rcon_backoff_base = Duration::from_millis(5);

        let (shutdown, shutdown_rx) = watch::channel(false);
        // the handle is enough: tests drive cycles synchronously
        let (_scheduler, handle) = Scheduler::new(core.clone(), cfg.clone(), shutdown_rx.clone());
        let interpreter =
            EventInterpreter::new(core.clone(), handle.clone(), cfg.clone(), shutdown_rx);

        TestEnv {
            core,
            db,
            rcon,
            registry,
            interpreter,
            scheduler: handle,
            cfg,
            shutdown,
        }
    }

    pub async fn cycle(&self) -> app_core::CycleOutcome {
        app_core::run_cycle(&self.core, &self.cfg)
            .await
            .expect("scheduler cycle failed")
    }

    pub async fn seed_team(&self, name: &str, steam_base: u64) -> Team {
        let mut team = Team::new(name);
        team.set_tag(&name[..name.len().min(4)]);
        team.set_players(
            (0..5)
                .map(|i| {
                    Player::new(
                        format!("7656119800{}{i}", steam_base),
                        format!("{name} player {i}"),
                    )
                })
                .collect(),
        );
        self.core.upsert_team(&team).await.expect("seed team")
    }

    pub async fn seed_server(&self, name: &str, host: &str) -> GameServer {
        let mut server = GameServer::new(name);
        server
            .set_host(host)
            .set_port(27015)
            .set_rcon_password("secret");
        self.core.upsert_server(&server).await.expect("seed server")
    }

    pub async fn seed_tournament(
        &self,
        t_type: TournamentType,
        format: SeriesFormat,
        map_pool: &[&str],
        team_ids: &[&str],
    ) -> Tournament {
        let mut tournament = Tournament::new("Test Cup");
        tournament
            .set_type(t_type)
            .set_format(format)
            .set_map_pool(map_pool.iter().map(|m| m.to_string()).collect())
            .set_team_ids(team_ids.iter().map(|t| t.to_string()).collect());
        self.core
            .update_tournament(&tournament)
            .await
            .expect("seed tournament")
    }

    /// Post a raw webhook payload through the full ingest pipeline and
    /// wait until the interpreter has caught up with the log.
    pub async fn post_event(&self, payload: serde_json::Value) -> i64 {
        let slug = payload
            .get("matchid")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let id = self
            .interpreter
            .ingest(payload)
            .await
            .expect("ingest failed");
        match slug {
            Some(slug) => self.wait_for_cursor(&slug, id).await,
            None => tokio::time::sleep(Duration::from_millis(50)).await,
        }
        id
    }

    /// Interpretation is asynchronous behind per-slug queues; poll the
    /// persisted cursor instead of guessing at sleeps. Unknown slugs never
    /// advance a cursor, so those just get a grace period.
    pub async fn wait_for_cursor(&self, slug: &str, event_id: i64) {
        for _ in 0..200 {
            match self.core.get_match(slug).await {
                Ok(Some(m)) if m.get_last_applied_event_id() >= event_id => return,
                Ok(Some(_)) => {}
                _ => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("interpreter did not reach event {event_id} for {slug}");
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        TestEnv::new()
    }
}
