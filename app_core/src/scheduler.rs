//! Scheduler / allocator.
//!
//! One cooperative control loop per process. It wakes on a short tick, on
//! signals from the interpreter and the HTTP layer, and on shutdown. Every
//! cycle is idempotent over persisted state, which is what makes restarts
//! safe: walkovers, advancement, allocation and probing are all derived
//! from the store, never from in-memory bookkeeping.
//!
//! Per-match failures are logged and skipped; the loop itself never dies
//! with the tournament.

use crate::{
    BracketAction, BracketUpdatePayload, Core, CoreError, CoreResult, CrPushNotice, DbError,
    DbpEvent, DbpGameServer, DbpMatch, DbpTeam, DbpTournament, GameServer, Match, MatchFilter,
    MatchStatus, MatchUpdatePayload, NewMatchEvent, RconPort, TournamentStatus, TournamentType,
    TournamentUpdatePayload, VetoActor, bracket, bracket::BracketSide, match_doc,
};
use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

/// Wake-up reasons beyond the periodic tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerSignal {
    TournamentStarted,
    MatchCompleted { slug: String },
    VetoAdvanced { slug: String },
    ServerFreed,
    RunNow,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// public base URL the plugin uses to reach the core
    pub base_url: String,
    /// secret the plugin echoes in the webhook header
    pub server_token: String,
    pub tick_interval: Duration,
    pub rcon_timeout: Duration,
    pub rcon_attempts: u32,
    pub rcon_backoff_base: Duration,
    pub veto_step_timeout: Duration,
    pub probe_after: Duration,
    pub live_silence_after: Duration,
}

impl SchedulerConfig {
    pub fn new(base_url: impl Into<String>, server_token: impl Into<String>) -> Self {
        SchedulerConfig {
            base_url: base_url.into(),
            server_token: server_token.into(),
            tick_interval: Duration::from_secs(2),
            rcon_timeout: Duration::from_secs(3),
            rcon_attempts: 3,
            rcon_backoff_base: Duration::from_millis(500),
            veto_step_timeout: Duration::from_secs(120),
            probe_after: Duration::from_secs(300),
            live_silence_after: Duration::from_secs(120),
        }
    }
}

#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<SchedulerSignal>,
}

impl SchedulerHandle {
    pub fn notify(&self, signal: SchedulerSignal) {
        // a dropped scheduler only happens during shutdown
        let _ = self.tx.send(signal);
    }
}

pub struct Scheduler {
    core: Arc<Core>,
    cfg: SchedulerConfig,
    rx: mpsc::UnboundedReceiver<SchedulerSignal>,
    shutdown: watch::Receiver<bool>,
}

/// What one cycle did; surfaced to the start endpoint and to tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub walkovers: usize,
    pub advanced: usize,
    pub allocated: usize,
    pub released: usize,
}

impl Scheduler {
    pub fn new(
        core: Arc<Core>,
        cfg: SchedulerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Scheduler {
                core,
                cfg,
                rx,
                shutdown,
            },
            SchedulerHandle { tx },
        )
    }

    /// Drive cycles until shutdown. A running cycle always finishes; the
    /// loop re-checks the shutdown flag between cycles.
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.cfg.tick_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("scheduler_started");
        loop {
            tokio::select! {
                _ = tick.tick() => {}
                signal = self.rx.recv() => {
                    if let Some(signal) = signal {
                        debug!(?signal, "scheduler_signal");
                    }
                }
                changed = self.shutdown.changed() => {
                    // a dropped sender means the process is going away
                    if changed.is_err() {
                        info!("scheduler_stopped");
                        return;
                    }
                }
            }
            if *self.shutdown.borrow() {
                info!("scheduler_stopped");
                return;
            }
            // coalesce bursts of signals into one cycle
            while self.rx.try_recv().is_ok() {}
            if let Err(e) = run_cycle(&self.core, &self.cfg).await {
                error!(error = %e, "scheduler_cycle_failed");
            }
        }
    }
}

/// One full pass: walkovers, veto timeouts, advancement, allocation,
/// probing. Public so the start endpoint can run a synchronous first pass.
#[instrument(name = "scheduler.cycle", skip(core, cfg))]
pub async fn run_cycle(core: &Core, cfg: &SchedulerConfig) -> CoreResult<CycleOutcome> {
    let mut outcome = CycleOutcome::default();
    let Some(tournament) = core.database.get_tournament().await? else {
        return Ok(outcome);
    };
    if tournament.get_status() != TournamentStatus::InProgress {
        return Ok(outcome);
    }

    outcome.walkovers = walkover_sweep(core).await?;
    veto_timeout_sweep(core, cfg).await?;
    outcome.advanced = advancement_sweep(core, &tournament).await?;
    outcome.allocated = allocation_sweep(core, cfg).await?;
    outcome.released = probe_sweep(core, cfg).await?;
    Ok(outcome)
}

/// Reload-mutate-save with bounded retries on optimistic-lock conflicts.
/// The closure returns false to skip the save (condition no longer holds).
async fn update_match_with_retry<F>(core: &Core, slug: &str, mut f: F) -> CoreResult<Option<Match>>
where
    F: FnMut(&mut Match) -> CoreResult<bool>,
{
    for _ in 0..3 {
        let Some(mut m) = core.database.get_match(slug).await? else {
            return Ok(None);
        };
        if !f(&mut m)? {
            return Ok(None);
        }
        match core.database.save_match(&m).await {
            Ok(saved) => return Ok(Some(saved)),
            Err(DbError::Stale) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(CoreError::Db(DbError::Stale))
}

/// Ready matches with a single occupied slot complete immediately.
async fn walkover_sweep(core: &Core) -> CoreResult<usize> {
    let ready = core
        .database
        .list_matches(&MatchFilter {
            status: Some(MatchStatus::Ready),
            ..Default::default()
        })
        .await?;
    let mut count = 0;
    for m in ready.iter().filter(|m| m.is_bye()) {
        let slug = m.get_slug().to_string();
        let now = Utc::now();
        let res = update_match_with_retry(core, &slug, |m| {
            if m.get_status() != MatchStatus::Ready || !m.is_bye() {
                return Ok(false);
            }
            m.complete_walkover(now)?;
            Ok(true)
        })
        .await;
        match res {
            Ok(Some(saved)) => {
                count += 1;
                info!(slug = %slug, winner = ?saved.get_winner_id(), "walkover_completed");
                core.publish(CrPushNotice::MatchUpdate(MatchUpdatePayload {
                    slug: slug.clone(),
                    status: Some(MatchStatus::Completed),
                    action: Some("walkover".into()),
                    ..Default::default()
                }))
                .await;
                core.publish(CrPushNotice::BracketUpdate(
                    BracketUpdatePayload::new(BracketAction::MatchStatus)
                        .with_match(slug.as_str())
                        .with_status(MatchStatus::Completed),
                ))
                .await;
            }
            Ok(None) => {}
            Err(e) => warn!(slug = %slug, error = %e, "walkover_failed"),
        }
    }
    Ok(count)
}

/// Act on behalf of teams that let a veto step time out.
async fn veto_timeout_sweep(core: &Core, cfg: &SchedulerConfig) -> CoreResult<()> {
    let ready = core
        .database
        .list_matches(&MatchFilter {
            status: Some(MatchStatus::Ready),
            ..Default::default()
        })
        .await?;
    let timeout = ChronoDuration::from_std(cfg.veto_step_timeout)
        .unwrap_or_else(|_| ChronoDuration::seconds(120));
    let now = Utc::now();

    for m in ready
        .iter()
        .filter(|m| !m.is_bye() && !m.is_veto_completed() && m.get_team1_id().is_some())
    {
        let slug = m.get_slug().to_string();
        // every step whose deadline already passed is acted in this cycle,
        // one persisted transition per step
        loop {
            let Some(current) = core.database.get_match(&slug).await? else {
                break;
            };
            if current.get_status() != MatchStatus::Ready || current.is_veto_completed() {
                break;
            }
            let reference = current
                .get_veto()
                .get_last_action_at()
                .or(current.get_ready_at())
                .unwrap_or(current.get_created_at());
            if now - reference < timeout {
                break;
            }
            let res = update_match_with_retry(core, &slug, |m| {
                if m.get_status() != MatchStatus::Ready || m.is_veto_completed() {
                    return Ok(false);
                }
                m.veto_mut().auto_act(now)?;
                m.sync_veto_completed();
                Ok(true)
            })
            .await;
            match res {
                Ok(Some(saved)) => {
                    info!(slug = %slug, complete = saved.is_veto_completed(), "veto_auto_acted");
                    core.publish(CrPushNotice::MatchUpdate(MatchUpdatePayload {
                        slug: slug.clone(),
                        action: Some("veto_update".into()),
                        ..Default::default()
                    }))
                    .await;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(slug = %slug, error = %e, "veto_auto_act_failed");
                    break;
                }
            }
        }
    }
    Ok(())
}

fn loser_of(m: &Match) -> Option<String> {
    let winner = m.get_winner_id()?;
    [m.get_team1_id(), m.get_team2_id()]
        .into_iter()
        .flatten()
        .find(|id| *id != winner)
        .map(str::to_string)
}

/// Fill child slots from completed matches, generate swiss rounds and the
/// grand-final reset, and complete the tournament when nothing is left.
/// Fully derived from persisted state, so re-running it is harmless.
async fn advancement_sweep(core: &Core, tournament: &crate::Tournament) -> CoreResult<usize> {
    let matches = core.database.list_matches(&MatchFilter::default()).await?;
    let mut advanced = 0;

    let is_elim = matches!(
        tournament.get_type(),
        TournamentType::SingleElim | TournamentType::DoubleElim
    );

    if is_elim {
        let wb_rounds = matches
            .iter()
            .filter(|m| bracket_side(m) == BracketSide::Winners)
            .map(|m| m.get_round())
            .max()
            .unwrap_or(1);

        for m in matches
            .iter()
            .filter(|m| m.get_status() == MatchStatus::Completed)
        {
            let Some(winner) = m.get_winner_id().map(str::to_string) else {
                continue;
            };
            if let Some((target, slot)) =
                bracket::winner_target(m, wb_rounds, tournament.get_type())
            {
                advanced +=
                    fill_slot(core, tournament, &matches, &target, slot, &winner).await? as usize;
            }
            if tournament.get_type() == TournamentType::DoubleElim {
                if let (Some(loser), Some((target, slot))) =
                    (loser_of(m), bracket::loser_target(m, wb_rounds))
                {
                    advanced +=
                        fill_slot(core, tournament, &matches, &target, slot, &loser).await? as usize;
                }
            }
        }

        // bracket reset: the losers-bracket champion beat the winners-side
        // champion in the grand final
        if tournament.get_type() == TournamentType::DoubleElim {
            let gf = matches.iter().find(|m| m.get_bracket_tag() == "grand-finals");
            let reset_exists = matches
                .iter()
                .any(|m| m.get_bracket_tag() == "grand-finals-reset");
            if let Some(gf) = gf {
                let lb_champ_won = gf.get_status() == MatchStatus::Completed
                    && gf.get_winner_id().is_some()
                    && gf.get_winner_id() == gf.get_team2_id();
                if lb_champ_won && !reset_exists {
                    let now = Utc::now();
                    let mut reset = bracket::grand_finals_reset(gf, now);
                    reset.make_ready(tournament.get_format(), tournament.get_map_pool(), now)?;
                    core.database.create_matches(std::slice::from_ref(&reset)).await?;
                    advanced += 1;
                    info!("grand_finals_reset_created");
                    core.publish(CrPushNotice::BracketUpdate(
                        BracketUpdatePayload::new(BracketAction::BracketRegenerated)
                            .with_match(reset.get_slug()),
                    ))
                    .await;
                }
            }
        }
    }

    if tournament.get_type() == TournamentType::Swiss {
        if let Some(next) = bracket::next_swiss_round(tournament, &matches) {
            core.database.create_matches(&next).await?;
            advanced += next.len();
            info!(round = next.first().map(|m| m.get_round()), "swiss_round_generated");
            core.publish(CrPushNotice::BracketUpdate(BracketUpdatePayload::new(
                BracketAction::BracketRegenerated,
            )))
            .await;
        }
    }

    // completion: every match done and nothing more will be generated
    let matches = core.database.list_matches(&MatchFilter::default()).await?;
    let all_done = !matches.is_empty()
        && matches
            .iter()
            .all(|m| m.get_status() == MatchStatus::Completed);
    let more_swiss = tournament.get_type() == TournamentType::Swiss
        && bracket::next_swiss_round(tournament, &matches).is_some();
    let reset_pending = tournament.get_type() == TournamentType::DoubleElim
        && matches.iter().any(|m| {
            m.get_bracket_tag() == "grand-finals"
                && m.get_status() == MatchStatus::Completed
                && m.get_winner_id() == m.get_team2_id()
        })
        && !matches
            .iter()
            .any(|m| m.get_bracket_tag() == "grand-finals-reset");
    if all_done && !more_swiss && !reset_pending {
        let mut t = tournament.clone();
        t.set_status(TournamentStatus::Completed);
        match core.database.save_tournament(&t).await {
            Ok(_) => {
                info!("tournament_completed");
                core.publish(CrPushNotice::BracketUpdate(BracketUpdatePayload::new(
                    BracketAction::TournamentCompleted,
                )))
                .await;
                core.publish(CrPushNotice::TournamentUpdate(TournamentUpdatePayload {
                    action: "tournament_completed".into(),
                }))
                .await;
            }
            Err(DbError::Stale) => debug!("tournament_completion_raced"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(advanced)
}

fn bracket_side(m: &Match) -> BracketSide {
    bracket::bracket_side(m.get_bracket_tag())
}

/// Put a team into a child slot; flips the child to ready when both slots
/// are filled. Returns true when something changed.
async fn fill_slot(
    core: &Core,
    tournament: &crate::Tournament,
    matches: &[Match],
    target_slug: &str,
    slot: VetoActor,
    team_id: &str,
) -> CoreResult<bool> {
    let Some(target) = matches.iter().find(|m| m.get_slug() == target_slug) else {
        warn!(target = %target_slug, "advancement_target_missing");
        return Ok(false);
    };
    if target.team_id_of(slot).is_some() {
        return Ok(false); // already advanced
    }
    let now = Utc::now();
    let format = tournament.get_format();
    let pool = tournament.get_map_pool().to_vec();
    let team = team_id.to_string();
    let res = update_match_with_retry(core, target_slug, |m| {
        if m.team_id_of(slot).is_some() {
            return Ok(false);
        }
        m.assign_slot(slot, team.clone())?;
        if m.get_status() == MatchStatus::Pending
            && m.get_team1_id().is_some()
            && m.get_team2_id().is_some()
        {
            m.make_ready(format, &pool, now)?;
        }
        Ok(true)
    })
    .await?;

    if let Some(saved) = res {
        info!(target = %target_slug, team = %team_id, slot = %slot, "slot_filled");
        if saved.get_status() == MatchStatus::Ready {
            core.publish(CrPushNotice::BracketUpdate(
                BracketUpdatePayload::new(BracketAction::MatchReady)
                    .with_match(target_slug)
                    .with_status(MatchStatus::Ready),
            ))
            .await;
        }
        return Ok(true);
    }
    Ok(false)
}

/// Bind ready matches to available servers and push their configuration.
async fn allocation_sweep(core: &Core, cfg: &SchedulerConfig) -> CoreResult<usize> {
    let matches = core.database.list_matches(&MatchFilter::default()).await?;
    let servers = core.database.list_servers().await?;

    let bound: HashSet<&str> = matches
        .iter()
        .filter(|m| m.get_status() != MatchStatus::Completed)
        .filter_map(|m| m.get_server_id())
        .collect();
    let mut available: Vec<&GameServer> = servers
        .iter()
        .filter(|s| s.is_enabled() && !bound.contains(s.get_id()))
        .collect();
    available.sort_by(|a, b| a.get_id().cmp(b.get_id()));

    let mut ready: Vec<&Match> = matches
        .iter()
        .filter(|m| {
            m.get_status() == MatchStatus::Ready
                && m.get_team1_id().is_some()
                && m.get_team2_id().is_some()
                && m.is_veto_completed()
        })
        .collect();
    ready.sort_by_key(|m| (m.get_round(), m.get_match_number(), m.get_created_at()));

    let mut allocated = 0;
    let mut queue = available.into_iter();
    for m in ready {
        let Some(server) = queue.next() else {
            break; // zero servers left: nothing to busy-loop over
        };
        match load_match_onto_server(core, cfg, m.get_slug(), server, false).await {
            Ok(_) => allocated += 1,
            Err(e) => {
                warn!(slug = %m.get_slug(), server = %server.get_id(), error = %e, "allocation_failed");
                // server stays out of the queue this cycle; next tick retries
            }
        }
    }
    Ok(allocated)
}

/// Bind one match to one server and push the plugin configuration. On push
/// failure the bind is reverted in place and a warning event is appended.
pub async fn load_match_onto_server(
    core: &Core,
    cfg: &SchedulerConfig,
    slug: &str,
    server: &GameServer,
    skip_webhook: bool,
) -> CoreResult<Match> {
    // freeze the config document before binding so the plugin-facing JSON
    // is served complete the moment the server loads it
    let m = core
        .database
        .get_match(slug)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("match {slug}")))?;
    let team1 = lookup_team(core, m.get_team1_id()).await?;
    let team2 = lookup_team(core, m.get_team2_id()).await?;
    update_match_with_retry(core, slug, |m| {
        if m.get_status() != MatchStatus::Ready || !m.is_veto_completed() {
            return Err(CoreError::Conflict(format!(
                "match {slug} is not ready for loading"
            )));
        }
        let config = match_doc::build_config(m, &team1, &team2);
        m.set_config(config);
        Ok(true)
    })
    .await?;

    let bound = core.database.bind_server(slug, server.get_id()).await?;

    match push_config(core, cfg, server, slug, skip_webhook).await {
        Ok(()) => {
            info!(slug = %slug, server = %server.get_id(), "match_loaded");
            core.publish(CrPushNotice::BracketUpdate(
                BracketUpdatePayload::new(BracketAction::ServerAssigned)
                    .with_match(slug)
                    .with_server(server.get_id()),
            ))
            .await;
            core.publish(CrPushNotice::BracketUpdate(
                BracketUpdatePayload::new(BracketAction::MatchLoaded)
                    .with_match(slug)
                    .with_status(MatchStatus::Loaded)
                    .with_server(server.get_id()),
            ))
            .await;
            core.publish(CrPushNotice::MatchUpdate(MatchUpdatePayload {
                slug: slug.to_string(),
                status: Some(MatchStatus::Loaded),
                server_id: Some(server.get_id().to_string()),
                ..Default::default()
            }))
            .await;
            Ok(bound)
        }
        Err(push_err) => {
            warn!(slug = %slug, server = %server.get_id(), error = %push_err, "config_push_failed");
            core.database
                .release_server(slug, MatchStatus::Ready)
                .await?;
            let _ = core
                .database
                .append_event(&NewMatchEvent {
                    match_slug: slug.to_string(),
                    event_kind: "allocation_warning".into(),
                    payload: json!({
                        "serverId": server.get_id(),
                        "error": push_err.to_string(),
                    }),
                    received_at: Utc::now(),
                })
                .await;
            core.publish(CrPushNotice::MatchUpdate(MatchUpdatePayload {
                slug: slug.to_string(),
                status: Some(MatchStatus::Ready),
                action: Some("load_reverted".into()),
                ..Default::default()
            }))
            .await;
            Err(push_err)
        }
    }
}

async fn lookup_team(core: &Core, id: Option<&str>) -> CoreResult<crate::Team> {
    let id = id.ok_or_else(|| CoreError::Conflict("match slot unresolved".into()))?;
    core.database
        .get_team(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("team {id}")))
}

/// The four wiring commands, each with its own timeout and bounded
/// exponential backoff.
async fn push_config(
    core: &Core,
    cfg: &SchedulerConfig,
    server: &GameServer,
    slug: &str,
    skip_webhook: bool,
) -> CoreResult<()> {
    let mut commands = Vec::new();
    if !skip_webhook {
        commands.push(format!(
            "matchzy_remote_log_url \"{}/api/events\"",
            cfg.base_url
        ));
        commands.push("matchzy_remote_log_header_key \"X-MatchZy-Token\"".to_string());
        commands.push(format!(
            "matchzy_remote_log_header_value \"{}\"",
            cfg.server_token
        ));
    }
    commands.push(format!(
        "matchzy_loadmatch_url \"{}/api/matches/{}.json\"",
        cfg.base_url, slug
    ));

    let target = server.rcon_target();
    for cmd in &commands {
        send_with_retry(core, cfg, &target, cmd).await?;
    }
    Ok(())
}

/// Shared by the allocator, the interpreter's admin path and the broadcast
/// endpoint: bounded attempts, exponential backoff with jitter, strict
/// per-attempt timeout.
pub async fn send_with_retry(
    core: &Core,
    cfg: &SchedulerConfig,
    target: &crate::RconTarget,
    cmd: &str,
) -> CoreResult<String> {
    let mut last_err = CoreError::Rcon(crate::RconError::Timeout);
    for attempt in 0..cfg.rcon_attempts {
        if attempt > 0 {
            let backoff = cfg.rcon_backoff_base * 2u32.pow(attempt - 1);
            let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
            tokio::time::sleep(backoff + jitter).await;
        }
        match tokio::time::timeout(cfg.rcon_timeout, core.rcon.send_command(target, cmd)).await {
            Ok(Ok(raw)) => return Ok(raw),
            Ok(Err(e)) => {
                debug!(attempt, error = %e, "rcon_attempt_failed");
                last_err = CoreError::Rcon(e);
            }
            Err(_) => {
                debug!(attempt, "rcon_attempt_timed_out");
                last_err = CoreError::Rcon(crate::RconError::Timeout);
            }
        }
    }
    Err(last_err)
}

/// Probe silent servers. Loaded matches that stay silent past the probe
/// window are demoted and their server released; live matches only get a
/// connection notice (the store stays untouched).
async fn probe_sweep(core: &Core, cfg: &SchedulerConfig) -> CoreResult<usize> {
    let matches = core.database.list_matches(&MatchFilter::default()).await?;
    let now = Utc::now();
    let probe_after = ChronoDuration::from_std(cfg.probe_after)
        .unwrap_or_else(|_| ChronoDuration::seconds(300));
    let silence_after = ChronoDuration::from_std(cfg.live_silence_after)
        .unwrap_or_else(|_| ChronoDuration::seconds(120));
    let mut released = 0;

    for m in &matches {
        let slug = m.get_slug().to_string();
        let last_seen = core
            .database
            .last_event_time(&slug)
            .await?
            .or(m.get_loaded_at())
            .unwrap_or(m.get_created_at());

        match m.get_status() {
            MatchStatus::Loaded if now - last_seen > probe_after => {
                let reachable = probe_server(core, cfg, m).await;
                if !reachable {
                    warn!(slug = %slug, "loaded_match_unreachable");
                    core.database
                        .release_server(&slug, MatchStatus::Ready)
                        .await?;
                    released += 1;
                    let _ = core
                        .database
                        .append_event(&NewMatchEvent {
                            match_slug: slug.clone(),
                            event_kind: "allocation_warning".into(),
                            payload: json!({"error": "server unreachable during load, match demoted"}),
                            received_at: now,
                        })
                        .await;
                    core.publish(CrPushNotice::MatchUpdate(MatchUpdatePayload {
                        slug: slug.clone(),
                        status: Some(MatchStatus::Ready),
                        action: Some("load_reverted".into()),
                        ..Default::default()
                    }))
                    .await;
                }
            }
            MatchStatus::Live if now - last_seen > silence_after => {
                core.publish(CrPushNotice::MatchUpdate(MatchUpdatePayload {
                    slug: slug.clone(),
                    connection_status: Some("probing".into()),
                    ..Default::default()
                }))
                .await;
            }
            _ => {}
        }
    }
    Ok(released)
}

async fn probe_server(core: &Core, cfg: &SchedulerConfig, m: &Match) -> bool {
    let Some(server_id) = m.get_server_id() else {
        return false;
    };
    let Ok(Some(server)) = core.database.get_server(server_id).await else {
        return false;
    };
    tokio::time::timeout(
        cfg.rcon_timeout,
        core.rcon.send_command(&server.rcon_target(), "status"),
    )
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false)
}
