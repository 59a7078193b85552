//! Event interpreter: per-slug serial application of the event log.
//!
//! Each active match slug gets one lazily-spawned worker task holding a
//! bounded job queue. Events for one slug are applied in append order;
//! slugs run in parallel. Workers exit after five idle minutes and drain
//! their queues on shutdown.
//!
//! Admin RCON commands ride the same queue, so a webhook and an admin
//! action racing on the same match are serialized (first enqueued wins).

use crate::{
    ConnectedPlayer, Core, CoreError, CoreResult, CrPushNotice, DbError, DbpEvent, DbpGameServer,
    DbpMatch, GameEventKind, LiveState, LiveStats, Match, MatchStatus, MatchUpdatePayload,
    NewMatchEvent, NormalizedEvent, SchedulerConfig, SchedulerHandle, SchedulerSignal,
    StateChange, normalize_event, state_machine,
};
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument, warn};

const WORKER_QUEUE_CAPACITY: usize = 256;
const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of an admin RCON dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct RconReply {
    pub ok: bool,
    pub raw: String,
}

enum InterpreterJob {
    /// nudge: new events may be waiting behind the cursor
    Ingest,
    Admin {
        command: String,
        reply: oneshot::Sender<CoreResult<RconReply>>,
    },
}

pub struct EventInterpreter {
    core: Arc<Core>,
    scheduler: SchedulerHandle,
    cfg: SchedulerConfig,
    workers: DashMap<String, mpsc::Sender<InterpreterJob>>,
    live: DashMap<String, LiveState>,
    shutdown: watch::Receiver<bool>,
    dropped_enqueues: AtomicU64,
}

impl EventInterpreter {
    pub fn new(
        core: Arc<Core>,
        scheduler: SchedulerHandle,
        cfg: SchedulerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        Arc::new(EventInterpreter {
            core,
            scheduler,
            cfg,
            workers: DashMap::new(),
            live: DashMap::new(),
            shutdown,
            dropped_enqueues: AtomicU64::new(0),
        })
    }

    /// Full ingest pipeline: normalize, durably append, schedule
    /// interpretation. Returns the appended event id. Interpretation
    /// failures never fail the caller; the append is the contract.
    #[instrument(name = "interpreter.ingest", skip(self, raw))]
    pub async fn ingest(self: &Arc<Self>, raw: Value) -> CoreResult<i64> {
        let received_at = Utc::now();
        let normalized = normalize_event(&raw, received_at);
        let kind = if normalized.kind_raw.is_empty() {
            "unknown".to_string()
        } else {
            normalized.kind_raw.clone()
        };
        let id = self
            .core
            .database
            .append_event(&NewMatchEvent {
                match_slug: normalized.match_slug.clone(),
                event_kind: kind,
                payload: raw,
                received_at,
            })
            .await?;
        self.schedule(&normalized.match_slug);
        Ok(id)
    }

    /// Non-blocking enqueue; a full queue only drops the nudge, the worker
    /// catches up from its cursor on the next job.
    pub fn schedule(self: &Arc<Self>, slug: &str) {
        loop {
            let tx = self.worker_sender(slug);
            match tx.try_send(InterpreterJob::Ingest) {
                Ok(()) => return,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped_enqueues.fetch_add(1, Ordering::Relaxed);
                    debug!(slug = %slug, "interpreter_queue_full");
                    return;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // worker idled out between lookup and send
                    self.workers.remove(slug);
                }
            }
        }
    }

    /// Dispatch an admin RCON command through the match's serial queue.
    pub async fn admin(self: &Arc<Self>, slug: &str, command: String) -> CoreResult<RconReply> {
        loop {
            let tx = self.worker_sender(slug);
            let (reply_tx, reply_rx) = oneshot::channel();
            let job = InterpreterJob::Admin {
                command: command.clone(),
                reply: reply_tx,
            };
            if tx.send(job).await.is_err() {
                self.workers.remove(slug);
                continue;
            }
            return match reply_rx.await {
                Ok(res) => res,
                Err(_) => Err(CoreError::Conflict(format!(
                    "interpreter for {slug} went away"
                ))),
            };
        }
    }

    /// Count of enqueue nudges dropped on full queues.
    pub fn dropped_enqueue_count(&self) -> u64 {
        self.dropped_enqueues.load(Ordering::Relaxed)
    }

    /// Snapshot of the live stats for a match, rebuilding the cache from
    /// the event log when no worker has materialized it yet.
    pub async fn live_stats(self: &Arc<Self>, slug: &str) -> CoreResult<Option<LiveStats>> {
        self.ensure_live(slug).await?;
        Ok(self.live.get(slug).map(|l| l.snapshot()))
    }

    pub async fn connected_players(
        self: &Arc<Self>,
        slug: &str,
    ) -> CoreResult<Vec<ConnectedPlayer>> {
        self.ensure_live(slug).await?;
        Ok(self
            .live
            .get(slug)
            .map(|l| l.connected_players())
            .unwrap_or_default())
    }

    pub async fn connected_count(self: &Arc<Self>, slug: &str) -> CoreResult<usize> {
        self.ensure_live(slug).await?;
        Ok(self.live.get(slug).map(|l| l.connected_count()).unwrap_or(0))
    }

    async fn ensure_live(self: &Arc<Self>, slug: &str) -> CoreResult<()> {
        if self.live.contains_key(slug) {
            return Ok(());
        }
        let state = self.rebuild_live(slug).await?;
        self.live.entry(slug.to_string()).or_insert(state);
        Ok(())
    }

    async fn rebuild_live(&self, slug: &str) -> CoreResult<LiveState> {
        let mut state = LiveState::new(slug);
        let mut after = None;
        loop {
            let events = self
                .core
                .database
                .list_events(slug, after, Some(256))
                .await?;
            let Some(last) = events.last() else {
                break;
            };
            after = Some(last.id);
            for row in &events {
                let normalized = normalize_event(&row.payload, row.received_at);
                state.apply(&normalized);
            }
        }
        if let Some(m) = self.core.database.get_match(slug).await? {
            state.sync_match(&m);
        }
        Ok(state)
    }

    fn worker_sender(self: &Arc<Self>, slug: &str) -> mpsc::Sender<InterpreterJob> {
        self.workers
            .entry(slug.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(WORKER_QUEUE_CAPACITY);
                let this = Arc::clone(self);
                let slug = slug.to_string();
                tokio::spawn(this.worker_loop(slug, rx));
                tx
            })
            .clone()
    }

    async fn worker_loop(self: Arc<Self>, slug: String, mut rx: mpsc::Receiver<InterpreterJob>) {
        debug!(slug = %slug, "interpreter_worker_started");
        if let Err(e) = self.ensure_live(&slug).await {
            warn!(slug = %slug, error = %e, "live_rebuild_failed");
        }
        let mut shutdown = self.shutdown.clone();
        loop {
            let job = tokio::select! {
                job = rx.recv() => job,
                _ = tokio::time::sleep(WORKER_IDLE_TIMEOUT) => {
                    // deregister first so late senders respawn a worker,
                    // then drain what raced in
                    self.workers.remove(&slug);
                    while let Ok(job) = rx.try_recv() {
                        self.handle_job(&slug, job).await;
                    }
                    debug!(slug = %slug, "interpreter_worker_idle_exit");
                    return;
                }
                _ = shutdown.changed() => {
                    self.workers.remove(&slug);
                    rx.close();
                    while let Ok(job) = rx.try_recv() {
                        self.handle_job(&slug, job).await;
                    }
                    info!(slug = %slug, "interpreter_worker_drained");
                    return;
                }
            };
            match job {
                Some(job) => self.handle_job(&slug, job).await,
                None => return,
            }
        }
    }

    async fn handle_job(&self, slug: &str, job: InterpreterJob) {
        match job {
            InterpreterJob::Ingest => {
                if let Err(e) = self.catch_up(slug).await {
                    warn!(slug = %slug, error = %e, "interpret_failed");
                }
            }
            InterpreterJob::Admin { command, reply } => {
                let res = self.run_admin(slug, &command).await;
                let _ = reply.send(res);
            }
        }
    }

    /// Apply every event past the persisted cursor, one optimistic save
    /// per event so the hub sees each persisted transition.
    async fn catch_up(&self, slug: &str) -> CoreResult<()> {
        'reload: loop {
            let Some(mut m) = self.core.database.get_match(slug).await? else {
                // orphan slug: stored, surfaced to operators, never
                // interpreted
                return Ok(());
            };
            loop {
                let events = self
                    .core
                    .database
                    .list_events(slug, Some(m.get_last_applied_event_id()), Some(64))
                    .await?;
                if events.is_empty() {
                    if let Some(mut live) = self.live.get_mut(slug) {
                        live.sync_match(&m);
                    }
                    return Ok(());
                }
                for row in events {
                    let normalized = normalize_event(&row.payload, row.received_at);
                    if let Some(mut live) = self.live.get_mut(slug) {
                        live.apply(&normalized);
                    }
                    let changes =
                        match state_machine::apply_event(&mut m, &normalized, Utc::now()) {
                            Ok(changes) => changes,
                            Err(e) => {
                                // logged, cursor still advances: a bad
                                // event must not wedge the queue
                                warn!(slug = %slug, event = row.id, error = %e, "event_rejected");
                                Vec::new()
                            }
                        };
                    m.set_last_applied_event_id(row.id);
                    match self.core.database.save_match(&m).await {
                        Ok(saved) => {
                            m = saved;
                            self.publish_changes(&m, &normalized, &changes).await;
                        }
                        Err(DbError::Stale) => {
                            debug!(slug = %slug, "interpret_stale_reload");
                            continue 'reload;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
    }

    async fn publish_changes(
        &self,
        m: &Match,
        normalized: &NormalizedEvent,
        changes: &[StateChange],
    ) {
        let slug = m.get_slug().to_string();
        for change in changes {
            match change {
                StateChange::StatusChanged(status) => {
                    self.core
                        .publish(CrPushNotice::MatchUpdate(MatchUpdatePayload {
                            slug: slug.clone(),
                            status: Some(*status),
                            server_id: m.get_server_id().map(str::to_string),
                            ..Default::default()
                        }))
                        .await;
                    self.core
                        .publish(CrPushNotice::BracketUpdate(
                            crate::BracketUpdatePayload::new(crate::BracketAction::MatchStatus)
                                .with_match(slug.as_str())
                                .with_status(*status),
                        ))
                        .await;
                }
                StateChange::Completed { .. } => {
                    self.scheduler.notify(SchedulerSignal::MatchCompleted {
                        slug: slug.clone(),
                    });
                }
                StateChange::VetoAdvanced { complete } => {
                    self.core
                        .publish(CrPushNotice::MatchUpdate(MatchUpdatePayload {
                            slug: slug.clone(),
                            action: Some("veto_update".into()),
                            ..Default::default()
                        }))
                        .await;
                    if *complete {
                        self.scheduler.notify(SchedulerSignal::VetoAdvanced {
                            slug: slug.clone(),
                        });
                    }
                }
                StateChange::ScoreChanged => {
                    let live_stats = self.live.get(&slug).map(|l| l.snapshot());
                    self.core
                        .publish(CrPushNotice::MatchUpdate(MatchUpdatePayload {
                            slug: slug.clone(),
                            team1_score: Some(m.get_team1_score()),
                            team2_score: Some(m.get_team2_score()),
                            live_stats,
                            ..Default::default()
                        }))
                        .await;
                }
                StateChange::PhaseChanged(_) => {
                    self.core
                        .publish(CrPushNotice::MatchUpdate(MatchUpdatePayload {
                            slug: slug.clone(),
                            action: Some("phase_change".into()),
                            ..Default::default()
                        }))
                        .await;
                }
            }
        }

        // roster churn is not a state-machine change but clients show it
        match normalized.kind() {
            GameEventKind::PlayerConnect | GameEventKind::PlayerDisconnect => {
                let connected = self
                    .live
                    .get(&slug)
                    .map(|l| l.connected_count())
                    .unwrap_or(0);
                let expected = m.get_config().expected_players_total;
                self.core
                    .publish(CrPushNotice::MatchUpdate(MatchUpdatePayload {
                        slug: slug.clone(),
                        connection_status: Some(format!("{connected}/{expected}")),
                        ..Default::default()
                    }))
                    .await;
            }
            _ => {}
        }
    }

    /// Guarded admin dispatch: the match must currently hold a server.
    async fn run_admin(&self, slug: &str, command: &str) -> CoreResult<RconReply> {
        let m = self
            .core
            .database
            .get_match(slug)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("match {slug}")))?;
        if !matches!(m.get_status(), MatchStatus::Loaded | MatchStatus::Live) {
            return Err(CoreError::Conflict(format!("match {slug} not live")));
        }
        let server_id = m
            .get_server_id()
            .ok_or_else(|| CoreError::Conflict(format!("match {slug} has no server")))?;
        let server = self
            .core
            .database
            .get_server(server_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("server {server_id}")))?;
        let raw = crate::scheduler::send_with_retry(
            &self.core,
            &self.cfg,
            &server.rcon_target(),
            command,
        )
        .await?;
        Ok(RconReply { ok: true, raw })
    }
}
