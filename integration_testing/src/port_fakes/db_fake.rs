//! Fake for the database port.
//!
//! Mirrors the adapter's semantics closely enough for scheduler and
//! interpreter tests: optimistic locking, cross-entity binding invariants,
//! append-only events with monotonic ids.

use app_core::{
    DatabasePort, DbError, DbResult, DbpEvent, DbpGameServer, DbpMatch, DbpTeam, DbpTournament,
    GameServer, Match, MatchFilter, MatchStatus, NewMatchEvent, StoredMatchEvent, Team,
    Tournament, TournamentStatus, WipeTable,
    utils::revision::{ObjectRevision, Revision},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
};

#[derive(Default)]
pub struct FakeDatabasePort {
    teams: Mutex<HashMap<String, Team>>,
    servers: Mutex<HashMap<String, GameServer>>,
    tournament: Mutex<Option<Tournament>>,
    matches: Mutex<HashMap<String, Match>>,
    events: Mutex<Vec<StoredMatchEvent>>,
    next_event_id: AtomicI64,
    pub fail_next_save_match: AtomicBool,
    pub fail_next_append_event: AtomicBool,
}

impl FakeDatabasePort {
    pub fn new() -> Self {
        FakeDatabasePort {
            next_event_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    fn take_flag(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::SeqCst)
    }

    fn bump<T: ObjectRevision + Clone>(entity: &T) -> T {
        let mut saved = entity.clone();
        saved.set_revision(entity.revision().bumped());
        saved
    }

    /// generic optimistic-save against a keyed map
    fn save_keyed<T: ObjectRevision + Clone>(
        map: &mut HashMap<String, T>,
        key: &str,
        entity: &T,
    ) -> DbResult<T> {
        match entity.revision() {
            Revision::Persisted(expected) => match map.get(key) {
                Some(existing) => {
                    if existing.revision() != Revision::Persisted(expected) {
                        return Err(DbError::Stale);
                    }
                    let saved = Self::bump(entity);
                    map.insert(key.to_string(), saved.clone());
                    Ok(saved)
                }
                None => Err(DbError::NotFound),
            },
            Revision::New => {
                let saved = match map.get(key) {
                    // upsert: adopt the stored revision
                    Some(existing) => {
                        let mut adopted = entity.clone();
                        adopted.set_revision(existing.revision());
                        Self::bump(&adopted)
                    }
                    None => Self::bump(entity),
                };
                map.insert(key.to_string(), saved.clone());
                Ok(saved)
            }
        }
    }
}

#[async_trait]
impl DbpTeam for FakeDatabasePort {
    async fn get_team(&self, id: &str) -> DbResult<Option<Team>> {
        Ok(self.teams.lock().unwrap().get(id).cloned())
    }

    async fn save_team(&self, team: &Team) -> DbResult<Team> {
        let mut guard = self.teams.lock().unwrap();
        Self::save_keyed(&mut guard, team.get_id(), team)
    }

    async fn delete_team(&self, id: &str) -> DbResult<()> {
        let in_use = self.matches.lock().unwrap().values().any(|m| {
            m.get_status() != MatchStatus::Completed
                && (m.get_team1_id() == Some(id) || m.get_team2_id() == Some(id))
        });
        if in_use {
            return Err(DbError::InvariantViolation(format!(
                "team {id} is referenced by a non-completed match"
            )));
        }
        self.teams
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or(DbError::NotFound)
    }

    async fn list_teams(&self) -> DbResult<Vec<Team>> {
        let mut teams: Vec<Team> = self.teams.lock().unwrap().values().cloned().collect();
        teams.sort_by(|a, b| a.get_name().cmp(b.get_name()));
        Ok(teams)
    }
}

#[async_trait]
impl DbpGameServer for FakeDatabasePort {
    async fn get_server(&self, id: &str) -> DbResult<Option<GameServer>> {
        Ok(self.servers.lock().unwrap().get(id).cloned())
    }

    async fn save_server(&self, server: &GameServer) -> DbResult<GameServer> {
        let mut guard = self.servers.lock().unwrap();
        if server.is_enabled() {
            let clash = guard.values().any(|other| {
                other.is_enabled()
                    && other.get_id() != server.get_id()
                    && other.get_host() == server.get_host()
                    && other.get_port() == server.get_port()
            });
            if clash {
                return Err(DbError::UniqueViolation(Some(
                    "servers_host_port_enabled".into(),
                )));
            }
        }
        Self::save_keyed(&mut guard, server.get_id(), server)
    }

    async fn delete_server(&self, id: &str) -> DbResult<()> {
        let in_use = self.matches.lock().unwrap().values().any(|m| {
            m.get_status() != MatchStatus::Completed && m.get_server_id() == Some(id)
        });
        if in_use {
            return Err(DbError::InvariantViolation(format!(
                "server {id} is bound to a non-completed match"
            )));
        }
        self.servers
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or(DbError::NotFound)
    }

    async fn list_servers(&self) -> DbResult<Vec<GameServer>> {
        let mut servers: Vec<GameServer> =
            self.servers.lock().unwrap().values().cloned().collect();
        servers.sort_by(|a, b| a.get_id().cmp(b.get_id()));
        Ok(servers)
    }
}

#[async_trait]
impl DbpTournament for FakeDatabasePort {
    async fn get_tournament(&self) -> DbResult<Option<Tournament>> {
        Ok(self.tournament.lock().unwrap().clone())
    }

    async fn save_tournament(&self, tournament: &Tournament) -> DbResult<Tournament> {
        let mut guard = self.tournament.lock().unwrap();
        let saved = match (tournament.revision(), guard.as_ref()) {
            (Revision::Persisted(expected), Some(existing)) => {
                if existing.revision() != Revision::Persisted(expected) {
                    return Err(DbError::Stale);
                }
                Self::bump(tournament)
            }
            (Revision::Persisted(_), None) => return Err(DbError::NotFound),
            (Revision::New, Some(existing)) => {
                let mut adopted = tournament.clone();
                adopted.set_revision(existing.revision());
                Self::bump(&adopted)
            }
            (Revision::New, None) => Self::bump(tournament),
        };
        *guard = Some(saved.clone());
        Ok(saved)
    }

    async fn reset_tournament_data(&self) -> DbResult<()> {
        self.matches.lock().unwrap().clear();
        self.events.lock().unwrap().clear();
        let mut guard = self.tournament.lock().unwrap();
        if let Some(t) = guard.as_mut() {
            t.set_status(TournamentStatus::Setup);
            t.set_revision(t.revision().bumped());
        }
        Ok(())
    }

    async fn wipe_all(&self) -> DbResult<()> {
        self.events.lock().unwrap().clear();
        self.matches.lock().unwrap().clear();
        *self.tournament.lock().unwrap() = None;
        self.servers.lock().unwrap().clear();
        self.teams.lock().unwrap().clear();
        Ok(())
    }

    async fn wipe_table(&self, table: WipeTable) -> DbResult<()> {
        match table {
            WipeTable::Teams => self.teams.lock().unwrap().clear(),
            WipeTable::Servers => self.servers.lock().unwrap().clear(),
            WipeTable::Tournament => *self.tournament.lock().unwrap() = None,
            WipeTable::Matches => {
                self.matches.lock().unwrap().clear();
                self.events.lock().unwrap().clear();
            }
        }
        Ok(())
    }

    async fn ping_db(&self) -> DbResult<()> {
        Ok(())
    }
}

#[async_trait]
impl DbpMatch for FakeDatabasePort {
    async fn get_match(&self, slug: &str) -> DbResult<Option<Match>> {
        Ok(self.matches.lock().unwrap().get(slug).cloned())
    }

    async fn save_match(&self, m: &Match) -> DbResult<Match> {
        if Self::take_flag(&self.fail_next_save_match) {
            return Err(DbError::Unavailable);
        }
        let mut guard = self.matches.lock().unwrap();
        match m.revision() {
            Revision::Persisted(expected) => match guard.get(m.get_slug()) {
                Some(existing) => {
                    if existing.revision() != Revision::Persisted(expected) {
                        return Err(DbError::Stale);
                    }
                    let saved = Self::bump(m);
                    guard.insert(m.get_slug().to_string(), saved.clone());
                    Ok(saved)
                }
                None => Err(DbError::NotFound),
            },
            Revision::New => {
                if guard.contains_key(m.get_slug()) {
                    return Err(DbError::UniqueViolation(Some("matches_slug".into())));
                }
                let saved = Self::bump(m);
                guard.insert(m.get_slug().to_string(), saved.clone());
                Ok(saved)
            }
        }
    }

    async fn create_matches(&self, batch: &[Match]) -> DbResult<Vec<Match>> {
        let mut guard = self.matches.lock().unwrap();
        for m in batch {
            if guard.contains_key(m.get_slug()) {
                return Err(DbError::UniqueViolation(Some("matches_slug".into())));
            }
        }
        let mut saved = Vec::with_capacity(batch.len());
        for m in batch {
            let row = Self::bump(m);
            guard.insert(m.get_slug().to_string(), row.clone());
            saved.push(row);
        }
        Ok(saved)
    }

    async fn list_matches(&self, filter: &MatchFilter) -> DbResult<Vec<Match>> {
        let mut rows: Vec<Match> = self.matches.lock().unwrap().values().cloned().collect();
        if let Some(status) = filter.status {
            rows.retain(|m| m.get_status() == status);
        }
        if let Some(team) = &filter.team_id {
            rows.retain(|m| {
                m.get_team1_id() == Some(team.as_str()) || m.get_team2_id() == Some(team.as_str())
            });
        }
        rows.sort_by_key(|m| (m.get_round(), m.get_match_number(), m.get_created_at()));
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn bind_server(&self, slug: &str, server_id: &str) -> DbResult<Match> {
        let server = self
            .servers
            .lock()
            .unwrap()
            .get(server_id)
            .cloned()
            .ok_or(DbError::NotFound)?;
        if !server.is_enabled() {
            return Err(DbError::InvariantViolation(format!(
                "server {server_id} is disabled"
            )));
        }
        let mut guard = self.matches.lock().unwrap();
        let bound_elsewhere = guard.values().any(|m| {
            m.get_slug() != slug
                && m.get_status() != MatchStatus::Completed
                && m.get_server_id() == Some(server_id)
        });
        if bound_elsewhere {
            return Err(DbError::InvariantViolation(format!(
                "server {server_id} is bound to another non-completed match"
            )));
        }
        let m = guard.get(slug).ok_or(DbError::NotFound)?;
        let mut updated = m.clone();
        updated
            .mark_loaded(server_id, Utc::now())
            .map_err(|e| DbError::InvariantViolation(e.to_string()))?;
        let saved = Self::bump(&updated);
        guard.insert(slug.to_string(), saved.clone());
        Ok(saved)
    }

    async fn release_server(&self, slug: &str, new_status: MatchStatus) -> DbResult<Match> {
        let mut guard = self.matches.lock().unwrap();
        let m = guard.get(slug).ok_or(DbError::NotFound)?;
        let mut updated = m.clone();
        match new_status {
            MatchStatus::Ready => updated
                .revert_to_ready()
                .map_err(|e| DbError::InvariantViolation(e.to_string()))?,
            MatchStatus::Completed => {
                updated.clear_server();
            }
            other => {
                return Err(DbError::InvariantViolation(format!(
                    "cannot release a server into status {other}"
                )));
            }
        }
        let saved = Self::bump(&updated);
        guard.insert(slug.to_string(), saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl DbpEvent for FakeDatabasePort {
    async fn append_event(&self, event: &NewMatchEvent) -> DbResult<i64> {
        if Self::take_flag(&self.fail_next_append_event) {
            return Err(DbError::Unavailable);
        }
        let id = self.next_event_id.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(StoredMatchEvent {
            id,
            match_slug: event.match_slug.clone(),
            event_kind: event.event_kind.clone(),
            payload: event.payload.clone(),
            received_at: event.received_at,
        });
        Ok(id)
    }

    async fn list_events(
        &self,
        match_slug: &str,
        after_id: Option<i64>,
        limit: Option<usize>,
    ) -> DbResult<Vec<StoredMatchEvent>> {
        let mut rows: Vec<StoredMatchEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.match_slug == match_slug)
            .filter(|e| after_id.is_none_or(|after| e.id > after))
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.id);
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn last_event_time(&self, match_slug: &str) -> DbResult<Option<DateTime<Utc>>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.match_slug == match_slug)
            .map(|e| e.received_at)
            .max())
    }

    async fn orphan_event_slugs(&self) -> DbResult<Vec<String>> {
        let matches = self.matches.lock().unwrap();
        let mut slugs: Vec<String> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.match_slug.clone())
            .filter(|slug| !matches.contains_key(slug))
            .collect();
        slugs.sort();
        slugs.dedup();
        Ok(slugs)
    }
}

impl DatabasePort for FakeDatabasePort {}
