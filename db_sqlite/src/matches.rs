//! implementation of the match port
//!
//! The binding operations re-check every cross-entity invariant inside one
//! write transaction, which is what makes double-binding a server
//! impossible no matter how the scheduler and handlers race.

use crate::{
    SqliteDb, TxError, enum_from_text, enum_to_text, json_from_text, json_to_text, map_db_err,
    schema, servers::load_server, tx,
};
use app_core::{
    DbError, DbResult, DbpMatch, Match, MatchFilter, MatchStatus,
    utils::revision::{ObjectRevision, Revision},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Queryable)]
pub struct DbMatch {
    pub slug: String,
    pub version: i64,
    pub round: i32,
    pub match_number: i32,
    pub bracket_tag: String,
    pub team1_id: Option<String>,
    pub team2_id: Option<String>,
    pub winner_id: Option<String>,
    pub server_id: Option<String>,
    pub status: String,
    pub match_phase: String,
    pub veto: String,
    pub config: String,
    pub map_results: String,
    pub team1_score: i32,
    pub team2_score: i32,
    pub team1_series_score: i32,
    pub team2_series_score: i32,
    pub demo_file_paths: String,
    pub last_applied_event_id: i64,
    pub created_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbMatch> for Match {
    type Error = DbError;

    fn try_from(r: DbMatch) -> Result<Self, Self::Error> {
        Ok(Match::restore(
            r.slug,
            Revision::Persisted(r.version),
            r.round as u32,
            r.match_number as u32,
            r.bracket_tag,
            r.team1_id,
            r.team2_id,
            r.winner_id,
            r.server_id,
            enum_from_text(&r.status)?,
            enum_from_text(&r.match_phase)?,
            json_from_text(&r.veto)?,
            json_from_text(&r.config)?,
            json_from_text(&r.map_results)?,
            (
                r.team1_score as u32,
                r.team2_score as u32,
                r.team1_series_score as u32,
                r.team2_series_score as u32,
            ),
            json_from_text(&r.demo_file_paths)?,
            r.last_applied_event_id,
            r.created_at,
            r.ready_at,
            r.loaded_at,
            r.completed_at,
        ))
    }
}

/// Serialized column values shared by insert and update paths.
struct MatchWrites {
    status: String,
    match_phase: String,
    veto: String,
    config: String,
    map_results: String,
    demo_file_paths: String,
}

fn match_writes(m: &Match) -> DbResult<MatchWrites> {
    Ok(MatchWrites {
        status: enum_to_text(&m.get_status())?,
        match_phase: enum_to_text(&m.get_phase())?,
        veto: json_to_text(m.get_veto())?,
        config: json_to_text(m.get_config())?,
        map_results: json_to_text(&m.get_map_results())?,
        demo_file_paths: json_to_text(&m.get_demo_file_paths())?,
    })
}

pub(crate) fn load_match(conn: &mut SqliteConnection, match_slug: &str) -> DbResult<Option<Match>> {
    use schema::matches::dsl::*;
    let row = matches
        .filter(slug.eq(match_slug))
        .first::<DbMatch>(conn)
        .optional()
        .map_err(map_db_err)?;
    row.map(Match::try_from).transpose()
}

fn insert_match(conn: &mut SqliteConnection, m: &Match) -> Result<(), TxError> {
    use schema::matches::dsl::*;
    let w = match_writes(m)?;
    diesel::insert_into(matches)
        .values((
            slug.eq(m.get_slug()),
            version.eq(0),
            round.eq(m.get_round() as i32),
            match_number.eq(m.get_match_number() as i32),
            bracket_tag.eq(m.get_bracket_tag()),
            team1_id.eq(m.get_team1_id()),
            team2_id.eq(m.get_team2_id()),
            winner_id.eq(m.get_winner_id()),
            server_id.eq(m.get_server_id()),
            status.eq(&w.status),
            match_phase.eq(&w.match_phase),
            veto.eq(&w.veto),
            config.eq(&w.config),
            map_results.eq(&w.map_results),
            team1_score.eq(m.get_team1_score() as i32),
            team2_score.eq(m.get_team2_score() as i32),
            team1_series_score.eq(m.get_team1_series_score() as i32),
            team2_series_score.eq(m.get_team2_series_score() as i32),
            demo_file_paths.eq(&w.demo_file_paths),
            last_applied_event_id.eq(m.get_last_applied_event_id()),
            created_at.eq(m.get_created_at()),
            ready_at.eq(m.get_ready_at()),
            loaded_at.eq(m.get_loaded_at()),
            completed_at.eq(m.get_completed_at()),
        ))
        .execute(conn)?;
    Ok(())
}

/// Version-checked whole-row update. 0 rows touched resolves into stale
/// vs. missing exactly like the other entities.
fn update_match_row(conn: &mut SqliteConnection, m: &Match, expected: i64) -> Result<(), TxError> {
    use schema::matches::dsl::*;
    let w = match_writes(m)?;
    let updated = diesel::update(matches.filter(slug.eq(m.get_slug()).and(version.eq(expected))))
        .set((
            version.eq(expected + 1),
            team1_id.eq(m.get_team1_id()),
            team2_id.eq(m.get_team2_id()),
            winner_id.eq(m.get_winner_id()),
            server_id.eq(m.get_server_id()),
            status.eq(&w.status),
            match_phase.eq(&w.match_phase),
            veto.eq(&w.veto),
            config.eq(&w.config),
            map_results.eq(&w.map_results),
            team1_score.eq(m.get_team1_score() as i32),
            team2_score.eq(m.get_team2_score() as i32),
            team1_series_score.eq(m.get_team1_series_score() as i32),
            team2_series_score.eq(m.get_team2_series_score() as i32),
            demo_file_paths.eq(&w.demo_file_paths),
            last_applied_event_id.eq(m.get_last_applied_event_id()),
            ready_at.eq(m.get_ready_at()),
            loaded_at.eq(m.get_loaded_at()),
            completed_at.eq(m.get_completed_at()),
        ))
        .execute(conn)?;
    if updated == 0 {
        let exists =
            diesel::select(diesel::dsl::exists(matches.filter(slug.eq(m.get_slug()))))
                .get_result::<bool>(conn)?;
        if exists {
            warn!(slug = %m.get_slug(), "optimistic_lock_conflict");
            return Err(DbError::Stale.into());
        }
        return Err(DbError::NotFound.into());
    }
    Ok(())
}

fn server_bound_elsewhere(
    conn: &mut SqliteConnection,
    sid: &str,
    excluding_slug: &str,
) -> DbResult<bool> {
    use schema::matches::dsl::*;
    let completed = enum_to_text(&MatchStatus::Completed)?;
    diesel::select(diesel::dsl::exists(
        matches.filter(
            status
                .ne(completed)
                .and(server_id.eq(sid))
                .and(slug.ne(excluding_slug)),
        ),
    ))
    .get_result::<bool>(conn)
    .map_err(map_db_err)
}

#[async_trait]
impl DbpMatch for SqliteDb {
    #[instrument(name = "db.match.get", skip(self))]
    async fn get_match(&self, slug: &str) -> DbResult<Option<Match>> {
        let slug = slug.to_string();
        self.with_conn(move |conn| load_match(conn, &slug)).await
    }

    #[instrument(
        name = "db.match.save",
        skip(self, m),
        fields(slug = %m.get_slug(), version = ?m.revision().version())
    )]
    async fn save_match(&self, m: &Match) -> DbResult<Match> {
        let m = m.clone();
        self.with_conn(move |conn| {
            tx(conn, |conn| {
                match m.revision().version() {
                    Some(expected) => update_match_row(conn, &m, expected)?,
                    None => insert_match(conn, &m)?,
                }
                load_match(conn, m.get_slug())?
                    .ok_or(DbError::NotFound)
                    .map_err(TxError::from)
            })
        })
        .await
    }

    #[instrument(name = "db.match.create_batch", skip(self, batch), fields(count = batch.len()))]
    async fn create_matches(&self, batch: &[Match]) -> DbResult<Vec<Match>> {
        let batch = batch.to_vec();
        self.with_conn(move |conn| {
            tx(conn, |conn| {
                let mut saved = Vec::with_capacity(batch.len());
                for m in &batch {
                    insert_match(conn, m)?;
                    saved.push(
                        load_match(conn, m.get_slug())?
                            .ok_or(DbError::NotFound)
                            .map_err(TxError::from)?,
                    );
                }
                Ok(saved)
            })
        })
        .await
        .inspect(|saved| info!(count = saved.len(), "batch_insert_ok"))
    }

    #[instrument(name = "db.match.list", skip(self, filter))]
    async fn list_matches(&self, filter: &MatchFilter) -> DbResult<Vec<Match>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            use schema::matches::dsl::*;
            let mut query = matches.into_boxed::<diesel::sqlite::Sqlite>();
            if let Some(wanted) = filter.status {
                query = query.filter(status.eq(enum_to_text(&wanted)?));
            }
            if let Some(team) = &filter.team_id {
                query = query.filter(
                    team1_id
                        .eq(team.clone())
                        .or(team2_id.eq(team.clone())),
                );
            }
            if let Some(limit) = filter.limit {
                query = query.limit(limit as i64);
            }
            let rows = query
                .order((round.asc(), match_number.asc(), created_at.asc()))
                .load::<DbMatch>(conn)
                .map_err(map_db_err)?;
            rows.into_iter().map(Match::try_from).collect()
        })
        .await
    }

    #[instrument(name = "db.match.bind_server", skip(self))]
    async fn bind_server(&self, slug: &str, server_id: &str) -> DbResult<Match> {
        let slug = slug.to_string();
        let sid = server_id.to_string();
        self.with_conn(move |conn| {
            tx(conn, |conn| {
                let mut m = load_match(conn, &slug)?
                    .ok_or(DbError::NotFound)
                    .map_err(TxError::from)?;
                let server = load_server(conn, &sid)?
                    .ok_or(DbError::NotFound)
                    .map_err(TxError::from)?;
                if !server.is_enabled() {
                    return Err(DbError::InvariantViolation(format!(
                        "server {sid} is disabled"
                    ))
                    .into());
                }
                if server_bound_elsewhere(conn, &sid, &slug)? {
                    return Err(DbError::InvariantViolation(format!(
                        "server {sid} is bound to another non-completed match"
                    ))
                    .into());
                }
                let expected = m
                    .revision()
                    .version()
                    .ok_or_else(|| DbError::InvariantViolation("unsaved match".into()))?;
                m.mark_loaded(sid.as_str(), Utc::now())
                    .map_err(|e| DbError::InvariantViolation(e.to_string()))?;
                update_match_row(conn, &m, expected)?;
                let bound = load_match(conn, &slug)?
                    .ok_or(DbError::NotFound)
                    .map_err(TxError::from)?;
                info!(slug = %slug, server = %sid, "bind_ok");
                Ok(bound)
            })
        })
        .await
    }

    #[instrument(name = "db.match.release_server", skip(self))]
    async fn release_server(&self, slug: &str, new_status: MatchStatus) -> DbResult<Match> {
        let slug = slug.to_string();
        self.with_conn(move |conn| {
            tx(conn, |conn| {
                let mut m = load_match(conn, &slug)?
                    .ok_or(DbError::NotFound)
                    .map_err(TxError::from)?;
                let expected = m
                    .revision()
                    .version()
                    .ok_or_else(|| DbError::InvariantViolation("unsaved match".into()))?;
                match new_status {
                    MatchStatus::Ready => {
                        m.revert_to_ready()
                            .map_err(|e| DbError::InvariantViolation(e.to_string()))?;
                    }
                    MatchStatus::Completed => {
                        m.clear_server();
                    }
                    other => {
                        return Err(DbError::InvariantViolation(format!(
                            "cannot release a server into status {other}"
                        ))
                        .into());
                    }
                }
                update_match_row(conn, &m, expected)?;
                let released = load_match(conn, &slug)?
                    .ok_or(DbError::NotFound)
                    .map_err(TxError::from)?;
                debug!(slug = %slug, status = %released.get_status(), "release_ok");
                Ok(released)
            })
        })
        .await
    }
}
