// database port

use crate::{GameServer, Match, MatchStatus, NewMatchEvent, StoredMatchEvent, Team, Tournament};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// Update could not find matching id + version; reload and retry
    #[error("optimistic lock conflict")]
    Stale,

    /// ID does not exist
    #[error("entity not found")]
    NotFound,

    /// constraint name if the store returns one
    #[error("unique violation: {0:?}")]
    UniqueViolation(Option<String>),

    /// constraint name if the store returns one
    #[error("foreign key violation: {0:?}")]
    ForeignKeyViolation(Option<String>),

    /// a cross-entity invariant failed inside a transaction
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    // transient store problems (retry with backoff may work)
    #[error("store unavailable")]
    Unavailable,

    // connection, pool, or other store errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    /// Retriable with backoff without operator intervention.
    pub fn is_retriable(&self) -> bool {
        matches!(self, DbError::Unavailable)
    }

    /// Conflict class: surfaced to the caller with a structured reason,
    /// never retried as-is.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation(_)
                | DbError::ForeignKeyViolation(_)
                | DbError::InvariantViolation(_)
        )
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Filter for match listings. Default selects everything.
#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub status: Option<MatchStatus>,
    pub team_id: Option<String>,
    pub limit: Option<usize>,
}

/// Tables an operator may wipe individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeTable {
    Teams,
    Servers,
    Tournament,
    Matches,
}

/// database port trait
pub trait DatabasePort:
    DbpTeam + DbpGameServer + DbpTournament + DbpMatch + DbpEvent + Send + Sync
{
}

#[async_trait]
pub trait DbpTeam: Send + Sync {
    async fn get_team(&self, id: &str) -> DbResult<Option<Team>>;
    async fn save_team(&self, team: &Team) -> DbResult<Team>;
    /// Fails with an invariant violation while the team is referenced by a
    /// non-completed match.
    async fn delete_team(&self, id: &str) -> DbResult<()>;
    async fn list_teams(&self) -> DbResult<Vec<Team>>;
}

#[async_trait]
pub trait DbpGameServer: Send + Sync {
    async fn get_server(&self, id: &str) -> DbResult<Option<GameServer>>;
    async fn save_server(&self, server: &GameServer) -> DbResult<GameServer>;
    /// Fails with an invariant violation while the server is bound to a
    /// non-completed match.
    async fn delete_server(&self, id: &str) -> DbResult<()>;
    async fn list_servers(&self) -> DbResult<Vec<GameServer>>;
}

#[async_trait]
pub trait DbpTournament: Send + Sync {
    async fn get_tournament(&self) -> DbResult<Option<Tournament>>;
    async fn save_tournament(&self, tournament: &Tournament) -> DbResult<Tournament>;
    /// Deletes all matches and events and puts the tournament back into
    /// setup, atomically.
    async fn reset_tournament_data(&self) -> DbResult<()>;
    /// Removes teams, servers, tournament, matches and events.
    async fn wipe_all(&self) -> DbResult<()>;
    async fn wipe_table(&self, table: WipeTable) -> DbResult<()>;
    async fn ping_db(&self) -> DbResult<()>;
}

#[async_trait]
pub trait DbpMatch: Send + Sync {
    async fn get_match(&self, slug: &str) -> DbResult<Option<Match>>;
    /// Whole-row save under the optimistic lock carried by the match
    /// revision.
    async fn save_match(&self, m: &Match) -> DbResult<Match>;
    /// All-or-nothing insert of a generated batch.
    async fn create_matches(&self, batch: &[Match]) -> DbResult<Vec<Match>>;
    async fn list_matches(&self, filter: &MatchFilter) -> DbResult<Vec<Match>>;
    /// Transition `ready -> loaded` and bind the server, re-checking inside
    /// one transaction that the match is still ready with a completed veto
    /// and that the server is enabled and not bound to any non-completed
    /// match.
    async fn bind_server(&self, slug: &str, server_id: &str) -> DbResult<Match>;
    /// Unbind the server and set the given status (`ready` demotion or
    /// `completed`).
    async fn release_server(&self, slug: &str, new_status: MatchStatus) -> DbResult<Match>;
}

#[async_trait]
pub trait DbpEvent: Send + Sync {
    /// Append-only; returns the monotonically increasing event id.
    async fn append_event(&self, event: &NewMatchEvent) -> DbResult<i64>;
    async fn list_events(
        &self,
        match_slug: &str,
        after_id: Option<i64>,
        limit: Option<usize>,
    ) -> DbResult<Vec<StoredMatchEvent>>;
    async fn last_event_time(&self, match_slug: &str) -> DbResult<Option<DateTime<Utc>>>;
    /// Slugs that have events but no match row (operator tooling).
    async fn orphan_event_slugs(&self) -> DbResult<Vec<String>>;
}
