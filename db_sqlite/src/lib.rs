// diesel sqlite implementation of the database port

pub mod events;
pub mod matches;
pub mod schema;
pub mod servers;
pub mod teams;

use anyhow::anyhow;
use app_core::{
    DatabasePort, DbError, DbResult, DbpTournament, Tournament, TournamentStatus, WipeTable,
    utils::revision::{ObjectRevision, Revision},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    connection::SimpleConnection,
    prelude::*,
    r2d2::{ConnectionManager, Pool, PooledConnection},
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use tracing::{info, instrument, warn};

/// embed migrations
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub(crate) type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;
pub(crate) type SqliteConn = PooledConnection<ConnectionManager<SqliteConnection>>;

use diesel::result::{DatabaseErrorKind as K, Error as DE};

/// Bridge error for diesel transactions: diesel requires the closure error
/// to convert from its own error type, while the port speaks `DbError`.
pub(crate) enum TxError {
    Db(DbError),
    Diesel(DE),
}

impl From<DE> for TxError {
    fn from(value: DE) -> Self {
        TxError::Diesel(value)
    }
}

impl From<DbError> for TxError {
    fn from(value: DbError) -> Self {
        TxError::Db(value)
    }
}

impl From<TxError> for DbError {
    fn from(value: TxError) -> Self {
        match value {
            TxError::Db(e) => e,
            TxError::Diesel(e) => map_db_err(e),
        }
    }
}

pub(crate) type TxResult<T> = Result<T, TxError>;

/// Run a write transaction (`BEGIN IMMEDIATE`, so lock acquisition happens
/// up front instead of at the first late write).
pub(crate) fn tx<T>(
    conn: &mut SqliteConnection,
    f: impl FnOnce(&mut SqliteConnection) -> TxResult<T>,
) -> DbResult<T> {
    conn.immediate_transaction(f).map_err(DbError::from)
}

/// Pragmas applied to every pooled connection. WAL keeps readers off the
/// writer's back; the busy timeout turns lock contention into waits
/// instead of immediate SQLITE_BUSY failures.
#[derive(Debug, Clone, Copy)]
struct ConnectionPragmas;

impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for ConnectionPragmas
{
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA busy_timeout = 5000; \
             PRAGMA foreign_keys = ON;",
        )
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Open (or create) the database file and build the pool.
    pub fn new(database_path: &Path) -> DbResult<Self> {
        let manager =
            ConnectionManager::<SqliteConnection>::new(database_path.display().to_string());
        let pool = Pool::builder()
            .max_size(8)
            .connection_customizer(Box::new(ConnectionPragmas))
            .build(manager)
            .map_err(|e| DbError::Other(anyhow!(e)))?;
        Ok(SqliteDb { pool })
    }

    #[instrument(name = "db.migration", skip(self))]
    pub async fn run_migration(&self) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.run_pending_migrations(MIGRATIONS)
                .map_err(|e| DbError::Other(anyhow!("migration failed: {e}")))?;
            Ok(())
        })
        .await?;
        info!("migrations_applied");
        Ok(())
    }

    /// All diesel work is blocking; shove it onto the blocking pool.
    pub(crate) async fn with_conn<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> DbResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn: SqliteConn = pool.get().map_err(|e| {
                warn!(error = %e, "pool_get_failed");
                DbError::Unavailable
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| DbError::Other(anyhow!("join error while running query: {e}")))?
    }
}

impl DatabasePort for SqliteDb {}

pub(crate) fn map_db_err(e: DE) -> DbError {
    match &e {
        DE::NotFound => DbError::NotFound,
        DE::DatabaseError(kind, info) => {
            let message = info.message().to_string();
            match kind {
                K::UniqueViolation => DbError::UniqueViolation(Some(message)),
                K::ForeignKeyViolation => DbError::ForeignKeyViolation(Some(message)),
                _ if message.contains("database is locked") => DbError::Unavailable,
                _ => DbError::Other(anyhow!(e)),
            }
        }
        _ => DbError::Other(anyhow!(e)),
    }
}

/// Enums are stored as their serde string form (`"in_progress"`), JSON
/// aggregates as JSON text.
pub(crate) fn enum_to_text<T: Serialize>(value: &T) -> DbResult<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Err(DbError::Other(anyhow!("expected string enum, got {other}"))),
        Err(e) => Err(DbError::Other(anyhow!("enum serialize failed: {e}"))),
    }
}

pub(crate) fn enum_from_text<T: DeserializeOwned>(s: &str) -> DbResult<T> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| DbError::Other(anyhow!("enum parse failed for {s:?}: {e}")))
}

pub(crate) fn json_to_text<T: Serialize>(value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|e| DbError::Other(anyhow!("json serialize failed: {e}")))
}

pub(crate) fn json_from_text<T: DeserializeOwned>(s: &str) -> DbResult<T> {
    serde_json::from_str(s).map_err(|e| DbError::Other(anyhow!("json parse failed: {e}")))
}

// ------------------- tournament singleton -------------------

#[derive(Debug, Queryable)]
struct DbTournament {
    #[allow(dead_code)]
    id: i32,
    version: i64,
    name: String,
    t_type: String,
    format: String,
    map_pool: String,
    team_ids: String,
    status: String,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

impl TryFrom<DbTournament> for Tournament {
    type Error = DbError;

    fn try_from(r: DbTournament) -> Result<Self, Self::Error> {
        let mut t = Tournament::new(r.name);
        t.set_type(enum_from_text(&r.t_type)?)
            .set_format(enum_from_text(&r.format)?)
            .set_map_pool(json_from_text(&r.map_pool)?)
            .set_team_ids(json_from_text(&r.team_ids)?)
            .set_status(enum_from_text(&r.status)?);
        t.set_revision(Revision::Persisted(r.version));
        Ok(t)
    }
}

fn load_tournament(conn: &mut SqliteConnection) -> DbResult<Option<Tournament>> {
    use schema::tournaments::dsl::*;
    let row = tournaments
        .filter(id.eq(1))
        .first::<DbTournament>(conn)
        .optional()
        .map_err(map_db_err)?;
    row.map(Tournament::try_from).transpose()
}

#[async_trait]
impl DbpTournament for SqliteDb {
    #[instrument(name = "db.tournament.get", skip(self))]
    async fn get_tournament(&self) -> DbResult<Option<Tournament>> {
        self.with_conn(load_tournament).await
    }

    #[instrument(
        name = "db.tournament.save",
        skip(self, tournament),
        fields(version = ?tournament.revision().version())
    )]
    async fn save_tournament(&self, tournament: &Tournament) -> DbResult<Tournament> {
        let t = tournament.clone();
        self.with_conn(move |conn| {
            use schema::tournaments::dsl::*;
            let w_name = t.get_name().to_string();
            let w_type = enum_to_text(&t.get_type())?;
            let w_format = enum_to_text(&t.get_format())?;
            let w_pool = json_to_text(&t.get_map_pool())?;
            let w_teams = json_to_text(&t.get_team_ids())?;
            let w_status = enum_to_text(&t.get_status())?;
            let now = Utc::now();

            tx(conn, |conn| {
                match t.revision().version() {
                    Some(expected) => {
                        let updated =
                            diesel::update(tournaments.filter(id.eq(1).and(version.eq(expected))))
                                .set((
                                    version.eq(expected + 1),
                                    name.eq(&w_name),
                                    t_type.eq(&w_type),
                                    format.eq(&w_format),
                                    map_pool.eq(&w_pool),
                                    team_ids.eq(&w_teams),
                                    status.eq(&w_status),
                                    updated_at.eq(now),
                                ))
                                .execute(conn)?;
                        if updated == 0 {
                            let exists =
                                diesel::select(diesel::dsl::exists(tournaments.filter(id.eq(1))))
                                    .get_result::<bool>(conn)?;
                            if exists {
                                warn!("optimistic_lock_conflict");
                                return Err(DbError::Stale.into());
                            }
                            return Err(DbError::NotFound.into());
                        }
                    }
                    None => {
                        diesel::insert_into(tournaments)
                            .values((
                                id.eq(1),
                                version.eq(0),
                                name.eq(&w_name),
                                t_type.eq(&w_type),
                                format.eq(&w_format),
                                map_pool.eq(&w_pool),
                                team_ids.eq(&w_teams),
                                status.eq(&w_status),
                                created_at.eq(now),
                                updated_at.eq(now),
                            ))
                            .execute(conn)?;
                    }
                }
                load_tournament(conn)?.ok_or(DbError::NotFound).map_err(TxError::from)
            })
        })
        .await
    }

    #[instrument(name = "db.tournament.reset", skip(self))]
    async fn reset_tournament_data(&self) -> DbResult<()> {
        self.with_conn(|conn| {
            tx(conn, |conn| {
                diesel::delete(schema::matches::table).execute(conn)?;
                diesel::delete(schema::events::table).execute(conn)?;
                let setup = enum_to_text(&TournamentStatus::Setup)?;
                use schema::tournaments::dsl::*;
                diesel::update(tournaments.filter(id.eq(1)))
                    .set((
                        status.eq(setup),
                        version.eq(version + 1),
                        updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
                Ok(())
            })
        })
        .await?;
        info!("tournament_data_reset");
        Ok(())
    }

    #[instrument(name = "db.wipe_all", skip(self))]
    async fn wipe_all(&self) -> DbResult<()> {
        self.with_conn(|conn| {
            tx(conn, |conn| {
                diesel::delete(schema::events::table).execute(conn)?;
                diesel::delete(schema::matches::table).execute(conn)?;
                diesel::delete(schema::tournaments::table).execute(conn)?;
                diesel::delete(schema::servers::table).execute(conn)?;
                diesel::delete(schema::teams::table).execute(conn)?;
                Ok(())
            })
        })
        .await?;
        info!("database_wiped");
        Ok(())
    }

    #[instrument(name = "db.wipe_table", skip(self))]
    async fn wipe_table(&self, table: WipeTable) -> DbResult<()> {
        self.with_conn(move |conn| {
            tx(conn, |conn| {
                match table {
                    WipeTable::Teams => {
                        diesel::delete(schema::teams::table).execute(conn)?;
                    }
                    WipeTable::Servers => {
                        diesel::delete(schema::servers::table).execute(conn)?;
                    }
                    WipeTable::Tournament => {
                        diesel::delete(schema::tournaments::table).execute(conn)?;
                    }
                    WipeTable::Matches => {
                        diesel::delete(schema::events::table).execute(conn)?;
                        diesel::delete(schema::matches::table).execute(conn)?;
                    }
                }
                Ok(())
            })
        })
        .await
    }

    #[instrument(name = "db.ping", skip(self))]
    async fn ping_db(&self) -> DbResult<()> {
        self.with_conn(|conn| {
            diesel::select(diesel::dsl::sql::<diesel::sql_types::Bool>("1=1"))
                .execute(conn)
                .map_err(map_db_err)?;
            Ok(())
        })
        .await
    }
}
