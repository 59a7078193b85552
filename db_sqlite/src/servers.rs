//! implementation of the game server port

use crate::{SqliteDb, enum_to_text, map_db_err, schema, tx};
use app_core::{
    DbError, DbResult, DbpGameServer, GameServer, MatchStatus,
    utils::revision::{ObjectRevision, Revision},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Queryable)]
pub struct DbGameServer {
    pub id: String,
    pub version: i64,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub rcon_password: String,
    pub enabled: bool,
    #[allow(dead_code)]
    pub created_at: DateTime<Utc>,
    #[allow(dead_code)]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbGameServer> for GameServer {
    type Error = DbError;

    fn try_from(r: DbGameServer) -> Result<Self, Self::Error> {
        let mut server = GameServer::with_id(r.id);
        server
            .set_name(r.name)
            .set_host(r.host)
            .set_port(r.port as u16)
            .set_rcon_password(r.rcon_password)
            .set_enabled(r.enabled);
        server.set_revision(Revision::Persisted(r.version));
        Ok(server)
    }
}

pub(crate) fn load_server(
    conn: &mut SqliteConnection,
    server_id: &str,
) -> DbResult<Option<GameServer>> {
    use schema::servers::dsl::*;
    let row = servers
        .filter(id.eq(server_id))
        .first::<DbGameServer>(conn)
        .optional()
        .map_err(map_db_err)?;
    row.map(GameServer::try_from).transpose()
}

/// `(host, port)` must be unique among enabled servers.
fn endpoint_taken(conn: &mut SqliteConnection, s: &GameServer) -> DbResult<bool> {
    use schema::servers::dsl::*;
    diesel::select(diesel::dsl::exists(
        servers.filter(
            enabled
                .eq(true)
                .and(host.eq(s.get_host()))
                .and(port.eq(s.get_port() as i32))
                .and(id.ne(s.get_id())),
        ),
    ))
    .get_result::<bool>(conn)
    .map_err(map_db_err)
}

fn server_in_use(conn: &mut SqliteConnection, sid: &str) -> DbResult<bool> {
    use schema::matches::dsl::*;
    let completed = enum_to_text(&MatchStatus::Completed)?;
    diesel::select(diesel::dsl::exists(
        matches.filter(status.ne(completed).and(server_id.eq(sid))),
    ))
    .get_result::<bool>(conn)
    .map_err(map_db_err)
}

#[async_trait]
impl DbpGameServer for SqliteDb {
    #[instrument(name = "db.server.get", skip(self))]
    async fn get_server(&self, server_id: &str) -> DbResult<Option<GameServer>> {
        let server_id = server_id.to_string();
        self.with_conn(move |conn| load_server(conn, &server_id))
            .await
    }

    #[instrument(
        name = "db.server.save",
        skip(self, server),
        fields(id = %server.get_id(), version = ?server.revision().version())
    )]
    async fn save_server(&self, server: &GameServer) -> DbResult<GameServer> {
        let s = server.clone();
        self.with_conn(move |conn| {
            use schema::servers::dsl::{
                created_at, enabled as enabled_col, host, id, name, port, rcon_password, servers,
                updated_at, version,
            };
            let now = Utc::now();
            tx(conn, |conn| {
                if s.is_enabled() && endpoint_taken(conn, &s)? {
                    return Err(DbError::UniqueViolation(Some(
                        "servers_host_port_enabled".into(),
                    ))
                    .into());
                }
                match s.revision().version() {
                    Some(expected) => {
                        let updated = diesel::update(
                            servers.filter(id.eq(s.get_id()).and(version.eq(expected))),
                        )
                        .set((
                            version.eq(expected + 1),
                            name.eq(s.get_name()),
                            host.eq(s.get_host()),
                            port.eq(s.get_port() as i32),
                            rcon_password.eq(s.get_rcon_password()),
                            enabled_col.eq(s.is_enabled()),
                            updated_at.eq(now),
                        ))
                        .execute(conn)?;
                        if updated == 0 {
                            let exists = diesel::select(diesel::dsl::exists(
                                servers.filter(id.eq(s.get_id())),
                            ))
                            .get_result::<bool>(conn)?;
                            if exists {
                                warn!("optimistic_lock_conflict");
                                return Err(DbError::Stale.into());
                            }
                            return Err(DbError::NotFound.into());
                        }
                    }
                    None => {
                        let existing = diesel::select(diesel::dsl::exists(
                            servers.filter(id.eq(s.get_id())),
                        ))
                        .get_result::<bool>(conn)?;
                        if existing {
                            diesel::update(servers.filter(id.eq(s.get_id())))
                                .set((
                                    version.eq(version + 1),
                                    name.eq(s.get_name()),
                                    host.eq(s.get_host()),
                                    port.eq(s.get_port() as i32),
                                    rcon_password.eq(s.get_rcon_password()),
                                    enabled_col.eq(s.is_enabled()),
                                    updated_at.eq(now),
                                ))
                                .execute(conn)?;
                        } else {
                            diesel::insert_into(servers)
                                .values((
                                    id.eq(s.get_id()),
                                    version.eq(0),
                                    name.eq(s.get_name()),
                                    host.eq(s.get_host()),
                                    port.eq(s.get_port() as i32),
                                    rcon_password.eq(s.get_rcon_password()),
                                    enabled_col.eq(s.is_enabled()),
                                    created_at.eq(now),
                                    updated_at.eq(now),
                                ))
                                .execute(conn)?;
                        }
                    }
                }
                let saved = load_server(conn, s.get_id())?.ok_or(DbError::NotFound)?;
                info!(new_version = ?saved.revision().version(), "save_ok");
                Ok(saved)
            })
        })
        .await
    }

    #[instrument(name = "db.server.delete", skip(self))]
    async fn delete_server(&self, server_id: &str) -> DbResult<()> {
        let sid = server_id.to_string();
        self.with_conn(move |conn| {
            tx(conn, |conn| {
                if server_in_use(conn, &sid)? {
                    return Err(DbError::InvariantViolation(format!(
                        "server {sid} is bound to a non-completed match"
                    ))
                    .into());
                }
                use schema::servers::dsl::{id, servers};
                let deleted = diesel::delete(servers.filter(id.eq(&sid))).execute(conn)?;
                if deleted == 0 {
                    return Err(DbError::NotFound.into());
                }
                debug!("delete_ok");
                Ok(())
            })
        })
        .await
    }

    #[instrument(name = "db.server.list", skip(self))]
    async fn list_servers(&self) -> DbResult<Vec<GameServer>> {
        self.with_conn(|conn| {
            use schema::servers::dsl::*;
            let rows = servers
                .order(id.asc())
                .load::<DbGameServer>(conn)
                .map_err(map_db_err)?;
            rows.into_iter().map(GameServer::try_from).collect()
        })
        .await
    }
}
