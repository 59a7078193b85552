//! implementation of the team port

use crate::{
    SqliteDb, enum_to_text, json_from_text, json_to_text, map_db_err, schema, tx,
};
use app_core::{
    DbError, DbResult, DbpTeam, MatchStatus, Player, Team,
    utils::revision::{ObjectRevision, Revision},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Queryable)]
pub struct DbTeam {
    pub id: String,
    pub version: i64,
    pub name: String,
    pub tag: String,
    pub discord_role_id: Option<String>,
    pub players: String,
    #[allow(dead_code)]
    pub created_at: DateTime<Utc>,
    #[allow(dead_code)]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbTeam> for Team {
    type Error = DbError;

    fn try_from(r: DbTeam) -> Result<Self, Self::Error> {
        let players: Vec<Player> = json_from_text(&r.players)?;
        let mut team = Team::with_id(r.id);
        team.set_name(r.name)
            .set_tag(r.tag)
            .set_discord_role_id(r.discord_role_id)
            .set_players(players);
        team.set_revision(Revision::Persisted(r.version));
        Ok(team)
    }
}

fn load_team(conn: &mut SqliteConnection, team_id: &str) -> DbResult<Option<Team>> {
    use schema::teams::dsl::*;
    let row = teams
        .filter(id.eq(team_id))
        .first::<DbTeam>(conn)
        .optional()
        .map_err(map_db_err)?;
    row.map(Team::try_from).transpose()
}

/// Non-completed matches referencing the team block deletion.
fn team_in_use(conn: &mut SqliteConnection, team_id: &str) -> DbResult<bool> {
    use schema::matches::dsl::*;
    let completed = enum_to_text(&MatchStatus::Completed)?;
    diesel::select(diesel::dsl::exists(
        matches.filter(
            status
                .ne(completed)
                .and(team1_id.eq(team_id).or(team2_id.eq(team_id))),
        ),
    ))
    .get_result::<bool>(conn)
    .map_err(map_db_err)
}

#[async_trait]
impl DbpTeam for SqliteDb {
    #[instrument(name = "db.team.get", skip(self))]
    async fn get_team(&self, team_id: &str) -> DbResult<Option<Team>> {
        let team_id = team_id.to_string();
        self.with_conn(move |conn| load_team(conn, &team_id)).await
    }

    #[instrument(
        name = "db.team.save",
        skip(self, team),
        fields(id = %team.get_id(), version = ?team.revision().version())
    )]
    async fn save_team(&self, team: &Team) -> DbResult<Team> {
        let t = team.clone();
        self.with_conn(move |conn| {
            use schema::teams::dsl::*;
            let w_players = json_to_text(&t.get_players())?;
            let now = Utc::now();
            tx(conn, |conn| {
                match t.revision().version() {
                    Some(expected) => {
                        let updated = diesel::update(
                            teams.filter(id.eq(t.get_id()).and(version.eq(expected))),
                        )
                        .set((
                            version.eq(expected + 1),
                            name.eq(t.get_name()),
                            tag.eq(t.get_tag()),
                            discord_role_id.eq(t.get_discord_role_id()),
                            players.eq(&w_players),
                            updated_at.eq(now),
                        ))
                        .execute(conn)?;
                        if updated == 0 {
                            let exists = diesel::select(diesel::dsl::exists(
                                teams.filter(id.eq(t.get_id())),
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
                        // upsert semantics for new payloads with a known id
                        let existing = diesel::select(diesel::dsl::exists(
                            teams.filter(id.eq(t.get_id())),
                        ))
                        .get_result::<bool>(conn)?;
                        if existing {
                            diesel::update(teams.filter(id.eq(t.get_id())))
                                .set((
                                    version.eq(version + 1),
                                    name.eq(t.get_name()),
                                    tag.eq(t.get_tag()),
                                    discord_role_id.eq(t.get_discord_role_id()),
                                    players.eq(&w_players),
                                    updated_at.eq(now),
                                ))
                                .execute(conn)?;
                        } else {
                            diesel::insert_into(teams)
                                .values((
                                    id.eq(t.get_id()),
                                    version.eq(0),
                                    name.eq(t.get_name()),
                                    tag.eq(t.get_tag()),
                                    discord_role_id.eq(t.get_discord_role_id()),
                                    players.eq(&w_players),
                                    created_at.eq(now),
                                    updated_at.eq(now),
                                ))
                                .execute(conn)?;
                        }
                    }
                }
                let saved = load_team(conn, t.get_id())?.ok_or(DbError::NotFound)?;
                info!(new_version = ?saved.revision().version(), "save_ok");
                Ok(saved)
            })
        })
        .await
    }

    #[instrument(name = "db.team.delete", skip(self))]
    async fn delete_team(&self, team_id: &str) -> DbResult<()> {
        let team_id = team_id.to_string();
        self.with_conn(move |conn| {
            tx(conn, |conn| {
                if team_in_use(conn, &team_id)? {
                    return Err(DbError::InvariantViolation(format!(
                        "team {team_id} is referenced by a non-completed match"
                    ))
                    .into());
                }
                use schema::teams::dsl::*;
                let deleted = diesel::delete(teams.filter(id.eq(&team_id))).execute(conn)?;
                if deleted == 0 {
                    return Err(DbError::NotFound.into());
                }
                debug!("delete_ok");
                Ok(())
            })
        })
        .await
    }

    #[instrument(name = "db.team.list", skip(self))]
    async fn list_teams(&self) -> DbResult<Vec<Team>> {
        self.with_conn(|conn| {
            use schema::teams::dsl::*;
            let rows = teams
                .order(name.asc())
                .load::<DbTeam>(conn)
                .map_err(map_db_err)?;
            rows.into_iter().map(Team::try_from).collect()
        })
        .await
    }
}
