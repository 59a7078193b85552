//! implementation of the append-only event log port

use crate::{SqliteDb, json_from_text, json_to_text, map_db_err, schema, tx};
use app_core::{DbError, DbResult, DbpEvent, NewMatchEvent, StoredMatchEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::{debug, instrument};

#[derive(Debug, Queryable)]
pub struct DbMatchEvent {
    pub id: i64,
    pub match_slug: String,
    pub event_kind: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

impl TryFrom<DbMatchEvent> for StoredMatchEvent {
    type Error = DbError;

    fn try_from(r: DbMatchEvent) -> Result<Self, Self::Error> {
        Ok(StoredMatchEvent {
            id: r.id,
            match_slug: r.match_slug,
            event_kind: r.event_kind,
            payload: json_from_text(&r.payload)?,
            received_at: r.received_at,
        })
    }
}

#[async_trait]
impl DbpEvent for SqliteDb {
    #[instrument(
        name = "db.event.append",
        skip(self, event),
        fields(slug = %event.match_slug, kind = %event.event_kind)
    )]
    async fn append_event(&self, event: &NewMatchEvent) -> DbResult<i64> {
        let event = event.clone();
        self.with_conn(move |conn| {
            use schema::events::dsl::*;
            let body = json_to_text(&event.payload)?;
            tx(conn, |conn| {
                diesel::insert_into(events)
                    .values((
                        match_slug.eq(&event.match_slug),
                        event_kind.eq(&event.event_kind),
                        payload.eq(&body),
                        received_at.eq(event.received_at),
                    ))
                    .execute(conn)?;
                let new_id = events.select(diesel::dsl::max(id)).first::<Option<i64>>(conn)?;
                new_id.ok_or(DbError::NotFound).map_err(Into::into)
            })
        })
        .await
        .inspect(|new_id| debug!(id = new_id, "append_ok"))
    }

    #[instrument(name = "db.event.list", skip(self))]
    async fn list_events(
        &self,
        match_slug_arg: &str,
        after_id: Option<i64>,
        limit: Option<usize>,
    ) -> DbResult<Vec<StoredMatchEvent>> {
        let slug = match_slug_arg.to_string();
        self.with_conn(move |conn| {
            use schema::events::dsl::*;
            let mut query = events
                .filter(match_slug.eq(&slug))
                .into_boxed::<diesel::sqlite::Sqlite>();
            if let Some(after) = after_id {
                query = query.filter(id.gt(after));
            }
            if let Some(lim) = limit {
                query = query.limit(lim as i64);
            }
            let rows = query
                .order(id.asc())
                .load::<DbMatchEvent>(conn)
                .map_err(map_db_err)?;
            rows.into_iter().map(StoredMatchEvent::try_from).collect()
        })
        .await
    }

    #[instrument(name = "db.event.last_time", skip(self))]
    async fn last_event_time(&self, match_slug_arg: &str) -> DbResult<Option<DateTime<Utc>>> {
        let slug = match_slug_arg.to_string();
        self.with_conn(move |conn| {
            use schema::events::dsl::*;
            events
                .filter(match_slug.eq(&slug))
                .order(received_at.desc())
                .select(received_at)
                .first::<DateTime<Utc>>(conn)
                .optional()
                .map_err(map_db_err)
        })
        .await
    }

    #[instrument(name = "db.event.orphans", skip(self))]
    async fn orphan_event_slugs(&self) -> DbResult<Vec<String>> {
        self.with_conn(|conn| {
            use diesel::dsl::exists;
            use schema::{events, matches};
            events::table
                .filter(diesel::dsl::not(exists(
                    matches::table.filter(matches::slug.eq(events::match_slug)),
                )))
                .select(events::match_slug)
                .distinct()
                .order(events::match_slug.asc())
                .load::<String>(conn)
                .map_err(map_db_err)
        })
        .await
    }
}
