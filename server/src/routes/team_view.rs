// public team-perspective views

use crate::error::{ApiError, ApiResult};
use app_core::{
    CoreError, Match, MatchFilter, MatchStatus, TournamentStatus, VetoActor, bracket,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shared::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamServerInfo {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMatchView {
    #[serde(rename = "match")]
    pub current: Match,
    pub is_team1: bool,
    pub tournament_status: TournamentStatus,
    /// connect info is visible only once the match holds a server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<TeamServerInfo>,
}

fn status_rank(status: MatchStatus) -> u8 {
    match status {
        MatchStatus::Live => 0,
        MatchStatus::Loaded => 1,
        MatchStatus::Ready => 2,
        MatchStatus::Pending => 3,
        MatchStatus::Completed => 4,
    }
}

/// The team's current match: the most advanced non-completed match the
/// team appears in.
pub async fn current_match(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> ApiResult<Json<TeamMatchView>> {
    let tournament_status = state
        .core
        .get_tournament()
        .await?
        .map(|t| t.get_status())
        .unwrap_or_default();

    let mut matches = state
        .core
        .list_matches(&MatchFilter {
            team_id: Some(team_id.clone()),
            ..Default::default()
        })
        .await?;
    matches.retain(|m| m.get_status() != MatchStatus::Completed);
    matches.sort_by_key(|m| (status_rank(m.get_status()), m.get_round()));
    let current = matches
        .into_iter()
        .next()
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("no open match for {team_id}"))))?;

    let is_team1 = current.side_of(&team_id) == Some(VetoActor::Team1);
    let server = match (current.get_status(), current.get_server_id()) {
        (MatchStatus::Loaded | MatchStatus::Live, Some(server_id)) => state
            .core
            .get_server(server_id)
            .await?
            .map(|s| TeamServerInfo {
                id: s.get_id().to_string(),
                name: s.get_name().to_string(),
                host: s.get_host().to_string(),
                port: s.get_port(),
            }),
        _ => None,
    };

    Ok(Json(TeamMatchView {
        current,
        is_team1,
        tournament_status,
        server,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn history(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<Match>>> {
    let mut matches = state
        .core
        .list_matches(&MatchFilter {
            team_id: Some(team_id),
            status: Some(MatchStatus::Completed),
            ..Default::default()
        })
        .await?;
    matches.sort_by_key(|m| std::cmp::Reverse(m.get_completed_at()));
    if let Some(limit) = query.limit {
        matches.truncate(limit);
    }
    Ok(Json(matches))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStatsView {
    pub team_id: String,
    pub wins: u32,
    pub losses: u32,
    pub matches_played: usize,
    pub maps_won: u32,
    pub maps_lost: u32,
}

pub async fn stats(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> ApiResult<Json<TeamStatsView>> {
    let tournament = state
        .core
        .get_tournament()
        .await?
        .ok_or_else(|| ApiError(CoreError::NotFound("tournament".into())))?;
    let matches = state
        .core
        .list_matches(&MatchFilter {
            team_id: Some(team_id.clone()),
            ..Default::default()
        })
        .await?;

    let standing = bracket::standings(&tournament, &matches)
        .into_iter()
        .find(|row| row.team_id == team_id)
        .ok_or_else(|| ApiError(CoreError::NotFound(format!("team {team_id}"))))?;

    let mut maps_won = 0;
    let mut maps_lost = 0;
    let mut matches_played = 0;
    for m in matches
        .iter()
        .filter(|m| m.get_status() == MatchStatus::Completed && !m.is_bye())
    {
        matches_played += 1;
        let (own, other) = match m.side_of(&team_id) {
            Some(VetoActor::Team1) => (m.get_team1_series_score(), m.get_team2_series_score()),
            Some(VetoActor::Team2) => (m.get_team2_series_score(), m.get_team1_series_score()),
            None => continue,
        };
        maps_won += own;
        maps_lost += other;
    }

    Ok(Json(TeamStatsView {
        team_id,
        wins: standing.wins,
        losses: standing.losses,
        matches_played,
        maps_won,
        maps_lost,
    }))
}
