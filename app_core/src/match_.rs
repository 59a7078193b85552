//! Matches and their lifecycle.
//!
//! Status only ever moves `pending -> ready -> loaded -> live -> completed`
//! (resets excepted); the mutating methods below are the sole legal
//! transitions and everything else returns a conflict.

use crate::{
    Core, CoreError, CoreResult, DbpMatch, MatchFilter, Player, SeriesFormat, VetoActor,
    VetoState,
    utils::revision::{ObjectRevision, Revision},
};
use chrono::{DateTime, Utc};
use displaydoc::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// pending
    #[default]
    Pending,
    /// ready
    Ready,
    /// loaded
    Loaded,
    /// live
    Live,
    /// completed
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// none
    #[default]
    None,
    /// warmup
    Warmup,
    /// knife
    Knife,
    /// veto
    Veto,
    /// live
    Live,
    /// post match
    PostMatch,
}

pub const DEFAULT_PLAYERS_PER_TEAM: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigTeam {
    pub name: String,
    pub players: Vec<Player>,
}

/// Frozen match configuration pushed to the plugin at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    pub maplist: Vec<String>,
    pub num_maps: u32,
    pub players_per_team: u32,
    pub expected_players_total: u32,
    pub team1: ConfigTeam,
    pub team2: ConfigTeam,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            maplist: Vec::new(),
            num_maps: 0,
            players_per_team: DEFAULT_PLAYERS_PER_TEAM,
            expected_players_total: DEFAULT_PLAYERS_PER_TEAM * 2,
            team1: ConfigTeam::default(),
            team2: ConfigTeam::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapResult {
    pub map_number: u32,
    pub map_name: String,
    pub team1_score: u32,
    pub team2_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_file_path: Option<String>,
}

/// Canonical external id of a match.
pub fn slug_for(team1: Option<&str>, team2: Option<&str>, bracket_tag: &str) -> String {
    match (team1, team2) {
        (Some(a), Some(b)) => format!("{a}_vs_{b}"),
        (Some(a), None) => format!("{a}_vs_null"),
        (None, Some(b)) => format!("null_vs_{b}"),
        (None, None) => bracket_tag.to_string(),
    }
}

/// A match. Created by the scheduler, mutated only through the state
/// machine and the allocator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    slug: String,
    #[serde(skip)]
    revision: Revision,
    round: u32,
    match_number: u32,
    bracket_tag: String,
    team1_id: Option<String>,
    team2_id: Option<String>,
    winner_id: Option<String>,
    server_id: Option<String>,
    status: MatchStatus,
    match_phase: MatchPhase,
    veto_completed: bool,
    veto: VetoState,
    config: MatchConfig,
    map_results: Vec<MapResult>,
    team1_score: u32,
    team2_score: u32,
    team1_series_score: u32,
    team2_series_score: u32,
    demo_file_paths: Vec<String>,
    #[serde(skip)]
    last_applied_event_id: i64,
    created_at: DateTime<Utc>,
    ready_at: Option<DateTime<Utc>>,
    loaded_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl ObjectRevision for Match {
    fn revision(&self) -> Revision {
        self.revision
    }
    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }
}

impl Match {
    pub fn new(
        round: u32,
        match_number: u32,
        bracket_tag: impl Into<String>,
        team1_id: Option<String>,
        team2_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let bracket_tag = bracket_tag.into();
        let slug = slug_for(team1_id.as_deref(), team2_id.as_deref(), &bracket_tag);
        Match {
            slug,
            revision: Revision::New,
            round,
            match_number,
            bracket_tag,
            team1_id,
            team2_id,
            winner_id: None,
            server_id: None,
            status: MatchStatus::Pending,
            match_phase: MatchPhase::None,
            veto_completed: false,
            veto: VetoState::default(),
            config: MatchConfig::default(),
            map_results: Vec::new(),
            team1_score: 0,
            team2_score: 0,
            team1_series_score: 0,
            team2_series_score: 0,
            demo_file_paths: Vec::new(),
            last_applied_event_id: 0,
            created_at: now,
            ready_at: None,
            loaded_at: None,
            completed_at: None,
        }
    }

    pub fn get_slug(&self) -> &str {
        &self.slug
    }
    pub fn get_round(&self) -> u32 {
        self.round
    }
    pub fn get_match_number(&self) -> u32 {
        self.match_number
    }
    pub fn get_bracket_tag(&self) -> &str {
        &self.bracket_tag
    }
    pub fn get_team1_id(&self) -> Option<&str> {
        self.team1_id.as_deref()
    }
    pub fn get_team2_id(&self) -> Option<&str> {
        self.team2_id.as_deref()
    }
    pub fn get_winner_id(&self) -> Option<&str> {
        self.winner_id.as_deref()
    }
    pub fn get_server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }
    pub fn get_status(&self) -> MatchStatus {
        self.status
    }
    pub fn get_phase(&self) -> MatchPhase {
        self.match_phase
    }
    pub fn is_veto_completed(&self) -> bool {
        self.veto_completed
    }
    pub fn get_veto(&self) -> &VetoState {
        &self.veto
    }
    pub fn get_config(&self) -> &MatchConfig {
        &self.config
    }
    pub fn get_map_results(&self) -> &[MapResult] {
        &self.map_results
    }
    pub fn get_team1_score(&self) -> u32 {
        self.team1_score
    }
    pub fn get_team2_score(&self) -> u32 {
        self.team2_score
    }
    pub fn get_team1_series_score(&self) -> u32 {
        self.team1_series_score
    }
    pub fn get_team2_series_score(&self) -> u32 {
        self.team2_series_score
    }
    pub fn get_demo_file_paths(&self) -> &[String] {
        &self.demo_file_paths
    }
    pub fn get_last_applied_event_id(&self) -> i64 {
        self.last_applied_event_id
    }
    pub fn get_created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    pub fn get_ready_at(&self) -> Option<DateTime<Utc>> {
        self.ready_at
    }
    pub fn get_loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
    pub fn get_completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Exactly one slot occupied: the opponent is known absent.
    pub fn is_bye(&self) -> bool {
        self.team1_id.is_some() ^ self.team2_id.is_some()
    }

    pub fn team_id_of(&self, actor: VetoActor) -> Option<&str> {
        match actor {
            VetoActor::Team1 => self.get_team1_id(),
            VetoActor::Team2 => self.get_team2_id(),
        }
    }

    /// Which side a team plays on, if it plays in this match.
    pub fn side_of(&self, team_id: &str) -> Option<VetoActor> {
        if self.get_team1_id() == Some(team_id) {
            Some(VetoActor::Team1)
        } else if self.get_team2_id() == Some(team_id) {
            Some(VetoActor::Team2)
        } else {
            None
        }
    }

    /// Relabel the bracket tag (e.g. the last round becomes "final"). The
    /// slug never follows; it is the stable external id.
    pub fn set_bracket_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.bracket_tag = tag.into();
        self
    }

    /// Fill an empty slot during bracket advancement. The slug stays as
    /// generated; it is the stable external id.
    pub fn assign_slot(&mut self, slot: VetoActor, team_id: impl Into<String>) -> CoreResult<()> {
        let target = match slot {
            VetoActor::Team1 => &mut self.team1_id,
            VetoActor::Team2 => &mut self.team2_id,
        };
        if target.is_some() {
            return Err(CoreError::Conflict(format!(
                "slot {slot} of {} already filled",
                self.slug
            )));
        }
        *target = Some(team_id.into());
        Ok(())
    }

    /// `pending -> ready` once both slots are resolved; opens the veto.
    pub fn make_ready(
        &mut self,
        format: SeriesFormat,
        map_pool: &[String],
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if self.status != MatchStatus::Pending {
            return Err(self.transition_conflict("ready"));
        }
        if self.team1_id.is_none() || self.team2_id.is_none() {
            return Err(CoreError::Conflict(format!(
                "match {} has unresolved slots",
                self.slug
            )));
        }
        self.status = MatchStatus::Ready;
        self.ready_at = Some(now);
        self.match_phase = MatchPhase::Veto;
        self.veto = VetoState::new(format, map_pool);
        self.veto_completed = self.veto.is_complete();
        Ok(())
    }

    /// `pending -> ready` for a bye; no veto, completed by the walkover
    /// sweep.
    pub fn make_ready_bye(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != MatchStatus::Pending {
            return Err(self.transition_conflict("ready"));
        }
        if !self.is_bye() {
            return Err(CoreError::Conflict(format!(
                "match {} is not a bye",
                self.slug
            )));
        }
        self.status = MatchStatus::Ready;
        self.ready_at = Some(now);
        Ok(())
    }

    /// Walkover: completed with the occupied slot as winner, no server, no
    /// demos.
    pub fn complete_walkover(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != MatchStatus::Ready || !self.is_bye() {
            return Err(CoreError::Conflict(format!(
                "match {} is not a walkover candidate",
                self.slug
            )));
        }
        self.winner_id = self.team1_id.clone().or_else(|| self.team2_id.clone());
        self.status = MatchStatus::Completed;
        self.completed_at = Some(now);
        self.demo_file_paths.clear();
        Ok(())
    }

    pub fn veto_mut(&mut self) -> &mut VetoState {
        &mut self.veto
    }

    /// Re-sync the cached veto flag after mutating the veto state.
    pub fn sync_veto_completed(&mut self) {
        self.veto_completed = self.veto.is_complete();
    }

    pub fn set_config(&mut self, config: MatchConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// `ready -> loaded`: bind a server after a completed veto.
    pub fn mark_loaded(&mut self, server_id: impl Into<String>, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != MatchStatus::Ready {
            return Err(self.transition_conflict("loaded"));
        }
        if !self.veto_completed {
            return Err(CoreError::Conflict(format!(
                "match {} veto incomplete",
                self.slug
            )));
        }
        self.server_id = Some(server_id.into());
        self.status = MatchStatus::Loaded;
        self.loaded_at = Some(now);
        self.match_phase = MatchPhase::Warmup;
        Ok(())
    }

    /// Demote `loaded -> ready`, releasing the server (failed push, probe
    /// failure).
    pub fn revert_to_ready(&mut self) -> CoreResult<()> {
        if self.status != MatchStatus::Loaded {
            return Err(self.transition_conflict("ready"));
        }
        self.server_id = None;
        self.loaded_at = None;
        self.status = MatchStatus::Ready;
        self.match_phase = MatchPhase::Veto;
        Ok(())
    }

    /// `loaded -> live` on series start.
    pub fn begin_live(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != MatchStatus::Loaded {
            return Err(self.transition_conflict("live"));
        }
        if self.loaded_at.is_none() {
            self.loaded_at = Some(now);
        }
        self.status = MatchStatus::Live;
        self.match_phase = MatchPhase::Live;
        Ok(())
    }

    pub fn set_phase(&mut self, phase: MatchPhase) -> &mut Self {
        self.match_phase = phase;
        self
    }

    /// Running score of the current map.
    pub fn set_round_score(&mut self, team1: u32, team2: u32) -> &mut Self {
        self.team1_score = team1;
        self.team2_score = team2;
        self
    }

    /// Record a finished map. A result for an already-recorded map number
    /// replaces it and the series score is recomputed, so re-posted events
    /// cannot double count.
    pub fn record_map_result(&mut self, result: MapResult) {
        match self
            .map_results
            .iter_mut()
            .find(|r| r.map_number == result.map_number)
        {
            Some(existing) => *existing = result,
            None => {
                self.map_results.push(result);
                self.map_results.sort_by_key(|r| r.map_number);
            }
        }
        self.team1_series_score = self
            .map_results
            .iter()
            .filter(|r| r.team1_score > r.team2_score)
            .count() as u32;
        self.team2_series_score = self
            .map_results
            .iter()
            .filter(|r| r.team2_score > r.team1_score)
            .count() as u32;
    }

    pub fn add_demo_file(&mut self, path: impl Into<String>) -> &mut Self {
        self.demo_file_paths.push(path.into());
        self
    }

    /// Winner by series score, if not tied.
    pub fn winner_from_series(&self) -> Option<VetoActor> {
        match self
            .team1_series_score
            .cmp(&self.team2_series_score)
        {
            std::cmp::Ordering::Greater => Some(VetoActor::Team1),
            std::cmp::Ordering::Less => Some(VetoActor::Team2),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// `live -> completed`. The server binding is dropped here so a
    /// completed match never holds a server.
    pub fn complete_series(&mut self, winner: VetoActor, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != MatchStatus::Live {
            return Err(self.transition_conflict("completed"));
        }
        let winner_id = self
            .team_id_of(winner)
            .ok_or_else(|| CoreError::Conflict(format!("{winner} slot is empty")))?
            .to_string();
        self.winner_id = Some(winner_id);
        self.server_id = None;
        self.status = MatchStatus::Completed;
        self.match_phase = MatchPhase::PostMatch;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Unbind without touching status; repair path for rows that ended up
    /// completed while still holding a server.
    pub fn clear_server(&mut self) -> &mut Self {
        self.server_id = None;
        self
    }

    pub fn set_last_applied_event_id(&mut self, id: i64) -> &mut Self {
        self.last_applied_event_id = id;
        self
    }

    fn transition_conflict(&self, target: &str) -> CoreError {
        CoreError::Conflict(match self.status {
            MatchStatus::Live => format!("match {} not eligible for {target}: already live", self.slug),
            status => format!("match {} is {status}, cannot become {target}", self.slug),
        })
    }

    // store round-trip constructors; adapters rebuild matches field by field
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        slug: String,
        revision: Revision,
        round: u32,
        match_number: u32,
        bracket_tag: String,
        team1_id: Option<String>,
        team2_id: Option<String>,
        winner_id: Option<String>,
        server_id: Option<String>,
        status: MatchStatus,
        match_phase: MatchPhase,
        veto: VetoState,
        config: MatchConfig,
        map_results: Vec<MapResult>,
        scores: (u32, u32, u32, u32),
        demo_file_paths: Vec<String>,
        last_applied_event_id: i64,
        created_at: DateTime<Utc>,
        ready_at: Option<DateTime<Utc>>,
        loaded_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        let veto_completed = veto.is_complete();
        let (team1_score, team2_score, team1_series_score, team2_series_score) = scores;
        Match {
            slug,
            revision,
            round,
            match_number,
            bracket_tag,
            team1_id,
            team2_id,
            winner_id,
            server_id,
            status,
            match_phase,
            veto_completed,
            veto,
            config,
            map_results,
            team1_score,
            team2_score,
            team1_series_score,
            team2_series_score,
            demo_file_paths,
            last_applied_event_id,
            created_at,
            ready_at,
            loaded_at,
            completed_at,
        }
    }
}

impl Core {
    pub async fn get_match(&self, slug: &str) -> CoreResult<Option<Match>> {
        Ok(self.database.get_match(slug).await?)
    }

    pub async fn list_matches(&self, filter: &MatchFilter) -> CoreResult<Vec<Match>> {
        Ok(self.database.list_matches(filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SeriesFormat;

    fn pool() -> Vec<String> {
        vec!["de_mirage".into(), "de_inferno".into(), "de_ancient".into()]
    }

    fn ready_match(now: DateTime<Utc>) -> Match {
        let mut m = Match::new(1, 1, "wb-r1-m1", Some("a".into()), Some("b".into()), now);
        m.make_ready(SeriesFormat::Bo1, &pool(), now).unwrap();
        m
    }

    #[test]
    fn slug_variants() {
        assert_eq!(slug_for(Some("a"), Some("b"), "wb-r1-m1"), "a_vs_b");
        assert_eq!(slug_for(Some("a"), None, "wb-r1-m1"), "a_vs_null");
        assert_eq!(slug_for(None, None, "wb-r2-m1"), "wb-r2-m1");
    }

    #[test]
    fn lifecycle_happy_path() {
        let now = Utc::now();
        let mut m = ready_match(now);
        // bo1 over three maps: auto-resolve the veto
        while !m.get_veto().is_complete() {
            m.veto_mut().auto_act(now).unwrap();
        }
        m.sync_veto_completed();
        m.mark_loaded("s1", now).unwrap();
        assert_eq!(m.get_status(), MatchStatus::Loaded);
        m.begin_live(now).unwrap();
        m.record_map_result(MapResult {
            map_number: 0,
            map_name: "de_ancient".into(),
            team1_score: 13,
            team2_score: 7,
            demo_file_path: None,
        });
        assert_eq!(m.get_team1_series_score(), 1);
        m.complete_series(VetoActor::Team1, now).unwrap();
        assert_eq!(m.get_status(), MatchStatus::Completed);
        assert_eq!(m.get_winner_id(), Some("a"));
        // completed matches never hold a server
        assert_eq!(m.get_server_id(), None);
    }

    #[test]
    fn loading_requires_completed_veto() {
        let now = Utc::now();
        let mut m = ready_match(now);
        let err = m.mark_loaded("s1", now).unwrap_err();
        assert!(err.to_string().contains("veto incomplete"));
    }

    #[test]
    fn walkover_completes_with_the_occupied_slot() {
        let now = Utc::now();
        let mut m = Match::new(1, 1, "wb-r1-m1", Some("a".into()), None, now);
        assert_eq!(m.get_slug(), "a_vs_null");
        m.make_ready_bye(now).unwrap();
        m.complete_walkover(now).unwrap();
        assert_eq!(m.get_status(), MatchStatus::Completed);
        assert_eq!(m.get_winner_id(), Some("a"));
        assert!(m.get_demo_file_paths().is_empty());
    }

    #[test]
    fn repeated_map_result_does_not_double_count() {
        let now = Utc::now();
        let mut m = ready_match(now);
        while !m.get_veto().is_complete() {
            m.veto_mut().auto_act(now).unwrap();
        }
        m.sync_veto_completed();
        m.mark_loaded("s1", now).unwrap();
        m.begin_live(now).unwrap();
        let result = MapResult {
            map_number: 0,
            map_name: "de_ancient".into(),
            team1_score: 13,
            team2_score: 11,
            demo_file_path: None,
        };
        m.record_map_result(result.clone());
        m.record_map_result(result);
        assert_eq!(m.get_team1_series_score(), 1);
        assert_eq!(m.get_team2_series_score(), 0);
    }

    #[test]
    fn completing_a_non_live_match_is_a_conflict() {
        let now = Utc::now();
        let mut m = ready_match(now);
        let err = m.complete_series(VetoActor::Team1, now).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn slot_assignment_rejects_filled_slots() {
        let now = Utc::now();
        let mut m = Match::new(2, 1, "wb-r2-m1", None, None, now);
        m.assign_slot(VetoActor::Team1, "a").unwrap();
        assert!(m.assign_slot(VetoActor::Team1, "b").is_err());
        m.assign_slot(VetoActor::Team2, "b").unwrap();
        assert_eq!(m.get_slug(), "wb-r2-m1");
    }
}
