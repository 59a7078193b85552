//! Derived live state per match: connected players and running stats.
//!
//! The event log is the source of truth; a `LiveState` is rebuilt by
//! folding the log and is owned by the match's interpreter task. Handlers
//! only ever see snapshot clones.

use crate::{GameEventKind, Match, MatchStatus, NormalizedEvent, VetoActor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPlayer {
    pub steam_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<VetoActor>,
    pub connected_at: DateTime<Utc>,
    pub is_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLiveStats {
    pub steam_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<VetoActor>,
    pub kills: u32,
    pub deaths: u32,
    pub headshots: u32,
    pub mvps: u32,
}

/// Latest materialized snapshot served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    pub match_slug: String,
    pub team1_score: u32,
    pub team2_score: u32,
    pub team1_series_score: u32,
    pub team2_series_score: u32,
    pub round_number: u32,
    pub map_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_name: Option<String>,
    pub total_maps: u32,
    pub status: MatchStatus,
    pub player_stats: TeamedStats,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamedStats {
    pub team1: Vec<PlayerLiveStats>,
    pub team2: Vec<PlayerLiveStats>,
}

/// Interpreter-owned mutable live state for one match slug.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveState {
    match_slug: String,
    team1_score: u32,
    team2_score: u32,
    team1_series_score: u32,
    team2_series_score: u32,
    round_number: u32,
    map_number: u32,
    map_name: Option<String>,
    total_maps: u32,
    status: MatchStatus,
    connected: BTreeMap<String, ConnectedPlayer>,
    stats: BTreeMap<String, PlayerLiveStats>,
    last_event_at: Option<DateTime<Utc>>,
}

impl LiveState {
    pub fn new(match_slug: impl Into<String>) -> Self {
        LiveState {
            match_slug: match_slug.into(),
            team1_score: 0,
            team2_score: 0,
            team1_series_score: 0,
            team2_series_score: 0,
            round_number: 0,
            map_number: 0,
            map_name: None,
            total_maps: 0,
            status: MatchStatus::Pending,
            connected: BTreeMap::new(),
            stats: BTreeMap::new(),
            last_event_at: None,
        }
    }

    pub fn get_last_event_at(&self) -> Option<DateTime<Utc>> {
        self.last_event_at
    }

    pub fn connected_players(&self) -> Vec<ConnectedPlayer> {
        self.connected.values().cloned().collect()
    }

    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    /// Mirror persisted match fields into the snapshot.
    pub fn sync_match(&mut self, m: &Match) {
        self.status = m.get_status();
        self.team1_series_score = m.get_team1_series_score();
        self.team2_series_score = m.get_team2_series_score();
        self.team1_score = m.get_team1_score();
        self.team2_score = m.get_team2_score();
        self.total_maps = m.get_config().num_maps;
    }

    /// Fold one event into the live state.
    pub fn apply(&mut self, ev: &NormalizedEvent) {
        self.last_event_at = Some(ev.ts);
        match ev.kind() {
            GameEventKind::SeriesStart => {
                self.status = MatchStatus::Live;
                if let Some(n) = ev.num_maps {
                    self.total_maps = n;
                }
            }
            GameEventKind::SeriesEnd => {
                self.status = MatchStatus::Completed;
                if let Some(s) = ev.series_score1 {
                    self.team1_series_score = s;
                }
                if let Some(s) = ev.series_score2 {
                    self.team2_series_score = s;
                }
            }
            GameEventKind::MapResult => {
                if let Some(n) = ev.map_number {
                    self.map_number = n;
                }
                self.round_number = 0;
                self.team1_score = 0;
                self.team2_score = 0;
            }
            GameEventKind::GoingLive => {
                if let Some(map) = &ev.map_name {
                    self.map_name = Some(map.clone());
                }
                if let Some(n) = ev.map_number {
                    self.map_number = n;
                }
                self.round_number = 0;
            }
            GameEventKind::RoundEnd => {
                if let Some(n) = ev.round_number {
                    self.round_number = n;
                }
                if let Some(s) = ev.score1 {
                    self.team1_score = s;
                }
                if let Some(s) = ev.score2 {
                    self.team2_score = s;
                }
            }
            GameEventKind::RoundMvp => {
                if let Some(id) = &ev.steam_id {
                    let entry = self.stat_entry(id, ev);
                    entry.mvps += 1;
                }
            }
            GameEventKind::PlayerConnect => {
                if let Some(id) = &ev.steam_id {
                    self.connected.insert(
                        id.clone(),
                        ConnectedPlayer {
                            steam_id: id.clone(),
                            name: ev.player_name.clone().unwrap_or_else(|| id.clone()),
                            team: ev.actor_team,
                            connected_at: ev.ts,
                            is_ready: false,
                        },
                    );
                }
            }
            GameEventKind::PlayerDisconnect => {
                if let Some(id) = &ev.steam_id {
                    self.connected.remove(id);
                }
            }
            GameEventKind::PlayerDeath => {
                if let Some(attacker) = ev.attacker_steam_id.clone() {
                    let entry = self.stat_entry(&attacker, ev);
                    entry.kills += 1;
                    if ev.is_headshot == Some(true) {
                        entry.headshots += 1;
                    }
                }
                if let Some(victim) = ev.victim_steam_id.clone() {
                    let entry = self.stat_entry(&victim, ev);
                    entry.deaths += 1;
                }
            }
            GameEventKind::PlayerStatsUpdate => {
                // the plugin sends cumulative values: replace, never merge
                if let (Some(id), Some(stats)) = (&ev.steam_id, &ev.stats) {
                    let mut entry = PlayerLiveStats {
                        steam_id: id.clone(),
                        name: ev.player_name.clone().unwrap_or_else(|| id.clone()),
                        team: ev.actor_team,
                        ..Default::default()
                    };
                    entry.kills = stat_u32(stats, "kills");
                    entry.deaths = stat_u32(stats, "deaths");
                    entry.headshots = stat_u32(stats, "headshots");
                    entry.mvps = stat_u32(stats, "mvps");
                    self.stats.insert(id.clone(), entry);
                }
            }
            // statistic-only events and veto/unknown kinds leave the live
            // snapshot untouched
            _ => {}
        }
    }

    fn stat_entry(&mut self, steam_id: &str, ev: &NormalizedEvent) -> &mut PlayerLiveStats {
        let from_roster = self.connected.get(steam_id).map(|c| (c.name.clone(), c.team));
        self.stats
            .entry(steam_id.to_string())
            .or_insert_with(|| {
                let (name, team) = from_roster.unwrap_or((steam_id.to_string(), None));
                PlayerLiveStats {
                    steam_id: steam_id.to_string(),
                    name,
                    team,
                    ..Default::default()
                }
            })
    }

    /// Materialize the client-facing snapshot.
    pub fn snapshot(&self) -> LiveStats {
        let mut teamed = TeamedStats::default();
        for stat in self.stats.values() {
            match stat.team {
                Some(VetoActor::Team2) => teamed.team2.push(stat.clone()),
                // players without a resolved team are reported with team1,
                // mirroring the plugin's default side assignment
                _ => teamed.team1.push(stat.clone()),
            }
        }
        LiveStats {
            match_slug: self.match_slug.clone(),
            team1_score: self.team1_score,
            team2_score: self.team2_score,
            team1_series_score: self.team1_series_score,
            team2_series_score: self.team2_series_score,
            round_number: self.round_number,
            map_number: self.map_number,
            map_name: self.map_name.clone(),
            total_maps: self.total_maps,
            status: self.status,
            player_stats: teamed,
        }
    }
}

fn stat_u32(stats: &serde_json::Value, key: &str) -> u32 {
    stats.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32
}
