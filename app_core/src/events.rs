//! Webhook events: the append-only log rows and the normalization of raw
//! plugin payloads into canonical events.
//!
//! Normalization is the only place that knows about the plugin's ad-hoc
//! JSON shapes; everything downstream sees `NormalizedEvent`.

use crate::{Player, SideChoice, VetoActor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical event kinds. Anything else stays `Unknown` and is stored but
/// never interpreted, which keeps old cores forward compatible with newer
/// plugins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEventKind {
    SeriesStart,
    SeriesEnd,
    MapResult,
    MapPicked,
    MapVetoed,
    SidePicked,
    GoingLive,
    RoundEnd,
    RoundMvp,
    PlayerConnect,
    PlayerDisconnect,
    PlayerDeath,
    PlayerStatsUpdate,
    BombPlanted,
    BombDefused,
    BombExploded,
    Unknown(String),
}

impl GameEventKind {
    pub fn parse(raw: &str) -> GameEventKind {
        use GameEventKind::*;
        match raw {
            "series_start" => SeriesStart,
            "series_end" => SeriesEnd,
            "map_result" => MapResult,
            "map_picked" => MapPicked,
            "map_vetoed" => MapVetoed,
            "side_picked" => SidePicked,
            "going_live" => GoingLive,
            "round_end" => RoundEnd,
            "round_mvp" => RoundMvp,
            "player_connect" => PlayerConnect,
            "player_disconnect" => PlayerDisconnect,
            "player_death" => PlayerDeath,
            "player_stats_update" => PlayerStatsUpdate,
            "bomb_planted" => BombPlanted,
            "bomb_defused" => BombDefused,
            "bomb_exploded" => BombExploded,
            other => Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        use GameEventKind::*;
        match self {
            SeriesStart => "series_start",
            SeriesEnd => "series_end",
            MapResult => "map_result",
            MapPicked => "map_picked",
            MapVetoed => "map_vetoed",
            SidePicked => "side_picked",
            GoingLive => "going_live",
            RoundEnd => "round_end",
            RoundMvp => "round_mvp",
            PlayerConnect => "player_connect",
            PlayerDisconnect => "player_disconnect",
            PlayerDeath => "player_death",
            PlayerStatsUpdate => "player_stats_update",
            BombPlanted => "bomb_planted",
            BombDefused => "bomb_defused",
            BombExploded => "bomb_exploded",
            Unknown(s) => s,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, GameEventKind::Unknown(_))
    }
}

/// New event about to be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMatchEvent {
    pub match_slug: String,
    pub event_kind: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// Stored event log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMatchEvent {
    pub id: i64,
    pub match_slug: String,
    pub event_kind: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// Canonical event, source-shape free.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedEvent {
    pub match_slug: String,
    pub kind_raw: String,
    pub actor_team: Option<VetoActor>,
    pub winner: Option<VetoActor>,
    pub map_name: Option<String>,
    pub map_number: Option<u32>,
    pub score1: Option<u32>,
    pub score2: Option<u32>,
    pub series_score1: Option<u32>,
    pub series_score2: Option<u32>,
    pub round_number: Option<u32>,
    pub num_maps: Option<u32>,
    pub team1_name: Option<String>,
    pub team2_name: Option<String>,
    pub side: Option<SideChoice>,
    pub steam_id: Option<String>,
    pub player_name: Option<String>,
    pub attacker_steam_id: Option<String>,
    pub victim_steam_id: Option<String>,
    pub weapon: Option<String>,
    pub is_headshot: Option<bool>,
    pub stats: Option<Value>,
    pub demo_file_path: Option<String>,
    pub ts: DateTime<Utc>,
}

impl NormalizedEvent {
    pub fn kind(&self) -> GameEventKind {
        GameEventKind::parse(&self.kind_raw)
    }
}

fn get_field<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| raw.get(k))
}

fn get_str(raw: &Value, keys: &[&str]) -> Option<String> {
    let v = get_field(raw, keys)?;
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn get_u32(raw: &Value, keys: &[&str]) -> Option<u32> {
    let v = get_field(raw, keys)?;
    match v {
        Value::Number(n) => n.as_u64().map(|n| n as u32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn get_bool(raw: &Value, keys: &[&str]) -> Option<bool> {
    let v = get_field(raw, keys)?;
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_u64().unwrap_or(0) != 0),
        _ => None,
    }
}

fn parse_team_ref(v: &Value) -> Option<VetoActor> {
    match v {
        Value::String(s) => match s.as_str() {
            "team1" | "1" => Some(VetoActor::Team1),
            "team2" | "2" => Some(VetoActor::Team2),
            _ => None,
        },
        Value::Number(n) => match n.as_u64() {
            Some(1) => Some(VetoActor::Team1),
            Some(2) => Some(VetoActor::Team2),
            _ => None,
        },
        // e.g. {"team": "team1"} as MatchZy sends for winners
        Value::Object(_) => v.get("team").and_then(parse_team_ref),
        _ => None,
    }
}

fn get_team_ref(raw: &Value, keys: &[&str]) -> Option<VetoActor> {
    get_field(raw, keys).and_then(parse_team_ref)
}

fn parse_side(raw: &Value, keys: &[&str]) -> Option<SideChoice> {
    match get_str(raw, keys)?.to_ascii_lowercase().as_str() {
        "ct" => Some(SideChoice::Ct),
        "t" => Some(SideChoice::T),
        _ => None,
    }
}

/// Slug used when the payload carries no match id at all. Such events are
/// stored as orphans and never interpreted.
pub const UNKNOWN_SLUG: &str = "unknown";

/// Normalize a raw webhook payload. Never fails; missing fields stay empty
/// and an unrecognized event name maps to `Unknown`.
pub fn normalize_event(raw: &Value, received_at: DateTime<Utc>) -> NormalizedEvent {
    let match_slug = get_str(raw, &["matchid", "match_id", "matchSlug"])
        .unwrap_or_else(|| UNKNOWN_SLUG.to_string());
    let kind_raw = get_str(raw, &["event", "eventKind", "kind"]).unwrap_or_default();

    let ts = get_str(raw, &["timestamp", "time"])
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(received_at);

    NormalizedEvent {
        match_slug,
        kind_raw,
        actor_team: get_team_ref(raw, &["team", "actor", "actorTeam"]),
        winner: get_team_ref(raw, &["winner"]),
        map_name: get_str(raw, &["map_name", "map", "mapName"]),
        map_number: get_u32(raw, &["map_number", "mapNumber"]),
        score1: get_u32(raw, &["team1_score", "score1"]).or_else(|| nested_score(raw, "team1")),
        score2: get_u32(raw, &["team2_score", "score2"]).or_else(|| nested_score(raw, "team2")),
        series_score1: get_u32(raw, &["team1_series_score", "seriesScore1"])
            .or_else(|| nested_series_score(raw, "team1")),
        series_score2: get_u32(raw, &["team2_series_score", "seriesScore2"])
            .or_else(|| nested_series_score(raw, "team2")),
        round_number: get_u32(raw, &["round_number", "roundNumber", "round"]),
        num_maps: get_u32(raw, &["num_maps", "numMaps"]),
        team1_name: get_str(raw, &["team1_name"])
            .or_else(|| raw.get("team1").and_then(|t| get_str(t, &["name"]))),
        team2_name: get_str(raw, &["team2_name"])
            .or_else(|| raw.get("team2").and_then(|t| get_str(t, &["name"]))),
        side: parse_side(raw, &["side", "sideChoice"]),
        steam_id: get_str(raw, &["steamid", "steamId", "steam_id"])
            .or_else(|| raw.get("player").and_then(|p| get_str(p, &["steamid", "steamId"]))),
        player_name: get_str(raw, &["name", "player_name"])
            .or_else(|| raw.get("player").and_then(|p| get_str(p, &["name"]))),
        attacker_steam_id: get_str(raw, &["attacker", "attacker_steamid"])
            .or_else(|| raw.get("attacker").and_then(|p| get_str(p, &["steamid", "steamId"]))),
        victim_steam_id: get_str(raw, &["victim", "victim_steamid"])
            .or_else(|| raw.get("victim").and_then(|p| get_str(p, &["steamid", "steamId"]))),
        weapon: get_str(raw, &["weapon"]),
        is_headshot: get_bool(raw, &["headshot", "is_headshot", "isHeadshot"]),
        stats: get_field(raw, &["stats", "player_stats"]).cloned(),
        demo_file_path: get_str(raw, &["demo_file", "demoFile", "filename"]),
        ts,
    }
}

fn nested_score(raw: &Value, team: &str) -> Option<u32> {
    get_u32(raw.get(team)?, &["score"])
}

fn nested_series_score(raw: &Value, team: &str) -> Option<u32> {
    get_u32(raw.get(team)?, &["series_score", "seriesScore"])
}

/// Normalize the many player-list shapes the plugin and older tooling emit
/// into the canonical roster representation. Returns the players plus
/// warnings for degraded entries (no steam id anywhere; a placeholder id
/// is synthesized).
pub fn normalize_players(raw: &Value) -> (Vec<Player>, Vec<String>) {
    let mut players = Vec::new();
    let mut warnings = Vec::new();

    let entries: Vec<(usize, &Value)> = match raw {
        Value::Array(items) => items.iter().enumerate().collect(),
        // {"0": {...}, "1": {...}} keyed by index
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|(a, _), (b, _)| {
                match (a.parse::<usize>(), b.parse::<usize>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => a.cmp(b),
                }
            });
            sorted
                .into_iter()
                .enumerate()
                .map(|(idx, (_, v))| (idx, v))
                .collect()
        }
        _ => Vec::new(),
    };

    for (idx, entry) in entries {
        match entry {
            Value::String(s) if !s.is_empty() => {
                players.push(Player::new(s.clone(), s.clone()));
            }
            Value::Object(_) => {
                let steam_id = get_str(entry, &["steamid", "steamId", "steam_id"]).or_else(|| {
                    entry
                        .get("name")
                        .and_then(|n| get_str(n, &["steamId", "steamid"]))
                });
                let name = match entry.get("name") {
                    Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                    Some(Value::Object(_)) => {
                        entry.get("name").and_then(|n| get_str(n, &["name"]))
                    }
                    _ => get_str(entry, &["displayName", "display_name"]),
                };
                match steam_id {
                    Some(id) => {
                        let name = name.unwrap_or_else(|| id.clone());
                        players.push(Player::new(id, name));
                    }
                    None => {
                        let placeholder = format!("player_{idx}");
                        warnings.push(format!(
                            "player entry {idx} has no steam id, synthesized {placeholder}"
                        ));
                        let name = name.unwrap_or_else(|| placeholder.clone());
                        players.push(Player::new(placeholder, name));
                    }
                }
            }
            _ => {
                warnings.push(format!("player entry {idx} has an unusable shape"));
            }
        }
    }

    (players, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_round_trips_and_keeps_unknown_names() {
        assert_eq!(GameEventKind::parse("series_start"), GameEventKind::SeriesStart);
        let unknown = GameEventKind::parse("grenade_thrown");
        assert!(unknown.is_unknown());
        assert_eq!(unknown.as_str(), "grenade_thrown");
    }

    #[test]
    fn normalizes_a_matchzy_round_end() {
        let raw = json!({
            "event": "round_end",
            "matchid": "a_vs_b",
            "round_number": 7,
            "team1": {"score": 4},
            "team2": {"score": 3},
            "winner": {"team": "team1"}
        });
        let ev = normalize_event(&raw, Utc::now());
        assert_eq!(ev.match_slug, "a_vs_b");
        assert_eq!(ev.kind(), GameEventKind::RoundEnd);
        assert_eq!(ev.round_number, Some(7));
        assert_eq!(ev.score1, Some(4));
        assert_eq!(ev.score2, Some(3));
        assert_eq!(ev.winner, Some(VetoActor::Team1));
    }

    #[test]
    fn numeric_matchid_becomes_a_string_slug() {
        let raw = json!({"event": "going_live", "matchid": 42, "map_name": "de_nuke"});
        let ev = normalize_event(&raw, Utc::now());
        assert_eq!(ev.match_slug, "42");
        assert_eq!(ev.map_name.as_deref(), Some("de_nuke"));
    }

    #[test]
    fn missing_matchid_maps_to_the_orphan_slug() {
        let ev = normalize_event(&json!({"event": "round_end"}), Utc::now());
        assert_eq!(ev.match_slug, UNKNOWN_SLUG);
    }

    #[test]
    fn player_death_extracts_both_sides() {
        let raw = json!({
            "event": "player_death",
            "matchid": "a_vs_b",
            "attacker": {"steamid": "76561198000000001", "name": "alpha"},
            "victim": {"steamid": "76561198000000002", "name": "bravo"},
            "weapon": "ak47",
            "headshot": true
        });
        let ev = normalize_event(&raw, Utc::now());
        assert_eq!(ev.attacker_steam_id.as_deref(), Some("76561198000000001"));
        assert_eq!(ev.victim_steam_id.as_deref(), Some("76561198000000002"));
        assert_eq!(ev.weapon.as_deref(), Some("ak47"));
        assert_eq!(ev.is_headshot, Some(true));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // player list shapes
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn players_from_array_of_strings() {
        let (players, warnings) =
            normalize_players(&json!(["76561198000000001", "76561198000000002"]));
        assert_eq!(players.len(), 2);
        assert!(warnings.is_empty());
        assert_eq!(players[0].steam_id, "76561198000000001");
    }

    #[test]
    fn players_from_array_of_objects() {
        let (players, warnings) = normalize_players(&json!([
            {"steamid": "76561198000000001", "name": "alpha"},
            {"steamId": "76561198000000002", "name": "bravo"}
        ]));
        assert_eq!(players.len(), 2);
        assert!(warnings.is_empty());
        assert_eq!(players[1].display_name, "bravo");
    }

    #[test]
    fn players_from_index_keyed_object_with_nested_steam_id() {
        let (players, warnings) = normalize_players(&json!({
            "1": {"name": {"name": "bravo", "steamId": "76561198000000002"}},
            "0": {"name": {"name": "alpha", "steamId": "76561198000000001"}}
        }));
        assert_eq!(players.len(), 2);
        assert!(warnings.is_empty());
        // index order, not key insertion order
        assert_eq!(players[0].display_name, "alpha");
    }

    #[test]
    fn player_without_steam_id_is_synthesized_with_warning() {
        let (players, warnings) = normalize_players(&json!([{"name": "ghost"}]));
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].steam_id, "player_0");
        assert_eq!(warnings.len(), 1);
    }
}
