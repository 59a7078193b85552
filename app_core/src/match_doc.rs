//! The config document the plugin loads via `matchzy_loadmatch_url`.
//!
//! Field names are the plugin's wire format and must not change. The core
//! runs its own veto, so `skip_veto` is always true and `map_sides` comes
//! from the recorded veto state.

use crate::{Match, MatchConfig, Team};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchZyTeam {
    pub name: String,
    /// steamID64 -> display name
    pub players: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchZyConfig {
    pub matchid: String,
    pub num_maps: u32,
    pub maplist: Vec<String>,
    pub skip_veto: bool,
    pub map_sides: Vec<String>,
    pub players_per_team: u32,
    pub team1: MatchZyTeam,
    pub team2: MatchZyTeam,
}

fn roster(team: &Team) -> BTreeMap<String, String> {
    team.get_players()
        .iter()
        .map(|p| (p.steam_id.clone(), p.display_name.clone()))
        .collect()
}

/// Freeze the match configuration at load time from the veto result and
/// the current rosters.
pub fn build_config(m: &Match, team1: &Team, team2: &Team) -> MatchConfig {
    let maplist = m.get_veto().maplist();
    MatchConfig {
        num_maps: maplist.len() as u32,
        maplist,
        players_per_team: crate::DEFAULT_PLAYERS_PER_TEAM,
        expected_players_total: crate::DEFAULT_PLAYERS_PER_TEAM * 2,
        team1: crate::ConfigTeam {
            name: team1.get_name().to_string(),
            players: team1.get_players().to_vec(),
        },
        team2: crate::ConfigTeam {
            name: team2.get_name().to_string(),
            players: team2.get_players().to_vec(),
        },
    }
}

/// Render the plugin-facing document for a match whose config is frozen.
pub fn build_document(m: &Match, team1: &Team, team2: &Team) -> MatchZyConfig {
    let config = m.get_config();
    MatchZyConfig {
        matchid: m.get_slug().to_string(),
        num_maps: config.num_maps,
        maplist: config.maplist.clone(),
        skip_veto: true,
        map_sides: m.get_veto().map_sides(),
        players_per_team: config.players_per_team,
        team1: MatchZyTeam {
            name: config.team1.name.clone(),
            players: roster(team1),
        },
        team2: MatchZyTeam {
            name: config.team2.name.clone(),
            players: roster(team2),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Player, SeriesFormat};
    use chrono::Utc;

    fn team(name: &str, first_steam: &str) -> Team {
        let mut t = Team::new(name);
        t.set_players(vec![Player::new(first_steam, format!("{name} player"))]);
        t
    }

    #[test]
    fn document_uses_plugin_field_names() {
        let now = Utc::now();
        let team_a = team("Alpha", "76561198000000001");
        let team_b = team("Bravo", "76561198000000002");
        let mut m = Match::new(
            1,
            1,
            "wb-r1-m1",
            Some("alpha".into()),
            Some("bravo".into()),
            now,
        );
        m.make_ready(
            SeriesFormat::Bo1,
            &["de_mirage".into(), "de_inferno".into(), "de_ancient".into()],
            now,
        )
        .unwrap();
        while !m.get_veto().is_complete() {
            m.veto_mut().auto_act(now).unwrap();
        }
        m.sync_veto_completed();
        m.set_config(build_config(&m.clone(), &team_a, &team_b));

        let doc = build_document(&m, &team_a, &team_b);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["matchid"], "alpha_vs_bravo");
        assert_eq!(json["num_maps"], 1);
        assert_eq!(json["skip_veto"], true);
        assert_eq!(json["maplist"], serde_json::json!(["de_ancient"]));
        assert_eq!(json["map_sides"], serde_json::json!(["knife"]));
        assert_eq!(json["players_per_team"], 5);
        assert_eq!(
            json["team1"]["players"]["76561198000000001"],
            "Alpha player"
        );
    }
}
