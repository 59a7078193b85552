//! Teams and their rosters.

use crate::{
    Core, CoreError, CoreResult, DbpTeam,
    utils::{
        normalize::{is_valid_slug, normalize_opt, normalize_ws, slugify},
        revision::{ObjectRevision, Revision},
        validation::{FieldError, ValidationErrors, ValidationResult},
    },
};
use serde::{Deserialize, Serialize};

pub const MAX_TAG_LEN: usize = 4;

/// A rostered player. The steamID64 is the within-team key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "steamId", alias = "steamid", alias = "steamId64")]
    pub steam_id: String,
    #[serde(rename = "name", alias = "displayName")]
    pub display_name: String,
}

impl Player {
    pub fn new(steam_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Player {
            steam_id: normalize_ws(steam_id.into()),
            display_name: normalize_ws(display_name.into()),
        }
    }

    /// steamID64s are 17-digit numbers starting with 7656.
    pub fn has_plausible_steam_id(&self) -> bool {
        self.steam_id.len() == 17
            && self.steam_id.starts_with("7656")
            && self.steam_id.chars().all(|c| c.is_ascii_digit())
    }
}

/// A team. The id is a slug derived from the name and stable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    id: String,
    #[serde(skip)]
    revision: Revision,
    name: String,
    tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    discord_role_id: Option<String>,
    players: Vec<Player>,
}

impl ObjectRevision for Team {
    fn revision(&self) -> Revision {
        self.revision
    }
    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }
}

impl Team {
    /// Create a new team; the id is derived from the name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = normalize_ws(name.into());
        Team {
            id: slugify(&name),
            revision: Revision::New,
            name,
            ..Default::default()
        }
    }

    /// Restore a team with an explicit id (store round-trip).
    pub fn with_id(id: impl Into<String>) -> Self {
        Team {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }
    pub fn get_name(&self) -> &str {
        &self.name
    }
    pub fn get_tag(&self) -> &str {
        &self.tag
    }
    pub fn get_discord_role_id(&self) -> Option<&str> {
        self.discord_role_id.as_deref()
    }
    pub fn get_players(&self) -> &[Player] {
        &self.players
    }

    /// Rename; the id stays stable once assigned.
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = normalize_ws(name.into());
        if self.id.is_empty() {
            self.id = slugify(&self.name);
        }
        self
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tag = normalize_ws(tag.into());
        self
    }

    pub fn set_discord_role_id(&mut self, role: Option<impl Into<String>>) -> &mut Self {
        self.discord_role_id = normalize_opt(role);
        self
    }

    pub fn set_players(&mut self, players: Vec<Player>) -> &mut Self {
        self.players = players;
        self
    }

    /// Insert or replace by steamID64.
    pub fn upsert_player(&mut self, player: Player) -> &mut Self {
        match self
            .players
            .iter_mut()
            .find(|p| p.steam_id == player.steam_id)
        {
            Some(existing) => *existing = player,
            None => self.players.push(player),
        }
        self
    }

    pub fn validate(&self) -> ValidationResult<()> {
        let mut errs = ValidationErrors::new();

        if self.name.is_empty() {
            errs.add(FieldError::builder().set_field("name").add_required().build());
        }
        if !is_valid_slug(&self.id) {
            errs.add(
                FieldError::builder()
                    .set_field("id")
                    .add_invalid_format()
                    .add_message("id must be a lowercase slug")
                    .build(),
            );
        }
        if self.tag.chars().count() > MAX_TAG_LEN {
            errs.add(
                FieldError::builder()
                    .set_field("tag")
                    .add_invalid_format()
                    .add_message(format!("tag must be at most {MAX_TAG_LEN} characters"))
                    .build(),
            );
        }
        let mut seen = std::collections::HashSet::new();
        for (idx, player) in self.players.iter().enumerate() {
            if player.steam_id.is_empty() {
                errs.add(
                    FieldError::builder()
                        .set_field(format!("players[{idx}].steamId"))
                        .add_required()
                        .build(),
                );
            } else if !seen.insert(player.steam_id.as_str()) {
                errs.add(
                    FieldError::builder()
                        .set_field(format!("players[{idx}].steamId"))
                        .add_user_defined_code("duplicate")
                        .add_message("duplicate steamId within team")
                        .build(),
                );
            }
        }

        errs.into_result()
    }
}

impl Core {
    pub async fn get_team(&self, id: &str) -> CoreResult<Option<Team>> {
        Ok(self.database.get_team(id).await?)
    }

    pub async fn list_teams(&self) -> CoreResult<Vec<Team>> {
        Ok(self.database.list_teams().await?)
    }

    pub async fn upsert_team(&self, team: &Team) -> CoreResult<Team> {
        team.validate().map_err(CoreError::from)?;
        Ok(self.database.save_team(team).await?)
    }

    /// Delete fails while the team is referenced by a non-completed match.
    pub async fn delete_team(&self, id: &str) -> CoreResult<()> {
        Ok(self.database.delete_team(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_derived_from_name_and_stays_stable() {
        let mut team = Team::new("Ninjas in Pyjamas");
        assert_eq!(team.get_id(), "ninjas_in_pyjamas");
        team.set_name("NIP Reborn");
        assert_eq!(team.get_id(), "ninjas_in_pyjamas");
        assert_eq!(team.get_name(), "NIP Reborn");
    }

    #[test]
    fn tag_longer_than_four_chars_is_rejected() {
        let mut team = Team::new("Alpha");
        team.set_tag("ALPHA");
        let errs = team.validate().unwrap_err();
        assert!(errs.errors.iter().any(|e| e.get_field() == "tag"));
    }

    #[test]
    fn duplicate_steam_ids_are_rejected() {
        let mut team = Team::new("Alpha");
        team.set_players(vec![
            Player::new("76561198000000001", "one"),
            Player::new("76561198000000001", "two"),
        ]);
        let errs = team.validate().unwrap_err();
        assert!(errs.errors.iter().any(|e| e.get_code() == "duplicate"));
    }

    #[test]
    fn upsert_player_replaces_by_steam_id() {
        let mut team = Team::new("Alpha");
        team.upsert_player(Player::new("76561198000000001", "old"));
        team.upsert_player(Player::new("76561198000000001", "new"));
        assert_eq!(team.get_players().len(), 1);
        assert_eq!(team.get_players()[0].display_name, "new");
    }

    #[test]
    fn plausible_steam_id_check() {
        assert!(Player::new("76561198012345678", "x").has_plausible_steam_id());
        assert!(!Player::new("123", "x").has_plausible_steam_id());
        assert!(!Player::new("7656119801234567a", "x").has_plausible_steam_id());
    }
}
