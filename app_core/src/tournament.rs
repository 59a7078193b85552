//! The tournament singleton and its lifecycle.

use crate::{
    BracketAction, BracketUpdatePayload, Core, CoreError, CoreResult, CrPushNotice, DbpMatch,
    DbpTournament, TournamentUpdatePayload, bracket,
    utils::{
        normalize::normalize_ws,
        revision::{ObjectRevision, Revision},
        validation::{FieldError, ValidationErrors, ValidationResult},
    },
};
use displaydoc::Display;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// bracket shape of the tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum TournamentType {
    /// single elimination
    #[default]
    SingleElim,
    /// double elimination
    DoubleElim,
    /// round robin
    RoundRobin,
    /// swiss
    Swiss,
}

/// series length of every match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum SeriesFormat {
    /// best of one
    #[default]
    Bo1,
    /// best of three
    Bo3,
    /// best of five
    Bo5,
}

impl SeriesFormat {
    pub fn num_maps(&self) -> u32 {
        match self {
            SeriesFormat::Bo1 => 1,
            SeriesFormat::Bo3 => 3,
            SeriesFormat::Bo5 => 5,
        }
    }
}

/// lifecycle of the tournament singleton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    /// setup
    #[default]
    Setup,
    /// ready
    Ready,
    /// in progress
    InProgress,
    /// completed
    Completed,
}

/// The tournament. One per deployment; mutable while in setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    #[serde(skip)]
    revision: Revision,
    name: String,
    #[serde(rename = "type")]
    t_type: TournamentType,
    format: SeriesFormat,
    map_pool: Vec<String>,
    team_ids: Vec<String>,
    status: TournamentStatus,
}

impl ObjectRevision for Tournament {
    fn revision(&self) -> Revision {
        self.revision
    }
    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }
}

impl Tournament {
    pub fn new(name: impl Into<String>) -> Self {
        Tournament {
            name: normalize_ws(name.into()),
            ..Default::default()
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }
    pub fn get_type(&self) -> TournamentType {
        self.t_type
    }
    pub fn get_format(&self) -> SeriesFormat {
        self.format
    }
    pub fn get_map_pool(&self) -> &[String] {
        &self.map_pool
    }
    pub fn get_team_ids(&self) -> &[String] {
        &self.team_ids
    }
    pub fn get_status(&self) -> TournamentStatus {
        self.status
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = normalize_ws(name.into());
        self
    }
    pub fn set_type(&mut self, t_type: TournamentType) -> &mut Self {
        self.t_type = t_type;
        self
    }
    pub fn set_format(&mut self, format: SeriesFormat) -> &mut Self {
        self.format = format;
        self
    }
    pub fn set_map_pool(&mut self, maps: Vec<String>) -> &mut Self {
        self.map_pool = maps.into_iter().map(normalize_ws).collect();
        self
    }
    pub fn set_team_ids(&mut self, ids: Vec<String>) -> &mut Self {
        self.team_ids = ids;
        self
    }
    pub fn set_status(&mut self, status: TournamentStatus) -> &mut Self {
        self.status = status;
        self
    }

    pub fn validate(&self) -> ValidationResult<()> {
        let mut errs = ValidationErrors::new();

        if self.name.is_empty() {
            errs.add(FieldError::builder().set_field("name").add_required().build());
        }

        let n = self.team_ids.len();
        match self.t_type {
            TournamentType::DoubleElim => {
                if n < 2 || !n.is_power_of_two() {
                    errs.add(
                        FieldError::builder()
                            .set_field("teamIds")
                            .add_message("double elimination requires a power-of-two team count")
                            .build(),
                    );
                }
            }
            _ => {
                if n < 2 {
                    errs.add(
                        FieldError::builder()
                            .set_field("teamIds")
                            .add_message("at least 2 teams required")
                            .build(),
                    );
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        if self.team_ids.iter().any(|id| !seen.insert(id.as_str())) {
            errs.add(
                FieldError::builder()
                    .set_field("teamIds")
                    .add_user_defined_code("duplicate")
                    .add_message("duplicate team id")
                    .build(),
            );
        }

        if (self.map_pool.len() as u32) < self.format.num_maps() {
            errs.add(
                FieldError::builder()
                    .set_field("mapPool")
                    .add_message("map pool smaller than the series length")
                    .build(),
            );
        }
        let mut seen_maps = std::collections::HashSet::new();
        if self.map_pool.iter().any(|m| !seen_maps.insert(m.as_str())) {
            errs.add(
                FieldError::builder()
                    .set_field("mapPool")
                    .add_user_defined_code("duplicate")
                    .add_message("duplicate map in pool")
                    .build(),
            );
        }

        errs.into_result()
    }
}

impl Core {
    pub async fn get_tournament(&self) -> CoreResult<Option<Tournament>> {
        Ok(self.database.get_tournament().await?)
    }

    /// Tournament settings are mutable only while in setup (or ready, which
    /// flips back to setup on edit).
    pub async fn update_tournament(&self, tournament: &Tournament) -> CoreResult<Tournament> {
        if let Some(existing) = self.database.get_tournament().await? {
            match existing.get_status() {
                TournamentStatus::Setup | TournamentStatus::Ready => {}
                status => {
                    return Err(CoreError::Conflict(format!(
                        "tournament is {status}, settings are frozen"
                    )));
                }
            }
        }
        tournament.validate().map_err(CoreError::from)?;
        Ok(self.database.save_tournament(tournament).await?)
    }

    /// Generate the bracket and move the tournament into `in_progress`.
    /// All matches are persisted atomically; walkovers and allocation are
    /// handled by the next scheduler cycle.
    #[instrument(name = "core.tournament.start", skip(self))]
    pub async fn start_tournament(&self) -> CoreResult<usize> {
        let mut tournament = self
            .database
            .get_tournament()
            .await?
            .ok_or_else(|| CoreError::NotFound("tournament".into()))?;

        match tournament.get_status() {
            TournamentStatus::Setup | TournamentStatus::Ready => {}
            status => {
                return Err(CoreError::Conflict(format!(
                    "tournament already {status}"
                )));
            }
        }
        tournament.validate().map_err(CoreError::from)?;

        let generated = bracket::generate(&tournament)?;
        let count = generated.len();
        self.database.create_matches(&generated).await?;

        tournament.set_status(TournamentStatus::InProgress);
        self.database.save_tournament(&tournament).await?;

        info!(matches = count, "tournament_started");
        self.publish(CrPushNotice::BracketUpdate(BracketUpdatePayload::new(
            BracketAction::TournamentStarted,
        )))
        .await;
        self.publish(CrPushNotice::TournamentUpdate(TournamentUpdatePayload {
            action: "tournament_started".into(),
        }))
        .await;

        Ok(count)
    }

    /// Drop all matches and events and return the tournament to setup.
    #[instrument(name = "core.tournament.reset", skip(self))]
    pub async fn reset_tournament(&self) -> CoreResult<()> {
        self.database.reset_tournament_data().await?;
        info!("tournament_reset");
        self.publish(CrPushNotice::BracketUpdate(BracketUpdatePayload::new(
            BracketAction::TournamentReset,
        )))
        .await;
        self.publish(CrPushNotice::TournamentUpdate(TournamentUpdatePayload {
            action: "tournament_reset".into(),
        }))
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Tournament {
        let mut t = Tournament::new("Test Cup");
        t.set_map_pool(vec![
            "de_mirage".into(),
            "de_inferno".into(),
            "de_ancient".into(),
        ])
        .set_team_ids(vec!["a".into(), "b".into()]);
        t
    }

    #[test]
    fn valid_setup_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn double_elim_requires_power_of_two() {
        let mut t = base();
        t.set_type(TournamentType::DoubleElim)
            .set_team_ids(vec!["a".into(), "b".into(), "c".into()]);
        assert!(t.validate().is_err());
        t.set_team_ids(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn map_pool_must_cover_series_length() {
        let mut t = base();
        t.set_format(SeriesFormat::Bo5);
        let errs = t.validate().unwrap_err();
        assert!(errs.errors.iter().any(|e| e.get_field() == "mapPool"));
    }

    #[test]
    fn duplicate_team_ids_are_rejected() {
        let mut t = base();
        t.set_team_ids(vec!["a".into(), "a".into()]);
        assert!(t.validate().is_err());
    }
}
