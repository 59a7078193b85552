//! Map veto protocol.
//!
//! The step script is fixed by the series format and the pool size; the
//! map-pool ordering is the operator's. A silent team is acted for by the
//! scheduler, which always takes the left-most available map (and CT for a
//! side pick), so a disengaged team cannot stall the bracket.

use crate::{CoreError, CoreResult, SeriesFormat};
use chrono::{DateTime, Utc};
use displaydoc::Display;
use serde::{Deserialize, Serialize};

/// acting side of a veto step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VetoActor {
    /// team1
    Team1,
    /// team2
    Team2,
}

impl VetoActor {
    pub fn other(&self) -> VetoActor {
        match self {
            VetoActor::Team1 => VetoActor::Team2,
            VetoActor::Team2 => VetoActor::Team1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum VetoAction {
    /// ban
    Ban,
    /// pick
    Pick,
    /// side pick
    SidePick,
}

/// starting side chosen in a side pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideChoice {
    Ct,
    T,
}

/// per-map side assignment emitted into the plugin config document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapSide {
    Team1Ct,
    Team1T,
    Team2Ct,
    Team2T,
    Knife,
}

impl MapSide {
    fn from_choice(chooser: VetoActor, side: SideChoice) -> MapSide {
        match (chooser, side) {
            (VetoActor::Team1, SideChoice::Ct) => MapSide::Team1Ct,
            (VetoActor::Team1, SideChoice::T) => MapSide::Team1T,
            (VetoActor::Team2, SideChoice::Ct) => MapSide::Team2Ct,
            (VetoActor::Team2, SideChoice::T) => MapSide::Team2T,
        }
    }

    pub fn as_config_str(&self) -> &'static str {
        match self {
            MapSide::Team1Ct => "team1_ct",
            MapSide::Team1T => "team1_t",
            MapSide::Team2Ct => "team2_ct",
            MapSide::Team2T => "team2_t",
            MapSide::Knife => "knife",
        }
    }
}

/// One scripted step. `map_key`/`side_choice` stay empty until acted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VetoStep {
    pub actor: VetoActor,
    pub action: VetoAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_choice: Option<SideChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedMap {
    pub map_name: String,
    pub side: MapSide,
}

/// Veto progress for one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VetoState {
    steps: Vec<VetoStep>,
    current_step: usize,
    available_maps: Vec<String>,
    picked_maps: Vec<PickedMap>,
    complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_action_at: Option<DateTime<Utc>>,
}

/// Scripted `(actor, action)` sequence for a format and pool size.
///
/// Leading bans are capped by the number of disposable maps, so a minimal
/// pool degrades to a pick-only script and a single-map bo1 to no steps at
/// all. For the standard 7-map pool this yields the usual competitive
/// sequences.
fn build_script(format: SeriesFormat, pool_size: usize) -> Vec<(VetoActor, VetoAction)> {
    let picks = format.num_maps() as usize;
    debug_assert!(pool_size >= picks);
    let total_bans = pool_size.saturating_sub(picks);
    let mut script = Vec::new();
    let mut ban_actor = VetoActor::Team1;

    if format == SeriesFormat::Bo1 {
        // alternate bans until one map remains; the survivor is the pick
        for _ in 0..total_bans {
            script.push((ban_actor, VetoAction::Ban));
            ban_actor = ban_actor.other();
        }
        return script;
    }

    let leading = total_bans.min(2);
    for _ in 0..leading {
        script.push((ban_actor, VetoAction::Ban));
        ban_actor = ban_actor.other();
    }

    // picked maps come in pairs of (pick, opponent side pick); the last map
    // is the decider and is never picked explicitly
    let mut pick_actor = VetoActor::Team1;
    for _ in 0..(picks - 1) {
        script.push((pick_actor, VetoAction::Pick));
        script.push((pick_actor.other(), VetoAction::SidePick));
        pick_actor = pick_actor.other();
    }

    let mut trail_actor = VetoActor::Team1;
    for _ in 0..(total_bans - leading) {
        script.push((trail_actor, VetoAction::Ban));
        trail_actor = trail_actor.other();
    }

    script
}

impl VetoState {
    /// Start a veto over the given pool. Completes immediately when the
    /// script is empty (e.g. single-map bo1).
    pub fn new(format: SeriesFormat, map_pool: &[String]) -> Self {
        let steps = build_script(format, map_pool.len())
            .into_iter()
            .map(|(actor, action)| VetoStep {
                actor,
                action,
                map_key: None,
                side_choice: None,
            })
            .collect();
        let mut state = VetoState {
            steps,
            current_step: 0,
            available_maps: map_pool.to_vec(),
            picked_maps: Vec::new(),
            complete: false,
            last_action_at: None,
        };
        state.finish_if_done();
        state
    }

    pub fn get_steps(&self) -> &[VetoStep] {
        &self.steps
    }
    pub fn get_current_step(&self) -> usize {
        self.current_step
    }
    pub fn get_available_maps(&self) -> &[String] {
        &self.available_maps
    }
    pub fn get_picked_maps(&self) -> &[PickedMap] {
        &self.picked_maps
    }
    pub fn is_complete(&self) -> bool {
        self.complete
    }
    pub fn get_last_action_at(&self) -> Option<DateTime<Utc>> {
        self.last_action_at
    }

    /// The step waiting to be acted, if any.
    pub fn pending_step(&self) -> Option<&VetoStep> {
        if self.complete {
            None
        } else {
            self.steps.get(self.current_step)
        }
    }

    /// Ordered map list once the veto is complete.
    pub fn maplist(&self) -> Vec<String> {
        self.picked_maps.iter().map(|p| p.map_name.clone()).collect()
    }

    /// `map_sides` entries for the plugin config document.
    pub fn map_sides(&self) -> Vec<String> {
        self.picked_maps
            .iter()
            .map(|p| p.side.as_config_str().to_string())
            .collect()
    }

    /// Apply one veto action. The actor and action must match the pending
    /// scripted step.
    pub fn apply(
        &mut self,
        actor: VetoActor,
        action: VetoAction,
        map_name: Option<&str>,
        side: Option<SideChoice>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let step = self
            .pending_step()
            .ok_or_else(|| CoreError::Conflict("veto already complete".into()))?;
        if step.actor != actor || step.action != action {
            return Err(CoreError::Conflict(format!(
                "expected {} to {}, got {} {}",
                step.actor, step.action, actor, action
            )));
        }

        match action {
            VetoAction::Ban | VetoAction::Pick => {
                let map = map_name
                    .ok_or_else(|| CoreError::Conflict("map name required".into()))?;
                let idx = self
                    .available_maps
                    .iter()
                    .position(|m| m == map)
                    .ok_or_else(|| {
                        CoreError::Conflict(format!("map {map} is not available"))
                    })?;
                let map = self.available_maps.remove(idx);
                if action == VetoAction::Pick {
                    self.picked_maps.push(PickedMap {
                        map_name: map.clone(),
                        side: MapSide::Knife,
                    });
                }
                self.steps[self.current_step].map_key = Some(map);
            }
            VetoAction::SidePick => {
                let side = side
                    .ok_or_else(|| CoreError::Conflict("side choice required".into()))?;
                let picked = self
                    .picked_maps
                    .last_mut()
                    .ok_or_else(|| CoreError::Conflict("no picked map to side".into()))?;
                picked.side = MapSide::from_choice(actor, side);
                self.steps[self.current_step].map_key = Some(picked.map_name.clone());
                self.steps[self.current_step].side_choice = Some(side);
            }
        }

        self.current_step += 1;
        self.last_action_at = Some(now);
        self.finish_if_done();
        Ok(())
    }

    /// Act on behalf of a silent team: left-most available map, CT on side
    /// picks. Deterministic by construction.
    pub fn auto_act(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        let step = self
            .pending_step()
            .ok_or_else(|| CoreError::Conflict("veto already complete".into()))?;
        let (actor, action) = (step.actor, step.action);
        match action {
            VetoAction::Ban | VetoAction::Pick => {
                let map = self
                    .available_maps
                    .first()
                    .cloned()
                    .ok_or_else(|| CoreError::Conflict("no map available".into()))?;
                self.apply(actor, action, Some(&map), None, now)
            }
            VetoAction::SidePick => self.apply(actor, action, None, Some(SideChoice::Ct), now),
        }
    }

    fn finish_if_done(&mut self) {
        if self.complete || self.current_step < self.steps.len() {
            return;
        }
        // the surviving map is the decider, played from a knife round
        if let Some(decider) = self.available_maps.pop() {
            self.picked_maps.push(PickedMap {
                map_name: decider,
                side: MapSide::Knife,
            });
        }
        self.complete = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(maps: &[&str]) -> Vec<String> {
        maps.iter().map(|m| m.to_string()).collect()
    }

    const SEVEN: [&str; 7] = [
        "de_mirage",
        "de_inferno",
        "de_ancient",
        "de_nuke",
        "de_anubis",
        "de_vertigo",
        "de_dust2",
    ];

    #[test]
    fn bo1_seven_maps_alternates_bans() {
        let script = build_script(SeriesFormat::Bo1, 7);
        assert_eq!(script.len(), 6);
        assert!(script.iter().all(|(_, a)| *a == VetoAction::Ban));
        assert_eq!(script[0].0, VetoActor::Team1);
        assert_eq!(script[1].0, VetoActor::Team2);
        assert_eq!(script[5].0, VetoActor::Team2);
    }

    #[test]
    fn bo3_seven_maps_matches_competitive_sequence() {
        use VetoAction::*;
        use VetoActor::*;
        let script = build_script(SeriesFormat::Bo3, 7);
        assert_eq!(
            script,
            vec![
                (Team1, Ban),
                (Team2, Ban),
                (Team1, Pick),
                (Team2, SidePick),
                (Team2, Pick),
                (Team1, SidePick),
                (Team1, Ban),
                (Team2, Ban),
            ]
        );
    }

    #[test]
    fn bo5_seven_maps_has_no_trailing_bans() {
        use VetoAction::*;
        use VetoActor::*;
        let script = build_script(SeriesFormat::Bo5, 7);
        assert_eq!(
            script,
            vec![
                (Team1, Ban),
                (Team2, Ban),
                (Team1, Pick),
                (Team2, SidePick),
                (Team2, Pick),
                (Team1, SidePick),
                (Team1, Pick),
                (Team2, SidePick),
                (Team2, Pick),
                (Team1, SidePick),
            ]
        );
    }

    #[test]
    fn single_map_bo1_completes_without_steps() {
        let veto = VetoState::new(SeriesFormat::Bo1, &pool(&["de_ancient"]));
        assert!(veto.is_complete());
        assert!(veto.get_steps().is_empty());
        assert_eq!(veto.maplist(), vec!["de_ancient"]);
        assert_eq!(veto.map_sides(), vec!["knife"]);
    }

    #[test]
    fn auto_act_resolves_three_map_bo1_left_to_right() {
        let now = Utc::now();
        let mut veto = VetoState::new(
            SeriesFormat::Bo1,
            &pool(&["de_mirage", "de_inferno", "de_ancient"]),
        );
        veto.auto_act(now).unwrap(); // team1 bans de_mirage
        veto.auto_act(now).unwrap(); // team2 bans de_inferno
        assert!(veto.is_complete());
        assert_eq!(veto.maplist(), vec!["de_ancient"]);
        assert_eq!(veto.get_steps()[0].map_key.as_deref(), Some("de_mirage"));
        assert_eq!(veto.get_steps()[1].map_key.as_deref(), Some("de_inferno"));
    }

    #[test]
    fn bo3_full_pool_records_sides_and_decider() {
        let now = Utc::now();
        let mut veto = VetoState::new(SeriesFormat::Bo3, &pool(&SEVEN));
        veto.apply(VetoActor::Team1, VetoAction::Ban, Some("de_nuke"), None, now)
            .unwrap();
        veto.apply(VetoActor::Team2, VetoAction::Ban, Some("de_dust2"), None, now)
            .unwrap();
        veto.apply(
            VetoActor::Team1,
            VetoAction::Pick,
            Some("de_mirage"),
            None,
            now,
        )
        .unwrap();
        veto.apply(
            VetoActor::Team2,
            VetoAction::SidePick,
            None,
            Some(SideChoice::Ct),
            now,
        )
        .unwrap();
        veto.apply(
            VetoActor::Team2,
            VetoAction::Pick,
            Some("de_inferno"),
            None,
            now,
        )
        .unwrap();
        veto.apply(
            VetoActor::Team1,
            VetoAction::SidePick,
            None,
            Some(SideChoice::T),
            now,
        )
        .unwrap();
        veto.apply(
            VetoActor::Team1,
            VetoAction::Ban,
            Some("de_anubis"),
            None,
            now,
        )
        .unwrap();
        veto.apply(
            VetoActor::Team2,
            VetoAction::Ban,
            Some("de_vertigo"),
            None,
            now,
        )
        .unwrap();

        assert!(veto.is_complete());
        assert_eq!(veto.maplist(), vec!["de_mirage", "de_inferno", "de_ancient"]);
        assert_eq!(veto.map_sides(), vec!["team2_ct", "team1_t", "knife"]);
    }

    #[test]
    fn wrong_actor_is_a_conflict() {
        let now = Utc::now();
        let mut veto = VetoState::new(SeriesFormat::Bo1, &pool(&SEVEN));
        let err = veto
            .apply(VetoActor::Team2, VetoAction::Ban, Some("de_mirage"), None, now)
            .unwrap_err();
        assert!(err.to_string().contains("expected"));
    }

    #[test]
    fn banning_an_unavailable_map_is_a_conflict() {
        let now = Utc::now();
        let mut veto = VetoState::new(SeriesFormat::Bo1, &pool(&SEVEN));
        veto.apply(VetoActor::Team1, VetoAction::Ban, Some("de_mirage"), None, now)
            .unwrap();
        let err = veto
            .apply(VetoActor::Team2, VetoAction::Ban, Some("de_mirage"), None, now)
            .unwrap_err();
        assert!(err.to_string().contains("not available"));
    }

    #[test]
    fn minimal_bo3_pool_is_pick_only() {
        let script = build_script(SeriesFormat::Bo3, 3);
        assert!(script.iter().all(|(_, a)| *a != VetoAction::Ban));
        assert_eq!(script.len(), 4);
    }
}
