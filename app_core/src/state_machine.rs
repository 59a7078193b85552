//! Event application: the bridge between the canonical event stream and
//! the match row.
//!
//! `apply_event` is pure over the match value; persistence, retries and
//! notice fan-out belong to the interpreter. Events that arrive out of
//! order against the lifecycle either degrade to no-ops (already-final
//! states, replays) or surface a conflict that the interpreter logs.

use crate::{
    CoreError, CoreResult, GameEventKind, MapResult, Match, MatchPhase, MatchStatus,
    NormalizedEvent, VetoAction,
};
use chrono::{DateTime, Utc};

/// What an applied event changed on the match row.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    StatusChanged(MatchStatus),
    Completed { winner_id: String },
    VetoAdvanced { complete: bool },
    ScoreChanged,
    PhaseChanged(MatchPhase),
}

pub fn apply_event(
    m: &mut Match,
    ev: &NormalizedEvent,
    now: DateTime<Utc>,
) -> CoreResult<Vec<StateChange>> {
    match ev.kind() {
        GameEventKind::SeriesStart => apply_series_start(m, now),
        GameEventKind::SeriesEnd => apply_series_end(m, ev, now),
        GameEventKind::MapResult => apply_map_result(m, ev),
        GameEventKind::MapPicked => apply_veto(m, ev, VetoAction::Pick, now),
        GameEventKind::MapVetoed => apply_veto(m, ev, VetoAction::Ban, now),
        GameEventKind::SidePicked => apply_veto(m, ev, VetoAction::SidePick, now),
        GameEventKind::GoingLive => apply_going_live(m),
        GameEventKind::RoundEnd => apply_round_end(m, ev),
        // per-player and statistic-only events never touch the match row;
        // they are folded into the live state by the interpreter
        GameEventKind::RoundMvp
        | GameEventKind::PlayerConnect
        | GameEventKind::PlayerDisconnect
        | GameEventKind::PlayerDeath
        | GameEventKind::PlayerStatsUpdate
        | GameEventKind::BombPlanted
        | GameEventKind::BombDefused
        | GameEventKind::BombExploded
        | GameEventKind::Unknown(_) => Ok(Vec::new()),
    }
}

fn apply_series_start(m: &mut Match, now: DateTime<Utc>) -> CoreResult<Vec<StateChange>> {
    match m.get_status() {
        // replayed start or a plugin restart mid-series
        MatchStatus::Live | MatchStatus::Completed => Ok(Vec::new()),
        MatchStatus::Loaded => {
            m.begin_live(now)?;
            Ok(vec![
                StateChange::StatusChanged(MatchStatus::Live),
                StateChange::PhaseChanged(MatchPhase::Live),
            ])
        }
        status => Err(CoreError::Conflict(format!(
            "series_start for {} in status {status}",
            m.get_slug()
        ))),
    }
}

fn apply_series_end(
    m: &mut Match,
    ev: &NormalizedEvent,
    now: DateTime<Utc>,
) -> CoreResult<Vec<StateChange>> {
    if m.get_status() == MatchStatus::Completed {
        return Ok(Vec::new());
    }
    if m.get_status() != MatchStatus::Live {
        return Err(CoreError::Conflict(format!(
            "match {} not live",
            m.get_slug()
        )));
    }
    let winner = ev
        .winner
        .or_else(|| m.winner_from_series())
        .ok_or_else(|| {
            CoreError::Conflict(format!(
                "series_end for {} carries no winner and the series is tied",
                m.get_slug()
            ))
        })?;
    m.complete_series(winner, now)?;
    let winner_id = m
        .get_winner_id()
        .expect("complete_series always sets a winner")
        .to_string();
    Ok(vec![
        StateChange::StatusChanged(MatchStatus::Completed),
        StateChange::Completed { winner_id },
    ])
}

fn apply_map_result(m: &mut Match, ev: &NormalizedEvent) -> CoreResult<Vec<StateChange>> {
    if m.get_status() == MatchStatus::Completed {
        return Ok(Vec::new());
    }
    if m.get_status() != MatchStatus::Live {
        return Err(CoreError::Conflict(format!(
            "map_result for {} in status {}",
            m.get_slug(),
            m.get_status()
        )));
    }
    let (Some(map_number), Some(map_name)) = (ev.map_number, ev.map_name.clone()) else {
        return Err(CoreError::Conflict(
            "map_result without map number or name".into(),
        ));
    };
    m.record_map_result(MapResult {
        map_number,
        map_name,
        team1_score: ev.score1.unwrap_or(0),
        team2_score: ev.score2.unwrap_or(0),
        demo_file_path: ev.demo_file_path.clone(),
    });
    if let Some(demo) = &ev.demo_file_path {
        if !m.get_demo_file_paths().contains(demo) {
            m.add_demo_file(demo.clone());
        }
    }
    Ok(vec![StateChange::ScoreChanged])
}

fn apply_veto(
    m: &mut Match,
    ev: &NormalizedEvent,
    action: VetoAction,
    now: DateTime<Utc>,
) -> CoreResult<Vec<StateChange>> {
    if m.get_status() != MatchStatus::Ready {
        return Err(CoreError::Conflict(format!(
            "veto action for {} in status {}",
            m.get_slug(),
            m.get_status()
        )));
    }
    let scripted = m
        .get_veto()
        .pending_step()
        .ok_or_else(|| CoreError::Conflict(format!("veto of {} already complete", m.get_slug())))?;
    // a payload without an actor is acted by the scripted side
    let actor = ev.actor_team.unwrap_or(scripted.actor);
    let side = ev.side;
    m.veto_mut()
        .apply(actor, action, ev.map_name.as_deref(), side, now)?;
    m.sync_veto_completed();
    Ok(vec![StateChange::VetoAdvanced {
        complete: m.is_veto_completed(),
    }])
}

fn apply_going_live(m: &mut Match) -> CoreResult<Vec<StateChange>> {
    match m.get_status() {
        MatchStatus::Live | MatchStatus::Loaded => {
            m.set_phase(MatchPhase::Live);
            Ok(vec![StateChange::PhaseChanged(MatchPhase::Live)])
        }
        MatchStatus::Completed => Ok(Vec::new()),
        status => Err(CoreError::Conflict(format!(
            "going_live for {} in status {status}",
            m.get_slug()
        ))),
    }
}

fn apply_round_end(m: &mut Match, ev: &NormalizedEvent) -> CoreResult<Vec<StateChange>> {
    if m.get_status() != MatchStatus::Live {
        // stale round report after completion; nothing to update
        return Ok(Vec::new());
    }
    m.set_round_score(ev.score1.unwrap_or(0), ev.score2.unwrap_or(0));
    Ok(vec![StateChange::ScoreChanged])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SeriesFormat, VetoActor};
    use chrono::Utc;

    fn pool() -> Vec<String> {
        vec!["de_mirage".into(), "de_inferno".into(), "de_ancient".into()]
    }

    fn live_match() -> Match {
        let now = Utc::now();
        let mut m = Match::new(1, 1, "wb-r1-m1", Some("a".into()), Some("b".into()), now);
        m.make_ready(SeriesFormat::Bo1, &pool(), now).unwrap();
        while !m.get_veto().is_complete() {
            m.veto_mut().auto_act(now).unwrap();
        }
        m.sync_veto_completed();
        m.mark_loaded("s1", now).unwrap();
        m.begin_live(now).unwrap();
        m
    }

    fn ev(kind: &str) -> NormalizedEvent {
        NormalizedEvent {
            match_slug: "a_vs_b".into(),
            kind_raw: kind.into(),
            ts: Utc::now(),
            ..Default::default()
        }
    }

    #[test]
    fn series_end_completes_and_names_the_winner() {
        let mut m = live_match();
        let mut end = ev("series_end");
        end.winner = Some(VetoActor::Team1);
        let changes = apply_event(&mut m, &end, Utc::now()).unwrap();
        assert!(changes.contains(&StateChange::Completed {
            winner_id: "a".into()
        }));
        assert_eq!(m.get_status(), MatchStatus::Completed);
    }

    #[test]
    fn series_end_twice_is_a_no_op() {
        let mut m = live_match();
        let mut end = ev("series_end");
        end.winner = Some(VetoActor::Team1);
        apply_event(&mut m, &end, Utc::now()).unwrap();
        let changes = apply_event(&mut m, &end, Utc::now()).unwrap();
        assert!(changes.is_empty());
        assert_eq!(m.get_winner_id(), Some("a"));
    }

    #[test]
    fn series_end_without_winner_falls_back_to_series_score() {
        let mut m = live_match();
        let mut result = ev("map_result");
        result.map_number = Some(0);
        result.map_name = Some("de_ancient".into());
        result.score1 = Some(13);
        result.score2 = Some(7);
        apply_event(&mut m, &result, Utc::now()).unwrap();

        let end = ev("series_end");
        apply_event(&mut m, &end, Utc::now()).unwrap();
        assert_eq!(m.get_winner_id(), Some("a"));
    }

    #[test]
    fn tied_series_end_without_winner_is_a_conflict() {
        let mut m = live_match();
        let end = ev("series_end");
        let err = apply_event(&mut m, &end, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("tied"));
        assert_eq!(m.get_status(), MatchStatus::Live);
    }

    #[test]
    fn unknown_kind_changes_nothing() {
        let mut m = live_match();
        let before = m.clone();
        let changes = apply_event(&mut m, &ev("grenade_thrown"), Utc::now()).unwrap();
        assert!(changes.is_empty());
        assert_eq!(m, before);
    }

    #[test]
    fn veto_event_without_actor_uses_the_scripted_side() {
        let now = Utc::now();
        let mut m = Match::new(1, 1, "wb-r1-m1", Some("a".into()), Some("b".into()), now);
        m.make_ready(SeriesFormat::Bo1, &pool(), now).unwrap();
        let mut ban = ev("map_vetoed");
        ban.map_name = Some("de_mirage".into());
        let changes = apply_event(&mut m, &ban, now).unwrap();
        assert_eq!(changes, vec![StateChange::VetoAdvanced { complete: false }]);
        assert_eq!(m.get_veto().get_steps()[0].map_key.as_deref(), Some("de_mirage"));
    }

    #[test]
    fn round_end_after_completion_is_ignored() {
        let mut m = live_match();
        let mut end = ev("series_end");
        end.winner = Some(VetoActor::Team2);
        apply_event(&mut m, &end, Utc::now()).unwrap();

        let mut round = ev("round_end");
        round.score1 = Some(9);
        round.score2 = Some(9);
        let changes = apply_event(&mut m, &round, Utc::now()).unwrap();
        assert!(changes.is_empty());
    }
}
