//! Match progression.
//!
//! The match state machine plus advancement through the bracket graph. Every
//! function here mutates an in-memory `StageRecord`; the caller commits the
//! record atomically, so a failed call leaves the stored stage untouched.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{BracketError, BracketResult};
use crate::models::{
    wins_needed, AdvancementEffect, BracketSection, Match, MatchId, MatchSide, MatchStatus,
    MatchUpdate, Outcome, ResultUpdate, SlotSource, StageFormat, StageStatus, StandingStatus,
    TeamId,
};
use crate::standings;
use crate::storage::StageRecord;

type Effects = Vec<AdvancementEffect>;

fn index_of(record: &StageRecord, match_id: &MatchId) -> BracketResult<usize> {
    record
        .matches
        .iter()
        .position(|m| &m.id == match_id)
        .ok_or_else(|| BracketError::NotFound(format!("match {}", match_id)))
}

/// Apply a score update to a match.
///
/// Scores below the win threshold record a partial result and put the match
/// live. Reaching `ceil(best_of / 2)` on one side, or forcing completion,
/// completes it and advances winner and loser. Re-submitting the exact result
/// of a completed match is a no-op.
pub fn update_match_result(
    record: &mut StageRecord,
    match_id: &MatchId,
    update: ResultUpdate,
) -> BracketResult<MatchUpdate> {
    let idx = index_of(record, match_id)?;
    let current = record.matches[idx].clone();

    match current.status {
        MatchStatus::Completed => {
            let same_scores = current.team1_score == update.team1_score
                && current.team2_score == update.team2_score;
            let same_winner = update
                .winner_override
                .map_or(true, |side| current.team(side) == current.winner_id.as_ref());
            if same_scores && same_winner && !current.walkover {
                debug!("Match {} already completed with this result", match_id);
                return Ok(MatchUpdate {
                    updated: current,
                    effects: Vec::new(),
                });
            }
            return Err(BracketError::match_conflict(
                &current,
                "match is already completed with a different result",
            ));
        }
        MatchStatus::Cancelled => {
            return Err(BracketError::match_conflict(&current, "match was cancelled"));
        }
        MatchStatus::Pending => {
            return Err(BracketError::match_conflict(
                &current,
                "both slots must be filled before scoring",
            ));
        }
        MatchStatus::Ready | MatchStatus::Live => {}
    }

    let needed = wins_needed(current.best_of);
    let (s1, s2) = (update.team1_score, update.team2_score);
    if s1 > needed || s2 > needed {
        return Err(BracketError::validation(format!(
            "best of {} is decided at {} wins, got {}-{}",
            current.best_of, needed, s1, s2
        )));
    }
    if s1 == needed && s2 == needed {
        return Err(BracketError::validation(format!(
            "both sides cannot reach {} wins",
            needed
        )));
    }

    let natural = if s1 == needed {
        Some(MatchSide::Team1)
    } else if s2 == needed {
        Some(MatchSide::Team2)
    } else {
        None
    };

    let winner = match (natural, update.force_complete, update.winner_override) {
        (Some(side), _, Some(chosen)) if side != chosen => {
            return Err(BracketError::validation(format!(
                "winner override {} contradicts the score {}-{}",
                chosen, s1, s2
            )));
        }
        (Some(side), _, _) => Some(side),
        (None, true, Some(chosen)) => {
            let leader = leader(s1, s2);
            if leader.is_some_and(|l| l != chosen) {
                return Err(BracketError::validation(format!(
                    "winner override {} contradicts the score {}-{}",
                    chosen, s1, s2
                )));
            }
            Some(chosen)
        }
        (None, true, None) => match leader(s1, s2) {
            Some(side) => Some(side),
            None => {
                return Err(BracketError::IndeterminateResult {
                    match_id: current.id.clone(),
                    score: s1,
                })
            }
        },
        (None, false, Some(_)) => {
            return Err(BracketError::validation(
                "a winner override requires force_complete",
            ));
        }
        (None, false, None) => None,
    };

    let mut effects = Vec::new();
    {
        let m = &mut record.matches[idx];
        m.team1_score = s1;
        m.team2_score = s2;
    }
    record.stage.mark_in_progress();

    match winner {
        Some(side) => {
            complete(record, idx, side, false, &mut effects)?;
            info!(
                "Match {} completed {}-{}, winner {}",
                match_id,
                s1,
                s2,
                record.matches[idx]
                    .winner_id
                    .as_ref()
                    .map_or("-", TeamId::as_str)
            );
        }
        None => {
            let m = &mut record.matches[idx];
            if m.status == MatchStatus::Ready {
                m.status = MatchStatus::Live;
            }
            debug!("Match {} live at {}-{}", match_id, s1, s2);
        }
    }

    Ok(MatchUpdate {
        updated: record.matches[idx].clone(),
        effects,
    })
}

fn leader(s1: u32, s2: u32) -> Option<MatchSide> {
    match s1.cmp(&s2) {
        std::cmp::Ordering::Greater => Some(MatchSide::Team1),
        std::cmp::Ordering::Less => Some(MatchSide::Team2),
        std::cmp::Ordering::Equal => None,
    }
}

/// Move a ready match to live.
pub fn start_match(record: &mut StageRecord, match_id: &MatchId) -> BracketResult<Match> {
    let idx = index_of(record, match_id)?;
    let m = &mut record.matches[idx];
    match m.status {
        MatchStatus::Ready => {
            m.status = MatchStatus::Live;
            m.scheduled_at.get_or_insert_with(Utc::now);
        }
        MatchStatus::Live => {}
        _ => return Err(BracketError::match_conflict(m, "only ready matches can start")),
    }
    let started = m.clone();
    record.stage.mark_in_progress();
    Ok(started)
}

/// Complete a ready or live match without play. The result counts as a win
/// and a loss with no score.
pub fn award_walkover(
    record: &mut StageRecord,
    match_id: &MatchId,
    winner: MatchSide,
) -> BracketResult<MatchUpdate> {
    let idx = index_of(record, match_id)?;
    let m = &record.matches[idx];
    if !matches!(m.status, MatchStatus::Ready | MatchStatus::Live) {
        return Err(BracketError::match_conflict(
            m,
            "walkovers need a ready or live match",
        ));
    }

    let mut effects = Vec::new();
    {
        let m = &mut record.matches[idx];
        m.team1_score = 0;
        m.team2_score = 0;
    }
    record.stage.mark_in_progress();
    complete(record, idx, winner, true, &mut effects)?;
    info!("Match {} awarded to {} by walkover", match_id, winner);

    Ok(MatchUpdate {
        updated: record.matches[idx].clone(),
        effects,
    })
}

/// Cancel an unfinished match. Its downstream slots become byes and any
/// team already seated in an elimination match is out.
pub fn cancel_match(record: &mut StageRecord, match_id: &MatchId) -> BracketResult<MatchUpdate> {
    let idx = index_of(record, match_id)?;
    if record.matches[idx].status.is_terminal() {
        return Err(BracketError::match_conflict(
            &record.matches[idx],
            "match is already finished",
        ));
    }

    let mut effects = Vec::new();
    let m = record.matches[idx].clone();
    cancel(record, idx, &mut effects)?;

    if is_bracket_section(m.section) {
        for team in [&m.team1_id, &m.team2_id].into_iter().flatten() {
            resolve(record, team, StandingStatus::Eliminated, &mut effects);
        }
    }
    maybe_complete_stage(record, &mut effects);
    warn!("Match {} cancelled", match_id);

    Ok(MatchUpdate {
        updated: record.matches[idx].clone(),
        effects,
    })
}

/// Settle every bye declared at build time: single-occupant matches become
/// walkovers and empty ones are cancelled, cascading downstream.
pub fn settle_byes(record: &mut StageRecord) -> BracketResult<Vec<AdvancementEffect>> {
    let mut effects = Vec::new();
    let mut order: Vec<usize> = (0..record.matches.len()).collect();
    order.sort_by_key(|&i| (record.matches[i].round, record.matches[i].match_number));

    for idx in order {
        let m = &record.matches[idx];
        if m.status.is_terminal() || !is_bracket_section(m.section) {
            continue;
        }
        let dead1 = m.is_bye_slot(MatchSide::Team1);
        let dead2 = m.is_bye_slot(MatchSide::Team2);
        match (dead1, dead2, m.team1_id.is_some(), m.team2_id.is_some()) {
            (true, true, _, _) => cancel(record, idx, &mut effects)?,
            (false, true, true, _) => walkover_bye(record, idx, MatchSide::Team1, &mut effects)?,
            (true, false, _, true) => walkover_bye(record, idx, MatchSide::Team2, &mut effects)?,
            _ => {}
        }
    }
    Ok(effects)
}

fn is_bracket_section(section: BracketSection) -> bool {
    !matches!(section, BracketSection::RoundRobin | BracketSection::Swiss)
}

/// Mark a match completed with `winner_side` and run everything that follows.
fn complete(
    record: &mut StageRecord,
    idx: usize,
    winner_side: MatchSide,
    walkover: bool,
    effects: &mut Effects,
) -> BracketResult<()> {
    let snapshot = {
        let m = &mut record.matches[idx];
        m.winner_id = m.team(winner_side).cloned();
        m.loser_id = m.team(winner_side.other()).cloned();
        m.status = MatchStatus::Completed;
        m.walkover = walkover;
        m.completed_at = Some(Utc::now());
        m.clone()
    };

    standings::record_result(&mut record.standings, &snapshot);
    if snapshot.section == BracketSection::Swiss {
        for team in [&snapshot.team1_id, &snapshot.team2_id].into_iter().flatten() {
            apply_swiss_threshold(record, team, effects);
        }
    }

    advance(record, idx, effects)?;
    maybe_complete_stage(record, effects);
    Ok(())
}

/// Complete a match whose only occupant faces a permanently empty slot.
fn walkover_bye(
    record: &mut StageRecord,
    idx: usize,
    side: MatchSide,
    effects: &mut Effects,
) -> BracketResult<()> {
    let (winner, match_id) = {
        let m = &mut record.matches[idx];
        m.winner_id = m.team(side).cloned();
        m.loser_id = None;
        m.status = MatchStatus::Completed;
        m.walkover = true;
        m.completed_at = Some(Utc::now());
        (m.winner_id.clone(), m.id.clone())
    };
    if let Some(winner_id) = winner {
        debug!("Bye: {} advances from {}", winner_id, match_id);
        effects.push(AdvancementEffect::Walkover {
            match_id,
            winner_id,
        });
    }
    advance(record, idx, effects)
}

/// Cancel a match and turn the slots it feeds into byes.
fn cancel(record: &mut StageRecord, idx: usize, effects: &mut Effects) -> BracketResult<()> {
    let m = &mut record.matches[idx];
    m.status = MatchStatus::Cancelled;
    let snapshot = m.clone();
    effects.push(AdvancementEffect::MatchCancelled {
        match_id: snapshot.id.clone(),
    });

    for outcome in [Outcome::Winner, Outcome::Loser] {
        if let Some(target) = snapshot.advances_to(outcome) {
            place_bye(
                record,
                target,
                SlotSource::advanced(outcome, &snapshot.id),
                effects,
            )?;
        }
    }
    Ok(())
}

/// Route winner and loser of a completed match along its edges, or resolve
/// their standings when there is nowhere to go.
fn advance(record: &mut StageRecord, idx: usize, effects: &mut Effects) -> BracketResult<()> {
    let m = record.matches[idx].clone();
    if !is_bracket_section(m.section) {
        return Ok(());
    }
    if m.section == BracketSection::GrandFinal {
        return settle_grand_final(record, &m, effects);
    }

    for (outcome, team) in [(Outcome::Winner, &m.winner_id), (Outcome::Loser, &m.loser_id)] {
        let source = SlotSource::advanced(outcome, &m.id);
        match (m.advances_to(outcome), team) {
            (Some(target), Some(team)) => place_team(record, target, team, source, effects)?,
            (Some(target), None) => place_bye(record, target, source, effects)?,
            (None, Some(team)) => match outcome {
                Outcome::Winner if m.section == BracketSection::ThirdPlace => {
                    resolve(record, team, StandingStatus::Eliminated, effects)
                }
                Outcome::Winner => {
                    if m.is_terminal() && m.section.can_crown() {
                        crown(record, team, effects);
                    }
                    resolve(record, team, StandingStatus::Qualified, effects);
                }
                Outcome::Loser => resolve(record, team, StandingStatus::Eliminated, effects),
            },
            (None, None) => {}
        }
    }
    Ok(())
}

/// Grand final: the upper bracket team (team1) wins outright; a lower bracket
/// win forces the reset match when one exists.
fn settle_grand_final(
    record: &mut StageRecord,
    gf: &Match,
    effects: &mut Effects,
) -> BracketResult<()> {
    let (Some(winner), Some(loser)) = (gf.winner_id.clone(), gf.loser_id.clone()) else {
        // Only one finalist ever arrived
        if let Some(winner) = gf.winner_id.clone() {
            crown(record, &winner, effects);
            resolve(record, &winner, StandingStatus::Qualified, effects);
        }
        return Ok(());
    };

    let reset_idx = record
        .matches
        .iter()
        .position(|m| m.section == BracketSection::BracketReset && !m.status.is_terminal());
    let upper_won = gf.team1_id.as_ref() == Some(&winner);

    match reset_idx {
        Some(reset) if !upper_won => {
            let reset_id = record.matches[reset].id.clone();
            place_team(
                record,
                &reset_id,
                &loser,
                SlotSource::advanced(Outcome::Loser, &gf.id),
                effects,
            )?;
            place_team(
                record,
                &reset_id,
                &winner,
                SlotSource::advanced(Outcome::Winner, &gf.id),
                effects,
            )?;
            info!("Lower bracket team {} won the grand final, bracket reset", winner);
            effects.push(AdvancementEffect::BracketResetTriggered { match_id: reset_id });
        }
        other => {
            if let Some(reset) = other {
                record.matches[reset].status = MatchStatus::Cancelled;
                effects.push(AdvancementEffect::MatchCancelled {
                    match_id: record.matches[reset].id.clone(),
                });
            }
            crown(record, &winner, effects);
            resolve(record, &winner, StandingStatus::Qualified, effects);
            resolve(record, &loser, StandingStatus::Eliminated, effects);
        }
    }
    Ok(())
}

/// Pick the slot a source feeds: the slot that declared it, else the first
/// open slot (team1 before team2).
fn target_side(m: &Match, source: &SlotSource) -> Option<MatchSide> {
    [MatchSide::Team1, MatchSide::Team2]
        .into_iter()
        .find(|&side| m.source(side) == Some(source))
        .or_else(|| {
            [MatchSide::Team1, MatchSide::Team2]
                .into_iter()
                .find(|&side| m.is_open_slot(side))
        })
}

/// Write a team into a downstream slot exactly once.
fn place_team(
    record: &mut StageRecord,
    target_id: &MatchId,
    team: &TeamId,
    source: SlotSource,
    effects: &mut Effects,
) -> BracketResult<()> {
    let idx = record
        .matches
        .iter()
        .position(|m| &m.id == target_id)
        .ok_or_else(|| BracketError::Internal(format!("dangling edge to {}", target_id)))?;
    let target = &record.matches[idx];

    // A cancelled match seats nobody; the team is out like its seated teams
    if target.status == MatchStatus::Cancelled {
        debug!("{} has nowhere to go: {} was cancelled", team, target_id);
        resolve(record, team, StandingStatus::Eliminated, effects);
        return Ok(());
    }

    let Some(side) = target_side(target, &source) else {
        if target.involves(team) {
            return Ok(());
        }
        return Err(BracketError::match_conflict(target, "no empty slot left"));
    };

    match target.team(side) {
        Some(existing) if existing == team => return Ok(()),
        Some(_) => {
            return Err(BracketError::match_conflict(
                target,
                format!("{} slot already filled", side),
            ))
        }
        None => {}
    }
    if target.status.is_terminal() {
        return Err(BracketError::match_conflict(
            target,
            "cannot seat a team in a finished match",
        ));
    }

    let opposite_dead = target.is_bye_slot(side.other());
    {
        let m = &mut record.matches[idx];
        *m.slot_mut(side) = Some(team.clone());
        *m.source_mut(side) = Some(source.clone());
    }
    effects.push(AdvancementEffect::SlotFilled {
        match_id: target_id.clone(),
        side,
        team_id: team.clone(),
        source,
    });
    if record.matches[idx].refresh_readiness() {
        effects.push(AdvancementEffect::MatchReady {
            match_id: target_id.clone(),
        });
    }

    if opposite_dead {
        walkover_bye(record, idx, side, effects)?;
    }
    Ok(())
}

/// Declare a downstream slot permanently empty.
fn place_bye(
    record: &mut StageRecord,
    target_id: &MatchId,
    source: SlotSource,
    effects: &mut Effects,
) -> BracketResult<()> {
    let idx = record
        .matches
        .iter()
        .position(|m| &m.id == target_id)
        .ok_or_else(|| BracketError::Internal(format!("dangling edge to {}", target_id)))?;
    let target = &record.matches[idx];
    if target.status.is_terminal() {
        return Ok(());
    }
    let Some(side) = target_side(target, &source) else {
        return Ok(());
    };
    if target.team(side).is_some() {
        return Ok(());
    }

    *record.matches[idx].source_mut(side) = Some(SlotSource::Bye);

    let m = &record.matches[idx];
    let other = side.other();
    if m.team(other).is_some() {
        walkover_bye(record, idx, other, effects)?;
    } else if m.is_bye_slot(other) {
        cancel(record, idx, effects)?;
    }
    Ok(())
}

fn crown(record: &mut StageRecord, team: &TeamId, effects: &mut Effects) {
    if record.stage.champion.is_none() {
        info!("Stage {} champion: {}", record.stage.id, team);
        record.stage.champion = Some(team.clone());
        effects.push(AdvancementEffect::ChampionDecided {
            team_id: team.clone(),
        });
    }
}

fn resolve(record: &mut StageRecord, team: &TeamId, status: StandingStatus, effects: &mut Effects) {
    let Some(standing) = record.standings.iter_mut().find(|s| &s.team_id == team) else {
        return;
    };
    if standing.resolve(status) {
        effects.push(match status {
            StandingStatus::Qualified => AdvancementEffect::TeamQualified {
                team_id: team.clone(),
            },
            _ => AdvancementEffect::TeamEliminated {
                team_id: team.clone(),
            },
        });
    }
}

fn apply_swiss_threshold(record: &mut StageRecord, team: &TeamId, effects: &mut Effects) {
    let settings = record.stage.settings.swiss.clone();
    let Some(standing) = record.standings.iter_mut().find(|s| &s.team_id == team) else {
        return;
    };
    match standings::apply_swiss_thresholds(standing, &settings) {
        Some(StandingStatus::Qualified) => effects.push(AdvancementEffect::TeamQualified {
            team_id: team.clone(),
        }),
        Some(StandingStatus::Eliminated) => effects.push(AdvancementEffect::TeamEliminated {
            team_id: team.clone(),
        }),
        _ => {}
    }
}

/// Close the stage once nothing is left to play.
pub(crate) fn maybe_complete_stage(record: &mut StageRecord, effects: &mut Effects) {
    if record.stage.status == StageStatus::Completed
        || record.matches.is_empty()
        || !record.matches.iter().all(|m| m.status.is_terminal())
    {
        return;
    }

    match record.stage.format {
        StageFormat::Swiss => {
            let active = record.standings.iter().filter(|s| s.is_active()).count();
            let capped = record
                .stage
                .settings
                .swiss
                .max_rounds
                .is_some_and(|max| record.stage.current_round >= max);
            if active >= 2 && !capped {
                return;
            }
        }
        StageFormat::RoundRobin => settle_round_robin(record, effects),
        _ => {}
    }

    record.stage.status = StageStatus::Completed;
    record.stage.updated_at = Utc::now();
    info!("Stage {} completed", record.stage.id);
    effects.push(AdvancementEffect::StageCompleted {
        stage_id: record.stage.id.clone(),
    });
}

/// Round robin end: crown the table leader and apply `advance_count`.
fn settle_round_robin(record: &mut StageRecord, effects: &mut Effects) {
    let order = standings::ranked(&record.standings);
    if let Some(leader) = order.first() {
        crown(record, &leader.team_id, effects);
    }
    let Some(advance) = record.stage.settings.advance_count else {
        return;
    };
    for (i, s) in order.iter().enumerate() {
        let status = if (i as u32) < advance {
            StandingStatus::Qualified
        } else {
            StandingStatus::Eliminated
        };
        resolve(record, &s.team_id, status, effects);
    }
}
