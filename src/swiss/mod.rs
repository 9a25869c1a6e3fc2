//! Swiss pairing engine.
//!
//! Round 1 is drawn from seeds (fold or shuffle). Later rounds pair active
//! teams inside their (wins, losses) score group:
//! - no rematches when a rematch-free pairing exists
//! - an odd group floats its lowest-ranked pairable team down
//! - a group that cannot be paired merges into the next one
//! - the bottom group falls back to allowing rematches
//!
//! Sides go to the team that has played fewer matches as team1.

use std::cmp::Ordering;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bracket::naming;
use crate::error::{BracketError, BracketResult, Conflict};
use crate::models::{
    AdvancementEffect, BracketSection, Match, MatchSide, MatchStatus, SlotSource, Stage,
    StageFormat, StageStatus, Standing, StandingStatus, SwissFirstRound, SwissSummary, TeamId,
};
use crate::seeding::SeededTeam;
use crate::standings;
use crate::storage::StageRecord;

/// Recursion steps allowed per rematch-free search before giving up on a pool.
const SEARCH_BUDGET: u32 = 20_000;

/// A generated Swiss round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwissRound {
    pub round: u32,
    pub matches: Vec<Match>,
    pub effects: Vec<AdvancementEffect>,
}

/// Pairings for one round, sides already assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pairings {
    /// (team1, team2)
    pub pairs: Vec<(TeamId, TeamId)>,
    pub bye: Option<TeamId>,
}

fn new_match(stage: &Stage, round: u32, number: u32) -> Match {
    Match::new(
        &stage.id,
        BracketSection::Swiss,
        round,
        number,
        naming::swiss_round(round),
        stage.best_of(),
    )
}

/// A completed walkover with a single occupant.
fn bye_match(stage: &Stage, round: u32, number: u32, team: TeamId, source: SlotSource) -> Match {
    let mut m = new_match(stage, round, number)
        .with_team(MatchSide::Team1, team.clone(), source)
        .with_source(MatchSide::Team2, SlotSource::Bye);
    m.status = MatchStatus::Completed;
    m.walkover = true;
    m.winner_id = Some(team);
    m.completed_at = Some(chrono::Utc::now());
    m
}

fn is_bye(m: &Match) -> bool {
    m.walkover && m.loser_id.is_none() && m.team2_id.is_none()
}

/// First round from seeds. An odd field gives the lowest seed a bye.
pub fn first_round<R: Rng + ?Sized>(stage: &Stage, seeded: &[SeededTeam], rng: &mut R) -> Vec<Match> {
    let mut order: Vec<&SeededTeam> = seeded.iter().collect();
    order.sort_by_key(|s| s.seed);
    let bye = if order.len() % 2 == 1 { order.pop() } else { None };

    let pairs: Vec<(&SeededTeam, &SeededTeam)> = match stage.settings.swiss.first_round {
        SwissFirstRound::Seeded => {
            let half = order.len() / 2;
            (0..half).map(|i| (order[i], order[i + half])).collect()
        }
        SwissFirstRound::Random => {
            order.shuffle(rng);
            order.chunks(2).map(|c| (c[0], c[1])).collect()
        }
    };

    let mut matches: Vec<Match> = pairs
        .into_iter()
        .enumerate()
        .map(|(i, (a, b))| {
            let m = new_match(stage, 1, i as u32 + 1);
            crate::bracket::seat(crate::bracket::seat(m, MatchSide::Team1, a), MatchSide::Team2, b)
        })
        .collect();

    if let Some(team) = bye {
        let number = matches.len() as u32 + 1;
        matches.push(bye_match(
            stage,
            1,
            number,
            team.team.id.clone(),
            SlotSource::Seed { seed: team.seed },
        ));
    }
    matches
}

/// Record the byes handed out in `round` and resolve thresholds they cross.
pub fn apply_byes(record: &mut StageRecord, round: u32) -> Vec<AdvancementEffect> {
    let mut effects = Vec::new();
    let byes: Vec<TeamId> = record
        .matches
        .iter()
        .filter(|m| m.section == BracketSection::Swiss && m.round == round && is_bye(m))
        .filter_map(|m| m.winner_id.clone())
        .collect();

    let settings = record.stage.settings.swiss.clone();
    for team in byes {
        standings::record_bye(&mut record.standings, &team);
        if let Some(s) = record.standings.iter_mut().find(|s| s.team_id == team) {
            match standings::apply_swiss_thresholds(s, &settings) {
                Some(StandingStatus::Qualified) => {
                    effects.push(AdvancementEffect::TeamQualified { team_id: team })
                }
                Some(StandingStatus::Eliminated) => {
                    effects.push(AdvancementEffect::TeamEliminated { team_id: team })
                }
                _ => {}
            }
        }
    }
    effects
}

/// Pairing order: wins desc, losses asc, Buchholz desc, differential desc, seed asc.
fn pairing_order(a: &Standing, b: &Standing) -> Ordering {
    b.wins
        .cmp(&a.wins)
        .then_with(|| a.losses.cmp(&b.losses))
        .then_with(|| b.buchholz.cmp(&a.buchholz))
        .then_with(|| b.score_differential().cmp(&a.score_differential()))
        .then_with(|| a.seed.cmp(&b.seed))
}

/// Pair a set of active teams.
pub fn pair_teams(active: &[Standing]) -> Pairings {
    let mut ranked: Vec<&Standing> = active.iter().collect();
    ranked.sort_by(|a, b| pairing_order(a, b));

    let bye = if ranked.len() % 2 == 1 {
        let pick = ranked
            .iter()
            .rposition(|s| s.byes == 0)
            .unwrap_or(ranked.len() - 1);
        Some(ranked.remove(pick).team_id.clone())
    } else {
        None
    };

    let mut groups: Vec<Vec<&Standing>> = Vec::new();
    for s in ranked {
        match groups.last_mut() {
            Some(g) if g[0].wins == s.wins && g[0].losses == s.losses => g.push(s),
            _ => groups.push(vec![s]),
        }
    }

    let mut pairs: Vec<(&Standing, &Standing)> = Vec::new();
    let mut carry: Vec<&Standing> = Vec::new();
    let group_count = groups.len();

    for (gi, group) in groups.into_iter().enumerate() {
        let mut pool = std::mem::take(&mut carry);
        pool.extend(group);
        let last = gi + 1 == group_count;

        if pool.len() % 2 == 0 {
            match perfect_matching(&pool) {
                Some(found) => pairs.extend(found.into_iter().map(|(a, b)| (pool[a], pool[b]))),
                None if last => pairs.extend(greedy(&pool)),
                None => carry = pool,
            }
        } else if !last {
            match float_down(&pool) {
                Some((found, floater)) => {
                    pairs.extend(found.into_iter().map(|(a, b)| (pool[a], pool[b])));
                    carry.push(pool[floater]);
                }
                None => carry = pool,
            }
        } else {
            // Unreachable with an even total; pair what we can
            pairs.extend(greedy(&pool));
        }
    }

    Pairings {
        pairs: pairs.into_iter().map(|(a, b)| assign_sides(a, b)).collect(),
        bye,
    }
}

/// Higher-ranked `a` takes team1 unless it has sat there more often than `b`.
fn assign_sides(a: &Standing, b: &Standing) -> (TeamId, TeamId) {
    if b.side_balance() < a.side_balance() {
        (b.team_id.clone(), a.team_id.clone())
    } else {
        (a.team_id.clone(), b.team_id.clone())
    }
}

/// Rematch-free perfect matching of an even pool, preferring fold pairings
/// (top half against bottom half).
fn perfect_matching(pool: &[&Standing]) -> Option<Vec<(usize, usize)>> {
    let mut used = vec![false; pool.len()];
    let mut pairs = Vec::with_capacity(pool.len() / 2);
    let mut budget = SEARCH_BUDGET;
    search(pool, &mut used, &mut pairs, &mut budget).then_some(pairs)
}

fn search(
    pool: &[&Standing],
    used: &mut [bool],
    pairs: &mut Vec<(usize, usize)>,
    budget: &mut u32,
) -> bool {
    let Some(first) = used.iter().position(|u| !u) else {
        return true;
    };
    if *budget == 0 {
        return false;
    }
    *budget -= 1;

    used[first] = true;
    let rest: Vec<usize> = (0..pool.len()).filter(|&j| !used[j]).collect();
    // Fold partner of `first` within the remaining pool
    let ideal = ((rest.len() + 1) / 2).saturating_sub(1);
    let mut candidates: Vec<(usize, usize)> = rest.iter().copied().enumerate().collect();
    candidates.sort_by_key(|&(pos, _)| (pos.abs_diff(ideal), pos));

    for (_, j) in candidates {
        if pool[first].has_played(&pool[j].team_id) {
            continue;
        }
        used[j] = true;
        pairs.push((first, j));
        if search(pool, used, pairs, budget) {
            return true;
        }
        pairs.pop();
        used[j] = false;
    }

    used[first] = false;
    false
}

/// For an odd pool: float the lowest-ranked team whose removal leaves a
/// rematch-free matching.
fn float_down(pool: &[&Standing]) -> Option<(Vec<(usize, usize)>, usize)> {
    for floater in (0..pool.len()).rev() {
        let rest: Vec<&Standing> = pool
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != floater)
            .map(|(_, s)| *s)
            .collect();
        if let Some(found) = perfect_matching(&rest) {
            // Map indices of `rest` back to `pool`
            let back = |i: usize| if i >= floater { i + 1 } else { i };
            return Some((
                found.into_iter().map(|(a, b)| (back(a), back(b))).collect(),
                floater,
            ));
        }
    }
    None
}

/// Last resort: pair in order, avoiding rematches where possible.
fn greedy<'a>(pool: &[&'a Standing]) -> Vec<(&'a Standing, &'a Standing)> {
    let mut left: Vec<&Standing> = pool.to_vec();
    let mut pairs = Vec::with_capacity(left.len() / 2);
    while left.len() >= 2 {
        let first = left.remove(0);
        let partner = left
            .iter()
            .position(|s| !first.has_played(&s.team_id))
            .unwrap_or(0);
        let second = left.remove(partner);
        if first.has_played(&second.team_id) {
            debug!("Rematch forced: {} vs {}", first.team_id, second.team_id);
        }
        pairs.push((first, second));
    }
    pairs
}

/// Generate round `round_number` of a Swiss stage.
///
/// The previous round must be finished unless `force` is set, in which case
/// teams still playing sit this round out.
pub fn generate_round(
    record: &mut StageRecord,
    round_number: u32,
    force: bool,
) -> BracketResult<SwissRound> {
    let stage = &record.stage;
    if stage.format != StageFormat::Swiss {
        return Err(BracketError::format_mismatch(format!(
            "stage {} is {}, not swiss",
            stage.id, stage.format
        )));
    }
    match stage.status {
        StageStatus::Pending => {
            return Err(BracketError::stage_conflict(
                stage.status,
                "bracket has not been generated",
            ))
        }
        StageStatus::Completed => {
            return Err(BracketError::stage_conflict(stage.status, "stage is completed"))
        }
        StageStatus::Seeded | StageStatus::InProgress => {}
    }
    if round_number != stage.current_round + 1 {
        return Err(BracketError::validation(format!(
            "next round is {}, got {}",
            stage.current_round + 1,
            round_number
        )));
    }
    if let Some(max) = stage.settings.swiss.max_rounds {
        if stage.current_round >= max {
            return Err(BracketError::stage_conflict(
                stage.status,
                format!("round limit of {} reached", max),
            ));
        }
    }

    // Forced rounds can leave matches of any earlier round in play
    let unfinished: Vec<&Match> = record
        .matches
        .iter()
        .filter(|m| m.section == BracketSection::Swiss && !m.status.is_terminal())
        .collect();
    if !unfinished.is_empty() && !force {
        return Err(BracketError::StateConflict(Conflict::RoundIncomplete {
            round: unfinished
                .iter()
                .map(|m| m.round)
                .min()
                .unwrap_or(stage.current_round),
            unfinished: unfinished.len(),
        }));
    }
    let busy: Vec<TeamId> = unfinished
        .iter()
        .flat_map(|m| [m.team1_id.clone(), m.team2_id.clone()])
        .flatten()
        .collect();

    let eligible: Vec<Standing> = record
        .standings
        .iter()
        .filter(|s| s.is_active() && !busy.contains(&s.team_id))
        .cloned()
        .collect();
    if eligible.len() < 2 {
        return Err(BracketError::stage_conflict(
            stage.status,
            format!("only {} team(s) left to pair", eligible.len()),
        ));
    }

    let pairings = pair_teams(&eligible);
    let stage = record.stage.clone();

    let mut matches = Vec::with_capacity(pairings.pairs.len() + 1);
    for (i, (team1, team2)) in pairings.pairs.iter().enumerate() {
        let source = SlotSource::Pairing {
            round: round_number,
        };
        matches.push(
            new_match(&stage, round_number, i as u32 + 1)
                .with_team(MatchSide::Team1, team1.clone(), source.clone())
                .with_team(MatchSide::Team2, team2.clone(), source),
        );
    }
    if let Some(team) = &pairings.bye {
        let number = matches.len() as u32 + 1;
        matches.push(bye_match(
            &stage,
            round_number,
            number,
            team.clone(),
            SlotSource::Pairing {
                round: round_number,
            },
        ));
    }

    record.matches.extend(matches.iter().cloned());
    record.stage.current_round = round_number;
    let effects = apply_byes(record, round_number);

    info!(
        "Swiss stage {} round {}: {} pairings{}",
        record.stage.id,
        round_number,
        pairings.pairs.len(),
        pairings
            .bye
            .as_ref()
            .map(|t| format!(", bye for {}", t))
            .unwrap_or_default()
    );

    Ok(SwissRound {
        round: round_number,
        matches,
        effects,
    })
}

/// Progress counters for a Swiss stage.
pub fn summary(record: &StageRecord) -> SwissSummary {
    let count = |status: StandingStatus| {
        record
            .standings
            .iter()
            .filter(|s| s.status == status)
            .count()
    };
    let swiss = record
        .matches
        .iter()
        .filter(|m| m.section == BracketSection::Swiss);

    SwissSummary {
        total_teams: record.standings.len(),
        active_teams: count(StandingStatus::Active),
        qualified_teams: count(StandingStatus::Qualified),
        eliminated_teams: count(StandingStatus::Eliminated),
        current_round: record.stage.current_round,
        matches_completed: swiss
            .clone()
            .filter(|m| m.status == MatchStatus::Completed)
            .count(),
        matches_remaining: swiss.filter(|m| !m.status.is_terminal()).count(),
    }
}
