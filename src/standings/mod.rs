//! Standings calculator.
//!
//! Applies completed results to per-team records, keeps Buchholz current,
//! ranks standings and derives final placements.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{
    BracketSection, Match, MatchSide, MatchStatus, Placement, Stage, StageFormat, Standing,
    StandingStatus, SwissSettings, TeamId,
};

/// Zero records for a freshly seeded field.
pub fn initial_standings(stage: &Stage, seeds: &[(TeamId, u32)]) -> Vec<Standing> {
    seeds
        .iter()
        .map(|(team, seed)| Standing::new(stage.id.clone(), team.clone(), *seed))
        .collect()
}

fn find_mut<'a>(standings: &'a mut [Standing], team: &TeamId) -> Option<&'a mut Standing> {
    standings.iter_mut().find(|s| &s.team_id == team)
}

/// Apply a completed head-to-head match to both participants.
///
/// Walkovers count as a win and a loss without touching the score columns.
/// Matches without two participants (byes) are ignored.
pub fn record_result(standings: &mut [Standing], m: &Match) {
    if m.status != MatchStatus::Completed {
        return;
    }
    let (Some(winner), Some(team1), Some(team2)) = (&m.winner_id, &m.team1_id, &m.team2_id)
    else {
        return;
    };

    for (side, team, opponent) in [
        (MatchSide::Team1, team1, team2),
        (MatchSide::Team2, team2, team1),
    ] {
        if let Some(s) = find_mut(standings, team) {
            if team == winner {
                s.wins += 1;
            } else {
                s.losses += 1;
            }
            if !m.walkover {
                s.score_for += m.score(side);
                s.score_against += m.score(side.other());
            }
            s.opponents.push(opponent.clone());
            s.record_side(side);
        }
    }

    recompute_buchholz(standings);
}

/// A Swiss bye: a win with no opponent and no score.
pub fn record_bye(standings: &mut [Standing], team: &TeamId) {
    if let Some(s) = find_mut(standings, team) {
        s.wins += 1;
        s.byes += 1;
    }
    recompute_buchholz(standings);
}

/// Buchholz = sum of the current wins of every opponent faced.
pub fn recompute_buchholz(standings: &mut [Standing]) {
    let wins: HashMap<TeamId, u32> = standings
        .iter()
        .map(|s| (s.team_id.clone(), s.wins))
        .collect();
    for s in standings.iter_mut() {
        s.buchholz = s
            .opponents
            .iter()
            .map(|o| wins.get(o).copied().unwrap_or(0))
            .sum();
    }
}

/// Resolve Swiss thresholds for one team. Returns the new status if it changed.
pub fn apply_swiss_thresholds(
    standing: &mut Standing,
    settings: &SwissSettings,
) -> Option<StandingStatus> {
    let target = if standing.wins >= settings.wins_required {
        StandingStatus::Qualified
    } else if standing.losses >= settings.losses_eliminated {
        StandingStatus::Eliminated
    } else {
        return None;
    };
    standing.resolve(target).then_some(target)
}

/// Output order: wins desc, Buchholz desc, score differential desc, seed asc.
pub fn compare(a: &Standing, b: &Standing) -> Ordering {
    b.wins
        .cmp(&a.wins)
        .then_with(|| b.buchholz.cmp(&a.buchholz))
        .then_with(|| b.score_differential().cmp(&a.score_differential()))
        .then_with(|| a.seed.cmp(&b.seed))
}

/// Standings sorted for output.
pub fn ranked(standings: &[Standing]) -> Vec<Standing> {
    let mut out = standings.to_vec();
    out.sort_by(compare);
    out
}

/// Same record on every ranking key except seed.
fn tied(a: &Standing, b: &Standing) -> bool {
    a.wins == b.wins
        && a.buchholz == b.buchholz
        && a.score_differential() == b.score_differential()
}

/// Final ranking of a stage. Tied teams share a placement (1, 2, 3, 3, 5).
///
/// Elimination formats rank by how deep each team went: the champion first,
/// then qualified teams, then by the last round reached, a win in that round
/// ranking above a loss. Round robin and Swiss follow the standings order.
pub fn placements(stage: &Stage, matches: &[Match], standings: &[Standing]) -> Vec<Placement> {
    let ordered = ranked(standings);

    if !stage.format.is_elimination() {
        let mut out: Vec<Placement> = Vec::with_capacity(ordered.len());
        for (i, s) in ordered.iter().enumerate() {
            let placement = match (i, out.last()) {
                (i, Some(prev)) if tied(&ordered[i - 1], s) => prev.placement,
                (i, _) => i as u32 + 1,
            };
            out.push(Placement {
                placement,
                team_id: s.team_id.clone(),
                wins: s.wins,
                losses: s.losses,
            });
        }
        return out;
    }

    let keyed: Vec<(DepthKey, &Standing)> = ordered
        .iter()
        .map(|s| (depth_key(stage, matches, s), s))
        .collect();
    let mut sorted = keyed;
    sorted.sort_by(|(ka, sa), (kb, sb)| kb.cmp(ka).then_with(|| sa.seed.cmp(&sb.seed)));

    let mut out: Vec<Placement> = Vec::with_capacity(sorted.len());
    for (i, (key, s)) in sorted.iter().enumerate() {
        let placement = match out.last() {
            Some(prev) if i > 0 && sorted[i - 1].0 == *key => prev.placement,
            _ => i as u32 + 1,
        };
        out.push(Placement {
            placement,
            team_id: s.team_id.clone(),
            wins: s.wins,
            losses: s.losses,
        });
    }
    out
}

/// (champion, qualified, depth, won last match). Larger ranks higher.
type DepthKey = (bool, bool, u32, bool);

fn depth_key(stage: &Stage, matches: &[Match], standing: &Standing) -> DepthKey {
    let team = &standing.team_id;
    let champion = stage.champion.as_ref() == Some(team);
    let qualified = standing.status == StandingStatus::Qualified;

    let last = matches
        .iter()
        .filter(|m| m.status == MatchStatus::Completed && m.involves(team))
        .filter(|m| !(m.walkover && m.loser_id.is_none()))
        .max_by_key(|m| effective_round(stage, m));

    match last {
        Some(m) => (
            champion,
            qualified,
            effective_round(stage, m),
            m.winner_id.as_ref() == Some(team),
        ),
        None => (champion, qualified, 0, false),
    }
}

/// Third place is played alongside the final but ranks below it.
fn effective_round(stage: &Stage, m: &Match) -> u32 {
    match (stage.format, m.section) {
        (StageFormat::SingleElim, BracketSection::ThirdPlace) => m.round.saturating_sub(1),
        _ => m.round,
    }
}
