//! Round robin: every unordered pair meets once (twice with return fixtures).

use crate::models::{BracketSection, Match, MatchSide, Stage};
use crate::seeding::SeededTeam;

use super::{naming, seat};

pub fn build(stage: &Stage, seeded: &[SeededTeam]) -> Vec<Match> {
    let mut ordered: Vec<&SeededTeam> = seeded.iter().collect();
    ordered.sort_by_key(|s| s.seed);

    let mut matches = Vec::new();
    let mut number = 0;
    for (i, home) in ordered.iter().enumerate() {
        for away in &ordered[i + 1..] {
            number += 1;
            let m = Match::new(
                &stage.id,
                BracketSection::RoundRobin,
                1,
                number,
                naming::ROUND_ROBIN,
                stage.best_of(),
            );
            matches.push(seat(seat(m, MatchSide::Team1, home), MatchSide::Team2, away));
        }
    }

    if stage.settings.double_round_robin {
        let returns: Vec<Match> = matches
            .iter()
            .map(|first| {
                let m = Match::new(
                    &stage.id,
                    BracketSection::RoundRobin,
                    2,
                    first.match_number,
                    naming::ROUND_ROBIN_RETURN,
                    stage.best_of(),
                );
                // Sides swapped
                let home = first.team2_id.clone();
                let away = first.team1_id.clone();
                let home_source = first.team2_source.clone();
                let away_source = first.team1_source.clone();
                match (home, away, home_source, away_source) {
                    (Some(h), Some(a), Some(hs), Some(as_)) => m
                        .with_team(MatchSide::Team1, h, hs)
                        .with_team(MatchSide::Team2, a, as_),
                    _ => m,
                }
            })
            .collect();
        matches.extend(returns);
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::tests::{field, stage};
    use crate::models::{MatchStatus, StageFormat, TeamId};
    use std::collections::HashSet;

    fn pair_key(m: &Match) -> (TeamId, TeamId) {
        let a = m.team1_id.clone().unwrap();
        let b = m.team2_id.clone().unwrap();
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    #[test]
    fn test_four_teams_six_matches_each_pair_once() {
        let matches = build(&stage(StageFormat::RoundRobin), &field(4));
        assert_eq!(matches.len(), 6);

        let pairs: HashSet<_> = matches.iter().map(pair_key).collect();
        assert_eq!(pairs.len(), 6);
        assert!(matches.iter().all(|m| m.round_name == "Round Robin"));
        assert!(matches.iter().all(|m| m.status == MatchStatus::Ready));
        assert!(matches.iter().all(Match::is_terminal));
    }

    #[test]
    fn test_match_count_formula() {
        for n in 2..=10u32 {
            let matches = build(&stage(StageFormat::RoundRobin), &field(n));
            assert_eq!(matches.len() as u32, n * (n - 1) / 2);
        }
    }

    #[test]
    fn test_double_round_robin_swaps_sides() {
        let mut s = stage(StageFormat::RoundRobin);
        s.settings.double_round_robin = true;
        let matches = build(&s, &field(3));
        assert_eq!(matches.len(), 6);

        let first = &matches[0];
        let ret = matches
            .iter()
            .find(|m| m.round == 2 && m.match_number == first.match_number)
            .unwrap();
        assert_eq!(ret.team1_id, first.team2_id);
        assert_eq!(ret.team2_id, first.team1_id);
        assert_eq!(ret.round_name, "Round Robin (Return)");
        assert_ne!(ret.id, first.id);
    }
}
