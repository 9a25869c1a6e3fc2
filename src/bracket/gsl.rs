//! GSL group: a fixed five match, four team double elimination.

use crate::models::{BracketSection, Match, MatchSide, Outcome, Stage};
use crate::seeding::SeededTeam;

use super::{naming, seat, team_for_seed, wire};

const OPENER_A: usize = 0;
const OPENER_B: usize = 1;
const WINNERS: usize = 2;
const ELIMINATION: usize = 3;
const DECIDER: usize = 4;

/// Build the group. The field must already be validated to four teams.
///
/// Opener A is seed 1 vs 4, Opener B seed 2 vs 3. Opener winners meet in the
/// Winners Match (its winner qualifies), losers in the Elimination Match
/// (its loser is out). The Winners Match loser meets the Elimination Match
/// winner in the Decider, whose winner is the group champion.
pub fn build(stage: &Stage, seeded: &[SeededTeam]) -> Vec<Match> {
    let new = |round: u32, number: u32, name: &str| {
        Match::new(
            &stage.id,
            BracketSection::Group,
            round,
            number,
            name,
            stage.best_of(),
        )
    };

    let mut opener_a = new(1, 1, naming::GSL_OPENER_A);
    let mut opener_b = new(1, 2, naming::GSL_OPENER_B);
    for (m, (high, low)) in [(&mut opener_a, (1, 4)), (&mut opener_b, (2, 3))] {
        if let Some(team) = team_for_seed(seeded, high) {
            *m = seat(m.clone(), MatchSide::Team1, team);
        }
        if let Some(team) = team_for_seed(seeded, low) {
            *m = seat(m.clone(), MatchSide::Team2, team);
        }
    }

    let mut matches = vec![
        opener_a,
        opener_b,
        new(2, 1, naming::GSL_WINNERS),
        new(2, 2, naming::GSL_ELIMINATION),
        new(3, 1, naming::GSL_DECIDER),
    ];

    wire(&mut matches, OPENER_A, Outcome::Winner, WINNERS, MatchSide::Team1);
    wire(&mut matches, OPENER_B, Outcome::Winner, WINNERS, MatchSide::Team2);
    wire(&mut matches, OPENER_A, Outcome::Loser, ELIMINATION, MatchSide::Team1);
    wire(&mut matches, OPENER_B, Outcome::Loser, ELIMINATION, MatchSide::Team2);
    wire(&mut matches, WINNERS, Outcome::Loser, DECIDER, MatchSide::Team1);
    wire(&mut matches, ELIMINATION, Outcome::Winner, DECIDER, MatchSide::Team2);

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::tests::{field, stage};
    use crate::models::{MatchStatus, SlotSource, StageFormat, TeamId};

    #[test]
    fn test_openers_follow_seeds() {
        let matches = build(&stage(StageFormat::Gsl), &field(4));
        assert_eq!(matches.len(), 5);

        assert_eq!(matches[OPENER_A].team1_id, Some(TeamId::from("t1")));
        assert_eq!(matches[OPENER_A].team2_id, Some(TeamId::from("t4")));
        assert_eq!(matches[OPENER_B].team1_id, Some(TeamId::from("t2")));
        assert_eq!(matches[OPENER_B].team2_id, Some(TeamId::from("t3")));
        assert_eq!(matches[OPENER_A].status, MatchStatus::Ready);
    }

    #[test]
    fn test_wiring() {
        let m = build(&stage(StageFormat::Gsl), &field(4));

        assert_eq!(m[OPENER_A].winner_advances_to.as_ref(), Some(&m[WINNERS].id));
        assert_eq!(m[OPENER_A].loser_advances_to.as_ref(), Some(&m[ELIMINATION].id));
        assert_eq!(m[OPENER_B].winner_advances_to.as_ref(), Some(&m[WINNERS].id));
        assert_eq!(m[OPENER_B].loser_advances_to.as_ref(), Some(&m[ELIMINATION].id));
        assert_eq!(m[WINNERS].loser_advances_to.as_ref(), Some(&m[DECIDER].id));
        assert!(m[WINNERS].winner_advances_to.is_none());
        assert_eq!(m[ELIMINATION].winner_advances_to.as_ref(), Some(&m[DECIDER].id));
        assert!(m[ELIMINATION].loser_advances_to.is_none());
        assert!(m[DECIDER].is_terminal());
    }

    #[test]
    fn test_decider_sources() {
        let m = build(&stage(StageFormat::Gsl), &field(4));
        assert_eq!(
            m[DECIDER].team1_source,
            Some(SlotSource::advanced(Outcome::Loser, &m[WINNERS].id))
        );
        assert_eq!(
            m[DECIDER].team2_source,
            Some(SlotSource::advanced(Outcome::Winner, &m[ELIMINATION].id))
        );
        assert_eq!(m[DECIDER].round_name, "Decider Match");
    }
}
