//! Single elimination, also the upper half of double elimination.

use crate::models::{BracketSection, Match, MatchSide, Outcome, SlotSource, Stage};
use crate::seeding::{bracket_size, first_round_pairs, round_count, SeededTeam};

use super::{naming, seat, team_for_seed, wire};

/// A built elimination tree: matches plus their indices grouped by round.
pub(crate) struct Tree {
    pub matches: Vec<Match>,
    pub rounds: Vec<Vec<usize>>,
}

impl Tree {
    pub fn final_index(&self) -> Option<usize> {
        self.rounds.last().and_then(|r| r.first().copied())
    }
}

/// Build a knockout tree over the seeded field.
///
/// Round 1 follows the recursive seed placement; positions beyond the field
/// are declared `Bye`. Every later match is fed by the winners of two
/// adjacent matches of the previous round.
pub(crate) fn build_tree(
    stage: &Stage,
    seeded: &[SeededTeam],
    section: BracketSection,
    name: impl Fn(u32, u32) -> String,
) -> Tree {
    let total = round_count(seeded.len());
    let mut matches = Vec::with_capacity(bracket_size(seeded.len()));
    let mut rounds: Vec<Vec<usize>> = Vec::with_capacity(total as usize);

    let mut first = Vec::new();
    for (i, (high, low)) in first_round_pairs(seeded.len()).into_iter().enumerate() {
        let mut m = Match::new(
            &stage.id,
            section,
            1,
            i as u32 + 1,
            name(1, total),
            stage.best_of(),
        );
        if let Some(top) = team_for_seed(seeded, high) {
            m = seat(m, MatchSide::Team1, top);
        }
        m = match low.and_then(|seed| team_for_seed(seeded, seed)) {
            Some(bottom) => seat(m, MatchSide::Team2, bottom),
            None => m.with_source(MatchSide::Team2, SlotSource::Bye),
        };
        first.push(matches.len());
        matches.push(m);
    }
    rounds.push(first);

    for round in 2..=total {
        let feeders = rounds[rounds.len() - 1].clone();
        let mut current = Vec::with_capacity(feeders.len() / 2);
        for (i, pair) in feeders.chunks(2).enumerate() {
            let idx = matches.len();
            matches.push(Match::new(
                &stage.id,
                section,
                round,
                i as u32 + 1,
                name(round, total),
                stage.best_of(),
            ));
            wire(&mut matches, pair[0], Outcome::Winner, idx, MatchSide::Team1);
            wire(&mut matches, pair[1], Outcome::Winner, idx, MatchSide::Team2);
            current.push(idx);
        }
        rounds.push(current);
    }

    Tree { matches, rounds }
}

/// Single elimination bracket, with an optional third place match fed by
/// the semifinal losers.
pub fn build(stage: &Stage, seeded: &[SeededTeam]) -> Vec<Match> {
    let mut tree = build_tree(stage, seeded, BracketSection::Main, naming::elimination_round);

    if stage.settings.third_place_match && tree.rounds.len() >= 2 {
        let semis = tree.rounds[tree.rounds.len() - 2].clone();
        let round = tree.rounds.len() as u32;
        let idx = tree.matches.len();
        tree.matches.push(Match::new(
            &stage.id,
            BracketSection::ThirdPlace,
            round,
            1,
            naming::THIRD_PLACE,
            stage.best_of(),
        ));
        wire(&mut tree.matches, semis[0], Outcome::Loser, idx, MatchSide::Team1);
        wire(&mut tree.matches, semis[1], Outcome::Loser, idx, MatchSide::Team2);
    }

    tree.matches
}
