//! Double elimination.
//!
//! With an upper bracket of `k` rounds the lower bracket has `2k - 2`:
//! lower round 1 pairs the upper round 1 losers, then each upper round
//! `j >= 2` drops its losers into lower round `2(j - 1)` against the lower
//! survivors, followed by a survivor-only round while `j < k`. Drop-in order
//! is reversed on even upper rounds so early opponents do not meet again
//! straight away.
//!
//! Global round numbers: upper round `j` is `j`, lower round `r` is `r + 1`,
//! the grand final is `2k` and the reset `2k + 1`.

use crate::models::{BracketSection, Match, MatchSide, Outcome, SlotSource, Stage};
use crate::seeding::SeededTeam;

use super::single::build_tree;
use super::{naming, wire};

pub fn build(stage: &Stage, seeded: &[SeededTeam]) -> Vec<Match> {
    let tree = build_tree(stage, seeded, BracketSection::Upper, naming::upper_round);
    let upper_final = tree.final_index();
    let upper_rounds = tree.rounds;
    let mut matches = tree.matches;

    let k = upper_rounds.len() as u32;
    let lower_total = 2 * k - 2;
    let mut lower_rounds: Vec<Vec<usize>> = Vec::with_capacity(lower_total as usize);

    let push_lower = |matches: &mut Vec<Match>, lower: u32, number: u32| -> usize {
        matches.push(Match::new(
            &stage.id,
            BracketSection::Lower,
            lower + 1,
            number,
            naming::lower_round(lower, lower_total),
            stage.best_of(),
        ));
        matches.len() - 1
    };

    // Lower round 1: upper round 1 losers in pairs
    let mut first = Vec::new();
    for (i, pair) in upper_rounds[0].chunks(2).enumerate() {
        let idx = push_lower(&mut matches, 1, i as u32 + 1);
        wire(&mut matches, pair[0], Outcome::Loser, idx, MatchSide::Team1);
        wire(&mut matches, pair[1], Outcome::Loser, idx, MatchSide::Team2);
        first.push(idx);
    }
    lower_rounds.push(first);

    for j in 2..=k {
        // Drop-in round
        let lower = 2 * (j - 1);
        let survivors = lower_rounds[lower_rounds.len() - 1].clone();
        let droppers = &upper_rounds[(j - 1) as usize];
        let count = droppers.len();
        let mut drop_in = Vec::with_capacity(count);
        for m in 0..count {
            let idx = push_lower(&mut matches, lower, m as u32 + 1);
            let dropper = if j % 2 == 0 { droppers[count - 1 - m] } else { droppers[m] };
            wire(&mut matches, survivors[m], Outcome::Winner, idx, MatchSide::Team1);
            wire(&mut matches, dropper, Outcome::Loser, idx, MatchSide::Team2);
            drop_in.push(idx);
        }
        lower_rounds.push(drop_in);

        if j < k {
            // Survivor round
            let lower = lower + 1;
            let feeders = lower_rounds[lower_rounds.len() - 1].clone();
            let mut survivor = Vec::with_capacity(feeders.len() / 2);
            for (i, pair) in feeders.chunks(2).enumerate() {
                let idx = push_lower(&mut matches, lower, i as u32 + 1);
                wire(&mut matches, pair[0], Outcome::Winner, idx, MatchSide::Team1);
                wire(&mut matches, pair[1], Outcome::Winner, idx, MatchSide::Team2);
                survivor.push(idx);
            }
            lower_rounds.push(survivor);
        }
    }

    let grand_final = matches.len();
    matches.push(Match::new(
        &stage.id,
        BracketSection::GrandFinal,
        2 * k,
        1,
        naming::GRAND_FINAL,
        stage.best_of(),
    ));
    if let Some(upper_final) = upper_final {
        wire(&mut matches, upper_final, Outcome::Winner, grand_final, MatchSide::Team1);
    }
    if let Some(&lower_final) = lower_rounds.last().and_then(|r| r.first()) {
        wire(&mut matches, lower_final, Outcome::Winner, grand_final, MatchSide::Team2);
    }

    if stage.settings.bracket_reset {
        // Filled by progression only when the lower bracket team takes the
        // grand final; the grand final itself keeps no outgoing edge.
        let gf_id = matches[grand_final].id.clone();
        let reset = Match::new(
            &stage.id,
            BracketSection::BracketReset,
            2 * k + 1,
            1,
            naming::GRAND_FINAL_RESET,
            stage.best_of(),
        )
        .with_source(
            MatchSide::Team1,
            SlotSource::advanced(Outcome::Loser, &gf_id),
        )
        .with_source(
            MatchSide::Team2,
            SlotSource::advanced(Outcome::Winner, &gf_id),
        );
        matches.push(reset);
    }

    matches
}
