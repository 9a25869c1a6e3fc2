//! Bracket builder.
//!
//! Turns a seeded field into the complete match skeleton of a stage, with
//! every advancement edge and declared slot source in place. Nothing is
//! persisted here; the caller commits the result in one write.

pub mod double;
pub mod gsl;
pub mod naming;
pub mod round_robin;
pub mod single;

use rand::Rng;
use tracing::debug;

use crate::error::{BracketError, BracketResult};
use crate::models::{Match, MatchSide, Outcome, SlotSource, Stage, StageFormat};
use crate::seeding::SeededTeam;

/// Hard upper bound on the field size of any stage.
pub const MAX_TEAMS: usize = 128;

/// Build every match of a freshly seeded stage.
///
/// Swiss stages only get their first round; later rounds come from the
/// pairing engine once results are in.
pub fn build_matches<R: Rng + ?Sized>(
    stage: &Stage,
    seeded: &[SeededTeam],
    rng: &mut R,
) -> BracketResult<Vec<Match>> {
    validate_field(stage, seeded.len())?;

    let matches = match stage.format {
        StageFormat::SingleElim => single::build(stage, seeded),
        StageFormat::DoubleElim => double::build(stage, seeded),
        StageFormat::Gsl => gsl::build(stage, seeded),
        StageFormat::RoundRobin => round_robin::build(stage, seeded),
        StageFormat::Swiss => crate::swiss::first_round(stage, seeded, rng),
    };

    debug!(
        "Built {} matches for {} stage {} ({} teams)",
        matches.len(),
        stage.format,
        stage.id,
        seeded.len()
    );
    Ok(matches)
}

/// Reject field sizes the format cannot hold, before anything is built.
pub fn validate_field(stage: &Stage, team_count: usize) -> BracketResult<()> {
    if team_count < 2 {
        return Err(BracketError::InsufficientTeams {
            needed: 2,
            actual: team_count,
        });
    }

    let limit = MAX_TEAMS.min(stage.max_teams() as usize);
    if team_count > limit {
        return Err(BracketError::format_mismatch(format!(
            "{} teams exceeds the stage limit of {}",
            team_count, limit
        )));
    }

    match stage.format {
        StageFormat::Gsl if team_count != 4 => Err(BracketError::format_mismatch(format!(
            "GSL groups take exactly 4 teams, got {}",
            team_count
        ))),
        StageFormat::DoubleElim if team_count < 3 => Err(BracketError::format_mismatch(format!(
            "double elimination needs at least 3 teams, got {}",
            team_count
        ))),
        _ => Ok(()),
    }
}

/// Team holding a seed rank. Seeds are dense 1..=N.
pub(crate) fn team_for_seed(seeded: &[SeededTeam], seed: u32) -> Option<&SeededTeam> {
    seeded.iter().find(|s| s.seed == seed)
}

/// Place a seeded team in a slot.
pub(crate) fn seat(m: Match, side: MatchSide, seeded: &SeededTeam) -> Match {
    m.with_team(
        side,
        seeded.team.id.clone(),
        SlotSource::Seed { seed: seeded.seed },
    )
}

/// Add an advancement edge `from --outcome--> to` and declare the target slot.
pub(crate) fn wire(matches: &mut [Match], from: usize, outcome: Outcome, to: usize, side: MatchSide) {
    let target_id = matches[to].id.clone();
    let source_id = matches[from].id.clone();
    match outcome {
        Outcome::Winner => matches[from].winner_advances_to = Some(target_id),
        Outcome::Loser => matches[from].loser_advances_to = Some(target_id),
    }
    *matches[to].source_mut(side) = Some(SlotSource::advanced(outcome, &source_id));
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{StageId, StageSettings, Team};
    use crate::seeding::make_rng;

    pub(crate) fn stage(format: StageFormat) -> Stage {
        Stage::new(
            StageId::from("stage-1"),
            "Test Stage".to_string(),
            format,
            StageSettings::default(),
        )
    }

    pub(crate) fn field(n: u32) -> Vec<SeededTeam> {
        (1..=n)
            .map(|seed| SeededTeam {
                seed,
                team: Team::new(format!("t{}", seed), format!("Team {}", seed)),
            })
            .collect()
    }

    #[test]
    fn test_rejects_single_team() {
        let err = build_matches(&stage(StageFormat::SingleElim), &field(1), &mut make_rng(None))
            .unwrap_err();
        assert!(matches!(err, BracketError::InsufficientTeams { .. }));
    }

    #[test]
    fn test_rejects_gsl_with_five() {
        let err =
            build_matches(&stage(StageFormat::Gsl), &field(5), &mut make_rng(None)).unwrap_err();
        assert!(matches!(err, BracketError::FormatMismatch(_)));
    }

    #[test]
    fn test_rejects_oversized_field() {
        let err = build_matches(&stage(StageFormat::SingleElim), &field(129), &mut make_rng(None))
            .unwrap_err();
        assert!(matches!(err, BracketError::FormatMismatch(_)));

        let mut small = stage(StageFormat::RoundRobin);
        small.settings.max_teams = 6;
        let err = build_matches(&small, &field(7), &mut make_rng(None)).unwrap_err();
        assert!(matches!(err, BracketError::FormatMismatch(_)));
    }

    #[test]
    fn test_accepts_max_field() {
        let matches =
            build_matches(&stage(StageFormat::SingleElim), &field(128), &mut make_rng(None))
                .unwrap();
        assert_eq!(matches.len(), 127);
    }

    #[test]
    fn test_edges_point_to_later_rounds() {
        for format in [StageFormat::SingleElim, StageFormat::DoubleElim, StageFormat::Gsl] {
            let n = if format == StageFormat::Gsl { 4 } else { 11 };
            let matches = build_matches(&stage(format), &field(n), &mut make_rng(None)).unwrap();
            for m in &matches {
                for target in [&m.winner_advances_to, &m.loser_advances_to]
                    .into_iter()
                    .flatten()
                {
                    let t = matches.iter().find(|x| &x.id == target).unwrap();
                    assert!(t.round > m.round, "{} -> {} in {}", m.round, t.round, format);
                }
            }
        }
    }

    #[test]
    fn test_match_ids_unique() {
        let matches =
            build_matches(&stage(StageFormat::DoubleElim), &field(16), &mut make_rng(None))
                .unwrap();
        let mut ids: Vec<_> = matches.iter().map(|m| m.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), matches.len());
    }
}
