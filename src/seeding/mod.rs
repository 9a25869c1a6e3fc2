//! Seeding engine.
//!
//! Orders competitors into seed ranks and maps seeds onto bracket positions:
//! - rating / random / manual ordering, plus balanced and regional spreads
//! - classic recursive bracket placement (1v8, 4v5, 2v7, 3v6)
//! - bye assignment to top seeds when the field is not a power of two

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BracketError, BracketResult};
use crate::models::{SeedingMethod, Team};

/// A team with its seed rank (1 = top seed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeededTeam {
    pub seed: u32,
    pub team: Team,
}

/// Build the RNG used for random seeding and pairing.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Order teams into seed ranks.
pub fn seed_teams<R: Rng + ?Sized>(
    teams: &[Team],
    method: SeedingMethod,
    rng: &mut R,
) -> BracketResult<Vec<SeededTeam>> {
    if teams.len() < 2 {
        return Err(BracketError::InsufficientTeams {
            needed: 2,
            actual: teams.len(),
        });
    }

    let mut seen = HashSet::new();
    for team in teams {
        if !seen.insert(&team.id) {
            return Err(BracketError::validation(format!(
                "team {} listed more than once",
                team.id
            )));
        }
    }

    let ordered = match method {
        SeedingMethod::Rating => by_rating(teams.to_vec()),
        SeedingMethod::Random => {
            let mut shuffled = teams.to_vec();
            shuffled.shuffle(rng);
            shuffled
        }
        SeedingMethod::Manual => manual(teams)?,
        SeedingMethod::Balanced => balanced(teams),
        SeedingMethod::Regional => regional(teams),
    };

    debug!("Seeded {} teams using {:?}", ordered.len(), method);

    Ok(ordered
        .into_iter()
        .enumerate()
        .map(|(i, team)| SeededTeam {
            seed: i as u32 + 1,
            team,
        })
        .collect())
}

/// Rating descending, unrated last; ties keep input order.
fn by_rating(mut teams: Vec<Team>) -> Vec<Team> {
    teams.sort_by(|a, b| {
        let ra = a.rating.unwrap_or(f64::NEG_INFINITY);
        let rb = b.rating.unwrap_or(f64::NEG_INFINITY);
        rb.total_cmp(&ra)
    });
    teams
}

/// Explicit seeds first (ascending), then unseeded teams in input order.
fn manual(teams: &[Team]) -> BracketResult<Vec<Team>> {
    let mut explicit: Vec<&Team> = teams.iter().filter(|t| t.seed.is_some()).collect();
    explicit.sort_by_key(|t| t.seed);

    for pair in explicit.windows(2) {
        if pair[0].seed == pair[1].seed {
            return Err(BracketError::validation(format!(
                "manual seed {} assigned to both {} and {}",
                pair[0].seed.unwrap_or_default(),
                pair[0].id,
                pair[1].id
            )));
        }
    }

    Ok(explicit
        .into_iter()
        .chain(teams.iter().filter(|t| t.seed.is_none()))
        .cloned()
        .collect())
}

const BALANCE_TIERS: usize = 4;

/// Split the rating order into four tiers and interleave them.
fn balanced(teams: &[Team]) -> Vec<Team> {
    let rated = by_rating(teams.to_vec());
    let tier_size = rated.len().div_ceil(BALANCE_TIERS).max(1);
    let tiers: Vec<&[Team]> = rated.chunks(tier_size).collect();
    let longest = tiers.iter().map(|t| t.len()).max().unwrap_or(0);

    let mut out = Vec::with_capacity(rated.len());
    for pos in 0..longest {
        for tier in &tiers {
            if let Some(team) = tier.get(pos) {
                out.push(team.clone());
            }
        }
    }
    out
}

/// Round-robin across regions (first-appearance order), each region rating-sorted.
fn regional(teams: &[Team]) -> Vec<Team> {
    let mut groups: Vec<(String, Vec<Team>)> = Vec::new();
    for team in teams {
        let region = team.region.clone().unwrap_or_else(|| "Unknown".to_string());
        match groups.iter_mut().find(|(r, _)| *r == region) {
            Some((_, members)) => members.push(team.clone()),
            None => groups.push((region, vec![team.clone()])),
        }
    }

    let groups: Vec<Vec<Team>> = groups.into_iter().map(|(_, g)| by_rating(g)).collect();
    let longest = groups.iter().map(Vec::len).max().unwrap_or(0);

    let mut out = Vec::with_capacity(teams.len());
    for pos in 0..longest {
        for group in &groups {
            if let Some(team) = group.get(pos) {
                out.push(team.clone());
            }
        }
    }
    out
}

/// Bracket size for a field: the next power of two, at least 2.
pub fn bracket_size(team_count: usize) -> usize {
    team_count.max(2).next_power_of_two()
}

/// Number of elimination rounds: ceil(log2(team_count)).
pub fn round_count(team_count: usize) -> u32 {
    bracket_size(team_count).trailing_zeros()
}

/// Seed placement for a bracket of `bracket_size` positions.
///
/// Recursive: sizes up to 2 yield `[1, 2]`; otherwise every seed `s` of the
/// half-size order is followed by `bracket_size + 1 - s`.
pub fn generate_seeding_order(bracket_size: usize) -> Vec<u32> {
    if bracket_size <= 2 {
        return vec![1, 2];
    }
    let size = bracket_size as u32;
    generate_seeding_order(bracket_size / 2)
        .into_iter()
        .flat_map(|s| [s, size + 1 - s])
        .collect()
}

/// Round-1 seed pairs for a field of `team_count` teams. Positions beyond the
/// field are byes, so the partner is `None`; those always fall to top seeds.
pub fn first_round_pairs(team_count: usize) -> Vec<(u32, Option<u32>)> {
    let order = generate_seeding_order(bracket_size(team_count));
    let n = team_count as u32;
    order
        .chunks(2)
        .map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            let (high, low) = if a < b { (a, b) } else { (b, a) };
            (high, (low <= n).then_some(low))
        })
        .collect()
}

/// Seeds that receive a first-round bye.
pub fn bye_seeds(team_count: usize) -> Vec<u32> {
    let mut byes: Vec<u32> = first_round_pairs(team_count)
        .into_iter()
        .filter(|(_, partner)| partner.is_none())
        .map(|(seed, _)| seed)
        .collect();
    byes.sort_unstable();
    byes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn teams(n: usize) -> Vec<Team> {
        (1..=n)
            .map(|i| Team::new(format!("t{}", i), format!("Team {}", i)).with_rating(i as f64))
            .collect()
    }

    fn ids(seeded: &[SeededTeam]) -> Vec<&str> {
        seeded.iter().map(|s| s.team.id.as_str()).collect()
    }

    #[test]
    fn test_seeding_order_eight() {
        assert_eq!(generate_seeding_order(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
    }

    #[test]
    fn test_seeding_order_small_sizes() {
        assert_eq!(generate_seeding_order(1), vec![1, 2]);
        assert_eq!(generate_seeding_order(2), vec![1, 2]);
        assert_eq!(generate_seeding_order(4), vec![1, 4, 2, 3]);
    }

    #[test]
    fn test_seeding_order_sixteen_is_permutation() {
        let order = generate_seeding_order(16);
        assert_eq!(order.len(), 16);
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..=16).collect::<Vec<u32>>());
        // Every round-1 pair sums to size + 1
        assert!(order.chunks(2).all(|p| p[0] + p[1] == 17));
    }

    #[test]
    fn test_round_count_and_bracket_size() {
        assert_eq!(bracket_size(5), 8);
        assert_eq!(round_count(5), 3);
        assert_eq!(round_count(8), 3);
        assert_eq!(round_count(9), 4);
        assert_eq!(round_count(2), 1);
    }

    #[test]
    fn test_byes_go_to_top_seeds() {
        assert_eq!(bye_seeds(5), vec![1, 2, 3]);
        assert_eq!(bye_seeds(6), vec![1, 2]);
        assert!(bye_seeds(8).is_empty());
    }

    #[test]
    fn test_first_round_pairs_five_teams() {
        assert_eq!(
            first_round_pairs(5),
            vec![(1, None), (4, Some(5)), (2, None), (3, None)]
        );
    }

    #[test]
    fn test_rating_seeding_descending_unrated_last() {
        let mut field = teams(3);
        field.push(Team::new("unrated", "Unrated"));
        let seeded = seed_teams(&field, SeedingMethod::Rating, &mut make_rng(Some(1))).unwrap();
        assert_eq!(ids(&seeded), vec!["t3", "t2", "t1", "unrated"]);
        assert_eq!(seeded[0].seed, 1);
        assert_eq!(seeded[3].seed, 4);
    }

    #[test]
    fn test_manual_seeding_preserves_order() {
        let field = teams(4);
        let seeded = seed_teams(&field, SeedingMethod::Manual, &mut make_rng(Some(1))).unwrap();
        assert_eq!(ids(&seeded), vec!["t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn test_manual_seeding_explicit_seeds_first() {
        let field = vec![
            Team::new("a", "A"),
            Team::new("b", "B").with_seed(2),
            Team::new("c", "C").with_seed(1),
        ];
        let seeded = seed_teams(&field, SeedingMethod::Manual, &mut make_rng(None)).unwrap();
        assert_eq!(ids(&seeded), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_manual_seeding_rejects_duplicate_seed() {
        let field = vec![
            Team::new("a", "A").with_seed(1),
            Team::new("b", "B").with_seed(1),
        ];
        let err = seed_teams(&field, SeedingMethod::Manual, &mut make_rng(None)).unwrap_err();
        assert!(matches!(err, BracketError::Validation(_)));
    }

    #[test]
    fn test_random_seeding_is_permutation_and_reproducible() {
        let field = teams(8);
        let a = seed_teams(&field, SeedingMethod::Random, &mut make_rng(Some(42))).unwrap();
        let b = seed_teams(&field, SeedingMethod::Random, &mut make_rng(Some(42))).unwrap();
        assert_eq!(ids(&a), ids(&b));

        let mut sorted: Vec<&str> = ids(&a);
        sorted.sort_unstable();
        let mut expected: Vec<&str> = field.iter().map(|t| t.id.as_str()).collect();
        expected.sort_unstable();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_insufficient_teams() {
        let err = seed_teams(&teams(1), SeedingMethod::Rating, &mut make_rng(None)).unwrap_err();
        assert!(matches!(
            err,
            BracketError::InsufficientTeams {
                needed: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_duplicate_team_rejected() {
        let field = vec![Team::new("a", "A"), Team::new("a", "A again")];
        let err = seed_teams(&field, SeedingMethod::Rating, &mut make_rng(None)).unwrap_err();
        assert!(matches!(err, BracketError::Validation(_)));
    }

    #[test]
    fn test_balanced_interleaves_tiers() {
        // Rating order t8..t1 -> tiers [t8,t7] [t6,t5] [t4,t3] [t2,t1]
        let seeded = seed_teams(&teams(8), SeedingMethod::Balanced, &mut make_rng(None)).unwrap();
        assert_eq!(
            ids(&seeded),
            vec!["t8", "t6", "t4", "t2", "t7", "t5", "t3", "t1"]
        );
    }

    #[test]
    fn test_balanced_keeps_every_team() {
        let seeded = seed_teams(&teams(7), SeedingMethod::Balanced, &mut make_rng(None)).unwrap();
        assert_eq!(seeded.len(), 7);
    }

    #[test]
    fn test_regional_interleaves_regions() {
        let field = vec![
            Team::new("eu1", "EU 1").with_region("EU").with_rating(10.0),
            Team::new("eu2", "EU 2").with_region("EU").with_rating(20.0),
            Team::new("na1", "NA 1").with_region("NA").with_rating(15.0),
            Team::new("na2", "NA 2").with_region("NA").with_rating(5.0),
        ];
        let seeded = seed_teams(&field, SeedingMethod::Regional, &mut make_rng(None)).unwrap();
        assert_eq!(ids(&seeded), vec!["eu2", "na1", "eu1", "na2"]);
    }
}
