//! Per-stage generation settings.

use serde::{Deserialize, Serialize};

/// How competitors are ordered into seed ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeedingMethod {
    /// Rating descending; unrated teams last
    #[default]
    Rating,
    /// Uniform shuffle
    Random,
    /// Caller-supplied order (explicit seeds first, then input order)
    Manual,
    /// Rating tiers interleaved so strength is spread across the bracket
    Balanced,
    /// Regions interleaved so same-region teams meet late
    Regional,
}

impl std::str::FromStr for SeedingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rating" => Ok(SeedingMethod::Rating),
            "random" => Ok(SeedingMethod::Random),
            "manual" => Ok(SeedingMethod::Manual),
            "balanced" => Ok(SeedingMethod::Balanced),
            "regional" => Ok(SeedingMethod::Regional),
            other => Err(format!("unknown seeding method: {}", other)),
        }
    }
}

/// Pairing method for the first Swiss round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SwissFirstRound {
    /// Fold pairing: seed 1 vs seed N/2+1, 2 vs N/2+2, ...
    #[default]
    Seeded,
    /// Shuffle, then pair adjacent teams
    Random,
}

/// Swiss qualification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwissSettings {
    /// Wins needed to qualify
    #[serde(default = "default_wins_required")]
    pub wins_required: u32,

    /// Losses that eliminate
    #[serde(default = "default_losses_eliminated")]
    pub losses_eliminated: u32,

    /// First round pairing method
    #[serde(default)]
    pub first_round: SwissFirstRound,

    /// Hard cap on the number of rounds (None = until every team is resolved)
    #[serde(default)]
    pub max_rounds: Option<u32>,
}

fn default_wins_required() -> u32 {
    3
}

fn default_losses_eliminated() -> u32 {
    3
}

impl Default for SwissSettings {
    fn default() -> Self {
        Self {
            wins_required: default_wins_required(),
            losses_eliminated: default_losses_eliminated(),
            first_round: SwissFirstRound::default(),
            max_rounds: None,
        }
    }
}

/// Settings captured on a stage when its bracket is generated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageSettings {
    /// Default best-of for every match in the stage (odd)
    pub best_of: u32,

    /// Largest accepted team count
    pub max_teams: u32,

    /// Seeding method applied to the incoming team list
    pub seeding: SeedingMethod,

    /// Double elimination: play a reset match when the lower bracket team wins the grand final
    pub bracket_reset: bool,

    /// Single elimination: semifinal losers play for third place
    pub third_place_match: bool,

    /// Round robin: add return fixtures with sides swapped
    pub double_round_robin: bool,

    /// Round robin: top N teams qualify once every match is completed
    pub advance_count: Option<u32>,

    /// Swiss thresholds and pairing
    pub swiss: SwissSettings,

    /// Fixed RNG seed for random seeding / pairing (reproducible brackets)
    pub rng_seed: Option<u64>,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            best_of: 3,
            max_teams: 128,
            seeding: SeedingMethod::Rating,
            bracket_reset: true,
            third_place_match: false,
            double_round_robin: false,
            advance_count: None,
            swiss: SwissSettings::default(),
            rng_seed: None,
        }
    }
}

impl StageSettings {
    /// Wins needed to take a match at this stage's default best-of.
    pub fn wins_needed(&self) -> u32 {
        wins_needed(self.best_of)
    }
}

/// ceil(best_of / 2)
pub fn wins_needed(best_of: u32) -> u32 {
    best_of.div_ceil(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wins_needed() {
        assert_eq!(wins_needed(1), 1);
        assert_eq!(wins_needed(3), 2);
        assert_eq!(wins_needed(5), 3);
        assert_eq!(wins_needed(7), 4);
    }

    #[test]
    fn test_seeding_method_from_str() {
        assert_eq!("rating".parse::<SeedingMethod>(), Ok(SeedingMethod::Rating));
        assert_eq!("Manual".parse::<SeedingMethod>(), Ok(SeedingMethod::Manual));
        assert!("elo".parse::<SeedingMethod>().is_err());
    }

    #[test]
    fn test_swiss_settings_defaults_from_empty_toml() {
        let swiss: SwissSettings = toml::from_str("").unwrap();
        assert_eq!(swiss.wins_required, 3);
        assert_eq!(swiss.losses_eliminated, 3);
        assert_eq!(swiss.first_round, SwissFirstRound::Seeded);
        assert!(swiss.max_rounds.is_none());
    }

    #[test]
    fn test_stage_settings_default() {
        let settings = StageSettings::default();
        assert_eq!(settings.best_of, 3);
        assert_eq!(settings.wins_needed(), 2);
        assert!(settings.bracket_reset);
        assert!(!settings.third_place_match);
    }
}
