//! Human-readable round labels.

pub const GRAND_FINAL: &str = "Grand Final";
pub const GRAND_FINAL_RESET: &str = "Grand Final Reset";
pub const THIRD_PLACE: &str = "Third Place Match";
pub const ROUND_ROBIN: &str = "Round Robin";
pub const ROUND_ROBIN_RETURN: &str = "Round Robin (Return)";

pub const GSL_OPENER_A: &str = "Opener A";
pub const GSL_OPENER_B: &str = "Opener B";
pub const GSL_WINNERS: &str = "Winners Match";
pub const GSL_ELIMINATION: &str = "Elimination Match";
pub const GSL_DECIDER: &str = "Decider Match";

/// Single elimination label for `round` of `total_rounds`.
pub fn elimination_round(round: u32, total_rounds: u32) -> String {
    match total_rounds.saturating_sub(round) {
        0 => "Final".to_string(),
        1 => "Semifinals".to_string(),
        2 => "Quarterfinals".to_string(),
        remaining => format!("Round of {}", 1u64 << (remaining + 1)),
    }
}

/// Upper bracket label: the single elimination name, prefixed.
pub fn upper_round(round: u32, total_rounds: u32) -> String {
    format!("Upper {}", elimination_round(round, total_rounds))
}

/// Lower bracket label for lower round `round` (1-based) of `total_rounds`.
pub fn lower_round(round: u32, total_rounds: u32) -> String {
    if round == total_rounds {
        "Lower Final".to_string()
    } else {
        format!("Lower Round {}", round)
    }
}

pub fn swiss_round(round: u32) -> String {
    format!("Round {}", round)
}
