//! Per (stage, team) aggregate record.

use serde::{Deserialize, Serialize};

use super::{MatchSide, StageId, TeamId};

/// Standing status. Transitions out of `active` are terminal for the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StandingStatus {
    #[default]
    Active,
    Qualified,
    Eliminated,
}

impl std::fmt::Display for StandingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StandingStatus::Active => write!(f, "active"),
            StandingStatus::Qualified => write!(f, "qualified"),
            StandingStatus::Eliminated => write!(f, "eliminated"),
        }
    }
}

/// A team's record within one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub stage_id: StageId,
    pub team_id: TeamId,

    /// Seed rank (1 = top seed)
    pub seed: u32,

    pub wins: u32,
    pub losses: u32,

    /// Maps/rounds won and lost
    pub score_for: u32,
    pub score_against: u32,

    /// Sum of the current wins of every opponent faced
    pub buchholz: u32,

    pub status: StandingStatus,

    /// Opponents in the order they were faced (repeats kept for Buchholz)
    #[serde(default)]
    pub opponents: Vec<TeamId>,

    /// Matches played in the team1 / team2 slot
    #[serde(default)]
    pub team1_count: u32,
    #[serde(default)]
    pub team2_count: u32,

    /// Swiss byes received
    #[serde(default)]
    pub byes: u32,
}

impl Standing {
    /// Zero record for a freshly seeded team.
    pub fn new(stage_id: StageId, team_id: TeamId, seed: u32) -> Self {
        Self {
            stage_id,
            team_id,
            seed,
            wins: 0,
            losses: 0,
            score_for: 0,
            score_against: 0,
            buchholz: 0,
            status: StandingStatus::Active,
            opponents: Vec::new(),
            team1_count: 0,
            team2_count: 0,
            byes: 0,
        }
    }

    /// Maps won minus maps lost.
    pub fn score_differential(&self) -> i64 {
        i64::from(self.score_for) - i64::from(self.score_against)
    }

    pub fn is_active(&self) -> bool {
        self.status == StandingStatus::Active
    }

    pub fn has_played(&self, opponent: &TeamId) -> bool {
        self.opponents.contains(opponent)
    }

    /// Positive when the team has sat in the team1 slot more often.
    pub fn side_balance(&self) -> i64 {
        i64::from(self.team1_count) - i64::from(self.team2_count)
    }

    pub fn record_side(&mut self, side: MatchSide) {
        match side {
            MatchSide::Team1 => self.team1_count += 1,
            MatchSide::Team2 => self.team2_count += 1,
        }
    }

    /// Move out of `active`. Returns false if the standing was already resolved.
    pub fn resolve(&mut self, status: StandingStatus) -> bool {
        if self.status != StandingStatus::Active || status == StandingStatus::Active {
            return false;
        }
        self.status = status;
        true
    }

    /// Zero the record, keeping team and seed.
    pub fn reset(&mut self) {
        *self = Standing::new(self.stage_id.clone(), self.team_id.clone(), self.seed);
    }
}
