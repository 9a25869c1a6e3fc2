//! Stage model - one competitive phase of a tournament.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{StageId, StageSettings, TeamId};

/// Bracket format of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageFormat {
    SingleElim,
    DoubleElim,
    Gsl,
    RoundRobin,
    Swiss,
}

impl StageFormat {
    /// Formats whose matches are wired into an advancement graph.
    pub fn is_elimination(&self) -> bool {
        matches!(
            self,
            StageFormat::SingleElim | StageFormat::DoubleElim | StageFormat::Gsl
        )
    }
}

impl std::fmt::Display for StageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageFormat::SingleElim => write!(f, "single_elim"),
            StageFormat::DoubleElim => write!(f, "double_elim"),
            StageFormat::Gsl => write!(f, "gsl"),
            StageFormat::RoundRobin => write!(f, "round_robin"),
            StageFormat::Swiss => write!(f, "swiss"),
        }
    }
}

impl std::str::FromStr for StageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "single_elim" | "single_elimination" => Ok(StageFormat::SingleElim),
            "double_elim" | "double_elimination" => Ok(StageFormat::DoubleElim),
            "gsl" => Ok(StageFormat::Gsl),
            "round_robin" => Ok(StageFormat::RoundRobin),
            "swiss" => Ok(StageFormat::Swiss),
            other => Err(format!("unknown stage format: {}", other)),
        }
    }
}

/// Lifecycle of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Seeded,
    InProgress,
    Completed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "pending"),
            StageStatus::Seeded => write!(f, "seeded"),
            StageStatus::InProgress => write!(f, "in_progress"),
            StageStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One competitive phase ("Main Bracket", "Swiss Stage", ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Caller-supplied identifier
    pub id: StageId,

    /// Display name
    pub name: String,

    /// Bracket format
    pub format: StageFormat,

    /// Lifecycle status
    pub status: StageStatus,

    /// Settings the bracket was generated with
    pub settings: StageSettings,

    /// Latest generated round (Swiss); highest round number otherwise
    pub current_round: u32,

    /// Stage champion once the deciding match is completed
    pub champion: Option<TeamId>,

    /// When this record was created
    pub created_at: DateTime<Utc>,

    /// Last committed change
    pub updated_at: DateTime<Utc>,
}

impl Stage {
    /// Create a new pending stage.
    pub fn new(id: StageId, name: String, format: StageFormat, settings: StageSettings) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            format,
            status: StageStatus::Pending,
            settings,
            current_round: 0,
            champion: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Default best-of for matches of this stage.
    pub fn best_of(&self) -> u32 {
        self.settings.best_of
    }

    /// Largest team count this stage accepts.
    pub fn max_teams(&self) -> u32 {
        self.settings.max_teams
    }

    /// Mark the stage as having live play. Seeded stages move to in-progress;
    /// other states are left alone.
    pub fn mark_in_progress(&mut self) {
        if self.status == StageStatus::Seeded {
            self.status = StageStatus::InProgress;
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == StageStatus::Completed
    }

    /// Return to the pre-generation state.
    pub fn reset(&mut self) {
        self.status = StageStatus::Pending;
        self.current_round = 0;
        self.champion = None;
        self.updated_at = Utc::now();
    }
}
