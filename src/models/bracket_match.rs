//! Match model - a node in the bracket graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, MatchId, StageId, TeamId};

/// Match lifecycle.
///
/// `pending` (slots unfilled) -> `ready` (both slots filled) -> `live` ->
/// `completed` | `cancelled`. The last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Pending,
    Ready,
    Live,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Pending => write!(f, "pending"),
            MatchStatus::Ready => write!(f, "ready"),
            MatchStatus::Live => write!(f, "live"),
            MatchStatus::Completed => write!(f, "completed"),
            MatchStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Which end of a completed match an advancement edge carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Winner,
    Loser,
}

/// One of the two slots of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSide {
    Team1,
    Team2,
}

impl MatchSide {
    pub fn other(&self) -> MatchSide {
        match self {
            MatchSide::Team1 => MatchSide::Team2,
            MatchSide::Team2 => MatchSide::Team1,
        }
    }
}

impl std::fmt::Display for MatchSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchSide::Team1 => write!(f, "team1"),
            MatchSide::Team2 => write!(f, "team2"),
        }
    }
}

impl std::str::FromStr for MatchSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team1" | "1" => Ok(MatchSide::Team1),
            "team2" | "2" => Ok(MatchSide::Team2),
            other => Err(format!("unknown side: {}", other)),
        }
    }
}

/// Provenance of a slot occupant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotSource {
    /// Placed directly from seeding
    Seed { seed: u32 },
    /// Winner or loser of another match
    Advanced { outcome: Outcome, match_id: MatchId },
    /// Drawn by a pairing round (Swiss, round robin)
    Pairing { round: u32 },
    /// Permanently vacant; only a bye can ever arrive here
    Bye,
}

impl SlotSource {
    pub fn advanced(outcome: Outcome, match_id: &MatchId) -> Self {
        SlotSource::Advanced {
            outcome,
            match_id: match_id.clone(),
        }
    }

    pub fn is_bye(&self) -> bool {
        matches!(self, SlotSource::Bye)
    }

    /// Human-readable provenance, for the presentation boundary only.
    pub fn label(&self) -> String {
        match self {
            SlotSource::Seed { seed } => format!("Seed #{}", seed),
            SlotSource::Advanced {
                outcome: Outcome::Winner,
                match_id,
            } => format!("Winner of {}", match_id),
            SlotSource::Advanced {
                outcome: Outcome::Loser,
                match_id,
            } => format!("Loser of {}", match_id),
            SlotSource::Pairing { round } => format!("Round {} pairing", round),
            SlotSource::Bye => "Bye".to_string(),
        }
    }
}

/// Part of the bracket a match belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketSection {
    Main,
    Upper,
    Lower,
    GrandFinal,
    BracketReset,
    ThirdPlace,
    Group,
    RoundRobin,
    Swiss,
}

impl BracketSection {
    pub fn key(&self) -> &'static str {
        match self {
            BracketSection::Main => "main",
            BracketSection::Upper => "upper",
            BracketSection::Lower => "lower",
            BracketSection::GrandFinal => "grand_final",
            BracketSection::BracketReset => "bracket_reset",
            BracketSection::ThirdPlace => "third_place",
            BracketSection::Group => "group",
            BracketSection::RoundRobin => "round_robin",
            BracketSection::Swiss => "swiss",
        }
    }

    /// Sections whose terminal match crowns the stage champion.
    pub fn can_crown(&self) -> bool {
        matches!(
            self,
            BracketSection::Main
                | BracketSection::Upper
                | BracketSection::GrandFinal
                | BracketSection::BracketReset
                | BracketSection::Group
        )
    }
}

/// A node in the bracket graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub stage_id: StageId,
    pub section: BracketSection,

    /// Round number; strictly increases along every advancement edge
    pub round: u32,
    pub round_name: String,

    /// Position within the round (1-based)
    pub match_number: u32,

    pub team1_id: Option<TeamId>,
    pub team2_id: Option<TeamId>,
    pub team1_score: u32,
    pub team2_score: u32,
    pub best_of: u32,
    pub status: MatchStatus,

    /// Set only once completed
    pub winner_id: Option<TeamId>,
    pub loser_id: Option<TeamId>,

    pub winner_advances_to: Option<MatchId>,
    pub loser_advances_to: Option<MatchId>,

    /// Declared or recorded provenance per slot
    pub team1_source: Option<SlotSource>,
    pub team2_source: Option<SlotSource>,

    /// Completed without being played (bye or admin walkover)
    #[serde(default)]
    pub walkover: bool,

    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Create an empty match at a bracket position. The ID is derived from the
    /// stage, section, round and match number.
    pub fn new(
        stage_id: &StageId,
        section: BracketSection,
        round: u32,
        match_number: u32,
        round_name: impl Into<String>,
        best_of: u32,
    ) -> Self {
        let id = Self::derive_id(stage_id, section, round, match_number);
        Self {
            id,
            stage_id: stage_id.clone(),
            section,
            round,
            round_name: round_name.into(),
            match_number,
            team1_id: None,
            team2_id: None,
            team1_score: 0,
            team2_score: 0,
            best_of,
            status: MatchStatus::Pending,
            winner_id: None,
            loser_id: None,
            winner_advances_to: None,
            loser_advances_to: None,
            team1_source: None,
            team2_source: None,
            walkover: false,
            scheduled_at: None,
            completed_at: None,
        }
    }

    pub fn derive_id(
        stage_id: &StageId,
        section: BracketSection,
        round: u32,
        match_number: u32,
    ) -> MatchId {
        EntityId::generate(&[
            stage_id.as_str(),
            section.key(),
            &round.to_string(),
            &match_number.to_string(),
        ])
    }

    /// Builder: place a team in a slot with its provenance.
    pub fn with_team(mut self, side: MatchSide, team: TeamId, source: SlotSource) -> Self {
        *self.slot_mut(side) = Some(team);
        *self.source_mut(side) = Some(source);
        self.refresh_readiness();
        self
    }

    /// Builder: declare where a slot's occupant will come from.
    pub fn with_source(mut self, side: MatchSide, source: SlotSource) -> Self {
        *self.source_mut(side) = Some(source);
        self
    }

    pub fn team(&self, side: MatchSide) -> Option<&TeamId> {
        match side {
            MatchSide::Team1 => self.team1_id.as_ref(),
            MatchSide::Team2 => self.team2_id.as_ref(),
        }
    }

    pub fn source(&self, side: MatchSide) -> Option<&SlotSource> {
        match side {
            MatchSide::Team1 => self.team1_source.as_ref(),
            MatchSide::Team2 => self.team2_source.as_ref(),
        }
    }

    pub fn score(&self, side: MatchSide) -> u32 {
        match side {
            MatchSide::Team1 => self.team1_score,
            MatchSide::Team2 => self.team2_score,
        }
    }

    pub(crate) fn slot_mut(&mut self, side: MatchSide) -> &mut Option<TeamId> {
        match side {
            MatchSide::Team1 => &mut self.team1_id,
            MatchSide::Team2 => &mut self.team2_id,
        }
    }

    pub(crate) fn source_mut(&mut self, side: MatchSide) -> &mut Option<SlotSource> {
        match side {
            MatchSide::Team1 => &mut self.team1_source,
            MatchSide::Team2 => &mut self.team2_source,
        }
    }

    /// True if the slot is declared permanently vacant.
    pub fn is_bye_slot(&self, side: MatchSide) -> bool {
        self.team(side).is_none() && self.source(side).is_some_and(SlotSource::is_bye)
    }

    /// True if the slot can still receive a team.
    pub fn is_open_slot(&self, side: MatchSide) -> bool {
        self.team(side).is_none() && !self.is_bye_slot(side)
    }

    pub fn both_filled(&self) -> bool {
        self.team1_id.is_some() && self.team2_id.is_some()
    }

    pub fn side_of(&self, team: &TeamId) -> Option<MatchSide> {
        if self.team1_id.as_ref() == Some(team) {
            Some(MatchSide::Team1)
        } else if self.team2_id.as_ref() == Some(team) {
            Some(MatchSide::Team2)
        } else {
            None
        }
    }

    pub fn involves(&self, team: &TeamId) -> bool {
        self.side_of(team).is_some()
    }

    /// Edge target for one outcome.
    pub fn advances_to(&self, outcome: Outcome) -> Option<&MatchId> {
        match outcome {
            Outcome::Winner => self.winner_advances_to.as_ref(),
            Outcome::Loser => self.loser_advances_to.as_ref(),
        }
    }

    /// A match with no outgoing advancement edge.
    pub fn is_terminal(&self) -> bool {
        self.winner_advances_to.is_none() && self.loser_advances_to.is_none()
    }

    /// Move `pending` to `ready` once both slots hold a team.
    pub fn refresh_readiness(&mut self) -> bool {
        if self.status == MatchStatus::Pending && self.both_filled() {
            self.status = MatchStatus::Ready;
            return true;
        }
        false
    }

    /// Render a slot's provenance for display.
    pub fn source_label(&self, side: MatchSide) -> Option<String> {
        self.source(side).map(SlotSource::label)
    }
}
