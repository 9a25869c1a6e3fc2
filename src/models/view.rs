//! Read models returned by the engine and advancement effects.

use serde::{Deserialize, Serialize};

use super::{BracketSection, Match, MatchId, MatchSide, SlotSource, Stage, StageId, Standing, TeamId};

/// Caller-supplied result for one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResultUpdate {
    pub team1_score: u32,
    pub team2_score: u32,

    /// Complete the match even if neither side reached the win threshold
    #[serde(default)]
    pub force_complete: bool,

    /// Explicit winner, required when forcing a tied result
    #[serde(default)]
    pub winner_override: Option<MatchSide>,
}

impl ResultUpdate {
    pub fn scores(team1_score: u32, team2_score: u32) -> Self {
        Self {
            team1_score,
            team2_score,
            force_complete: false,
            winner_override: None,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force_complete = true;
        self
    }

    pub fn with_winner(mut self, side: MatchSide) -> Self {
        self.winner_override = Some(side);
        self
    }
}

/// Side effect of a committed match mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum AdvancementEffect {
    /// A team was written into a downstream slot
    SlotFilled {
        match_id: MatchId,
        side: MatchSide,
        team_id: TeamId,
        source: SlotSource,
    },
    /// Both slots are filled; the match can be played
    MatchReady { match_id: MatchId },
    /// A match was decided without play
    Walkover { match_id: MatchId, winner_id: TeamId },
    /// A match will never be played
    MatchCancelled { match_id: MatchId },
    /// Lower bracket team won the grand final
    BracketResetTriggered { match_id: MatchId },
    TeamQualified { team_id: TeamId },
    TeamEliminated { team_id: TeamId },
    ChampionDecided { team_id: TeamId },
    StageCompleted { stage_id: StageId },
}

/// Result of `update_match_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchUpdate {
    pub updated: Match,
    pub effects: Vec<AdvancementEffect>,
}

/// A round of a bracket section, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundView {
    pub section: BracketSection,
    pub round: u32,
    pub name: String,
    pub match_ids: Vec<MatchId>,
}

/// Result of bracket generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketView {
    pub stage: Stage,
    pub rounds: Vec<RoundView>,
    pub matches: Vec<Match>,
}

/// Full state of a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketState {
    pub stage: Stage,
    pub rounds: Vec<RoundView>,
    pub matches: Vec<Match>,
    pub standings: Vec<Standing>,
    pub champion: Option<TeamId>,
}

/// Group matches into rounds ordered by section then round number.
pub fn group_rounds(matches: &[Match]) -> Vec<RoundView> {
    let mut ordered: Vec<&Match> = matches.iter().collect();
    ordered.sort_by_key(|m| (m.section, m.round, m.match_number));

    let mut rounds: Vec<RoundView> = Vec::new();
    for m in ordered {
        match rounds.last_mut() {
            Some(r) if r.section == m.section && r.round == m.round => {
                r.match_ids.push(m.id.clone());
            }
            _ => rounds.push(RoundView {
                section: m.section,
                round: m.round,
                name: m.round_name.clone(),
                match_ids: vec![m.id.clone()],
            }),
        }
    }
    rounds
}

/// Final ranking entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// 1 = champion; tied teams share a placement
    pub placement: u32,
    pub team_id: TeamId,
    pub wins: u32,
    pub losses: u32,
}

/// Progress of a Swiss stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwissSummary {
    pub total_teams: usize,
    pub active_teams: usize,
    pub qualified_teams: usize,
    pub eliminated_teams: usize,
    pub current_round: u32,
    pub matches_completed: usize,
    pub matches_remaining: usize,
}
