//! Error taxonomy shared by every engine component.

use thiserror::Error;

use crate::models::{MatchId, MatchStatus, StageStatus, TeamId};
use crate::storage::StorageError;

/// Errors returned by bracket operations.
///
/// Validation and state errors carry enough of the current state for the
/// caller to retry correctly; the engine never retries them itself.
#[derive(Debug, Error)]
pub enum BracketError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("State conflict: {0}")]
    StateConflict(Conflict),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    #[error("Indeterminate result for match {match_id}: tied {score}-{score} with no winner override")]
    IndeterminateResult { match_id: MatchId, score: u32 },

    #[error("Insufficient teams: need at least {needed}, got {actual}")]
    InsufficientTeams { needed: usize, actual: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Detail of a state conflict.
#[derive(Debug, Clone, PartialEq)]
pub enum Conflict {
    /// Operation not allowed in the match's current status
    MatchStatus {
        match_id: MatchId,
        status: MatchStatus,
        team1: Option<TeamId>,
        team2: Option<TeamId>,
        reason: String,
    },
    /// Operation not allowed in the stage's current status
    StageStatus { status: StageStatus, reason: String },
    /// Previous Swiss round still has unfinished matches
    RoundIncomplete { round: u32, unfinished: usize },
    /// The record changed under us more times than the retry budget allows
    Contention { attempts: u32 },
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::MatchStatus {
                match_id,
                status,
                team1,
                team2,
                reason,
            } => write!(
                f,
                "match {} is {} (team1: {}, team2: {}): {}",
                match_id,
                status,
                team1.as_ref().map_or("-", |t| t.as_str()),
                team2.as_ref().map_or("-", |t| t.as_str()),
                reason
            ),
            Conflict::StageStatus { status, reason } => {
                write!(f, "stage is {}: {}", status, reason)
            }
            Conflict::RoundIncomplete { round, unfinished } => write!(
                f,
                "round {} has {} unfinished match(es)",
                round, unfinished
            ),
            Conflict::Contention { attempts } => {
                write!(f, "stage changed concurrently {} times", attempts)
            }
        }
    }
}

impl BracketError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BracketError::Validation(msg.into())
    }

    pub fn format_mismatch(msg: impl Into<String>) -> Self {
        BracketError::FormatMismatch(msg.into())
    }

    pub fn stage_conflict(status: StageStatus, reason: impl Into<String>) -> Self {
        BracketError::StateConflict(Conflict::StageStatus {
            status,
            reason: reason.into(),
        })
    }

    pub fn match_conflict(m: &crate::models::Match, reason: impl Into<String>) -> Self {
        BracketError::StateConflict(Conflict::MatchStatus {
            match_id: m.id.clone(),
            status: m.status,
            team1: m.team1_id.clone(),
            team2: m.team2_id.clone(),
            reason: reason.into(),
        })
    }

    pub fn is_state_conflict(&self) -> bool {
        matches!(self, BracketError::StateConflict(_))
    }
}

impl From<StorageError> for BracketError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::StageNotFound(id) => BracketError::NotFound(format!("stage {}", id)),
            // Partial state never leaks: callers only see an opaque message
            other => BracketError::Internal(other.to_string()),
        }
    }
}

pub type BracketResult<T> = Result<T, BracketError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BracketSection, Match, StageId};

    #[test]
    fn test_match_conflict_carries_slots() {
        let m = Match::new(&StageId::from("s"), BracketSection::Main, 1, 1, "Final", 3);
        let err = BracketError::match_conflict(&m, "slots not filled");
        let text = err.to_string();
        assert!(text.contains("pending"));
        assert!(text.contains("slots not filled"));
        assert!(err.is_state_conflict());
    }

    #[test]
    fn test_storage_not_found_maps_to_not_found() {
        let err: BracketError = StorageError::StageNotFound("s1".to_string()).into();
        assert!(matches!(err, BracketError::NotFound(_)));
    }

    #[test]
    fn test_storage_io_is_opaque_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: BracketError = StorageError::Io(io).into();
        assert!(matches!(err, BracketError::Internal(_)));
    }

    #[test]
    fn test_indeterminate_message() {
        let err = BracketError::IndeterminateResult {
            match_id: MatchId::from("m1"),
            score: 1,
        };
        assert!(err.to_string().contains("tied 1-1"));
    }
}
