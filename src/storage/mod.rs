//! Persistence port and adapters.
//!
//! A stage is stored as one versioned record (stage row, its matches and
//! standings). Every mutation is a load / modify / compare-and-swap commit:
//! - `InMemoryStore` keeps records behind a lock, for tests and embedding
//! - `JsonlStore` writes one JSONL file per stage, replaced whole on commit

pub mod jsonl;
pub mod memory;

use std::path::PathBuf;
use thiserror::Error;

use crate::models::{Match, MatchId, Stage, StageId, Standing};

pub use jsonl::JsonlStore;
pub use memory::InMemoryStore;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Stage already exists: {0}")]
    AlreadyExists(String),

    #[error("Version conflict on stage {stage_id}: expected {expected}, found {actual}")]
    Conflict {
        stage_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Corrupt record {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}

/// Everything persisted for one stage, plus the version it was read at.
#[derive(Debug, Clone)]
pub struct StageRecord {
    /// Incremented by every successful commit
    pub version: u64,
    pub stage: Stage,
    pub matches: Vec<Match>,
    pub standings: Vec<Standing>,
}

impl StageRecord {
    /// Version-zero record for a newly created stage.
    pub fn new(stage: Stage) -> Self {
        Self {
            version: 0,
            stage,
            matches: Vec::new(),
            standings: Vec::new(),
        }
    }
}

/// Storage port used by the engine.
///
/// `commit_stage` must be atomic: either the whole record is replaced and
/// the version bumped, or nothing changes and `StorageError::Conflict` is
/// returned because another writer committed first.
pub trait BracketStore: Send + Sync {
    /// Insert a new stage. Fails with `AlreadyExists` if the id is taken.
    fn create_stage(&self, stage: Stage) -> Result<StageRecord, StorageError>;

    /// Read a stage with its matches and standings.
    fn load_stage(&self, stage_id: &StageId) -> Result<StageRecord, StorageError>;

    /// Replace the stored record if its version still equals `record.version`.
    /// Returns the new version.
    fn commit_stage(&self, record: &StageRecord) -> Result<u64, StorageError>;

    /// Stage owning a match, if any.
    fn locate_match(&self, match_id: &MatchId) -> Result<Option<StageId>, StorageError>;

    /// All stored stage ids, sorted.
    fn list_stages(&self) -> Result<Vec<StageId>, StorageError>;
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn stages_dir(&self) -> PathBuf {
        self.data_dir.join("stages")
    }

    /// Directory holding one stage's files. Rejects ids that would escape
    /// the stages directory.
    pub fn stage_dir(&self, stage_id: &StageId) -> Result<PathBuf, StorageError> {
        let id = stage_id.as_str();
        let safe = !id.is_empty()
            && id != "."
            && id != ".."
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !safe {
            return Err(StorageError::InvalidPath(id.to_string()));
        }
        Ok(self.stages_dir().join(id))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_paths() {
        let config = StorageConfig::new(PathBuf::from("/data"));

        assert_eq!(config.stages_dir(), PathBuf::from("/data/stages"));
        assert_eq!(
            config.stage_dir(&StageId::from("main-2025")).unwrap(),
            PathBuf::from("/data/stages/main-2025")
        );
    }

    #[test]
    fn test_stage_dir_rejects_traversal() {
        let config = StorageConfig::default();
        assert!(config.stage_dir(&StageId::from("../etc")).is_err());
        assert!(config.stage_dir(&StageId::from("..")).is_err());
        assert!(config.stage_dir(&StageId::from("")).is_err());
        assert!(config.stage_dir(&StageId::from("a/b")).is_err());
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_conflict_detection() {
        let err = StorageError::Conflict {
            stage_id: "s".to_string(),
            expected: 1,
            actual: 2,
        };
        assert!(err.is_conflict());
        assert!(!StorageError::StageNotFound("s".to_string()).is_conflict());
    }
}
