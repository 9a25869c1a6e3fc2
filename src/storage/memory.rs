//! In-process store.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use super::{BracketStore, StageRecord, StorageError};
use crate::models::{MatchId, Stage, StageId};

#[derive(Default)]
struct Inner {
    stages: HashMap<StageId, StageRecord>,
    match_index: HashMap<MatchId, StageId>,
}

/// Stage records held in memory behind a single lock.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BracketStore for InMemoryStore {
    fn create_stage(&self, stage: Stage) -> Result<StageRecord, StorageError> {
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;
        if inner.stages.contains_key(&stage.id) {
            return Err(StorageError::AlreadyExists(stage.id.to_string()));
        }
        let record = StageRecord::new(stage);
        inner.stages.insert(record.stage.id.clone(), record.clone());
        debug!("Created stage {}", record.stage.id);
        Ok(record)
    }

    fn load_stage(&self, stage_id: &StageId) -> Result<StageRecord, StorageError> {
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        inner
            .stages
            .get(stage_id)
            .cloned()
            .ok_or_else(|| StorageError::StageNotFound(stage_id.to_string()))
    }

    fn commit_stage(&self, record: &StageRecord) -> Result<u64, StorageError> {
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;
        let stage_id = record.stage.id.clone();

        let current = inner
            .stages
            .get(&stage_id)
            .ok_or_else(|| StorageError::StageNotFound(stage_id.to_string()))?;
        if current.version != record.version {
            return Err(StorageError::Conflict {
                stage_id: stage_id.to_string(),
                expected: record.version,
                actual: current.version,
            });
        }

        let stale: Vec<MatchId> = current.matches.iter().map(|m| m.id.clone()).collect();
        for id in stale {
            inner.match_index.remove(&id);
        }
        for m in &record.matches {
            inner.match_index.insert(m.id.clone(), stage_id.clone());
        }

        let mut stored = record.clone();
        stored.version += 1;
        let version = stored.version;
        inner.stages.insert(stage_id, stored);
        Ok(version)
    }

    fn locate_match(&self, match_id: &MatchId) -> Result<Option<StageId>, StorageError> {
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(inner.match_index.get(match_id).cloned())
    }

    fn list_stages(&self) -> Result<Vec<StageId>, StorageError> {
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut ids: Vec<StageId> = inner.stages.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BracketSection, Match, StageFormat, StageSettings};

    fn stage(id: &str) -> Stage {
        Stage::new(
            StageId::from(id),
            "Test".to_string(),
            StageFormat::SingleElim,
            StageSettings::default(),
        )
    }

    #[test]
    fn test_create_and_load() {
        let store = InMemoryStore::new();
        store.create_stage(stage("s1")).unwrap();
        let record = store.load_stage(&StageId::from("s1")).unwrap();
        assert_eq!(record.version, 0);
        assert!(record.matches.is_empty());
    }

    #[test]
    fn test_create_twice_fails() {
        let store = InMemoryStore::new();
        store.create_stage(stage("s1")).unwrap();
        let err = store.create_stage(stage("s1")).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[test]
    fn test_load_missing() {
        let store = InMemoryStore::new();
        let err = store.load_stage(&StageId::from("nope")).unwrap_err();
        assert!(matches!(err, StorageError::StageNotFound(_)));
    }

    #[test]
    fn test_commit_bumps_version_and_rejects_stale() {
        let store = InMemoryStore::new();
        let record = store.create_stage(stage("s1")).unwrap();

        let mut first = record.clone();
        first.stage.current_round = 1;
        assert_eq!(store.commit_stage(&first).unwrap(), 1);

        // Second writer still holds version 0
        let err = store.commit_stage(&record).unwrap_err();
        assert!(err.is_conflict());

        let loaded = store.load_stage(&StageId::from("s1")).unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.stage.current_round, 1);
    }

    #[test]
    fn test_match_index_follows_commits() {
        let store = InMemoryStore::new();
        let mut record = store.create_stage(stage("s1")).unwrap();
        let m = Match::new(&record.stage.id, BracketSection::Main, 1, 1, "Final", 3);
        let match_id = m.id.clone();
        record.matches.push(m);
        store.commit_stage(&record).unwrap();

        assert_eq!(
            store.locate_match(&match_id).unwrap(),
            Some(StageId::from("s1"))
        );

        let mut cleared = store.load_stage(&StageId::from("s1")).unwrap();
        cleared.matches.clear();
        store.commit_stage(&cleared).unwrap();
        assert_eq!(store.locate_match(&match_id).unwrap(), None);
    }

    #[test]
    fn test_list_stages_sorted() {
        let store = InMemoryStore::new();
        store.create_stage(stage("b")).unwrap();
        store.create_stage(stage("a")).unwrap();
        assert_eq!(
            store.list_stages().unwrap(),
            vec![StageId::from("a"), StageId::from("b")]
        );
    }
}
