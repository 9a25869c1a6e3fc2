//! JSONL (JSON Lines) storage.
//!
//! Each stage lives in its own directory under `stages/`, as a single
//! `record.jsonl` file: a stage row carrying the version, then one line per
//! match and one per standing. The file is replaced through a temp file and
//! rename, so a commit lands whole or not at all.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use super::{BracketStore, StageRecord, StorageConfig, StorageError};
use crate::models::{Match, MatchId, Stage, StageId, Standing};

const RECORD_FILE: &str = "record.jsonl";

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create a new JSONL writer for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Write entities, replacing the entire file.
    pub fn write_all(&self, entities: &[T]) -> Result<usize, StorageError> {
        self.ensure_dir()?;

        let tmp = self.path.with_extension("jsonl.tmp");
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        let mut count = 0;

        for entity in entities {
            let json = serde_json::to_string(entity)?;
            writeln!(writer, "{}", json)?;
            count += 1;
        }

        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;
        debug!("Wrote {} entities to {:?}", count, self.path);

        Ok(count)
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    /// Create a new JSONL reader for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Check if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all entities from the file. Blank lines are skipped; a line that
    /// does not parse fails the whole read.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            let entity = serde_json::from_str(&line).map_err(|e| StorageError::Corrupt {
                path: self.path.display().to_string(),
                reason: format!("line {}: {}", i + 1, e),
            })?;
            entities.push(entity);
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}

/// One line of `record.jsonl`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "row", rename_all = "snake_case")]
enum RecordLine {
    Stage { version: u64, stage: Stage },
    Match(Match),
    Standing(Standing),
}

/// File-backed store: one directory per stage.
pub struct JsonlStore {
    config: StorageConfig,
    // Serializes file access within this process
    commit_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(StorageConfig::new(data_dir.into()))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, StorageError> {
        self.commit_lock.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Read a stage record. The caller holds the lock.
    fn read_record(&self, dir: &Path, stage_id: &StageId) -> Result<StageRecord, StorageError> {
        let path = dir.join(RECORD_FILE);
        let reader: JsonlReader<RecordLine> = JsonlReader::new(path.clone());
        if !reader.exists() {
            return Err(StorageError::StageNotFound(stage_id.to_string()));
        }
        let corrupt = |reason: &str| StorageError::Corrupt {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        let mut lines = reader.read_all()?.into_iter();
        let Some(RecordLine::Stage { version, stage }) = lines.next() else {
            return Err(corrupt("first row is not a stage row"));
        };

        let mut record = StageRecord::new(stage);
        record.version = version;
        for line in lines {
            match line {
                RecordLine::Match(m) => record.matches.push(m),
                RecordLine::Standing(s) => record.standings.push(s),
                RecordLine::Stage { .. } => return Err(corrupt("more than one stage row")),
            }
        }
        Ok(record)
    }

    fn write_record(&self, dir: &Path, record: &StageRecord, version: u64) -> Result<(), StorageError> {
        let mut lines = Vec::with_capacity(1 + record.matches.len() + record.standings.len());
        lines.push(RecordLine::Stage {
            version,
            stage: record.stage.clone(),
        });
        lines.extend(record.matches.iter().cloned().map(RecordLine::Match));
        lines.extend(record.standings.iter().cloned().map(RecordLine::Standing));
        JsonlWriter::new(dir.join(RECORD_FILE)).write_all(&lines)?;
        Ok(())
    }
}

impl BracketStore for JsonlStore {
    fn create_stage(&self, stage: Stage) -> Result<StageRecord, StorageError> {
        let _guard = self.lock()?;
        let dir = self.config.stage_dir(&stage.id)?;
        if dir.join(RECORD_FILE).exists() {
            return Err(StorageError::AlreadyExists(stage.id.to_string()));
        }

        let record = StageRecord::new(stage);
        self.write_record(&dir, &record, record.version)?;
        info!("Created stage {} at {:?}", record.stage.id, dir);
        Ok(record)
    }

    fn load_stage(&self, stage_id: &StageId) -> Result<StageRecord, StorageError> {
        let _guard = self.lock()?;
        let dir = self.config.stage_dir(stage_id)?;
        self.read_record(&dir, stage_id)
    }

    fn commit_stage(&self, record: &StageRecord) -> Result<u64, StorageError> {
        let _guard = self.lock()?;
        let dir = self.config.stage_dir(&record.stage.id)?;
        let current = self.read_record(&dir, &record.stage.id)?;

        if current.version != record.version {
            return Err(StorageError::Conflict {
                stage_id: record.stage.id.to_string(),
                expected: record.version,
                actual: current.version,
            });
        }

        let version = record.version + 1;
        self.write_record(&dir, record, version)?;
        debug!("Committed stage {} at version {}", record.stage.id, version);
        Ok(version)
    }

    fn locate_match(&self, match_id: &MatchId) -> Result<Option<StageId>, StorageError> {
        let stages = self.list_stages()?;
        let _guard = self.lock()?;
        for stage_id in stages {
            let dir = self.config.stage_dir(&stage_id)?;
            let record = self.read_record(&dir, &stage_id)?;
            if record.matches.iter().any(|m| &m.id == match_id) {
                return Ok(Some(stage_id));
            }
        }
        Ok(None)
    }

    fn list_stages(&self) -> Result<Vec<StageId>, StorageError> {
        let dir = self.config.stages_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut stages = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() && entry.path().join(RECORD_FILE).exists() {
                if let Some(name) = entry.file_name().to_str() {
                    stages.push(StageId::from(name));
                }
            }
        }

        stages.sort();
        Ok(stages)
    }
}
