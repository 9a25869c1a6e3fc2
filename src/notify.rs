//! Stage change notifications.
//!
//! Events are published after a stage commit succeeds, never before, so a
//! subscriber only ever sees changes that were persisted.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::models::{AdvancementEffect, MatchId, StageFormat, StageId, TeamId};

/// What happened to a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    BracketGenerated {
        format: StageFormat,
        team_count: usize,
        match_count: usize,
    },
    MatchUpdated {
        match_id: MatchId,
        team1_score: u32,
        team2_score: u32,
        winner_id: Option<TeamId>,
    },
    Advancement {
        effect: AdvancementEffect,
    },
    SwissRoundGenerated {
        round: u32,
        match_count: usize,
    },
    StageReset,
    StageAdvanced {
        to_stage: StageId,
        team_count: usize,
    },
}

/// A published stage event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    pub id: Uuid,
    pub stage_id: StageId,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl StageEvent {
    pub fn new(stage_id: &StageId, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage_id: stage_id.clone(),
            at: Utc::now(),
            kind,
        }
    }

    /// One event per advancement effect.
    pub fn from_effects(stage_id: &StageId, effects: &[AdvancementEffect]) -> Vec<Self> {
        effects
            .iter()
            .map(|effect| {
                Self::new(
                    stage_id,
                    EventKind::Advancement {
                        effect: effect.clone(),
                    },
                )
            })
            .collect()
    }
}

/// Receives committed stage events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &StageEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &StageEvent) {
        match serde_json::to_string(&event.kind) {
            Ok(body) => info!(stage_id = %event.stage_id, event_id = %event.id, "{}", body),
            Err(e) => info!(stage_id = %event.stage_id, "unserializable event: {}", e),
        }
    }
}

/// Keeps every event in memory; handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<StageEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StageEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &StageEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
