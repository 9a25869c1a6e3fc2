//! # Bracket Engine
//!
//! Tournament bracket and progression engine.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (stages, matches, standings, views)
//! - **seeding**: Seed ordering and bracket placement
//! - **bracket**: Match skeletons for every format
//! - **progression**: Match state machine and advancement
//! - **swiss**: Swiss round pairing
//! - **standings**: Records, Buchholz and final placements
//! - **storage**: Versioned stage records (in-memory, JSONL)
//! - **engine**: The `BracketEngine` facade
//! - **notify**: Post-commit events
//! - **config**: Configuration loading and validation

pub mod bracket;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod notify;
pub mod progression;
pub mod seeding;
pub mod standings;
pub mod storage;
pub mod swiss;

pub use engine::BracketEngine;
pub use error::{BracketError, BracketResult, Conflict};
pub use models::*;
