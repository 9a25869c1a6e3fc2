//! Team model, read-only to the engine.

use serde::{Deserialize, Serialize};

use super::TeamId;

/// A competitor as supplied by the external team catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    /// Catalog identifier
    pub id: TeamId,

    /// Display name
    pub name: String,

    /// Rating used by rating-based seeding (unrated teams sort last)
    #[serde(default)]
    pub rating: Option<f64>,

    /// Region, used by regional seeding
    #[serde(default)]
    pub region: Option<String>,

    /// Explicit seed for manual seeding (1 = top seed)
    #[serde(default)]
    pub seed: Option<u32>,
}

impl Team {
    /// Create a new unrated team.
    pub fn new(id: impl Into<TeamId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rating: None,
            region: None,
            seed: None,
        }
    }

    /// Builder method to set rating.
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Builder method to set region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Builder method to set a manual seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }
}
