//! Core data models for the bracket engine.

mod bracket_match;
mod ids;
mod settings;
mod stage;
mod standing;
mod team;
mod view;

pub use bracket_match::*;
pub use ids::*;
pub use settings::*;
pub use stage::*;
pub use standing::*;
pub use team::*;
pub use view::*;
