//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::bracket::MAX_TEAMS;
use crate::models::{SeedingMethod, StageSettings, SwissSettings};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Defaults applied to new stages when the caller does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Match length (odd)
    #[serde(default = "default_best_of")]
    pub best_of: u32,

    #[serde(default = "default_max_teams")]
    pub max_teams: u32,

    #[serde(default)]
    pub seeding_method: SeedingMethod,

    #[serde(default = "default_bracket_reset")]
    pub bracket_reset: bool,

    #[serde(default)]
    pub third_place_match: bool,
}

fn default_best_of() -> u32 {
    3
}

fn default_max_teams() -> u32 {
    MAX_TEAMS as u32
}

fn default_bracket_reset() -> bool {
    true
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            best_of: default_best_of(),
            max_teams: default_max_teams(),
            seeding_method: SeedingMethod::default(),
            bracket_reset: default_bracket_reset(),
            third_place_match: false,
        }
    }
}

/// Storage behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How many times a mutation is re-applied after losing a commit race
    #[serde(default = "default_commit_retries")]
    pub commit_retries: u32,
}

fn default_commit_retries() -> u32 {
    8
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            commit_retries: default_commit_retries(),
        }
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub swiss: SwissSettings,

    #[serde(default)]
    pub storage: StoreConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            defaults: DefaultsConfig::default(),
            swiss: SwissSettings::default(),
            storage: StoreConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let best_of = self.defaults.best_of;
        if best_of == 0 || best_of % 2 == 0 {
            return Err(ConfigError::ValidationError(format!(
                "best_of must be odd and at least 1, got {}",
                best_of
            )));
        }

        let max = self.defaults.max_teams as usize;
        if !(2..=MAX_TEAMS).contains(&max) {
            return Err(ConfigError::ValidationError(format!(
                "max_teams must be between 2 and {}, got {}",
                MAX_TEAMS, max
            )));
        }

        if self.swiss.wins_required == 0 || self.swiss.losses_eliminated == 0 {
            return Err(ConfigError::ValidationError(
                "Swiss thresholds must be greater than 0".to_string(),
            ));
        }

        if self.swiss.max_rounds == Some(0) {
            return Err(ConfigError::ValidationError(
                "Swiss max_rounds must be greater than 0".to_string(),
            ));
        }

        if self.storage.commit_retries == 0 {
            return Err(ConfigError::ValidationError(
                "commit_retries must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Stage settings built from the configured defaults.
    pub fn stage_settings(&self) -> StageSettings {
        StageSettings {
            best_of: self.defaults.best_of,
            max_teams: self.defaults.max_teams,
            seeding: self.defaults.seeding_method,
            bracket_reset: self.defaults.bracket_reset,
            third_place_match: self.defaults.third_place_match,
            swiss: self.swiss.clone(),
            ..StageSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SwissFirstRound;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.defaults.best_of, 3);
        assert_eq!(config.defaults.max_teams, 128);
        assert_eq!(config.storage.commit_retries, 8);
    }

    #[test]
    fn test_config_validation_ok() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_even_best_of() {
        let mut config = EngineConfig::default();
        config.defaults.best_of = 2;
        assert!(config.validate().is_err());

        config.defaults.best_of = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_max_teams() {
        let mut config = EngineConfig::default();
        config.defaults.max_teams = 129;
        assert!(config.validate().is_err());

        config.defaults.max_teams = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_thresholds() {
        let mut config = EngineConfig::default();
        config.swiss.wins_required = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[defaults]
best_of = 5
seeding_method = "balanced"

[swiss]
wins_required = 2
first_round = "random"
"#
        )
        .unwrap();

        let config = EngineConfig::from_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.defaults.best_of, 5);
        assert_eq!(config.defaults.seeding_method, SeedingMethod::Balanced);
        assert!(config.defaults.bracket_reset);
        assert_eq!(config.swiss.wins_required, 2);
        assert_eq!(config.swiss.losses_eliminated, 3);
        assert_eq!(config.swiss.first_round, SwissFirstRound::Random);
        assert_eq!(config.storage.commit_retries, 8);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[defaults]\nbest_of = 4").unwrap();
        let err = EngineConfig::from_file(&file.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_stage_settings_from_defaults() {
        let mut config = EngineConfig::default();
        config.defaults.best_of = 5;
        config.defaults.third_place_match = true;
        config.swiss.max_rounds = Some(5);

        let settings = config.stage_settings();
        assert_eq!(settings.best_of, 5);
        assert!(settings.third_place_match);
        assert_eq!(settings.swiss.max_rounds, Some(5));
        assert!(!settings.double_round_robin);
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        // Should be parseable
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.data_dir, parsed.data_dir);
        assert_eq!(config.defaults.best_of, parsed.defaults.best_of);
    }
}
