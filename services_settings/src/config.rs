//! Settings manager configuration
//!
//! Loaded from JSON (the same format the JSON backend writes) or built in
//! code. Missing fields fall back to their defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Identity used when none is configured
pub const DEFAULT_IDENTITY: &str = "sensorhub";

/// Policy and identity for a [`crate::SettingsManager`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Application identity; its hash guards data on internal media
    pub identity: String,
    /// Mirror every save to the fallback backend
    pub fallback_save: bool,
    /// Restore from the fallback when the primary has no usable data
    pub fallback_restore: bool,
    /// Run a save when a save event arrives
    pub save_on_event: bool,
    /// Run a restore when a restore event arrives
    pub restore_on_event: bool,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            identity: DEFAULT_IDENTITY.to_string(),
            fallback_save: false,
            fallback_restore: true,
            save_on_event: true,
            restore_on_event: true,
        }
    }
}

impl SettingsConfig {
    pub fn with_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }

    /// Parses a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.trim().is_empty() {
            return Err(ConfigError::EmptyIdentity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SettingsConfig::default();
        assert_eq!(config.identity, DEFAULT_IDENTITY);
        assert!(!config.fallback_save);
        assert!(config.fallback_restore);
        assert!(config.save_on_event);
        assert!(config.restore_on_event);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            SettingsConfig::from_json_str(r#"{"identity": "greenhouse", "fallback_save": true}"#)
                .unwrap();
        assert_eq!(config.identity, "greenhouse");
        assert!(config.fallback_save);
        assert!(config.fallback_restore);
    }

    #[test]
    fn test_empty_object() {
        assert_eq!(
            SettingsConfig::from_json_str("{}").unwrap(),
            SettingsConfig::default()
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            SettingsConfig::from_json_str(r#"{"identity": ""}"#),
            Err(ConfigError::EmptyIdentity)
        ));
        assert!(matches!(
            SettingsConfig::from_json_str(r#"{"fallback_save": "yes"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SettingsConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_round_trip_through_json() {
        let mut config = SettingsConfig::with_identity("bench");
        config.save_on_event = false;
        let json = config.to_json_string().unwrap();
        assert_eq!(SettingsConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"identity": "lab", "restore_on_event": false}}"#).unwrap();
        let config = SettingsConfig::load(file.path()).unwrap();
        assert_eq!(config.identity, "lab");
        assert!(!config.restore_on_event);

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SettingsConfig::load(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
