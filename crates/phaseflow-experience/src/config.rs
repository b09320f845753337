//! Experience configuration.
//!
//! Every field has a default, so an absent or partial YAML file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while loading an [`ExperienceConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The YAML is malformed or names an unknown field.
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables of the guided experience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperienceConfig {
    /// Persisted flag recording acceptance of the legal document.
    pub legal_doc_pref_name: String,
    /// Fade-in and fade-out duration of node views.
    pub fade_duration_ms: u64,
    /// Delay before a node's content appears.
    pub content_delay_ms: u64,
    /// Duration of the full-screen overlay fades around session teardown.
    pub overlay_fade_ms: u64,
    /// Wires the debug shortcut out of localization.
    pub debug_overrides: bool,
    /// Probe deciding between relocalizing and returning to the map.
    pub proximity_probe: String,
    /// Answer assumed when the proximity probe cannot be evaluated.
    pub assume_near_when_unknown: bool,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            legal_doc_pref_name: "privacy_v1".to_owned(),
            fade_duration_ms: 350,
            content_delay_ms: 0,
            overlay_fade_ms: 500,
            debug_overrides: false,
            proximity_probe: "near_anchor".to_owned(),
            assume_near_when_unknown: false,
        }
    }
}

impl ExperienceConfig {
    /// Parses and validates YAML.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed YAML or unknown fields and
    /// `ConfigError::Invalid` for empty names.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a map.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file at `path`; a missing path or file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file exists but cannot be read, or
    /// any error of [`ExperienceConfig::from_yaml`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("no experience configuration file, using defaults");
            return Ok(Self::default());
        };
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::from_yaml(&text)?;
                info!(path = %path.display(), "experience configuration loaded");
                Ok(config)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "configuration file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Checks values that cannot be expressed by the types.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.legal_doc_pref_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "legal_doc_pref_name must not be empty".to_owned(),
            ));
        }
        if self.proximity_probe.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "proximity_probe must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// View fade duration.
    #[must_use]
    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    /// Initial content delay.
    #[must_use]
    pub fn content_delay(&self) -> Duration {
        Duration::from_millis(self.content_delay_ms)
    }

    /// Overlay fade duration.
    #[must_use]
    pub fn overlay_fade(&self) -> Duration {
        Duration::from_millis(self.overlay_fade_ms)
    }
}
