//! Driver configuration read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Default location of the persisted flags.
pub const DEFAULT_STORE_PATH: &str = "phaseflow-flags.json";

/// Default frame rate.
pub const DEFAULT_TICK_HZ: u32 = 60;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(AppError::Config(format!(
                "PHASEFLOW_LOG_FORMAT must be `text` or `json`, got `{other}`"
            ))),
        }
    }
}

/// Settings of one driver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// JSON file holding persisted flags.
    pub store_path: PathBuf,
    /// Frames per second.
    pub tick_hz: u32,
    /// Log output format.
    pub log_format: LogFormat,
    /// Optional YAML file with experience tunables.
    pub experience_config: Option<PathBuf>,
    /// Simulated session warm-up.
    pub session_warmup: Duration,
}

impl AppConfig {
    /// Reads `PHASEFLOW_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; unset variables take defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let store_path = lookup("PHASEFLOW_STORE_PATH")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STORE_PATH), PathBuf::from);

        let tick_hz = match lookup("PHASEFLOW_TICK_HZ") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|hz| *hz > 0)
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "PHASEFLOW_TICK_HZ must be a positive integer, got `{raw}`"
                    ))
                })?,
            None => DEFAULT_TICK_HZ,
        };

        let log_format = lookup("PHASEFLOW_LOG_FORMAT")
            .map(|raw| raw.parse::<LogFormat>())
            .transpose()?
            .unwrap_or_default();

        let experience_config = lookup("PHASEFLOW_CONFIG")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let session_warmup = match lookup("PHASEFLOW_SESSION_WARMUP_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                AppError::Config(format!("PHASEFLOW_SESSION_WARMUP_MS is invalid: {e}"))
            })?,
            None => 0,
        };

        Ok(Self {
            store_path,
            tick_hz,
            log_format,
            experience_config,
            session_warmup: Duration::from_millis(session_warmup),
        })
    }

    /// Duration of one frame.
    #[must_use]
    pub fn frame(&self) -> Duration {
        Duration::from_secs(1) / self.tick_hz
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        // Act
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        // Assert
        assert_eq!(config.store_path, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(config.tick_hz, 60);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.experience_config, None);
        assert_eq!(config.session_warmup, Duration::ZERO);
    }

    #[test]
    fn test_reads_every_variable() {
        // Arrange
        let vars = lookup(&[
            ("PHASEFLOW_STORE_PATH", "/tmp/flags.json"),
            ("PHASEFLOW_TICK_HZ", "30"),
            ("PHASEFLOW_LOG_FORMAT", "JSON"),
            ("PHASEFLOW_CONFIG", "experience.yaml"),
            ("PHASEFLOW_SESSION_WARMUP_MS", "250"),
        ]);

        // Act
        let config = AppConfig::from_lookup(vars).unwrap();

        // Assert
        assert_eq!(config.store_path, PathBuf::from("/tmp/flags.json"));
        assert_eq!(config.tick_hz, 30);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.experience_config,
            Some(PathBuf::from("experience.yaml"))
        );
        assert_eq!(config.session_warmup, Duration::from_millis(250));
    }

    #[test]
    fn test_zero_tick_rate_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[("PHASEFLOW_TICK_HZ", "0")]));

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("PHASEFLOW_TICK_HZ")));
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[("PHASEFLOW_LOG_FORMAT", "xml")]));

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("xml")));
    }

    #[test]
    fn test_frame_duration_follows_tick_rate() {
        let config = AppConfig::from_lookup(lookup(&[("PHASEFLOW_TICK_HZ", "50")])).unwrap();

        assert_eq!(config.frame(), Duration::from_millis(20));
    }
}
