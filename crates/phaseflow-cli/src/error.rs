//! Phaseflow CLI: error types.

use phaseflow_core::error::FlowError;
use phaseflow_experience::ConfigError;
use thiserror::Error;

/// Startup and runtime errors of the console driver.
#[derive(Debug, Error)]
pub enum AppError {
    /// An environment variable or the experience file is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading input failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The flow could not be assembled.
    #[error("flow error: {0}")]
    Flow(#[from] FlowError),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
