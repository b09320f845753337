//! Line commands typed by the user.

use std::fmt;
use std::str::FromStr;

use phaseflow_core::bus::Signal;
use phaseflow_experience::topics::{
    BACK, CONTINUE, FORCE_LOCALIZED, GATE_TOGGLED, LOCALIZATION_FAILED, LOCALIZED,
    TRACKING_DESTABILIZED,
};
use serde_json::json;
use thiserror::Error;

/// A parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Primary action.
    Continue,
    /// Secondary action.
    Back,
    /// Tick the gating checkbox.
    Check,
    /// Untick the gating checkbox.
    Uncheck,
    /// Session reports localization.
    Localized,
    /// Session reports tracking loss.
    Lost,
    /// Session reports localization failure.
    Failed,
    /// Debug localization shortcut.
    Force,
    /// Proximity probe answers "near".
    Near,
    /// Proximity probe answers "far".
    Far,
    /// Clear persisted progress.
    Reset,
    /// Leave the driver.
    Quit,
}

/// Input that is not a known command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command `{0}`")]
pub struct UnknownCommand(pub String);

impl Command {
    /// Every command word, for help output.
    pub const ALL: [&'static str; 12] = [
        "continue", "back", "check", "uncheck", "localized", "lost", "failed", "force", "near",
        "far", "reset", "quit",
    ];

    /// The signal this command publishes, if it maps to one.
    #[must_use]
    pub fn signal(self) -> Option<Signal> {
        match self {
            Self::Continue => Some(Signal::new(CONTINUE)),
            Self::Back => Some(Signal::new(BACK)),
            Self::Check => Some(Signal::with_payload(GATE_TOGGLED, json!(true))),
            Self::Uncheck => Some(Signal::with_payload(GATE_TOGGLED, json!(false))),
            Self::Localized => Some(Signal::new(LOCALIZED)),
            Self::Lost => Some(Signal::new(TRACKING_DESTABILIZED)),
            Self::Failed => Some(Signal::new(LOCALIZATION_FAILED)),
            Self::Force => Some(Signal::new(FORCE_LOCALIZED)),
            Self::Near | Self::Far | Self::Reset | Self::Quit => None,
        }
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim().to_ascii_lowercase();
        Ok(match word.as_str() {
            "continue" | "c" | "ok" => Self::Continue,
            "back" | "b" => Self::Back,
            "check" => Self::Check,
            "uncheck" => Self::Uncheck,
            "localized" => Self::Localized,
            "lost" => Self::Lost,
            "failed" => Self::Failed,
            "force" => Self::Force,
            "near" => Self::Near,
            "far" => Self::Far,
            "reset" => Self::Reset,
            "quit" | "q" | "exit" => Self::Quit,
            _ => return Err(UnknownCommand(word)),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Self::Continue => "continue",
            Self::Back => "back",
            Self::Check => "check",
            Self::Uncheck => "uncheck",
            Self::Localized => "localized",
            Self::Lost => "lost",
            Self::Failed => "failed",
            Self::Force => "force",
            Self::Near => "near",
            Self::Far => "far",
            Self::Reset => "reset",
            Self::Quit => "quit",
        };
        f.write_str(word)
    }
}
