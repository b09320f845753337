//! Phaseflow Experience: the guided AR onboarding flow.
//!
//! Legal document, safety warning and instructions lead into an immersive
//! localization phase; success, failure and tracking loss each branch to
//! their own recovery nodes, and every path ends at the exit node.

pub mod config;
pub mod graph;
pub mod topics;

pub use config::{ConfigError, ExperienceConfig};
pub use graph::{build_experience, experience_nodes};
