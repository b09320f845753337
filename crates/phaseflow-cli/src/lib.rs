//! Phaseflow console driver.
//!
//! Runs the guided experience against console collaborators: views, fades
//! and session commands are logged, fades complete in frame time, and user
//! input arrives as line commands.

pub mod command;
pub mod config;
pub mod console;
pub mod driver;
pub mod error;
