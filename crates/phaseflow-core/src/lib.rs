//! Phaseflow Core: shared abstractions.
//!
//! This crate defines the fundamental traits and types the flow engine and
//! its collaborators depend on. It contains no infrastructure code.

pub mod bus;
pub mod clock;
pub mod collaborator;
pub mod completion;
pub mod error;
pub mod event;
pub mod flag;
pub mod id;
pub mod journal;
