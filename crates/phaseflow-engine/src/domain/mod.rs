//! Node declarations, lifecycle and per-activation state.

pub mod events;
pub mod exit;
pub mod node;
pub mod process;
pub mod sequence;
pub mod spec;
