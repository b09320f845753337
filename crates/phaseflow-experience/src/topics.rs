//! Signals the experience reacts to.
//!
//! UI controls publish [`CONTINUE`], [`BACK`] and [`GATE_TOGGLED`]; the
//! immersive session publishes the `ar.*` topics.

use phaseflow_core::bus::Topic;

pub use phaseflow_core::bus::{BACK, CONTINUE, GATE_TOGGLED};

/// The device pose was matched against the anchor map.
pub const LOCALIZED: Topic = Topic::new("ar.localized");

/// Localization gave up.
pub const LOCALIZATION_FAILED: Topic = Topic::new("ar.localization_failed");

/// Tracking quality dropped after localization.
pub const TRACKING_DESTABILIZED: Topic = Topic::new("ar.tracking_destabilized");

/// Debug-only shortcut that pretends localization succeeded.
pub const FORCE_LOCALIZED: Topic = Topic::new("debug.force_localized");
