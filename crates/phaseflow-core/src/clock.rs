//! Wall-clock abstraction used to timestamp journal events.
//!
//! Frame time (fades, delays) is driven by the tick delta, never by this
//! clock, so a paused or fixed clock does not stall a flow.

use chrono::{DateTime, Utc};

/// Source of wall-clock timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
