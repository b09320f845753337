//! Test journal: captures journal events for assertions.

use std::sync::Mutex;

use phaseflow_core::journal::{EventJournal, StoredEvent};

/// A journal that keeps every recorded event.
#[derive(Debug, Default)]
pub struct RecordingJournal {
    events: Mutex<Vec<StoredEvent>>,
}

impl RecordingJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn events(&self) -> Vec<StoredEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Returns the recorded event types, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }
}

impl EventJournal for RecordingJournal {
    fn record(&self, event: StoredEvent) {
        self.events.lock().unwrap().push(event);
    }
}
