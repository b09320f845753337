//! Sink for flow journal events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::event::JournalEvent;

/// Flattened, serializable representation of a journal event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Flow run the event belongs to.
    pub flow_id: Uuid,
    /// Event type name.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Position within the flow run.
    pub sequence_number: i64,
    /// Activation cycle that produced the event.
    pub correlation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Flattens a typed journal event.
    pub fn from_event(event: &dyn JournalEvent) -> Self {
        let meta = event.metadata();
        Self {
            event_id: meta.event_id,
            flow_id: meta.flow_id,
            event_type: event.event_type().to_owned(),
            payload: event.to_payload(),
            sequence_number: meta.sequence_number,
            correlation_id: meta.correlation_id,
            occurred_at: meta.occurred_at,
        }
    }
}

/// Receives journal events in the order they happen. Recording must not
/// fail the flow, so implementations swallow their own errors.
pub trait EventJournal: Send + Sync {
    /// Records one event.
    fn record(&self, event: StoredEvent);
}

/// Journal that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullJournal;

impl EventJournal for NullJournal {
    fn record(&self, _event: StoredEvent) {}
}

/// Journal that emits each event as a `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingJournal;

impl EventJournal for TracingJournal {
    fn record(&self, event: StoredEvent) {
        tracing::info!(
            target: "phaseflow::journal",
            event_type = %event.event_type,
            sequence = event.sequence_number,
            correlation_id = %event.correlation_id,
            payload = %event.payload,
            "journal"
        );
    }
}
