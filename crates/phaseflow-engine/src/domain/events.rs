//! Journal events emitted by a flow graph.

use std::fmt;
use std::sync::Arc;

use phaseflow_core::clock::Clock;
use phaseflow_core::event::{EventMetadata, JournalEvent};
use phaseflow_core::flag::FlagKey;
use phaseflow_core::id::NodeId;
use phaseflow_core::journal::{EventJournal, StoredEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type identifier for [`FlowEventKind::NodeActivated`].
pub const NODE_ACTIVATED_EVENT_TYPE: &str = "flow.node_activated";

/// Event type identifier for [`FlowEventKind::ExitResolved`].
pub const EXIT_RESOLVED_EVENT_TYPE: &str = "flow.exit_resolved";

/// Event type identifier for [`FlowEventKind::SignalIgnored`].
pub const SIGNAL_IGNORED_EVENT_TYPE: &str = "flow.signal_ignored";

/// Event type identifier for [`FlowEventKind::FlagPersisted`].
pub const FLAG_PERSISTED_EVENT_TYPE: &str = "flow.flag_persisted";

/// Event type identifier for [`FlowEventKind::TransitionCompleted`].
pub const TRANSITION_COMPLETED_EVENT_TYPE: &str = "flow.transition_completed";

/// Event type identifier for [`FlowEventKind::ExperienceFinished`].
pub const EXPERIENCE_FINISHED_EVENT_TYPE: &str = "flow.experience_finished";

/// Event type identifier for [`FlowEventKind::ProgressReset`].
pub const PROGRESS_RESET_EVENT_TYPE: &str = "flow.progress_reset";

/// Event payload variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEventKind {
    /// A node started an activation cycle.
    NodeActivated {
        /// The node.
        node: NodeId,
        /// Whether it fast-forwarded without presenting UI.
        skipped: bool,
    },
    /// A running node's exit was handed to the choreographer.
    ExitResolved {
        /// The exiting node.
        node: NodeId,
        /// Its successor.
        target: NodeId,
        /// The branch that won.
        branch: String,
    },
    /// A proposal arrived after the exit was already decided.
    SignalIgnored {
        /// The node that refused it.
        node: NodeId,
        /// The successor that lost.
        target: NodeId,
        /// The branch that lost.
        branch: String,
    },
    /// A completion flag was written.
    FlagPersisted {
        /// The node completing.
        node: NodeId,
        /// The flag written.
        flag: FlagKey,
    },
    /// Control passed from one node to the next.
    TransitionCompleted {
        /// The node that exited.
        from: NodeId,
        /// The node now active.
        to: NodeId,
    },
    /// A terminal node was reached.
    ExperienceFinished {
        /// The terminal node.
        node: NodeId,
    },
    /// All persisted flags were cleared.
    ProgressReset,
}

/// Journal event envelope.
#[derive(Debug, Clone)]
pub struct FlowEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: FlowEventKind,
}

impl JournalEvent for FlowEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            FlowEventKind::NodeActivated { .. } => NODE_ACTIVATED_EVENT_TYPE,
            FlowEventKind::ExitResolved { .. } => EXIT_RESOLVED_EVENT_TYPE,
            FlowEventKind::SignalIgnored { .. } => SIGNAL_IGNORED_EVENT_TYPE,
            FlowEventKind::FlagPersisted { .. } => FLAG_PERSISTED_EVENT_TYPE,
            FlowEventKind::TransitionCompleted { .. } => TRANSITION_COMPLETED_EVENT_TYPE,
            FlowEventKind::ExperienceFinished { .. } => EXPERIENCE_FINISHED_EVENT_TYPE,
            FlowEventKind::ProgressReset => PROGRESS_RESET_EVENT_TYPE,
        }
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("FlowEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

/// Stamps metadata onto flow events and forwards them to a journal.
pub struct Recorder {
    flow_id: Uuid,
    next_sequence: i64,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventJournal>,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("flow_id", &self.flow_id)
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}

impl Recorder {
    /// Creates a recorder for a new flow run.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn EventJournal>) -> Self {
        Self {
            flow_id: Uuid::new_v4(),
            next_sequence: 1,
            clock,
            sink,
        }
    }

    /// The flow run identifier.
    #[must_use]
    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    /// Records an event produced by the activation `correlation_id`.
    pub fn record(&mut self, correlation_id: Uuid, kind: FlowEventKind) -> FlowEvent {
        let mut event = FlowEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: String::new(),
                flow_id: self.flow_id,
                sequence_number: self.next_sequence,
                correlation_id,
                occurred_at: self.clock.now(),
            },
            kind,
        };
        event.metadata.event_type = event.event_type().to_owned();
        self.next_sequence += 1;
        self.sink.record(StoredEvent::from_event(&event));
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaseflow_test_support::{FixedClock, RecordingJournal};

    #[test]
    fn test_record_stamps_sequence_and_forwards_to_journal() {
        // Arrange
        let journal = Arc::new(RecordingJournal::new());
        let clock = FixedClock::reference();
        let mut recorder = Recorder::new(Arc::new(clock), journal.clone());
        let activation = Uuid::new_v4();

        // Act
        recorder.record(
            activation,
            FlowEventKind::NodeActivated {
                node: NodeId::new("legal"),
                skipped: false,
            },
        );
        let second = recorder.record(activation, FlowEventKind::ProgressReset);

        // Assert
        assert_eq!(second.metadata.sequence_number, 2);
        assert_eq!(second.metadata.event_type, PROGRESS_RESET_EVENT_TYPE);

        let stored = journal.events();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].event_type, NODE_ACTIVATED_EVENT_TYPE);
        assert_eq!(stored[0].flow_id, recorder.flow_id());
        assert_eq!(stored[0].correlation_id, activation);
        assert_eq!(stored[0].occurred_at, clock.0);
        assert_eq!(
            stored[0].payload,
            serde_json::json!({ "NodeActivated": { "node": "legal", "skipped": false } })
        );
    }
}
