//! Graph assembly with fail-fast validation.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use phaseflow_core::bus::EventBus;
use phaseflow_core::clock::{Clock, SystemClock};
use phaseflow_core::collaborator::Collaborators;
use phaseflow_core::error::FlowError;
use phaseflow_core::flag::{FlagCache, FlagStore};
use phaseflow_core::id::NodeId;
use phaseflow_core::journal::{EventJournal, NullJournal};
use tracing::{debug, info};

use super::graph::FlowGraph;
use crate::domain::events::Recorder;
use crate::domain::node::{PhaseNode, StageState};
use crate::domain::process::ProcessContext;
use crate::domain::spec::NodeSpec;

/// Overlay fade used when none is configured.
pub const DEFAULT_OVERLAY_FADE: Duration = Duration::from_millis(500);

/// Collects node declarations and collaborators, then validates the wiring.
pub struct FlowGraphBuilder {
    nodes: Vec<NodeSpec>,
    start: Option<NodeId>,
    store: Option<Arc<dyn FlagStore>>,
    process: Option<Rc<ProcessContext>>,
    collaborators: Option<Collaborators>,
    clock: Option<Arc<dyn Clock>>,
    journal: Option<Arc<dyn EventJournal>>,
    overlay_fade: Duration,
    bus: Option<EventBus>,
}

impl fmt::Debug for FlowGraphBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowGraphBuilder")
            .field("nodes", &self.nodes.len())
            .field("start", &self.start)
            .field("overlay_fade", &self.overlay_fade)
            .finish_non_exhaustive()
    }
}

impl Default for FlowGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowGraphBuilder {
    /// Starts an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            start: None,
            store: None,
            process: None,
            collaborators: None,
            clock: None,
            journal: None,
            overlay_fade: DEFAULT_OVERLAY_FADE,
            bus: None,
        }
    }

    /// Adds a node.
    #[must_use]
    pub fn node(mut self, spec: NodeSpec) -> Self {
        self.nodes.push(spec);
        self
    }

    /// Names the node activated by [`FlowGraph::start`].
    #[must_use]
    pub fn start(mut self, id: impl Into<NodeId>) -> Self {
        self.start = Some(id.into());
        self
    }

    /// Durable store for persisted flags. Required.
    #[must_use]
    pub fn flag_store(mut self, store: Arc<dyn FlagStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Shares once-per-process state with other graphs of this process.
    /// A fresh context is used if none is given.
    #[must_use]
    pub fn process_context(mut self, process: Rc<ProcessContext>) -> Self {
        self.process = Some(process);
        self
    }

    /// UI, fade, session and probe collaborators. Required.
    #[must_use]
    pub fn collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    /// Clock stamping journal events. Defaults to the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Journal sink. Defaults to discarding events.
    #[must_use]
    pub fn journal(mut self, journal: Arc<dyn EventJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Duration of the full-screen overlay fades.
    #[must_use]
    pub fn overlay_fade(mut self, duration: Duration) -> Self {
        self.overlay_fade = duration;
        self
    }

    /// Uses an existing bus instead of a private one.
    #[must_use]
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Validates the wiring and assembles the graph.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a node is declared twice, the start
    /// node or a successor is unknown, a node declaration is invalid, or the
    /// flag store or collaborators are missing.
    pub fn build(self) -> Result<FlowGraph, FlowError> {
        let mut index = HashMap::with_capacity(self.nodes.len());
        for (i, spec) in self.nodes.iter().enumerate() {
            if index.insert(spec.id.clone(), i).is_some() {
                return Err(FlowError::DuplicateNode(spec.id.clone()));
            }
        }

        let start_id = self.start.ok_or_else(|| {
            FlowError::InvalidConfiguration("no start node configured".to_owned())
        })?;
        let start = *index.get(&start_id).ok_or_else(|| FlowError::UnknownNode {
            node: start_id.clone(),
            referenced_by: "start".to_owned(),
        })?;

        for spec in &self.nodes {
            spec.validate()?;
            for (branch, target) in spec.successor_refs() {
                let Some(target) = target else {
                    continue;
                };
                if !index.contains_key(target) {
                    return Err(FlowError::UnknownNode {
                        node: target.clone(),
                        referenced_by: format!("{}.{branch}", spec.id),
                    });
                }
            }
            debug!(node = %spec.id, "node validated");
        }

        let store = self.store.ok_or_else(|| {
            FlowError::InvalidConfiguration("no flag store configured".to_owned())
        })?;
        let collaborators = self.collaborators.ok_or_else(|| {
            FlowError::InvalidConfiguration("no collaborators configured".to_owned())
        })?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let journal: Arc<dyn EventJournal> = match self.journal {
            Some(journal) => journal,
            None => Arc::new(NullJournal),
        };
        let recorder = Recorder::new(clock, journal);

        info!(
            flow_id = %recorder.flow_id(),
            nodes = self.nodes.len(),
            start = %start_id,
            "flow graph assembled"
        );

        Ok(FlowGraph::new(
            self.nodes.into_iter().map(PhaseNode::new).collect(),
            index,
            start,
            self.bus.unwrap_or_default(),
            FlagCache::new(store),
            self.process.unwrap_or_default(),
            collaborators,
            StageState::new(self.overlay_fade),
            recorder,
        ))
    }
}
