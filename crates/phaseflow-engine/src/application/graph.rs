//! A running flow graph.
//!
//! The graph owns every node, the shared bus, flag cache, stage state and
//! journal recorder, and drives them one frame at a time. Exactly one node
//! is non-`Inactive` once the graph is started.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use phaseflow_core::bus::{EventBus, Signal, SignalSender};
use phaseflow_core::collaborator::Collaborators;
use phaseflow_core::error::FlowError;
use phaseflow_core::flag::FlagCache;
use phaseflow_core::id::NodeId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::choreographer::{ChoreographyStatus, TransitionChoreographer, stop_session};
use crate::domain::events::{FlowEventKind, Recorder};
use crate::domain::node::{ActivationState, NodeContext, NodeTick, PhaseNode, StageState};
use crate::domain::process::ProcessContext;

/// Upper bound on hand-offs resolved within a single frame. Longer chains
/// of skipping nodes continue on the next frame.
pub const MAX_HANDOFFS_PER_FRAME: usize = 16;

/// Where the flow stands after a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStatus {
    /// Not started, or shut down.
    Idle,
    /// The given node is active.
    Running {
        /// The active node.
        node: NodeId,
    },
    /// A terminal node was reached.
    Finished {
        /// The terminal node.
        node: NodeId,
    },
}

struct Parts<'a> {
    nodes: &'a mut [PhaseNode],
    index: &'a HashMap<NodeId, usize>,
    choreographer: &'a mut TransitionChoreographer,
    ctx: NodeContext<'a>,
}

/// Statically wired nodes plus the runtime that moves between them.
pub struct FlowGraph {
    nodes: Vec<PhaseNode>,
    index: HashMap<NodeId, usize>,
    start: usize,
    active: Option<usize>,
    finished: bool,
    bus: EventBus,
    flags: FlagCache,
    process: Rc<ProcessContext>,
    collaborators: Collaborators,
    stage: StageState,
    recorder: Recorder,
    choreographer: TransitionChoreographer,
    shutdown: CancellationToken,
}

impl fmt::Debug for FlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowGraph")
            .field("flow_id", &self.recorder.flow_id())
            .field("nodes", &self.index.len())
            .field("active", &self.active_node())
            .field("finished", &self.finished)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl FlowGraph {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        nodes: Vec<PhaseNode>,
        index: HashMap<NodeId, usize>,
        start: usize,
        bus: EventBus,
        flags: FlagCache,
        process: Rc<ProcessContext>,
        collaborators: Collaborators,
        stage: StageState,
        recorder: Recorder,
    ) -> Self {
        Self {
            nodes,
            index,
            start,
            active: None,
            finished: false,
            bus,
            flags,
            process,
            collaborators,
            stage,
            recorder,
            choreographer: TransitionChoreographer::new(),
            shutdown: CancellationToken::new(),
        }
    }

    fn parts(&mut self) -> Parts<'_> {
        Parts {
            nodes: &mut self.nodes,
            index: &self.index,
            choreographer: &mut self.choreographer,
            ctx: NodeContext {
                bus: &self.bus,
                flags: &mut self.flags,
                process: &self.process,
                collaborators: &self.collaborators,
                stage: &mut self.stage,
                recorder: &mut self.recorder,
                scope: &self.shutdown,
            },
        }
    }

    /// Activates the start node. Calling it again is a no-op.
    #[instrument(skip(self), fields(flow_id = %self.recorder.flow_id()))]
    pub fn start(&mut self) {
        if self.shutdown.is_cancelled() {
            warn!("flow was shut down; build a new graph to run again");
            return;
        }
        if self.active.is_some() {
            warn!("flow already started");
            return;
        }
        let start = self.start;
        let Parts { nodes, mut ctx, .. } = self.parts();
        info!(node = %nodes[start].id(), "flow started");
        nodes[start].activate(&mut ctx);
        self.active = Some(start);
    }

    /// Runs one frame: delivers queued signals, then ticks the active node
    /// or the running exit sequence. Hand-offs that complete without
    /// suspending are chained within the frame; only the first step of
    /// the frame sees `elapsed`.
    pub fn tick(&mut self, elapsed: Duration) -> FlowStatus {
        let Some(mut current) = self.active else {
            return FlowStatus::Idle;
        };
        if self.finished {
            return self.status();
        }

        self.bus.dispatch();

        let mut remaining = elapsed;
        let mut handoffs = 0;
        let mut finished = false;
        loop {
            let dt = std::mem::take(&mut remaining);
            let Parts {
                nodes,
                index,
                choreographer,
                mut ctx,
            } = self.parts();

            if choreographer.is_busy() {
                // The exiting node still reports signals that lost the race.
                nodes[current].tick(dt, &mut ctx);
                match choreographer.advance(dt, nodes, &mut ctx) {
                    ChoreographyStatus::HandedOff { to } => {
                        current = to;
                        handoffs += 1;
                        if handoffs == MAX_HANDOFFS_PER_FRAME {
                            debug!(handoffs, "hand-off chain continues next frame");
                            break;
                        }
                        continue;
                    }
                    ChoreographyStatus::InProgress | ChoreographyStatus::Idle => break,
                }
            }

            match nodes[current].tick(dt, &mut ctx) {
                NodeTick::ExitRequested => {
                    let Some(request) = nodes[current].take_exit() else {
                        break;
                    };
                    let Some(&to) = index.get(&request.target) else {
                        error!(
                            node = %nodes[current].id(),
                            target = %request.target,
                            "exit target vanished from the graph"
                        );
                        break;
                    };
                    choreographer.begin(current, to, request, nodes, &mut ctx);
                }
                NodeTick::Running if nodes[current].spec().terminal => {
                    let node = &nodes[current];
                    info!(node = %node.id(), "experience finished");
                    ctx.recorder.record(
                        node.activation_id(),
                        FlowEventKind::ExperienceFinished {
                            node: node.id().clone(),
                        },
                    );
                    finished = true;
                    break;
                }
                NodeTick::Inactive
                | NodeTick::Entering
                | NodeTick::Running
                | NodeTick::Exiting => break,
            }
        }

        self.active = Some(current);
        self.finished = finished;
        self.status()
    }

    /// Current status without advancing.
    #[must_use]
    pub fn status(&self) -> FlowStatus {
        match (self.active, self.finished) {
            (None, _) => FlowStatus::Idle,
            (Some(i), false) => FlowStatus::Running {
                node: self.nodes[i].id().clone(),
            },
            (Some(i), true) => FlowStatus::Finished {
                node: self.nodes[i].id().clone(),
            },
        }
    }

    /// Queues a signal for the next frame.
    pub fn publish(&self, signal: Signal) {
        self.bus.publish(signal);
    }

    /// The graph's signal bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// A publish-only handle for UI and domain event sources.
    #[must_use]
    pub fn sender(&self) -> SignalSender {
        self.bus.sender()
    }

    /// Identity of the active node.
    #[must_use]
    pub fn active_node(&self) -> Option<&NodeId> {
        self.active.map(|i| self.nodes[i].id())
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&PhaseNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Lifecycle state of a node.
    #[must_use]
    pub fn node_state(&self, id: &NodeId) -> Option<ActivationState> {
        self.node(id).map(PhaseNode::state)
    }

    /// Whether a node's current (or last) activation skipped.
    #[must_use]
    pub fn is_skipped(&self, id: &NodeId) -> Option<bool> {
        self.node(id).map(PhaseNode::is_skipped)
    }

    /// Number of nodes that are not `Inactive`.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.state() != ActivationState::Inactive)
            .count()
    }

    /// Live registrations on the bus.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.bus.subscription_count()
    }

    /// `true` once a terminal node is running.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Identifier of this run in the journal.
    #[must_use]
    pub fn flow_id(&self) -> Uuid {
        self.recorder.flow_id()
    }

    /// Shared once-per-process state.
    #[must_use]
    pub fn process_context(&self) -> Rc<ProcessContext> {
        Rc::clone(&self.process)
    }

    /// Clears every persisted flag. Once-per-process state is untouched and
    /// the active node keeps running.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Store` if the store could not be cleared; cached
    /// values are dropped regardless.
    #[instrument(skip(self), fields(flow_id = %self.recorder.flow_id()))]
    pub fn reset_progress(&mut self) -> Result<(), FlowError> {
        self.flags.reset()?;
        let correlation_id = self
            .active
            .map_or_else(Uuid::nil, |i| self.nodes[i].activation_id());
        self.recorder
            .record(correlation_id, FlowEventKind::ProgressReset);
        info!("progress reset");
        Ok(())
    }

    /// Cancels pending work, deactivates the active node, stops the
    /// immersive session if it runs and stops the flow. Later ticks report
    /// [`FlowStatus::Idle`].
    pub fn shutdown(&mut self) {
        self.shutdown.cancel();
        self.choreographer.abort();
        if let Some(active) = self.active.take() {
            self.nodes[active].deactivate(&self.collaborators);
            info!(node = %self.nodes[active].id(), "flow shut down");
        }
        stop_session(&self.collaborators, &mut self.stage);
        self.finished = false;
    }
}
