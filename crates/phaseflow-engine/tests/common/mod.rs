//! Shared fixture for flow graph integration tests.
//!
//! The test graph mirrors a guided onboarding flow:
//!
//! ```text
//! legal ─continue(gated)→ safety ─continue→ scan ─localized→ found ─continue→ done
//!   └─back→ done                            ├─lost→ recover ─(probe)→ scan | done
//!                                           ├─failed→ failure ─continue→ scan
//!                                           └─force→ found
//! ```

#![allow(dead_code)]

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use phaseflow_core::bus::{BACK, CONTINUE, GATE_TOGGLED, Signal, Topic};
use phaseflow_core::flag::FlagKey;
use phaseflow_engine::{
    Branch, FlowGraph, FlowGraphBuilder, NodeBuilder, ProbeBranch, ProbeVariant, ProcessContext,
    SessionMode, SkipPolicy,
};
use phaseflow_test_support::{FixedClock, RecordingCollaborators, RecordingFlagStore, RecordingJournal};
use serde_json::json;

pub const FRAME: Duration = Duration::from_millis(16);
pub const FADE: Duration = Duration::from_millis(350);

pub const LOCALIZED: Topic = Topic::new("ar.localized");
pub const LOST: Topic = Topic::new("ar.tracking_destabilized");
pub const FAILED: Topic = Topic::new("ar.localization_failed");
pub const FORCE: Topic = Topic::new("debug.force_localized");

pub const PRIVACY_FLAG: &str = "privacy_v1";

pub struct Fixture {
    pub stubs: RecordingCollaborators,
    pub store: Arc<RecordingFlagStore>,
    pub journal: Arc<RecordingJournal>,
    pub process: Rc<ProcessContext>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(RecordingFlagStore::new())
    }

    pub fn with_store(store: RecordingFlagStore) -> Self {
        Self {
            stubs: RecordingCollaborators::new(),
            store: Arc::new(store),
            journal: Arc::new(RecordingJournal::new()),
            process: Rc::new(ProcessContext::new()),
        }
    }

    /// A builder wired to this fixture's stubs, without nodes.
    pub fn builder(&self) -> FlowGraphBuilder {
        FlowGraphBuilder::new()
            .flag_store(self.store.clone())
            .collaborators(self.stubs.collaborators())
            .clock(Arc::new(FixedClock::reference()))
            .journal(self.journal.clone())
            .process_context(Rc::clone(&self.process))
    }

    /// The onboarding graph, started.
    pub fn onboarding(&self) -> FlowGraph {
        let mut graph = onboarding_nodes(self.builder())
            .build()
            .expect("onboarding graph is valid");
        graph.start();
        graph
    }

    pub fn journaled(&self, event_type: &str) -> usize {
        self.journal
            .event_types()
            .iter()
            .filter(|t| t.as_str() == event_type)
            .count()
    }
}

pub fn onboarding_nodes(builder: FlowGraphBuilder) -> FlowGraphBuilder {
    builder
        .start("legal")
        .node(
            NodeBuilder::new("legal")
                .view("legal_panel")
                .skip_when(SkipPolicy::PersistedFlag(FlagKey::new(PRIVACY_FLAG)))
                .timing(Duration::ZERO, FADE)
                .gate(GATE_TOGGLED)
                .branch(
                    Branch::on(CONTINUE, "continue")
                        .to("safety")
                        .persisting(FlagKey::new(PRIVACY_FLAG))
                        .gated(),
                )
                .branch(Branch::on(BACK, "back").to("done"))
                .build(),
        )
        .node(
            NodeBuilder::new("safety")
                .view("safety_panel")
                .skip_when(SkipPolicy::OncePerProcess)
                .timing(Duration::ZERO, FADE)
                .branch(Branch::on(CONTINUE, "continue").to("scan"))
                .build(),
        )
        .node(
            NodeBuilder::new("scan")
                .view("scan_prompt")
                .session(SessionMode::Immersive)
                .timing(Duration::ZERO, FADE)
                .branch(Branch::on(LOCALIZED, "localized").to("found"))
                .branch(Branch::on(LOST, "destabilized").to("recover"))
                .branch(Branch::on(FAILED, "failed").to("failure"))
                .branch(Branch::on(FORCE, "debug").to("found"))
                .build(),
        )
        .node(
            NodeBuilder::new("found")
                .view("found_panel")
                .session(SessionMode::Immersive)
                .timing(Duration::ZERO, FADE)
                .branch(Branch::on(CONTINUE, "continue").to("done"))
                .branch(Branch::on(LOST, "destabilized").to("recover"))
                .build(),
        )
        .node(
            NodeBuilder::new("recover")
                .view("recovery_panel")
                .session(SessionMode::Immersive)
                .timing(Duration::ZERO, FADE)
                .probe(ProbeBranch {
                    probe: "near_anchor".to_owned(),
                    trigger: CONTINUE,
                    when_true: ProbeVariant::new("relocalize", "scan"),
                    when_false: ProbeVariant::new("return_to_map", "done"),
                    when_unknown: false,
                })
                .build(),
        )
        .node(
            NodeBuilder::new("failure")
                .view("failure_panel")
                .timing(Duration::ZERO, FADE)
                .branch(Branch::on(CONTINUE, "continue").to("scan"))
                .build(),
        )
        .node(
            NodeBuilder::new("done")
                .view("done_panel")
                .timing(Duration::ZERO, FADE)
                .terminal()
                .build(),
        )
}

pub fn signal(graph: &FlowGraph, topic: Topic) {
    graph.publish(Signal::new(topic));
}

pub fn check_gate(graph: &FlowGraph, checked: bool) {
    graph.publish(Signal::with_payload(GATE_TOGGLED, json!(checked)));
}

/// Ticks `frames` frames of [`FRAME`] length.
pub fn run(graph: &mut FlowGraph, frames: usize) {
    for _ in 0..frames {
        graph.tick(FRAME);
    }
}

/// Drives a fresh onboarding graph (immediate fades) past legal and safety
/// until `scan` is running.
pub fn advance_to_scan(graph: &mut FlowGraph) {
    graph.tick(FRAME);
    check_gate(graph, true);
    signal(graph, CONTINUE);
    graph.tick(FRAME);
    signal(graph, CONTINUE);
    graph.tick(FRAME);
}
