//! Phase node lifecycle.
//!
//! A node moves `Inactive → Entering → Running → Exiting → Inactive`.
//! Activation either fast-forwards (skip rule satisfied: exit resolved to
//! the primary successor, nothing presented) or subscribes the node's
//! branches and starts the entry pipeline. While running, the node keeps
//! its continue affordance in sync with the gate and reports an exit as
//! soon as one is resolved. The transition itself belongs to the
//! choreographer.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use phaseflow_core::bus::{EventBus, SubscriptionSet};
use phaseflow_core::collaborator::{Collaborators, Control};
use phaseflow_core::completion::completion;
use phaseflow_core::flag::FlagCache;
use phaseflow_core::id::{NodeId, ViewId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::events::{FlowEventKind, Recorder};
use super::exit::{ExitRequest, ExitSlot, SKIP_BRANCH};
use super::process::ProcessContext;
use super::sequence::{SequenceStatus, StepSequence, Wait};
use super::spec::{NodeSpec, SessionMode, SkipPolicy};

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// Not part of the running flow.
    Inactive,
    /// Running its entry pipeline.
    Entering,
    /// Presented and waiting for an exit.
    Running,
    /// Handed over to the choreographer.
    Exiting,
}

/// Session and overlay state shared by every node of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageState {
    /// The immersive session has been started and not stopped since.
    pub session_running: bool,
    /// The full-screen overlay is opaque.
    pub overlay_solid: bool,
    /// Duration of overlay fades.
    pub overlay_fade: Duration,
}

impl StageState {
    /// Initial stage: no session, clear overlay.
    #[must_use]
    pub fn new(overlay_fade: Duration) -> Self {
        Self {
            session_running: false,
            overlay_solid: false,
            overlay_fade,
        }
    }
}

/// Everything a node may touch while activating or ticking.
pub struct NodeContext<'a> {
    /// Signal bus for subscriptions.
    pub bus: &'a EventBus,
    /// Persisted flags.
    pub flags: &'a mut FlagCache,
    /// Once-per-process bookkeeping.
    pub process: &'a ProcessContext,
    /// External collaborators.
    pub collaborators: &'a Collaborators,
    /// Session and overlay state.
    pub stage: &'a mut StageState,
    /// Journal recorder.
    pub recorder: &'a mut Recorder,
    /// Parent scope for activation cancellation tokens.
    pub scope: &'a CancellationToken,
}

/// What a tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTick {
    /// The node is not active.
    Inactive,
    /// Entry pipeline still suspended.
    Entering,
    /// Presented, no exit yet.
    Running,
    /// An exit was resolved this tick; the node is now `Exiting`.
    ExitRequested,
    /// Already exiting.
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStep {
    StartSession,
    RevealScene,
    Delay(Duration),
    Present,
}

/// A node of a flow graph together with its per-activation state.
#[derive(Debug)]
pub struct PhaseNode {
    spec: NodeSpec,
    state: ActivationState,
    skipped: bool,
    activation_id: Uuid,
    exit: ExitSlot,
    subscriptions: SubscriptionSet,
    gate: Rc<Cell<bool>>,
    continue_enabled: bool,
    visible: bool,
    fading_out: bool,
    revealing_scene: bool,
    body_text: Option<String>,
    entry: Option<StepSequence<EntryStep>>,
    token: CancellationToken,
}

impl PhaseNode {
    /// Wraps a declaration. The node starts `Inactive`.
    #[must_use]
    pub fn new(spec: NodeSpec) -> Self {
        Self {
            spec,
            state: ActivationState::Inactive,
            skipped: false,
            activation_id: Uuid::nil(),
            exit: ExitSlot::new(),
            subscriptions: SubscriptionSet::new(),
            gate: Rc::new(Cell::new(false)),
            continue_enabled: false,
            visible: false,
            fading_out: false,
            revealing_scene: false,
            body_text: None,
            entry: None,
            token: CancellationToken::new(),
        }
    }

    /// Stable identity.
    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.spec.id
    }

    /// The static declaration.
    #[must_use]
    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ActivationState {
        self.state
    }

    /// `true` if the current (or last) activation fast-forwarded.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Correlation id of the current (or last) activation.
    #[must_use]
    pub fn activation_id(&self) -> Uuid {
        self.activation_id
    }

    /// `true` while the node's view is shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the continue affordance is currently enabled by the gate.
    #[must_use]
    pub fn continue_enabled(&self) -> bool {
        self.continue_enabled
    }

    /// Body text chosen by the entry probe, if any.
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        self.body_text.as_deref()
    }

    /// The resolved exit target of this activation, if any.
    #[must_use]
    pub fn exit_target(&self) -> Option<NodeId> {
        self.exit.peek().map(|request| request.target)
    }

    /// Number of live signal registrations held by the node.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Starts an activation cycle.
    #[instrument(skip_all, fields(node = %self.spec.id))]
    pub fn activate(&mut self, ctx: &mut NodeContext<'_>) {
        if self.state != ActivationState::Inactive {
            warn!(state = ?self.state, "activating a node that is still active; resetting it first");
            self.deactivate(ctx.collaborators);
        }

        self.activation_id = Uuid::new_v4();
        self.token = ctx.scope.child_token();
        self.exit = ExitSlot::new();
        self.gate = Rc::new(Cell::new(false));
        self.continue_enabled = false;
        self.visible = false;
        self.fading_out = false;
        self.revealing_scene = false;
        self.body_text = None;

        if let Some(target) = self.skip_target(ctx) {
            self.skipped = true;
            info!(activation_id = %self.activation_id, %target, "node skipped");
            self.exit.propose(ExitRequest::new(target, SKIP_BRANCH));
            self.state = ActivationState::Running;
        } else {
            self.skipped = false;
            self.subscribe_signals(ctx);
            self.entry = Some(StepSequence::new(self.entry_plan(), self.token.clone()));
            self.state = ActivationState::Entering;
            info!(activation_id = %self.activation_id, "node entering");
        }

        ctx.recorder.record(
            self.activation_id,
            FlowEventKind::NodeActivated {
                node: self.spec.id.clone(),
                skipped: self.skipped,
            },
        );
    }

    /// Advances the node by one frame. Signal handlers for this frame must
    /// already have run.
    pub fn tick(&mut self, elapsed: Duration, ctx: &mut NodeContext<'_>) -> NodeTick {
        match self.state {
            ActivationState::Inactive => return NodeTick::Inactive,
            ActivationState::Exiting => {
                self.journal_ignored(ctx.recorder);
                return NodeTick::Exiting;
            }
            ActivationState::Entering => {
                if !self.advance_entry(elapsed, ctx) {
                    self.journal_ignored(ctx.recorder);
                    return NodeTick::Entering;
                }
            }
            ActivationState::Running => {}
        }

        self.journal_ignored(ctx.recorder);
        self.refresh_gate(ctx.collaborators);

        if self.exit.is_resolved() {
            self.state = ActivationState::Exiting;
            debug!(node = %self.spec.id, target = ?self.exit_target(), "exit requested");
            return NodeTick::ExitRequested;
        }
        NodeTick::Running
    }

    /// Hands the resolved exit to the choreographer. Returns `Some` at most
    /// once per activation.
    pub fn take_exit(&mut self) -> Option<ExitRequest> {
        self.exit.seal()
    }

    /// Ends the activation: cancels pending entry work and animations,
    /// releases every subscription and hides the view. Safe to call on an
    /// inactive node.
    pub fn deactivate(&mut self, collaborators: &Collaborators) {
        self.token.cancel();
        let entry_pending = self.entry.take().is_some();
        if entry_pending || self.fading_out {
            if let Some(view) = &self.spec.view {
                collaborators.fader.cancel(view);
            }
        }
        if entry_pending && self.revealing_scene {
            collaborators.fader.cancel(&ViewId::overlay());
        }
        self.fading_out = false;
        self.revealing_scene = false;
        self.subscriptions.release_all();
        if self.visible {
            if let Some(view) = &self.spec.view {
                collaborators.presenter.set_visible(view, false);
            }
            self.visible = false;
        }
        if self.state != ActivationState::Inactive {
            debug!(node = %self.spec.id, activation_id = %self.activation_id, "node deactivated");
        }
        self.state = ActivationState::Inactive;
    }

    /// Starts fading the view out, if it is shown.
    pub(crate) fn fade_out(
        &mut self,
        collaborators: &Collaborators,
        token: &CancellationToken,
    ) -> Wait {
        match (&self.spec.view, self.visible) {
            (Some(view), true) => {
                let (done, pending) = completion(token);
                self.fading_out = true;
                collaborators.fader.fade_out(view, self.spec.timing.fade, done);
                Wait::Until(pending)
            }
            _ => Wait::Ready,
        }
    }

    /// Hides the view once its fade-out finished.
    pub(crate) fn hide(&mut self, collaborators: &Collaborators) {
        if let (Some(view), true) = (&self.spec.view, self.visible) {
            collaborators.presenter.set_visible(view, false);
            self.visible = false;
        }
        self.fading_out = false;
    }

    fn skip_target(&self, ctx: &mut NodeContext<'_>) -> Option<NodeId> {
        let skip = match &self.spec.skip {
            SkipPolicy::Never => false,
            SkipPolicy::PersistedFlag(key) => ctx.flags.is_done(key),
            SkipPolicy::OncePerProcess => ctx.process.has_run(&self.spec.id),
        };
        if skip {
            self.spec.primary_target().cloned()
        } else {
            None
        }
    }

    fn subscribe_signals(&mut self, ctx: &mut NodeContext<'_>) {
        if let Some(topic) = self.spec.gate {
            let gate = Rc::clone(&self.gate);
            self.subscriptions.hold(ctx.bus.subscribe(topic, move |signal| {
                let checked = signal.as_bool().unwrap_or(!gate.get());
                gate.set(checked);
            }));
        }

        for branch in &self.spec.branches {
            let Some(target) = branch.target.clone() else {
                continue;
            };
            let request =
                ExitRequest::new(target, branch.label.clone()).persisting(branch.persist.clone());
            let slot = self.exit.clone();
            let gate = branch.gated.then(|| Rc::clone(&self.gate));
            let node = self.spec.id.clone();
            self.subscriptions.hold(ctx.bus.subscribe(branch.trigger, move |_| {
                if gate.as_ref().is_some_and(|gate| !gate.get()) {
                    debug!(%node, branch = %request.branch, "gate not satisfied, ignoring");
                    return;
                }
                slot.propose(request.clone());
            }));
        }

        if let Some(probe) = &self.spec.probe {
            let answer = ctx.collaborators.probes.query(&probe.probe).unwrap_or_else(|| {
                warn!(
                    node = %self.spec.id,
                    probe = %probe.probe,
                    assumed = probe.when_unknown,
                    "probe unavailable, using default branch"
                );
                probe.when_unknown
            });
            let variant = if answer {
                &probe.when_true
            } else {
                &probe.when_false
            };
            debug!(node = %self.spec.id, probe = %probe.probe, answer, "probe resolved");
            self.body_text = Some(variant.body_text.clone());

            if let Some(target) = variant.target.clone() {
                let request = ExitRequest::new(target, format!("{}:{answer}", probe.probe));
                let slot = self.exit.clone();
                self.subscriptions.hold(ctx.bus.subscribe(probe.trigger, move |_| {
                    slot.propose(request.clone());
                }));
            }
        }
    }

    fn entry_plan(&self) -> Vec<EntryStep> {
        let mut steps = Vec::with_capacity(4);
        if self.spec.session == SessionMode::Immersive {
            steps.push(EntryStep::StartSession);
            steps.push(EntryStep::RevealScene);
        }
        if !self.spec.timing.delay.is_zero() {
            steps.push(EntryStep::Delay(self.spec.timing.delay));
        }
        if self.spec.view.is_some() {
            steps.push(EntryStep::Present);
        }
        steps
    }

    /// Returns `true` once the entry pipeline finished.
    fn advance_entry(&mut self, elapsed: Duration, ctx: &mut NodeContext<'_>) -> bool {
        let Some(mut entry) = self.entry.take() else {
            return self.enter_running(ctx);
        };

        match entry.advance(elapsed, |step, token| self.run_entry_step(step, token, ctx)) {
            SequenceStatus::InProgress => {
                self.entry = Some(entry);
                false
            }
            SequenceStatus::Cancelled => false,
            SequenceStatus::Finished => self.enter_running(ctx),
        }
    }

    fn enter_running(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        self.state = ActivationState::Running;
        self.revealing_scene = false;
        if self.spec.skip == SkipPolicy::OncePerProcess {
            ctx.process.mark_ran(&self.spec.id);
        }
        debug!(node = %self.spec.id, activation_id = %self.activation_id, "node running");
        true
    }

    fn run_entry_step(
        &mut self,
        step: EntryStep,
        token: &CancellationToken,
        ctx: &mut NodeContext<'_>,
    ) -> Wait {
        let collaborators = ctx.collaborators;
        match step {
            EntryStep::StartSession => {
                if ctx.stage.session_running {
                    return Wait::Ready;
                }
                debug!(node = %self.spec.id, "starting immersive session");
                let (ready, pending) = completion(token);
                collaborators.session.set_camera_active(true);
                collaborators.session.start(ready);
                ctx.stage.session_running = true;
                Wait::Until(pending)
            }
            EntryStep::RevealScene => {
                if !ctx.stage.overlay_solid {
                    return Wait::Ready;
                }
                let (done, pending) = completion(token);
                self.revealing_scene = true;
                collaborators
                    .fader
                    .fade_out(&ViewId::overlay(), ctx.stage.overlay_fade, done);
                ctx.stage.overlay_solid = false;
                Wait::Until(pending)
            }
            EntryStep::Delay(delay) => Wait::Elapsed(delay),
            EntryStep::Present => {
                let Some(view) = &self.spec.view else {
                    return Wait::Ready;
                };
                if let Some(text) = &self.body_text {
                    collaborators.presenter.set_body_text(view, text);
                }
                if self.spec.gate.is_some() {
                    collaborators
                        .presenter
                        .set_control_enabled(view, Control::Continue, false);
                    self.continue_enabled = false;
                }
                collaborators.presenter.set_visible(view, true);
                self.visible = true;
                let (done, pending) = completion(token);
                collaborators.fader.fade_in(view, self.spec.timing.fade, done);
                Wait::Until(pending)
            }
        }
    }

    fn refresh_gate(&mut self, collaborators: &Collaborators) {
        let (Some(_), Some(view)) = (self.spec.gate, &self.spec.view) else {
            return;
        };
        let wanted = self.gate.get();
        if wanted != self.continue_enabled {
            collaborators
                .presenter
                .set_control_enabled(view, Control::Continue, wanted);
            self.continue_enabled = wanted;
            debug!(node = %self.spec.id, enabled = wanted, "continue affordance updated");
        }
    }

    fn journal_ignored(&self, recorder: &mut Recorder) {
        for lost in self.exit.drain_ignored() {
            debug!(
                node = %self.spec.id,
                target = %lost.target,
                branch = %lost.branch,
                "exit already decided, ignoring signal"
            );
            recorder.record(
                self.activation_id,
                FlowEventKind::SignalIgnored {
                    node: self.spec.id.clone(),
                    target: lost.target,
                    branch: lost.branch,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use phaseflow_core::bus::{BACK, CONTINUE, GATE_TOGGLED, Signal};
    use phaseflow_core::flag::FlagKey;
    use phaseflow_test_support::{
        Call, CompletionMode, FixedClock, RecordingCollaborators, RecordingFlagStore,
        RecordingJournal, hidden, shown,
    };
    use serde_json::json;

    use super::*;
    use crate::domain::spec::{Branch, NodeBuilder, ProbeBranch, ProbeVariant};

    const FADE: Duration = Duration::from_millis(350);

    struct Harness {
        bus: EventBus,
        store: Arc<RecordingFlagStore>,
        flags: FlagCache,
        process: ProcessContext,
        stubs: RecordingCollaborators,
        collaborators: Collaborators,
        stage: StageState,
        journal: Arc<RecordingJournal>,
        recorder: Recorder,
        scope: CancellationToken,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_store(RecordingFlagStore::new())
        }

        fn with_store(store: RecordingFlagStore) -> Self {
            let store = Arc::new(store);
            let journal = Arc::new(RecordingJournal::new());
            let stubs = RecordingCollaborators::new();
            Self {
                bus: EventBus::new(),
                flags: FlagCache::new(store.clone()),
                store,
                process: ProcessContext::new(),
                collaborators: stubs.collaborators(),
                stubs,
                stage: StageState::new(Duration::from_millis(500)),
                recorder: Recorder::new(Arc::new(FixedClock::reference()), journal.clone()),
                journal,
                scope: CancellationToken::new(),
            }
        }

        fn ctx(&mut self) -> NodeContext<'_> {
            NodeContext {
                bus: &self.bus,
                flags: &mut self.flags,
                process: &self.process,
                collaborators: &self.collaborators,
                stage: &mut self.stage,
                recorder: &mut self.recorder,
                scope: &self.scope,
            }
        }

        fn activate(&mut self, node: &mut PhaseNode) {
            let mut ctx = self.ctx();
            node.activate(&mut ctx);
        }

        fn frame(&mut self, node: &mut PhaseNode, elapsed: Duration) -> NodeTick {
            self.bus.dispatch();
            let mut ctx = self.ctx();
            node.tick(elapsed, &mut ctx)
        }

        fn toggle_gate(&self, checked: bool) {
            self.bus
                .publish(Signal::with_payload(GATE_TOGGLED, json!(checked)));
        }
    }

    fn legal() -> PhaseNode {
        PhaseNode::new(
            NodeBuilder::new("legal")
                .view("legal_panel")
                .skip_when(SkipPolicy::PersistedFlag(FlagKey::new("privacy_v1")))
                .timing(Duration::ZERO, FADE)
                .gate(GATE_TOGGLED)
                .branch(
                    Branch::on(CONTINUE, "continue")
                        .to("safety")
                        .persisting(FlagKey::new("privacy_v1"))
                        .gated(),
                )
                .branch(Branch::on(BACK, "back").to("exit"))
                .build(),
        )
    }

    fn safety() -> PhaseNode {
        PhaseNode::new(
            NodeBuilder::new("safety")
                .view("safety_panel")
                .skip_when(SkipPolicy::OncePerProcess)
                .branch(Branch::on(CONTINUE, "continue").to("instructions"))
                .build(),
        )
    }

    fn destabilized() -> PhaseNode {
        PhaseNode::new(
            NodeBuilder::new("destabilized")
                .view("recovery_panel")
                .probe(ProbeBranch {
                    probe: "near_anchor".to_owned(),
                    trigger: CONTINUE,
                    when_true: ProbeVariant::new("relocalize", "localize"),
                    when_false: ProbeVariant::new("return_to_map", "map"),
                    when_unknown: false,
                })
                .build(),
        )
    }

    #[test]
    fn test_skipped_activation_resolves_primary_target_without_ui() {
        // Arrange
        let mut h = Harness::with_store(RecordingFlagStore::seeded(&[("privacy_v1", 1)]));
        let mut node = legal();

        // Act
        h.activate(&mut node);

        // Assert
        assert!(node.is_skipped());
        assert_eq!(node.state(), ActivationState::Running);
        assert_eq!(node.exit_target(), Some(NodeId::new("safety")));
        assert_eq!(node.subscription_count(), 0);
        assert!(h.stubs.log.calls().is_empty());
        assert!(h.store.writes().is_empty());
        assert_eq!(h.frame(&mut node, Duration::ZERO), NodeTick::ExitRequested);
        let request = node.take_exit().unwrap();
        assert_eq!(request.branch, SKIP_BRANCH);
        assert_eq!(request.persist, None);
    }

    #[test]
    fn test_entry_presents_view_with_continue_disabled() {
        // Arrange
        let mut h = Harness::new();
        let mut node = legal();

        // Act
        h.activate(&mut node);
        let tick = h.frame(&mut node, Duration::ZERO);

        // Assert
        assert_eq!(tick, NodeTick::Running);
        assert!(!node.is_skipped());
        assert!(node.is_visible());
        assert_eq!(
            h.stubs.log.calls()[..3],
            [
                Call::SetControlEnabled {
                    view: "legal_panel".to_owned(),
                    control: Control::Continue,
                    enabled: false,
                },
                shown("legal_panel"),
                Call::FadeIn {
                    view: "legal_panel".to_owned(),
                    duration: FADE,
                },
            ]
        );
        assert_eq!(h.store.reads(), vec![FlagKey::new("privacy_v1")]);
    }

    #[test]
    fn test_gated_continue_ignored_until_gate_satisfied() {
        // Arrange
        let mut h = Harness::new();
        let mut node = legal();
        h.activate(&mut node);
        h.frame(&mut node, Duration::ZERO);

        // Act
        h.bus.publish(Signal::new(CONTINUE));
        let before_gate = h.frame(&mut node, Duration::ZERO);
        h.toggle_gate(true);
        let gate_only = h.frame(&mut node, Duration::ZERO);
        h.bus.publish(Signal::new(CONTINUE));
        let after_gate = h.frame(&mut node, Duration::ZERO);

        // Assert
        assert_eq!(before_gate, NodeTick::Running);
        assert_eq!(gate_only, NodeTick::Running);
        assert!(node.continue_enabled());
        assert_eq!(after_gate, NodeTick::ExitRequested);
        assert_eq!(node.exit_target(), Some(NodeId::new("safety")));
    }

    #[test]
    fn test_unchecking_gate_disables_continue_again() {
        // Arrange
        let mut h = Harness::new();
        let mut node = legal();
        h.activate(&mut node);
        h.frame(&mut node, Duration::ZERO);

        // Act
        h.toggle_gate(true);
        h.frame(&mut node, Duration::ZERO);
        h.toggle_gate(false);
        h.frame(&mut node, Duration::ZERO);
        h.bus.publish(Signal::new(CONTINUE));
        let tick = h.frame(&mut node, Duration::ZERO);

        // Assert
        assert_eq!(tick, NodeTick::Running);
        assert!(!node.continue_enabled());
        let toggles = h.stubs.log.count(|call| {
            matches!(call, Call::SetControlEnabled { control: Control::Continue, .. })
        });
        assert_eq!(toggles, 3);
    }

    #[test]
    fn test_first_exit_wins_and_later_signals_are_journaled() {
        // Arrange
        let mut h = Harness::new();
        let mut node = legal();
        h.activate(&mut node);
        h.frame(&mut node, Duration::ZERO);

        // Act
        h.bus.publish(Signal::new(BACK));
        h.toggle_gate(true);
        h.bus.publish(Signal::new(CONTINUE));
        let tick = h.frame(&mut node, Duration::ZERO);
        let first = node.take_exit();
        let second = node.take_exit();
        h.bus.publish(Signal::new(BACK));
        h.frame(&mut node, Duration::ZERO);

        // Assert
        assert_eq!(tick, NodeTick::ExitRequested);
        assert_eq!(first.map(|r| r.target), Some(NodeId::new("exit")));
        assert_eq!(second, None);
        let ignored = h
            .journal
            .event_types()
            .iter()
            .filter(|t| *t == "flow.signal_ignored")
            .count();
        assert_eq!(ignored, 2);
    }

    #[test]
    fn test_deactivate_releases_every_subscription() {
        // Arrange
        let mut h = Harness::new();
        let mut node = legal();

        // Act
        for _ in 0..3 {
            h.activate(&mut node);
            assert_eq!(h.bus.subscription_count(), 3);
            h.frame(&mut node, Duration::ZERO);
            node.deactivate(&h.collaborators);
        }
        node.deactivate(&h.collaborators);

        // Assert
        assert_eq!(h.bus.subscription_count(), 0);
        assert_eq!(node.subscription_count(), 0);
        assert_eq!(node.state(), ActivationState::Inactive);
        assert_eq!(h.stubs.log.count(|call| *call == hidden("legal_panel")), 3);
    }

    #[test]
    fn test_signal_after_deactivate_has_no_effect() {
        // Arrange
        let mut h = Harness::new();
        let mut node = legal();
        h.activate(&mut node);
        h.frame(&mut node, Duration::ZERO);
        node.deactivate(&h.collaborators);

        // Act
        h.bus.publish(Signal::new(BACK));
        let tick = h.frame(&mut node, Duration::ZERO);

        // Assert
        assert_eq!(tick, NodeTick::Inactive);
        assert_eq!(node.exit_target(), None);
    }

    #[test]
    fn test_entry_delay_holds_presentation() {
        // Arrange
        let mut h = Harness::new();
        let mut node = PhaseNode::new(
            NodeBuilder::new("instructions")
                .view("instructions_panel")
                .timing(Duration::from_millis(200), FADE)
                .branch(Branch::on(CONTINUE, "continue").to("localize"))
                .build(),
        );
        h.activate(&mut node);

        // Act
        let first = h.frame(&mut node, Duration::from_millis(16));
        let second = h.frame(&mut node, Duration::from_millis(100));
        let third = h.frame(&mut node, Duration::from_millis(100));

        // Assert
        assert_eq!(first, NodeTick::Entering);
        assert_eq!(second, NodeTick::Entering);
        assert!(!h.stubs.log.contains(&shown("instructions_panel")));
        assert_eq!(third, NodeTick::Running);
        assert!(h.stubs.log.contains(&shown("instructions_panel")));
    }

    #[test]
    fn test_deactivate_during_entry_cancels_fade() {
        // Arrange
        let mut h = Harness::new();
        h.stubs.fader.set_mode(CompletionMode::Manual);
        let mut node = legal();
        h.activate(&mut node);
        h.frame(&mut node, Duration::ZERO);
        assert_eq!(node.state(), ActivationState::Entering);

        // Act
        node.deactivate(&h.collaborators);
        h.stubs.fader.finish_all();

        // Assert
        assert!(h.stubs.log.contains(&Call::CancelFade {
            view: "legal_panel".to_owned(),
        }));
        assert!(h.stubs.log.contains(&hidden("legal_panel")));
        assert_eq!(node.state(), ActivationState::Inactive);
        assert_eq!(h.bus.subscription_count(), 0);
    }

    #[test]
    fn test_deactivate_while_revealing_scene_cancels_overlay_fade() {
        // Arrange
        let mut h = Harness::new();
        h.stubs.fader.set_mode(CompletionMode::Manual);
        h.stage.session_running = true;
        h.stage.overlay_solid = true;
        let mut node = PhaseNode::new(
            NodeBuilder::new("scan")
                .view("scan_prompt")
                .session(SessionMode::Immersive)
                .branch(Branch::on(CONTINUE, "continue").to("found"))
                .build(),
        );
        h.activate(&mut node);
        h.frame(&mut node, Duration::ZERO);
        assert_eq!(node.state(), ActivationState::Entering);

        // Act
        node.deactivate(&h.collaborators);

        // Assert
        assert!(h.stubs.log.contains(&Call::CancelFade {
            view: ViewId::OVERLAY.to_owned(),
        }));
        assert_eq!(h.stubs.fader.in_flight(), 0);
    }

    #[test]
    fn test_deactivate_after_entry_leaves_overlay_alone() {
        let mut h = Harness::new();
        h.stage.session_running = true;
        h.stage.overlay_solid = true;
        let mut node = PhaseNode::new(
            NodeBuilder::new("scan")
                .view("scan_prompt")
                .session(SessionMode::Immersive)
                .branch(Branch::on(CONTINUE, "continue").to("found"))
                .build(),
        );
        h.activate(&mut node);
        h.frame(&mut node, Duration::ZERO);
        assert_eq!(node.state(), ActivationState::Running);

        node.deactivate(&h.collaborators);

        assert_eq!(
            h.stubs.log.count(|c| matches!(c, Call::CancelFade { .. })),
            0
        );
    }

    #[test]
    fn test_once_per_process_node_skips_after_first_completed_entry() {
        // Arrange
        let mut h = Harness::new();
        let mut node = safety();

        // Act
        h.activate(&mut node);
        let first_skipped = node.is_skipped();
        h.frame(&mut node, Duration::ZERO);
        node.deactivate(&h.collaborators);
        h.activate(&mut node);

        // Assert
        assert!(!first_skipped);
        assert!(h.process.has_run(&NodeId::new("safety")));
        assert!(node.is_skipped());
        assert_eq!(node.exit_target(), Some(NodeId::new("instructions")));
    }

    #[test]
    fn test_once_per_process_not_marked_when_entry_interrupted() {
        // Arrange
        let mut h = Harness::new();
        h.stubs.fader.set_mode(CompletionMode::Manual);
        let mut node = safety();

        // Act
        h.activate(&mut node);
        h.frame(&mut node, Duration::ZERO);
        node.deactivate(&h.collaborators);

        // Assert
        assert!(!h.process.has_run(&NodeId::new("safety")));
    }

    #[test]
    fn test_probe_picks_variant_at_entry() {
        // Arrange
        let mut h = Harness::new();
        h.stubs.probes.set("near_anchor", false);
        let mut node = destabilized();

        // Act
        h.activate(&mut node);
        h.frame(&mut node, Duration::ZERO);
        h.stubs.probes.set("near_anchor", true);
        h.bus.publish(Signal::new(CONTINUE));
        let tick = h.frame(&mut node, Duration::ZERO);

        // Assert
        assert_eq!(node.body_text(), Some("return_to_map"));
        assert!(h.stubs.log.contains(&Call::SetBodyText {
            view: "recovery_panel".to_owned(),
            text: "return_to_map".to_owned(),
        }));
        assert_eq!(tick, NodeTick::ExitRequested);
        let request = node.take_exit().unwrap();
        assert_eq!(request.target, NodeId::new("map"));
        assert_eq!(request.branch, "near_anchor:false");
    }

    #[test]
    fn test_unavailable_probe_uses_default_answer() {
        // Arrange
        let mut h = Harness::new();
        let mut node = destabilized();

        // Act
        h.activate(&mut node);

        // Assert
        assert!(h.stubs.log.contains(&Call::Probe {
            name: "near_anchor".to_owned(),
            result: None,
        }));
        assert_eq!(node.body_text(), Some("return_to_map"));
    }

    #[test]
    fn test_immersive_entry_waits_for_first_camera_frame() {
        // Arrange
        let mut h = Harness::new();
        h.stubs.session.set_mode(CompletionMode::Manual);
        let mut node = PhaseNode::new(
            NodeBuilder::new("localize")
                .view("scan_prompt")
                .session(SessionMode::Immersive)
                .branch(Branch::on(CONTINUE, "continue").to("success"))
                .build(),
        );
        h.activate(&mut node);

        // Act
        let waiting = h.frame(&mut node, Duration::from_millis(500));
        h.stubs.session.frame_available();
        let ready = h.frame(&mut node, Duration::ZERO);

        // Assert
        assert_eq!(waiting, NodeTick::Entering);
        assert!(h.stage.session_running);
        assert_eq!(ready, NodeTick::Running);
        let calls = h.stubs.log.calls();
        let ready_at = calls.iter().position(|c| *c == Call::SessionReady).unwrap();
        let shown_at = calls.iter().position(|c| *c == shown("scan_prompt")).unwrap();
        assert!(ready_at < shown_at);
    }

    #[test]
    fn test_activation_is_journaled_with_fresh_correlation_id() {
        // Arrange
        let mut h = Harness::new();
        let mut node = safety();

        // Act
        h.activate(&mut node);
        let first = node.activation_id();
        node.deactivate(&h.collaborators);
        h.activate(&mut node);

        // Assert
        assert_ne!(first, node.activation_id());
        let events = h.journal.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].correlation_id, first);
        assert_eq!(events[0].payload["NodeActivated"]["skipped"], json!(false));
    }
}
