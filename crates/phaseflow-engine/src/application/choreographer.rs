//! Ordered exit pipeline between two nodes.
//!
//! Once a node's exit is sealed the choreographer runs, strictly in order:
//! fade the view out and hide it, cover the scene and stop the immersive
//! session when leaving it for a flat node, persist the branch's flag, and
//! finally hand off (deactivate the source, activate the target). Each
//! step may suspend; the next one starts only after it completes.

use std::time::Duration;

use phaseflow_core::collaborator::Collaborators;
use phaseflow_core::completion::completion;
use phaseflow_core::flag::FlagKey;
use phaseflow_core::id::ViewId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::events::FlowEventKind;
use crate::domain::exit::ExitRequest;
use crate::domain::node::{NodeContext, PhaseNode, StageState};
use crate::domain::sequence::{SequenceStatus, StepSequence, Wait};
use crate::domain::spec::SessionMode;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExitStep {
    FadeOutView,
    HideView,
    CoverScene,
    StopSession,
    PersistFlag(FlagKey),
    HandOff,
}

#[derive(Debug)]
struct Transition {
    from: usize,
    to: usize,
    request: ExitRequest,
    steps: StepSequence<ExitStep>,
}

/// Result of advancing the choreographer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoreographyStatus {
    /// No transition in flight.
    Idle,
    /// A step is suspended.
    InProgress,
    /// The target node (by graph index) was activated this frame.
    HandedOff {
        /// Index of the newly active node.
        to: usize,
    },
}

/// Runs at most one exit sequence at a time.
#[derive(Debug, Default)]
pub struct TransitionChoreographer {
    in_flight: Option<Transition>,
}

impl TransitionChoreographer {
    /// Creates an idle choreographer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while an exit sequence is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Plans the exit of `nodes[from]` towards `nodes[to]`. The request must
    /// already be sealed on the source.
    pub fn begin(
        &mut self,
        from: usize,
        to: usize,
        request: ExitRequest,
        nodes: &[PhaseNode],
        ctx: &mut NodeContext<'_>,
    ) {
        let source = &nodes[from];
        let target = &nodes[to];

        let mut steps = vec![ExitStep::FadeOutView, ExitStep::HideView];
        if source.spec().session == SessionMode::Immersive
            && target.spec().session == SessionMode::Flat
        {
            steps.push(ExitStep::CoverScene);
            steps.push(ExitStep::StopSession);
        }
        if !source.is_skipped() {
            if let Some(key) = request.persist.clone() {
                steps.push(ExitStep::PersistFlag(key));
            }
        }
        steps.push(ExitStep::HandOff);

        debug!(
            node = %source.id(),
            target = %request.target,
            branch = %request.branch,
            steps = ?steps,
            "exit sequence planned"
        );
        ctx.recorder.record(
            source.activation_id(),
            FlowEventKind::ExitResolved {
                node: source.id().clone(),
                target: request.target.clone(),
                branch: request.branch.clone(),
            },
        );

        self.in_flight = Some(Transition {
            from,
            to,
            request,
            steps: StepSequence::new(steps, ctx.scope.child_token()),
        });
    }

    /// Advances the running exit sequence by one frame.
    pub fn advance(
        &mut self,
        elapsed: Duration,
        nodes: &mut [PhaseNode],
        ctx: &mut NodeContext<'_>,
    ) -> ChoreographyStatus {
        let Some(transition) = self.in_flight.as_mut() else {
            return ChoreographyStatus::Idle;
        };
        let (from, to) = (transition.from, transition.to);
        let request = &transition.request;

        let status = transition.steps.advance(elapsed, |step, token| {
            debug!(node = %nodes[from].id(), ?step, "exit step");
            match step {
                ExitStep::FadeOutView => nodes[from].fade_out(ctx.collaborators, token),
                ExitStep::HideView => {
                    nodes[from].hide(ctx.collaborators);
                    Wait::Ready
                }
                ExitStep::CoverScene => cover_scene(ctx.collaborators, ctx.stage, token),
                ExitStep::StopSession => {
                    stop_session(ctx.collaborators, ctx.stage);
                    Wait::Ready
                }
                ExitStep::PersistFlag(key) => {
                    persist_flag(&nodes[from], &key, ctx);
                    Wait::Ready
                }
                ExitStep::HandOff => {
                    hand_off(nodes, from, to, request, ctx);
                    Wait::Ready
                }
            }
        });

        match status {
            SequenceStatus::InProgress => ChoreographyStatus::InProgress,
            SequenceStatus::Finished => {
                self.in_flight = None;
                ChoreographyStatus::HandedOff { to }
            }
            SequenceStatus::Cancelled => {
                debug!(node = %nodes[from].id(), "exit sequence cancelled");
                self.in_flight = None;
                ChoreographyStatus::Idle
            }
        }
    }

    /// Drops the running sequence, cancelling its pending waits.
    pub fn abort(&mut self) {
        if let Some(transition) = self.in_flight.take() {
            transition.steps.token().cancel();
        }
    }
}

fn cover_scene(
    collaborators: &Collaborators,
    stage: &mut StageState,
    token: &CancellationToken,
) -> Wait {
    if stage.overlay_solid {
        return Wait::Ready;
    }
    let (done, pending) = completion(token);
    collaborators
        .fader
        .fade_in(&ViewId::overlay(), stage.overlay_fade, done);
    stage.overlay_solid = true;
    Wait::Until(pending)
}

pub(crate) fn stop_session(collaborators: &Collaborators, stage: &mut StageState) {
    if !stage.session_running {
        return;
    }
    collaborators.session.set_camera_active(false);
    collaborators.session.stop();
    stage.session_running = false;
    debug!("immersive session stopped");
}

fn persist_flag(source: &PhaseNode, key: &FlagKey, ctx: &mut NodeContext<'_>) {
    match ctx.flags.mark_done(key) {
        Ok(()) => {
            info!(node = %source.id(), flag = %key, "flag persisted");
            ctx.recorder.record(
                source.activation_id(),
                FlowEventKind::FlagPersisted {
                    node: source.id().clone(),
                    flag: key.clone(),
                },
            );
        }
        Err(err) => {
            warn!(node = %source.id(), flag = %key, error = %err, "flag write failed, continuing");
        }
    }
}

fn hand_off(
    nodes: &mut [PhaseNode],
    from: usize,
    to: usize,
    request: &ExitRequest,
    ctx: &mut NodeContext<'_>,
) {
    nodes[from].deactivate(ctx.collaborators);
    info!(
        from = %nodes[from].id(),
        to = %nodes[to].id(),
        branch = %request.branch,
        "transition completed"
    );
    ctx.recorder.record(
        nodes[from].activation_id(),
        FlowEventKind::TransitionCompleted {
            from: nodes[from].id().clone(),
            to: nodes[to].id().clone(),
        },
    );
    nodes[to].activate(ctx);
}
