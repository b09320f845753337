//! Ordered step pipelines with explicit suspension points.
//!
//! A [`StepSequence`] runs its steps strictly one after another. Running a
//! step returns a [`Wait`]; the next step starts only once that wait is
//! satisfied. Sequences are advanced once per frame with the frame's
//! elapsed time and stop for good when their cancellation token fires.

use std::collections::VecDeque;
use std::time::Duration;

use phaseflow_core::completion::Pending;
use tokio_util::sync::CancellationToken;

/// What a step is waiting for before the sequence may continue.
#[derive(Debug, Clone)]
pub enum Wait {
    /// Nothing; continue in the same frame.
    Ready,
    /// A timed wait; holds the remaining time.
    Elapsed(Duration),
    /// An external completion callback.
    Until(Pending),
}

impl Wait {
    fn is_satisfied(&self) -> bool {
        match self {
            Self::Ready => true,
            Self::Elapsed(remaining) => remaining.is_zero(),
            Self::Until(pending) => pending.is_done(),
        }
    }
}

/// Outcome of advancing a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    /// Suspended on a wait.
    InProgress,
    /// Every step ran and the last wait is satisfied.
    Finished,
    /// The token was cancelled; remaining steps were discarded.
    Cancelled,
}

/// An ordered, cancellable pipeline of steps of type `S`.
#[derive(Debug)]
pub struct StepSequence<S> {
    steps: VecDeque<S>,
    waiting: Wait,
    token: CancellationToken,
}

impl<S> StepSequence<S> {
    /// Creates a sequence bound to `token`.
    pub fn new(steps: impl IntoIterator<Item = S>, token: CancellationToken) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            waiting: Wait::Ready,
            token,
        }
    }

    /// The token that cancels this sequence.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Steps not started yet.
    pub fn remaining(&self) -> impl Iterator<Item = &S> {
        self.steps.iter()
    }

    /// Advances the sequence by one frame.
    ///
    /// `elapsed` is applied only to the wait that was already pending when
    /// the frame began; waits started during this call begin counting next
    /// frame. `run` starts a step and reports what it waits for.
    pub fn advance(
        &mut self,
        elapsed: Duration,
        mut run: impl FnMut(S, &CancellationToken) -> Wait,
    ) -> SequenceStatus {
        if self.token.is_cancelled() {
            return self.cancel_remaining();
        }

        if let Wait::Elapsed(remaining) = &mut self.waiting {
            *remaining = remaining.saturating_sub(elapsed);
        }

        loop {
            if !self.waiting.is_satisfied() {
                return SequenceStatus::InProgress;
            }
            let Some(step) = self.steps.pop_front() else {
                self.waiting = Wait::Ready;
                return SequenceStatus::Finished;
            };
            self.waiting = run(step, &self.token);
            if self.token.is_cancelled() {
                return self.cancel_remaining();
            }
        }
    }

    fn cancel_remaining(&mut self) -> SequenceStatus {
        self.steps.clear();
        self.waiting = Wait::Ready;
        SequenceStatus::Cancelled
    }
}
