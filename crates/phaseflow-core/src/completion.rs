//! One-shot completion signals for asynchronous collaborator work.
//!
//! A collaborator receives a [`Completion`] and must call
//! [`Completion::complete`] exactly once when its work is finished; taking
//! `self` by value makes a second call impossible. The engine keeps the
//! matching [`Pending`] and polls it every frame. Completions are bound to
//! a cancellation token: once the owning activation is cancelled, a late
//! `complete` is ignored.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tokio_util::sync::CancellationToken;

/// Creates a linked completion/pending pair scoped to `token`.
#[must_use]
pub fn completion(token: &CancellationToken) -> (Completion, Pending) {
    let done = Rc::new(Cell::new(false));
    (
        Completion {
            done: Rc::clone(&done),
            token: token.clone(),
        },
        Pending { done },
    )
}

/// Callback half handed to a collaborator.
#[must_use = "a completion that is never completed suspends its owner forever"]
pub struct Completion {
    done: Rc<Cell<bool>>,
    token: CancellationToken,
}

impl Completion {
    /// Signals that the work finished.
    pub fn complete(self) {
        if !self.token.is_cancelled() {
            self.done.set(true);
        }
    }

    /// Returns `true` if the owner no longer waits for this completion.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

/// Polled half kept by the engine.
#[derive(Clone)]
pub struct Pending {
    done: Rc<Cell<bool>>,
}

impl Pending {
    /// Returns `true` once the linked completion fired.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.get()
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").field("done", &self.is_done()).finish()
    }
}
