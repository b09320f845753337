//! Exit resolution for one activation cycle.
//!
//! Signal handlers propose exits into an [`ExitSlot`]. The first accepted
//! proposal wins; later proposals in the same activation are kept aside as
//! ignored so the node can journal them. Once the choreographer seals the
//! slot, the resolved exit is immutable and further proposals are refused.

use std::cell::RefCell;
use std::rc::Rc;

use phaseflow_core::flag::FlagKey;
use phaseflow_core::id::NodeId;

/// Label of the exit taken when a node fast-forwards past its UI.
pub const SKIP_BRANCH: &str = "skip";

/// A resolved exit: where to go, why, and what to persist on the way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitRequest {
    /// The successor to activate.
    pub target: NodeId,
    /// Label of the branch that produced the request.
    pub branch: String,
    /// Flag to mark done when the node completes for real.
    pub persist: Option<FlagKey>,
}

impl ExitRequest {
    /// Creates a request without a flag write.
    #[must_use]
    pub fn new(target: NodeId, branch: impl Into<String>) -> Self {
        Self {
            target,
            branch: branch.into(),
            persist: None,
        }
    }

    /// Attaches a flag write.
    #[must_use]
    pub fn persisting(mut self, key: Option<FlagKey>) -> Self {
        self.persist = key;
        self
    }
}

/// Result of a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    /// The proposal became the exit of this activation.
    Accepted,
    /// Another proposal was accepted first.
    Superseded,
    /// The choreographer already consumed the exit.
    Sealed,
}

#[derive(Debug, Default)]
struct SlotState {
    resolved: Option<ExitRequest>,
    sealed: bool,
    ignored: Vec<ExitRequest>,
}

/// Shared write-once cell for a node's exit target.
#[derive(Debug, Clone, Default)]
pub struct ExitSlot(Rc<RefCell<SlotState>>);

impl ExitSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers an exit. Only the first offer of an activation is accepted.
    pub fn propose(&self, request: ExitRequest) -> Proposal {
        let mut state = self.0.borrow_mut();
        if state.sealed {
            state.ignored.push(request);
            return Proposal::Sealed;
        }
        if state.resolved.is_some() {
            state.ignored.push(request);
            return Proposal::Superseded;
        }
        state.resolved = Some(request);
        Proposal::Accepted
    }

    /// Returns `true` once an exit was accepted.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.0.borrow().resolved.is_some()
    }

    /// Returns a copy of the accepted exit, if any.
    #[must_use]
    pub fn peek(&self) -> Option<ExitRequest> {
        self.0.borrow().resolved.clone()
    }

    /// Hands the accepted exit to the choreographer. Succeeds at most once;
    /// afterwards the slot is sealed.
    pub fn seal(&self) -> Option<ExitRequest> {
        let mut state = self.0.borrow_mut();
        if state.sealed {
            return None;
        }
        let resolved = state.resolved.clone()?;
        state.sealed = true;
        Some(resolved)
    }

    /// Returns `true` once the choreographer consumed the exit.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.0.borrow().sealed
    }

    /// Takes the proposals that lost since the last call.
    pub fn drain_ignored(&self) -> Vec<ExitRequest> {
        std::mem::take(&mut self.0.borrow_mut().ignored)
    }
}
