//! Process-scoped state shared by every flow graph of one application run.

use std::cell::RefCell;
use std::collections::HashSet;

use phaseflow_core::id::NodeId;

/// Remembers which once-per-process nodes already ran.
///
/// Created once at process start and handed to each graph; there is no
/// reset, so the only way to clear it is to restart the process.
#[derive(Debug, Default)]
pub struct ProcessContext {
    ran: RefCell<HashSet<NodeId>>,
}

impl ProcessContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `node` completed activation earlier in this process.
    #[must_use]
    pub fn has_run(&self, node: &NodeId) -> bool {
        self.ran.borrow().contains(node)
    }

    /// Records that `node` completed activation. Returns `true` the first time.
    pub fn mark_ran(&self, node: &NodeId) -> bool {
        self.ran.borrow_mut().insert(node.clone())
    }
}
