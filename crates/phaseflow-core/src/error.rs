//! Flow error taxonomy.

use thiserror::Error;

use crate::id::NodeId;

/// Top-level error type for flow assembly and persistence.
///
/// Every variant except [`FlowError::Store`] is a configuration error and is
/// reported while a graph is being assembled, before any node runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    /// A reachable branch was declared without a successor.
    #[error("node {node}: branch `{branch}` has no successor")]
    MissingSuccessor {
        /// The node declaring the branch.
        node: NodeId,
        /// The branch label.
        branch: String,
    },

    /// A successor, skip target or start node names a node that does not exist.
    #[error("node {node} referenced by {referenced_by} is not part of the graph")]
    UnknownNode {
        /// The missing node.
        node: NodeId,
        /// Where the reference was found.
        referenced_by: String,
    },

    /// Two nodes were registered under the same identity.
    #[error("duplicate node identity: {0}")]
    DuplicateNode(NodeId),

    /// A node needs a UI element it was not given.
    #[error("node {node} is missing a required view: {reason}")]
    MissingView {
        /// The node lacking the view.
        node: NodeId,
        /// What needed the view.
        reason: String,
    },

    /// Any other wiring mistake detected at assembly.
    #[error("invalid flow configuration: {0}")]
    InvalidConfiguration(String),

    /// The persisted flag store failed.
    #[error("flag store error: {0}")]
    Store(String),
}

impl FlowError {
    /// Returns `true` for errors raised while assembling a graph.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
