//! Phaseflow Engine: phase node lifecycle and flow graphs.
//!
//! Nodes are declared with [`NodeBuilder`], wired into a [`FlowGraph`] by
//! [`FlowGraphBuilder`], and driven one frame at a time with
//! [`FlowGraph::tick`]. Exits run through the transition choreographer in
//! a fixed order: fade out, session side effects, flag write, hand-off.

pub mod application;
pub mod domain;

pub use application::builder::FlowGraphBuilder;
pub use application::graph::{FlowGraph, FlowStatus};
pub use domain::node::ActivationState;
pub use domain::process::ProcessContext;
pub use domain::spec::{
    Branch, EntryTiming, NodeBuilder, NodeSpec, ProbeBranch, ProbeVariant, SessionMode, SkipPolicy,
};
