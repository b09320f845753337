//! Graph assembly, ticking and exit choreography.

pub mod builder;
pub mod choreographer;
pub mod graph;
