//! Power-distribution topology.
//!
//! This module provides:
//! - [`TopologyGraph`] - element arena with explicit power-flow edges
//! - Structural queries (parent, children, ancestors, descendants, domain)
//! - Validation of the single-parent, acyclic tree rules

mod graph;
mod types;
mod validate;

pub use graph::TopologyGraph;
pub use types::*;
pub use validate::validate_topology;
