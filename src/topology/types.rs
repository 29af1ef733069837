//! Core types for topology representation.

use std::fmt;

use crate::elements::ElementKind;

/// A stable identifier for an element slot in a topology graph.
///
/// Ids are never reused within one graph, so they stay valid across
/// removals of other elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A non-fatal structural finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureWarning {
    /// A leaf that is not a load or subsystem: a rail that feeds nothing.
    Unterminated { node: String, kind: ElementKind },
}

impl fmt::Display for StructureWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureWarning::Unterminated { node, kind } => {
                write!(f, "{kind} '{node}' has no load attached")
            }
        }
    }
}
