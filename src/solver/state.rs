//! Solver output: per-node electrical state.

use crate::diagnostics::Flag;
use crate::elements::ElementKind;
use crate::topology::{NodeId, StructureWarning};

/// Resolved electrical state of one element.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    pub id: NodeId,
    pub name: String,
    pub kind: ElementKind,
    /// Upstream element, `None` for sources
    pub parent: Option<NodeId>,
    /// Source powering this element
    pub domain: NodeId,
    /// Input rail voltage (the EMF for sources)
    pub input_voltage: f64,
    pub output_voltage: f64,
    /// Current drawn from the parent rail (0 for sources)
    pub input_current: f64,
    /// Current delivered to children
    pub output_current: f64,
    pub power_in: f64,
    pub power_out: f64,
    pub power_dissipated: f64,
    /// `power_out / power_in`.
    ///
    /// Elements that take in no power report 1.0, so they are neutral in
    /// path efficiency products.
    pub efficiency: f64,
    /// Diagnostics raised at this node
    pub flags: Vec<Flag>,
    /// Inner result for subsystems
    pub subsystem: Option<Box<Solution>>,
}

impl NodeState {
    /// Whether any diagnostic was raised at this node.
    pub fn has_flags(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// Convergence record of one source subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainSolve {
    pub source: NodeId,
    /// Fixed-point iterations used
    pub iterations: usize,
    /// Whether every node settled within tolerance
    pub converged: bool,
    /// Element transfer evaluations, including the initial pass
    pub evaluations: usize,
}

/// Result of one solve.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Solution {
    /// Node states in walk order
    pub states: Vec<NodeState>,
    /// One entry per source, in source order
    pub domains: Vec<DomainSolve>,
    /// Non-fatal structural findings
    pub warnings: Vec<StructureWarning>,
}

impl Solution {
    /// State of a named element.
    pub fn state(&self, name: &str) -> Option<&NodeState> {
        self.states.iter().find(|s| s.name == name)
    }

    /// State of an element by id.
    pub fn state_by_id(&self, id: NodeId) -> Option<&NodeState> {
        self.states.iter().find(|s| s.id == id)
    }

    /// Name of the element at `id`, empty if it is not part of the solution.
    pub fn name_of(&self, id: NodeId) -> &str {
        self.state_by_id(id).map(|s| s.name.as_str()).unwrap_or("")
    }

    /// Total power dissipated across all elements.
    pub fn total_dissipated(&self) -> f64 {
        self.states.iter().map(|s| s.power_dissipated).sum()
    }

    /// Every diagnostic with the name of the node that raised it, in walk order.
    pub fn diagnostics(&self) -> Vec<(&str, &Flag)> {
        self.states
            .iter()
            .flat_map(|s| s.flags.iter().map(move |f| (s.name.as_str(), f)))
            .collect()
    }

    /// Whether every source subtree converged.
    pub fn is_converged(&self) -> bool {
        self.domains.iter().all(|d| d.converged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Quantity;

    fn state(id: usize, name: &str, dissipated: f64, flags: Vec<Flag>) -> NodeState {
        NodeState {
            id: NodeId(id),
            name: name.to_string(),
            kind: ElementKind::Loss,
            parent: None,
            domain: NodeId(0),
            input_voltage: 5.0,
            output_voltage: 5.0,
            input_current: 0.0,
            output_current: 0.0,
            power_in: 0.0,
            power_out: 0.0,
            power_dissipated: dissipated,
            efficiency: 1.0,
            flags,
            subsystem: None,
        }
    }

    #[test]
    fn test_solution_queries() {
        let flag = Flag::LimitExceeded {
            quantity: Quantity::InputCurrent,
            value: 2.0,
            limit: 1.0,
        };
        let solution = Solution {
            states: vec![
                state(0, "A", 0.25, vec![]),
                state(1, "B", 0.5, vec![flag.clone()]),
            ],
            domains: vec![DomainSolve {
                source: NodeId(0),
                iterations: 1,
                converged: true,
                evaluations: 4,
            }],
            warnings: vec![],
        };
        assert_eq!(solution.total_dissipated(), 0.75);
        assert_eq!(solution.state("B").map(|s| s.id), Some(NodeId(1)));
        assert_eq!(solution.name_of(NodeId(0)), "A");
        assert_eq!(solution.name_of(NodeId(7)), "");
        assert_eq!(solution.diagnostics(), vec![("B", &flag)]);
        assert!(solution.is_converged());
        assert!(solution.state("B").is_some_and(NodeState::has_flags));
    }
}
