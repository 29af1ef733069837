//! Topology validation.

use std::collections::{HashMap, VecDeque};

use super::types::{NodeId, StructureWarning};
use super::TopologyGraph;
use crate::elements::{Element, ElementKind};
use crate::error::{BudgetError, Result, StructureFault};

/// Validate a topology for solving.
///
/// Checks, in element-id order:
/// - Sources have no parent
/// - Every other element has exactly one parent
/// - Loads and subsystems have no children
/// - The graph is acyclic
///
/// Leaves that are not loads or subsystems are reported as warnings.
pub fn validate_topology(graph: &TopologyGraph) -> Result<Vec<StructureWarning>> {
    for id in graph.ids() {
        let Some(element) = graph.node(id) else {
            continue;
        };
        let parents = graph.parents_of(id).len();
        let fault = match (element.kind(), parents) {
            (ElementKind::Source, n) if n > 0 => Some(StructureFault::SourceHasParent),
            (ElementKind::Source, _) => None,
            (_, 0) => Some(StructureFault::Orphan),
            (_, n) if n > 1 => Some(StructureFault::MultipleParents),
            _ => None,
        };
        if let Some(fault) = fault {
            return Err(BudgetError::structure(element.name(), fault));
        }
        if !element.accepts_children() && !graph.children_of(id).is_empty() {
            return Err(BudgetError::structure(
                element.name(),
                StructureFault::TerminalHasChildren,
            ));
        }
    }

    if let Some(id) = first_cycle_member(graph) {
        return Err(BudgetError::structure(graph.name_of(id), StructureFault::Cycle));
    }

    let warnings = graph
        .ids()
        .filter(|&id| graph.children_of(id).is_empty())
        .filter_map(|id| graph.node(id))
        .filter(|e| e.accepts_children())
        .map(|e: &Element| StructureWarning::Unterminated {
            node: e.name().to_string(),
            kind: e.kind(),
        })
        .collect();
    Ok(warnings)
}

/// Kahn's algorithm; returns the lowest id left unsorted, if any.
fn first_cycle_member(graph: &TopologyGraph) -> Option<NodeId> {
    let mut indegree: HashMap<NodeId, usize> = graph
        .ids()
        .map(|id| (id, graph.parents_of(id).len()))
        .collect();
    let mut queue: VecDeque<NodeId> = graph
        .ids()
        .filter(|id| indegree.get(id) == Some(&0))
        .collect();

    while let Some(id) = queue.pop_front() {
        for &child in graph.children_of(id) {
            if let Some(d) = indegree.get_mut(&child) {
                *d -= 1;
                if *d == 0 {
                    queue.push_back(child);
                }
            }
        }
    }

    indegree
        .into_iter()
        .filter(|&(_, d)| d > 0)
        .map(|(id, _)| id)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Converter, Load, Loss, Source};

    fn simple() -> TopologyGraph {
        let mut g = TopologyGraph::new("simple");
        g.add_source(Source::new("12V", 12.0).unwrap()).unwrap();
        g.attach("12V", Converter::new("Buck", 5.0, 0.9).unwrap())
            .unwrap();
        g.attach("Buck", Load::current("Load", 1.0).unwrap()).unwrap();
        g
    }

    #[test]
    fn test_valid_tree() {
        assert_eq!(simple().validate().unwrap(), vec![]);
    }

    #[test]
    fn test_two_parents_rejected() {
        let mut g = simple();
        g.attach("12V", Loss::resistive("Cable", 0.1).unwrap()).unwrap();
        g.connect("Cable", "Load").unwrap();
        match g.validate() {
            Err(BudgetError::Structure { node, fault }) => {
                assert_eq!(node, "Load");
                assert_eq!(fault, StructureFault::MultipleParents);
            }
            other => panic!("expected structure error, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_rejected() {
        let mut g = simple();
        g.attach("12V", Loss::resistive("A", 0.1).unwrap()).unwrap();
        g.attach("A", Loss::resistive("B", 0.1).unwrap()).unwrap();
        g.connect("B", "A").unwrap();
        assert!(g.disconnect("12V", "A").unwrap());
        match g.validate() {
            Err(BudgetError::Structure { node, fault }) => {
                assert_eq!(node, "A");
                assert_eq!(fault, StructureFault::Cycle);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_orphan_rejected() {
        let mut g = simple();
        g.disconnect("12V", "Buck").unwrap();
        assert!(matches!(
            g.validate(),
            Err(BudgetError::Structure {
                fault: StructureFault::Orphan,
                ..
            })
        ));
    }

    #[test]
    fn test_source_with_parent_rejected() {
        let mut g = simple();
        g.add_source(Source::new("AUX", 5.0).unwrap()).unwrap();
        g.connect("Buck", "AUX").unwrap();
        assert!(matches!(
            g.validate(),
            Err(BudgetError::Structure {
                fault: StructureFault::SourceHasParent,
                ..
            })
        ));
    }

    #[test]
    fn test_terminal_with_children_rejected() {
        let mut g = simple();
        g.attach("12V", Load::current("Fan", 0.2).unwrap()).unwrap();
        g.attach("12V", Loss::resistive("Trace", 0.1).unwrap()).unwrap();
        g.disconnect("12V", "Trace").unwrap();
        g.connect("Fan", "Trace").unwrap();
        match g.validate() {
            Err(BudgetError::Structure { node, fault }) => {
                assert_eq!(node, "Fan");
                assert_eq!(fault, StructureFault::TerminalHasChildren);
            }
            other => panic!("expected structure error, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_leaf_warns() {
        let mut g = simple();
        g.attach("12V", Loss::resistive("Spare", 0.1).unwrap()).unwrap();
        let warnings = g.validate().unwrap();
        assert_eq!(
            warnings,
            vec![StructureWarning::Unterminated {
                node: "Spare".to_string(),
                kind: ElementKind::Loss,
            }]
        );
    }
}
