//! Result table: per-node rows plus source and system aggregates.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::Flag;
use crate::elements::ElementKind;
use crate::solver::{NodeState, Solution};
use crate::topology::{NodeId, StructureWarning};

/// One element of the result table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Parent element name, `None` for sources
    pub parent: Option<String>,
    /// Name of the source powering the element
    pub domain: String,
    pub state: NodeState,
}

impl Row {
    /// Element name.
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Element kind.
    pub fn kind(&self) -> ElementKind {
        self.state.kind
    }
}

/// Aggregates for one source and the elements it powers.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub source: String,
    /// Output current of the source
    pub current: f64,
    /// Power drawn from the source EMF
    pub power: f64,
    /// Power reaching loads and subsystem loads
    pub delivered: f64,
    /// Power dissipated in the domain, source resistance included
    pub loss: f64,
    /// `delivered / power`, 1.0 when nothing is drawn
    pub efficiency: f64,
}

/// Whole-system totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemSummary {
    /// Power drawn from all sources
    pub power: f64,
    /// Power dissipated in all elements
    pub loss: f64,
    /// `(power - loss) / power`, 1.0 when nothing is drawn
    pub efficiency: f64,
    /// Whether any node raised a diagnostic
    pub has_warnings: bool,
}

/// Cumulative efficiency from a source to one leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEfficiency {
    /// Element names, source first
    pub nodes: Vec<String>,
    /// Product of the node efficiencies along the path
    pub efficiency: f64,
}

impl PathEfficiency {
    /// Name of the leaf the path ends at.
    pub fn leaf(&self) -> &str {
        self.nodes.last().map(String::as_str).unwrap_or("")
    }
}

/// All diagnostics raised at one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDiagnostics {
    pub node: String,
    pub flags: Vec<Flag>,
}

/// Structured result of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    /// One row per element, in walk order
    pub rows: Vec<Row>,
    /// One summary per source, in source order
    pub sources: Vec<SourceSummary>,
    pub system: SystemSummary,
    /// One path per leaf, in walk order
    pub paths: Vec<PathEfficiency>,
    /// Path with the lowest cumulative efficiency (first one on ties)
    pub worst_path: Option<PathEfficiency>,
    /// Least efficient element on the worst path
    pub dominant_loss: Option<String>,
    /// Diagnostics grouped by node, in walk order
    pub diagnostics: Vec<NodeDiagnostics>,
    pub warnings: Vec<StructureWarning>,
}

impl ResultTable {
    /// Aggregate a solution.
    pub fn from_solution(solution: &Solution) -> Self {
        let by_id: HashMap<NodeId, &NodeState> =
            solution.states.iter().map(|s| (s.id, s)).collect();
        let name_of = |id: NodeId| by_id.get(&id).map(|s| s.name.clone()).unwrap_or_default();

        let rows: Vec<Row> = solution
            .states
            .iter()
            .map(|s| Row {
                parent: s.parent.map(name_of),
                domain: name_of(s.domain),
                state: s.clone(),
            })
            .collect();

        let sources: Vec<SourceSummary> = solution
            .states
            .iter()
            .filter(|s| s.kind == ElementKind::Source)
            .map(|src| source_summary(src, &solution.states))
            .collect();

        let power: f64 = sources.iter().map(|s| s.power).sum();
        let loss = solution.total_dissipated();
        let diagnostics: Vec<NodeDiagnostics> = solution
            .states
            .iter()
            .filter(|s| s.has_flags())
            .map(|s| NodeDiagnostics {
                node: s.name.clone(),
                flags: s.flags.clone(),
            })
            .collect();
        let system = SystemSummary {
            power,
            loss,
            efficiency: if power > 0.0 {
                (power - loss) / power
            } else {
                1.0
            },
            has_warnings: !diagnostics.is_empty(),
        };

        let paths = leaf_paths(solution, &by_id);
        let worst_path = paths
            .iter()
            .fold(None::<&PathEfficiency>, |worst, p| match worst {
                Some(w) if w.efficiency <= p.efficiency => Some(w),
                _ => Some(p),
            })
            .cloned();
        let dominant_loss = worst_path.as_ref().and_then(|path| {
            path.nodes
                .iter()
                .filter_map(|n| solution.state(n))
                .fold(None::<&NodeState>, |least, s| match least {
                    Some(l) if l.efficiency <= s.efficiency => Some(l),
                    _ => Some(s),
                })
                .map(|s| s.name.clone())
        });

        Self {
            rows,
            sources,
            system,
            paths,
            worst_path,
            dominant_loss,
            diagnostics,
            warnings: solution.warnings.clone(),
        }
    }

    /// Row of a named element.
    pub fn row(&self, name: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.name() == name)
    }

    /// Summary of a named source.
    pub fn source(&self, name: &str) -> Option<&SourceSummary> {
        self.sources.iter().find(|s| s.source == name)
    }
}

fn source_summary(src: &NodeState, states: &[NodeState]) -> SourceSummary {
    let domain = states.iter().filter(|s| s.domain == src.id);
    let mut delivered = 0.0;
    let mut loss = 0.0;
    for s in domain {
        loss += s.power_dissipated;
        match s.kind {
            ElementKind::Load => delivered += s.power_in,
            ElementKind::Subsystem => delivered += s.power_out,
            _ => {}
        }
    }
    SourceSummary {
        source: src.name.clone(),
        current: src.output_current,
        power: src.power_in,
        delivered,
        loss,
        efficiency: if src.power_in > 0.0 {
            delivered / src.power_in
        } else {
            1.0
        },
    }
}

/// Source-to-leaf paths for every element without children.
fn leaf_paths<'a>(
    solution: &'a Solution,
    by_id: &HashMap<NodeId, &'a NodeState>,
) -> Vec<PathEfficiency> {
    let has_children: HashSet<NodeId> =
        solution.states.iter().filter_map(|s| s.parent).collect();

    solution
        .states
        .iter()
        .filter(|s| !has_children.contains(&s.id))
        .map(|leaf| {
            let mut chain = vec![leaf];
            let mut current = leaf.parent;
            while let Some(p) = current.and_then(|id| by_id.get(&id).copied()) {
                if chain.len() > by_id.len() {
                    break;
                }
                chain.push(p);
                current = p.parent;
            }
            chain.reverse();
            PathEfficiency {
                efficiency: chain.iter().map(|s| s.efficiency).product(),
                nodes: chain.iter().map(|s| s.name.clone()).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Converter, Limits, LinearRegulator, Load, Loss, Source};
    use crate::solver::{solve, SolverConfig};
    use crate::topology::TopologyGraph;
    use approx::assert_relative_eq;

    fn table(graph: &TopologyGraph) -> ResultTable {
        ResultTable::from_solution(&solve(graph, &SolverConfig::default()).unwrap())
    }

    fn two_rails() -> TopologyGraph {
        let mut g = TopologyGraph::new("two rails");
        g.add_source(Source::new("12V", 12.0).unwrap()).unwrap();
        g.attach("12V", Converter::new("Buck 5V", 5.0, 0.9).unwrap())
            .unwrap();
        g.attach("Buck 5V", Load::current("USB", 0.5).unwrap()).unwrap();
        g.attach("Buck 5V", LinearRegulator::new("LDO 3.3V", 3.3, 0.3).unwrap())
            .unwrap();
        g.attach("LDO 3.3V", Load::current("MCU", 0.1).unwrap()).unwrap();
        g.attach("12V", Loss::resistive("Harness", 0.2).unwrap()).unwrap();
        g.attach("Harness", Load::power("Pump", 6.0).unwrap()).unwrap();
        g
    }

    #[test]
    fn test_rows_follow_walk_order() {
        let t = table(&two_rails());
        let names: Vec<&str> = t.rows.iter().map(Row::name).collect();
        assert_eq!(
            names,
            vec!["12V", "Buck 5V", "USB", "LDO 3.3V", "MCU", "Harness", "Pump"]
        );
        let mcu = t.row("MCU").unwrap();
        assert_eq!(mcu.parent.as_deref(), Some("LDO 3.3V"));
        assert_eq!(mcu.domain, "12V");
        assert_eq!(mcu.kind(), ElementKind::Load);
        assert_eq!(t.row("12V").unwrap().parent, None);
    }

    #[test]
    fn test_path_efficiency_is_product_of_nodes() {
        let t = table(&two_rails());
        assert_eq!(t.paths.len(), 3);
        for path in &t.paths {
            let product: f64 = path
                .nodes
                .iter()
                .map(|n| t.row(n).unwrap().state.efficiency)
                .product();
            assert_relative_eq!(path.efficiency, product, max_relative = 1e-12);
        }

        let mcu = t.paths.iter().find(|p| p.leaf() == "MCU").unwrap();
        assert_eq!(mcu.nodes, vec!["12V", "Buck 5V", "LDO 3.3V", "MCU"]);
        assert_relative_eq!(mcu.efficiency, 0.9 * 3.3 / 5.0, max_relative = 1e-9);
    }

    #[test]
    fn test_worst_path_and_dominant_loss() {
        let t = table(&two_rails());
        let worst = t.worst_path.as_ref().unwrap();
        assert_eq!(worst.leaf(), "MCU");
        assert_eq!(t.dominant_loss.as_deref(), Some("LDO 3.3V"));
    }

    #[test]
    fn test_source_and_system_summary() {
        let t = table(&two_rails());
        let src = t.source("12V").unwrap();
        assert_relative_eq!(src.power, 12.0 * src.current, max_relative = 1e-12);
        assert_relative_eq!(src.delivered, 0.5 * 5.0 + 0.1 * 3.3 + 6.0, max_relative = 1e-9);
        assert_relative_eq!(src.power, src.delivered + src.loss, max_relative = 1e-6);

        assert_relative_eq!(t.system.power, src.power, max_relative = 1e-12);
        assert_relative_eq!(
            t.system.efficiency,
            (t.system.power - t.system.loss) / t.system.power,
            max_relative = 1e-12
        );
        assert!(!t.system.has_warnings);
        assert!(t.diagnostics.is_empty());
    }

    #[test]
    fn test_diagnostics_grouped_by_node() {
        let mut g = TopologyGraph::new("overloaded");
        g.add_source(Source::new("5V", 5.0).unwrap().with_current_limit(0.5))
            .unwrap();
        g.attach("5V", Loss::resistive("Fuse", 1.0).unwrap()).unwrap();
        g.attach(
            "Fuse",
            Load::current("Motor", 1.0).unwrap().with_limits(Limits::new().with_vi(4.5, 5.5)),
        )
        .unwrap();

        let t = table(&g);
        assert!(t.system.has_warnings);
        let nodes: Vec<&str> = t.diagnostics.iter().map(|d| d.node.as_str()).collect();
        assert_eq!(nodes, vec!["5V", "Motor"]);
        assert_eq!(t.diagnostics[1].flags.len(), 1);
    }

    #[test]
    fn test_empty_solution() {
        let t = ResultTable::from_solution(&Solution::default());
        assert!(t.rows.is_empty());
        assert_eq!(t.system.efficiency, 1.0);
        assert!(t.worst_path.is_none());
        assert!(t.dominant_loss.is_none());
    }
}
