//! Subsystems: a nested power tree seen by its parent as one load.

use std::sync::Arc;

use super::{ElementKind, Limits, Transfer};
use crate::error::{BudgetError, Result, StructureFault};
use crate::solver::{solve_supplied, SolverConfig};
use crate::topology::TopologyGraph;

/// A reusable composite element.
///
/// The inner graph has exactly one source. When the subsystem is solved the
/// parent rail voltage replaces that source's EMF; the source's series
/// resistance is kept and models the subsystem input path. The subsystem is
/// terminal: it has no children in the outer graph.
#[derive(Debug, Clone)]
pub struct Subsystem {
    pub name: String,
    graph: Arc<TopologyGraph>,
    pub limits: Limits,
}

impl Subsystem {
    /// Wrap a graph as a subsystem. The graph must be valid and have one source.
    pub fn new(name: impl Into<String>, graph: TopologyGraph) -> Result<Self> {
        let name = name.into();
        graph.validate()?;
        if graph.sources().len() != 1 {
            return Err(BudgetError::structure(name, StructureFault::SubsystemRoot));
        }
        Ok(Self {
            name,
            graph: Arc::new(graph),
            limits: Limits::default(),
        })
    }

    /// Set operating limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// The inner graph.
    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    /// Solve the inner graph at `input_voltage` and collapse it.
    pub fn transfer(&self, input_voltage: f64, config: &SolverConfig) -> Result<Transfer> {
        if input_voltage == 0.0 {
            return Ok(Transfer::idle());
        }
        let inner = solve_supplied(&self.graph, input_voltage, config)?;
        let input_current = inner
            .states
            .iter()
            .find(|s| s.kind == ElementKind::Source)
            .map(|s| s.output_current)
            .unwrap_or(0.0);
        let power_in = (input_voltage * input_current).abs();
        let power_dissipated = inner.total_dissipated();
        Ok(Transfer {
            output_voltage: 0.0,
            input_current,
            power_in,
            power_out: power_in - power_dissipated,
            power_dissipated,
            inner: Some(Box::new(inner)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Converter, Load, Source};
    use approx::assert_relative_eq;

    fn sensor_board() -> TopologyGraph {
        let mut g = TopologyGraph::new("sensor board");
        g.add_source(Source::new("VIN", 5.0).unwrap()).unwrap();
        g.attach("VIN", Converter::new("Buck", 3.3, 0.8).unwrap())
            .unwrap();
        g.attach("Buck", Load::current("Sensor", 0.1).unwrap()).unwrap();
        g
    }

    #[test]
    fn test_subsystem_collapses_inner_graph() {
        let sub = Subsystem::new("Board", sensor_board()).unwrap();
        let t = sub.transfer(12.0, &SolverConfig::default()).unwrap();
        assert_relative_eq!(t.input_current, 0.33 / (0.8 * 12.0), max_relative = 1e-9);
        assert_relative_eq!(t.power_out, 0.33, max_relative = 1e-9);
        assert_relative_eq!(t.power_dissipated, 0.33 / 0.8 - 0.33, max_relative = 1e-9);
        assert!(t.inner.is_some());
    }

    #[test]
    fn test_subsystem_requires_single_source() {
        let mut g = sensor_board();
        g.add_source(Source::new("AUX", 3.0).unwrap()).unwrap();
        assert!(matches!(
            Subsystem::new("Board", g),
            Err(BudgetError::Structure {
                fault: StructureFault::SubsystemRoot,
                ..
            })
        ));
    }

    #[test]
    fn test_unpowered_subsystem() {
        let sub = Subsystem::new("Board", sensor_board()).unwrap();
        let t = sub.transfer(0.0, &SolverConfig::default()).unwrap();
        assert_eq!(t, Transfer::idle());
    }
}
