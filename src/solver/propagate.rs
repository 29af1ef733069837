//! Demand/resolution fixed point over one source subtree.
//!
//! Each iteration runs two passes:
//! 1. Demand (children before parents): every node sums its children's input
//!    currents into its output current and evaluates its own input current at
//!    the input voltage of the previous resolution.
//! 2. Resolution (parents before children): starting from the source EMF,
//!    every node is evaluated at its parent's output voltage and its demanded
//!    output current.
//!
//! A node has settled when its resolved input current matches the one its
//! parent was told about and, for voltage-dependent elements, its input
//! voltage did not move. Each node caches the operating point of its last
//! evaluation, so nodes whose inputs did not change are not re-evaluated.

use std::collections::HashMap;

use super::{NodeState, SolverConfig, ABS_TOLERANCE};
use crate::diagnostics::Flag;
use crate::elements::{Element, Transfer};
use crate::error::Result;
use crate::topology::{NodeId, TopologyGraph};

/// Working state of one node.
struct Cell<'a> {
    id: NodeId,
    element: &'a Element,
    /// Index of the parent cell
    parent: Option<usize>,
    children: Vec<usize>,
    voltage_dependent: bool,
    /// Input voltage of the latest resolution
    input_voltage: f64,
    /// Sum of the children's demanded input currents
    output_current: f64,
    /// Input voltage and current reported by the latest demand pass
    demand_voltage: f64,
    demand_current: f64,
    /// Operating point of `transfer`
    point: Option<(f64, f64)>,
    transfer: Transfer,
    settled: bool,
    residual: f64,
}

impl<'a> Cell<'a> {
    fn evaluate(
        &mut self,
        input_voltage: f64,
        output_current: f64,
        config: &SolverConfig,
        evaluations: &mut usize,
    ) -> Result<&Transfer> {
        let point = (input_voltage, output_current);
        if self.point != Some(point) {
            self.transfer = self.element.transfer(input_voltage, output_current, config)?;
            self.point = Some(point);
            *evaluations += 1;
        }
        Ok(&self.transfer)
    }
}

/// Outcome of a subtree solve.
pub(crate) struct SubtreeSolve {
    pub states: Vec<NodeState>,
    pub iterations: usize,
    pub converged: bool,
    pub evaluations: usize,
}

/// One source and everything it powers.
pub(crate) struct Subtree<'a> {
    source: NodeId,
    /// Cells in pre-order; index 0 is the source
    cells: Vec<Cell<'a>>,
    supply: f64,
    evaluations: usize,
}

impl<'a> Subtree<'a> {
    /// Collect the subtree under `source`. `supply` overrides the source EMF.
    pub(crate) fn new(graph: &'a TopologyGraph, source: NodeId, supply: Option<f64>) -> Self {
        let order = graph.subtree(source);
        let index: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let cells: Vec<Cell<'a>> = order
            .iter()
            .filter_map(|&id| graph.node(id).map(|element| (id, element)))
            .map(|(id, element)| Cell {
                id,
                element,
                parent: graph.parent_of(id).and_then(|p| index.get(&p).copied()),
                children: graph
                    .children_of(id)
                    .iter()
                    .filter_map(|c| index.get(c).copied())
                    .collect(),
                voltage_dependent: element.is_voltage_dependent(),
                input_voltage: 0.0,
                output_current: 0.0,
                demand_voltage: 0.0,
                demand_current: 0.0,
                point: None,
                transfer: Transfer::idle(),
                settled: false,
                residual: 0.0,
            })
            .collect();

        let supply = supply
            .or_else(|| graph.node(source).and_then(Element::supply_voltage))
            .unwrap_or(0.0);

        Self {
            source,
            cells,
            supply,
            evaluations: 0,
        }
    }

    fn input_voltage(&self, i: usize) -> f64 {
        match self.cells[i].parent {
            Some(p) => self.cells[p].transfer.output_voltage,
            None => self.supply,
        }
    }

    /// Resolve every node with no load attached, to seed the voltages.
    fn initialize(&mut self, config: &SolverConfig) -> Result<()> {
        for i in 0..self.cells.len() {
            let vi = self.input_voltage(i);
            let cell = &mut self.cells[i];
            cell.evaluate(vi, 0.0, config, &mut self.evaluations)?;
            cell.input_voltage = vi;
        }
        Ok(())
    }

    fn demand_pass(&mut self, config: &SolverConfig) -> Result<()> {
        for i in (0..self.cells.len()).rev() {
            let io: f64 = self.cells[i]
                .children
                .iter()
                .map(|&c| self.cells[c].demand_current)
                .sum();
            let cell = &mut self.cells[i];
            let vi = cell.input_voltage;
            let ii = cell.evaluate(vi, io, config, &mut self.evaluations)?.input_current;
            cell.output_current = io;
            cell.demand_voltage = vi;
            cell.demand_current = ii;
        }
        Ok(())
    }

    /// Returns whether every node settled and the largest residual.
    fn resolution_pass(&mut self, config: &SolverConfig) -> Result<(bool, f64)> {
        let tolerance = config.tolerance;
        let mut all_settled = true;
        let mut worst = 0.0_f64;
        for i in 0..self.cells.len() {
            let vi = self.input_voltage(i);
            let cell = &mut self.cells[i];
            let io = cell.output_current;
            let ii = cell.evaluate(vi, io, config, &mut self.evaluations)?.input_current;

            let mut settled = within(ii, cell.demand_current, tolerance);
            let mut residual = relative_change(ii, cell.demand_current);
            if cell.voltage_dependent {
                settled &= within(vi, cell.demand_voltage, tolerance);
                residual = residual.max(relative_change(vi, cell.demand_voltage));
            }
            cell.input_voltage = vi;
            cell.settled = settled;
            cell.residual = residual;

            all_settled &= settled;
            worst = worst.max(residual);
        }
        Ok((all_settled, worst))
    }

    /// Iterate to a fixed point and produce node states in pre-order.
    pub(crate) fn solve(mut self, config: &SolverConfig) -> Result<SubtreeSolve> {
        self.initialize(config)?;

        let mut iterations = 0;
        let mut converged = false;
        while iterations < config.max_iterations {
            iterations += 1;
            self.demand_pass(config)?;
            let (settled, residual) = self.resolution_pass(config)?;
            log::trace!(
                "source {}: iteration {} residual {:.3e}",
                self.source,
                iterations,
                residual
            );
            if settled {
                converged = true;
                break;
            }
        }

        if !converged {
            for cell in self.cells.iter().filter(|c| !c.settled) {
                log::warn!(
                    "'{}' did not converge after {} iterations (residual {:.3e})",
                    cell.element.name(),
                    iterations,
                    cell.residual
                );
            }
        }

        let phase = config.phase.as_deref();
        let states = self
            .cells
            .iter()
            .map(|cell| self.state_of(cell, iterations, converged, phase))
            .collect();

        Ok(SubtreeSolve {
            states,
            iterations,
            converged,
            evaluations: self.evaluations,
        })
    }

    fn state_of(
        &self,
        cell: &Cell<'_>,
        iterations: usize,
        converged: bool,
        phase: Option<&str>,
    ) -> NodeState {
        let t = &cell.transfer;
        let mut flags = cell.element.check_limits(
            cell.input_voltage,
            t.output_voltage,
            t.input_current,
            cell.output_current,
            phase,
        );
        if !converged && !cell.settled {
            flags.push(Flag::NonConvergent {
                iterations,
                residual: cell.residual,
            });
        }
        if let Some(inner) = &t.inner {
            flags.extend(inner.states.iter().flat_map(|s| {
                s.flags.iter().map(move |f| Flag::Inner {
                    element: s.name.clone(),
                    flag: Box::new(f.clone()),
                })
            }));
        }

        NodeState {
            id: cell.id,
            name: cell.element.name().to_string(),
            kind: cell.element.kind(),
            parent: cell.parent.map(|p| self.cells[p].id),
            domain: self.source,
            input_voltage: cell.input_voltage,
            output_voltage: t.output_voltage,
            input_current: t.input_current,
            output_current: cell.output_current,
            power_in: t.power_in,
            power_out: t.power_out,
            power_dissipated: t.power_dissipated,
            efficiency: t.efficiency(),
            flags,
            subsystem: t.inner.clone(),
        }
    }
}

/// Relative difference, with an absolute floor for values near zero.
fn within(new: f64, old: f64, tolerance: f64) -> bool {
    (new - old).abs() <= (tolerance * new.abs().max(old.abs())).max(ABS_TOLERANCE)
}

fn relative_change(new: f64, old: f64) -> f64 {
    let scale = new.abs().max(old.abs());
    if scale <= ABS_TOLERANCE {
        0.0
    } else {
        (new - old).abs() / scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Converter, Load, Loss, Source};
    use approx::assert_relative_eq;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn solve_first(graph: &TopologyGraph, config: &SolverConfig) -> SubtreeSolve {
        let source = graph.sources()[0];
        Subtree::new(graph, source, None).solve(config).unwrap()
    }

    #[test]
    fn test_tolerance_helpers() {
        assert!(within(1.0, 1.0 + 1e-7, 1e-6));
        assert!(!within(1.0, 1.0 + 1e-5, 1e-6));
        assert!(within(0.0, 1e-13, 1e-6));
        assert_eq!(relative_change(0.0, 0.0), 0.0);
        assert_relative_eq!(relative_change(2.0, 1.0), 0.5);
    }

    #[test]
    fn test_voltage_independent_tree_single_iteration() {
        init_logging();
        let mut g = TopologyGraph::new("rails");
        g.add_source(Source::new("5V", 5.0).unwrap()).unwrap();
        g.attach("5V", Loss::resistive("Trace", 0.1).unwrap()).unwrap();
        g.attach("Trace", Load::current("LED", 0.02).unwrap()).unwrap();

        let result = solve_first(&g, &SolverConfig::default());
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        // Seed pass (3), new demands at Trace and 5V (2), LED at its new rail (1)
        assert_eq!(result.evaluations, 6);
    }

    #[test]
    fn test_supply_override() {
        let mut g = TopologyGraph::new("board");
        g.add_source(Source::new("VIN", 5.0).unwrap()).unwrap();
        g.attach("VIN", Load::resistance("Heater", 10.0).unwrap())
            .unwrap();

        let source = g.sources()[0];
        let result = Subtree::new(&g, source, Some(12.0))
            .solve(&SolverConfig::default())
            .unwrap();
        assert_eq!(result.states[0].input_voltage, 12.0);
        assert_relative_eq!(result.states[1].input_current, 1.2, max_relative = 1e-12);
    }

    #[test]
    fn test_unchanged_branch_is_not_reevaluated() {
        init_logging();
        let build = |with_branch: bool| {
            let mut g = TopologyGraph::new("branches");
            g.add_source(Source::new("5V", 5.0).unwrap()).unwrap();
            g.attach("5V", Loss::resistive("Cable", 1.0).unwrap()).unwrap();
            g.attach("Cable", Converter::new("Buck", 3.3, 0.9).unwrap())
                .unwrap();
            g.attach("Buck", Load::current("CPU", 1.0).unwrap()).unwrap();
            if with_branch {
                g.attach("5V", Loss::resistive("Trace", 0.1).unwrap()).unwrap();
                g.attach("Trace", Load::current("LED", 1.0).unwrap()).unwrap();
            }
            g
        };

        let config = SolverConfig::default();
        let base = solve_first(&build(false), &config);
        let with_branch = solve_first(&build(true), &config);

        assert!(base.converged && with_branch.converged);
        assert!(base.iterations > 2);
        assert_eq!(base.iterations, with_branch.iterations);
        // The extra branch is only evaluated while its operating point moves:
        // seeding (2), first demand (1), first resolution (1).
        assert_eq!(with_branch.evaluations - base.evaluations, 4);
    }
}
