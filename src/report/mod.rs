//! Result aggregation.
//!
//! Collapses per-node solver state into a [`ResultTable`]: one row per
//! element, a summary per source, system totals, source-to-leaf path
//! efficiencies and every diagnostic grouped by node. [`solve_phases`]
//! repeats this for each phase of a [`PhaseSchedule`] and combines the
//! results over one cycle.
//!
//! Nothing here formats text; presentation is left to the caller.

mod phases;
mod table;

pub use phases::{solve_phases, PhaseReport, PhaseResult, PhaseSchedule};
pub use table::{NodeDiagnostics, PathEfficiency, ResultTable, Row, SourceSummary, SystemSummary};

use crate::error::Result;
use crate::solver::{solve, SolverConfig};
use crate::topology::TopologyGraph;

/// Solve a graph and aggregate the result.
pub fn analyze(graph: &TopologyGraph, config: &SolverConfig) -> Result<ResultTable> {
    let solution = solve(graph, config)?;
    Ok(ResultTable::from_solution(&solution))
}
