//! Steady-state power-flow solver.
//!
//! This module turns a validated [`TopologyGraph`] into per-node electrical
//! state. Every source and the elements it powers form an independent
//! subtree, solved on its own.
//!
//! ## Fixed-point propagation
//!
//! Current demand flows from the loads towards the source while voltage
//! flows from the source towards the loads. When an element's input current
//! depends on its input voltage (converters, constant-power loads, ...),
//! neither direction can be resolved alone, so each subtree alternates:
//!
//! ```text
//! demand:      io(n) = sum ii(children)      ii(n) = f(vi_prev(n), io(n))
//! resolution:  vi(n) = vo(parent)             vo(n), ii(n) = f(vi(n), io(n))
//! ```
//!
//! until input voltages and currents stop moving within the relative
//! tolerance. Nodes still moving at the iteration cap are flagged
//! NON_CONVERGENT and keep their last values.

mod config;
mod propagate;
mod state;

pub use config::{SolverConfig, StrictMode};
pub use state::{DomainSolve, NodeState, Solution};

use crate::diagnostics::Flag;
use crate::error::{BudgetError, Result};
use crate::topology::TopologyGraph;

use propagate::Subtree;

/// Default relative convergence tolerance.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Default iteration cap per source subtree.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Absolute floor of the convergence test, for values near zero.
pub const ABS_TOLERANCE: f64 = 1e-12;

/// Solve a topology.
///
/// The graph is validated first; a structural error aborts before anything
/// is computed. Limit, undervoltage and non-convergence findings are attached
/// to the node states, unless `config.strict` promotes them to errors.
pub fn solve(graph: &TopologyGraph, config: &SolverConfig) -> Result<Solution> {
    config.validate()?;
    let warnings = graph.validate()?;
    for warning in &warnings {
        log::debug!("{}: {}", graph.name(), warning);
    }
    if let Some(phase) = config.phase.as_deref() {
        if !graph.phases().contains(&phase) {
            return Err(BudgetError::UnknownPhase {
                phase: phase.to_string(),
            });
        }
    }

    let mut solution = run(graph, None, config)?;
    solution.warnings = warnings;
    enforce_strict(&solution, config)?;
    Ok(solution)
}

/// Solve a graph whose single source is fed at `supply` volts.
///
/// Used for subsystems, which are validated when they are built. Strict mode
/// is applied once, by the outermost solve.
pub(crate) fn solve_supplied(
    graph: &TopologyGraph,
    supply: f64,
    config: &SolverConfig,
) -> Result<Solution> {
    run(graph, Some(supply), config)
}

fn run(graph: &TopologyGraph, supply: Option<f64>, config: &SolverConfig) -> Result<Solution> {
    let mut solution = Solution::default();
    for source in graph.sources() {
        let result = Subtree::new(graph, source, supply).solve(config)?;
        log::debug!(
            "{}: source '{}' solved in {} iterations ({} evaluations, converged: {})",
            graph.name(),
            graph.name_of(source),
            result.iterations,
            result.evaluations,
            result.converged
        );
        solution.domains.push(DomainSolve {
            source,
            iterations: result.iterations,
            converged: result.converged,
            evaluations: result.evaluations,
        });
        solution.states.extend(result.states);
    }
    Ok(solution)
}

/// Return the first promoted diagnostic, in walk order, as an error.
fn enforce_strict(solution: &Solution, config: &SolverConfig) -> Result<()> {
    for state in &solution.states {
        for flag in &state.flags {
            if !config.strict.promotes(flag.category()) {
                continue;
            }
            let (path, inner) = flag.innermost();
            let node = std::iter::once(state.name.as_str())
                .chain(path)
                .collect::<Vec<_>>()
                .join("/");
            let err = match *inner {
                Flag::LimitExceeded {
                    quantity,
                    value,
                    limit,
                } => BudgetError::LimitExceeded {
                    node,
                    quantity,
                    value,
                    limit,
                },
                Flag::Undervoltage {
                    quantity,
                    value,
                    floor,
                } => BudgetError::Undervoltage {
                    node,
                    quantity,
                    value,
                    floor,
                },
                _ => continue,
            };
            log::warn!("strict mode: {}", err);
            return Err(err);
        }
    }
    Ok(())
}
