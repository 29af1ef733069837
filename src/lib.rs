//! # Power Budget
//!
//! A steady-state DC power-budget solver for power-distribution trees.
//!
//! This library provides:
//! - An element model for sources, converters, linear regulators, loss
//!   paths, loads and nested subsystems
//! - A topology graph with structural validation
//! - A fixed-point power-flow solver for coupled voltage/current demand
//! - Result aggregation: per-source and system totals, path efficiencies,
//!   diagnostics and time-weighted phase budgets
//!
//! ## Architecture
//!
//! - [`elements`] - Element models and their transfer functions
//! - [`topology`] - Graph construction, queries and validation
//! - [`solver`] - Demand/resolution propagation to a fixed point
//! - [`report`] - Result tables and phase schedules
//! - [`diagnostics`] - Limit, undervoltage and convergence flags
//!
//! ## Usage
//!
//! ```
//! use power_budget::{analyze, Converter, Load, Source, SolverConfig, TopologyGraph};
//!
//! let mut graph = TopologyGraph::new("board");
//! graph.add_source(Source::new("Battery", 3.7)?.with_resistance(0.05))?;
//! graph.attach("Battery", Converter::new("Buck", 1.8, 0.88)?)?;
//! graph.attach("Buck", Load::current("MCU", 0.02)?)?;
//!
//! let table = analyze(&graph, &SolverConfig::default())?;
//! assert!(table.system.efficiency < 1.0);
//! # Ok::<(), power_budget::BudgetError>(())
//! ```
//!
//! ## Solve Method
//!
//! Each source subtree is solved independently:
//!
//! 1. Sum the children's input currents into every node's output current
//! 2. Apply each element's transfer from the source towards the loads
//! 3. Repeat until input voltages and currents settle, re-evaluating only
//!    nodes whose operating point moved
//!
//! Limit breaches and non-convergence are reported per node instead of
//! aborting, unless strict mode is enabled.

pub mod diagnostics;
pub mod elements;
pub mod error;
pub mod report;
pub mod solver;
pub mod topology;

// Re-export main types for convenience
pub use diagnostics::{Category, Flag, Quantity};
pub use elements::{
    Converter, Efficiency, Element, ElementKind, Limits, LinearRegulator, Load, LoadDemand, Loss,
    OutputVoltage, Source, Subsystem, VoltageDrop,
};
pub use error::{BudgetError, Result, StructureFault};
pub use report::{analyze, solve_phases, PhaseReport, PhaseSchedule, ResultTable};
pub use solver::{solve, NodeState, Solution, SolverConfig, StrictMode};
pub use topology::{NodeId, TopologyGraph};
