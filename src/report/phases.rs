//! Operating-phase schedules and time-weighted budgets.

use std::collections::HashSet;

use super::ResultTable;
use crate::error::{BudgetError, Result};
use crate::solver::{solve, SolverConfig};
use crate::topology::TopologyGraph;

/// A repeating sequence of named operating phases.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSchedule {
    phases: Vec<(String, f64)>,
}

impl PhaseSchedule {
    /// Build a schedule from `(phase, duration)` pairs, in seconds.
    ///
    /// Needs at least two phases, unique names and positive durations.
    pub fn new<I, S>(phases: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let phases: Vec<(String, f64)> = phases
            .into_iter()
            .map(|(name, duration)| (name.into(), duration))
            .collect();
        if phases.len() < 2 {
            return Err(invalid("a schedule needs at least two phases"));
        }
        let mut seen = HashSet::new();
        for (name, duration) in &phases {
            if !seen.insert(name.as_str()) {
                return Err(invalid(format!("phase '{name}' is listed twice")));
            }
            if !(duration.is_finite() && *duration > 0.0) {
                return Err(invalid(format!(
                    "phase '{name}' has invalid duration {duration}"
                )));
            }
        }
        Ok(Self { phases })
    }

    /// Phases in schedule order.
    pub fn phases(&self) -> &[(String, f64)] {
        &self.phases
    }

    /// Length of one full cycle.
    pub fn period(&self) -> f64 {
        self.phases.iter().map(|(_, d)| d).sum()
    }
}

fn invalid(message: impl Into<String>) -> BudgetError {
    BudgetError::InvalidPhases {
        message: message.into(),
    }
}

/// Result of one phase of a schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseResult {
    pub phase: String,
    pub duration: f64,
    pub table: ResultTable,
}

/// Budget over a full schedule cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseReport {
    pub phases: Vec<PhaseResult>,
    /// Cycle length (s)
    pub period: f64,
    /// Time-weighted power drawn from all sources (W)
    pub average_power: f64,
    /// Time-weighted dissipated power (W)
    pub average_loss: f64,
    /// Energy drawn per cycle (J)
    pub energy: f64,
}

impl PhaseReport {
    /// Time-weighted output current of a named source.
    pub fn average_source_current(&self, source: &str) -> Option<f64> {
        let mut charge = 0.0;
        for phase in &self.phases {
            charge += phase.table.source(source)?.current * phase.duration;
        }
        Some(charge / self.period)
    }

    /// Result of a named phase.
    pub fn phase(&self, name: &str) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.phase == name)
    }
}

/// Solve every phase of a schedule and combine them over one cycle.
///
/// `config.phase` is ignored; every other setting applies to each phase.
pub fn solve_phases(
    graph: &TopologyGraph,
    schedule: &PhaseSchedule,
    config: &SolverConfig,
) -> Result<PhaseReport> {
    let mut phases = Vec::with_capacity(schedule.phases().len());
    for (phase, duration) in schedule.phases() {
        let config = config.clone().with_phase(phase.clone());
        let solution = solve(graph, &config)?;
        log::debug!("{}: phase '{}' solved", graph.name(), phase);
        phases.push(PhaseResult {
            phase: phase.clone(),
            duration: *duration,
            table: ResultTable::from_solution(&solution),
        });
    }

    let period = schedule.period();
    let energy: f64 = phases
        .iter()
        .map(|p| p.table.system.power * p.duration)
        .sum();
    let lost: f64 = phases
        .iter()
        .map(|p| p.table.system.loss * p.duration)
        .sum();

    Ok(PhaseReport {
        phases,
        period,
        average_power: energy / period,
        average_loss: lost / period,
        energy,
    })
}
