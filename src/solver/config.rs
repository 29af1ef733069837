//! Solver configuration.

use crate::diagnostics::Category;
use crate::error::{BudgetError, Result};

use super::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};

/// Which diagnostic categories abort a solve.
///
/// Non-convergence is never promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrictMode {
    /// Promote LIMIT_EXCEEDED to [`BudgetError::LimitExceeded`]
    pub limits: bool,
    /// Promote UNDERVOLTAGE to [`BudgetError::Undervoltage`]
    pub undervoltage: bool,
}

impl StrictMode {
    /// Promote every promotable category.
    pub fn all() -> Self {
        Self {
            limits: true,
            undervoltage: true,
        }
    }

    /// Report everything as diagnostics (the default).
    pub fn off() -> Self {
        Self::default()
    }

    /// Whether a flag of this category aborts the solve.
    pub fn promotes(&self, category: Category) -> bool {
        match category {
            Category::LimitExceeded => self.limits,
            Category::Undervoltage => self.undervoltage,
            Category::NonConvergent => false,
        }
    }
}

/// Configuration for a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Relative convergence tolerance for input voltage and current.
    pub tolerance: f64,
    /// Maximum fixed-point iterations per source subtree.
    pub max_iterations: usize,
    /// Diagnostic categories treated as fatal.
    pub strict: StrictMode,
    /// Operating phase to solve; `None` solves every element in its base state.
    pub phase: Option<String>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            strict: StrictMode::off(),
            phase: None,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relative convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the iteration cap per source subtree.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Turn strict mode fully on or off.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = if strict {
            StrictMode::all()
        } else {
            StrictMode::off()
        };
        self
    }

    /// Select exactly which categories are fatal.
    pub fn with_strict_mode(mut self, strict: StrictMode) -> Self {
        self.strict = strict;
        self
    }

    /// Solve one operating phase.
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Reject settings the fixed-point loop cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(BudgetError::invalid_config(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(BudgetError::invalid_config(
                "max_iterations must be at least 1",
            ));
        }
        Ok(())
    }
}
