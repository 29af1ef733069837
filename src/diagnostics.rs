//! Per-node diagnostic flags collected during a solve.
//!
//! Flags are never raised while solving. They are attached to the node state
//! that produced them and handed to the caller with the result, unless strict
//! mode promotes a category to an error.

use std::fmt;

/// An electrical quantity monitored against element limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quantity {
    /// Input (rail) voltage
    InputVoltage,
    /// Output voltage
    OutputVoltage,
    /// Input current drawn from the parent rail
    InputCurrent,
    /// Output current delivered to children
    OutputCurrent,
}

impl Quantity {
    /// Whether this quantity is a voltage.
    pub fn is_voltage(&self) -> bool {
        matches!(self, Quantity::InputVoltage | Quantity::OutputVoltage)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Quantity::InputVoltage => "vi",
            Quantity::OutputVoltage => "vo",
            Quantity::InputCurrent => "ii",
            Quantity::OutputCurrent => "io",
        };
        f.write_str(s)
    }
}

/// Diagnostic category, used to decide strict-mode promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// A monitored quantity left its limit window
    LimitExceeded,
    /// A voltage fell below its window floor
    Undervoltage,
    /// The node did not settle within the iteration cap
    NonConvergent,
}

/// A condition detected at one node during a solve.
#[derive(Debug, Clone, PartialEq)]
pub enum Flag {
    /// A quantity left its configured `[min, max]` window.
    LimitExceeded {
        quantity: Quantity,
        value: f64,
        limit: f64,
    },
    /// A voltage fell below its configured floor.
    Undervoltage {
        quantity: Quantity,
        value: f64,
        floor: f64,
    },
    /// The local fixed-point iteration did not settle; last values are used.
    NonConvergent { iterations: usize, residual: f64 },
    /// A flag raised inside a subsystem, tagged with the inner element name.
    Inner { element: String, flag: Box<Flag> },
}

impl Flag {
    /// Category of the flag, looking through subsystem nesting.
    pub fn category(&self) -> Category {
        match self {
            Flag::LimitExceeded { .. } => Category::LimitExceeded,
            Flag::Undervoltage { .. } => Category::Undervoltage,
            Flag::NonConvergent { .. } => Category::NonConvergent,
            Flag::Inner { flag, .. } => flag.category(),
        }
    }

    /// Innermost flag and the element path leading to it, outermost first.
    pub fn innermost(&self) -> (Vec<&str>, &Flag) {
        let mut path = Vec::new();
        let mut flag = self;
        while let Flag::Inner { element, flag: inner } = flag {
            path.push(element.as_str());
            flag = inner;
        }
        (path, flag)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::LimitExceeded {
                quantity,
                value,
                limit,
            } => write!(f, "LIMIT_EXCEEDED {quantity}={value:.4e} (limit {limit:.4e})"),
            Flag::Undervoltage {
                quantity,
                value,
                floor,
            } => write!(f, "UNDERVOLTAGE {quantity}={value:.4e} (floor {floor:.4e})"),
            Flag::NonConvergent {
                iterations,
                residual,
            } => write!(
                f,
                "NON_CONVERGENT after {iterations} iterations (residual {residual:.2e})"
            ),
            Flag::Inner { element, flag } => write!(f, "{element}: {flag}"),
        }
    }
}
