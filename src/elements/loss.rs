//! Series loss elements: traces, cables, connectors, diodes, fuses.

use std::fmt;
use std::sync::Arc;

use super::{finite, Limits, Transfer};
use crate::error::Result;

/// Voltage drop as a pure function of (input voltage, current).
pub type DropFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// Voltage drop model of a loss element.
#[derive(Clone)]
pub enum VoltageDrop {
    /// Resistive drop plus a fixed forward drop: rs * I + vdrop.
    Series { rs: f64, vdrop: f64 },
    /// Caller-supplied drop function of (input voltage, current).
    Function(DropFn),
}

impl fmt::Debug for VoltageDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoltageDrop::Series { rs, vdrop } => f
                .debug_struct("Series")
                .field("rs", rs)
                .field("vdrop", vdrop)
                .finish(),
            VoltageDrop::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl VoltageDrop {
    /// Drop magnitude at an operating point.
    pub fn at(&self, input_voltage: f64, current: f64) -> f64 {
        match self {
            VoltageDrop::Series { rs, vdrop } => rs * current + vdrop,
            VoltageDrop::Function(f) => f(input_voltage, current).abs(),
        }
    }

    /// Function drops may depend on the rail voltage.
    pub fn is_voltage_dependent(&self) -> bool {
        matches!(self, VoltageDrop::Function(_))
    }
}

/// A series loss element.
///
/// Current passes through unchanged; the output voltage is reduced in
/// magnitude by the drop and clamps at zero.
#[derive(Debug, Clone)]
pub struct Loss {
    pub name: String,
    pub drop: VoltageDrop,
    pub limits: Limits,
}

impl Loss {
    /// Create a resistive loss.
    pub fn resistive(name: impl Into<String>, rs: f64) -> Result<Self> {
        Self::series(name, rs, 0.0)
    }

    /// Create a loss with series resistance and a fixed forward drop.
    pub fn series(name: impl Into<String>, rs: f64, vdrop: f64) -> Result<Self> {
        let name = name.into();
        let rs = finite(&name, "rs", rs)?.abs();
        let vdrop = finite(&name, "vdrop", vdrop)?.abs();
        Ok(Self {
            name,
            drop: VoltageDrop::Series { rs, vdrop },
            limits: Limits::default(),
        })
    }

    /// Create a loss with a caller-supplied drop function.
    pub fn function<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            drop: VoltageDrop::Function(Arc::new(f)),
            limits: Limits::default(),
        }
    }

    /// Set operating limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Evaluate the loss element.
    pub fn transfer(&self, input_voltage: f64, output_current: f64) -> Transfer {
        if input_voltage == 0.0 {
            return Transfer::idle();
        }
        let current = output_current.abs();
        let drop = self.drop.at(input_voltage, current);
        let magnitude = (input_voltage.abs() - drop).max(0.0);
        let vo = magnitude.copysign(input_voltage);
        Transfer::from_terminals(input_voltage, vo, current, current)
    }
}
