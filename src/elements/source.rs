//! Voltage sources.

use super::{finite, Limits, Transfer};
use crate::error::Result;

/// A DC voltage source (battery, supply, bus).
///
/// The source has an EMF and an optional series resistance:
///   V_out = EMF - rs * I_out
/// and dissipates rs * I_out^2 internally. A source has no parent and draws
/// no input current.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub name: String,
    /// Open-circuit voltage
    pub voltage: f64,
    /// Internal series resistance
    pub rs: f64,
    pub limits: Limits,
}

impl Source {
    /// Create an ideal source; the EMF must be finite.
    pub fn new(name: impl Into<String>, voltage: f64) -> Result<Self> {
        let name = name.into();
        let voltage = finite(&name, "voltage", voltage)?;
        Ok(Self {
            name,
            voltage,
            rs: 0.0,
            limits: Limits::default(),
        })
    }

    /// Set the internal series resistance.
    pub fn with_resistance(mut self, rs: f64) -> Self {
        self.rs = rs.abs();
        self
    }

    /// Limit the output current (the source current limit).
    pub fn with_current_limit(mut self, max: f64) -> Self {
        self.limits.io = super::Window::new(0.0, max);
        self
    }

    /// Set operating limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Evaluate the source at a given EMF and load current.
    pub fn transfer(&self, emf: f64, output_current: f64) -> Transfer {
        let io = output_current.abs();
        // The terminal voltage collapses to zero rather than reversing.
        let magnitude = (emf.abs() - self.rs * io).max(0.0);
        let vo = magnitude.copysign(emf);
        let power_in = (emf * io).abs();
        let power_out = magnitude * io;
        Transfer {
            output_voltage: vo,
            input_current: 0.0,
            power_in,
            power_out,
            power_dissipated: power_in - power_out,
            inner: None,
        }
    }
}
