//! Element models for power budget analysis.
//!
//! This module provides the element taxonomy of a power-distribution tree:
//! - Sources: fixed EMF with optional series resistance
//! - Converters: switching converters and linear regulators
//! - Losses: resistive paths, diodes, connectors
//! - Loads: constant current, constant power, resistive or custom demand
//! - Subsystems: a nested topology collapsed into one terminal element
//!
//! Every element exposes the same transfer contract: given the input rail
//! voltage and the current demanded at its output, it returns its output
//! voltage, the current it draws from its parent and the power it dissipates.

mod converter;
mod limits;
mod load;
mod loss;
mod source;
mod subsystem;

pub use converter::{Converter, CurveFn, Efficiency, LinearRegulator, OutputVoltage};
pub use limits::{Limits, Window, LIMIT_MAX_DEFAULT};
pub use load::{DemandFn, Load, LoadDemand};
pub use loss::{DropFn, Loss, VoltageDrop};
pub use source::Source;
pub use subsystem::Subsystem;

pub use crate::diagnostics::Quantity;

use std::fmt;

use crate::diagnostics::Flag;
use crate::error::{BudgetError, Result};
use crate::solver::{Solution, SolverConfig};

/// Reject NaN and infinite element parameters.
fn finite(element: &str, param: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BudgetError::invalid_parameter(
            element,
            param,
            format!("must be finite, got {value}"),
        ))
    }
}

/// Element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Source,
    Converter,
    Loss,
    Load,
    Subsystem,
}

impl ElementKind {
    /// Whether elements of this kind may feed downstream elements.
    pub fn accepts_children(&self) -> bool {
        !matches!(self, ElementKind::Load | ElementKind::Subsystem)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementKind::Source => "SOURCE",
            ElementKind::Converter => "CONVERTER",
            ElementKind::Loss => "LOSS",
            ElementKind::Load => "LOAD",
            ElementKind::Subsystem => "SUBSYSTEM",
        };
        f.write_str(s)
    }
}

/// Result of evaluating an element at one operating point.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    /// Voltage presented to children
    pub output_voltage: f64,
    /// Current drawn from the parent rail
    pub input_current: f64,
    /// Power entering the element
    pub power_in: f64,
    /// Power leaving the element (for loads: power consumed usefully)
    pub power_out: f64,
    /// Power turned into heat inside the element
    pub power_dissipated: f64,
    /// Inner solution when the element is a subsystem
    pub inner: Option<Box<Solution>>,
}

impl Transfer {
    /// An unpowered element: no voltage, no current, no power.
    pub fn idle() -> Self {
        Self {
            output_voltage: 0.0,
            input_current: 0.0,
            power_in: 0.0,
            power_out: 0.0,
            power_dissipated: 0.0,
            inner: None,
        }
    }

    /// Build a transfer from terminal values; dissipation is the power balance.
    pub(crate) fn from_terminals(vi: f64, vo: f64, ii: f64, io: f64) -> Self {
        let power_in = (vi * ii).abs();
        let power_out = (vo * io).abs();
        Self {
            output_voltage: vo,
            input_current: ii,
            power_in,
            power_out,
            power_dissipated: power_in - power_out,
            inner: None,
        }
    }

    /// Output over input power.
    ///
    /// An element that takes in no power reports 1.0, not 0.0, so an idle
    /// branch leaves path efficiency products unchanged.
    pub fn efficiency(&self) -> f64 {
        if self.power_in > 0.0 {
            self.power_out / self.power_in
        } else {
            1.0
        }
    }
}

/// A node of the power-distribution tree.
#[derive(Debug, Clone)]
pub enum Element {
    Source(Source),
    Converter(Converter),
    LinearRegulator(LinearRegulator),
    Loss(Loss),
    Load(Load),
    Subsystem(Subsystem),
}

impl Element {
    /// Element name (unique within a graph).
    pub fn name(&self) -> &str {
        match self {
            Element::Source(e) => &e.name,
            Element::Converter(e) => &e.name,
            Element::LinearRegulator(e) => &e.name,
            Element::Loss(e) => &e.name,
            Element::Load(e) => &e.name,
            Element::Subsystem(e) => &e.name,
        }
    }

    /// Element kind.
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Source(_) => ElementKind::Source,
            Element::Converter(_) | Element::LinearRegulator(_) => ElementKind::Converter,
            Element::Loss(_) => ElementKind::Loss,
            Element::Load(_) => ElementKind::Load,
            Element::Subsystem(_) => ElementKind::Subsystem,
        }
    }

    /// Operating limits.
    pub fn limits(&self) -> &Limits {
        match self {
            Element::Source(e) => &e.limits,
            Element::Converter(e) => &e.limits,
            Element::LinearRegulator(e) => &e.limits,
            Element::Loss(e) => &e.limits,
            Element::Load(e) => &e.limits,
            Element::Subsystem(e) => &e.limits,
        }
    }

    /// Whether this element may feed downstream elements.
    pub fn accepts_children(&self) -> bool {
        self.kind().accepts_children()
    }

    /// Whether the current this element draws depends on its input voltage.
    ///
    /// Such elements couple downstream demand to upstream voltage and need
    /// fixed-point iteration.
    pub fn is_voltage_dependent(&self) -> bool {
        match self {
            Element::Source(_) | Element::LinearRegulator(_) => false,
            Element::Converter(_) | Element::Subsystem(_) => true,
            Element::Loss(e) => e.drop.is_voltage_dependent(),
            Element::Load(e) => e.demand.is_voltage_dependent(),
        }
    }

    /// EMF of a source; `None` for every other element.
    pub fn supply_voltage(&self) -> Option<f64> {
        match self {
            Element::Source(e) => Some(e.voltage),
            _ => None,
        }
    }

    /// Evaluate the element at an input voltage and output current demand.
    ///
    /// For sources the input voltage is the EMF.
    pub fn transfer(
        &self,
        input_voltage: f64,
        output_current: f64,
        config: &SolverConfig,
    ) -> Result<Transfer> {
        let phase = config.phase.as_deref();
        match self {
            Element::Source(e) => Ok(e.transfer(input_voltage, output_current)),
            Element::Converter(e) => e.transfer(input_voltage, output_current, phase),
            Element::LinearRegulator(e) => Ok(e.transfer(input_voltage, output_current, phase)),
            Element::Loss(e) => Ok(e.transfer(input_voltage, output_current)),
            Element::Load(e) => Ok(e.transfer(input_voltage, phase)),
            Element::Subsystem(e) => e.transfer(input_voltage, config),
        }
    }

    /// Quantities checked against limits for this kind.
    pub fn monitored(&self) -> &'static [Quantity] {
        use Quantity::*;
        match self.kind() {
            ElementKind::Source => &[OutputVoltage, OutputCurrent],
            ElementKind::Load | ElementKind::Subsystem => &[InputVoltage, InputCurrent],
            ElementKind::Converter | ElementKind::Loss => {
                &[InputVoltage, OutputVoltage, InputCurrent, OutputCurrent]
            }
        }
    }

    /// Check a resolved operating point against the element limits.
    ///
    /// Loads not drawing in the selected phase are not checked.
    pub fn check_limits(
        &self,
        vi: f64,
        vo: f64,
        ii: f64,
        io: f64,
        phase: Option<&str>,
    ) -> Vec<Flag> {
        if let Element::Load(load) = self {
            if !load.is_active(phase) {
                return Vec::new();
            }
        }
        let values: Vec<(Quantity, f64)> = self
            .monitored()
            .iter()
            .map(|&q| {
                let value = match q {
                    Quantity::InputVoltage => vi,
                    Quantity::OutputVoltage => vo,
                    Quantity::InputCurrent => ii,
                    Quantity::OutputCurrent => io,
                };
                (q, value)
            })
            .collect();
        self.limits().check(&values)
    }

    /// Phase names this element (or anything nested in it) refers to.
    pub fn phases(&self) -> Vec<&str> {
        match self {
            Element::Source(_) | Element::Loss(_) => Vec::new(),
            Element::Converter(e) => e.active_phases.iter().map(String::as_str).collect(),
            Element::LinearRegulator(e) => e.active_phases.iter().map(String::as_str).collect(),
            Element::Load(e) => e.phase_demand.keys().map(String::as_str).collect(),
            Element::Subsystem(e) => e.graph().phases(),
        }
    }
}

impl From<Source> for Element {
    fn from(e: Source) -> Self {
        Element::Source(e)
    }
}

impl From<Converter> for Element {
    fn from(e: Converter) -> Self {
        Element::Converter(e)
    }
}

impl From<LinearRegulator> for Element {
    fn from(e: LinearRegulator) -> Self {
        Element::LinearRegulator(e)
    }
}

impl From<Loss> for Element {
    fn from(e: Loss) -> Self {
        Element::Loss(e)
    }
}

impl From<Load> for Element {
    fn from(e: Load) -> Self {
        Element::Load(e)
    }
}

impl From<Subsystem> for Element {
    fn from(e: Subsystem) -> Self {
        Element::Subsystem(e)
    }
}

/// Whether an element with the given phase list is active in `phase`.
///
/// An empty list or no selected phase means always active.
pub(crate) fn phase_active(active_phases: &[String], phase: Option<&str>) -> bool {
    match phase {
        None => true,
        Some(_) if active_phases.is_empty() => true,
        Some(p) => active_phases.iter().any(|a| a == p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_children_rules() {
        assert!(ElementKind::Source.accepts_children());
        assert!(ElementKind::Converter.accepts_children());
        assert!(ElementKind::Loss.accepts_children());
        assert!(!ElementKind::Load.accepts_children());
        assert!(!ElementKind::Subsystem.accepts_children());
    }

    #[test]
    fn test_linear_regulator_is_converter_kind() {
        let e: Element = LinearRegulator::new("LDO", 3.3, 0.3).unwrap().into();
        assert_eq!(e.kind(), ElementKind::Converter);
        assert!(!e.is_voltage_dependent());
    }

    #[test]
    fn test_monitored_quantities_per_kind() {
        let src: Element = Source::new("Battery", 3.7).unwrap().into();
        assert_eq!(
            src.monitored(),
            &[Quantity::OutputVoltage, Quantity::OutputCurrent]
        );
        let load: Element = Load::current("MCU", 0.01).unwrap().into();
        assert_eq!(load.monitored().len(), 2);
    }

    #[test]
    fn test_idle_load_skips_limit_checks() {
        let load: Element = Load::current("Radio", 0.2)
            .unwrap()
            .with_phase_demand("tx", 0.2)
            .unwrap()
            .with_limits(Limits::new().with_vi(3.0, 3.6))
            .into();
        assert!(load.check_limits(1.0, 0.0, 0.0, 0.0, Some("sleep")).is_empty());
        assert_eq!(load.check_limits(1.0, 0.0, 0.2, 0.0, Some("tx")).len(), 1);
    }

    #[test]
    fn test_phase_active() {
        let phases = vec!["active".to_string()];
        assert!(phase_active(&phases, None));
        assert!(phase_active(&phases, Some("active")));
        assert!(!phase_active(&phases, Some("sleep")));
        assert!(phase_active(&[], Some("sleep")));
    }
}
