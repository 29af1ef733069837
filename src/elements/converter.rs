//! Voltage converters: switching converters and linear regulators.

use std::fmt;
use std::sync::Arc;

use super::{phase_active, Limits, Transfer};
use crate::error::{BudgetError, Result};

/// Efficiency as a pure function of (input voltage, output current).
pub type CurveFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// Converter efficiency model.
#[derive(Clone)]
pub enum Efficiency {
    /// Constant efficiency in (0, 1].
    Constant(f64),
    /// Piecewise-linear efficiency over output current, as `(current, efficiency)`
    /// points sorted by current. Clamped at both ends.
    Table(Vec<(f64, f64)>),
    /// Caller-supplied function of (input voltage, output current).
    Function(CurveFn),
}

impl fmt::Debug for Efficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Efficiency::Constant(eta) => f.debug_tuple("Constant").field(eta).finish(),
            Efficiency::Table(points) => f.debug_tuple("Table").field(points).finish(),
            Efficiency::Function(_) => f.write_str("Function(..)"),
        }
    }
}

fn valid_efficiency(eta: f64) -> bool {
    eta.is_finite() && eta > 0.0 && eta <= 1.0
}

impl Efficiency {
    /// Create an efficiency function.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        Efficiency::Function(Arc::new(f))
    }

    fn validate(&self, element: &str) -> Result<()> {
        match self {
            Efficiency::Constant(eta) => {
                if !valid_efficiency(*eta) {
                    return Err(BudgetError::invalid_parameter(
                        element,
                        "eff",
                        format!("efficiency must be in (0, 1], got {eta}"),
                    ));
                }
            }
            Efficiency::Table(points) => {
                if points.is_empty() {
                    return Err(BudgetError::invalid_parameter(
                        element,
                        "eff",
                        "efficiency table is empty",
                    ));
                }
                for (i, &(current, eta)) in points.iter().enumerate() {
                    if !valid_efficiency(eta) {
                        return Err(BudgetError::invalid_parameter(
                            element,
                            "eff",
                            format!("efficiency must be in (0, 1], got {eta} at {current} A"),
                        ));
                    }
                    if i > 0 && current <= points[i - 1].0 {
                        return Err(BudgetError::invalid_parameter(
                            element,
                            "eff",
                            "efficiency table currents must be strictly increasing",
                        ));
                    }
                }
            }
            Efficiency::Function(_) => {}
        }
        Ok(())
    }

    /// Evaluate the efficiency at an operating point.
    pub fn at(&self, input_voltage: f64, output_current: f64) -> f64 {
        match self {
            Efficiency::Constant(eta) => *eta,
            Efficiency::Table(points) => interpolate(points, output_current.abs()),
            Efficiency::Function(f) => f(input_voltage, output_current),
        }
    }
}

/// Piecewise-linear interpolation, clamped outside the table.
fn interpolate(points: &[(f64, f64)], x: f64) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 1.0,
    };
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }
    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
        }
    }
    last.1
}

/// Output voltage model of a switching converter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputVoltage {
    /// Regulated set-point.
    Fixed(f64),
    /// Unregulated fixed ratio: V_out = k * V_in.
    Ratio(f64),
}

impl OutputVoltage {
    fn at(&self, input_voltage: f64) -> f64 {
        match self {
            OutputVoltage::Fixed(v) => *v,
            OutputVoltage::Ratio(k) => k * input_voltage,
        }
    }
}

/// A switching converter (buck, boost, inverter, charge pump).
///
/// Input current follows from power balance at the operating point:
///   I_in = I_q + |V_out * I_out / (eff * V_in)|
#[derive(Debug, Clone)]
pub struct Converter {
    pub name: String,
    pub output: OutputVoltage,
    pub efficiency: Efficiency,
    /// Quiescent current drawn from the input
    pub iq: f64,
    /// Phases in which the converter runs; empty means always
    pub active_phases: Vec<String>,
    /// Input current while switched off
    pub standby_current: f64,
    pub limits: Limits,
}

impl Converter {
    /// Create a regulated converter with constant efficiency.
    pub fn new(name: impl Into<String>, vo: f64, efficiency: f64) -> Result<Self> {
        Self::with_model(name, OutputVoltage::Fixed(vo), Efficiency::Constant(efficiency))
    }

    /// Create a converter from an output model and an efficiency model.
    pub fn with_model(
        name: impl Into<String>,
        output: OutputVoltage,
        efficiency: Efficiency,
    ) -> Result<Self> {
        let name = name.into();
        efficiency.validate(&name)?;
        Ok(Self {
            name,
            output,
            efficiency,
            iq: 0.0,
            active_phases: Vec::new(),
            standby_current: 0.0,
            limits: Limits::default(),
        })
    }

    /// Set the quiescent current.
    pub fn with_quiescent(mut self, iq: f64) -> Self {
        self.iq = iq.abs();
        self
    }

    /// Restrict operation to the given phases, drawing `standby_current` otherwise.
    pub fn with_active_phases<S: Into<String>>(
        mut self,
        phases: impl IntoIterator<Item = S>,
        standby_current: f64,
    ) -> Self {
        self.active_phases = phases.into_iter().map(Into::into).collect();
        self.standby_current = standby_current.abs();
        self
    }

    /// Set operating limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Evaluate the converter.
    ///
    /// Fails if an efficiency function returns a value outside (0, 1].
    pub fn transfer(
        &self,
        input_voltage: f64,
        output_current: f64,
        phase: Option<&str>,
    ) -> Result<Transfer> {
        if input_voltage == 0.0 {
            return Ok(Transfer::idle());
        }
        if !phase_active(&self.active_phases, phase) {
            return Ok(standby(input_voltage, self.standby_current));
        }
        let vo = self.output.at(input_voltage);
        let eta = self.efficiency.at(input_voltage, output_current);
        if !valid_efficiency(eta) {
            return Err(BudgetError::invalid_parameter(
                &self.name,
                "eff",
                format!(
                    "efficiency {eta} outside (0, 1] at vi={input_voltage}, io={output_current}"
                ),
            ));
        }
        let ii = self.iq + (vo * output_current / (eta * input_voltage)).abs();
        Ok(Transfer::from_terminals(input_voltage, vo, ii, output_current))
    }
}

/// An inactive regulator: no output, standby current only.
fn standby(input_voltage: f64, standby_current: f64) -> Transfer {
    let power_in = (input_voltage * standby_current).abs();
    Transfer {
        output_voltage: 0.0,
        input_current: standby_current,
        power_in,
        power_out: 0.0,
        power_dissipated: power_in,
        inner: None,
    }
}

/// A linear (series pass) regulator.
///
/// The output follows the set-point until the input falls within `vdrop`
/// of it (dropout), after which it tracks V_in - vdrop. All current passes
/// through, plus the quiescent current.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegulator {
    pub name: String,
    /// Output set-point (negative for negative regulators)
    pub vo: f64,
    /// Dropout voltage
    pub vdrop: f64,
    /// Quiescent (ground) current
    pub iq: f64,
    /// Phases in which the regulator is enabled; empty means always
    pub active_phases: Vec<String>,
    /// Input current while disabled
    pub standby_current: f64,
    pub limits: Limits,
}

impl LinearRegulator {
    /// Create a linear regulator; the dropout must be smaller than the set-point.
    pub fn new(name: impl Into<String>, vo: f64, vdrop: f64) -> Result<Self> {
        let name = name.into();
        if vdrop.abs() >= vo.abs() {
            return Err(BudgetError::invalid_parameter(
                name,
                "vdrop",
                format!("dropout {vdrop} must be smaller than output voltage {vo}"),
            ));
        }
        Ok(Self {
            name,
            vo,
            vdrop: vdrop.abs(),
            iq: 0.0,
            active_phases: Vec::new(),
            standby_current: 0.0,
            limits: Limits::default(),
        })
    }

    /// Set the quiescent current.
    pub fn with_quiescent(mut self, iq: f64) -> Self {
        self.iq = iq.abs();
        self
    }

    /// Restrict operation to the given phases, drawing `standby_current` otherwise.
    pub fn with_active_phases<S: Into<String>>(
        mut self,
        phases: impl IntoIterator<Item = S>,
        standby_current: f64,
    ) -> Self {
        self.active_phases = phases.into_iter().map(Into::into).collect();
        self.standby_current = standby_current.abs();
        self
    }

    /// Set operating limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Evaluate the regulator.
    pub fn transfer(&self, input_voltage: f64, output_current: f64, phase: Option<&str>) -> Transfer {
        if input_voltage == 0.0 {
            return Transfer::idle();
        }
        if !phase_active(&self.active_phases, phase) {
            return standby(input_voltage, self.standby_current);
        }
        let magnitude = self
            .vo
            .abs()
            .min((input_voltage.abs() - self.vdrop).max(0.0));
        let vo = magnitude.copysign(self.vo);
        let ii = output_current.abs() + self.iq;
        Transfer::from_terminals(input_voltage, vo, ii, output_current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_converter_input_current() {
        let c = Converter::new("5V boost", 5.0, 0.8).unwrap();
        let t = c.transfer(3.0, 0.3, None).unwrap();
        assert_eq!(t.output_voltage, 5.0);
        assert_relative_eq!(t.input_current, 5.0 * 0.3 / (0.8 * 3.0), max_relative = 1e-12);
        assert_relative_eq!(t.efficiency(), 0.8, max_relative = 1e-12);
        assert_relative_eq!(t.power_dissipated, 1.5 / 0.8 - 1.5, max_relative = 1e-9);
    }

    #[test]
    fn test_converter_quiescent_current() {
        let c = Converter::new("1.8V buck", 1.8, 0.87)
            .unwrap()
            .with_quiescent(12e-6);
        let t = c.transfer(3.0, 0.0, None).unwrap();
        assert_relative_eq!(t.input_current, 12e-6, max_relative = 1e-12);
        assert_relative_eq!(t.power_dissipated, 36e-6, max_relative = 1e-9);
    }

    #[test]
    fn test_converter_rejects_bad_efficiency() {
        assert!(Converter::new("bad", 5.0, 1.01).is_err());
        assert!(Converter::new("bad", 5.0, 0.0).is_err());
        assert!(Converter::new("bad", 5.0, -0.1).is_err());
        assert!(Converter::new("ideal", 5.0, 1.0).is_ok());
    }

    #[test]
    fn test_converter_function_out_of_range() {
        let c = Converter::with_model(
            "broken",
            OutputVoltage::Fixed(3.3),
            Efficiency::function(|_, _| 1.5),
        )
        .unwrap();
        assert!(matches!(
            c.transfer(5.0, 1.0, None),
            Err(BudgetError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_ratio_converter() {
        let c = Converter::with_model(
            "charge pump",
            OutputVoltage::Ratio(-1.0),
            Efficiency::Constant(0.9),
        )
        .unwrap();
        let t = c.transfer(5.0, 0.1, None).unwrap();
        assert_eq!(t.output_voltage, -5.0);
        assert_relative_eq!(t.input_current, 0.5 / (0.9 * 5.0), max_relative = 1e-12);
    }

    #[test]
    fn test_efficiency_table_interpolates_and_clamps() {
        let eff = Efficiency::Table(vec![(0.01, 0.6), (0.1, 0.8), (1.0, 0.9)]);
        assert_relative_eq!(eff.at(5.0, 0.001), 0.6);
        assert_relative_eq!(eff.at(5.0, 0.055), 0.7, max_relative = 1e-12);
        assert_relative_eq!(eff.at(5.0, 2.0), 0.9);
        let unsorted = Efficiency::Table(vec![(0.1, 0.8), (0.1, 0.9)]);
        assert!(Converter::with_model("x", OutputVoltage::Fixed(1.0), unsorted).is_err());
    }

    #[test]
    fn test_converter_standby_phase() {
        let c = Converter::new("Buck 3.3", 3.3, 0.88)
            .unwrap()
            .with_active_phases(["active"], 5e-6);
        let t = c.transfer(5.0, 0.0, Some("sleep")).unwrap();
        assert_eq!(t.output_voltage, 0.0);
        assert_eq!(t.input_current, 5e-6);
        assert_relative_eq!(t.power_dissipated, 25e-6, max_relative = 1e-12);
        let t = c.transfer(5.0, 0.0, Some("active")).unwrap();
        assert_eq!(t.output_voltage, 3.3);
    }

    #[test]
    fn test_converter_unpowered() {
        let c = Converter::new("Buck", 3.3, 0.5).unwrap();
        assert_eq!(c.transfer(0.0, 1.0, None).unwrap(), Transfer::idle());
    }

    #[test]
    fn test_linear_regulator_regulating() {
        let ldo = LinearRegulator::new("LDO 2.5V", 2.5, 0.27)
            .unwrap()
            .with_quiescent(150e-6);
        let t = ldo.transfer(5.0, 0.01, None);
        assert_eq!(t.output_voltage, 2.5);
        assert_relative_eq!(t.input_current, 0.01 + 150e-6, max_relative = 1e-12);
        assert_relative_eq!(
            t.power_dissipated,
            (5.0 - 2.5) * 0.01 + 5.0 * 150e-6,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_linear_regulator_dropout() {
        let ldo = LinearRegulator::new("LDO", 3.3, 0.3).unwrap();
        let t = ldo.transfer(3.4, 0.1, None);
        assert_relative_eq!(t.output_voltage, 3.1, max_relative = 1e-12);
        let neg = LinearRegulator::new("LDO-", -3.3, 0.3).unwrap();
        assert_eq!(neg.transfer(-5.0, 0.1, None).output_voltage, -3.3);
    }

    #[test]
    fn test_linear_regulator_rejects_large_dropout() {
        assert!(LinearRegulator::new("LDO 2", 1.8, 2.0).is_err());
    }
}
