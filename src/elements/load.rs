//! Loads: the terminal consumers of a power tree.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{finite, Limits, Transfer};
use crate::error::{BudgetError, Result};

/// Load current as a pure function of input voltage.
pub type DemandFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// How a load draws current from its rail.
#[derive(Clone)]
pub enum LoadDemand {
    /// Constant current (A).
    Current(f64),
    /// Constant power (W): I = P / |V|.
    Power(f64),
    /// Resistive (Ohm): I = |V| / R.
    Resistance(f64),
    /// Caller-supplied current as a function of input voltage.
    Function(DemandFn),
}

impl fmt::Debug for LoadDemand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadDemand::Current(i) => f.debug_tuple("Current").field(i).finish(),
            LoadDemand::Power(p) => f.debug_tuple("Power").field(p).finish(),
            LoadDemand::Resistance(r) => f.debug_tuple("Resistance").field(r).finish(),
            LoadDemand::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl LoadDemand {
    /// Only constant-current loads draw independently of the rail voltage.
    pub fn is_voltage_dependent(&self) -> bool {
        !matches!(self, LoadDemand::Current(_))
    }

    /// The same demand law with a different magnitude (A, W or Ohm).
    fn with_value(&self, value: f64) -> LoadDemand {
        match self {
            LoadDemand::Current(_) | LoadDemand::Function(_) => LoadDemand::Current(value),
            LoadDemand::Power(_) => LoadDemand::Power(value),
            LoadDemand::Resistance(_) => LoadDemand::Resistance(value),
        }
    }

    fn current(&self, input_voltage: f64) -> f64 {
        let v = input_voltage.abs();
        match self {
            LoadDemand::Current(i) => i.abs(),
            LoadDemand::Power(p) => p.abs() / v,
            LoadDemand::Resistance(r) => v / r.abs(),
            LoadDemand::Function(f) => f(input_voltage).abs(),
        }
    }
}

/// A load element.
///
/// Per-phase overrides use the unit of the base demand. In a phase the load
/// does not list, constant-current and constant-power loads draw their
/// standby value and resistive loads keep their base resistance.
#[derive(Debug, Clone)]
pub struct Load {
    pub name: String,
    pub demand: LoadDemand,
    /// Demand overrides per operating phase
    pub phase_demand: BTreeMap<String, f64>,
    /// Demand in phases not listed in `phase_demand`
    pub standby: f64,
    pub limits: Limits,
}

impl Load {
    fn with_demand(name: impl Into<String>, demand: LoadDemand) -> Self {
        Self {
            name: name.into(),
            demand,
            phase_demand: BTreeMap::new(),
            standby: 0.0,
            limits: Limits::default(),
        }
    }

    /// Constant-current load.
    pub fn current(name: impl Into<String>, ii: f64) -> Result<Self> {
        let name = name.into();
        let ii = finite(&name, "ii", ii)?.abs();
        Ok(Self::with_demand(name, LoadDemand::Current(ii)))
    }

    /// Constant-power load.
    pub fn power(name: impl Into<String>, pwr: f64) -> Result<Self> {
        let name = name.into();
        let pwr = finite(&name, "pwr", pwr)?.abs();
        Ok(Self::with_demand(name, LoadDemand::Power(pwr)))
    }

    /// Resistive load; the resistance must be non-zero.
    pub fn resistance(name: impl Into<String>, rs: f64) -> Result<Self> {
        let name = name.into();
        if !(rs.abs() > 0.0 && rs.is_finite()) {
            return Err(BudgetError::invalid_parameter(
                name,
                "rs",
                "load resistance must be finite and > 0",
            ));
        }
        Ok(Self::with_demand(name, LoadDemand::Resistance(rs.abs())))
    }

    /// Load with a caller-supplied current function of input voltage.
    pub fn function<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self::with_demand(name, LoadDemand::Function(Arc::new(f)))
    }

    /// Override the demand in one phase.
    ///
    /// The value must be finite; a resistive override must also be non-zero.
    pub fn with_phase_demand(mut self, phase: impl Into<String>, value: f64) -> Result<Self> {
        let phase = phase.into();
        let value = finite(&self.name, "phase_demand", value)?.abs();
        if matches!(self.demand, LoadDemand::Resistance(_)) && value == 0.0 {
            return Err(BudgetError::invalid_parameter(
                &self.name,
                "phase_demand",
                format!("load resistance in phase '{phase}' must be > 0"),
            ));
        }
        self.phase_demand.insert(phase, value);
        Ok(self)
    }

    /// Set the demand drawn in phases without an override.
    pub fn with_standby(mut self, value: f64) -> Self {
        self.standby = value.abs();
        self
    }

    /// Set operating limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Whether the load is in its normal (non-standby) state in `phase`.
    pub fn is_active(&self, phase: Option<&str>) -> bool {
        match phase {
            Some(p) if !self.phase_demand.is_empty() => self.phase_demand.contains_key(p),
            _ => true,
        }
    }

    /// Demand law in effect for a phase.
    fn demand_in(&self, phase: Option<&str>) -> LoadDemand {
        match phase {
            Some(p) if !self.phase_demand.is_empty() => match self.phase_demand.get(p) {
                Some(&value) => self.demand.with_value(value),
                None => match self.demand {
                    LoadDemand::Resistance(_) => self.demand.clone(),
                    _ => self.demand.with_value(self.standby),
                },
            },
            _ => self.demand.clone(),
        }
    }

    /// Evaluate the load at its input voltage.
    pub fn transfer(&self, input_voltage: f64, phase: Option<&str>) -> Transfer {
        if input_voltage == 0.0 {
            return Transfer::idle();
        }
        let ii = self.demand_in(phase).current(input_voltage);
        let power_in = (input_voltage * ii).abs();
        Transfer {
            output_voltage: 0.0,
            input_current: ii,
            power_in,
            power_out: power_in,
            power_dissipated: 0.0,
            inner: None,
        }
    }
}
