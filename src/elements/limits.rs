//! Operating limits and limit checks.

use crate::diagnostics::{Flag, Quantity};

/// Default upper bound for every limit window.
pub const LIMIT_MAX_DEFAULT: f64 = 1.0e6;

/// An inclusive `[min, max]` window, compared on absolute values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub min: f64,
    pub max: f64,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: LIMIT_MAX_DEFAULT,
        }
    }
}

impl Window {
    /// Create a window; bounds are stored as magnitudes in ascending order.
    pub fn new(min: f64, max: f64) -> Self {
        let (a, b) = (min.abs(), max.abs());
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

/// Limit windows for the four monitored quantities of an element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Limits {
    pub vi: Window,
    pub vo: Window,
    pub ii: Window,
    pub io: Window,
}

impl Limits {
    /// Limits that never trigger (the defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the input voltage window.
    pub fn with_vi(mut self, min: f64, max: f64) -> Self {
        self.vi = Window::new(min, max);
        self
    }

    /// Set the output voltage window.
    pub fn with_vo(mut self, min: f64, max: f64) -> Self {
        self.vo = Window::new(min, max);
        self
    }

    /// Set the input current window.
    pub fn with_ii(mut self, min: f64, max: f64) -> Self {
        self.ii = Window::new(min, max);
        self
    }

    /// Set the output current window.
    pub fn with_io(mut self, min: f64, max: f64) -> Self {
        self.io = Window::new(min, max);
        self
    }

    /// Window for a quantity.
    pub fn window(&self, quantity: Quantity) -> Window {
        match quantity {
            Quantity::InputVoltage => self.vi,
            Quantity::OutputVoltage => self.vo,
            Quantity::InputCurrent => self.ii,
            Quantity::OutputCurrent => self.io,
        }
    }

    /// Check measured values against their windows.
    ///
    /// A voltage under its floor is an undervoltage; any other breach is a
    /// limit violation.
    pub fn check(&self, values: &[(Quantity, f64)]) -> Vec<Flag> {
        let mut flags = Vec::new();
        for &(quantity, value) in values {
            let window = self.window(quantity);
            let magnitude = value.abs();
            if magnitude > window.max {
                flags.push(Flag::LimitExceeded {
                    quantity,
                    value,
                    limit: window.max,
                });
            } else if magnitude < window.min {
                if quantity.is_voltage() {
                    flags.push(Flag::Undervoltage {
                        quantity,
                        value,
                        floor: window.min,
                    });
                } else {
                    flags.push(Flag::LimitExceeded {
                        quantity,
                        value,
                        limit: window.min,
                    });
                }
            }
        }
        flags
    }
}
