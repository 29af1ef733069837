//! Error types for the power budget solver.
//!
//! This module provides a unified error type [`BudgetError`] that covers
//! topology construction, structural validation, element parameters and
//! strict-mode promotion of solve diagnostics.

use std::fmt;

use thiserror::Error;

use crate::elements::{ElementKind, Quantity};

/// Result type alias using [`BudgetError`].
pub type Result<T> = std::result::Result<T, BudgetError>;

/// The structural rule a topology breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFault {
    /// A non-source element fed by more than one parent rail.
    MultipleParents,
    /// The element is part of a directed cycle.
    Cycle,
    /// A non-source element with no parent, unreachable from any source.
    Orphan,
    /// A source with an upstream edge.
    SourceHasParent,
    /// A load or subsystem with downstream elements.
    TerminalHasChildren,
    /// A subsystem graph that does not have exactly one source.
    SubsystemRoot,
}

impl fmt::Display for StructureFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StructureFault::MultipleParents => "element has more than one parent",
            StructureFault::Cycle => "element is part of a cycle",
            StructureFault::Orphan => "element is not reachable from a source",
            StructureFault::SourceHasParent => "source has a parent",
            StructureFault::TerminalHasChildren => "terminal element has children",
            StructureFault::SubsystemRoot => "subsystem must contain exactly one source",
        };
        f.write_str(text)
    }
}

/// Unified error type for all power budget operations.
#[derive(Error, Debug)]
pub enum BudgetError {
    // ============ Topology Errors ============
    /// Structurally invalid topology; no solve is attempted.
    #[error("Structure error at '{node}': {fault}")]
    Structure { node: String, fault: StructureFault },

    /// Element name not present in the graph
    #[error("Element '{name}' not found")]
    UnknownElement { name: String },

    /// Element name already used in the graph
    #[error("Element name '{name}' is already used")]
    DuplicateName { name: String },

    /// Parent does not accept a child of this kind
    #[error("Element '{parent}' does not accept a child of kind {child_kind}")]
    InvalidChild {
        parent: String,
        child_kind: ElementKind,
    },

    // ============ Parameter Errors ============
    /// Invalid element parameter value
    #[error("Invalid parameter '{param}' for element '{element}': {message}")]
    InvalidParameter {
        element: String,
        param: String,
        message: String,
    },

    /// Invalid solver configuration
    #[error("Invalid solver configuration: {message}")]
    InvalidConfig { message: String },

    /// Phase name not known by any element
    #[error("Phase '{phase}' is not used by any element")]
    UnknownPhase { phase: String },

    /// Invalid phase schedule
    #[error("Invalid phase schedule: {message}")]
    InvalidPhases { message: String },

    // ============ Strict-mode Errors ============
    /// A current or voltage limit was breached and strict mode is on
    #[error("Limit exceeded at '{node}': {quantity} = {value:.6e} outside limit {limit:.6e}")]
    LimitExceeded {
        node: String,
        quantity: Quantity,
        value: f64,
        limit: f64,
    },

    /// A voltage fell below its floor and strict mode is on
    #[error("Undervoltage at '{node}': {quantity} = {value:.6e} below floor {floor:.6e}")]
    Undervoltage {
        node: String,
        quantity: Quantity,
        value: f64,
        floor: f64,
    },
}

impl BudgetError {
    /// Create a structure error
    pub fn structure(node: impl Into<String>, fault: StructureFault) -> Self {
        Self::Structure {
            node: node.into(),
            fault,
        }
    }

    /// Create an unknown element error
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownElement { name: name.into() }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        element: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            element: element.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
