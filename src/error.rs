//! Error types for the breadboard core.
//!
//! This module provides a unified error type [`CircuitError`] that covers
//! all error conditions raised by board editing, netlist construction,
//! circuit validation and simulation.

use thiserror::Error;

/// Result type alias using [`CircuitError`].
pub type Result<T> = std::result::Result<T, CircuitError>;

/// Unified error type for all breadboard operations.
#[derive(Error, Debug)]
pub enum CircuitError {
    // ============ Board Graph Errors ============
    /// A component already sits at the requested grid position
    #[error("Position ({x}, {y}) is already occupied")]
    PositionOccupied { x: i32, y: i32 },

    /// Component instance not found on the board
    #[error("Component #{id} not found")]
    ComponentNotFound { id: u32 },

    /// Net not found on the board
    #[error("Net #{id} not found")]
    NetNotFound { id: u32 },

    /// Pin index not present on a component
    #[error("Component #{component} has no pin {pin}")]
    PinNotFound { component: u32, pin: usize },

    /// Two pin templates of one component share an index
    #[error("Pin index {pin} appears more than once on '{definition}'")]
    DuplicatePinIndex { definition: String, pin: usize },

    /// Net names must contain at least one visible character
    #[error("Net name must not be empty")]
    EmptyNetName,

    /// Board bookkeeping disagrees with itself
    #[error("Board inconsistency: {message}")]
    Inconsistent { message: String },

    // ============ Catalog / Netlist Errors ============
    /// Definition id missing from the component catalog
    #[error("Component definition '{definition}' not found (component #{component})")]
    DefinitionNotFound { definition: String, component: u32 },

    /// Catalog kind the netlist builder cannot express
    #[error("Unsupported component kind '{kind}' for component #{component}")]
    UnsupportedKind { kind: String, component: u32 },

    /// A device needs more pins than its definition provides
    #[error("Component #{component} needs at least {required} pins, found {found}")]
    TooFewPins {
        component: u32,
        required: usize,
        found: usize,
    },

    // ============ Circuit Validation Errors ============
    /// Netlist has nothing to simulate
    #[error("Circuit has no elements")]
    NoElements,

    /// Element references a node that was never declared
    #[error("Node '{node}' not found in circuit")]
    NodeNotFound { node: String },

    /// Element not present in the netlist
    #[error("Element '{element}' not found in circuit")]
    ElementNotFound { element: String },

    /// Invalid element definition
    #[error("Invalid element '{element}': {message}")]
    InvalidElement { element: String, message: String },

    /// Invalid parameter value
    #[error("Invalid parameter '{param}' for element '{element}': {message}")]
    InvalidParameter {
        element: String,
        param: String,
        message: String,
    },

    /// Validation found at least one blocking problem
    #[error("Invalid circuit: {message}")]
    InvalidCircuit { message: String },

    // ============ Simulation Errors ============
    /// Matrix is singular and cannot be solved
    #[error("Singular matrix - circuit may have a short circuit or floating node")]
    SingularMatrix,

    /// Newton-Raphson iteration did not converge
    #[error("Newton-Raphson did not converge after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },

    /// Transient step could not be completed even at the smallest step size
    #[error("Timestep too small at t = {time:.3e}s (step {step:.3e}s)")]
    TimestepTooSmall { time: f64, step: f64 },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    /// Run was cancelled at a checkpoint
    #[error("Simulation cancelled")]
    Cancelled,

    /// A simulation for this board is already in flight
    #[error("A simulation is already running")]
    SimulationAlreadyRunning,

    // ============ I/O Errors ============
    /// Error reading a request file
    #[error("Failed to read '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON request or result
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CircuitError {
    /// Create an invalid element error
    pub fn invalid_element(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidElement {
            element: element.into(),
            message: message.into(),
        }
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

    /// Create an invalid simulation parameter error
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, residual: f64) -> Self {
        Self::ConvergenceFailure {
            iterations,
            residual,
        }
    }

    /// True for errors that describe a bad circuit rather than a numeric failure.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::NoElements
                | Self::NodeNotFound { .. }
                | Self::ElementNotFound { .. }
                | Self::InvalidElement { .. }
                | Self::InvalidParameter { .. }
                | Self::InvalidCircuit { .. }
                | Self::DefinitionNotFound { .. }
                | Self::UnsupportedKind { .. }
                | Self::TooFewPins { .. }
                | Self::InvalidSimulationParam { .. }
        )
    }
}
