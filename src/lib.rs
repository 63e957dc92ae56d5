//! # Breadboard Core
//!
//! Board graph, netlist builder and nonlinear circuit solver for a
//! circuit-building game.
//!
//! This library provides:
//! - A grid-based board graph of placed components, nets and traces
//! - Translation of a board into a flat SPICE-style netlist
//! - Modified Nodal Analysis (MNA) with Newton-Raphson for diodes, BJTs and MOSFETs
//! - Operating point, DC sweep and transient analyses with probes and safety checks
//!
//! ## Architecture
//!
//! - [`board`] - Placed components, pins, nets and traces
//! - [`catalog`] - What each placeable part is, electrically
//! - [`netlist`] - Flat element list and the board → netlist builder
//! - [`circuit`] - Node numbering and netlist validation
//! - [`components`] - Device models
//! - [`solver`] - MNA matrix assembly, LU and Newton-Raphson
//! - [`analysis`] - Analysis strategies and the top-level [`Simulator`]
//! - [`results`] - Probe results, issues and safety post-processing
//! - [`session`] - One-run-at-a-time guard for the game loop
//!
//! ## Usage
//!
//! ```
//! use breadboard_core::netlist::{CircuitNetlist, ElementType, NetlistElement, ProbeDefinition};
//! use breadboard_core::{simulate, SimulationRequest, SimulationStatus};
//!
//! let netlist = CircuitNetlist::new("divider")
//!     .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["in", "0"], 5.0))
//!     .with_element(NetlistElement::new("R1", ElementType::Resistor, ["in", "out"], 1000.0))
//!     .with_element(NetlistElement::new("R2", ElementType::Resistor, ["out", "0"], 2000.0))
//!     .with_probe(ProbeDefinition::voltage("vout", "out"));
//!
//! let result = simulate(&SimulationRequest::operating_point(netlist));
//! assert_eq!(result.status, SimulationStatus::Success);
//! assert!((result.probe("vout").unwrap().value - 3.3333).abs() < 0.01);
//! ```
//!
//! ### Native CLI
//!
//! ```bash
//! breadboard request.json --pretty
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { simulate_json } from 'breadboard_core';
//!
//! const result = JSON.parse(simulate_json(JSON.stringify(request)));
//! ```

pub mod analysis;
pub mod board;
pub mod cancel;
pub mod catalog;
pub mod circuit;
pub mod components;
pub mod error;
pub mod netlist;
pub mod results;
pub mod session;
pub mod solver;

// Re-export main types for convenience
pub use analysis::{
    simulate, AnalysisKind, CancellationToken, SimulationRequest, Simulator, SweepConfig,
    TransientConfig,
};
pub use board::BoardState;
pub use error::{CircuitError, Result};
pub use netlist::{CircuitNetlist, NetlistBuilder};
pub use results::{SimulationResult, SimulationStatus};
pub use session::SimulationSession;
pub use solver::SolverConfig;

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmSimulator;

/// Thermal voltage at room temperature (approximately 26mV)
pub const THERMAL_VOLTAGE: f64 = 0.0258;
