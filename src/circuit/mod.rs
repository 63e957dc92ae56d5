//! Circuit representation and validation.
//!
//! This module turns a [`CircuitNetlist`](crate::netlist::CircuitNetlist)
//! into the solver's view: numbered nodes, allocated branch unknowns and
//! one device model per element.

mod graph;
mod types;
mod validate;

pub use graph::Circuit;
pub use types::*;
pub use validate::{validate_netlist, ValidationReport};
