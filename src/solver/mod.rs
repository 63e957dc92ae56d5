//! Numerical core: the MNA system and the Newton-Raphson driver.
//!
//! Unknowns are ordered node voltages first (ground excluded), then one
//! branch current per voltage source and inductor:
//!
//! ```text
//! [ G  B ] [ v ]   [ i ]
//! [ C  D ] [ j ] = [ e ]
//! ```
//!
//! `G` collects conductances and linearized device slopes, `B`/`C` couple
//! branch currents into KCL rows, `D` holds inductor companion resistances,
//! `i` the equivalent current injections and `e` the branch voltages.
//!
//! Each Newton iteration re-stamps every device around the present guess,
//! factors the dense matrix and solves; see [`NewtonRaphson`].

mod config;
mod mna;
mod newton;

pub use config::{
    SolverConfig, DEFAULT_ABSTOL, DEFAULT_GMIN, DEFAULT_MAX_ITERATIONS, DEFAULT_RELTOL,
    DEFAULT_TRANSIENT_MAX_ITERATIONS, DEFAULT_VNTOL,
};
pub use mna::MnaMatrix;
pub use newton::NewtonRaphson;
