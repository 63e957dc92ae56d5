//! Newton-Raphson and time-step control settings.

use serde::{Deserialize, Serialize};

use crate::error::{CircuitError, Result};

/// Relative tolerance on every unknown.
pub const DEFAULT_RELTOL: f64 = 1e-3;

/// Absolute tolerance on node voltages (V).
pub const DEFAULT_VNTOL: f64 = 1e-6;

/// Absolute tolerance on branch currents (A).
pub const DEFAULT_ABSTOL: f64 = 1e-12;

/// Minimum conductance across junctions and open capacitors.
pub const DEFAULT_GMIN: f64 = 1e-12;

/// Maximum Newton-Raphson iterations for a DC solution.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Maximum Newton-Raphson iterations per transient step.
pub const DEFAULT_TRANSIENT_MAX_ITERATIONS: usize = 50;

/// Solver settings shared by every analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub max_iterations: usize,
    pub transient_max_iterations: usize,
    pub reltol: f64,
    pub vntol: f64,
    pub abstol: f64,
    pub gmin: f64,
    /// Retry a failed nonlinear DC solve by stepping an extra shunt down to `gmin`.
    pub gmin_stepping: bool,
    /// How many times a transient step may be halved before giving up.
    pub max_step_halvings: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            transient_max_iterations: DEFAULT_TRANSIENT_MAX_ITERATIONS,
            reltol: DEFAULT_RELTOL,
            vntol: DEFAULT_VNTOL,
            abstol: DEFAULT_ABSTOL,
            gmin: DEFAULT_GMIN,
            gmin_stepping: true,
            max_step_halvings: 10,
        }
    }
}

impl SolverConfig {
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_transient_max_iterations(mut self, n: usize) -> Self {
        self.transient_max_iterations = n;
        self
    }

    pub fn with_reltol(mut self, reltol: f64) -> Self {
        self.reltol = reltol;
        self
    }

    pub fn with_gmin(mut self, gmin: f64) -> Self {
        self.gmin = gmin;
        self
    }

    pub fn with_gmin_stepping(mut self, enabled: bool) -> Self {
        self.gmin_stepping = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 || self.transient_max_iterations == 0 {
            return Err(CircuitError::invalid_param("iteration limits must be at least 1"));
        }
        for (name, value) in [
            ("reltol", self.reltol),
            ("vntol", self.vntol),
            ("abstol", self.abstol),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(CircuitError::invalid_param(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(self.gmin > 0.0 && self.gmin.is_finite()) {
            return Err(CircuitError::invalid_param(format!(
                "gmin must be positive, got {}",
                self.gmin
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SolverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SolverConfig = serde_json::from_str(r#"{"reltol": 1e-4}"#).unwrap();
        assert_eq!(config.reltol, 1e-4);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(SolverConfig::default().with_reltol(0.0).validate().is_err());
        assert!(SolverConfig::default().with_max_iterations(0).validate().is_err());
        assert!(SolverConfig::default().with_gmin(-1.0).validate().is_err());
        assert!(SolverConfig::default().with_gmin(0.0).validate().is_err());
        assert!(SolverConfig::default().with_gmin(1e-15).validate().is_ok());
    }
}
