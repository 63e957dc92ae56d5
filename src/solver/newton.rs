//! Newton-Raphson iteration for nonlinear components.

use tracing::{debug, info};

use super::config::SolverConfig;
use super::mna::MnaMatrix;
use crate::cancel::CancellationToken;
use crate::circuit::{Circuit, MnaLayout};
use crate::components::{AnalysisMode, StampContext};
use crate::error::{CircuitError, Result};

/// Extra node shunt the gmin ladder starts from.
const GMIN_STEP_START: f64 = 1e-2;

/// The ladder never steps below this shunt, however small `gmin` is.
const GMIN_STEP_FLOOR: f64 = 1e-15;

/// Source scale factors tried by source stepping.
const SOURCE_STEPS: usize = 10;

/// Newton-Raphson solver for nonlinear circuits.
///
/// Owns the MNA matrix so repeated solves (sweep points, time steps)
/// reuse its storage.
#[derive(Debug)]
pub struct NewtonRaphson {
    config: SolverConfig,
    matrix: MnaMatrix,
    /// Largest update in the last iteration, for error reporting
    residual: f64,
}

impl NewtonRaphson {
    pub fn new(config: SolverConfig, layout: MnaLayout) -> Self {
        Self {
            config,
            matrix: MnaMatrix::new(layout.size()),
            residual: 0.0,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve the circuit in `mode`, starting from and updating `x`.
    ///
    /// Linear circuits are solved once. Returns the number of iterations used.
    pub fn solve(
        &mut self,
        circuit: &mut Circuit,
        mode: AnalysisMode,
        x: &mut [f64],
        max_iterations: usize,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        self.solve_with_shunt(circuit, mode, x, max_iterations, 0.0, cancel)
    }

    /// DC solution with gmin and source stepping as fallbacks.
    pub fn solve_dc(
        &mut self,
        circuit: &mut Circuit,
        x: &mut [f64],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let max_iterations = self.config.max_iterations;
        let start = x.to_vec();

        let first = match self.solve(circuit, AnalysisMode::Dc, x, max_iterations, cancel) {
            Ok(n) => return Ok(n),
            Err(e @ CircuitError::Cancelled) => return Err(e),
            Err(e) if !circuit.has_nonlinear() => return Err(e),
            Err(e) => e,
        };

        if self.config.gmin_stepping {
            info!(error = %first, "direct DC solve failed, trying gmin stepping");
            x.copy_from_slice(&start);
            circuit.reset();
            match self.gmin_stepping(circuit, x, cancel) {
                Ok(n) => return Ok(n),
                Err(e @ CircuitError::Cancelled) => return Err(e),
                Err(e) => debug!(error = %e, "gmin stepping failed"),
            }

            info!("trying source stepping");
            x.copy_from_slice(&start);
            circuit.reset();
            match self.source_stepping(circuit, x, cancel) {
                Ok(n) => return Ok(n),
                Err(e @ CircuitError::Cancelled) => return Err(e),
                Err(e) => debug!(error = %e, "source stepping failed"),
            }
        }

        Err(first)
    }

    /// Walk an extra node-to-ground shunt down from `GMIN_STEP_START` to
    /// `gmin` (never below `GMIN_STEP_FLOOR`), seeding each solve with the
    /// previous one, then solve without it.
    fn gmin_stepping(
        &mut self,
        circuit: &mut Circuit,
        x: &mut [f64],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let max_iterations = self.config.max_iterations;
        let mut total = 0;
        let mut shunt = GMIN_STEP_START;
        let floor = self.config.gmin.max(GMIN_STEP_FLOOR);
        while shunt > floor {
            total += self.solve_with_shunt(circuit, AnalysisMode::Dc, x, max_iterations, shunt, cancel)?;
            debug!(shunt, "gmin step converged");
            shunt *= 0.1;
        }
        total += self.solve_with_shunt(circuit, AnalysisMode::Dc, x, max_iterations, 0.0, cancel)?;
        Ok(total)
    }

    /// Ramp every independent source up from a tenth of its value.
    fn source_stepping(
        &mut self,
        circuit: &mut Circuit,
        x: &mut [f64],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let max_iterations = self.config.max_iterations;
        let nominal: Vec<Option<f64>> = circuit.devices.iter().map(|d| d.source_value()).collect();

        let mut total = 0;
        let mut outcome = Ok(());
        for step in 1..=SOURCE_STEPS {
            let scale = step as f64 / SOURCE_STEPS as f64;
            for (device, value) in circuit.devices.iter_mut().zip(&nominal) {
                if let Some(v) = value {
                    device.set_source_value(v * scale);
                }
            }
            match self.solve_with_shunt(circuit, AnalysisMode::Dc, x, max_iterations, 0.0, cancel) {
                Ok(n) => total += n,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        for (device, value) in circuit.devices.iter_mut().zip(&nominal) {
            if let Some(v) = value {
                device.set_source_value(*v);
            }
        }
        outcome.map(|_| total)
    }

    fn solve_with_shunt(
        &mut self,
        circuit: &mut Circuit,
        mode: AnalysisMode,
        x: &mut [f64],
        max_iterations: usize,
        shunt: f64,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let layout = circuit.layout();
        if self.matrix.size != layout.size() {
            self.matrix = MnaMatrix::new(layout.size());
        }
        let nonlinear = circuit.has_nonlinear();

        for iter in 0..max_iterations {
            cancel.check()?;

            self.matrix.clear();
            let mut limited = false;
            {
                let ctx = StampContext::new(layout, x, mode, self.config.gmin);
                for device in &mut circuit.devices {
                    limited |= device.as_device_mut().stamp(&mut self.matrix, &ctx);
                }
            }
            if shunt > 0.0 {
                self.matrix.add_node_conductance(layout.node_unknowns(), shunt);
            }

            self.matrix.factor_and_solve()?;

            if self.matrix.x.iter().any(|v| !v.is_finite()) {
                return Err(CircuitError::convergence_failure(iter + 1, f64::INFINITY));
            }

            if !nonlinear {
                x.copy_from_slice(&self.matrix.x);
                return Ok(1);
            }

            let converged = !limited && self.converged(layout, x, &self.matrix.x);
            self.residual = x
                .iter()
                .zip(&self.matrix.x)
                .map(|(a, b)| (b - a).abs())
                .fold(0.0, f64::max);
            x.copy_from_slice(&self.matrix.x);

            if converged {
                return Ok(iter + 1);
            }
        }

        Err(CircuitError::convergence_failure(max_iterations, self.residual))
    }

    /// SPICE-style test: every unknown moved less than its combined tolerance.
    fn converged(&self, layout: MnaLayout, old: &[f64], new: &[f64]) -> bool {
        old.iter().zip(new).enumerate().all(|(i, (&a, &b))| {
            let abs = if layout.is_branch_row(i) {
                self.config.abstol
            } else {
                self.config.vntol
            };
            (b - a).abs() <= self.config.reltol * a.abs().max(b.abs()) + abs
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::{CircuitNetlist, ElementType, NetlistElement};
    use approx::assert_abs_diff_eq;

    fn diode_circuit() -> Circuit {
        let netlist = CircuitNetlist::new("diode")
            .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["in", "0"], 5.0))
            .with_element(NetlistElement::new("R1", ElementType::Resistor, ["in", "a"], 1e3))
            .with_element(NetlistElement::new("D1", ElementType::Diode, ["a", "0"], 0.0));
        Circuit::from_netlist(&netlist).unwrap()
    }

    #[test]
    fn test_linear_circuit_single_solve() {
        let netlist = CircuitNetlist::new("divider")
            .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["in", "0"], 10.0))
            .with_element(NetlistElement::new("R1", ElementType::Resistor, ["in", "out"], 1e3))
            .with_element(NetlistElement::new("R2", ElementType::Resistor, ["out", "0"], 1e3));
        let mut circuit = Circuit::from_netlist(&netlist).unwrap();
        let mut nr = NewtonRaphson::new(SolverConfig::default(), circuit.layout());
        let mut x = vec![0.0; circuit.matrix_size()];
        let iterations = nr.solve_dc(&mut circuit, &mut x, &CancellationToken::new()).unwrap();
        assert_eq!(iterations, 1);
        assert_abs_diff_eq!(x[1], 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_diode_forward_drop() {
        let mut circuit = diode_circuit();
        let mut nr = NewtonRaphson::new(SolverConfig::default(), circuit.layout());
        let mut x = vec![0.0; circuit.matrix_size()];
        let iterations = nr.solve_dc(&mut circuit, &mut x, &CancellationToken::new()).unwrap();
        assert!(iterations > 1);
        let v_a = x[1];
        assert!(v_a > 0.6 && v_a < 0.8, "diode drop {v_a}");
    }

    #[test]
    fn test_iteration_cap_reports_failure() {
        let mut circuit = diode_circuit();
        let config = SolverConfig::default()
            .with_max_iterations(2)
            .with_gmin_stepping(false);
        let mut nr = NewtonRaphson::new(config, circuit.layout());
        let mut x = vec![0.0; circuit.matrix_size()];
        let err = nr.solve_dc(&mut circuit, &mut x, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, CircuitError::ConvergenceFailure { iterations: 2, .. }));
    }

    #[test]
    fn test_gmin_ladder_stops_at_floor() {
        let mut circuit = diode_circuit();
        let mut nr = NewtonRaphson::new(SolverConfig::default().with_gmin(0.0), circuit.layout());
        let mut x = vec![0.0; circuit.matrix_size()];
        let total = nr.gmin_stepping(&mut circuit, &mut x, &CancellationToken::new()).unwrap();
        // Roughly fourteen short stages, not hundreds down to underflow.
        assert!(total < 300, "{total} iterations");
        assert!(x[1] > 0.6 && x[1] < 0.8);
    }

    #[test]
    fn test_cancel_before_first_iteration() {
        let mut circuit = diode_circuit();
        let mut nr = NewtonRaphson::new(SolverConfig::default(), circuit.layout());
        let mut x = vec![0.0; circuit.matrix_size()];
        let token = CancellationToken::new();
        token.cancel();
        let err = nr.solve_dc(&mut circuit, &mut x, &token).unwrap_err();
        assert!(matches!(err, CircuitError::Cancelled));
    }
}
