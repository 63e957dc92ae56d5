//! Time-domain analysis.
//!
//! Reactive elements are replaced by their companion models at each step.
//! The first step, and any step retried after a failure, uses backward
//! Euler; every other step uses the trapezoidal rule. A step that fails to
//! converge is halved until it either succeeds or drops below
//! `max_step / 2^max_step_halvings`.

use tracing::{debug, info_span, trace};

use super::probe::Recorder;
use super::{accept_solution, finish, timed, AnalysisStrategy, CancellationToken, TransientConfig};
use crate::circuit::Circuit;
use crate::components::{AnalysisMode, Integration, StampContext};
use crate::error::{CircuitError, Result};
use crate::netlist::CircuitNetlist;
use crate::results::SimulationResult;
use crate::solver::{NewtonRaphson, SolverConfig};

/// Axis label on every transient series.
pub const TIME_AXIS: &str = "time";

#[derive(Debug, Clone)]
pub struct Transient {
    transient: TransientConfig,
    config: SolverConfig,
}

impl Transient {
    pub fn new(transient: TransientConfig, config: SolverConfig) -> Self {
        Self { transient, config }
    }

    /// Solve for the state at t = 0.
    fn initial_point(
        &self,
        newton: &mut NewtonRaphson,
        circuit: &mut Circuit,
        x: &mut [f64],
        cancel: &CancellationToken,
    ) -> Result<AnalysisMode> {
        if self.transient.use_initial_conditions {
            let mode = AnalysisMode::InitialConditions;
            newton.solve(circuit, mode, x, self.config.transient_max_iterations, cancel)?;
            Ok(mode)
        } else {
            newton.solve_dc(circuit, x, cancel)?;
            Ok(AnalysisMode::Dc)
        }
    }

    fn run(
        &self,
        circuit: &mut Circuit,
        netlist: &CircuitNetlist,
        cancel: &CancellationToken,
    ) -> Result<SimulationResult> {
        self.transient.validate()?;
        let stop = self.transient.stop_time;
        let max_step = self.transient.step();
        let min_step = max_step / 2f64.powi(self.config.max_step_halvings as i32);
        let end_slack = stop * 1e-12;

        let layout = circuit.layout();
        let gmin = self.config.gmin;
        let mut newton = NewtonRaphson::new(self.config.clone(), layout);
        let mut x = vec![0.0; layout.size()];
        let mut recorder = Recorder::new(circuit, &netlist.probes, TIME_AXIS);

        circuit.reset();
        let mode = self.initial_point(&mut newton, circuit, &mut x, cancel)?;
        let ctx = StampContext::new(layout, &x, mode, gmin);
        accept_solution(circuit, &ctx);
        recorder.record(0.0, circuit, &ctx);

        let mut time = 0.0;
        let mut step = max_step;
        let mut backward_euler = true;
        let mut rejected = 0usize;
        let mut trial = x.clone();

        while time < stop - end_slack {
            cancel.check()?;
            let dt = step.min(stop - time);
            let method = if backward_euler {
                Integration::BackwardEuler
            } else {
                Integration::Trapezoidal
            };
            let mode = AnalysisMode::Transient { dt, method };

            trial.copy_from_slice(&x);
            match newton.solve(circuit, mode, &mut trial, self.config.transient_max_iterations, cancel) {
                Ok(iterations) => {
                    x.copy_from_slice(&trial);
                    time += dt;
                    let ctx = StampContext::new(layout, &x, mode, gmin);
                    accept_solution(circuit, &ctx);
                    recorder.record(time, circuit, &ctx);
                    trace!(time, dt, iterations, ?method, "step accepted");

                    backward_euler = false;
                    step = (step * 2.0).min(max_step);
                }
                Err(CircuitError::ConvergenceFailure { .. } | CircuitError::SingularMatrix) => {
                    rejected += 1;
                    step = dt / 2.0;
                    backward_euler = true;
                    debug!(time, step, "step rejected, halving");
                    if step < min_step {
                        return Err(CircuitError::TimestepTooSmall { time, step });
                    }
                }
                Err(e) => return Err(e),
            }
        }

        debug!(points = recorder.points(), rejected, "transient complete");
        let (probes, issues, readings) = recorder.finish_series();
        Ok(SimulationResult::completed(probes, issues, readings))
    }
}

impl AnalysisStrategy for Transient {
    fn name(&self) -> &'static str {
        "transient"
    }

    fn execute(
        &self,
        circuit: &mut Circuit,
        netlist: &CircuitNetlist,
        cancel: &CancellationToken,
    ) -> SimulationResult {
        let _span = info_span!("transient", stop_time = self.transient.stop_time).entered();
        let (outcome, elapsed_ms) = timed(|| self.run(circuit, netlist, cancel));
        finish(outcome, elapsed_ms)
    }
}
