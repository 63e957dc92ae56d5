//! Analysis strategies and the top-level simulator.
//!
//! A [`SimulationRequest`] names one analysis. The [`Simulator`] validates
//! the netlist, builds the [`Circuit`], hands it to the matching
//! [`AnalysisStrategy`] and finally applies the safety checks:
//!
//! ```text
//! validate → build → execute (op | sweep | transient) → safety
//! ```
//!
//! Strategies never return errors. Solver failures become `Error` results,
//! bad circuits become `InvalidCircuit` and cancellation becomes `Cancelled`.

mod op;
mod probe;
mod request;
mod sweep;
mod transient;

pub use crate::cancel::CancellationToken;
pub use op::OperatingPoint;
pub use request::{
    AnalysisKind, SimulationRequest, SweepConfig, TransientConfig, DEFAULT_TRANSIENT_STEPS,
    MAX_SWEEP_POINTS,
};
pub use sweep::DcSweep;
pub use transient::{Transient, TIME_AXIS};

use tracing::{debug, info_span};

use crate::circuit::{validate_netlist, Circuit};
use crate::components::StampContext;
use crate::error::Result;
use crate::netlist::CircuitNetlist;
use crate::results::{apply_safety_checks, SimulationResult};
use crate::solver::SolverConfig;

/// One way of solving a prepared circuit.
pub trait AnalysisStrategy {
    fn name(&self) -> &'static str;

    /// Run against a freshly built circuit. Failures are folded into the result.
    fn execute(
        &self,
        circuit: &mut Circuit,
        netlist: &CircuitNetlist,
        cancel: &CancellationToken,
    ) -> SimulationResult;
}

/// Run `f` and report how long it took.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn timed<T>(f: impl FnOnce() -> T) -> (T, f64) {
    let start = std::time::Instant::now();
    let out = f();
    (out, start.elapsed().as_secs_f64() * 1e3)
}

/// `Instant` is unavailable on wasm32; runs report zero elapsed time there.
#[cfg(target_arch = "wasm32")]
pub(crate) fn timed<T>(f: impl FnOnce() -> T) -> (T, f64) {
    (f(), 0.0)
}

/// Shared tail of every strategy: fold the error path and stamp the time.
pub(crate) fn finish(outcome: Result<SimulationResult>, elapsed_ms: f64) -> SimulationResult {
    let mut result = outcome.unwrap_or_else(|e| {
        debug!(error = %e, "analysis failed");
        SimulationResult::from_error(&e)
    });
    result.elapsed_ms = elapsed_ms;
    result
}

/// Commit reactive history and operating points for an accepted solution.
pub(crate) fn accept_solution(circuit: &mut Circuit, ctx: &StampContext<'_>) {
    for device in &mut circuit.devices {
        device.as_device_mut().accept(ctx);
    }
}

/// Entry point for running simulation requests.
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    /// Used when a request does not carry its own settings.
    config: SolverConfig,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn strategy(&self, analysis: &AnalysisKind, config: SolverConfig) -> Box<dyn AnalysisStrategy> {
        match analysis {
            AnalysisKind::OperatingPoint => Box::new(OperatingPoint::new(config)),
            AnalysisKind::DcSweep(sweep) => Box::new(DcSweep::new(sweep.clone(), config)),
            AnalysisKind::Transient(tran) => Box::new(Transient::new(tran.clone(), config)),
        }
    }

    /// Run one request to completion (or cancellation).
    pub fn run(&self, request: &SimulationRequest, cancel: &CancellationToken) -> SimulationResult {
        let span = info_span!(
            "simulation",
            analysis = request.analysis.name(),
            title = %request.netlist.title
        );
        let _enter = span.enter();

        let (result, elapsed_ms) = timed(|| self.run_inner(request, cancel));
        let mut result = result.with_tag(request.tag.clone());
        result.elapsed_ms = elapsed_ms;
        debug!(status = %result.status, elapsed_ms, "simulation finished");
        result
    }

    fn run_inner(&self, request: &SimulationRequest, cancel: &CancellationToken) -> SimulationResult {
        let config = request.solver.clone().unwrap_or_else(|| self.config.clone());
        if let Err(e) = config.validate() {
            return SimulationResult::from_error(&e);
        }

        let report = validate_netlist(&request.netlist);
        if report.has_errors() {
            debug!(errors = report.errors().count(), "netlist rejected");
            return SimulationResult::invalid(report.issues);
        }

        if cancel.check().is_err() {
            return SimulationResult::cancelled();
        }

        let mut circuit = match Circuit::from_netlist(&request.netlist) {
            Ok(circuit) => circuit,
            Err(e) => return SimulationResult::from_error(&e).with_leading_issues(report.issues),
        };

        let strategy = self.strategy(&request.analysis, config);
        let mut result = strategy
            .execute(&mut circuit, &request.netlist, cancel)
            .with_leading_issues(report.issues);

        if request.safety_checks {
            apply_safety_checks(&mut result, &request.netlist);
        }
        result
    }
}

/// Run a request with default settings and no way to cancel it.
pub fn simulate(request: &SimulationRequest) -> SimulationResult {
    Simulator::new().run(request, &CancellationToken::new())
}
