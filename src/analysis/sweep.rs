//! DC sweep of one independent source.

use tracing::{debug, info_span, trace};

use super::probe::Recorder;
use super::{accept_solution, finish, timed, AnalysisStrategy, CancellationToken, SweepConfig};
use crate::circuit::Circuit;
use crate::components::{AnalysisMode, StampContext};
use crate::error::{CircuitError, Result};
use crate::netlist::CircuitNetlist;
use crate::results::SimulationResult;
use crate::solver::{NewtonRaphson, SolverConfig};

/// Steps a voltage or current source across a range and solves DC at each value.
///
/// Each point starts from the previous solution. The source keeps its
/// nominal value once the sweep is over.
#[derive(Debug, Clone)]
pub struct DcSweep {
    sweep: SweepConfig,
    config: SolverConfig,
}

impl DcSweep {
    pub fn new(sweep: SweepConfig, config: SolverConfig) -> Self {
        Self { sweep, config }
    }

    fn source(&self, circuit: &Circuit) -> Result<(usize, f64)> {
        let position = circuit.device_position(&self.sweep.source).ok_or_else(|| {
            CircuitError::ElementNotFound {
                element: self.sweep.source.clone(),
            }
        })?;
        let nominal = circuit.devices[position].source_value().ok_or_else(|| {
            CircuitError::invalid_element(&self.sweep.source, "only independent sources can be swept")
        })?;
        Ok((position, nominal))
    }

    fn run(
        &self,
        circuit: &mut Circuit,
        netlist: &CircuitNetlist,
        cancel: &CancellationToken,
    ) -> Result<SimulationResult> {
        self.sweep.validate()?;
        let (position, nominal) = self.source(circuit)?;

        let layout = circuit.layout();
        let mut newton = NewtonRaphson::new(self.config.clone(), layout);
        let mut x = vec![0.0; layout.size()];
        let mut recorder = Recorder::new(circuit, &netlist.probes, &self.sweep.source);

        circuit.reset();
        let outcome = self.sweep.points().into_iter().try_for_each(|value| {
            cancel.check()?;
            circuit.devices[position].set_source_value(value);
            let iterations = newton.solve_dc(circuit, &mut x, cancel)?;
            trace!(value, iterations, "sweep point");

            let ctx = StampContext::new(layout, &x, AnalysisMode::Dc, self.config.gmin);
            accept_solution(circuit, &ctx);
            recorder.record(value, circuit, &ctx);
            Ok::<_, CircuitError>(())
        });
        circuit.devices[position].set_source_value(nominal);
        outcome?;

        debug!(points = recorder.points(), source = %self.sweep.source, "sweep complete");
        let (probes, issues, readings) = recorder.finish_series();
        Ok(SimulationResult::completed(probes, issues, readings))
    }
}

impl AnalysisStrategy for DcSweep {
    fn name(&self) -> &'static str {
        "dc_sweep"
    }

    fn execute(
        &self,
        circuit: &mut Circuit,
        netlist: &CircuitNetlist,
        cancel: &CancellationToken,
    ) -> SimulationResult {
        let _span = info_span!("dc_sweep", source = %self.sweep.source).entered();
        let (outcome, elapsed_ms) = timed(|| self.run(circuit, netlist, cancel));
        finish(outcome, elapsed_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::{ElementType, NetlistElement, ProbeDefinition};
    use crate::results::{IssueCategory, SimulationStatus};
    use approx::assert_abs_diff_eq;

    fn divider() -> CircuitNetlist {
        CircuitNetlist::new("divider")
            .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["in", "0"], 5.0))
            .with_element(NetlistElement::new("R1", ElementType::Resistor, ["in", "out"], 1e3))
            .with_element(NetlistElement::new("R2", ElementType::Resistor, ["out", "0"], 1e3))
            .with_probe(ProbeDefinition::voltage("vout", "out"))
    }

    fn run(netlist: &CircuitNetlist, sweep: SweepConfig) -> (SimulationResult, Circuit) {
        let mut circuit = Circuit::from_netlist(netlist).unwrap();
        let result = DcSweep::new(sweep, SolverConfig::default()).execute(
            &mut circuit,
            netlist,
            &CancellationToken::new(),
        );
        (result, circuit)
    }

    #[test]
    fn test_linear_sweep() {
        let (result, circuit) = run(&divider(), SweepConfig::new("V1", 0.0, 10.0, 2.0));
        assert_eq!(result.status, SimulationStatus::Success);
        let series = result.probe("vout").unwrap().series.as_ref().unwrap();
        assert_eq!(series.axis, "V1");
        assert_eq!(series.x, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        for (v, out) in series.x.iter().zip(&series.y) {
            assert_abs_diff_eq!(*out, v / 2.0, epsilon = 1e-9);
        }
        // Last point is reported as the probe value.
        assert_abs_diff_eq!(result.probe("vout").unwrap().value, 5.0, epsilon = 1e-9);
        assert_eq!(circuit.device("V1").unwrap().source_value(), Some(5.0));
    }

    #[test]
    fn test_diode_sweep_is_monotonic() {
        let netlist = CircuitNetlist::new("diode")
            .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["in", "0"], 0.0))
            .with_element(NetlistElement::new("R1", ElementType::Resistor, ["in", "a"], 1e3))
            .with_element(NetlistElement::new("D1", ElementType::Diode, ["a", "0"], 0.0))
            .with_probe(ProbeDefinition::current("id", "D1"));
        let (result, _) = run(&netlist, SweepConfig::new("V1", -2.0, 5.0, 0.25));
        assert_eq!(result.status, SimulationStatus::Success, "{:?}", result.issues);
        let y = &result.probe("id").unwrap().series.as_ref().unwrap().y;
        assert!(y.windows(2).all(|w| w[1] >= w[0] - 1e-12));
        assert!(y[0].abs() < 1e-9);
        // 5 V through 1k minus a diode drop.
        let last = *y.last().unwrap();
        assert!(last > 4.0e-3 && last < 4.6e-3, "{last}");
    }

    #[test]
    fn test_current_source_sweep() {
        let netlist = CircuitNetlist::new("i")
            .with_element(NetlistElement::new("I1", ElementType::CurrentSource, ["0", "a"], 1e-3))
            .with_element(NetlistElement::new("R1", ElementType::Resistor, ["a", "0"], 1e3))
            .with_probe(ProbeDefinition::voltage("va", "a"));
        let (result, _) = run(&netlist, SweepConfig::new("I1", 0.0, 2e-3, 1e-3));
        let series = result.probe("va").unwrap().series.as_ref().unwrap();
        assert_abs_diff_eq!(series.y[2], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unknown_source() {
        let (result, _) = run(&divider(), SweepConfig::new("V9", 0.0, 1.0, 0.5));
        assert_eq!(result.status, SimulationStatus::InvalidCircuit);
        assert_eq!(result.issues[0].element_id.as_deref(), Some("V9"));
    }

    #[test]
    fn test_passive_element_cannot_be_swept() {
        let (result, _) = run(&divider(), SweepConfig::new("R1", 0.0, 1.0, 0.5));
        assert_eq!(result.status, SimulationStatus::InvalidCircuit);
        assert!(result.has_issue(IssueCategory::Topology));
    }

    #[test]
    fn test_cancel_mid_sweep_restores_source() {
        let netlist = divider();
        let mut circuit = Circuit::from_netlist(&netlist).unwrap();
        let token = CancellationToken::with_checkpoint_budget(3);
        let result = DcSweep::new(SweepConfig::new("V1", 0.0, 10.0, 1.0), SolverConfig::default())
            .execute(&mut circuit, &netlist, &token);
        assert_eq!(result.status, SimulationStatus::Cancelled);
        assert!(result.probes.is_empty());
        assert_eq!(circuit.device("V1").unwrap().source_value(), Some(5.0));
    }
}
