//! DC operating point.

use tracing::{debug, info_span};

use super::probe::Recorder;
use super::{accept_solution, finish, timed, AnalysisStrategy, CancellationToken};
use crate::circuit::Circuit;
use crate::components::{AnalysisMode, StampContext};
use crate::error::Result;
use crate::netlist::CircuitNetlist;
use crate::results::SimulationResult;
use crate::solver::{NewtonRaphson, SolverConfig};

/// Solve once with capacitors open and inductors shorted.
#[derive(Debug, Clone, Default)]
pub struct OperatingPoint {
    config: SolverConfig,
}

impl OperatingPoint {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    fn run(
        &self,
        circuit: &mut Circuit,
        netlist: &CircuitNetlist,
        cancel: &CancellationToken,
    ) -> Result<SimulationResult> {
        let layout = circuit.layout();
        let mut newton = NewtonRaphson::new(self.config.clone(), layout);
        let mut x = vec![0.0; layout.size()];

        circuit.reset();
        let iterations = newton.solve_dc(circuit, &mut x, cancel)?;
        debug!(iterations, "operating point converged");

        let ctx = StampContext::new(layout, &x, AnalysisMode::Dc, self.config.gmin);
        accept_solution(circuit, &ctx);

        let mut recorder = Recorder::new(circuit, &netlist.probes, "point");
        recorder.record(0.0, circuit, &ctx);
        let (probes, issues, readings) = recorder.finish_single();
        Ok(SimulationResult::completed(probes, issues, readings))
    }
}

impl AnalysisStrategy for OperatingPoint {
    fn name(&self) -> &'static str {
        "operating_point"
    }

    fn execute(
        &self,
        circuit: &mut Circuit,
        netlist: &CircuitNetlist,
        cancel: &CancellationToken,
    ) -> SimulationResult {
        let _span = info_span!("operating_point").entered();
        let (outcome, elapsed_ms) = timed(|| self.run(circuit, netlist, cancel));
        finish(outcome, elapsed_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Polarity;
    use crate::netlist::{ElementType, NetlistElement, ProbeDefinition};
    use crate::results::{IssueCategory, SimulationStatus};
    use approx::assert_abs_diff_eq;

    fn run(netlist: CircuitNetlist) -> SimulationResult {
        let mut circuit = Circuit::from_netlist(&netlist).unwrap();
        OperatingPoint::default().execute(&mut circuit, &netlist, &CancellationToken::new())
    }

    #[test]
    fn test_capacitor_open_inductor_short() {
        let netlist = CircuitNetlist::new("rlc")
            .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["in", "0"], 5.0))
            .with_element(NetlistElement::new("L1", ElementType::Inductor, ["in", "a"], 1e-3))
            .with_element(NetlistElement::new("R1", ElementType::Resistor, ["a", "b"], 1e3))
            .with_element(NetlistElement::new("C1", ElementType::Capacitor, ["b", "0"], 1e-6))
            .with_probe(ProbeDefinition::voltage("vb", "b"))
            .with_probe(ProbeDefinition::current("il", "L1"));
        let result = run(netlist);
        assert_eq!(result.status, SimulationStatus::Success);
        assert_abs_diff_eq!(result.probe("vb").unwrap().value, 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.probe("il").unwrap().value, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_supplying_source_current_is_negative() {
        let netlist = CircuitNetlist::new("r")
            .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["in", "0"], 5.0))
            .with_element(NetlistElement::new("R1", ElementType::Resistor, ["in", "0"], 1e3))
            .with_probe(ProbeDefinition::current("iv", "V1"))
            .with_probe(ProbeDefinition::power("pv", "V1"))
            .with_probe(ProbeDefinition::power("pr", "R1"));
        let result = run(netlist);
        assert_abs_diff_eq!(result.probe("iv").unwrap().value, -5e-3, epsilon = 1e-12);
        assert_abs_diff_eq!(result.probe("pv").unwrap().value, -25e-3, epsilon = 1e-12);
        assert_abs_diff_eq!(result.probe("pr").unwrap().value, 25e-3, epsilon = 1e-12);
    }

    #[test]
    fn test_npn_common_emitter_bias() {
        // 5 V supply, 100k base resistor, 1k collector resistor.
        let netlist = CircuitNetlist::new("ce")
            .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["vcc", "0"], 5.0))
            .with_element(NetlistElement::new("RB", ElementType::Resistor, ["vcc", "b"], 100e3))
            .with_element(NetlistElement::new("RC", ElementType::Resistor, ["vcc", "c"], 1e3))
            .with_element(
                NetlistElement::new("Q1", ElementType::Bjt, ["c", "b", "0"], 0.0)
                    .with_polarity(Polarity::N)
                    .with_param("Bf", 100.0),
            )
            .with_probe(ProbeDefinition::voltage("vb", "b"))
            .with_probe(ProbeDefinition::voltage("vc", "c"))
            .with_probe(ProbeDefinition::current("ic", "Q1"));
        let result = run(netlist);
        assert_eq!(result.status, SimulationStatus::Success, "{:?}", result.issues);
        let vb = result.probe("vb").unwrap().value;
        let ic = result.probe("ic").unwrap().value;
        assert!(vb > 0.55 && vb < 0.8, "vbe {vb}");
        // Ib ≈ (5 - 0.65) / 100k ≈ 43 µA, Ic ≈ 4.3 mA
        assert!(ic > 3.5e-3 && ic < 4.8e-3, "ic {ic}");
        let vc = result.probe("vc").unwrap().value;
        assert_abs_diff_eq!(vc, 5.0 - ic * 1e3, epsilon = 1e-6);
    }

    #[test]
    fn test_nmos_switch_on() {
        let netlist = CircuitNetlist::new("nmos")
            .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["vdd", "0"], 5.0))
            .with_element(NetlistElement::new("RD", ElementType::Resistor, ["vdd", "d"], 1e3))
            .with_element(
                NetlistElement::new("M1", ElementType::Mosfet, ["d", "vdd", "0", "0"], 0.0)
                    .with_polarity(Polarity::N)
                    .with_param("Vto", 2.0)
                    .with_param("Kp", 0.1),
            )
            .with_probe(ProbeDefinition::voltage("vd", "d"));
        let result = run(netlist);
        assert_eq!(result.status, SimulationStatus::Success, "{:?}", result.issues);
        // Deep triode: the drain sits well under a volt.
        assert!(result.probe("vd").unwrap().value < 0.1);
    }

    #[test]
    fn test_parallel_sources_are_singular() {
        let netlist = CircuitNetlist::new("float")
            .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["in", "0"], 1.0))
            .with_element(NetlistElement::new("V2", ElementType::VoltageSource, ["in", "0"], 2.0));
        let result = run(netlist);
        assert_eq!(result.status, SimulationStatus::Error);
        assert!(result.has_issue(IssueCategory::SingularSystem));
    }
}
