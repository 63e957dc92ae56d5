//! Probe resolution and sampling.

use tracing::warn;

use crate::circuit::{Circuit, NodeId};
use crate::components::StampContext;
use crate::netlist::{ProbeDefinition, ProbeKind};
use crate::results::{ElementReading, Issue, IssueCategory, ProbeResult, Series};

/// Where a probe reads its value from.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ProbeTarget {
    /// Voltage between two nodes.
    Nodes { node: NodeId, reference: NodeId },
    /// Voltage across the first two terminals of a device.
    Across { device: usize, reference: Option<NodeId> },
    Current { device: usize },
    Power { device: usize },
}

/// Probes bound to a circuit, plus whatever could not be bound.
#[derive(Debug, Clone)]
struct BoundProbes {
    bound: Vec<(ProbeDefinition, ProbeTarget)>,
    issues: Vec<Issue>,
}

fn probe_failure(probe: &ProbeDefinition, reason: &str) -> Issue {
    warn!(probe = %probe.id, target = %probe.target, reason, "probe skipped");
    Issue::warning(
        IssueCategory::ProbeFailure,
        format!("probe '{}' on '{}': {}", probe.id, probe.target, reason),
    )
}

fn bind(circuit: &Circuit, probe: &ProbeDefinition) -> Result<ProbeTarget, Issue> {
    let reference = match &probe.reference {
        Some(name) => match circuit.find_node(name) {
            Some(node) => Some(node),
            None => return Err(probe_failure(probe, "unknown reference node")),
        },
        None => None,
    };

    match probe.kind {
        ProbeKind::Voltage => {
            if let Some(node) = circuit.find_node(&probe.target) {
                return Ok(ProbeTarget::Nodes {
                    node,
                    reference: reference.unwrap_or(NodeId::GROUND),
                });
            }
            circuit
                .device_position(&probe.target)
                .map(|device| ProbeTarget::Across { device, reference })
                .ok_or_else(|| probe_failure(probe, "no such node or element"))
        }
        ProbeKind::Current => circuit
            .device_position(&probe.target)
            .map(|device| ProbeTarget::Current { device })
            .ok_or_else(|| probe_failure(probe, "no such element")),
        ProbeKind::Power => circuit
            .device_position(&probe.target)
            .map(|device| ProbeTarget::Power { device })
            .ok_or_else(|| probe_failure(probe, "no such element")),
    }
}

impl BoundProbes {
    fn new(circuit: &Circuit, probes: &[ProbeDefinition]) -> Self {
        let mut bound = Vec::with_capacity(probes.len());
        let mut issues = Vec::new();
        for probe in probes {
            match bind(circuit, probe) {
                Ok(target) => bound.push((probe.clone(), target)),
                Err(issue) => issues.push(issue),
            }
        }
        Self { bound, issues }
    }

    fn read(circuit: &Circuit, target: ProbeTarget, ctx: &StampContext<'_>) -> f64 {
        match target {
            ProbeTarget::Nodes { node, reference } => ctx.voltage_across(node, reference),
            ProbeTarget::Across { device, reference } => {
                let nodes = circuit.devices[device].as_device().nodes();
                ctx.voltage_across(nodes[0], reference.unwrap_or(nodes[1]))
            }
            ProbeTarget::Current { device } => circuit.devices[device].as_device().current(ctx),
            ProbeTarget::Power { device } => circuit.devices[device].as_device().power(ctx),
        }
    }
}

/// Collects probe samples and element stress over the accepted points of a run.
#[derive(Debug, Clone)]
pub(crate) struct Recorder {
    probes: BoundProbes,
    axis: String,
    x: Vec<f64>,
    samples: Vec<Vec<f64>>,
    readings: Vec<ElementReading>,
}

impl Recorder {
    pub fn new(circuit: &Circuit, probes: &[ProbeDefinition], axis: &str) -> Self {
        let probes = BoundProbes::new(circuit, probes);
        let samples = vec![Vec::new(); probes.bound.len()];
        let readings = circuit
            .devices
            .iter()
            .map(|d| ElementReading::new(d.id()))
            .collect();
        Self {
            probes,
            axis: axis.to_string(),
            x: Vec::new(),
            samples,
            readings,
        }
    }

    /// Sample every probe and device at one accepted solution.
    pub fn record(&mut self, x_value: f64, circuit: &Circuit, ctx: &StampContext<'_>) {
        self.x.push(x_value);
        for ((_, target), column) in self.probes.bound.iter().zip(&mut self.samples) {
            column.push(BoundProbes::read(circuit, *target, ctx));
        }
        for (device, reading) in circuit.devices.iter().zip(&mut self.readings) {
            let device = device.as_device();
            reading.record(device.current(ctx), device.power(ctx));
        }
    }

    pub fn points(&self) -> usize {
        self.x.len()
    }

    /// Results carrying only the last value of each probe.
    pub fn finish_single(self) -> (Vec<ProbeResult>, Vec<Issue>, Vec<ElementReading>) {
        let probes = self
            .probes
            .bound
            .iter()
            .zip(&self.samples)
            .filter_map(|((def, _), column)| {
                column
                    .last()
                    .map(|&v| ProbeResult::single(&def.id, def.kind, &def.target, v))
            })
            .collect();
        (probes, self.probes.issues, self.readings)
    }

    /// Results carrying the full series of each probe.
    pub fn finish_series(self) -> (Vec<ProbeResult>, Vec<Issue>, Vec<ElementReading>) {
        let Recorder {
            probes,
            axis,
            x,
            samples,
            readings,
        } = self;
        let results = probes
            .bound
            .iter()
            .zip(samples)
            .filter_map(|((def, _), y)| {
                let series = Series {
                    axis: axis.clone(),
                    x: x.clone(),
                    y,
                };
                ProbeResult::from_series(&def.id, def.kind, &def.target, series)
            })
            .collect();
        (results, probes.issues, readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::AnalysisMode;
    use crate::netlist::{CircuitNetlist, ElementType, NetlistElement};

    fn circuit() -> Circuit {
        let netlist = CircuitNetlist::new("divider")
            .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["in", "0"], 10.0))
            .with_element(NetlistElement::new("R1", ElementType::Resistor, ["in", "out"], 1e3))
            .with_element(NetlistElement::new("R2", ElementType::Resistor, ["out", "0"], 1e3));
        Circuit::from_netlist(&netlist).unwrap()
    }

    #[test]
    fn test_probe_reads() {
        let circuit = circuit();
        let probes = [
            ProbeDefinition::voltage("vout", "out"),
            ProbeDefinition::differential("vr1", "in", "out"),
            ProbeDefinition::voltage("vacross", "R2"),
            ProbeDefinition::current("i1", "R1"),
            ProbeDefinition::power("p2", "R2"),
        ];
        let mut recorder = Recorder::new(&circuit, &probes, "point");
        // in = 10, out = 5, I(V1) = -5 mA
        let x = [10.0, 5.0, -5e-3];
        let ctx = StampContext::new(circuit.layout(), &x, AnalysisMode::Dc, 1e-12);
        recorder.record(0.0, &circuit, &ctx);

        let (probes, issues, readings) = recorder.finish_single();
        assert!(issues.is_empty());
        let value = |id: &str| probes.iter().find(|p| p.probe_id == id).unwrap().value;
        assert_eq!(value("vout"), 5.0);
        assert_eq!(value("vr1"), 5.0);
        assert_eq!(value("vacross"), 5.0);
        assert!((value("i1") - 5e-3).abs() < 1e-12);
        assert!((value("p2") - 25e-3).abs() < 1e-12);

        let v1 = readings.iter().find(|r| r.element_id == "V1").unwrap();
        assert!((v1.peak_current - 5e-3).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_targets_become_warnings() {
        let circuit = circuit();
        let probes = [
            ProbeDefinition::voltage("a", "nowhere"),
            ProbeDefinition::current("b", "R9"),
            ProbeDefinition::differential("c", "out", "missing"),
            ProbeDefinition::voltage("ok", "out"),
        ];
        let recorder = Recorder::new(&circuit, &probes, "point");
        let (probes, issues, _) = recorder.finish_single();
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| i.category == IssueCategory::ProbeFailure));
        // Bound but never sampled.
        assert!(probes.is_empty());
    }
}
