//! Simulation requests: which analysis to run, on what, with which settings.

use serde::{Deserialize, Serialize};

use crate::error::{CircuitError, Result};
use crate::netlist::CircuitNetlist;
use crate::solver::SolverConfig;

/// Number of steps a transient run takes when `max_step` is not given.
pub const DEFAULT_TRANSIENT_STEPS: f64 = 100.0;

/// Longest DC sweep accepted, in points.
pub const MAX_SWEEP_POINTS: usize = 100_000;

/// DC sweep of one independent source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Element id of the voltage or current source to drive.
    pub source: String,
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl SweepConfig {
    pub fn new(source: impl Into<String>, start: f64, stop: f64, step: f64) -> Self {
        Self {
            source: source.into(),
            start,
            stop,
            step,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(CircuitError::invalid_param("sweep source is empty"));
        }
        if ![self.start, self.stop, self.step].iter().all(|v| v.is_finite()) {
            return Err(CircuitError::invalid_param("sweep bounds must be finite"));
        }
        if self.start != self.stop {
            if self.step == 0.0 {
                return Err(CircuitError::invalid_param("sweep step is zero"));
            }
            if (self.stop - self.start).signum() != self.step.signum() {
                return Err(CircuitError::invalid_param(format!(
                    "sweep step {} never reaches {} from {}",
                    self.step, self.stop, self.start
                )));
            }
            let steps = ((self.stop - self.start) / self.step).floor();
            if steps >= MAX_SWEEP_POINTS as f64 {
                return Err(CircuitError::invalid_param(format!(
                    "sweep from {} to {} by {} exceeds {} points",
                    self.start, self.stop, self.step, MAX_SWEEP_POINTS
                )));
            }
        }
        Ok(())
    }

    /// Sweep values from `start` to `stop` inclusive.
    ///
    /// Capped at [`MAX_SWEEP_POINTS`]; [`validate`](Self::validate) rejects
    /// anything longer.
    ///
    /// The last point lands on `stop` when the span is a whole number of
    /// steps (within rounding); otherwise the sweep ends short of it.
    pub fn points(&self) -> Vec<f64> {
        if self.start == self.stop || self.step == 0.0 {
            return vec![self.start];
        }
        let span = (self.stop - self.start) / self.step;
        let steps = (span + 1e-9).floor().min(MAX_SWEEP_POINTS as f64 - 1.0);
        let count = (steps as usize).checked_add(1).unwrap_or(MAX_SWEEP_POINTS);
        (0..count)
            .map(|i| {
                let v = self.start + i as f64 * self.step;
                if (v - self.stop).abs() <= self.step.abs() * 1e-9 {
                    self.stop
                } else {
                    v
                }
            })
            .collect()
    }
}

/// Time-domain run from 0 to `stop_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransientConfig {
    pub stop_time: f64,
    /// Largest step; `stop_time / 100` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_step: Option<f64>,
    /// Start from capacitors at 0 V and inductors at 0 A instead of the
    /// DC operating point.
    #[serde(default)]
    pub use_initial_conditions: bool,
}

impl TransientConfig {
    pub fn new(stop_time: f64) -> Self {
        Self {
            stop_time,
            max_step: None,
            use_initial_conditions: false,
        }
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = Some(max_step);
        self
    }

    pub fn with_initial_conditions(mut self) -> Self {
        self.use_initial_conditions = true;
        self
    }

    pub fn step(&self) -> f64 {
        self.max_step
            .unwrap_or(self.stop_time / DEFAULT_TRANSIENT_STEPS)
            .min(self.stop_time)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.stop_time > 0.0 && self.stop_time.is_finite()) {
            return Err(CircuitError::invalid_param(format!(
                "stop time must be positive, got {}",
                self.stop_time
            )));
        }
        if let Some(step) = self.max_step {
            if !(step > 0.0 && step.is_finite()) {
                return Err(CircuitError::invalid_param(format!(
                    "max step must be positive, got {step}"
                )));
            }
        }
        Ok(())
    }
}

/// The analysis a request asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisKind {
    OperatingPoint,
    DcSweep(SweepConfig),
    Transient(TransientConfig),
}

impl AnalysisKind {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisKind::OperatingPoint => "operating_point",
            AnalysisKind::DcSweep(_) => "dc_sweep",
            AnalysisKind::Transient(_) => "transient",
        }
    }
}

fn default_true() -> bool {
    true
}

/// Solver input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub analysis: AnalysisKind,
    pub netlist: CircuitNetlist,
    #[serde(default = "default_true")]
    pub safety_checks: bool,
    /// Opaque caller tag echoed back on the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<SolverConfig>,
}

impl SimulationRequest {
    pub fn new(analysis: AnalysisKind, netlist: CircuitNetlist) -> Self {
        Self {
            analysis,
            netlist,
            safety_checks: true,
            tag: None,
            solver: None,
        }
    }

    pub fn operating_point(netlist: CircuitNetlist) -> Self {
        Self::new(AnalysisKind::OperatingPoint, netlist)
    }

    pub fn dc_sweep(netlist: CircuitNetlist, sweep: SweepConfig) -> Self {
        Self::new(AnalysisKind::DcSweep(sweep), netlist)
    }

    pub fn transient(netlist: CircuitNetlist, transient: TransientConfig) -> Self {
        Self::new(AnalysisKind::Transient(transient), netlist)
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_safety_checks(mut self, enabled: bool) -> Self {
        self.safety_checks = enabled;
        self
    }

    pub fn with_solver(mut self, config: SolverConfig) -> Self {
        self.solver = Some(config);
        self
    }

    /// Solver settings, falling back to defaults.
    pub fn solver_config(&self) -> SolverConfig {
        self.solver.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_sweep_points_inclusive() {
        let sweep = SweepConfig::new("V1", 0.0, 1.0, 0.1);
        let points = sweep.points();
        assert_eq!(points.len(), 11);
        assert_eq!(points[0], 0.0);
        assert_eq!(*points.last().unwrap(), 1.0);

        let down = SweepConfig::new("V1", 5.0, 0.0, -2.5).points();
        assert_eq!(down, vec![5.0, 2.5, 0.0]);

        assert_eq!(SweepConfig::new("V1", 3.0, 3.0, 0.0).points(), vec![3.0]);
    }

    #[rstest]
    #[case(0.0, 1.0, 0.0)]
    #[case(0.0, 1.0, -0.1)]
    #[case(1.0, 0.0, 0.1)]
    #[case(0.0, f64::INFINITY, 0.1)]
    fn test_bad_sweeps_rejected(#[case] start: f64, #[case] stop: f64, #[case] step: f64) {
        assert!(SweepConfig::new("V1", start, stop, step).validate().is_err());
    }

    #[test]
    fn test_oversized_sweep_rejected() {
        let huge = SweepConfig::new("V1", 0.0, 1e30, 1.0);
        assert!(matches!(
            huge.validate(),
            Err(CircuitError::InvalidSimulationParam { .. })
        ));
        assert_eq!(huge.points().len(), MAX_SWEEP_POINTS);

        let longest = SweepConfig::new("V1", 0.0, (MAX_SWEEP_POINTS - 1) as f64, 1.0);
        assert!(longest.validate().is_ok());
        assert_eq!(longest.points().len(), MAX_SWEEP_POINTS);
        assert!(SweepConfig::new("V1", 0.0, MAX_SWEEP_POINTS as f64, 1.0).validate().is_err());
    }

    #[test]
    fn test_transient_default_step() {
        let t = TransientConfig::new(5e-3);
        assert!((t.step() - 5e-5).abs() < 1e-18);
        assert_eq!(t.clone().with_max_step(1.0).step(), 5e-3);
        assert!(TransientConfig::new(0.0).validate().is_err());
        assert!(t.with_max_step(-1.0).validate().is_err());
    }

    #[test]
    fn test_request_json() {
        let json = r#"{
            "analysis": {"type": "dc_sweep", "source": "V1", "start": 0, "stop": 5, "step": 1},
            "netlist": {"title": "t", "elements": []},
            "tag": "run-7"
        }"#;
        let request: SimulationRequest = serde_json::from_str(json).unwrap();
        assert!(request.safety_checks);
        assert_eq!(request.tag.as_deref(), Some("run-7"));
        assert_eq!(request.analysis.name(), "dc_sweep");
        assert_eq!(request.netlist.ground_node, "0");
    }
}
