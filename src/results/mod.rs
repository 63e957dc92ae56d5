//! Simulation results, issues and post-processing.

mod safety;

pub use safety::apply_safety_checks;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CircuitError;
use crate::netlist::ProbeKind;

/// Outcome of one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulationStatus {
    Success,
    CompletedWithWarnings,
    InvalidCircuit,
    Error,
    Cancelled,
}

impl SimulationStatus {
    /// True when probe data is present and trustworthy.
    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            SimulationStatus::Success | SimulationStatus::CompletedWithWarnings
        )
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCategory {
    Topology,
    Parameter,
    Convergence,
    SingularSystem,
    ProbeFailure,
    Overcurrent,
    Overpower,
    Cancelled,
}

/// One diagnostic attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
}

impl Issue {
    pub fn new(severity: Severity, category: IssueCategory, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            element_id: None,
        }
    }

    pub fn error(category: IssueCategory, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, message)
    }

    pub fn warning(category: IssueCategory, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, message)
    }

    pub fn info(category: IssueCategory, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, category, message)
    }

    pub fn for_element(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = Some(element_id.into());
        self
    }

    /// Classify a solver or validation error.
    pub fn from_error(err: &CircuitError) -> Self {
        let category = match err {
            CircuitError::SingularMatrix => IssueCategory::SingularSystem,
            CircuitError::ConvergenceFailure { .. } | CircuitError::TimestepTooSmall { .. } => {
                IssueCategory::Convergence
            }
            CircuitError::Cancelled => IssueCategory::Cancelled,
            CircuitError::InvalidParameter { .. } | CircuitError::InvalidSimulationParam { .. } => {
                IssueCategory::Parameter
            }
            _ => IssueCategory::Topology,
        };
        let issue = Issue::error(category, err.to_string());
        match err {
            CircuitError::InvalidElement { element, .. }
            | CircuitError::InvalidParameter { element, .. }
            | CircuitError::ElementNotFound { element } => issue.for_element(element.clone()),
            _ => issue,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{:?}] {}", self.severity, self.category, self.message)?;
        if let Some(id) = &self.element_id {
            write!(f, " ({id})")?;
        }
        Ok(())
    }
}

/// Sampled probe values along a time or sweep axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// "time" for transient runs, the swept source id for sweeps.
    pub axis: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Linearly interpolated value at `x`, clamped to the ends of the series.
    pub fn value_at(&self, x: f64) -> Option<f64> {
        let last = self.x.len().checked_sub(1)?;
        if x <= self.x[0] {
            return Some(self.y[0]);
        }
        if x >= self.x[last] {
            return Some(self.y[last]);
        }
        let i = self.x.partition_point(|&t| t <= x);
        let (x0, x1) = (self.x[i - 1], self.x[i]);
        let (y0, y1) = (self.y[i - 1], self.y[i]);
        if x1 == x0 {
            return Some(y1);
        }
        Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
    }
}

/// One probe's readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub probe_id: String,
    pub kind: ProbeKind,
    pub target: String,
    /// The single operating-point value, or the last sample of a series.
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Series>,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

impl ProbeResult {
    pub fn single(probe_id: &str, kind: ProbeKind, target: &str, value: f64) -> Self {
        Self {
            probe_id: probe_id.to_string(),
            kind,
            target: target.to_string(),
            value,
            series: None,
            min: value,
            max: value,
            average: value,
        }
    }

    /// Build from a series; `None` when the series is empty.
    pub fn from_series(probe_id: &str, kind: ProbeKind, target: &str, series: Series) -> Option<Self> {
        let value = *series.y.last()?;
        let (min, max) = series
            .y
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let average = series.y.iter().sum::<f64>() / series.y.len() as f64;
        Some(Self {
            probe_id: probe_id.to_string(),
            kind,
            target: target.to_string(),
            value,
            series: Some(series),
            min,
            max,
            average,
        })
    }
}

/// Worst-case electrical stress seen by one element during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementReading {
    pub element_id: String,
    /// Largest |current| through the element's first terminal.
    pub peak_current: f64,
    /// Largest |dissipated power|.
    pub peak_power: f64,
}

impl ElementReading {
    pub fn new(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            peak_current: 0.0,
            peak_power: 0.0,
        }
    }

    pub fn record(&mut self, current: f64, power: f64) {
        self.peak_current = self.peak_current.max(current.abs());
        self.peak_power = self.peak_power.max(power.abs());
    }
}

/// Everything a run hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub status: SimulationStatus,
    pub message: String,
    pub elapsed_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub probes: Vec<ProbeResult>,
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub readings: Vec<ElementReading>,
}

impl SimulationResult {
    fn empty(status: SimulationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            elapsed_ms: 0.0,
            tag: None,
            probes: Vec::new(),
            issues: Vec::new(),
            readings: Vec::new(),
        }
    }

    /// Validation failed before any solve.
    pub fn invalid(issues: Vec<Issue>) -> Self {
        let errors = issues.iter().filter(|i| i.is_error()).count();
        let mut result = Self::empty(
            SimulationStatus::InvalidCircuit,
            format!("circuit is invalid ({errors} error(s))"),
        );
        result.issues = issues;
        result
    }

    /// A solver error, classified into an issue. Cancellation is kept distinct.
    pub fn from_error(err: &CircuitError) -> Self {
        if matches!(err, CircuitError::Cancelled) {
            return Self::cancelled();
        }
        let status = if err.is_structural() {
            SimulationStatus::InvalidCircuit
        } else {
            SimulationStatus::Error
        };
        let mut result = Self::empty(status, err.to_string());
        result.issues.push(Issue::from_error(err));
        result
    }

    pub fn cancelled() -> Self {
        let mut result = Self::empty(SimulationStatus::Cancelled, "simulation cancelled");
        result
            .issues
            .push(Issue::info(IssueCategory::Cancelled, "run cancelled at a checkpoint"));
        result
    }

    /// A finished run; status follows from the collected issues.
    pub fn completed(probes: Vec<ProbeResult>, issues: Vec<Issue>, readings: Vec<ElementReading>) -> Self {
        let mut result = Self::empty(SimulationStatus::Success, "");
        result.probes = probes;
        result.issues = issues;
        result.readings = readings;
        result.refresh_status();
        result
    }

    /// Re-derive Success/CompletedWithWarnings from the issue list.
    pub fn refresh_status(&mut self) {
        if !self.status.is_completed() {
            return;
        }
        let warnings = self.issues.iter().filter(|i| i.is_warning()).count();
        if warnings > 0 {
            self.status = SimulationStatus::CompletedWithWarnings;
            self.message = format!("completed with {warnings} warning(s)");
        } else {
            self.status = SimulationStatus::Success;
            self.message = "completed".to_string();
        }
    }

    /// Prepend issues gathered before the run, such as validation warnings.
    pub fn with_leading_issues(mut self, mut leading: Vec<Issue>) -> Self {
        leading.append(&mut self.issues);
        self.issues = leading;
        self.refresh_status();
        self
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    pub fn probe(&self, id: &str) -> Option<&ProbeResult> {
        self.probes.iter().find(|p| p.probe_id == id)
    }

    pub fn reading(&self, element_id: &str) -> Option<&ElementReading> {
        self.readings.iter().find(|r| r.element_id == element_id)
    }

    pub fn has_issue(&self, category: IssueCategory) -> bool {
        self.issues.iter().any(|i| i.category == category)
    }
}
