//! Declared-limit checks on a finished run.

use tracing::warn;

use super::{Issue, IssueCategory, SimulationResult};
use crate::netlist::{CircuitNetlist, ElementType};

/// Compare per-element peak readings against the netlist's declared limits.
///
/// Resistor power is computed as I²R from the peak current; other elements
/// use the measured V·I peak. Never re-solves anything. A `Success` run that
/// gains a violation is downgraded to `CompletedWithWarnings`.
pub fn apply_safety_checks(result: &mut SimulationResult, netlist: &CircuitNetlist) {
    if !result.status.is_completed() {
        return;
    }

    let mut violations = Vec::new();
    for element in netlist.elements.iter().filter(|e| e.has_limits()) {
        let Some(reading) = result.reading(&element.id) else {
            continue;
        };

        if let Some(limit) = element.max_current {
            if reading.peak_current > limit {
                violations.push(
                    Issue::warning(
                        IssueCategory::Overcurrent,
                        format!(
                            "{} carries {:.4} A, above its {:.4} A rating",
                            element.id, reading.peak_current, limit
                        ),
                    )
                    .for_element(&element.id),
                );
            }
        }

        if let Some(limit) = element.max_power {
            let power = match element.element_type {
                ElementType::Resistor => reading.peak_current.powi(2) * element.value,
                _ => reading.peak_power,
            };
            if power > limit {
                violations.push(
                    Issue::warning(
                        IssueCategory::Overpower,
                        format!(
                            "{} dissipates {:.4} W, above its {:.4} W rating",
                            element.id, power, limit
                        ),
                    )
                    .for_element(&element.id),
                );
            }
        }
    }

    if violations.is_empty() {
        return;
    }
    for issue in &violations {
        warn!(%issue, "safety limit exceeded");
    }
    result.issues.extend(violations);
    result.refresh_status();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::NetlistElement;
    use crate::results::{ElementReading, SimulationStatus};

    fn netlist() -> CircuitNetlist {
        CircuitNetlist::new("t")
            .with_element(
                NetlistElement::new("R1", ElementType::Resistor, ["a", "0"], 100.0)
                    .with_max_power(0.25),
            )
            .with_element(
                NetlistElement::new("D2", ElementType::Diode, ["a", "b"], 0.0).with_max_current(0.02),
            )
    }

    fn reading(id: &str, current: f64, power: f64) -> ElementReading {
        let mut r = ElementReading::new(id);
        r.record(current, power);
        r
    }

    #[test]
    fn test_overpower_downgrades_success() {
        // 0.1 A through 100 Ω is 1 W.
        let mut result = SimulationResult::completed(vec![], vec![], vec![reading("R1", 0.1, 1.0)]);
        apply_safety_checks(&mut result, &netlist());

        assert_eq!(result.status, SimulationStatus::CompletedWithWarnings);
        let issue = &result.issues[0];
        assert_eq!(issue.category, IssueCategory::Overpower);
        assert_eq!(issue.element_id.as_deref(), Some("R1"));
    }

    #[test]
    fn test_overcurrent_on_diode() {
        let mut result = SimulationResult::completed(
            vec![],
            vec![],
            vec![reading("R1", 0.01, 0.01), reading("D2", 0.05, 0.1)],
        );
        apply_safety_checks(&mut result, &netlist());
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].category, IssueCategory::Overcurrent);
    }

    #[test]
    fn test_within_limits_stays_success() {
        let mut result = SimulationResult::completed(vec![], vec![], vec![reading("R1", 0.01, 0.01)]);
        apply_safety_checks(&mut result, &netlist());
        assert_eq!(result.status, SimulationStatus::Success);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_failed_runs_are_left_alone() {
        let mut result = SimulationResult::cancelled();
        result.readings.push(reading("R1", 10.0, 100.0));
        apply_safety_checks(&mut result, &netlist());
        assert_eq!(result.status, SimulationStatus::Cancelled);
        assert!(!result.has_issue(IssueCategory::Overpower));
    }
}
