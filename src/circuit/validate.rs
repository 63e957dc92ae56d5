//! Netlist validation, run before any matrix is built.

use std::collections::HashSet;

use crate::netlist::{CircuitNetlist, ElementType};
use crate::results::{Issue, IssueCategory};

/// Errors block the run; warnings travel with the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(Issue::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.is_warning())
    }

    fn error(&mut self, category: IssueCategory, message: String, element: Option<&str>) {
        let issue = Issue::error(category, message);
        self.issues.push(match element {
            Some(id) => issue.for_element(id),
            None => issue,
        });
    }
}

/// Check a netlist for problems that make simulation meaningless.
///
/// All problems are collected; only an empty netlist stops early.
pub fn validate_netlist(netlist: &CircuitNetlist) -> ValidationReport {
    let mut report = ValidationReport::default();

    if netlist.elements.is_empty() {
        report.error(IssueCategory::Topology, "circuit has no elements".to_string(), None);
        return report;
    }

    let mut ids = HashSet::new();
    for element in &netlist.elements {
        let id = element.id.trim();
        if id.is_empty() {
            report.error(IssueCategory::Topology, "element with empty id".to_string(), None);
        } else if !ids.insert(id) {
            report.error(
                IssueCategory::Topology,
                format!("duplicate element id '{id}'"),
                Some(id),
            );
        }

        let required = element.element_type.required_nodes();
        if element.nodes.len() < required {
            report.error(
                IssueCategory::Topology,
                format!(
                    "{} {} needs {} nodes, has {}",
                    element.element_type,
                    element.id,
                    required,
                    element.nodes.len()
                ),
                Some(&element.id),
            );
        }
        if element.nodes.iter().any(|n| n.trim().is_empty()) {
            report.error(
                IssueCategory::Topology,
                format!("{} has an empty node name", element.id),
                Some(&element.id),
            );
        }

        if element.element_type.is_passive() && !(element.value > 0.0 && element.value.is_finite()) {
            report.error(
                IssueCategory::Parameter,
                format!(
                    "{} {} must have a positive value, got {}",
                    element.element_type, element.id, element.value
                ),
                Some(&element.id),
            );
        }
        if element.element_type.is_source() && !element.value.is_finite() {
            report.error(
                IssueCategory::Parameter,
                format!("source {} has a non-finite value", element.id),
                Some(&element.id),
            );
        }
        if let Some((name, value)) = element
            .parameters
            .iter()
            .find(|(_, v)| !v.is_finite())
        {
            report.error(
                IssueCategory::Parameter,
                format!("{} parameter {} is {}", element.id, name, value),
                Some(&element.id),
            );
        }
    }

    let grounded = netlist
        .elements
        .iter()
        .flat_map(|e| e.nodes.iter())
        .any(|n| netlist.is_ground(n));
    if !grounded {
        report.issues.push(Issue::warning(
            IssueCategory::Topology,
            format!("no element connects to ground node '{}'", netlist.ground_node),
        ));
    }

    let has_voltage_source = netlist
        .elements
        .iter()
        .any(|e| e.element_type == ElementType::VoltageSource);
    if !has_voltage_source {
        report.issues.push(Issue::warning(
            IssueCategory::Topology,
            "no voltage source; DC analysis may fail",
        ));
    }

    report
}
